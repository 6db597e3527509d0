//! Data model for extracted derivations.
//!
//! These types mirror the JSON document produced by the describer program;
//! field names are `snake_case` on both sides, so no renaming is involved.
//! Absent optional scalars serialise as `null`, empty collections as `[]`.

use serde::{Deserialize, Serialize};

/// One node of the extracted graph, emitted as a single JSONL record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DerivationRecord {
    /// Attribute path from the flake's package set; unique across a run.
    pub attribute_path: String,
    /// Store path of the .drv file, None when the target system is not
    /// among the derivation's declared platforms.
    pub derivation_path: Option<String>,
    /// Primary output path, guarded like `derivation_path`.
    pub output_path: Option<String>,
    /// All declared outputs, in declaration order.
    pub outputs: Vec<Output>,
    /// The raw derivation name, e.g. "hello-2.12.1".
    pub name: String,
    pub parsed_name: ParsedName,
    pub nixpkgs_metadata: NixpkgsMetadata,
    /// Present when the source is a known git reference.
    pub src: Option<Source>,
    /// Inbound build-input edges of this node.
    pub build_inputs: Vec<BuildInput>,
}

/// A single output of a (possibly multi-output) derivation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Output {
    pub name: String,
    pub output_path: Option<String>,
}

/// The derivation name split on the package manager's convention.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedName {
    pub name: String,
    pub version: String,
}

/// Metadata conventions specific to nixpkgs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NixpkgsMetadata {
    pub pname: Option<String>,
    pub version: Option<String>,
    pub description: Option<String>,
    pub homepage: Option<String>,
    pub broken: Option<bool>,
    /// Normalised to a list; a scalar license becomes a singleton.
    pub licenses: Option<Vec<License>>,
}

/// A license of a derivation. Not every nixpkgs license carries an SPDX id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct License {
    pub spdx_id: Option<String>,
    pub full_name: Option<String>,
}

/// The git origin of a derivation's source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    pub git_repo_url: String,
    pub rev: String,
}

/// One dependency edge of a derivation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildInput {
    /// `build_input`, `propagated_build_input`, `native_build_input`, or
    /// the raw attribute key that supplied the edge.
    pub build_input_type: String,
    /// Attribute path of the dependency; None when it could not be
    /// derived, in which case the edge is emitted but never followed.
    pub attribute_path: Option<String>,
    pub output_path: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_describer_output() {
        let json = r#"{
            "attribute_path": "hello",
            "derivation_path": "/nix/store/aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa-hello-2.12.1.drv",
            "output_path": "/nix/store/bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb-hello-2.12.1",
            "outputs": [
                { "name": "out", "output_path": "/nix/store/bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb-hello-2.12.1" }
            ],
            "name": "hello-2.12.1",
            "parsed_name": { "name": "hello", "version": "2.12.1" },
            "nixpkgs_metadata": {
                "pname": "hello",
                "version": "2.12.1",
                "description": "Program that produces a familiar, friendly greeting",
                "homepage": "https://www.gnu.org/software/hello/manual/",
                "broken": false,
                "licenses": [ { "spdx_id": "GPL-3.0-or-later", "full_name": "GNU General Public License v3.0 or later" } ]
            },
            "src": null,
            "build_inputs": [
                { "build_input_type": "build_input", "attribute_path": "glibc", "output_path": "/nix/store/cccccccccccccccccccccccccccccccc-glibc-2.39" }
            ]
        }"#;

        let record: DerivationRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.attribute_path, "hello");
        assert_eq!(record.parsed_name.name, "hello");
        assert_eq!(record.parsed_name.version, "2.12.1");
        assert_eq!(record.outputs.len(), 1);
        assert_eq!(record.nixpkgs_metadata.broken, Some(false));
        let licenses = record.nixpkgs_metadata.licenses.as_ref().unwrap();
        assert_eq!(licenses[0].spdx_id.as_deref(), Some("GPL-3.0-or-later"));
        assert_eq!(record.build_inputs.len(), 1);
        assert_eq!(
            record.build_inputs[0].attribute_path.as_deref(),
            Some("glibc")
        );
    }

    #[test]
    fn test_deserialize_platform_guarded_record() {
        // A record for a system outside the declared platforms has null
        // store paths but is otherwise complete.
        let json = r#"{
            "attribute_path": "mac-only",
            "derivation_path": null,
            "output_path": null,
            "outputs": [ { "name": "out", "output_path": null } ],
            "name": "mac-only-1.0",
            "parsed_name": { "name": "mac-only", "version": "1.0" },
            "nixpkgs_metadata": {
                "pname": null, "version": null, "description": null,
                "homepage": null, "broken": null, "licenses": null
            },
            "src": null,
            "build_inputs": []
        }"#;

        let record: DerivationRecord = serde_json::from_str(json).unwrap();
        assert!(record.derivation_path.is_none());
        assert!(record.output_path.is_none());
        assert!(record.build_inputs.is_empty());
    }

    #[test]
    fn test_serialize_keeps_nulls_and_empty_lists() {
        let record = DerivationRecord {
            attribute_path: "trivial".to_string(),
            derivation_path: None,
            output_path: None,
            outputs: Vec::new(),
            name: "trivial-1.0".to_string(),
            parsed_name: ParsedName {
                name: "trivial".to_string(),
                version: "1.0".to_string(),
            },
            nixpkgs_metadata: NixpkgsMetadata::default(),
            src: None,
            build_inputs: Vec::new(),
        };

        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"derivation_path\":null"));
        assert!(json.contains("\"outputs\":[]"));
        assert!(json.contains("\"build_inputs\":[]"));
        assert!(!json.contains('\n'));
    }

    #[test]
    fn test_roundtrip_preserves_edge_without_attribute_path() {
        let input = BuildInput {
            build_input_type: "native_build_input".to_string(),
            attribute_path: None,
            output_path: Some("/nix/store/dddddddddddddddddddddddddddddddd-gcc-13".to_string()),
        };
        let json = serde_json::to_string(&input).unwrap();
        let back: BuildInput = serde_json::from_str(&json).unwrap();
        assert_eq!(back, input);
    }
}
