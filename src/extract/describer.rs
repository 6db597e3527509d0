//! One-shot invocation of the describer program.

use std::process::Command;

use crate::error::{NixtractError, Result};
use crate::extract::ExtractionOpts;
use crate::extract::programs::EvalPrograms;
use crate::model::DerivationRecord;

/// Trailing stderr lines kept for the error report on a non-zero exit.
const STDERR_TAIL_LINES: usize = 20;

/// Describe the derivation at `attribute_path`, blocking until the
/// subprocess exits.
pub fn describe(
    opts: &ExtractionOpts,
    programs: &EvalPrograms,
    attribute_path: &str,
) -> Result<DerivationRecord> {
    let mut command = Command::new(&opts.nix_bin);
    command
        .arg("eval")
        .args(["--json", "--impure", "--file"])
        .arg(programs.describer())
        .arg("-I")
        .arg(programs.lib_include())
        .args(["--extra-experimental-features", "nix-command flakes"])
        .env("TARGET_FLAKE_REF", &opts.flake_ref)
        .env("TARGET_ATTRIBUTE_PATH", attribute_path)
        .env("RUNTIME_ONLY", if opts.runtime_only { "1" } else { "0" })
        .env("NIXPKGS_ALLOW_UNFREE", "1")
        .env("NIXPKGS_ALLOW_INSECURE", "1")
        .env("NIXPKGS_ALLOW_BROKEN", "1");
    if let Some(system) = &opts.system {
        command.env("TARGET_SYSTEM", system);
    }
    if opts.offline {
        command.arg("--offline");
    }

    let output = command.output().map_err(NixtractError::Spawn)?;

    if !output.status.success() {
        return Err(NixtractError::Eval {
            attribute_path: Some(attribute_path.to_owned()),
            code: output.status.code(),
            stderr: stderr_tail(&output.stderr),
        });
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    serde_json::from_str(stdout.trim()).map_err(|source| NixtractError::Parse {
        context: attribute_path.to_owned(),
        source,
    })
}

/// Last lines of a captured stderr buffer, for error reports.
fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let lines: Vec<&str> = text.lines().collect();
    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    lines[start..].join("\n")
}
