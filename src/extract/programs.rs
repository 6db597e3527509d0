//! The embedded Nix evaluator programs.
//!
//! Nix only imports files, so the sources compiled into the binary are
//! written out to a run-scoped temporary directory at startup and passed
//! to `nix eval --file`. The directory is removed when the value drops.

use std::path::PathBuf;

use crate::error::Result;

const LIB_NIX: &str = include_str!("nix/lib.nix");
const FIND_ATTRIBUTE_PATHS_NIX: &str = include_str!("nix/find-attribute-paths.nix");
const DESCRIBE_DERIVATION_NIX: &str = include_str!("nix/describe-derivation.nix");

/// The materialised evaluator programs of one extraction run.
#[derive(Debug)]
pub struct EvalPrograms {
    dir: tempfile::TempDir,
}

impl EvalPrograms {
    /// Write the embedded programs to a fresh temporary directory.
    pub fn materialize() -> Result<Self> {
        let dir = tempfile::Builder::new().prefix("nixtract").tempdir()?;
        std::fs::write(dir.path().join("lib.nix"), LIB_NIX)?;
        std::fs::write(
            dir.path().join("find-attribute-paths.nix"),
            FIND_ATTRIBUTE_PATHS_NIX,
        )?;
        std::fs::write(
            dir.path().join("describe-derivation.nix"),
            DESCRIBE_DERIVATION_NIX,
        )?;
        Ok(Self { dir })
    }

    /// Path of the finder program.
    pub fn finder(&self) -> PathBuf {
        self.dir.path().join("find-attribute-paths.nix")
    }

    /// Path of the describer program.
    pub fn describer(&self) -> PathBuf {
        self.dir.path().join("describe-derivation.nix")
    }

    /// The `-I` entry mapping the logical name `lib` that both programs
    /// import.
    pub fn lib_include(&self) -> String {
        format!("lib={}", self.dir.path().join("lib.nix").display())
    }
}
