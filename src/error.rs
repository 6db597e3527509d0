//! Error types for nixtract.

use thiserror::Error;

/// Main error type for nixtract.
#[derive(Error, Debug)]
pub enum NixtractError {
    #[error("failed to start the nix evaluator: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("nix evaluation of '{}' exited with {:?}: {}", .attribute_path.as_deref().unwrap_or("<finder>"), .code, .stderr)]
    Eval {
        /// Attribute path under description, None for the finder.
        attribute_path: Option<String>,
        /// Exit code of the nix subprocess, None when killed by a signal.
        code: Option<i32>,
        /// Tail of the captured stderr.
        stderr: String,
    },

    #[error("could not parse evaluator output for '{context}': {source}")]
    Parse {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl NixtractError {
    /// Short category name, used in status events and log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Spawn(_) => "spawn",
            Self::Eval { .. } => "eval",
            Self::Parse { .. } => "parse",
            Self::Io(_) => "io",
            Self::Config(_) => "config",
        }
    }
}

/// Result type alias for nixtract operations.
pub type Result<T> = std::result::Result<T, NixtractError>;
