//! Command-line interface definitions using clap.

use std::path::PathBuf;

use clap::Parser;
use tracing::Level;

use crate::logging::{self, LogConfig};
use crate::version;

/// nixtract - extract the graph of derivations from a Nix flake
///
/// Writes one JSON record per reachable derivation, describing its
/// identity, metadata, outputs and build-input edges.
#[derive(Parser, Debug)]
#[command(name = "nixtract")]
#[command(author, version = version::clap_version(), long_version = version::long_version(), about, long_about = None)]
pub struct Cli {
    /// Reference of the flake to extract, e.g. "nixpkgs" or
    /// "github:tweag/nixtract". Either a flake registry entry or a URL.
    #[arg(
        short = 'f',
        long = "target-flake-ref",
        env = "NIXTRACT_FLAKE_REF",
        default_value = "nixpkgs"
    )]
    pub flake_ref: String,

    /// Attribute path to use as the extraction root, e.g.
    /// "haskellPackages.hello". Defaults to every derivation the flake
    /// exposes; the rest of the graph is discovered through dependency
    /// edges either way.
    #[arg(short = 'a', long = "target-attribute-path")]
    pub attribute_path: Option<String>,

    /// System to evaluate for, e.g. "x86_64-linux". This is evaluation
    /// only, so it does not have to match the host; defaults to the host
    /// system.
    #[arg(short = 's', long = "target-system")]
    pub system: Option<String>,

    /// Only follow dependencies that survive into the runtime closure
    /// (drops native build inputs).
    #[arg(long)]
    pub runtime_only: bool,

    /// Run nix evaluation in offline mode.
    #[arg(long)]
    pub offline: bool,

    /// Count of workers to spawn to describe derivations. Defaults to the
    /// number of CPUs.
    #[arg(long)]
    pub n_workers: Option<usize>,

    /// Attribute path prefix that is never enqueued for description; its
    /// edges still appear in the emitted records. May be repeated.
    #[arg(long = "exclude", value_name = "PREFIX")]
    pub exclude: Vec<String>,

    /// Pretty print each record instead of compact JSON.
    #[arg(long)]
    pub pretty: bool,

    /// Enable verbose output (-v for info, -vv for debug, -vvv for trace).
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress progress reporting.
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Disable colored output.
    #[arg(long, env = "NO_COLOR")]
    pub no_color: bool,

    /// Log level: error, warn, info, debug, trace.
    #[arg(long, env = "NIXTRACT_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Log format: pretty, compact, json.
    #[arg(long, env = "NIXTRACT_LOG_FORMAT")]
    pub log_format: Option<String>,

    /// Nix binary to invoke.
    #[arg(long, env = "NIXTRACT_NIX_BIN", default_value = "nix", hide = true)]
    pub nix_bin: PathBuf,

    /// Output file to write to, "-" for stdout.
    #[arg(value_name = "OUTFILE")]
    pub output_path: Option<PathBuf>,
}

impl Cli {
    /// Assemble the logging configuration from verbosity flags, explicit
    /// options and the environment. CLI arguments win over env vars.
    pub fn log_config(&self) -> LogConfig {
        let level = if self.quiet {
            Level::ERROR
        } else {
            match self.verbose {
                0 => Level::WARN,
                1 => Level::INFO,
                2 => Level::DEBUG,
                _ => Level::TRACE,
            }
        };

        let mut config = LogConfig::new().with_level(level);
        if let Some(s) = &self.log_level
            && let Some(parsed) = logging::parse_level(s)
        {
            config = config.with_level(parsed);
        }
        if let Some(s) = &self.log_format
            && let Ok(format) = s.parse()
        {
            config = config.with_format(format);
        }
        config.with_env_overrides()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::LogFormat;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_defaults() {
        let cli = Cli::parse_from(["nixtract"]);
        assert_eq!(cli.flake_ref, "nixpkgs");
        assert!(cli.attribute_path.is_none());
        assert!(cli.system.is_none());
        assert!(!cli.runtime_only);
        assert!(!cli.offline);
        assert!(cli.n_workers.is_none());
        assert!(cli.exclude.is_empty());
        assert!(!cli.pretty);
        assert!(cli.output_path.is_none());
        assert_eq!(cli.nix_bin, PathBuf::from("nix"));
    }

    #[test]
    fn test_exclude_is_repeatable() {
        let cli = Cli::parse_from([
            "nixtract",
            "--exclude",
            "bootstrapTools",
            "--exclude",
            "stdenv",
        ]);
        assert_eq!(cli.exclude, vec!["bootstrapTools", "stdenv"]);
    }

    #[test]
    fn test_verbosity_mapping() {
        let cli = Cli::parse_from(["nixtract"]);
        assert_eq!(cli.log_config().level, Level::WARN);

        let cli = Cli::parse_from(["nixtract", "-v"]);
        assert_eq!(cli.log_config().level, Level::INFO);

        let cli = Cli::parse_from(["nixtract", "-vvv"]);
        assert_eq!(cli.log_config().level, Level::TRACE);

        let cli = Cli::parse_from(["nixtract", "--quiet"]);
        assert_eq!(cli.log_config().level, Level::ERROR);
    }

    #[test]
    fn test_explicit_log_options_win() {
        let cli = Cli::parse_from([
            "nixtract",
            "--log-level",
            "debug",
            "--log-format",
            "json",
        ]);
        let config = cli.log_config();
        assert_eq!(config.level, Level::DEBUG);
        assert_eq!(config.format, LogFormat::Json);
    }

    #[test]
    fn test_output_path_positional() {
        let cli = Cli::parse_from(["nixtract", "out.jsonl"]);
        assert_eq!(cli.output_path, Some(PathBuf::from("out.jsonl")));
    }
}
