//! Version information for the nixtract binary.
//!
//! Includes the git revision when built via Nix flake (which sets the
//! NIXTRACT_GIT_REV environment variable).

use std::sync::LazyLock;

/// The package version from Cargo.toml.
pub const PKG_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Git revision from Nix build (empty string if not set).
pub const GIT_REV: &str = match option_env!("NIXTRACT_GIT_REV") {
    Some(rev) => rev,
    None => "",
};

/// Static full version string for clap compatibility.
static FULL_VERSION: LazyLock<String> = LazyLock::new(|| {
    if GIT_REV.is_empty() {
        PKG_VERSION.to_string()
    } else {
        format!("{} ({})", PKG_VERSION, GIT_REV)
    }
});

/// Returns the version string for clap's version flag.
pub fn clap_version() -> &'static str {
    PKG_VERSION
}

/// Returns the long version string for clap's long_version flag.
pub fn long_version() -> &'static str {
    FULL_VERSION.as_str()
}
