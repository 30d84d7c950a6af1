//! App-wide constants.
//!
//! Centralises the tool name, config paths, and environment variable
//! names so a rename only requires changing this file.

/// Display name of the tool (lowercase).
pub const APP_NAME: &str = "peerly";

/// Crate version, as reported by `peerly version`.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Compilation target triple, injected by `build.rs`.
pub const TARGET: &str = env!("TARGET");

/// Local config filename (e.g. `.peerly.toml` in the working directory).
pub const CONFIG_FILENAME: &str = ".peerly.toml";

/// Directory name under `~/.config/` for global config.
pub const CONFIG_DIR: &str = "peerly";

/// Title given to the implicit section of a document without markers.
pub const FALLBACK_SECTION_TITLE: &str = "Document";

// ── Environment variable names ──────────────────────────────────────

pub const ENV_PROVIDER: &str = "PEERLY_PROVIDER";
pub const ENV_MODEL: &str = "PEERLY_MODEL";
pub const ENV_API_KEY: &str = "PEERLY_API_KEY";
pub const ENV_BASE_URL: &str = "PEERLY_BASE_URL";
pub const ENV_GUIDELINES_URL: &str = "PEERLY_GUIDELINES_URL";
pub const ENV_GUIDELINES: &str = "PEERLY_GUIDELINES";
pub const ENV_LOG: &str = "PEERLY_LOG";
