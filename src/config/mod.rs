//! Configuration loading and layering.
//!
//! Handles `.peerly.toml` loading, environment variable resolution,
//! and validation. CLI flags are applied on top by the binary.

pub mod loader;

pub use loader::{
    AggregationConfig, Config, ConfigError, GuidelinesConfig, ProviderConfig, ReviewConfig,
};
