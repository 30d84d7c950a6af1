//! peerly: section-by-section critique of LaTeX technical documents (library crate).
//!
//! Re-exports public modules for integration tests and external use.

pub mod aggregator;
pub mod cache;
pub mod config;
pub mod constants;
pub mod env;
pub mod models;
pub mod orchestrator;
pub mod output;
pub mod progress;
pub mod providers;
pub mod retrieval;
pub mod segmenter;
pub mod telemetry;
pub mod workers;
