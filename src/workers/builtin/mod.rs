//! Built-in worker profile registry.
//!
//! Profiles are embedded via `include_str!` so they ship with the binary.

use crate::models::WorkerDefinition;
use crate::workers::parser;

const CLARITY_MD: &str = include_str!("clarity.md");
const RIGOR_MD: &str = include_str!("rigor.md");

/// List of all built-in profile names.
const BUILTIN_NAMES: &[&str] = &["clarity", "rigor"];

/// Get a built-in worker definition by name.
pub fn get_builtin(name: &str) -> Option<WorkerDefinition> {
    let md = match name {
        "clarity" => CLARITY_MD,
        "rigor" => RIGOR_MD,
        _ => return None,
    };

    parser::parse_worker_definition(md).ok()
}

/// List all available built-in profile names.
pub fn list_builtin_names() -> Vec<&'static str> {
    BUILTIN_NAMES.to_vec()
}
