//! Markdown + YAML frontmatter parser for worker profiles.
//!
//! Uses `serde_yaml_ng` so profiles can carry nested retrieval hints.

use crate::models::worker::{WorkerDefinition, WorkerProfile};

/// Parse a markdown file with YAML frontmatter into a WorkerDefinition.
///
/// Expected format:
/// ```markdown
/// ---
/// name: notation
/// description: Checks notation consistency
/// sections: technical
/// retrieval:
///   query: mathematical notation conventions
///   hints:
///     - keywords: [matrix, vector]
///       focus: linear algebra notation
/// ---
///
/// System prompt content here...
/// ```
pub fn parse_worker_definition(content: &str) -> Result<WorkerDefinition, String> {
    let (frontmatter, body) = split_frontmatter(content)?;
    let profile: WorkerProfile =
        serde_yaml_ng::from_str(&frontmatter).map_err(|e| format!("invalid frontmatter: {e}"))?;

    if profile.name.trim().is_empty() {
        return Err("worker name must not be empty".to_string());
    }
    if profile.name.chars().any(char::is_whitespace) {
        return Err(format!(
            "worker name '{}' must not contain whitespace",
            profile.name
        ));
    }
    let system_prompt = body.trim().to_string();
    if system_prompt.is_empty() {
        return Err(format!("worker '{}' has an empty prompt body", profile.name));
    }

    Ok(WorkerDefinition {
        profile,
        system_prompt,
    })
}

/// Split content into YAML frontmatter and markdown body.
fn split_frontmatter(content: &str) -> Result<(String, String), String> {
    let content = content.trim();

    let Some(after_first) = content.strip_prefix("---") else {
        return Err("worker profile must start with YAML frontmatter (---)".to_string());
    };
    let end = after_first
        .find("\n---")
        .ok_or_else(|| "unterminated YAML frontmatter (missing closing ---)".to_string())?;

    let frontmatter = after_first[..end].trim().to_string();
    let body = after_first[end + 4..].to_string();

    Ok((frontmatter, body))
}
