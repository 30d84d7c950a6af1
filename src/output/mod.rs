//! Output renderers: terminal and JSON.

pub mod json;
pub mod terminal;

use crate::models::Report;

/// Trait for rendering a review report to an output format.
pub trait OutputRenderer {
    /// Render the report to a string.
    fn render(&self, report: &Report) -> String;
}
