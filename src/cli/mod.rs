//! CLI command definitions and argument parsing.
//!
//! Uses clap derive macros for ergonomic argument definitions.

pub mod args;

use colored::Colorize;
use std::io::Write;

/// Styled one-line description for clap help output.
pub const ABOUT_STYLED: &str =
    "\x1b[1mpeerly\x1b[0m \x1b[2m· Section-by-section critique of LaTeX technical documents.\x1b[0m";

/// Print the review banner to stderr.
pub fn print_banner(workers: &[String], guidelines: &str) {
    let stderr = std::io::stderr();
    let mut handle = stderr.lock();
    let _ = writeln!(handle);
    let _ = writeln!(
        handle,
        "  {} {}",
        "peerly".bold(),
        format!("· workers: {} · guidelines: {guidelines}", workers.join(", ")).dimmed(),
    );
    let _ = writeln!(handle);
    let _ = handle.flush();
}
