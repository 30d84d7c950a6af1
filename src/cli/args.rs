//! Clap argument types and config overrides.

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

use peerly::config::Config;
use peerly::models::{Report, Severity};

/// Section-by-section critique of LaTeX technical documents.
#[derive(Parser, Debug)]
#[command(
    name = "peerly",
    version = peerly::constants::VERSION,
    about = super::ABOUT_STYLED,
)]
pub struct Cli {
    /// Increase log verbosity (-v info, -vv debug). PEERLY_LOG overrides.
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Log line format on stderr.
    #[arg(long, global = true, default_value = "text")]
    pub log_format: LogFormat,

    #[command(subcommand)]
    pub command: Command,
}

/// Available commands.
#[derive(clap::Subcommand, Debug)]
pub enum Command {
    /// Review a document.
    Review(Box<ReviewArgs>),

    /// Print the section outline of a document.
    Segment(SegmentArgs),

    /// List available worker profiles.
    Workers(WorkersArgs),

    /// Validate a custom worker profile definition.
    Validate(ValidateArgs),

    /// Print version and build information.
    Version,
}

/// Log line format.
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

/// Arguments for the `segment` subcommand.
#[derive(Parser, Debug)]
pub struct SegmentArgs {
    /// LaTeX source file, or `-` for stdin.
    pub input: PathBuf,

    /// Print the section tree as JSON.
    #[arg(long, default_value_t = false)]
    pub json: bool,
}

/// Arguments for the `workers` subcommand.
#[derive(Parser, Debug)]
pub struct WorkersArgs {
    /// Directory to scan for additional custom profiles.
    #[arg(long)]
    pub profile_dir: Option<PathBuf>,
}

/// Arguments for the `validate` subcommand.
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Path to the worker profile markdown file to validate.
    pub file: PathBuf,
}

/// Arguments for the `review` subcommand.
#[derive(Parser, Debug)]
pub struct ReviewArgs {
    /// LaTeX source file, or `-` for stdin.
    pub input: PathBuf,

    // --- Workers ---
    /// Comma-separated worker kinds (default from config: clarity,rigor).
    #[arg(long = "worker", short = 'w', value_delimiter = ',')]
    pub workers: Vec<String>,

    /// Only review sections with these titles (case-insensitive, repeatable).
    #[arg(long = "section", short = 's')]
    pub sections: Vec<String>,

    /// Directory with custom worker profiles.
    #[arg(long)]
    pub profile_dir: Option<PathBuf>,

    // --- Guidelines ---
    /// Review without retrieving guidelines.
    #[arg(long, default_value_t = false)]
    pub no_guidelines: bool,

    /// HTTP knowledge store endpoint.
    #[arg(long, conflicts_with = "no_guidelines")]
    pub guidelines_url: Option<String>,

    /// Directory of guideline markdown/text files.
    #[arg(long, conflicts_with_all = ["no_guidelines", "guidelines_url"])]
    pub guidelines_dir: Option<PathBuf>,

    // --- Output ---
    /// Output format.
    #[arg(long, default_value = "terminal")]
    pub format: OutputFormat,

    /// Exit non-zero if suggestions meet this severity threshold.
    #[arg(long)]
    pub fail_on: Option<Severity>,

    /// Never exit non-zero on suggestions, even when --fail-on or config is set.
    #[arg(long, default_value_t = false, conflicts_with = "fail_on")]
    pub no_fail: bool,

    // --- Limits ---
    /// Per-task timeout in seconds.
    #[arg(long)]
    pub task_timeout: Option<u64>,

    /// Whole-request deadline in seconds.
    #[arg(long)]
    pub deadline: Option<u64>,

    /// Max concurrent worker tasks.
    #[arg(long)]
    pub max_concurrent: Option<usize>,

    /// Suppress non-essential output (banner, progress).
    #[arg(long, short = 'q', default_value_t = false)]
    pub quiet: bool,

    /// Disable the live progress display.
    #[arg(long, default_value_t = false)]
    pub no_progress: bool,
}

/// Output format options.
#[derive(Debug, Clone, Copy, ValueEnum, PartialEq, Eq)]
pub enum OutputFormat {
    Terminal,
    Json,
}

impl OutputFormat {
    /// Render a report using the renderer for this format.
    pub fn render(&self, report: &Report) -> String {
        use peerly::output::OutputRenderer;
        match self {
            OutputFormat::Terminal => peerly::output::terminal::TerminalRenderer.render(report),
            OutputFormat::Json => peerly::output::json::JsonRenderer.render(report),
        }
    }
}

impl ReviewArgs {
    /// Layer CLI flags over the loaded config (CLI has the highest priority).
    pub fn apply_to(&self, config: &mut Config) {
        if !self.workers.is_empty() {
            config.review.workers = self.workers.clone();
        }
        if let Some(dir) = &self.profile_dir {
            config.review.profile_dir = Some(dir.clone());
        }
        if let Some(secs) = self.task_timeout {
            config.review.task_timeout_secs = secs;
        }
        if let Some(secs) = self.deadline {
            config.review.request_deadline_secs = secs;
        }
        if let Some(n) = self.max_concurrent {
            config.review.max_concurrent = Some(n);
        }
        if self.no_guidelines {
            config.guidelines.enabled = false;
        }
        if let Some(url) = &self.guidelines_url {
            config.guidelines.enabled = true;
            config.guidelines.url = Some(url.clone());
            config.guidelines.dir = None;
        }
        if let Some(dir) = &self.guidelines_dir {
            config.guidelines.enabled = true;
            config.guidelines.dir = Some(dir.clone());
            config.guidelines.url = None;
        }
    }

    /// Effective fail-on threshold (flag over config, disabled by `--no-fail`).
    pub fn fail_threshold(&self, config: &Config) -> Option<Severity> {
        if self.no_fail {
            None
        } else {
            self.fail_on.or(config.review.fail_on)
        }
    }
}
