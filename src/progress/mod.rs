//! Progress reporting for terminal output.
//!
//! Provides a live-updating per-task status display (one line per
//! section × worker pair) on stderr. Designed for interactive terminals;
//! silenced with `--no-progress` or when stderr is not a TTY.

use std::io::{self, Write};
use std::sync::{Mutex, MutexGuard};

use colored::Colorize;
use indexmap::IndexMap;

/// Status of a single review task (section × worker).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskStatus {
    /// Dispatched, waiting for a concurrency slot.
    Pending,
    /// Retrieving guidelines or waiting on the model.
    InProgress,
    /// Completed with this many candidates.
    Done(usize),
    /// Failed, timed out, or cancelled.
    Failed(String),
}

/// Tracks and renders live progress for review tasks.
///
/// Thread-safe; meant to be shared across async tasks via `Arc`.
pub struct ProgressTracker {
    inner: Mutex<ProgressState>,
    /// If false, all output is suppressed.
    enabled: bool,
}

struct ProgressState {
    /// task label → status, in dispatch order.
    tasks: IndexMap<String, TaskStatus>,
    /// Number of lines we last printed (for clearing).
    rendered_lines: usize,
    workers: Vec<String>,
}

impl ProgressTracker {
    /// `workers` names the enabled worker kinds for the header.
    pub fn new(workers: &[String], enabled: bool) -> Self {
        Self {
            inner: Mutex::new(ProgressState {
                tasks: IndexMap::new(),
                rendered_lines: 0,
                workers: workers.to_vec(),
            }),
            enabled,
        }
    }

    /// A tracker that records state but never prints.
    pub fn silent() -> Self {
        Self::new(&[], false)
    }

    /// Label used for a (section, worker) task.
    pub fn label(section_title: &str, start_line: usize, worker: &str) -> String {
        format!("L{start_line} {section_title} · {worker}")
    }

    /// Set the status of a task (registering it if new) and re-render.
    pub fn update(&self, task: &str, status: TaskStatus) {
        let mut state = self.lock();
        state.tasks.insert(task.to_string(), status);
        if self.enabled {
            Self::render(&mut state);
        }
    }

    pub fn status(&self, task: &str) -> Option<TaskStatus> {
        self.lock().tasks.get(task).cloned()
    }

    /// Clear progress lines and print a final status per task.
    pub fn finish(&self, total_suggestions: usize) {
        if !self.enabled {
            return;
        }
        let mut state = self.lock();
        Self::clear_lines(state.rendered_lines);
        state.rendered_lines = 0;

        let stderr = io::stderr();
        let mut handle = stderr.lock();
        for (task, status) in &state.tasks {
            let (icon, text) = match status {
                TaskStatus::Failed(reason) => ("✖".red().bold().to_string(), reason.red().to_string()),
                TaskStatus::Done(n) => (
                    "✔".green().bold().to_string(),
                    format!("{n} suggestion(s)").green().to_string(),
                ),
                _ => ("✔".green().bold().to_string(), "done".green().to_string()),
            };
            let _ = writeln!(handle, "  {icon} {} {text}", task.dimmed());
        }

        let _ = writeln!(
            handle,
            "  {}",
            format!("{total_suggestions} suggestion(s) after merging").dimmed()
        );
        let _ = writeln!(handle);
    }

    /// Render the current state to stderr, clearing previous output.
    fn render(state: &mut ProgressState) {
        let stderr = io::stderr();
        let mut handle = stderr.lock();

        Self::clear_lines(state.rendered_lines);

        let mut lines = 0;
        let _ = writeln!(
            handle,
            "  {} Reviewing {} task(s) with {} [{}]",
            "▸".cyan().bold(),
            state.tasks.len(),
            if state.workers.len() == 1 {
                "1 worker".to_string()
            } else {
                format!("{} workers", state.workers.len())
            },
            state.workers.join(", ").dimmed(),
        );
        lines += 1;

        for (task, status) in &state.tasks {
            let (icon, text) = match status {
                TaskStatus::Pending => ("○".dimmed().to_string(), "waiting".dimmed().to_string()),
                TaskStatus::InProgress => {
                    ("◌".cyan().bold().to_string(), "reviewing…".cyan().to_string())
                }
                TaskStatus::Done(n) => (
                    "✔".green().bold().to_string(),
                    format!("{n} suggestion(s)").green().to_string(),
                ),
                TaskStatus::Failed(reason) => ("✖".red().bold().to_string(), reason.red().to_string()),
            };
            let _ = writeln!(handle, "    {icon} {} {text}", task.dimmed());
            lines += 1;
        }

        let _ = handle.flush();
        state.rendered_lines = lines;
    }

    /// Move cursor up and clear `n` lines.
    fn clear_lines(n: usize) {
        if n == 0 {
            return;
        }
        let stderr = io::stderr();
        let mut handle = stderr.lock();
        for _ in 0..n {
            let _ = write!(handle, "\x1b[1A\x1b[2K");
        }
        let _ = handle.flush();
    }

    fn lock(&self) -> MutexGuard<'_, ProgressState> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
