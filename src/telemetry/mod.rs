//! Tracing subscriber setup for the CLI.
//!
//! Logs go to stderr so that `--format json` output on stdout stays
//! machine-readable. `PEERLY_LOG` takes precedence over `-v` flags and
//! accepts full `EnvFilter` directives (`peerly=debug,reqwest=warn`).

use std::sync::Once;

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::constants::ENV_LOG;

static INIT: Once = Once::new();

/// Default filter directive for a `-v` count.
pub fn default_directive(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "peerly=info,warn",
        _ => "peerly=debug,info",
    }
}

/// Install the global subscriber. Safe to call more than once.
pub fn init_tracing(verbosity: u8, json: bool) {
    INIT.call_once(|| {
        let filter = EnvFilter::try_from_env(ENV_LOG)
            .unwrap_or_else(|_| EnvFilter::new(default_directive(verbosity)));

        // `try_init` fails only if another subscriber is already set (tests).
        let _ = if json {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .try_init()
        } else {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    fmt::layer()
                        .with_target(false)
                        .with_writer(std::io::stderr),
                )
                .try_init()
        };
    });
}
