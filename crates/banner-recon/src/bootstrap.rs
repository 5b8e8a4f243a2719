use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use anyhow::Context;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

// ── Logging bootstrap ──────────────────────────────────────────────────────────

/// Map a CLI level name (`DEBUG`, `WARNING`, ...) to an `EnvFilter` directive.
///
/// Unrecognised names are passed through so `RUST_LOG`-style directives work.
pub fn filter_directive(log_level: &str) -> String {
    match log_level.to_uppercase().as_str() {
        "DEBUG" | "CRITICAL" => "debug".to_string(),
        "INFO" => "info".to_string(),
        "WARNING" => "warn".to_string(),
        "ERROR" => "error".to_string(),
        _ => log_level.to_string(),
    }
}

/// Initialise the global `tracing` subscriber.
///
/// Output goes to stderr so it never mixes with the report on stdout, or is
/// appended to `log_file` without ANSI colours when one is given.
pub fn setup_logging(log_level: &str, log_file: Option<&Path>) -> anyhow::Result<()> {
    let filter =
        EnvFilter::try_new(filter_directive(log_level)).unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    match log_file {
        Some(path) => {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("cannot open log file {}", path.display()))?;
            registry
                .with(
                    fmt::layer()
                        .with_target(false)
                        .with_ansi(false)
                        .with_writer(Mutex::new(file)),
                )
                .try_init()?;
        }
        None => {
            registry
                .with(
                    fmt::layer()
                        .with_target(false)
                        .with_writer(std::io::stderr),
                )
                .try_init()?;
        }
    }

    Ok(())
}

// ── Tests ──────────────────────────────────────────────────────────────────────
