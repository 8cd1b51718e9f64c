//! Diagnostic logging setup for the binary.

use anyhow::{anyhow, Result};
use std::path::Path;
use tracing::level_filters::LevelFilter;
use tracing_appender::rolling::Rotation;
use tracing_subscriber::fmt::writer::MakeWriterExt;

pub const LOG_PREFIX: &str = "typing-journal";

const MAX_LOG_FILES: usize = 5;

/// Install a subscriber writing to a daily-rotated file in `logs_dir` and,
/// when `show_console` is set, to stderr.
///
/// An explicit `level` wins over `RUST_LOG`; without either, `info` is used.
pub fn enable_logging(logs_dir: &Path, level: Option<LevelFilter>, show_console: bool) -> Result<()> {
    let appender = tracing_appender::rolling::Builder::new()
        .rotation(Rotation::DAILY)
        .max_log_files(MAX_LOG_FILES)
        .filename_prefix(LOG_PREFIX)
        .filename_suffix("log")
        .build(logs_dir)?;

    let stderr = std::io::stderr.with_filter(move |_| show_console);

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(filter_directive(
            level,
            std::env::var("RUST_LOG").ok(),
        )))
        .with_ansi(false)
        .with_writer(stderr.and(appender))
        .try_init()
        .map_err(|e| anyhow!(e))
}

/// Filter directives: an explicit level scoped to this crate, else
/// `RUST_LOG` verbatim, else `info` for this crate.
fn filter_directive(level: Option<LevelFilter>, env: Option<String>) -> String {
    let scoped = |level: &str| format!("{}={level}", env!("CARGO_PKG_NAME").replace('-', "_"));

    match (level, env) {
        (Some(level), _) => scoped(&level.to_string()),
        (None, Some(env)) if !env.trim().is_empty() => env,
        (None, _) => scoped("info"),
    }
}
