//! Tracing setup shared by the server and `ingest-cli`.
//!
//! Events go to stdout in compact form and are mirrored to a log file through a non-blocking
//! writer. `RAGINGEST_LOG_FILE` picks the file; `off` disables file logging entirely. Without it
//! the file is `logs/ragingest.log`. `RUST_LOG` controls filtering and defaults to `info`.
use std::path::PathBuf;
use std::sync::OnceLock;

use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

static LOG_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

const LOG_FILE_ENV: &str = "RAGINGEST_LOG_FILE";
const DEFAULT_LOG_DIR: &str = "logs";
const DEFAULT_LOG_FILE: &str = "ragingest.log";

/// Where the file layer writes.
#[derive(Debug, Clone, PartialEq, Eq)]
enum LogTarget {
    Default,
    File(PathBuf),
    Disabled,
}

impl LogTarget {
    fn from_env_value(value: Option<String>) -> Self {
        match value.as_deref().map(str::trim) {
            None | Some("") => Self::Default,
            Some(value) if value.eq_ignore_ascii_case("off") => Self::Disabled,
            Some(value) => Self::File(PathBuf::from(value)),
        }
    }
}

/// Install the global subscriber. Later calls are no-ops, so binaries and tests may both call it.
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stdout_layer = fmt::layer().with_target(false).compact();
    let file_layer = file_writer(LogTarget::from_env_value(std::env::var(LOG_FILE_ENV).ok()))
        .map(|writer| {
            fmt::layer()
                .with_writer(writer)
                .with_target(true)
                .with_ansi(false)
                .compact()
        });

    let installed = tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(file_layer)
        .try_init();
    if installed.is_err() {
        tracing::debug!("Tracing subscriber already installed");
    }
}

/// Open the file writer for `target`, or `None` when file logging is off or unavailable.
fn file_writer(target: LogTarget) -> Option<NonBlocking> {
    let (non_blocking, guard) = match target {
        LogTarget::Disabled => return None,
        LogTarget::File(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&path)
                .map_err(|err| eprintln!("Failed to open log file {}: {err}", path.display()))
                .ok()?;
            tracing_appender::non_blocking(file)
        }
        LogTarget::Default => {
            std::fs::create_dir_all(DEFAULT_LOG_DIR)
                .map_err(|err| eprintln!("Failed to create {DEFAULT_LOG_DIR} directory: {err}"))
                .ok()?;
            tracing_appender::non_blocking(tracing_appender::rolling::never(
                DEFAULT_LOG_DIR,
                DEFAULT_LOG_FILE,
            ))
        }
    };
    let _ = LOG_GUARD.set(guard);
    Some(non_blocking)
}
