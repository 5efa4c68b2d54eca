//! Vault logging bootstrap.
//!
//! # Responsibility
//! - Start one rolling file logger per process.
//! - Keep log lines metadata-only: ids, counts and outcomes, never note text or passwords.
//!
//! # Invariants
//! - Re-initializing with the same level and directory is a no-op.
//! - Re-initializing with a different level or directory is rejected.
//! - Initialization never panics.

use crate::config::VaultConfig;
use flexi_logger::{Cleanup, Criterion, FileSpec, Logger, LoggerHandle, Naming, WriteMode};
use log::{error, info};
use once_cell::sync::OnceCell;
use std::path::{Path, PathBuf};
use thiserror::Error;

const LOG_FILE_BASENAME: &str = "pen";
const MAX_LOG_FILE_SIZE_BYTES: u64 = 5 * 1024 * 1024;
const MAX_LOG_FILES: usize = 5;
const MAX_PANIC_PAYLOAD_CHARS: usize = 120;

static ACTIVE: OnceCell<ActiveLogger> = OnceCell::new();
static PANIC_HOOK: OnceCell<()> = OnceCell::new();

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("unsupported log level `{0}`; expected trace|debug|info|warn|error")]
    UnsupportedLevel(String),
    #[error("log directory must be an absolute path, got `{0}`")]
    RelativeDir(PathBuf),
    #[error("failed to create log directory `{path}`: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to start logger: {0}")]
    Backend(#[from] flexi_logger::FlexiLoggerError),
    #[error("logging already active ({active}); refusing to switch to {requested}")]
    Conflict { active: String, requested: String },
}

struct ActiveLogger {
    level: &'static str,
    log_dir: PathBuf,
    _handle: LoggerHandle,
}

impl ActiveLogger {
    fn describe(level: &str, dir: &Path) -> String {
        format!("level={level} dir={}", dir.display())
    }

    fn check_matches(&self, level: &'static str, dir: &Path) -> Result<(), LoggingError> {
        if self.level == level && self.log_dir == dir {
            return Ok(());
        }
        Err(LoggingError::Conflict {
            active: Self::describe(self.level, &self.log_dir),
            requested: Self::describe(level, dir),
        })
    }
}

/// Starts file logging under `log_dir` at `level`.
///
/// # Errors
/// - `UnsupportedLevel` / `RelativeDir` for bad inputs.
/// - `Conflict` when a logger with different settings is already running.
pub fn init_logging(level: &str, log_dir: impl AsRef<Path>) -> Result<(), LoggingError> {
    let level = normalize_level(level)?;
    let log_dir = log_dir.as_ref();
    if !log_dir.is_absolute() {
        return Err(LoggingError::RelativeDir(log_dir.to_path_buf()));
    }

    if let Some(active) = ACTIVE.get() {
        return active.check_matches(level, log_dir);
    }

    let active = ACTIVE.get_or_try_init(|| start_logger(level, log_dir))?;
    active.check_matches(level, log_dir)
}

/// Starts logging from a config; a config without `log_dir` leaves logging off.
pub fn init_from_config(config: &VaultConfig) -> Result<bool, LoggingError> {
    match config.log_dir.as_ref() {
        Some(dir) => init_logging(&config.log_level, dir).map(|()| true),
        None => Ok(false),
    }
}

/// Returns `(level, log_dir)` of the running logger.
pub fn logging_status() -> Option<(&'static str, PathBuf)> {
    ACTIVE
        .get()
        .map(|active| (active.level, active.log_dir.clone()))
}

/// `debug` for debug builds, `info` otherwise.
pub fn default_log_level() -> &'static str {
    if cfg!(debug_assertions) {
        "debug"
    } else {
        "info"
    }
}

pub(crate) fn normalize_level(level: &str) -> Result<&'static str, LoggingError> {
    match level.trim().to_ascii_lowercase().as_str() {
        "trace" => Ok("trace"),
        "debug" => Ok("debug"),
        "info" => Ok("info"),
        "warn" | "warning" => Ok("warn"),
        "error" => Ok("error"),
        other => Err(LoggingError::UnsupportedLevel(other.to_string())),
    }
}

fn start_logger(level: &'static str, log_dir: &Path) -> Result<ActiveLogger, LoggingError> {
    std::fs::create_dir_all(log_dir).map_err(|source| LoggingError::CreateDir {
        path: log_dir.to_path_buf(),
        source,
    })?;

    let handle = Logger::try_with_str(level)?
        .log_to_file(
            FileSpec::default()
                .directory(log_dir)
                .basename(LOG_FILE_BASENAME),
        )
        .rotate(
            Criterion::Size(MAX_LOG_FILE_SIZE_BYTES),
            Naming::Numbers,
            Cleanup::KeepLogFiles(MAX_LOG_FILES),
        )
        .write_mode(WriteMode::BufferAndFlush)
        .append()
        .format_for_files(flexi_logger::detailed_format)
        .start()?;

    install_panic_hook();

    info!(
        "event=logging_init module=logging status=ok level={} log_dir={} version={}",
        level,
        log_dir.display(),
        env!("CARGO_PKG_VERSION")
    );

    Ok(ActiveLogger {
        level,
        log_dir: log_dir.to_path_buf(),
        _handle: handle,
    })
}

fn install_panic_hook() {
    if PANIC_HOOK.set(()).is_err() {
        return;
    }

    let previous = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let location = info
            .location()
            .map(|loc| format!("{}:{}", loc.file(), loc.line()))
            .unwrap_or_else(|| "unknown".to_string());
        let payload = info
            .payload()
            .downcast_ref::<&str>()
            .map(|message| (*message).to_string())
            .or_else(|| info.payload().downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "non-string panic payload".to_string());
        error!(
            "event=panic module=logging status=error location={} payload={}",
            location,
            single_line(&payload, MAX_PANIC_PAYLOAD_CHARS)
        );
        previous(info);
    }));
}

/// Flattens a message onto one line and caps its length.
fn single_line(value: &str, max_chars: usize) -> String {
    let flat = value.replace(['\n', '\r'], " ");
    let mut capped: String = flat.chars().take(max_chars).collect();
    if flat.chars().count() > max_chars {
        capped.push_str("...");
    }
    capped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn levels_normalize_case_and_aliases() {
        assert_eq!(normalize_level("INFO").unwrap(), "info");
        assert_eq!(normalize_level(" warning ").unwrap(), "warn");
        assert!(matches!(
            normalize_level("loud"),
            Err(LoggingError::UnsupportedLevel(_))
        ));
    }

    #[test]
    fn relative_directory_is_rejected() {
        assert!(matches!(
            init_logging("info", "logs/dev"),
            Err(LoggingError::RelativeDir(_))
        ));
    }

    #[test]
    fn single_line_strips_breaks_and_caps() {
        let flat = single_line("line1\nline2\rline3", 8);
        assert!(!flat.contains('\n'));
        assert!(!flat.contains('\r'));
        assert!(flat.ends_with("..."));
    }

    #[test]
    fn config_without_log_dir_leaves_logging_off() {
        let config = VaultConfig::default();
        assert!(!init_from_config(&config).unwrap());
    }

    #[test]
    fn reinit_is_idempotent_and_conflicts_are_rejected() {
        let first = tempfile::tempdir().unwrap();
        let second = tempfile::tempdir().unwrap();

        init_logging("info", first.path()).unwrap();
        init_logging("info", first.path()).unwrap();

        assert!(matches!(
            init_logging("debug", first.path()),
            Err(LoggingError::Conflict { .. })
        ));
        assert!(matches!(
            init_logging("info", second.path()),
            Err(LoggingError::Conflict { .. })
        ));

        let (level, dir) = logging_status().unwrap();
        assert_eq!(level, "info");
        assert_eq!(dir, first.path());
    }
}
