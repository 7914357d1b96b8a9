//! Logging setup for sqlab.
//!
//! The terminal UI owns stdout, so the interactive session writes its trace
//! to a file. `RUST_LOG` overrides the configured level, e.g.
//! `RUST_LOG=sqlab_core=debug`.

use std::fs::OpenOptions;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};

use thiserror::Error;
use tracing_subscriber::EnvFilter;

use crate::settings::LogSettings;

static LOGGING_INITIALIZED: OnceLock<()> = OnceLock::new();

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogTarget {
    File(PathBuf),
    Stderr,
}

#[derive(Debug, Error)]
pub enum LogError {
    #[error("logging already initialized")]
    AlreadyInitialized,
    #[error("invalid log level `{0}`")]
    InvalidLevel(String),
    #[error("failed to open log file at {path}: {source}")]
    FileOpen {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to install global subscriber: {0}")]
    Install(String),
}

/// Installs the global subscriber. A second call fails with
/// [`LogError::AlreadyInitialized`].
pub fn init_logging(settings: &LogSettings, target: &LogTarget) -> Result<(), LogError> {
    if LOGGING_INITIALIZED.get().is_some() {
        return Err(LogError::AlreadyInitialized);
    }

    let filter = build_filter(&settings.level)?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    let installed = match target {
        LogTarget::Stderr => builder.with_writer(io::stderr).try_init(),
        LogTarget::File(path) => {
            let file = open_log_file(path)?;
            builder
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init()
        }
    };
    installed.map_err(|error| LogError::Install(error.to_string()))?;
    let _ = LOGGING_INITIALIZED.set(());

    tracing::info!(level = %settings.level, log_target = ?target, "logging initialized");
    Ok(())
}

#[must_use]
pub fn is_logging_initialized() -> bool {
    LOGGING_INITIALIZED.get().is_some()
}

fn build_filter(level: &str) -> Result<EnvFilter, LogError> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(level).map_err(|_| LogError::InvalidLevel(level.to_string()))
}

fn open_log_file(path: &Path) -> Result<std::fs::File, LogError> {
    if let Some(parent) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|source| LogError::FileOpen {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|source| LogError::FileOpen {
            path: path.to_path_buf(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::{build_filter, open_log_file, LogError};

    #[test]
    fn rejects_malformed_level_directives() {
        if std::env::var_os("RUST_LOG").is_some() {
            return;
        }
        assert!(build_filter("debug").is_ok());
        assert!(build_filter("sqlab_core=trace,warn").is_ok());
        assert!(matches!(
            build_filter("sqlab_core=loud"),
            Err(LogError::InvalidLevel(_))
        ));
    }

    #[test]
    fn log_file_parent_directories_are_created() {
        let temp_dir = TempDir::new().expect("failed to create temp directory");
        let path = temp_dir.path().join("logs").join("sqlab.log");

        open_log_file(&path).expect("log file should open");
        assert!(path.exists());
    }
}
