use std::path::{Path, PathBuf};

use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::error::Result;

const DEFAULT_FILTER: &str = "info";
const LOG_FILE_PREFIX: &str = "artifact_relay";

pub struct FileLogger {
    log_directory: PathBuf,
    rotation: Rotation,
}

impl FileLogger {
    pub fn new(log_directory: impl AsRef<Path>) -> Self {
        Self {
            log_directory: log_directory.as_ref().to_path_buf(),
            rotation: Rotation::DAILY,
        }
    }

    pub fn with_rotation(mut self, rotation: Rotation) -> Self {
        self.rotation = rotation;
        self
    }

    /// Creates the log directory and a non-blocking rolling file writer.
    /// Logs stop being flushed once the returned guard is dropped.
    pub fn setup_file_logging(&self) -> Result<(NonBlocking, WorkerGuard)> {
        std::fs::create_dir_all(&self.log_directory)?;

        let file_appender =
            RollingFileAppender::new(self.rotation.clone(), &self.log_directory, LOG_FILE_PREFIX);

        Ok(tracing_appender::non_blocking(file_appender))
    }
}

/// Console logging, plus rolling file output when a logger is given.
/// Filtering follows `RUST_LOG` and defaults to `info`.
pub fn setup_logging(file_logger: Option<&FileLogger>) -> Result<Option<WorkerGuard>> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let (file_layer, guard) = match file_logger {
        Some(logger) => {
            let (writer, guard) = logger.setup_file_logging()?;
            let layer = tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .with(file_layer)
        .init();

    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn file_logger_creates_directory() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("logs");
        let logger = FileLogger::new(&dir).with_rotation(Rotation::NEVER);

        let (mut writer, guard) = logger.setup_file_logging().unwrap();
        writer.write_all(b"hello\n").unwrap();
        drop(guard);

        assert!(dir.is_dir());
        let written = std::fs::read_to_string(dir.join(LOG_FILE_PREFIX)).unwrap();
        assert_eq!(written, "hello\n");
    }
}
