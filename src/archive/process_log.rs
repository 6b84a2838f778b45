use chrono::Local;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Append-only, timestamped run log kept next to the files being processed
/// (`process.log`). Lines are mirrored to `tracing`.
pub struct ProcessLog {
    path: PathBuf,
}

impl ProcessLog {
    pub const FILE_NAME: &'static str = "process.log";

    pub fn in_dir(dir: &Path) -> Self {
        Self {
            path: dir.join(Self::FILE_NAME),
        }
    }

    pub fn log(&self, message: &str) {
        tracing::info!("{message}");
        self.append(message);
    }

    pub fn warn(&self, message: &str) {
        tracing::warn!("{message}");
        self.append(message);
    }

    fn append(&self, message: &str) {
        let timestamp = Local::now().format("%Y-%m-%d %H:%M:%S");
        match OpenOptions::new().create(true).append(true).open(&self.path) {
            Ok(mut file) => {
                let _ = writeln!(file, "{timestamp} - {message}");
            }
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "could not write process log");
            }
        }
    }
}
