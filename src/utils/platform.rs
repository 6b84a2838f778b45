use serde::Serialize;
use std::process::{Command, Stdio};

use crate::config::Config;

/// True when `bin -version` runs and exits successfully.
pub fn tool_available(bin: &str) -> bool {
    Command::new(bin)
        .arg("-version")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

#[derive(Debug, Serialize)]
pub struct PlatformInfo {
    pub os: &'static str,
    pub arch: &'static str,
    pub version: &'static str,
    pub ffmpeg: bool,
    pub ffprobe: bool,
    pub opencv: bool,
    /// Configured cascade file, if any.
    pub haar_cascade: Option<String>,
    pub input_dir: String,
    pub output_dir: String,
}

impl PlatformInfo {
    pub fn detect(config: &Config) -> Self {
        Self {
            os: std::env::consts::OS,
            arch: std::env::consts::ARCH,
            version: env!("CARGO_PKG_VERSION"),
            ffmpeg: tool_available(&config.ffmpeg_bin),
            ffprobe: tool_available(&config.ffprobe_bin),
            opencv: cfg!(feature = "opencv"),
            haar_cascade: config
                .haar_cascade
                .as_ref()
                .map(|p| p.display().to_string()),
            input_dir: config.input_dir().display().to_string(),
            output_dir: config.output_dir().display().to_string(),
        }
    }
}
