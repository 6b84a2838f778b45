use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// File picked up from the working directory when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "vrckit.toml";

/// Settings shared by every stage. Built once in `main` and passed down by
/// reference; stages never mutate it.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    pub data_dir: PathBuf,
    /// Defaults to `<data_dir>/input` when unset.
    pub input_dir: Option<PathBuf>,
    /// Defaults to `<data_dir>/output` when unset.
    pub output_dir: Option<PathBuf>,

    pub frame_prefix: String,
    pub frame_extension: String,

    pub blur_strength: i32,
    /// Haar cascade XML; falls back to `VRCKIT_HAAR_CASCADE`, then OpenCV's data dir.
    pub haar_cascade: Option<PathBuf>,

    pub perspective_width: u32,
    pub perspective_height: u32,
    pub horizontal_fov: u32,
    pub vertical_fov: u32,
    pub overwrite: bool,
    pub ring_step_deg: u32,

    pub ffmpeg_bin: String,
    pub ffprobe_bin: String,
    pub ffmpeg_loglevel: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            input_dir: None,
            output_dir: None,
            frame_prefix: "frame".to_string(),
            frame_extension: "jpg".to_string(),
            blur_strength: 51,
            haar_cascade: None,
            perspective_width: 1024,
            perspective_height: 1024,
            horizontal_fov: 90,
            vertical_fov: 90,
            overwrite: true,
            ring_step_deg: 30,
            ffmpeg_bin: "ffmpeg".to_string(),
            ffprobe_bin: "ffprobe".to_string(),
            ffmpeg_loglevel: "error".to_string(),
        }
    }
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        toml::from_str(&text)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    /// Explicit path must exist; otherwise `vrckit.toml` is used when present.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            if !path.is_file() {
                bail!("Config file not found: {}", path.display());
            }
            return Self::from_file(path);
        }

        let fallback = Path::new(DEFAULT_CONFIG_FILE);
        if fallback.is_file() {
            tracing::debug!(path = %fallback.display(), "loading config");
            return Self::from_file(fallback);
        }
        Ok(Self::default())
    }

    pub fn input_dir(&self) -> PathBuf {
        self.input_dir
            .clone()
            .unwrap_or_else(|| self.data_dir.join("input"))
    }

    pub fn output_dir(&self) -> PathBuf {
        self.output_dir
            .clone()
            .unwrap_or_else(|| self.data_dir.join("output"))
    }
}
