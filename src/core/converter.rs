use anyhow::{bail, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::config::Config;
use crate::core::directions::Preset;
use crate::core::session::{SessionLayout, SessionName};
use crate::utils::{file_utils, platform};

/// Frame formats the converter picks up.
pub const INPUT_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

/// Runs one external conversion. Implemented by the real ffmpeg runner and
/// by test doubles.
pub trait ToolRunner {
    fn run(&mut self, args: &[OsString]) -> Result<()>;
}

pub struct FfmpegRunner {
    bin: String,
}

impl FfmpegRunner {
    pub fn new(config: &Config) -> Self {
        Self {
            bin: config.ffmpeg_bin.clone(),
        }
    }
}

impl ToolRunner for FfmpegRunner {
    fn run(&mut self, args: &[OsString]) -> Result<()> {
        let status = Command::new(&self.bin)
            .args(args)
            .stdin(Stdio::null())
            .status()
            .with_context(|| format!("failed to run {}", self.bin))?;
        if !status.success() {
            bail!("{} exited with {}", self.bin, status);
        }
        Ok(())
    }
}

/// Argument list producing one still in `output` for direction `index`.
pub fn build_args(
    config: &Config,
    preset: &Preset,
    index: usize,
    input: &Path,
    output: &Path,
) -> Vec<OsString> {
    let filter = preset.directions[index].v360_filter(config);
    vec![
        OsString::from(if config.overwrite { "-y" } else { "-n" }),
        OsString::from("-loglevel"),
        OsString::from(&config.ffmpeg_loglevel),
        OsString::from("-i"),
        input.as_os_str().to_owned(),
        OsString::from("-vf"),
        OsString::from(filter),
        OsString::from("-frames:v"),
        OsString::from("1"),
        output.as_os_str().to_owned(),
    ]
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConvertSummary {
    pub images: usize,
    pub directions: usize,
    pub written: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Converts every frame of `session` into one flat view per preset
/// direction, written next to `temp/`. A failed invocation is logged and
/// the loop moves on.
pub fn convert_session(
    config: &Config,
    session: &SessionName,
    preset: &Preset,
    runner: &mut dyn ToolRunner,
) -> Result<ConvertSummary> {
    let layout = SessionLayout::new(&config.output_dir(), session);
    let input_dir = layout.frames_dir();
    let output_dir = layout.root.clone();

    println!("input_dir : {}", input_dir.display());
    println!("output_dir: {}", output_dir.display());
    if !input_dir.is_dir() {
        bail!("Input folder not found: {}", input_dir.display());
    }
    fs::create_dir_all(&output_dir)
        .with_context(|| format!("Failed to create {}", output_dir.display()))?;

    let images = file_utils::list_files_with_extensions(&input_dir, INPUT_EXTENSIONS)?;
    if images.is_empty() {
        bail!("No input images found in {}", input_dir.display());
    }

    println!("[info] directions: {}  preset: {}", preset.len(), preset.name);
    convert_images(config, &images, &output_dir, preset, runner)
}

pub fn convert_images(
    config: &Config,
    images: &[PathBuf],
    output_dir: &Path,
    preset: &Preset,
    runner: &mut dyn ToolRunner,
) -> Result<ConvertSummary> {
    let mut summary = ConvertSummary {
        images: images.len(),
        directions: preset.len(),
        ..ConvertSummary::default()
    };

    let pb = ProgressBar::new((images.len() * preset.len()) as u64);
    pb.set_style(ProgressStyle::with_template(
        "[{elapsed_precise}] {wide_bar} {pos}/{len} {msg}",
    )?);

    for image in images {
        let base = file_utils::file_stem_string(image);
        pb.set_message(base.clone());

        for index in 0..preset.len() {
            let out_name = preset.output_file_name(&base, index);
            let out_path = output_dir.join(&out_name);

            if !config.overwrite && out_path.exists() {
                tracing::debug!(file = %out_name, "skip existing");
                summary.skipped += 1;
                pb.inc(1);
                continue;
            }

            let args = build_args(config, preset, index, image, &out_path);
            match runner.run(&args) {
                Ok(()) => {
                    tracing::debug!(file = %out_name, "written");
                    summary.written += 1;
                }
                Err(e) => {
                    pb.suspend(|| tracing::warn!(file = %out_name, error = %e, "conversion failed"));
                    summary.failed += 1;
                }
            }
            pb.inc(1);
        }
    }
    pb.finish_and_clear();

    println!(
        "✅ Conversion finished: {} written, {} skipped, {} failed",
        summary.written, summary.skipped, summary.failed
    );
    Ok(summary)
}

/// Checks the ffmpeg binary before a long conversion starts.
pub fn ensure_ffmpeg(config: &Config) -> Result<()> {
    if !platform::tool_available(&config.ffmpeg_bin) {
        bail!(
            "{} not found. Install ffmpeg or add it to PATH.",
            config.ffmpeg_bin
        );
    }
    Ok(())
}

pub fn convert_with_ffmpeg(
    config: &Config,
    session: &SessionName,
    preset: &Preset,
) -> Result<ConvertSummary> {
    ensure_ffmpeg(config)?;
    let mut runner = FfmpegRunner::new(config);
    convert_session(config, session, preset, &mut runner)
}
