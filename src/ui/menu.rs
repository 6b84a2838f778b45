use anyhow::{bail, Result};
use dialoguer::{theme::ColorfulTheme, Confirm, Select};
use std::path::PathBuf;

use crate::config::Config;
use crate::core::pipeline;
use crate::utils::file_utils;

pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mkv", "avi", "mov", "webm"];

const RESUME_LABEL: &str = "↩️  Convert the latest session again";

/// Interactive front end: pick a video, answer two questions, run the
/// whole pipeline.
pub fn run_menu(config: &Config) -> Result<()> {
    let input_dir = config.input_dir();
    if !input_dir.is_dir() {
        bail!("Input folder not found: {}", input_dir.display());
    }

    let videos: Vec<PathBuf> = file_utils::list_files_with_extensions(&input_dir, VIDEO_EXTENSIONS)?;
    let latest = pipeline::latest_session_dir(&config.output_dir())?;

    if videos.is_empty() && latest.is_none() {
        eprintln!("❌ No videos in {}", input_dir.display());
        return Ok(());
    }

    let mut items: Vec<String> = videos
        .iter()
        .map(|p| p.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_default())
        .collect();
    if let Some(session) = &latest {
        items.push(format!("{RESUME_LABEL} ({session})"));
    }

    let theme = ColorfulTheme::default();
    let selection = Select::with_theme(&theme)
        .with_prompt("📺 Select a 360° video")
        .default(0)
        .items(&items)
        .interact()?;

    let presets = [
        "rc14 (14 fixed directions)".to_string(),
        format!("dense (rings every {}°)", config.ring_step_deg),
    ];
    let ask_preset = |theme: &ColorfulTheme| -> Result<bool> {
        let choice = Select::with_theme(theme)
            .with_prompt("🧭 Direction preset")
            .default(0)
            .items(&presets)
            .interact()?;
        Ok(choice == 1)
    };

    if selection >= videos.len() {
        // Only reachable when a session exists.
        let Some(session) = latest else {
            return Ok(());
        };
        let dense = ask_preset(&theme)?;
        pipeline::run_convert(config, &session, dense)?;
        return Ok(());
    }

    let blur = Confirm::with_theme(&theme)
        .with_prompt("🙈 Blur faces before converting?")
        .default(false)
        .interact()?;
    let dense = ask_preset(&theme)?;

    let video = videos[selection]
        .file_name()
        .map(PathBuf::from)
        .unwrap_or_else(|| videos[selection].clone());
    let report = pipeline::run_pipeline(config, &video, blur, dense)?;
    println!(
        "🎉 Done: {} frames, {} views in {}",
        report.extracted,
        report.convert.written,
        config.output_dir().join(report.session.as_str()).display()
    );
    Ok(())
}
