use anyhow::{bail, Context, Result};
use chrono::Local;
use std::fs;
use std::path::{Path, PathBuf};

use crate::core::session::{format_duration, SessionLayout, SessionName};
use crate::decoder::FrameSource;
use crate::utils::file_utils;

#[derive(Debug, Clone)]
pub struct ExtractOptions {
    pub prefix: String,
    pub extension: String,
    /// Keep every n-th frame; 1 keeps all.
    pub interval: u64,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self {
            prefix: "frame".to_string(),
            extension: "jpg".to_string(),
            interval: 1,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ExtractSummary {
    pub session: SessionName,
    pub session_dir: PathBuf,
    pub frames_dir: PathBuf,
    pub saved: u64,
}

pub fn frame_file_name(prefix: &str, index: u64, extension: &str) -> String {
    format!("{prefix}_{index:06}.{extension}")
}

/// Reads `source` to the end, writing every kept frame into a fresh session
/// folder under `output_root`. One frame is in flight at a time.
pub fn extract_frames(
    source: &mut dyn FrameSource,
    video_path: &Path,
    output_root: &Path,
    options: &ExtractOptions,
) -> Result<ExtractSummary> {
    if options.interval == 0 {
        bail!("Frame interval must be at least 1");
    }

    let info = source.info();
    let stem = file_utils::file_stem_string(video_path);
    let duration = format_duration(info.frame_count, info.fps);
    let expected = info.frame_count.div_ceil(options.interval);
    let session = SessionName::for_video(&stem, expected, options.interval, duration, Local::now());

    let layout = SessionLayout::new(output_root, &session);
    let frames_dir = layout.frames_dir();
    fs::create_dir_all(&frames_dir)
        .with_context(|| format!("Failed to create {}", frames_dir.display()))?;

    println!("🎞️  Video info:");
    println!("  - FPS: {}", info.fps);
    println!("  - Total frames: {}", info.frame_count);
    println!("  - Resolution: {}x{}", info.width, info.height);
    println!("  - Duration: {}min {}sec", duration.0, duration.1);
    if options.interval > 1 {
        println!("  - Interval: every {} frames", options.interval);
    }
    println!("  - Output folder: {}", session);
    tracing::info!(session = %session, video = %video_path.display(), "extracting frames");

    let mut frame_index = 0u64;
    let mut saved = 0u64;

    while let Some(frame) = source.next_frame() {
        if frame_index % options.interval == 0 {
            let name = frame_file_name(&options.prefix, saved, &options.extension);
            let path = frames_dir.join(&name);
            let image = frame
                .into_rgb_image()
                .with_context(|| format!("Frame {frame_index} has an unexpected buffer size"))?;
            image
                .save(&path)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            saved += 1;

            if saved % 100 == 0 {
                println!("  Processing: {}/{} frames", saved, expected);
            }
        }
        frame_index += 1;
    }

    println!("✅ Saved {} frames to {}", saved, frames_dir.display());
    tracing::info!(saved, "extraction finished");

    Ok(ExtractSummary {
        session,
        session_dir: layout.root,
        frames_dir,
        saved,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::{FrameData, VideoInfo};

    struct SyntheticSource {
        info: VideoInfo,
        remaining: u64,
    }

    impl SyntheticSource {
        fn new(frames: u64, fps: f64) -> Self {
            Self {
                info: VideoInfo {
                    fps,
                    frame_count: frames,
                    width: 8,
                    height: 4,
                },
                remaining: frames,
            }
        }
    }

    impl FrameSource for SyntheticSource {
        fn info(&self) -> VideoInfo {
            self.info
        }

        fn next_frame(&mut self) -> Option<FrameData> {
            if self.remaining == 0 {
                return None;
            }
            self.remaining -= 1;
            let shade = (self.remaining % 255) as u8;
            Some(FrameData::new(vec![shade; 8 * 4 * 3], 8, 4))
        }
    }

    fn sorted_names(dir: &Path) -> Vec<String> {
        let mut names: Vec<String> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        names.sort();
        names
    }

    #[test]
    fn writes_one_file_per_frame_with_padded_names() {
        let out = tempfile::tempdir().unwrap();
        let mut source = SyntheticSource::new(5, 30.0);
        let summary = extract_frames(
            &mut source,
            Path::new("/videos/clip.mp4"),
            out.path(),
            &ExtractOptions::default(),
        )
        .unwrap();

        assert_eq!(summary.saved, 5);
        assert!(summary.session.as_str().starts_with("clip_5frames_0min0sec_"));
        assert_eq!(summary.frames_dir, summary.session_dir.join("temp").join("frames"));
        assert_eq!(
            sorted_names(&summary.frames_dir),
            vec![
                "frame_000000.jpg",
                "frame_000001.jpg",
                "frame_000002.jpg",
                "frame_000003.jpg",
                "frame_000004.jpg"
            ]
        );
    }

    #[test]
    fn interval_keeps_every_nth_frame_numbered_by_saved_count() {
        let out = tempfile::tempdir().unwrap();
        let mut source = SyntheticSource::new(7, 0.0);
        let options = ExtractOptions {
            prefix: "f".to_string(),
            extension: "png".to_string(),
            interval: 3,
        };
        let summary =
            extract_frames(&mut source, Path::new("v.mov"), out.path(), &options).unwrap();

        assert_eq!(summary.saved, 3);
        assert!(summary
            .session
            .as_str()
            .starts_with("v_3frames_interval3_0min0sec_"));
        assert_eq!(
            sorted_names(&summary.frames_dir),
            vec!["f_000000.png", "f_000001.png", "f_000002.png"]
        );
    }

    #[test]
    fn early_end_of_stream_still_succeeds() {
        let out = tempfile::tempdir().unwrap();
        let mut source = SyntheticSource::new(10, 30.0);
        source.remaining = 2;
        let summary = extract_frames(
            &mut source,
            Path::new("short.mp4"),
            out.path(),
            &ExtractOptions::default(),
        )
        .unwrap();
        assert_eq!(summary.saved, 2);
    }

    #[test]
    fn zero_interval_is_rejected() {
        let out = tempfile::tempdir().unwrap();
        let mut source = SyntheticSource::new(1, 30.0);
        let options = ExtractOptions {
            interval: 0,
            ..ExtractOptions::default()
        };
        assert!(extract_frames(&mut source, Path::new("a.mp4"), out.path(), &options).is_err());
    }
}
