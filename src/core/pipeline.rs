use anyhow::{bail, Result};
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::core::converter::{self, ConvertSummary};
use crate::core::directions::Preset;
use crate::core::extractor::{self, ExtractOptions, ExtractSummary};
use crate::core::face_blur::{self, BlurSummary, FaceDetector};
use crate::core::session::{SessionLayout, SessionName};
use crate::decoder::FrameSource;

/// Where `video` lives: relative names are taken from the input directory,
/// while absolute paths and paths already under the input directory (as
/// listed by the menu) are kept as they are.
pub fn video_path(input_dir: &Path, video: &Path) -> PathBuf {
    if video.starts_with(input_dir) {
        video.to_path_buf()
    } else {
        input_dir.join(video)
    }
}

pub fn resolve_video(config: &Config, video: &Path) -> Result<PathBuf> {
    let path = video_path(&config.input_dir(), video);
    if !path.is_file() {
        bail!("Video not found: {}", path.display());
    }
    Ok(path)
}

#[cfg(feature = "opencv")]
pub fn open_source(_config: &Config, path: &Path) -> Result<Box<dyn FrameSource>> {
    Ok(Box::new(crate::decoder::video::OpencvSource::open(path)?))
}

#[cfg(not(feature = "opencv"))]
pub fn open_source(config: &Config, path: &Path) -> Result<Box<dyn FrameSource>> {
    Ok(Box::new(crate::decoder::ffmpeg::FfmpegSource::open(config, path)?))
}

#[cfg(feature = "opencv")]
pub fn open_detector(config: &Config) -> Result<Box<dyn FaceDetector>> {
    use crate::core::haar;
    let cascade = haar::resolve_cascade(config.haar_cascade.as_deref())?;
    Ok(Box::new(haar::HaarFaceDetector::load(&cascade)?))
}

#[cfg(not(feature = "opencv"))]
pub fn open_detector(_config: &Config) -> Result<Box<dyn FaceDetector>> {
    bail!("Face detection needs OpenCV; rebuild with `--features opencv`")
}

pub fn run_extract(config: &Config, video: &Path, interval: u64) -> Result<ExtractSummary> {
    let path = resolve_video(config, video)?;
    let mut source = open_source(config, &path)?;
    let options = ExtractOptions {
        prefix: config.frame_prefix.clone(),
        extension: config.frame_extension.clone(),
        interval,
    };
    extractor::extract_frames(source.as_mut(), &path, &config.output_dir(), &options)
}

pub fn run_blur(config: &Config, session: &SessionName, strength: i32) -> Result<BlurSummary> {
    let frames_dir = SessionLayout::new(&config.output_dir(), session).frames_dir();
    if !frames_dir.is_dir() {
        bail!(
            "{} not found; run `extract` first",
            frames_dir.display()
        );
    }
    let mut detector = open_detector(config)?;
    face_blur::process_folder(&frames_dir, detector.as_mut(), strength)
}

pub fn run_convert(config: &Config, session: &SessionName, dense: bool) -> Result<ConvertSummary> {
    let preset = Preset::select(dense, config.ring_step_deg)?;
    converter::convert_with_ffmpeg(config, session, &preset)
}

/// The three stages, so the chaining can be exercised without ffmpeg or OpenCV.
pub trait Stages {
    fn extract(&mut self, video: &Path) -> Result<ExtractSummary>;
    fn blur(&mut self, session: &SessionName) -> Result<BlurSummary>;
    fn convert(&mut self, session: &SessionName, dense: bool) -> Result<ConvertSummary>;
}

pub struct LiveStages<'a> {
    pub config: &'a Config,
}

impl Stages for LiveStages<'_> {
    fn extract(&mut self, video: &Path) -> Result<ExtractSummary> {
        run_extract(self.config, video, 1)
    }

    fn blur(&mut self, session: &SessionName) -> Result<BlurSummary> {
        run_blur(self.config, session, self.config.blur_strength)
    }

    fn convert(&mut self, session: &SessionName, dense: bool) -> Result<ConvertSummary> {
        run_convert(self.config, session, dense)
    }
}

#[derive(Debug, Clone)]
pub struct PipelineReport {
    pub session: SessionName,
    pub extracted: u64,
    pub blur: Option<BlurSummary>,
    pub convert: ConvertSummary,
}

/// extract -> (blur) -> convert. The session produced by the extractor is
/// carried forward directly; a blur failure only skips that stage.
pub fn run_pipeline_with(
    stages: &mut dyn Stages,
    video: &Path,
    blur: bool,
    dense: bool,
) -> Result<PipelineReport> {
    let extracted = stages.extract(video)?;
    let session = extracted.session.clone();
    println!("📁 Session folder: {}\n", session);

    let blur_summary = if blur {
        match stages.blur(&session) {
            Ok(summary) => Some(summary),
            Err(e) => {
                tracing::warn!(error = %e, "face blur skipped");
                println!("⚠️  Face blur was skipped\n");
                None
            }
        }
    } else {
        None
    };

    let convert = stages.convert(&session, dense)?;

    Ok(PipelineReport {
        session,
        extracted: extracted.saved,
        blur: blur_summary,
        convert,
    })
}

pub fn run_pipeline(config: &Config, video: &Path, blur: bool, dense: bool) -> Result<PipelineReport> {
    run_pipeline_with(&mut LiveStages { config }, video, blur, dense)
}

/// Lexicographically last directory under `output_root` whose name is a
/// valid session. Racy: a concurrent run or a pre-existing folder that
/// sorts later is picked instead. Only the interactive "resume" entry uses it.
pub fn latest_session_dir(output_root: &Path) -> Result<Option<SessionName>> {
    if !output_root.is_dir() {
        return Ok(None);
    }
    let mut names = Vec::new();
    for entry in fs::read_dir(output_root)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        if let Ok(name) = SessionName::parse(&entry.file_name().to_string_lossy()) {
            names.push(name);
        }
    }
    names.sort();
    Ok(names.pop())
}
