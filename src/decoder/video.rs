use anyhow::{anyhow, Result};
use opencv::{core, imgproc, prelude::*, videoio};
use std::path::Path;

use super::{FrameData, FrameSource, VideoInfo};

/// OpenCV `VideoCapture` reader. The backend is whatever `CAP_ANY` picks
/// (AVFoundation, Media Foundation, FFmpeg or GStreamer).
pub struct OpencvSource {
    capture: videoio::VideoCapture,
    info: VideoInfo,
}

impl OpencvSource {
    pub fn open(path: &Path) -> Result<Self> {
        let path_str = path
            .to_str()
            .ok_or_else(|| anyhow!("Video path is not valid UTF-8: {}", path.display()))?;

        let mut capture = videoio::VideoCapture::from_file(path_str, videoio::CAP_ANY)?;
        let _ = capture.set(
            videoio::CAP_PROP_HW_ACCELERATION,
            videoio::VIDEO_ACCELERATION_ANY as f64,
        );

        if !capture.is_opened()? {
            return Err(anyhow!("Failed to open video file: {}", path.display()));
        }

        let info = VideoInfo {
            fps: capture.get(videoio::CAP_PROP_FPS)?,
            frame_count: capture.get(videoio::CAP_PROP_FRAME_COUNT)?.max(0.0) as u64,
            width: capture.get(videoio::CAP_PROP_FRAME_WIDTH)? as u32,
            height: capture.get(videoio::CAP_PROP_FRAME_HEIGHT)? as u32,
        };
        tracing::debug!(?info, "OpenCV VideoCapture opened");

        Ok(Self { capture, info })
    }

    fn read_rgb(&mut self) -> Result<Option<FrameData>> {
        let mut frame = Mat::default();
        if !self.capture.read(&mut frame)? || frame.empty() {
            return Ok(None);
        }

        let mut rgb = Mat::default();
        imgproc::cvt_color(
            &frame,
            &mut rgb,
            imgproc::COLOR_BGR2RGB,
            0,
            core::AlgorithmHint::ALGO_HINT_DEFAULT,
        )?;
        if !rgb.is_continuous() {
            return Err(anyhow!("Frame data is not continuous"));
        }

        Ok(Some(FrameData::new(
            rgb.data_bytes()?.to_vec(),
            rgb.cols() as u32,
            rgb.rows() as u32,
        )))
    }
}

impl FrameSource for OpencvSource {
    fn info(&self) -> VideoInfo {
        self.info
    }

    fn next_frame(&mut self) -> Option<FrameData> {
        match self.read_rgb() {
            Ok(frame) => frame,
            Err(e) => {
                tracing::debug!(error = %e, "frame read failed, treating as end of stream");
                None
            }
        }
    }
}
