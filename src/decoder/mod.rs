pub mod ffmpeg;
pub mod frame_data;
#[cfg(feature = "opencv")]
pub mod video;

pub use frame_data::FrameData;

/// Stream properties as reported by the container.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VideoInfo {
    pub fps: f64,
    pub frame_count: u64,
    pub width: u32,
    pub height: u32,
}

/// Sequential frame reader. `next_frame` yields `None` at end of stream and
/// also when a frame cannot be read; callers treat both as "done".
pub trait FrameSource {
    fn info(&self) -> VideoInfo;
    fn next_frame(&mut self) -> Option<FrameData>;
}
