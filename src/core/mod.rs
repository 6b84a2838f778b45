pub mod converter;
pub mod directions;
pub mod extractor;
pub mod face_blur;
#[cfg(feature = "opencv")]
pub mod haar;
pub mod pipeline;
pub mod session;
