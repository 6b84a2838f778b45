use anyhow::{anyhow, bail, Context, Result};
use image::GrayImage;
use opencv::{core, objdetect, prelude::*};
use std::path::{Path, PathBuf};

use crate::core::face_blur::{FaceDetector, FaceRect};

pub const CASCADE_FILE: &str = "haarcascade_frontalface_default.xml";
pub const CASCADE_ENV: &str = "VRCKIT_HAAR_CASCADE";

const SCALE_FACTOR: f64 = 1.1;
const MIN_NEIGHBORS: i32 = 5;
const MIN_SIZE: i32 = 30;

/// Explicit path, then `VRCKIT_HAAR_CASCADE`, then OpenCV's bundled data.
pub fn resolve_cascade(explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return Ok(path.to_path_buf());
    }
    if let Ok(path) = std::env::var(CASCADE_ENV) {
        return Ok(PathBuf::from(path));
    }
    let found = core::find_file(&format!("haarcascades/{CASCADE_FILE}"), false, true)?;
    if found.is_empty() {
        bail!("Could not locate {CASCADE_FILE}; set {CASCADE_ENV} or haar_cascade in the config");
    }
    Ok(PathBuf::from(found))
}

/// OpenCV frontal-face Haar cascade.
pub struct HaarFaceDetector {
    classifier: objdetect::CascadeClassifier,
}

impl HaarFaceDetector {
    pub fn load(path: &Path) -> Result<Self> {
        let path_str = path
            .to_str()
            .ok_or_else(|| anyhow!("Cascade path is not valid UTF-8: {}", path.display()))?;
        let classifier = objdetect::CascadeClassifier::new(path_str)
            .with_context(|| format!("Failed to load cascade {}", path.display()))?;
        if classifier.empty()? {
            bail!("Cascade file is empty or invalid: {}", path.display());
        }
        tracing::debug!(cascade = %path.display(), "Haar cascade loaded");
        Ok(Self { classifier })
    }
}

impl FaceDetector for HaarFaceDetector {
    fn detect(&mut self, gray: &GrayImage) -> Result<Vec<FaceRect>> {
        let (w, h) = gray.dimensions();
        let mat = Mat::new_rows_cols_with_data(h as i32, w as i32, gray.as_raw())?.try_clone()?;

        let mut faces = core::Vector::<core::Rect>::new();
        self.classifier.detect_multi_scale(
            &mat,
            &mut faces,
            SCALE_FACTOR,
            MIN_NEIGHBORS,
            0,
            core::Size::new(MIN_SIZE, MIN_SIZE),
            core::Size::new(0, 0),
        )?;

        Ok(faces
            .iter()
            .map(|r| FaceRect::new(r.x, r.y, r.width, r.height))
            .collect())
    }
}
