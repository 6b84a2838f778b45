use anyhow::{bail, Result};
use image::{imageops, DynamicImage, GrayImage, ImageBuffer, Pixel};
use std::path::{Path, PathBuf};

use crate::utils::file_utils;

/// Extensions the blur stage will touch.
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "bmp", "tiff", "webp"];

/// Axis-aligned face box in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FaceRect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl FaceRect {
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self { x, y, width, height }
    }

    /// Intersection with a `w x h` image as `(x, y, w, h)`; `None` if empty.
    fn clamp_to(&self, w: u32, h: u32) -> Option<(u32, u32, u32, u32)> {
        let x0 = self.x.max(0) as i64;
        let y0 = self.y.max(0) as i64;
        let x1 = (self.x as i64 + self.width as i64).min(w as i64);
        let y1 = (self.y as i64 + self.height as i64).min(h as i64);
        if x1 <= x0 || y1 <= y0 {
            return None;
        }
        Some((x0 as u32, y0 as u32, (x1 - x0) as u32, (y1 - y0) as u32))
    }
}

/// Face detector over a single-channel image.
pub trait FaceDetector {
    fn detect(&mut self, gray: &GrayImage) -> Result<Vec<FaceRect>>;
}

/// Nearest odd value >= `strength` (at least 1).
pub fn coerce_odd(strength: i32) -> u32 {
    let s = strength.max(1) as u32;
    if s % 2 == 0 {
        s + 1
    } else {
        s
    }
}

/// Sigma OpenCV derives for a Gaussian kernel of size `k` when sigma is 0.
pub fn kernel_sigma(k: u32) -> f32 {
    0.3 * ((k as f32 - 1.0) * 0.5 - 1.0) + 0.8
}

fn blur_regions<P>(
    img: &mut ImageBuffer<P, Vec<u8>>,
    faces: &[FaceRect],
    kernel: u32,
) where
    P: Pixel<Subpixel = u8> + 'static,
{
    let sigma = kernel_sigma(kernel);
    let (w, h) = img.dimensions();
    for face in faces {
        let Some((x, y, fw, fh)) = face.clamp_to(w, h) else {
            continue;
        };
        let region = imageops::crop_imm(&*img, x, y, fw, fh).to_image();
        let blurred = imageops::blur(&region, sigma);
        imageops::replace(img, &blurred, x as i64, y as i64);
    }
}

/// Blurs every face box in `image`, keeping its pixel format where it can.
pub fn blur_image(image: DynamicImage, faces: &[FaceRect], kernel: u32) -> DynamicImage {
    match image {
        DynamicImage::ImageRgb8(mut buf) => {
            blur_regions(&mut buf, faces, kernel);
            DynamicImage::ImageRgb8(buf)
        }
        DynamicImage::ImageRgba8(mut buf) => {
            blur_regions(&mut buf, faces, kernel);
            DynamicImage::ImageRgba8(buf)
        }
        DynamicImage::ImageLuma8(mut buf) => {
            blur_regions(&mut buf, faces, kernel);
            DynamicImage::ImageLuma8(buf)
        }
        other => {
            let mut buf = other.to_rgb8();
            blur_regions(&mut buf, faces, kernel);
            DynamicImage::ImageRgb8(buf)
        }
    }
}

/// Detects faces in the image at `path` and overwrites it with the faces
/// blurred. An unreadable image is left alone and counts as zero faces.
pub fn blur_faces(path: &Path, detector: &mut dyn FaceDetector, strength: i32) -> Result<usize> {
    let image = match image::open(path) {
        Ok(img) => img,
        Err(e) => {
            tracing::warn!(image = %path.display(), error = %e, "could not read image");
            return Ok(0);
        }
    };

    let gray = image.to_luma8();
    let faces = detector.detect(&gray)?;
    let kernel = coerce_odd(strength);

    let blurred = blur_image(image, &faces, kernel);
    blurred.save(path)?;
    Ok(faces.len())
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlurSummary {
    pub processed: usize,
    pub faces: usize,
}

pub fn list_images(dir: &Path) -> Result<Vec<PathBuf>> {
    file_utils::list_files_with_extensions(dir, IMAGE_EXTENSIONS)
}

/// Blurs faces in every image of `dir`, in name order, in place.
pub fn process_folder(
    dir: &Path,
    detector: &mut dyn FaceDetector,
    strength: i32,
) -> Result<BlurSummary> {
    if !dir.is_dir() {
        bail!("Folder not found: {}", dir.display());
    }
    let images = list_images(dir)?;
    if images.is_empty() {
        bail!("No image files found in {}", dir.display());
    }

    println!("Targets: {} images", images.len());
    println!("Output: {} (overwrite)", dir.display());
    println!("Blur strength: {}", coerce_odd(strength));

    let mut summary = BlurSummary::default();
    let total = images.len();
    for (i, path) in images.iter().enumerate() {
        let faces = blur_faces(path, detector, strength)?;
        summary.processed += 1;
        summary.faces += faces;

        let name = path.file_name().unwrap_or_default().to_string_lossy();
        println!("[{}/{}] {}: {} faces", i + 1, total, name, faces);
    }

    tracing::info!(
        processed = summary.processed,
        faces = summary.faces,
        dir = %dir.display(),
        "face blur finished"
    );
    Ok(summary)
}
