//! Imaging pipeline: bitmap type, PNG I/O, normalization, pixel comparison

pub mod compare;
pub mod normalize;

pub use compare::{compare, mismatch_percentage};
pub use normalize::normalize;

use std::path::Path;

use crate::{Error, Result};

/// An RGBA bitmap in row-major order.
///
/// Invariant: `pixels.len() == width * height * 4`. Bitmaps are immutable
/// once built; normalization and comparison produce new values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bitmap {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl Bitmap {
    /// Create a zero-filled (transparent black) bitmap
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixels: vec![0; width as usize * height as usize * 4],
        }
    }

    /// Build a bitmap from an existing RGBA buffer
    pub fn from_raw(width: u32, height: u32, pixels: Vec<u8>) -> Result<Self> {
        if pixels.len() != width as usize * height as usize * 4 {
            return Err(Error::Decode(format!(
                "RGBA buffer length {} does not match {}x{}",
                pixels.len(),
                width,
                height
            )));
        }
        Ok(Self { width, height, pixels })
    }

    /// Decode a PNG file into an RGBA bitmap
    pub fn from_png_file(path: &Path) -> Result<Self> {
        let decoded = image::open(path)
            .map_err(|e| Error::Decode(format!("Failed to decode {}: {}", path.display(), e)))?;
        let rgba = decoded.to_rgba8();
        let (width, height) = (rgba.width(), rgba.height());
        Ok(Self {
            width,
            height,
            pixels: rgba.into_raw(),
        })
    }

    /// Encode the bitmap as a PNG file
    pub fn write_png_file(&self, path: &Path) -> Result<()> {
        image::save_buffer_with_format(
            path,
            &self.pixels,
            self.width,
            self.height,
            image::ExtendedColorType::Rgba8,
            image::ImageFormat::Png,
        )
        .map_err(|e| Error::Decode(format!("Failed to encode {}: {}", path.display(), e)))
    }
}

/// Refuse to decode screenshot files beyond this many bytes by default (10 MB)
pub const DEFAULT_MAX_FILE_SIZE: u64 = 10 * 1024 * 1024;

/// Inputs larger than this in either axis are downscaled before comparison
pub const DEFAULT_MAX_DIMENSION: u32 = 5000;

/// Tuning knobs for the pixel comparison stage
#[derive(Debug, Clone)]
pub struct CompareOptions {
    /// Perceptual color-distance threshold in [0, 1]
    pub threshold: f64,
    /// Rows per processing strip
    pub chunk_rows: u32,
    /// When enabled, pixels classified as anti-aliasing artifacts are not
    /// counted as mismatches
    pub aa_tolerance: bool,
    /// Opacity applied when dimming matched pixels into the diff bitmap
    pub dim_alpha: f64,
    /// Color for mismatched pixels
    pub diff_color: [u8; 3],
    /// Color for mismatched pixels that got lighter rather than darker
    pub diff_color_alt: Option<[u8; 3]>,
    /// Maximum width/height before an input is downscaled
    pub max_dimension: u32,
    /// Maximum screenshot file size accepted by the worker, in bytes
    pub max_file_size: u64,
}

impl Default for CompareOptions {
    fn default() -> Self {
        Self {
            threshold: 0.1,
            chunk_rows: 25,
            aa_tolerance: false,
            dim_alpha: 0.5,
            diff_color: [255, 0, 0],
            diff_color_alt: Some([0, 0, 255]),
            max_dimension: DEFAULT_MAX_DIMENSION,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
        }
    }
}

/// Check a screenshot file against the size cap before decoding.
///
/// Returns the file size on success so callers can log it.
pub fn ensure_within_size_cap(path: &Path, cap: u64) -> Result<u64> {
    let meta = std::fs::metadata(path)?;
    let size = meta.len();
    if size > cap {
        return Err(Error::SizeLimit(format!(
            "{} is {} bytes, cap is {} bytes",
            path.display(),
            size,
            cap
        )));
    }
    Ok(size)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bitmap_new_is_zeroed() {
        let b = Bitmap::new(3, 2);
        assert_eq!(b.pixels.len(), 24);
        assert!(b.pixels.iter().all(|&p| p == 0));
    }

    #[test]
    fn from_raw_rejects_bad_length() {
        assert!(Bitmap::from_raw(2, 2, vec![0; 15]).is_err());
        assert!(Bitmap::from_raw(2, 2, vec![0; 16]).is_ok());
    }

    #[test]
    fn size_cap_rejects_large_files() {
        let dir = std::env::temp_dir().join("pagediff-size-cap-test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("big.png");
        std::fs::write(&path, vec![0u8; 2048]).unwrap();

        assert!(ensure_within_size_cap(&path, 1024).is_err());
        assert_eq!(ensure_within_size_cap(&path, 4096).unwrap(), 2048);
    }
}
