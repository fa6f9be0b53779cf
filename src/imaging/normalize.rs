//! Dimension normalization for pixel comparison
//!
//! Two screenshots of the same logical page rarely share exact dimensions:
//! layout changes grow the page below or to the right of the fold. The
//! comparator requires identical dimensions, so both inputs are placed at
//! the top-left origin of a shared canvas sized to the union of their
//! extents. Oversized inputs are first downscaled to a fixed cap so peak
//! memory stays bounded no matter what the renderer captured.

use super::Bitmap;

/// Reconcile two bitmaps onto a common canvas.
///
/// Both outputs share identical dimensions: the per-axis maximum of the
/// (possibly downscaled) inputs. Regions beyond a source's extent stay
/// transparent black. Inputs are never mutated.
pub fn normalize(a: &Bitmap, b: &Bitmap, max_dimension: u32) -> (Bitmap, Bitmap) {
    let a = fit_within(a, max_dimension);
    let b = fit_within(b, max_dimension);

    let width = a.width.max(b.width);
    let height = a.height.max(b.height);

    (place_on_canvas(&a, width, height), place_on_canvas(&b, width, height))
}

/// Downscale with nearest-neighbor sampling if either axis exceeds the cap,
/// preserving aspect ratio. Returns a copy either way so callers own the
/// result.
fn fit_within(src: &Bitmap, max_dimension: u32) -> Bitmap {
    if src.width <= max_dimension && src.height <= max_dimension {
        return src.clone();
    }

    let scale = (max_dimension as f64 / src.width as f64)
        .min(max_dimension as f64 / src.height as f64);
    let new_width = (src.width as f64 * scale).floor() as u32;
    let new_height = (src.height as f64 * scale).floor() as u32;

    let mut resized = Bitmap::new(new_width, new_height);
    for y in 0..new_height {
        let src_y = (y as f64 / scale).floor() as u32;
        for x in 0..new_width {
            let src_x = (x as f64 / scale).floor() as u32;
            let src_idx = (src_y as usize * src.width as usize + src_x as usize) * 4;
            let dst_idx = (y as usize * new_width as usize + x as usize) * 4;
            resized.pixels[dst_idx..dst_idx + 4]
                .copy_from_slice(&src.pixels[src_idx..src_idx + 4]);
        }
    }
    resized
}

/// Copy a bitmap into the top-left corner of a zero-initialized canvas
fn place_on_canvas(src: &Bitmap, width: u32, height: u32) -> Bitmap {
    if src.width == width && src.height == height {
        return src.clone();
    }

    let mut canvas = Bitmap::new(width, height);
    let src_row_len = src.width as usize * 4;
    for y in 0..src.height as usize {
        let src_off = y * src_row_len;
        let dst_off = y * width as usize * 4;
        canvas.pixels[dst_off..dst_off + src_row_len]
            .copy_from_slice(&src.pixels[src_off..src_off + src_row_len]);
    }
    canvas
}
