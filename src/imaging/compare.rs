//! Chunked perceptual pixel comparison
//!
//! Per-pixel difference is measured in YIQ color space after alpha-blending
//! over white, the metric introduced by "Measuring perceived color
//! difference using YIQ NTSC transmission color space in mobile
//! applications" (Kotsarenko & Ramos) and popularized by pixelmatch. The
//! canvas is walked in horizontal strips of a fixed row count so per-strip
//! work stays bounded on arbitrarily large canvases, and the mismatch count
//! is independent of the strip size.

use super::{Bitmap, CompareOptions};

// Maximum possible YIQ delta, scaled by threshold^2 to form the cutoff
const MAX_YIQ_DELTA: f64 = 35215.0;

/// Compare two equally-sized bitmaps.
///
/// Returns the diff bitmap (mismatches in `diff_color`, matches dimmed to
/// grayscale) and the mismatched pixel count. Deterministic: identical
/// inputs and options always produce byte-identical output.
///
/// # Panics
///
/// Panics if the bitmaps do not share dimensions; callers normalize first.
pub fn compare(a: &Bitmap, b: &Bitmap, opts: &CompareOptions) -> (Bitmap, u64) {
    assert_eq!(
        (a.width, a.height),
        (b.width, b.height),
        "compare requires normalized inputs"
    );

    let width = a.width as usize;
    let height = a.height as usize;
    let max_delta = MAX_YIQ_DELTA * opts.threshold * opts.threshold;
    let chunk_rows = (opts.chunk_rows.max(1)) as usize;

    let mut diff = Bitmap::new(a.width, a.height);
    let mut mismatched: u64 = 0;

    let mut strip_start = 0;
    while strip_start < height {
        let strip_end = (strip_start + chunk_rows).min(height);
        for y in strip_start..strip_end {
            for x in 0..width {
                let pos = (y * width + x) * 4;

                // Identical bytes short-circuit the color math
                if a.pixels[pos..pos + 4] == b.pixels[pos..pos + 4] {
                    draw_gray_pixel(&a.pixels, pos, opts.dim_alpha, &mut diff.pixels);
                    continue;
                }

                let delta = color_delta(&a.pixels, &b.pixels, pos, pos, false);
                if delta.abs() > max_delta {
                    if opts.aa_tolerance
                        && (antialiased(a, x, y, b) || antialiased(b, x, y, a))
                    {
                        draw_gray_pixel(&a.pixels, pos, opts.dim_alpha, &mut diff.pixels);
                        continue;
                    }
                    let color = if delta < 0.0 {
                        opts.diff_color_alt.unwrap_or(opts.diff_color)
                    } else {
                        opts.diff_color
                    };
                    draw_pixel(&mut diff.pixels, pos, color);
                    mismatched += 1;
                } else {
                    draw_gray_pixel(&a.pixels, pos, opts.dim_alpha, &mut diff.pixels);
                }
            }
        }
        strip_start = strip_end;
    }

    (diff, mismatched)
}

/// Mismatch ratio expressed as a percentage in [0, 100]
pub fn mismatch_percentage(mismatched: u64, width: u32, height: u32) -> f64 {
    let total = width as u64 * height as u64;
    if total == 0 {
        return 0.0;
    }
    mismatched as f64 / total as f64 * 100.0
}

fn blend(channel: f64, alpha: f64) -> f64 {
    255.0 + (channel - 255.0) * alpha
}

fn rgb2y(r: f64, g: f64, b: f64) -> f64 {
    r * 0.298_895_31 + g * 0.586_622_47 + b * 0.114_482_23
}

fn rgb2i(r: f64, g: f64, b: f64) -> f64 {
    r * 0.595_977_99 - g * 0.274_176_10 - b * 0.321_801_89
}

fn rgb2q(r: f64, g: f64, b: f64) -> f64 {
    r * 0.211_470_17 - g * 0.522_617_11 + b * 0.311_146_94
}

/// Perceptual distance between two pixels, blended over white.
///
/// Negative when the second pixel is lighter than the first, so callers can
/// pick the alternate diff color for removals vs additions.
fn color_delta(img1: &[u8], img2: &[u8], k: usize, m: usize, y_only: bool) -> f64 {
    let mut r1 = img1[k] as f64;
    let mut g1 = img1[k + 1] as f64;
    let mut b1 = img1[k + 2] as f64;
    let mut a1 = img1[k + 3] as f64;

    let mut r2 = img2[m] as f64;
    let mut g2 = img2[m + 1] as f64;
    let mut b2 = img2[m + 2] as f64;
    let mut a2 = img2[m + 3] as f64;

    if a1 == a2 && r1 == r2 && g1 == g2 && b1 == b2 {
        return 0.0;
    }

    if a1 < 255.0 {
        a1 /= 255.0;
        r1 = blend(r1, a1);
        g1 = blend(g1, a1);
        b1 = blend(b1, a1);
    }
    if a2 < 255.0 {
        a2 /= 255.0;
        r2 = blend(r2, a2);
        g2 = blend(g2, a2);
        b2 = blend(b2, a2);
    }

    let y1 = rgb2y(r1, g1, b1);
    let y2 = rgb2y(r2, g2, b2);
    let y = y1 - y2;

    if y_only {
        return y;
    }

    let i = rgb2i(r1, g1, b1) - rgb2i(r2, g2, b2);
    let q = rgb2q(r1, g1, b1) - rgb2q(r2, g2, b2);

    let delta = 0.5053 * y * y + 0.299 * i * i + 0.1957 * q * q;
    if y1 > y2 {
        -delta
    } else {
        delta
    }
}

/// Classify a pixel as a likely anti-aliasing artifact.
///
/// An AA pixel sits on a single-pixel-wide luminance edge: among its eight
/// neighbors there are at most two with identical color, and the darkest
/// and brightest neighbors are themselves part of wider uniform regions in
/// both images.
fn antialiased(img: &Bitmap, x1: usize, y1: usize, other: &Bitmap) -> bool {
    let width = img.width as usize;
    let height = img.height as usize;
    let x0 = x1.saturating_sub(1);
    let y0 = y1.saturating_sub(1);
    let x2 = (x1 + 1).min(width - 1);
    let y2 = (y1 + 1).min(height - 1);
    let pos = (y1 * width + x1) * 4;

    let mut zeroes: u32 = if x1 == x0 || x1 == x2 || y1 == y0 || y1 == y2 {
        1
    } else {
        0
    };
    let mut min = 0.0f64;
    let mut max = 0.0f64;
    let mut min_pos = (0usize, 0usize);
    let mut max_pos = (0usize, 0usize);

    for x in x0..=x2 {
        for y in y0..=y2 {
            if x == x1 && y == y1 {
                continue;
            }

            let delta = color_delta(&img.pixels, &img.pixels, pos, (y * width + x) * 4, true);

            if delta == 0.0 {
                zeroes += 1;
                // Dominant uniform neighborhood: not an edge
                if zeroes > 2 {
                    return false;
                }
            } else if delta < min {
                min = delta;
                min_pos = (x, y);
            } else if delta > max {
                max = delta;
                max_pos = (x, y);
            }
        }
    }

    // No darker or no lighter neighbor means no edge
    if min == 0.0 || max == 0.0 {
        return false;
    }

    (has_many_siblings(img, min_pos.0, min_pos.1)
        && has_many_siblings(other, min_pos.0, min_pos.1))
        || (has_many_siblings(img, max_pos.0, max_pos.1)
            && has_many_siblings(other, max_pos.0, max_pos.1))
}

/// Whether a pixel has three or more identically-colored neighbors
fn has_many_siblings(img: &Bitmap, x1: usize, y1: usize) -> bool {
    let width = img.width as usize;
    let height = img.height as usize;
    let x0 = x1.saturating_sub(1);
    let y0 = y1.saturating_sub(1);
    let x2 = (x1 + 1).min(width - 1);
    let y2 = (y1 + 1).min(height - 1);
    let pos = (y1 * width + x1) * 4;

    let mut zeroes: u32 = if x1 == x0 || x1 == x2 || y1 == y0 || y1 == y2 {
        1
    } else {
        0
    };

    for x in x0..=x2 {
        for y in y0..=y2 {
            if x == x1 && y == y1 {
                continue;
            }
            let n = (y * width + x) * 4;
            if img.pixels[pos..pos + 4] == img.pixels[n..n + 4] {
                zeroes += 1;
                if zeroes > 2 {
                    return true;
                }
            }
        }
    }
    false
}

fn draw_pixel(output: &mut [u8], pos: usize, rgb: [u8; 3]) {
    output[pos] = rgb[0];
    output[pos + 1] = rgb[1];
    output[pos + 2] = rgb[2];
    output[pos + 3] = 255;
}

/// Dim a matched source pixel into the diff output as opaque grayscale
fn draw_gray_pixel(img: &[u8], pos: usize, alpha: f64, output: &mut [u8]) {
    let r = img[pos] as f64;
    let g = img[pos + 1] as f64;
    let b = img[pos + 2] as f64;
    let a = img[pos + 3] as f64;
    let val = blend(rgb2y(r, g, b), alpha * a / 255.0);
    let val = val.round().clamp(0.0, 255.0) as u8;
    draw_pixel(output, pos, [val, val, val]);
}
