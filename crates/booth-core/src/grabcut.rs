//! Region-growing foreground extraction.
//!
//! Deterministic fallback that needs no ONNX model: a seed rectangle
//! (face-derived or centered) marks the probable subject, then a few rounds
//! of color-model refinement decide which seeded pixels really belong to the
//! foreground. Pixels outside the seed are definite background and never
//! flip.

use crate::mask::Mask;
use crate::types::{FaceBox, SeedRect};
use image::RgbImage;
use thiserror::Error;

const REFINE_ITERATIONS: usize = 5;
/// Centered-seed margins when no face is available: 12% of width, 10% of
/// height on each side.
const SEED_MARGIN_W: f32 = 0.12;
const SEED_MARGIN_H: f32 = 0.10;
/// Heavy smoothing of the binary refinement output.
const MASK_BLUR_KERNEL: usize = 21;
/// Variance floor (squared 8-bit units) so flat color regions stay stable.
const VARIANCE_FLOOR: f32 = 10.0;

#[derive(Error, Debug)]
pub enum GrabcutError {
    #[error("seed rectangle is empty")]
    EmptySeed,
    #[error("seed rectangle covers the whole frame — no background sample")]
    NoBackgroundSample,
}

/// Expand a face box by half its width/height on each side to approximate
/// head-and-shoulders framing, clipped to the frame.
pub fn seed_from_face(face: &FaceBox, width: u32, height: u32) -> SeedRect {
    let x0 = (face.x - face.width / 2.0).max(0.0) as u32;
    let y0 = (face.y - face.height / 2.0).max(0.0) as u32;
    let x1 = (face.x + face.width + face.width / 2.0).min(width as f32 - 1.0) as u32;
    let y1 = (face.y + face.height + face.height / 2.0).min(height as f32 - 1.0) as u32;

    SeedRect {
        x: x0,
        y: y0,
        width: x1.saturating_sub(x0),
        height: y1.saturating_sub(y0),
    }
}

/// Centered seed covering roughly 76%×80% of the frame.
pub fn centered_seed(width: u32, height: u32) -> SeedRect {
    let margin_w = (width as f32 * SEED_MARGIN_W) as u32;
    let margin_h = (height as f32 * SEED_MARGIN_H) as u32;
    SeedRect {
        x: margin_w,
        y: margin_h,
        width: width.saturating_sub(2 * margin_w),
        height: height.saturating_sub(2 * margin_h),
    }
}

/// Per-channel Gaussian color model with diagonal covariance.
struct ColorModel {
    mean: [f32; 3],
    var: [f32; 3],
}

impl ColorModel {
    /// Estimate from the pixels selected by `include`. Returns `None` when
    /// the selection is empty.
    fn estimate(photo: &RgbImage, include: &[bool]) -> Option<ColorModel> {
        let mut count = 0u64;
        let mut sum = [0.0f64; 3];
        let mut sum_sq = [0.0f64; 3];

        for (i, px) in photo.pixels().enumerate() {
            if !include[i] {
                continue;
            }
            count += 1;
            for c in 0..3 {
                let v = px.0[c] as f64;
                sum[c] += v;
                sum_sq[c] += v * v;
            }
        }

        if count == 0 {
            return None;
        }

        let n = count as f64;
        let mut mean = [0.0f32; 3];
        let mut var = [0.0f32; 3];
        for c in 0..3 {
            mean[c] = (sum[c] / n) as f32;
            var[c] = ((sum_sq[c] / n - (sum[c] / n).powi(2)) as f32).max(VARIANCE_FLOOR);
        }

        Some(ColorModel { mean, var })
    }

    /// Negative log-likelihood of a pixel under the model (constant terms
    /// dropped on both sides cancel in comparisons, but ln σ² must stay).
    fn nll(&self, px: &image::Rgb<u8>) -> f32 {
        let mut acc = 0.0f32;
        for c in 0..3 {
            let d = px.0[c] as f32 - self.mean[c];
            acc += d * d / (2.0 * self.var[c]) + 0.5 * self.var[c].ln();
        }
        acc
    }
}

/// Segment a photograph seeded by `seed`.
///
/// Outside the seed rectangle is definite background. Inside starts as
/// probable foreground; each iteration re-estimates both color models and
/// reassigns the seeded pixels by likelihood. The binary result is smoothed
/// and peak-normalized. If refinement collapses (no foreground survives),
/// the whole frame is returned as subject — compositing then changes
/// nothing, which beats cutting the visitor out of their own photo.
pub fn segment(photo: &RgbImage, seed: &SeedRect) -> Result<Mask, GrabcutError> {
    let (w, h) = photo.dimensions();

    if seed.width == 0 || seed.height == 0 {
        return Err(GrabcutError::EmptySeed);
    }
    if seed.x == 0 && seed.y == 0 && seed.width >= w && seed.height >= h {
        return Err(GrabcutError::NoBackgroundSample);
    }

    let len = (w * h) as usize;
    let mut foreground = vec![false; len];
    for y in 0..h {
        for x in 0..w {
            foreground[(y * w + x) as usize] = seed.contains(x, y);
        }
    }
    for iteration in 0..REFINE_ITERATIONS {
        let Some(fg_model) = ColorModel::estimate(photo, &foreground) else {
            tracing::warn!(iteration, "refinement collapsed, keeping whole frame");
            return Ok(Mask::ones(w, h));
        };
        // Everything not currently foreground samples the background model:
        // the region outside the seed plus any seeded pixels already
        // reassigned.
        let not_foreground: Vec<bool> = foreground.iter().map(|&f| !f).collect();
        let Some(bg_model) = ColorModel::estimate(photo, &not_foreground) else {
            return Err(GrabcutError::NoBackgroundSample);
        };

        let mut changed = 0usize;
        for y in seed.y..(seed.y + seed.height).min(h) {
            for x in seed.x..(seed.x + seed.width).min(w) {
                let i = (y * w + x) as usize;
                let px = photo.get_pixel(x, y);
                let is_fg = fg_model.nll(px) < bg_model.nll(px);
                if foreground[i] != is_fg {
                    foreground[i] = is_fg;
                    changed += 1;
                }
            }
        }

        tracing::trace!(iteration, changed, "refinement pass");
        if changed == 0 {
            break;
        }
    }

    let data: Vec<f32> = foreground.iter().map(|&f| if f { 1.0 } else { 0.0 }).collect();
    let mut mask = Mask::from_data(w, h, data).gaussian_blur(MASK_BLUR_KERNEL);
    mask.normalize_max();
    Ok(mask)
}
