//! Fast neural portrait matting via ONNX Runtime.
//!
//! MODNet-style photographic portrait matting: dynamic input size, per-pixel
//! subject probability output. Inference runs on a downscaled copy (longest
//! side capped at 512 px) and the matte is upscaled back to the photograph's
//! resolution with bilinear interpolation.

use crate::mask::Mask;
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;
use thiserror::Error;

/// Longest side of the downscaled inference copy.
const PORTRAIT_MAX_SIDE: u32 = 512;
/// MODNet requires spatial dims divisible by 32.
const PORTRAIT_ALIGN: u32 = 32;
const PORTRAIT_MEAN: f32 = 0.5;
const PORTRAIT_STD: f32 = 0.5;

#[derive(Error, Debug)]
pub enum PortraitError {
    #[error("model file not found: {0}")]
    ModelNotFound(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// MODNet-based portrait matting backend.
#[derive(Debug)]
pub struct PortraitMatting {
    session: Session,
}

impl PortraitMatting {
    /// Load the portrait matting ONNX model from the given path.
    pub fn load(model_path: &Path) -> Result<Self, PortraitError> {
        if !model_path.exists() {
            return Err(PortraitError::ModelNotFound(
                model_path.display().to_string(),
            ));
        }

        let session = Session::builder()?
            .with_intra_threads(2)?
            .commit_from_file(model_path)?;

        tracing::info!(path = %model_path.display(), "loaded portrait matting model");

        Ok(Self { session })
    }

    /// Produce a subject-probability mask at the photograph's resolution.
    pub fn segment(&mut self, photo: &image::RgbImage) -> Result<Mask, PortraitError> {
        let (w, h) = photo.dimensions();
        let (in_w, in_h) = inference_dims(w, h);

        let small = image::imageops::resize(photo, in_w, in_h, image::imageops::FilterType::Triangle);

        let mut tensor = Array4::<f32>::zeros((1, 3, in_h as usize, in_w as usize));
        for (x, y, px) in small.enumerate_pixels() {
            for c in 0..3 {
                let v = px.0[c] as f32 / 255.0;
                tensor[[0, c, y as usize, x as usize]] = (v - PORTRAIT_MEAN) / PORTRAIT_STD;
            }
        }

        let outputs = self
            .session
            .run(ort::inputs![TensorRef::from_array_view(tensor.view())?])?;

        let (_, matte) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| PortraitError::InferenceFailed(format!("matte extraction: {e}")))?;

        let expected = (in_w * in_h) as usize;
        if matte.len() != expected {
            return Err(PortraitError::InferenceFailed(format!(
                "expected {in_w}x{in_h} matte ({expected} values), got {}",
                matte.len()
            )));
        }

        let small_mask = Mask::from_data(in_w, in_h, matte.to_vec());
        Ok(small_mask.resize(w, h))
    }
}

/// Inference dimensions: cap the longest side at [`PORTRAIT_MAX_SIDE`]
/// (never upscale), then round down to the model's alignment, with a floor
/// of one alignment unit.
fn inference_dims(w: u32, h: u32) -> (u32, u32) {
    let longest = w.max(h);
    let scale = if longest > PORTRAIT_MAX_SIDE {
        PORTRAIT_MAX_SIDE as f32 / longest as f32
    } else {
        1.0
    };

    let align = |v: u32| -> u32 {
        let scaled = (v as f32 * scale) as u32;
        (scaled / PORTRAIT_ALIGN * PORTRAIT_ALIGN).max(PORTRAIT_ALIGN)
    };

    (align(w), align(h))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inference_dims_caps_longest_side() {
        let (w, h) = inference_dims(640, 480);
        assert!(w <= PORTRAIT_MAX_SIDE && h <= PORTRAIT_MAX_SIDE);
        assert_eq!((w, h), (512, 384));
    }

    #[test]
    fn test_inference_dims_aligned() {
        let (w, h) = inference_dims(1000, 500);
        assert_eq!(w % PORTRAIT_ALIGN, 0);
        assert_eq!(h % PORTRAIT_ALIGN, 0);
        assert_eq!((w, h), (512, 256));
    }

    #[test]
    fn test_inference_dims_no_upscale() {
        let (w, h) = inference_dims(300, 200);
        assert!(w <= 300 && h <= 200);
        assert_eq!((w, h), (288, 192));
    }

    #[test]
    fn test_inference_dims_floor() {
        // Tiny inputs still get one alignment unit.
        let (w, h) = inference_dims(20, 10);
        assert_eq!((w, h), (PORTRAIT_ALIGN, PORTRAIT_ALIGN));
    }

    #[test]
    fn test_load_missing_model() {
        let err = PortraitMatting::load(Path::new("/nonexistent/modnet.onnx")).unwrap_err();
        assert!(matches!(err, PortraitError::ModelNotFound(_)));
    }
}
