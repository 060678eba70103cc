//! General-purpose background removal via ONNX Runtime.
//!
//! U²-Net salient-object segmentation behind a byte-level interface: the
//! photograph goes in as PNG bytes, an RGBA PNG comes back whose alpha
//! channel is the subject matte. The pipeline feeds the alpha channel
//! (0–255, normalized to 0–1) straight into compositing.

use crate::mask::Mask;
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use std::io::Cursor;
use std::path::Path;
use thiserror::Error;

const REMOVAL_INPUT_SIZE: u32 = 320;
/// ImageNet channel statistics, applied after scaling by the image maximum.
const REMOVAL_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
const REMOVAL_STD: [f32; 3] = [0.229, 0.224, 0.225];

#[derive(Error, Debug)]
pub enum RemovalError {
    #[error("model file not found: {0}")]
    ModelNotFound(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("image: {0}")]
    Image(#[from] image::ImageError),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// U²-Net based background remover.
#[derive(Debug)]
pub struct BackgroundRemover {
    session: Session,
}

impl BackgroundRemover {
    /// Load the removal ONNX model from the given path.
    pub fn load(model_path: &Path) -> Result<Self, RemovalError> {
        if !model_path.exists() {
            return Err(RemovalError::ModelNotFound(
                model_path.display().to_string(),
            ));
        }

        let session = Session::builder()?
            .with_intra_threads(2)?
            .commit_from_file(model_path)?;

        tracing::info!(path = %model_path.display(), "loaded background removal model");

        Ok(Self { session })
    }

    /// Remove the background from PNG-encoded image bytes, returning an
    /// RGBA PNG whose alpha channel carries the subject matte.
    pub fn remove(&mut self, png_bytes: &[u8]) -> Result<Vec<u8>, RemovalError> {
        let photo = image::load_from_memory(png_bytes)?.to_rgb8();
        let (w, h) = photo.dimensions();

        let matte = self.predict(&photo)?;
        let matte = matte.resize(w, h);

        let mut rgba = image::RgbaImage::new(w, h);
        for (x, y, px) in rgba.enumerate_pixels_mut() {
            let [r, g, b] = photo.get_pixel(x, y).0;
            let a = (matte.get(x, y).clamp(0.0, 1.0) * 255.0).round() as u8;
            px.0 = [r, g, b, a];
        }

        let mut out = Vec::new();
        rgba.write_to(&mut Cursor::new(&mut out), image::ImageFormat::Png)?;
        Ok(out)
    }

    /// Convenience path used by the pipeline: PNG round-trip through
    /// [`remove`](Self::remove), then decode the alpha channel as a mask.
    pub fn segment(&mut self, photo: &image::RgbImage) -> Result<Mask, RemovalError> {
        let mut png = Vec::new();
        photo.write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)?;

        let out_bytes = self.remove(&png)?;
        let rgba = image::load_from_memory(&out_bytes)?.to_rgba8();

        Ok(alpha_to_mask(&rgba))
    }

    /// Run the model on a 320×320 copy and return the min–max normalized
    /// saliency map at inference resolution.
    fn predict(&mut self, photo: &image::RgbImage) -> Result<Mask, RemovalError> {
        let small = image::imageops::resize(
            photo,
            REMOVAL_INPUT_SIZE,
            REMOVAL_INPUT_SIZE,
            image::imageops::FilterType::Triangle,
        );

        let size = REMOVAL_INPUT_SIZE as usize;
        let max_px = small.pixels().flat_map(|p| p.0).max().unwrap_or(255).max(1) as f32;

        let mut tensor = Array4::<f32>::zeros((1, 3, size, size));
        for (x, y, px) in small.enumerate_pixels() {
            for c in 0..3 {
                let v = px.0[c] as f32 / max_px;
                tensor[[0, c, y as usize, x as usize]] = (v - REMOVAL_MEAN[c]) / REMOVAL_STD[c];
            }
        }

        let outputs = self
            .session
            .run(ort::inputs![TensorRef::from_array_view(tensor.view())?])?;

        // First output (d0) is the fused saliency map.
        let (_, saliency) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| RemovalError::InferenceFailed(format!("saliency extraction: {e}")))?;

        if saliency.len() != size * size {
            return Err(RemovalError::InferenceFailed(format!(
                "expected {size}x{size} saliency map, got {} values",
                saliency.len()
            )));
        }

        Ok(min_max_normalize(Mask::from_data(
            REMOVAL_INPUT_SIZE,
            REMOVAL_INPUT_SIZE,
            saliency.to_vec(),
        )))
    }
}

/// Extract the alpha channel of an RGBA image as a [0, 1] mask.
fn alpha_to_mask(rgba: &image::RgbaImage) -> Mask {
    let (w, h) = rgba.dimensions();
    let data = rgba.pixels().map(|p| p.0[3] as f32 / 255.0).collect();
    Mask::from_data(w, h, data)
}

/// Stretch mask values to span [0, 1]. A constant map collapses to zeros.
fn min_max_normalize(mask: Mask) -> Mask {
    let min = mask.data().iter().fold(f32::INFINITY, |a, &b| a.min(b));
    let max = mask.data().iter().fold(f32::NEG_INFINITY, |a, &b| a.max(b));
    let range = max - min;
    if range <= 0.0 {
        return Mask::from_data(mask.width(), mask.height(), vec![0.0; mask.data().len()]);
    }
    let data = mask.data().iter().map(|&v| (v - min) / range).collect();
    Mask::from_data(mask.width(), mask.height(), data)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alpha_to_mask_values() {
        let mut rgba = image::RgbaImage::new(2, 1);
        rgba.put_pixel(0, 0, image::Rgba([10, 20, 30, 0]));
        rgba.put_pixel(1, 0, image::Rgba([10, 20, 30, 255]));
        let mask = alpha_to_mask(&rgba);
        assert_eq!(mask.get(0, 0), 0.0);
        assert_eq!(mask.get(1, 0), 1.0);
    }

    #[test]
    fn test_min_max_normalize_spans_unit_interval() {
        let m = min_max_normalize(Mask::from_data(3, 1, vec![2.0, 4.0, 6.0]));
        assert!((m.get(0, 0) - 0.0).abs() < 1e-6);
        assert!((m.get(1, 0) - 0.5).abs() < 1e-6);
        assert!((m.get(2, 0) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_min_max_normalize_constant_collapses() {
        let m = min_max_normalize(Mask::from_data(2, 2, vec![0.7; 4]));
        assert!(m.data().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_load_missing_model() {
        let err = BackgroundRemover::load(Path::new("/nonexistent/u2net.onnx")).unwrap_err();
        assert!(matches!(err, RemovalError::ModelNotFound(_)));
    }
}
