//! Segmentation-and-composite pipeline.
//!
//! Backends are probed once at startup; per-request work is a pure,
//! synchronous transform: pick a mask source (fallback chain or pinned),
//! post-process the mask, blend the photograph over the backdrop. Every
//! failure degrades to *some* image — nothing here returns an error to the
//! caller.

use crate::detector::FaceDetector;
use crate::grabcut;
use crate::mask::Mask;
use crate::matting::BackgroundRemover;
use crate::portrait::PortraitMatting;
use crate::types::{CompositeResult, MethodUsed, SegMethod};
use image::RgbImage;
use std::path::Path;

/// Model file names expected under the model directory.
pub const PORTRAIT_MODEL_FILE: &str = "modnet_portrait.onnx";
pub const REMOVAL_MODEL_FILE: &str = "u2net.onnx";
pub const DETECTOR_MODEL_FILE: &str = "det_10g.onnx";

/// Light final smoothing applied to every mask, whatever produced it.
const FINAL_BLUR_KERNEL: usize = 15;

/// Segmentation backends probed at startup.
///
/// Capability negotiation happens here, once: each ONNX backend is loaded if
/// its model file is present and the session constructs. Per-request code
/// then iterates what is actually usable instead of catching load failures
/// at call time. The region-growing fallback needs no entry — it is always
/// usable (the face detector only improves its seed).
pub struct Backends {
    portrait: Option<PortraitMatting>,
    remover: Option<BackgroundRemover>,
    detector: Option<FaceDetector>,
}

impl Backends {
    /// Probe the model directory and load whichever backends are usable.
    pub fn probe(model_dir: &Path) -> Self {
        let portrait = match PortraitMatting::load(&model_dir.join(PORTRAIT_MODEL_FILE)) {
            Ok(p) => Some(p),
            Err(e) => {
                tracing::info!(error = %e, "portrait matting unavailable");
                None
            }
        };

        let remover = match BackgroundRemover::load(&model_dir.join(REMOVAL_MODEL_FILE)) {
            Ok(r) => Some(r),
            Err(e) => {
                tracing::info!(error = %e, "background removal unavailable");
                None
            }
        };

        let detector = match FaceDetector::load(&model_dir.join(DETECTOR_MODEL_FILE)) {
            Ok(d) => Some(d),
            Err(e) => {
                tracing::info!(error = %e, "face detection unavailable, seeds will be centered");
                None
            }
        };

        let b = Self { portrait, remover, detector };
        tracing::info!(available = ?b.available(), "segmentation backends probed");
        b
    }

    /// No neural backends at all. The grabcut fallback still works.
    pub fn none() -> Self {
        Self { portrait: None, remover: None, detector: None }
    }

    /// Usable methods in fallback order.
    pub fn available(&self) -> Vec<SegMethod> {
        let mut out = Vec::new();
        if self.portrait.is_some() {
            out.push(SegMethod::Portrait);
        }
        if self.remover.is_some() {
            out.push(SegMethod::Matting);
        }
        out.push(SegMethod::Grabcut);
        out
    }

    pub fn has_face_detector(&self) -> bool {
        self.detector.is_some()
    }
}

/// Composite a photograph onto the backdrop at `background_path`.
///
/// Never fails: a missing or unreadable backdrop, an unavailable pinned
/// backend, or a total segmentation collapse all return a usable image with
/// the degradation recorded in [`CompositeResult::warnings`].
pub fn composite(
    backends: &mut Backends,
    photo: &RgbImage,
    background_path: &Path,
    method: SegMethod,
) -> CompositeResult {
    let (w, h) = photo.dimensions();
    let mut warnings = Vec::new();

    if w == 0 || h == 0 {
        warnings.push("empty photograph".to_string());
        return skipped(photo, warnings);
    }

    if !background_path.exists() {
        let msg = format!("backdrop not found: {}", background_path.display());
        tracing::warn!("{msg}");
        warnings.push(msg);
        return skipped(photo, warnings);
    }

    let (mask, used) = match method {
        SegMethod::Auto => run_chain(backends, photo, &mut warnings),
        SegMethod::Portrait => match backends.portrait.as_mut() {
            Some(p) => match p.segment(photo) {
                Ok(m) => (m, MethodUsed::Portrait),
                Err(e) => {
                    warnings.push(format!("portrait matting failed: {e}"));
                    return skipped(photo, warnings);
                }
            },
            None => {
                warnings.push("portrait matting unavailable".to_string());
                return skipped(photo, warnings);
            }
        },
        SegMethod::Matting => match backends.remover.as_mut() {
            Some(r) => match r.segment(photo) {
                Ok(m) => (m, MethodUsed::Matting),
                Err(e) => {
                    warnings.push(format!("background removal failed: {e}"));
                    return skipped(photo, warnings);
                }
            },
            None => {
                warnings.push("background removal unavailable".to_string());
                return skipped(photo, warnings);
            }
        },
        SegMethod::Grabcut => run_grabcut(&mut backends.detector, photo, &mut warnings),
    };

    let mask = postprocess(mask, w, h);

    let background = match image::open(background_path) {
        Ok(img) => img.to_rgb8(),
        Err(e) => {
            let msg = format!("backdrop unreadable: {e}");
            tracing::warn!("{msg}");
            warnings.push(msg);
            return skipped(photo, warnings);
        }
    };
    // Stretched to the photograph's exact dimensions; no aspect policy.
    let background =
        image::imageops::resize(&background, w, h, image::imageops::FilterType::Lanczos3);

    let image = blend(photo, &background, &mask);

    tracing::debug!(method = used.as_str(), width = w, height = h, "composite produced");
    CompositeResult { image, method: used, warnings }
}

fn skipped(photo: &RgbImage, warnings: Vec<String>) -> CompositeResult {
    CompositeResult {
        image: photo.clone(),
        method: MethodUsed::Skipped,
        warnings,
    }
}

/// Walk the fallback chain: portrait → matting → grabcut.
fn run_chain(
    backends: &mut Backends,
    photo: &RgbImage,
    warnings: &mut Vec<String>,
) -> (Mask, MethodUsed) {
    if let Some(p) = backends.portrait.as_mut() {
        match p.segment(photo) {
            Ok(m) => return (m, MethodUsed::Portrait),
            Err(e) => warnings.push(format!("portrait matting failed: {e}")),
        }
    }

    if let Some(r) = backends.remover.as_mut() {
        match r.segment(photo) {
            Ok(m) => return (m, MethodUsed::Matting),
            Err(e) => warnings.push(format!("background removal failed: {e}")),
        }
    }

    run_grabcut(&mut backends.detector, photo, warnings)
}

/// Region-growing fallback: face-derived seed when a detector is loaded and
/// finds a face (largest by area), centered seed otherwise.
fn run_grabcut(
    detector: &mut Option<FaceDetector>,
    photo: &RgbImage,
    warnings: &mut Vec<String>,
) -> (Mask, MethodUsed) {
    let (w, h) = photo.dimensions();

    let seed = match detector.as_mut() {
        Some(det) => match det.detect(photo) {
            Ok(faces) => match faces.iter().max_by(|a, b| {
                a.area().partial_cmp(&b.area()).unwrap_or(std::cmp::Ordering::Equal)
            }) {
                Some(face) => {
                    tracing::debug!(?face, "seeding from detected face");
                    grabcut::seed_from_face(face, w, h)
                }
                None => grabcut::centered_seed(w, h),
            },
            Err(e) => {
                warnings.push(format!("face detection failed: {e}"));
                grabcut::centered_seed(w, h)
            }
        },
        None => grabcut::centered_seed(w, h),
    };

    match grabcut::segment(photo, &seed) {
        Ok(mask) => (mask, MethodUsed::Grabcut),
        Err(e) => {
            warnings.push(format!("region refinement failed: {e}"));
            (Mask::ones(w, h), MethodUsed::Fallback)
        }
    }
}

/// Post-processing applied to every mask: clamp, resize to the photograph if
/// dimensions differ, one light smoothing pass, re-clamp.
fn postprocess(mut mask: Mask, w: u32, h: u32) -> Mask {
    mask.clamp();
    if mask.width() != w || mask.height() != h {
        mask = mask.resize(w, h);
    }
    let mut mask = mask.gaussian_blur(FINAL_BLUR_KERNEL);
    mask.clamp();
    mask
}

/// Per-pixel alpha blend: `out = src*mask + bg*(1-mask)`, f32 per channel,
/// rounded to u8.
fn blend(src: &RgbImage, bg: &RgbImage, mask: &Mask) -> RgbImage {
    let (w, h) = src.dimensions();
    let mut out = RgbImage::new(w, h);

    for y in 0..h {
        for x in 0..w {
            let m = mask.get(x, y);
            let s = src.get_pixel(x, y).0;
            let b = bg.get_pixel(x, y).0;
            let mut px = [0u8; 3];
            for c in 0..3 {
                let v = s[c] as f32 * m + b[c] as f32 * (1.0 - m);
                px[c] = v.round().clamp(0.0, 255.0) as u8;
            }
            out.put_pixel(x, y, image::Rgb(px));
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;
    use std::path::PathBuf;

    fn write_backdrop(dir: &tempfile::TempDir, w: u32, h: u32) -> PathBuf {
        let path = dir.path().join("backdrop.png");
        let bg = RgbImage::from_pixel(w, h, Rgb([200, 30, 30]));
        bg.save(&path).unwrap();
        path
    }

    #[test]
    fn test_probe_empty_dir_leaves_grabcut_only() {
        let dir = tempfile::tempdir().unwrap();
        let backends = Backends::probe(dir.path());
        assert_eq!(backends.available(), vec![SegMethod::Grabcut]);
        assert!(!backends.has_face_detector());
    }

    #[test]
    fn test_missing_backdrop_returns_original() {
        let mut backends = Backends::none();
        let photo = RgbImage::from_pixel(32, 24, Rgb([10, 120, 200]));

        let result = composite(
            &mut backends,
            &photo,
            Path::new("/nonexistent/backdrop.png"),
            SegMethod::Auto,
        );

        assert_eq!(result.method, MethodUsed::Skipped);
        assert_eq!(result.warnings.len(), 1);
        assert_eq!(result.image.as_raw(), photo.as_raw());
    }

    #[test]
    fn test_auto_without_models_uses_grabcut_and_keeps_dims() {
        // No neural backends, uniform photo: refinement collapses to the
        // all-ones mask inside grabcut, so the output equals the input —
        // and nothing errors.
        let dir = tempfile::tempdir().unwrap();
        let backdrop = write_backdrop(&dir, 1920, 1080);

        let mut backends = Backends::none();
        let photo = RgbImage::from_pixel(640, 480, Rgb([90, 90, 90]));

        let result = composite(&mut backends, &photo, &backdrop, SegMethod::Auto);

        assert_eq!(result.method, MethodUsed::Grabcut);
        assert_eq!(result.image.dimensions(), (640, 480));
        assert_eq!(result.image.as_raw(), photo.as_raw());
    }

    #[test]
    fn test_auto_replaces_background_around_subject() {
        let dir = tempfile::tempdir().unwrap();
        let backdrop = write_backdrop(&dir, 64, 64);

        let mut backends = Backends::none();
        // Bright subject square on a dark frame; centered seed covers it.
        let mut photo = RgbImage::from_pixel(96, 96, Rgb([12, 14, 16]));
        for y in 30..66 {
            for x in 30..66 {
                photo.put_pixel(x, y, Rgb([235, 230, 228]));
            }
        }

        let result = composite(&mut backends, &photo, &backdrop, SegMethod::Auto);

        assert_eq!(result.method, MethodUsed::Grabcut);
        assert_eq!(result.image.dimensions(), (96, 96));
        // Subject center retains its color, far corner shows the red backdrop.
        let center = result.image.get_pixel(48, 48).0;
        assert!(center[0] > 200 && center[1] > 200);
        let corner = result.image.get_pixel(2, 2).0;
        assert!(corner[0] > 150 && corner[1] < 80, "corner {corner:?} should be backdrop red");
    }

    #[test]
    fn test_pinned_unavailable_backend_skips_compositing() {
        let dir = tempfile::tempdir().unwrap();
        let backdrop = write_backdrop(&dir, 32, 32);

        let mut backends = Backends::none();
        let photo = RgbImage::from_pixel(48, 48, Rgb([50, 60, 70]));

        for method in [SegMethod::Portrait, SegMethod::Matting] {
            let result = composite(&mut backends, &photo, &backdrop, method);
            assert_eq!(result.method, MethodUsed::Skipped);
            assert_eq!(result.image.as_raw(), photo.as_raw());
            assert_eq!(result.warnings.len(), 1, "method {method:?}");
        }
    }

    #[test]
    fn test_pinned_grabcut_runs_without_detector() {
        let dir = tempfile::tempdir().unwrap();
        let backdrop = write_backdrop(&dir, 32, 32);

        let mut backends = Backends::none();
        let photo = RgbImage::from_pixel(64, 64, Rgb([128, 128, 128]));

        let result = composite(&mut backends, &photo, &backdrop, SegMethod::Grabcut);
        assert_eq!(result.method, MethodUsed::Grabcut);
        assert_eq!(result.image.dimensions(), (64, 64));
    }

    #[test]
    fn test_postprocess_bounds_and_dims() {
        let mask = Mask::from_data(4, 4, vec![
            -1.0, 2.0, 0.5, 0.0,
            1.5, -0.2, 0.9, 1.0,
            0.3, 0.7, 2.5, -3.0,
            1.0, 1.0, 0.0, 0.5,
        ]);
        let out = postprocess(mask, 10, 8);
        assert_eq!(out.width(), 10);
        assert_eq!(out.height(), 8);
        assert!(out.data().iter().all(|&v| (0.0..=1.0).contains(&v)));
    }

    #[test]
    fn test_blend_extremes() {
        let src = RgbImage::from_pixel(4, 4, Rgb([10, 20, 30]));
        let bg = RgbImage::from_pixel(4, 4, Rgb([200, 100, 50]));

        let all_subject = blend(&src, &bg, &Mask::ones(4, 4));
        assert_eq!(all_subject.as_raw(), src.as_raw());

        let all_backdrop = blend(&src, &bg, &Mask::from_data(4, 4, vec![0.0; 16]));
        assert_eq!(all_backdrop.as_raw(), bg.as_raw());
    }

    #[test]
    fn test_blend_midpoint() {
        let src = RgbImage::from_pixel(1, 1, Rgb([100, 0, 200]));
        let bg = RgbImage::from_pixel(1, 1, Rgb([0, 100, 100]));
        let mid = blend(&src, &bg, &Mask::from_data(1, 1, vec![0.5]));
        assert_eq!(mid.get_pixel(0, 0).0, [50, 50, 150]);
    }
}
