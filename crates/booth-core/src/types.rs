use image::RgbImage;
use serde::{Deserialize, Serialize};

/// Segmentation method selector.
///
/// `Auto` walks the fallback chain (portrait → matting → grabcut); any other
/// value pins a single backend and skips the chain entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SegMethod {
    Auto,
    Portrait,
    Matting,
    Grabcut,
}

impl SegMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            SegMethod::Auto => "auto",
            SegMethod::Portrait => "portrait",
            SegMethod::Matting => "matting",
            SegMethod::Grabcut => "grabcut",
        }
    }
}

impl std::str::FromStr for SegMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(SegMethod::Auto),
            "portrait" => Ok(SegMethod::Portrait),
            "matting" => Ok(SegMethod::Matting),
            "grabcut" => Ok(SegMethod::Grabcut),
            other => Err(format!("unknown segmentation method: {other}")),
        }
    }
}

/// Which backend actually produced the mask for a composite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MethodUsed {
    Portrait,
    Matting,
    Grabcut,
    /// Every backend failed; an all-ones mask was used (background never
    /// shows through).
    Fallback,
    /// Compositing was skipped entirely and the original photograph was
    /// returned (missing backdrop, or a pinned backend was unusable).
    Skipped,
}

impl MethodUsed {
    pub fn as_str(&self) -> &'static str {
        match self {
            MethodUsed::Portrait => "portrait",
            MethodUsed::Matting => "matting",
            MethodUsed::Grabcut => "grabcut",
            MethodUsed::Fallback => "fallback",
            MethodUsed::Skipped => "skipped",
        }
    }
}

/// Outcome of one compositing request.
///
/// Carries the method that produced the mask and any warnings accumulated on
/// the way, so degraded paths stay observable without ever failing the
/// request.
#[derive(Debug)]
pub struct CompositeResult {
    pub image: RgbImage,
    pub method: MethodUsed,
    pub warnings: Vec<String>,
}

/// Bounding box for a detected face, in source-image pixel coordinates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FaceBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub confidence: f32,
}

impl FaceBox {
    pub fn area(&self) -> f32 {
        self.width * self.height
    }
}

/// Seed rectangle handed to the region-growing segmenter, clipped to the
/// frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SeedRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl SeedRect {
    /// Whether a pixel lies inside the rectangle.
    pub fn contains(&self, px: u32, py: u32) -> bool {
        px >= self.x && px < self.x + self.width && py >= self.y && py < self.y + self.height
    }
}
