//! booth-store — Flat-file persistence for the kiosk.
//!
//! Two collaborators for the pipeline: an append-only JSON array of
//! registration records, and a directory of saved photographs addressed by
//! sanitized visitor name plus timestamp.

pub mod photos;
pub mod records;

pub use photos::{sanitize_name, PhotoStore};
pub use records::{RecordStore, Registration};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("image: {0}")]
    Image(#[from] image::ImageError),
}
