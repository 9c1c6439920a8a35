//! Error types for the cloud detection engine.
//!
//! Nothing in the detection path is fatal: sub-detectors report failures through
//! [`CloudError`] and the orchestrators downgrade them to "found nothing".

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CloudError {
    #[error("input image is empty")]
    EmptyImage,

    #[error("page geometry has zero area: {width} x {height}")]
    InvalidPageGeometry { width: f64, height: f64 },

    #[error("buffer does not match image dimensions {width} x {height}")]
    BufferMismatch { width: u32, height: u32 },

    #[error("detector `{detector}` failed: {reason}")]
    DetectorFailed { detector: &'static str, reason: String },

    #[error("detector `{detector}` panicked")]
    DetectorPanicked { detector: &'static str },

    #[error("page {page_number} timed out after {seconds} s")]
    PageTimeout { page_number: u32, seconds: u64 },

    #[error("page {page_number} task failed: {reason}")]
    PageTask { page_number: u32, reason: String },

    #[error("image error: {0}")]
    Image(#[from] image::ImageError),

    #[error("config error: {0}")]
    Config(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, CloudError>;
