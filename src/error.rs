use thiserror::Error;

/// Errors raised by the focal-point engine.
///
/// Only caller-caused invalid input and resampler/model failures end up here.
/// "No faces" or "no saliency" are ordinary outcomes and never surface as errors.
#[derive(Debug, Error)]
pub enum FocalError {
    #[error("image has zero area ({width}x{height})")]
    EmptyImage { width: u32, height: u32 },

    #[error("unsupported color type {0}, expected 8-bit RGB (normalize the image first)")]
    UnsupportedColorType(String),

    #[error("target size must be non-zero, got {width}x{height}")]
    InvalidTargetSize { width: u32, height: u32 },

    #[error("resize failed: {0}")]
    Resize(String),

    #[error("failed to load face model: {0}")]
    Model(String),
}

pub type Result<T> = std::result::Result<T, FocalError>;
