use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GraphicsError {
    #[error("unrecognised image data: {0}")]
    Format(#[from] io::Error),
    #[error("image decode failed: {0}")]
    Decode(#[from] image::ImageError),
    #[error("image reports a zero dimension ({width}x{height})")]
    ZeroSized { width: u32, height: u32 },
    #[error("target cell area must be non-empty")]
    EmptyArea,
}
