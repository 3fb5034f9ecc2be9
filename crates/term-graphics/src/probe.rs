use crate::error::GraphicsError;
use image::ImageOutputFormat;
use image::io::Reader as ImageReader;
use std::borrow::Cow;
use std::io::Cursor;

const PNG_MAGIC: &[u8] = b"\x89PNG\r\n\x1a\n";

/// Image size in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelSize {
    pub width: u32,
    pub height: u32,
}

/// Reads the width and height from the image header without decoding pixels.
pub fn probe_dimensions(bytes: &[u8]) -> Result<PixelSize, GraphicsError> {
    let (width, height) = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()?
        .into_dimensions()?;
    if width == 0 || height == 0 {
        return Err(GraphicsError::ZeroSized { width, height });
    }
    Ok(PixelSize { width, height })
}

pub fn is_png(bytes: &[u8]) -> bool {
    bytes.starts_with(PNG_MAGIC)
}

/// Returns PNG bytes, transcoding JPEG/WebP input.
pub fn ensure_png(bytes: &[u8]) -> Result<Cow<'_, [u8]>, GraphicsError> {
    if is_png(bytes) {
        return Ok(Cow::Borrowed(bytes));
    }
    let decoded = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()?
        .decode()?;
    let mut out = Cursor::new(Vec::new());
    decoded.write_to(&mut out, ImageOutputFormat::Png)?;
    Ok(Cow::Owned(out.into_inner()))
}
