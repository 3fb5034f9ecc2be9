use crate::error::GraphicsError;
use crate::probe::ensure_png;
use crate::protocol::GraphicsProtocol;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use std::fmt::Write as _;

/// Maximum base64 payload per kitty escape.
pub const KITTY_CHUNK_SIZE: usize = 4096;
const KITTY_IMAGE_ID: u32 = 1;
const KITTY_PLACEMENT_ID: u32 = 1;
const KITTY_DELETE_ALL: &str = "\x1b_Ga=d,d=A,q=2\x1b\\";

/// Turns image bytes into the escape sequence that draws them at the cursor,
/// scaled into a `cols` x `rows` cell box.
pub trait ImageEncoder: Send + Sync {
    fn protocol(&self) -> GraphicsProtocol;

    fn encode(&self, image: &[u8], cols: u16, rows: u16) -> Result<String, GraphicsError>;

    /// Sequence that removes every image this encoder may have drawn.
    fn clear_all_images(&self) -> &'static str;
}

pub fn encoder_for(protocol: GraphicsProtocol) -> Box<dyn ImageEncoder> {
    match protocol {
        GraphicsProtocol::Kitty => Box::new(KittyEncoder),
        GraphicsProtocol::Iterm => Box::new(ItermEncoder),
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct KittyEncoder;

impl ImageEncoder for KittyEncoder {
    fn protocol(&self) -> GraphicsProtocol {
        GraphicsProtocol::Kitty
    }

    fn encode(&self, image: &[u8], cols: u16, rows: u16) -> Result<String, GraphicsError> {
        if cols == 0 || rows == 0 {
            return Err(GraphicsError::EmptyArea);
        }
        let png = ensure_png(image)?;
        let encoded = BASE64.encode(png.as_ref());
        let chunks: Vec<&[u8]> = encoded.as_bytes().chunks(KITTY_CHUNK_SIZE).collect();

        let mut out = String::with_capacity(encoded.len() + chunks.len() * 16 + 64);
        for (index, chunk) in chunks.iter().enumerate() {
            let more = u8::from(index + 1 < chunks.len());
            // Base64 output is ASCII, so every chunk boundary is a char boundary.
            let chunk = std::str::from_utf8(chunk).unwrap_or_default();
            if index == 0 {
                let _ = write!(
                    out,
                    "\x1b_Ga=T,f=100,i={KITTY_IMAGE_ID},p={KITTY_PLACEMENT_ID},c={cols},r={rows},C=1,q=2,m={more};{chunk}\x1b\\"
                );
            } else {
                let _ = write!(out, "\x1b_Gm={more};{chunk}\x1b\\");
            }
        }
        Ok(out)
    }

    fn clear_all_images(&self) -> &'static str {
        KITTY_DELETE_ALL
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ItermEncoder;

impl ImageEncoder for ItermEncoder {
    fn protocol(&self) -> GraphicsProtocol {
        GraphicsProtocol::Iterm
    }

    fn encode(&self, image: &[u8], cols: u16, rows: u16) -> Result<String, GraphicsError> {
        if cols == 0 || rows == 0 {
            return Err(GraphicsError::EmptyArea);
        }
        Ok(format!(
            "\x1b]1337;File=inline=1;size={};width={cols};height={rows};preserveAspectRatio=1:{}\x07",
            image.len(),
            BASE64.encode(image)
        ))
    }

    /// Inline images live in the cell grid; the screen clear that follows
    /// removes them.
    fn clear_all_images(&self) -> &'static str {
        ""
    }
}
