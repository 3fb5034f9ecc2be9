//! Inline image output for graphics-capable terminals: protocol detection,
//! kitty and iTerm2 encoders, cell-size queries and header-only probing.

mod cell;
mod encoder;
mod error;
mod probe;
mod protocol;

pub use cell::{CellSize, query_cell_size};
pub use encoder::{ImageEncoder, ItermEncoder, KITTY_CHUNK_SIZE, KittyEncoder, encoder_for};
pub use error::GraphicsError;
pub use probe::{PixelSize, ensure_png, is_png, probe_dimensions};
pub use protocol::{GraphicsProtocol, TerminalEnv};
