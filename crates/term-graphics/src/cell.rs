use crossterm::terminal;
use tracing::debug;

/// Pixel size of one terminal cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellSize {
    pub width: u16,
    pub height: u16,
}

impl CellSize {
    /// Used when the terminal does not report its pixel size.
    pub const FALLBACK: CellSize = CellSize {
        width: 10,
        height: 20,
    };

    /// Derives the cell size from a window report; `None` when any field is
    /// zero, which is how terminals without pixel reporting answer.
    pub fn from_window(columns: u16, rows: u16, width_px: u16, height_px: u16) -> Option<Self> {
        if columns == 0 || rows == 0 || width_px == 0 || height_px == 0 {
            return None;
        }
        let width = width_px / columns;
        let height = height_px / rows;
        (width > 0 && height > 0).then_some(CellSize { width, height })
    }
}

impl Default for CellSize {
    fn default() -> Self {
        Self::FALLBACK
    }
}

/// Asks the terminal for its font cell size, falling back to
/// [`CellSize::FALLBACK`].
pub fn query_cell_size() -> CellSize {
    match terminal::window_size() {
        Ok(size) => CellSize::from_window(size.columns, size.rows, size.width, size.height)
            .unwrap_or_else(|| {
                debug!(
                    target: "term_graphics::cell",
                    columns = size.columns,
                    rows = size.rows,
                    width = size.width,
                    height = size.height,
                    "terminal reported no pixel size; using fallback"
                );
                CellSize::FALLBACK
            }),
        Err(err) => {
            debug!(target: "term_graphics::cell", error = %err, "window size query failed");
            CellSize::FALLBACK
        }
    }
}
