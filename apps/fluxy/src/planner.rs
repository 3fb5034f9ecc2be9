//! Pure layout: turns the session into a fully positioned [`FrameSpec`].
//!
//! Every coordinate the sink writes is decided here. The sink only
//! translates what it is given into bytes.

use crate::session::{ImageBytes, Mode, Selection, Session, Viewport};
use ratatui::layout::Rect;
use term_graphics::{CellSize, GraphicsProtocol, PixelSize};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

pub const TITLE_BAND_HEIGHT: u16 = 2;
pub const CONTROLS_BAND_HEIGHT: u16 = 3;
pub const IMAGE_TOP_GAP: u16 = 1;
pub const PROMPT_PANEL_WIDTH: u16 = 64;
pub const PROMPT_PANEL_HEIGHT: u16 = 6;
pub const LOADING_PANEL_WIDTH: u16 = 40;
pub const LOADING_PANEL_HEIGHT: u16 = 3;
pub const ERROR_PANEL_MAX_WIDTH: u16 = 72;
const BUTTON_GAP: u16 = 4;

pub const SPINNER_FRAMES: [&str; 8] = ["⣾", "⣽", "⣻", "⢿", "⡿", "⣟", "⣯", "⣷"];

const REGENERATE_LABEL: &str = "[ Regenerate ]";
const DOWNLOAD_LABEL: &str = "[ Download ]";
const IMAGE_HINT: &str = "←/→ select · enter confirm · q quit";
const PROMPT_HINT: &str = "enter generate · esc quit";
const ERROR_HINT: &str = "enter edit prompt · q quit";
const PROMPT_PLACEHOLDER: &str = "Describe the image to generate…";

/// What the sink drew last, used to decide whether the next frame has to
/// wipe the screen first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LastDrawn {
    pub epoch: u64,
    pub viewport: Viewport,
    pub kind: PanelKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PanelKind {
    Initializing,
    Prompt,
    Loading,
    Error,
    Image,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrameSpec {
    pub viewport: Viewport,
    pub epoch: u64,
    pub must_clear_first: bool,
    pub panel: Panel,
}

impl FrameSpec {
    pub fn kind(&self) -> PanelKind {
        self.panel.kind()
    }

    pub fn last_drawn(&self) -> LastDrawn {
        LastDrawn {
            epoch: self.epoch,
            viewport: self.viewport,
            kind: self.kind(),
        }
    }

    /// Control under the given cell, if any.
    pub fn control_at(&self, column: u16, row: u16) -> Option<Selection> {
        let Panel::Image(panel) = &self.panel else {
            return None;
        };
        panel
            .controls
            .iter()
            .find(|control| {
                let area = control.area;
                column >= area.x
                    && column < area.x.saturating_add(area.width)
                    && row >= area.y
                    && row < area.y.saturating_add(area.height)
            })
            .map(|control| control.selection)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Panel {
    Initializing,
    Prompt(PromptPanel),
    Loading(LoadingPanel),
    Error(ErrorPanel),
    Image(ImagePanel),
}

impl Panel {
    pub fn kind(&self) -> PanelKind {
        match self {
            Panel::Initializing => PanelKind::Initializing,
            Panel::Prompt(_) => PanelKind::Prompt,
            Panel::Loading(_) => PanelKind::Loading,
            Panel::Error(_) => PanelKind::Error,
            Panel::Image(_) => PanelKind::Image,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptPanel {
    pub area: Rect,
    /// Tail of the input that fits on one line; empty shows the placeholder.
    pub visible_input: String,
    pub placeholder: &'static str,
    pub hint: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadingPanel {
    pub area: Rect,
    pub spinner: &'static str,
    pub message: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorPanel {
    pub area: Rect,
    pub title: &'static str,
    pub lines: Vec<String>,
    pub hint: &'static str,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextLine {
    pub x: u16,
    pub y: u16,
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellDims {
    pub cols: u16,
    pub rows: u16,
}

impl CellDims {
    pub fn new(cols: u16, rows: u16) -> Self {
        Self { cols, rows }
    }

    pub fn is_empty(&self) -> bool {
        self.cols == 0 || self.rows == 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePlacement {
    pub x: u16,
    pub y: u16,
    pub cells: CellDims,
    pub bytes: ImageBytes,
    /// What to show instead if the encoder rejects the image.
    pub fallback: EncodeFallback,
}

/// Area and terminal facts for the diagnostic drawn when encoding fails at
/// draw time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodeFallback {
    pub area: Rect,
    pub terminal: String,
    pub protocol: GraphicsProtocol,
}

impl EncodeFallback {
    pub fn lines(&self, reason: &str) -> Vec<String> {
        diagnostic_lines(reason, &self.terminal, self.protocol)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageBody {
    Placed(ImagePlacement),
    Diagnostic { area: Rect, lines: Vec<String> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlButton {
    pub selection: Selection,
    pub label: &'static str,
    pub area: Rect,
    pub selected: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePanel {
    pub title: TextLine,
    pub body: ImageBody,
    pub controls: Vec<ControlButton>,
    pub hint: TextLine,
}

pub fn plan(session: &Session, last: Option<&LastDrawn>) -> FrameSpec {
    let viewport = session.viewport();
    let epoch = session.render_epoch();
    let panel = plan_panel(session, viewport);
    let must_clear_first = match last {
        None => true,
        Some(drawn) => {
            drawn.epoch != epoch || drawn.viewport != viewport || drawn.kind != panel.kind()
        }
    };
    FrameSpec {
        viewport,
        epoch,
        must_clear_first,
        panel,
    }
}

fn plan_panel(session: &Session, viewport: Viewport) -> Panel {
    if viewport.is_empty() {
        return Panel::Initializing;
    }
    match session.mode() {
        Mode::Failed => match session.last_error() {
            Some(failure) => error_panel(viewport, failure.kind.title(), &failure.message),
            None => prompt_panel(viewport, session.input()),
        },
        Mode::AwaitingPrompt => prompt_panel(viewport, session.input()),
        Mode::Generating => loading_panel(viewport, session.spinner_frame(), "Generating image…"),
        Mode::Regenerating => {
            loading_panel(viewport, session.spinner_frame(), "Regenerating image…")
        }
        Mode::Displaying => match session.image() {
            Some(image) => Panel::Image(image_panel(session, viewport, image)),
            // Displaying always carries an image; fall back to the prompt
            // rather than draw an empty frame.
            None => prompt_panel(viewport, session.input()),
        },
    }
}

fn prompt_panel(viewport: Viewport, input: &str) -> Panel {
    let area = centered(viewport, PROMPT_PANEL_WIDTH, PROMPT_PANEL_HEIGHT);
    // Border plus one cell of padding on each side, plus the cursor cell.
    let inner = area.width.saturating_sub(5) as usize;
    Panel::Prompt(PromptPanel {
        area,
        visible_input: tail_to_width(input, inner),
        placeholder: PROMPT_PLACEHOLDER,
        hint: PROMPT_HINT,
    })
}

fn loading_panel(viewport: Viewport, frame: usize, message: &'static str) -> Panel {
    Panel::Loading(LoadingPanel {
        area: centered(viewport, LOADING_PANEL_WIDTH, LOADING_PANEL_HEIGHT),
        spinner: SPINNER_FRAMES[frame % SPINNER_FRAMES.len()],
        message,
    })
}

fn error_panel(viewport: Viewport, title: &'static str, message: &str) -> Panel {
    let width = ERROR_PANEL_MAX_WIDTH.min(viewport.width);
    let inner = width.saturating_sub(4).max(1) as usize;
    let lines = wrap_text(message, inner);
    // Borders, message lines, a blank spacer and the hint.
    let wanted = (lines.len() as u16).saturating_add(4);
    let area = centered(viewport, width, wanted);
    Panel::Error(ErrorPanel {
        area,
        title,
        lines,
        hint: ERROR_HINT,
    })
}

fn image_panel(
    session: &Session,
    viewport: Viewport,
    image: &crate::session::GeneratedImage,
) -> ImagePanel {
    let title = TextLine {
        x: 1,
        y: 0,
        text: truncate_to_width(
            &format!("Prompt: {}", session.prompt()),
            viewport.width.saturating_sub(2) as usize,
        ),
    };

    let top = TITLE_BAND_HEIGHT + IMAGE_TOP_GAP;
    let available = CellDims::new(
        viewport.width,
        viewport
            .height
            .saturating_sub(top)
            .saturating_sub(CONTROLS_BAND_HEIGHT),
    );
    let drawing_area = Rect::new(0, top.min(viewport.height), available.cols, available.rows);

    let body = match &image.pixels {
        Ok(pixels) => {
            let cells = fit_cells(native_cells(*pixels, session.cell_size()), available);
            if cells.is_empty() {
                ImageBody::Diagnostic {
                    area: drawing_area,
                    lines: vec!["Window too small to show the image.".to_string()],
                }
            } else {
                let capabilities = session.capabilities();
                ImageBody::Placed(ImagePlacement {
                    x: (viewport.width - cells.cols) / 2,
                    y: top,
                    cells,
                    bytes: image.payload.clone(),
                    fallback: EncodeFallback {
                        area: drawing_area,
                        terminal: capabilities.terminal.clone(),
                        protocol: capabilities.protocol,
                    },
                })
            }
        }
        Err(reason) => {
            let capabilities = session.capabilities();
            ImageBody::Diagnostic {
                area: drawing_area,
                lines: diagnostic_lines(reason, &capabilities.terminal, capabilities.protocol),
            }
        }
    };

    let controls_top = viewport.height.saturating_sub(CONTROLS_BAND_HEIGHT);
    let button_row = controls_top.saturating_add(1).min(viewport.height.saturating_sub(1));
    let controls = control_buttons(viewport.width, button_row, session.selection());

    let hint_text = truncate_to_width(IMAGE_HINT, viewport.width as usize);
    let hint = TextLine {
        x: viewport.width.saturating_sub(hint_text.width() as u16) / 2,
        y: viewport.height.saturating_sub(1),
        text: hint_text,
    };

    ImagePanel {
        title,
        body,
        controls,
        hint,
    }
}

fn diagnostic_lines(reason: &str, terminal: &str, protocol: GraphicsProtocol) -> Vec<String> {
    vec![
        "Unable to display the image inline.".to_string(),
        format!("Reason: {reason}"),
        format!("Terminal: {terminal}"),
        format!("Graphics protocol: {protocol}"),
        "The image can still be downloaded.".to_string(),
    ]
}

fn control_buttons(width: u16, row: u16, selection: Selection) -> Vec<ControlButton> {
    let labels = [
        (Selection::Primary, REGENERATE_LABEL),
        (Selection::Secondary, DOWNLOAD_LABEL),
    ];
    let total: u16 =
        labels.iter().map(|(_, label)| label.width() as u16).sum::<u16>() + BUTTON_GAP;
    let mut x = width.saturating_sub(total) / 2;
    labels
        .into_iter()
        .map(|(choice, label)| {
            let label_width = (label.width() as u16).min(width.saturating_sub(x));
            let button = ControlButton {
                selection: choice,
                label,
                area: Rect::new(x, row, label_width, 1),
                selected: choice == selection,
            };
            x = x.saturating_add(label_width + BUTTON_GAP).min(width);
            button
        })
        .collect()
}

/// Cells an image covers at its native resolution.
pub fn native_cells(pixels: PixelSize, cell: CellSize) -> CellDims {
    let cell_w = u32::from(cell.width.max(1));
    let cell_h = u32::from(cell.height.max(1));
    let cols = pixels.width.div_ceil(cell_w).clamp(1, u32::from(u16::MAX));
    let rows = pixels.height.div_ceil(cell_h).clamp(1, u32::from(u16::MAX));
    CellDims::new(cols as u16, rows as u16)
}

/// Shrinks `native` into `available` keeping its aspect ratio. Never grows it.
pub fn fit_cells(native: CellDims, available: CellDims) -> CellDims {
    if available.is_empty() || native.is_empty() {
        return CellDims::new(0, 0);
    }
    if native.cols <= available.cols && native.rows <= available.rows {
        return native;
    }
    let (native_cols, native_rows) = (u64::from(native.cols), u64::from(native.rows));
    let (avail_cols, avail_rows) = (u64::from(available.cols), u64::from(available.rows));
    // Whichever side hits its limit first fixes the scale.
    let (cols, rows) = if native_cols * avail_rows <= native_rows * avail_cols {
        (native_cols * avail_rows / native_rows, avail_rows)
    } else {
        (avail_cols, native_rows * avail_cols / native_cols)
    };
    CellDims::new(
        (cols as u16).clamp(1, available.cols),
        (rows as u16).clamp(1, available.rows),
    )
}

fn centered(viewport: Viewport, width: u16, height: u16) -> Rect {
    let width = width.min(viewport.width);
    let height = height.min(viewport.height);
    Rect::new(
        (viewport.width - width) / 2,
        (viewport.height - height) / 2,
        width,
        height,
    )
}

fn truncate_to_width(text: &str, max: usize) -> String {
    if text.width() <= max {
        return text.to_string();
    }
    let mut out = String::new();
    let mut used = 0;
    let budget = max.saturating_sub(1);
    for ch in text.chars() {
        let w = ch.width().unwrap_or(0);
        if used + w > budget {
            break;
        }
        used += w;
        out.push(ch);
    }
    if max > 0 {
        out.push('…');
    }
    out
}

fn tail_to_width(text: &str, max: usize) -> String {
    let mut used = 0;
    let mut start = text.len();
    for (index, ch) in text.char_indices().rev() {
        let w = ch.width().unwrap_or(0);
        if used + w > max {
            break;
        }
        used += w;
        start = index;
    }
    text[start..].to_string()
}

/// Greedy word wrap by display width; words longer than a line are split.
fn wrap_text(text: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    let mut lines = Vec::new();
    for paragraph in text.lines() {
        let mut line = String::new();
        let mut line_width = 0;
        for word in paragraph.split_whitespace() {
            let word_width = word.width();
            if line_width > 0 && line_width + 1 + word_width <= width {
                line.push(' ');
                line.push_str(word);
                line_width += 1 + word_width;
                continue;
            }
            if line_width > 0 {
                lines.push(std::mem::take(&mut line));
                line_width = 0;
            }
            for ch in word.chars() {
                let w = ch.width().unwrap_or(0);
                if line_width + w > width && line_width > 0 {
                    lines.push(std::mem::take(&mut line));
                    line_width = 0;
                }
                line.push(ch);
                line_width += w;
            }
        }
        if !line.is_empty() {
            lines.push(line);
        }
    }
    if lines.is_empty() {
        lines.push(String::new());
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::tests::{capabilities, displaying_session, image, sized_session};
    use crate::session::{
        Action, Failure, FailureKind, GeneratedImage, SessionEvent, Viewport,
    };

    fn cells(width: u16, height: u16) -> CellSize {
        CellSize { width, height }
    }

    fn resize(session: &mut Session, width: u16, height: u16) {
        session.handle(SessionEvent::Resize {
            viewport: Viewport::new(width, height),
            cell_size: cells(10, 20),
        });
    }

    #[test]
    fn zero_viewport_plans_initializing() {
        let session = Session::new(None, capabilities());
        let frame = plan(&session, None);
        assert_eq!(frame.panel, Panel::Initializing);
        assert!(frame.must_clear_first);
    }

    #[test]
    fn planning_is_idempotent() {
        let session = displaying_session();
        let first = plan(&session, None);
        let drawn = first.last_drawn();
        assert_eq!(plan(&session, Some(&drawn)), plan(&session, Some(&drawn)));
        assert_eq!(plan(&session, None), first);
    }

    #[test]
    fn redraw_of_same_frame_needs_no_clear() {
        let session = displaying_session();
        let drawn = plan(&session, None).last_drawn();
        assert!(!plan(&session, Some(&drawn)).must_clear_first);
    }

    #[test]
    fn resize_forces_clear_on_next_image_frame() {
        let mut session = displaying_session();
        let drawn = plan(&session, None).last_drawn();
        resize(&mut session, 100, 30);
        let frame = plan(&session, Some(&drawn));
        assert_eq!(frame.kind(), PanelKind::Image);
        assert!(frame.must_clear_first);
    }

    #[test]
    fn epoch_or_kind_change_forces_clear() {
        let mut session = displaying_session();
        let drawn = plan(&session, None).last_drawn();
        session.handle(SessionEvent::Action(Action::Activate));
        let frame = plan(&session, Some(&drawn));
        assert_eq!(frame.kind(), PanelKind::Loading);
        assert!(frame.must_clear_first);
    }

    #[test]
    fn selection_change_does_not_clear() {
        let mut session = displaying_session();
        let drawn = plan(&session, None).last_drawn();
        session.handle(SessionEvent::Action(Action::Next));
        let frame = plan(&session, Some(&drawn));
        assert!(!frame.must_clear_first);
        let Panel::Image(panel) = frame.panel else {
            panic!("expected image panel");
        };
        assert!(panel.controls[1].selected);
        assert!(!panel.controls[0].selected);
    }

    #[test]
    fn small_image_keeps_native_size() {
        // 64x64 px at 10x20 px cells is 7x4 cells, well inside 120x40.
        let session = displaying_session();
        let Panel::Image(panel) = plan(&session, None).panel else {
            panic!("expected image panel");
        };
        let ImageBody::Placed(placement) = panel.body else {
            panic!("expected placement");
        };
        assert_eq!(placement.cells, CellDims::new(7, 4));
        assert_eq!(placement.x, (120 - 7) / 2);
        assert_eq!(placement.y, TITLE_BAND_HEIGHT + IMAGE_TOP_GAP);
    }

    #[test]
    fn placement_sends_payload_and_carries_fallback() {
        let mut session = sized_session();
        session.handle(SessionEvent::Action(Action::Insert('x')));
        session.handle(SessionEvent::Action(Action::Submit));
        let token = session.in_flight().unwrap();
        let transcoded = GeneratedImage {
            payload: vec![9u8; 3].into(),
            ..image(64, 64, 1)
        };
        session.handle(SessionEvent::JobFinished {
            token,
            outcome: Ok(transcoded),
        });

        let Panel::Image(panel) = plan(&session, None).panel else {
            panic!("expected image panel");
        };
        let ImageBody::Placed(placement) = panel.body else {
            panic!("expected placement");
        };
        assert_eq!(&*placement.bytes, &[9u8; 3]);
        assert_eq!(placement.fallback.area, Rect::new(0, 3, 120, 34));
        let lines = placement.fallback.lines("decoder gave up");
        assert!(lines.contains(&"Reason: decoder gave up".to_string()));
        assert!(lines.contains(&"Terminal: xterm-kitty".to_string()));
        assert!(lines.contains(&"Graphics protocol: kitty".to_string()));
    }

    #[test]
    fn native_cells_round_up() {
        let dims = native_cells(
            PixelSize {
                width: 1024,
                height: 1024,
            },
            cells(9, 19),
        );
        assert_eq!(dims, CellDims::new(114, 54));
    }

    #[test]
    fn never_upscales() {
        let native = CellDims::new(10, 5);
        assert_eq!(fit_cells(native, CellDims::new(200, 100)), native);
    }

    #[test]
    fn downscale_keeps_aspect_within_one_cell() {
        let cases = [
            (CellDims::new(103, 52), CellDims::new(80, 18)),
            (CellDims::new(400, 100), CellDims::new(120, 34)),
            (CellDims::new(57, 205), CellDims::new(200, 40)),
            (CellDims::new(1000, 1), CellDims::new(10, 10)),
        ];
        for (native, available) in cases {
            let fitted = fit_cells(native, available);
            assert!(fitted.cols <= available.cols && fitted.rows <= available.rows);
            assert!(fitted.cols >= 1 && fitted.rows >= 1);
            let ideal_rows = f64::from(fitted.cols) * f64::from(native.rows) / f64::from(native.cols);
            let ideal_cols = f64::from(fitted.rows) * f64::from(native.cols) / f64::from(native.rows);
            assert!(
                (f64::from(fitted.rows) - ideal_rows).abs() <= 1.0
                    || (f64::from(fitted.cols) - ideal_cols).abs() <= 1.0,
                "{native:?} into {available:?} gave {fitted:?}"
            );
        }
    }

    #[test]
    fn large_image_fits_drawing_area() {
        let mut session = sized_session();
        session.handle(SessionEvent::Action(Action::Insert('x')));
        session.handle(SessionEvent::Action(Action::Submit));
        let token = session.in_flight().unwrap();
        session.handle(SessionEvent::JobFinished {
            token,
            outcome: Ok(image(1440, 1440, 7)),
        });
        let Panel::Image(panel) = plan(&session, None).panel else {
            panic!("expected image panel");
        };
        let ImageBody::Placed(placement) = panel.body else {
            panic!("expected placement");
        };
        let max_rows = 40 - TITLE_BAND_HEIGHT - IMAGE_TOP_GAP - CONTROLS_BAND_HEIGHT;
        assert_eq!(placement.cells.rows, max_rows);
        assert!(placement.cells.cols <= 120);
        assert!(placement.y + placement.cells.rows <= 40 - CONTROLS_BAND_HEIGHT);
    }

    #[test]
    fn undecodable_image_gets_diagnostic_body() {
        let mut session = sized_session();
        session.handle(SessionEvent::Action(Action::Insert('x')));
        session.handle(SessionEvent::Action(Action::Submit));
        let token = session.in_flight().unwrap();
        session.handle(SessionEvent::JobFinished {
            token,
            outcome: Ok(GeneratedImage {
                pixels: Err("unsupported format".into()),
                ..GeneratedImage::probe(vec![0u8; 4])
            }),
        });
        let Panel::Image(panel) = plan(&session, None).panel else {
            panic!("expected image panel");
        };
        let ImageBody::Diagnostic { lines, .. } = panel.body else {
            panic!("expected diagnostic");
        };
        assert!(lines.iter().any(|line| line.contains("unsupported format")));
        assert!(lines.iter().any(|line| line.contains("xterm-kitty")));
        assert!(lines.iter().any(|line| line.contains("kitty")));
        assert_eq!(panel.controls.len(), 2);
    }

    #[test]
    fn prompt_panel_is_centered_and_clamped() {
        let mut session = Session::new(Some("a red fox".into()), capabilities());
        resize(&mut session, 120, 40);
        let Panel::Prompt(panel) = plan(&session, None).panel else {
            panic!("expected prompt panel");
        };
        assert_eq!(panel.area, Rect::new(28, 17, PROMPT_PANEL_WIDTH, PROMPT_PANEL_HEIGHT));
        assert_eq!(panel.visible_input, "a red fox");

        resize(&mut session, 30, 4);
        let Panel::Prompt(panel) = plan(&session, None).panel else {
            panic!("expected prompt panel");
        };
        assert_eq!(panel.area, Rect::new(0, 0, 30, 4));
    }

    #[test]
    fn long_input_shows_its_tail() {
        let long = "word ".repeat(40);
        let mut session = Session::new(Some(long.clone()), capabilities());
        resize(&mut session, 120, 40);
        let Panel::Prompt(panel) = plan(&session, None).panel else {
            panic!("expected prompt panel");
        };
        assert_eq!(panel.visible_input.width(), PROMPT_PANEL_WIDTH as usize - 5);
        assert!(long.ends_with(&panel.visible_input));
    }

    #[test]
    fn loading_message_distinguishes_regeneration() {
        let mut session = displaying_session();
        session.handle(SessionEvent::Action(Action::Activate));
        session.handle(SessionEvent::Tick);
        let Panel::Loading(panel) = plan(&session, None).panel else {
            panic!("expected loading panel");
        };
        assert_eq!(panel.message, "Regenerating image…");
        assert_eq!(panel.spinner, SPINNER_FRAMES[1]);
        assert_eq!(panel.area.width, LOADING_PANEL_WIDTH);
    }

    #[test]
    fn error_panel_wraps_to_viewport() {
        let mut session = sized_session();
        session.handle(SessionEvent::Action(Action::Insert('x')));
        session.handle(SessionEvent::Action(Action::Submit));
        let token = session.in_flight().unwrap();
        let message = "the prediction failed because the service reported an error that is long enough to wrap";
        session.handle(SessionEvent::JobFinished {
            token,
            outcome: Err(Failure::new(FailureKind::RemoteJob, message)),
        });
        resize(&mut session, 40, 20);
        let Panel::Error(panel) = plan(&session, None).panel else {
            panic!("expected error panel");
        };
        assert_eq!(panel.area.width, 40);
        assert_eq!(panel.title, "Generation failed");
        assert!(panel.lines.len() > 1);
        assert!(panel.lines.iter().all(|line| line.width() <= 36));
        assert_eq!(panel.lines.join(" "), message);
    }

    #[test]
    fn controls_are_hit_testable() {
        let session = displaying_session();
        let frame = plan(&session, None);
        let Panel::Image(panel) = &frame.panel else {
            panic!("expected image panel");
        };
        let download = panel.controls[1].area;
        assert_eq!(
            frame.control_at(download.x + 1, download.y),
            Some(Selection::Secondary)
        );
        let regenerate = panel.controls[0].area;
        assert_eq!(
            frame.control_at(regenerate.x, regenerate.y),
            Some(Selection::Primary)
        );
        assert_eq!(frame.control_at(0, 0), None);
        assert!(regenerate.x + regenerate.width < download.x);
    }

    #[test]
    fn tiny_window_reports_instead_of_placing() {
        let mut session = displaying_session();
        resize(&mut session, 40, 6);
        let Panel::Image(panel) = plan(&session, None).panel else {
            panic!("expected image panel");
        };
        assert!(matches!(panel.body, ImageBody::Diagnostic { .. }));
    }

    #[test]
    fn truncation_marks_cut_text() {
        assert_eq!(truncate_to_width("abcdef", 4), "abc…");
        assert_eq!(truncate_to_width("abc", 4), "abc");
        assert_eq!(tail_to_width("abcdef", 3), "def");
    }
}
