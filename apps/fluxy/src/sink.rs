use crate::planner::{
    ControlButton, ErrorPanel, FrameSpec, ImageBody, ImagePanel, ImagePlacement, LastDrawn,
    LoadingPanel, Panel, PromptPanel, TextLine,
};
use crossterm::cursor::{MoveTo, RestorePosition, SavePosition};
use crossterm::queue;
use crossterm::style::{
    Attribute, Color as TermColor, Print, ResetColor, SetAttribute, SetBackgroundColor,
    SetForegroundColor,
};
use crossterm::terminal::{BeginSynchronizedUpdate, Clear, ClearType, EndSynchronizedUpdate};
use ratatui::buffer::Buffer;
use ratatui::layout::{Alignment, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, BorderType, Padding, Paragraph, Widget, Wrap};
use std::io::{self, Write};
use term_graphics::ImageEncoder;
use tracing::{trace, warn};
use unicode_width::UnicodeWidthStr;

const ACCENT: Color = Color::Indexed(205);
const CONTROL: Color = Color::Indexed(86);
const MUTED: Color = Color::Indexed(245);
const DANGER: Color = Color::Indexed(203);
const CURSOR: &str = "▏";

/// Writes frames to the terminal and remembers the last one it finished.
pub struct OutputSink {
    encoder: Box<dyn ImageEncoder>,
    last: Option<LastDrawn>,
}

impl OutputSink {
    pub fn new(encoder: Box<dyn ImageEncoder>) -> Self {
        Self {
            encoder,
            last: None,
        }
    }

    pub fn last_drawn(&self) -> Option<&LastDrawn> {
        self.last.as_ref()
    }

    pub fn render<W: Write>(&mut self, frame: &FrameSpec, out: &mut W) -> io::Result<()> {
        trace!(
            target: "fluxy::sink",
            kind = ?frame.kind(),
            epoch = frame.epoch,
            clear = frame.must_clear_first,
            "render frame"
        );
        queue!(out, BeginSynchronizedUpdate)?;
        if frame.must_clear_first {
            self.clear_screen(out)?;
        }
        match &frame.panel {
            Panel::Initializing => queue!(out, MoveTo(0, 0), Print("Initializing…"))?,
            Panel::Prompt(panel) => draw_prompt(panel, out)?,
            Panel::Loading(panel) => draw_loading(panel, out)?,
            Panel::Error(panel) => draw_error(panel, out)?,
            Panel::Image(panel) => self.draw_image_panel(panel, out)?,
        }
        queue!(out, EndSynchronizedUpdate)?;
        out.flush()?;
        self.last = Some(frame.last_drawn());
        Ok(())
    }

    /// Removes every inline image, then wipes the text grid. The next frame
    /// is always treated as a fresh draw.
    pub fn clear_screen<W: Write>(&mut self, out: &mut W) -> io::Result<()> {
        out.write_all(self.encoder.clear_all_images().as_bytes())?;
        queue!(out, ResetColor, Clear(ClearType::All))?;
        self.last = None;
        Ok(())
    }

    fn draw_image_panel<W: Write>(&self, panel: &ImagePanel, out: &mut W) -> io::Result<()> {
        draw_text_line(&panel.title, Style::new().fg(ACCENT).add_modifier(Modifier::BOLD), out)?;
        match &panel.body {
            ImageBody::Placed(placement) => self.place_image(placement, out)?,
            ImageBody::Diagnostic { area, lines } => draw_diagnostic(*area, lines, out)?,
        }
        for control in &panel.controls {
            draw_control(control, out)?;
        }
        draw_text_line(&panel.hint, Style::new().fg(MUTED), out)
    }

    fn place_image<W: Write>(&self, placement: &ImagePlacement, out: &mut W) -> io::Result<()> {
        let cells = placement.cells;
        queue!(out, SavePosition, MoveTo(placement.x, placement.y))?;
        match self.encoder.encode(&placement.bytes, cells.cols, cells.rows) {
            Ok(sequence) => out.write_all(sequence.as_bytes())?,
            Err(err) => {
                warn!(
                    target: "fluxy::sink",
                    protocol = %self.encoder.protocol(),
                    error = %err,
                    "image encoding failed"
                );
                let fallback = &placement.fallback;
                draw_diagnostic(fallback.area, &fallback.lines(&err.to_string()), out)?;
            }
        }
        queue!(out, RestorePosition)?;
        Ok(())
    }
}

fn draw_diagnostic<W: Write>(area: Rect, lines: &[String], out: &mut W) -> io::Result<()> {
    let text: Vec<Line> = lines
        .iter()
        .enumerate()
        .map(|(index, line)| {
            let style = if index == 0 {
                Style::new().fg(DANGER).add_modifier(Modifier::BOLD)
            } else {
                Style::new().fg(MUTED)
            };
            Line::styled(line.as_str(), style)
        })
        .collect();
    let paragraph = Paragraph::new(text)
        .alignment(Alignment::Center)
        .wrap(Wrap { trim: true });
    draw_widget(area, paragraph, out)
}

fn draw_prompt<W: Write>(panel: &PromptPanel, out: &mut W) -> io::Result<()> {
    let input = if panel.visible_input.is_empty() {
        Line::from(vec![
            Span::styled(CURSOR, Style::new().fg(ACCENT)),
            Span::styled(panel.placeholder, Style::new().fg(MUTED)),
        ])
    } else {
        Line::from(vec![
            Span::raw(panel.visible_input.as_str()),
            Span::styled(CURSOR, Style::new().fg(ACCENT)),
        ])
    };
    let block = Block::bordered()
        .border_type(BorderType::Rounded)
        .border_style(Style::new().fg(ACCENT))
        .title(" What should FLUX draw? ")
        .padding(Padding::horizontal(1));
    let paragraph = Paragraph::new(vec![
        Line::default(),
        input,
        Line::default(),
        Line::styled(panel.hint, Style::new().fg(MUTED)),
    ])
    .block(block);
    draw_widget(panel.area, paragraph, out)
}

fn draw_loading<W: Write>(panel: &LoadingPanel, out: &mut W) -> io::Result<()> {
    let block = Block::bordered()
        .border_type(BorderType::Rounded)
        .border_style(Style::new().fg(ACCENT));
    let paragraph = Paragraph::new(Line::from(vec![
        Span::styled(panel.spinner, Style::new().fg(ACCENT)),
        Span::raw(" "),
        Span::raw(panel.message),
    ]))
    .alignment(Alignment::Center)
    .block(block);
    draw_widget(panel.area, paragraph, out)
}

fn draw_error<W: Write>(panel: &ErrorPanel, out: &mut W) -> io::Result<()> {
    let block = Block::bordered()
        .border_type(BorderType::Rounded)
        .border_style(Style::new().fg(DANGER))
        .title(format!(" {} ", panel.title))
        .padding(Padding::horizontal(1));
    let mut lines: Vec<Line> = panel.lines.iter().map(|line| Line::raw(line.as_str())).collect();
    lines.push(Line::default());
    lines.push(Line::styled(panel.hint, Style::new().fg(MUTED)));
    draw_widget(panel.area, Paragraph::new(lines).block(block), out)
}

fn draw_control<W: Write>(control: &ControlButton, out: &mut W) -> io::Result<()> {
    if control.area.width == 0 {
        return Ok(());
    }
    queue!(out, MoveTo(control.area.x, control.area.y))?;
    if control.selected {
        queue!(
            out,
            SetAttribute(Attribute::Bold),
            SetForegroundColor(TermColor::Black),
            SetBackgroundColor(to_term_color(ACCENT))
        )?;
    } else {
        queue!(out, SetForegroundColor(to_term_color(CONTROL)))?;
    }
    let label = truncate(control.label, control.area.width as usize);
    queue!(out, Print(label), ResetColor, SetAttribute(Attribute::Reset))
}

fn draw_text_line<W: Write>(line: &TextLine, style: Style, out: &mut W) -> io::Result<()> {
    if line.text.is_empty() {
        return Ok(());
    }
    queue!(out, MoveTo(line.x, line.y))?;
    apply_style(style, out)?;
    queue!(out, Print(&line.text), ResetColor, SetAttribute(Attribute::Reset))
}

fn truncate(text: &str, width: usize) -> &str {
    if text.width() <= width {
        return text;
    }
    let mut end = 0;
    for (index, ch) in text.char_indices() {
        if text[..index + ch.len_utf8()].width() > width {
            break;
        }
        end = index + ch.len_utf8();
    }
    &text[..end]
}

/// Renders a widget into an off-screen buffer sized to `area` and writes the
/// buffer at its absolute position.
fn draw_widget<W: Write, T: Widget>(area: Rect, widget: T, out: &mut W) -> io::Result<()> {
    if area.is_empty() {
        return Ok(());
    }
    let mut buffer = Buffer::empty(area);
    widget.render(area, &mut buffer);
    write_buffer(&buffer, out)
}

fn write_buffer<W: Write>(buffer: &Buffer, out: &mut W) -> io::Result<()> {
    let area = buffer.area;
    let mut current: Option<Style> = None;
    for (offset, row) in buffer.content.chunks(area.width as usize).enumerate() {
        queue!(out, MoveTo(area.x, area.y + offset as u16))?;
        let mut skip = 0usize;
        for cell in row {
            if skip > 0 {
                skip -= 1;
                continue;
            }
            if cell.skip {
                continue;
            }
            let style = Style::new()
                .fg(cell.fg)
                .bg(cell.bg)
                .add_modifier(cell.modifier);
            if current != Some(style) {
                queue!(out, SetAttribute(Attribute::Reset))?;
                apply_style(style, out)?;
                current = Some(style);
            }
            let symbol = cell.symbol();
            queue!(out, Print(symbol))?;
            skip = symbol.width().saturating_sub(1);
        }
    }
    queue!(out, ResetColor, SetAttribute(Attribute::Reset))
}

fn apply_style<W: Write>(style: Style, out: &mut W) -> io::Result<()> {
    if let Some(fg) = style.fg {
        queue!(out, SetForegroundColor(to_term_color(fg)))?;
    }
    if let Some(bg) = style.bg {
        queue!(out, SetBackgroundColor(to_term_color(bg)))?;
    }
    let modifiers = [
        (Modifier::BOLD, Attribute::Bold),
        (Modifier::DIM, Attribute::Dim),
        (Modifier::ITALIC, Attribute::Italic),
        (Modifier::UNDERLINED, Attribute::Underlined),
        (Modifier::REVERSED, Attribute::Reverse),
    ];
    for (modifier, attribute) in modifiers {
        if style.add_modifier.contains(modifier) {
            queue!(out, SetAttribute(attribute))?;
        }
    }
    Ok(())
}

fn to_term_color(color: Color) -> TermColor {
    match color {
        Color::Reset => TermColor::Reset,
        Color::Black => TermColor::Black,
        Color::Red => TermColor::DarkRed,
        Color::Green => TermColor::DarkGreen,
        Color::Yellow => TermColor::DarkYellow,
        Color::Blue => TermColor::DarkBlue,
        Color::Magenta => TermColor::DarkMagenta,
        Color::Cyan => TermColor::DarkCyan,
        Color::Gray => TermColor::Grey,
        Color::DarkGray => TermColor::DarkGrey,
        Color::LightRed => TermColor::Red,
        Color::LightGreen => TermColor::Green,
        Color::LightYellow => TermColor::Yellow,
        Color::LightBlue => TermColor::Blue,
        Color::LightMagenta => TermColor::Magenta,
        Color::LightCyan => TermColor::Cyan,
        Color::White => TermColor::White,
        Color::Indexed(index) => TermColor::AnsiValue(index),
        Color::Rgb(r, g, b) => TermColor::Rgb { r, g, b },
    }
}
