//! The single mutable model behind the UI.
//!
//! Everything that changes what is on screen goes through [`Session::handle`].
//! Side effects the session cannot perform itself (starting a job, writing a
//! file, exiting) come back as an [`Effect`] for the app loop to carry out.

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;
use term_graphics::{CellSize, GraphicsProtocol, PixelSize, ensure_png, probe_dimensions};
use thiserror::Error;
use tracing::{debug, trace};

pub type ImageBytes = Arc<[u8]>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    AwaitingPrompt,
    Generating,
    Displaying,
    Regenerating,
    Failed,
}

impl Mode {
    pub fn job_in_flight(self) -> bool {
        matches!(self, Mode::Generating | Mode::Regenerating)
    }
}

/// The two image actions. Primary regenerates, Secondary downloads.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Selection {
    #[default]
    Primary,
    Secondary,
}

impl Selection {
    pub fn toggled(self) -> Self {
        match self {
            Selection::Primary => Selection::Secondary,
            Selection::Secondary => Selection::Primary,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Viewport {
    pub width: u16,
    pub height: u16,
}

impl Viewport {
    pub fn new(width: u16, height: u16) -> Self {
        Self { width, height }
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GenerationToken(u64);

impl GenerationToken {
    pub fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Display for GenerationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A downloaded image plus what its header said about its size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedImage {
    /// The bytes as downloaded; these are what gets saved.
    pub bytes: ImageBytes,
    /// What the encoder is handed. Same allocation as `bytes` unless the
    /// protocol needed a transcode.
    pub payload: ImageBytes,
    /// Pixel size, or why the image cannot be shown.
    pub pixels: Result<PixelSize, String>,
}

impl GeneratedImage {
    /// Reads the header only; the payload is the downloaded bytes.
    pub fn probe(bytes: Vec<u8>) -> Self {
        let pixels = probe_dimensions(&bytes).map_err(|err| err.to_string());
        let bytes: ImageBytes = bytes.into();
        Self {
            payload: Arc::clone(&bytes),
            bytes,
            pixels,
        }
    }

    /// Probes the image and converts it once into what `protocol` transmits.
    /// Kitty only takes PNG, so other formats are fully decoded here and a
    /// broken body shows up as a diagnostic instead of failing every redraw.
    pub fn prepare(bytes: Vec<u8>, protocol: GraphicsProtocol) -> Self {
        let mut image = Self::probe(bytes);
        if protocol != GraphicsProtocol::Kitty || image.pixels.is_err() {
            return image;
        }
        match ensure_png(&image.bytes) {
            Ok(Cow::Borrowed(_)) => {}
            Ok(Cow::Owned(png)) => image.payload = png.into(),
            Err(err) => image.pixels = Err(err.to_string()),
        }
        image
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Configuration,
    Transport,
    RemoteJob,
    UnexpectedOutput,
    Timeout,
    /// The background task died before reporting.
    Internal,
}

impl FailureKind {
    pub fn title(self) -> &'static str {
        match self {
            FailureKind::Configuration => "Configuration error",
            FailureKind::Transport => "Network error",
            FailureKind::RemoteJob => "Generation failed",
            FailureKind::UnexpectedOutput => "Unexpected response",
            FailureKind::Timeout => "Timed out",
            FailureKind::Internal => "Internal error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct Failure {
    pub kind: FailureKind,
    pub message: String,
}

impl Failure {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Facts about the terminal that only feed diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Capabilities {
    pub protocol: GraphicsProtocol,
    pub terminal: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Insert(char),
    Paste(String),
    Backspace,
    Submit,
    Next,
    Previous,
    Activate,
    /// Select a control and activate it in one go (mouse click, shortcut).
    Press(Selection),
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Action(Action),
    Resize {
        viewport: Viewport,
        cell_size: CellSize,
    },
    Tick,
    JobFinished {
        token: GenerationToken,
        outcome: Result<GeneratedImage, Failure>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    Dispatch {
        token: GenerationToken,
        prompt: String,
    },
    Save {
        bytes: ImageBytes,
        prompt: String,
    },
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    mode: Mode,
    prompt: String,
    input: String,
    viewport: Viewport,
    cell_size: CellSize,
    image: Option<GeneratedImage>,
    selection: Selection,
    render_epoch: u64,
    last_error: Option<Failure>,
    in_flight: Option<GenerationToken>,
    next_token: u64,
    spinner_frame: usize,
    dirty: bool,
    capabilities: Capabilities,
}

impl Session {
    pub fn new(initial_prompt: Option<String>, capabilities: Capabilities) -> Self {
        Self {
            mode: Mode::AwaitingPrompt,
            prompt: String::new(),
            input: initial_prompt.unwrap_or_default(),
            viewport: Viewport::default(),
            cell_size: CellSize::FALLBACK,
            image: None,
            selection: Selection::Primary,
            render_epoch: 0,
            last_error: None,
            in_flight: None,
            next_token: 0,
            spinner_frame: 0,
            dirty: true,
            capabilities,
        }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn cell_size(&self) -> CellSize {
        self.cell_size
    }

    pub fn image(&self) -> Option<&GeneratedImage> {
        self.image.as_ref()
    }

    pub fn selection(&self) -> Selection {
        self.selection
    }

    pub fn render_epoch(&self) -> u64 {
        self.render_epoch
    }

    pub fn last_error(&self) -> Option<&Failure> {
        self.last_error.as_ref()
    }

    pub fn in_flight(&self) -> Option<GenerationToken> {
        self.in_flight
    }

    pub fn spinner_frame(&self) -> usize {
        self.spinner_frame
    }

    pub fn capabilities(&self) -> &Capabilities {
        &self.capabilities
    }

    /// Returns whether a redraw is pending and clears the flag.
    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    /// True when the image controls respond to navigation and activation.
    pub fn controls_active(&self) -> bool {
        self.mode == Mode::Displaying && self.image.is_some()
    }

    pub fn handle(&mut self, event: SessionEvent) -> Option<Effect> {
        match event {
            SessionEvent::Action(action) => self.apply(action),
            SessionEvent::Resize {
                viewport,
                cell_size,
            } => {
                self.viewport = viewport;
                self.cell_size = cell_size;
                self.dirty = true;
                None
            }
            SessionEvent::Tick => {
                if self.mode.job_in_flight() {
                    self.spinner_frame = self.spinner_frame.wrapping_add(1);
                    self.dirty = true;
                }
                None
            }
            SessionEvent::JobFinished { token, outcome } => {
                self.complete(token, outcome);
                None
            }
        }
    }

    fn apply(&mut self, action: Action) -> Option<Effect> {
        match action {
            Action::Quit => Some(Effect::Quit),
            Action::Insert(ch) => {
                if self.mode == Mode::AwaitingPrompt && !ch.is_control() {
                    self.input.push(ch);
                    self.dirty = true;
                }
                None
            }
            Action::Paste(text) => {
                if self.mode == Mode::AwaitingPrompt {
                    let cleaned = text
                        .chars()
                        .map(|ch| if ch.is_whitespace() { ' ' } else { ch })
                        .filter(|ch| !ch.is_control());
                    self.input.extend(cleaned);
                    self.dirty = true;
                }
                None
            }
            Action::Backspace => {
                if self.mode == Mode::AwaitingPrompt && self.input.pop().is_some() {
                    self.dirty = true;
                }
                None
            }
            Action::Submit => self.submit(),
            Action::Next | Action::Previous => {
                if self.controls_active() {
                    self.selection = self.selection.toggled();
                    self.dirty = true;
                }
                None
            }
            Action::Activate => self.activate(),
            Action::Press(selection) => {
                // The regenerate shortcut keeps working while the image is
                // gone, the same way Enter does.
                if self.mode == Mode::Regenerating {
                    return (selection == Selection::Primary).then(|| self.regenerate());
                }
                if !self.controls_active() {
                    return None;
                }
                if self.selection != selection {
                    self.selection = selection;
                    self.dirty = true;
                }
                self.activate()
            }
        }
    }

    fn submit(&mut self) -> Option<Effect> {
        if self.mode != Mode::AwaitingPrompt {
            return None;
        }
        let prompt = self.input.trim();
        if prompt.is_empty() {
            return None;
        }
        self.prompt = prompt.to_string();
        self.input.clear();
        self.last_error = None;
        self.mode = Mode::Generating;
        Some(self.dispatch())
    }

    fn activate(&mut self) -> Option<Effect> {
        match self.mode {
            Mode::AwaitingPrompt => self.submit(),
            Mode::Generating => None,
            Mode::Displaying => match (self.selection, &self.image) {
                (Selection::Primary, Some(_)) => Some(self.regenerate()),
                (Selection::Secondary, Some(image)) => Some(Effect::Save {
                    bytes: Arc::clone(&image.bytes),
                    prompt: self.prompt.clone(),
                }),
                (_, None) => None,
            },
            // Only the regenerate control can be active here; pressing it
            // again supersedes the job in flight.
            Mode::Regenerating => match self.selection {
                Selection::Primary => Some(self.regenerate()),
                Selection::Secondary => None,
            },
            Mode::Failed => {
                self.mode = Mode::AwaitingPrompt;
                self.input = self.prompt.clone();
                self.last_error = None;
                self.dirty = true;
                None
            }
        }
    }

    fn regenerate(&mut self) -> Effect {
        if self.image.take().is_some() {
            self.render_epoch += 1;
        }
        if let Some(previous) = self.in_flight {
            debug!(target: "fluxy::ui", %previous, "superseding generation in flight");
        }
        self.mode = Mode::Regenerating;
        self.last_error = None;
        self.dispatch()
    }

    fn dispatch(&mut self) -> Effect {
        self.next_token += 1;
        let token = GenerationToken(self.next_token);
        self.in_flight = Some(token);
        self.spinner_frame = 0;
        self.dirty = true;
        Effect::Dispatch {
            token,
            prompt: self.prompt.clone(),
        }
    }

    fn complete(&mut self, token: GenerationToken, outcome: Result<GeneratedImage, Failure>) {
        if !self.mode.job_in_flight() || self.in_flight != Some(token) {
            trace!(
                target: "fluxy::ui",
                %token,
                mode = ?self.mode,
                "discarding stale completion"
            );
            return;
        }
        self.in_flight = None;
        match outcome {
            Ok(image) => {
                self.image = Some(image);
                self.render_epoch += 1;
                self.selection = Selection::Primary;
                self.mode = Mode::Displaying;
            }
            Err(failure) => {
                debug!(target: "fluxy::ui", %token, kind = ?failure.kind, "generation failed");
                self.last_error = Some(failure);
                self.mode = Mode::Failed;
            }
        }
        self.dirty = true;
    }
}
