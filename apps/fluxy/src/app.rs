use crate::config::AppConfig;
use crate::error::AppError;
use crate::input::{self, Input};
use crate::job::{JobCompletion, JobDriver};
use crate::planner::{FrameSpec, plan};
use crate::save::save_image;
use crate::session::{Capabilities, Effect, Session, SessionEvent, Viewport};
use crate::sink::OutputSink;
use crossterm::cursor::{Hide, Show};
use crossterm::event::{
    self, DisableBracketedPaste, DisableMouseCapture, EnableBracketedPaste, EnableMouseCapture,
    Event,
};
use crossterm::execute;
use crossterm::terminal::{
    self, EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use replicate_client::{OutputFormat, ReplicateClient};
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver};
use std::time::{Duration, Instant};
use term_graphics::{TerminalEnv, encoder_for, query_cell_size};
use tokio::runtime::Handle;
use tracing::{debug, info, warn};

const INPUT_POLL: Duration = Duration::from_millis(25);
const TICK_INTERVAL: Duration = Duration::from_millis(100);

/// How the interactive session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Quit,
    Saved(PathBuf),
}

/// Where downloads land.
#[derive(Debug, Clone)]
pub struct SaveTarget {
    pub dir: Option<PathBuf>,
    pub format: OutputFormat,
}

/// Runs the interactive session until the user quits or downloads an image.
///
/// The terminal loop blocks, so it runs on the blocking pool while
/// generations run as tasks on the current runtime.
pub async fn run(config: AppConfig) -> Result<Outcome, AppError> {
    let env = TerminalEnv::from_process();
    let protocol = config.display.resolve(&env);
    info!(
        target: "fluxy::ui",
        %protocol,
        terminal = %env.describe(),
        variant = config.model.variant.name(),
        "starting session"
    );

    let client = Arc::new(ReplicateClient::new(config.client_config())?);
    let (tx, rx) = mpsc::channel();
    let driver = JobDriver::new(client, config.model, protocol, Handle::current(), tx);
    let session = Session::new(
        config.prompt.clone(),
        Capabilities {
            protocol,
            terminal: env.describe(),
        },
    );
    let app = App::new(
        session,
        OutputSink::new(encoder_for(protocol)),
        driver,
        rx,
        SaveTarget {
            dir: config.output_dir.clone(),
            format: config.model.output_format,
        },
    );

    tokio::task::spawn_blocking(move || app.run_terminal())
        .await
        .map_err(|err| AppError::Runtime(err.to_string()))?
}

/// Glue between the terminal, the session and the job driver.
pub struct App {
    session: Session,
    sink: OutputSink,
    driver: JobDriver,
    completions: Receiver<JobCompletion>,
    save: SaveTarget,
    last_frame: Option<FrameSpec>,
}

impl App {
    pub fn new(
        session: Session,
        sink: OutputSink,
        driver: JobDriver,
        completions: Receiver<JobCompletion>,
        save: SaveTarget,
    ) -> Self {
        Self {
            session,
            sink,
            driver,
            completions,
            save,
            last_frame: None,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn last_frame(&self) -> Option<&FrameSpec> {
        self.last_frame.as_ref()
    }

    /// Takes over the terminal, runs the loop and always hands the terminal
    /// back, even when the loop fails.
    pub fn run_terminal(mut self) -> Result<Outcome, AppError> {
        let mut stdout = io::stdout();
        let guard = TerminalGuard::enter(&mut stdout)?;

        let (columns, rows) = terminal::size()?;
        self.resize(columns, rows);
        debug!(target: "fluxy::ui", columns, rows, "ui loop started");

        let result = self.event_loop(&mut stdout);
        let cleared = self
            .sink
            .clear_screen(&mut stdout)
            .and_then(|_| stdout.flush());
        let restored = guard.restore(&mut stdout);

        let outcome = result?;
        cleared?;
        restored?;
        info!(target: "fluxy::ui", ?outcome, "session ended");
        Ok(outcome)
    }

    fn event_loop<W: Write>(&mut self, out: &mut W) -> Result<Outcome, AppError> {
        let mut last_tick = Instant::now();
        loop {
            self.drain_completions();
            self.draw_if_dirty(out)?;

            if event::poll(INPUT_POLL)? {
                let event = event::read()?;
                if let Some(outcome) = self.handle_terminal_event(&event)? {
                    return Ok(outcome);
                }
            }

            if last_tick.elapsed() >= TICK_INTERVAL {
                self.tick();
                last_tick = Instant::now();
            }
        }
    }

    /// Routes one terminal event through the session and performs whatever
    /// it asks for. Returns the outcome once the session is over.
    pub fn handle_terminal_event(&mut self, event: &Event) -> Result<Option<Outcome>, AppError> {
        let Some(input) = input::route(event, self.session.mode(), self.last_frame.as_ref())
        else {
            return Ok(None);
        };
        match input {
            Input::Action(action) => {
                let effect = self.session.handle(SessionEvent::Action(action));
                self.perform(effect)
            }
            Input::Resize { columns, rows } => {
                self.resize(columns, rows);
                Ok(None)
            }
        }
    }

    /// Feeds every finished generation into the session without blocking.
    pub fn drain_completions(&mut self) -> usize {
        let mut drained = 0;
        while let Ok(JobCompletion { token, outcome }) = self.completions.try_recv() {
            drained += 1;
            if self.session.in_flight() != Some(token) {
                debug!(target: "fluxy::ui", %token, "discarding superseded completion");
            }
            self.session
                .handle(SessionEvent::JobFinished { token, outcome });
        }
        drained
    }

    pub fn tick(&mut self) {
        self.session.handle(SessionEvent::Tick);
    }

    /// Plans and renders a frame if anything changed since the last one.
    pub fn draw_if_dirty<W: Write>(&mut self, out: &mut W) -> io::Result<bool> {
        if !self.session.take_dirty() {
            return Ok(false);
        }
        let frame = plan(&self.session, self.sink.last_drawn());
        self.sink.render(&frame, out)?;
        self.last_frame = Some(frame);
        Ok(true)
    }

    fn resize(&mut self, columns: u16, rows: u16) {
        self.session.handle(SessionEvent::Resize {
            viewport: Viewport::new(columns, rows),
            cell_size: query_cell_size(),
        });
    }

    fn perform(&mut self, effect: Option<Effect>) -> Result<Option<Outcome>, AppError> {
        match effect {
            None => Ok(None),
            Some(Effect::Dispatch { token, prompt }) => {
                self.driver.dispatch(token, prompt);
                Ok(None)
            }
            Some(Effect::Save { bytes, prompt }) => {
                let path = save_image(self.save.dir.as_deref(), &prompt, self.save.format, &bytes)?;
                Ok(Some(Outcome::Saved(path)))
            }
            Some(Effect::Quit) => Ok(Some(Outcome::Quit)),
        }
    }
}

/// Raw mode, alternate screen, bracketed paste, mouse capture and a hidden
/// cursor for as long as it lives.
struct TerminalGuard {
    active: bool,
}

impl TerminalGuard {
    fn enter<W: Write>(out: &mut W) -> io::Result<Self> {
        enable_raw_mode()?;
        let guard = Self { active: true };
        execute!(
            out,
            EnterAlternateScreen,
            EnableBracketedPaste,
            EnableMouseCapture,
            Hide
        )?;
        Ok(guard)
    }

    fn restore<W: Write>(mut self, out: &mut W) -> io::Result<()> {
        self.active = false;
        let screen = execute!(
            out,
            Show,
            DisableMouseCapture,
            DisableBracketedPaste,
            LeaveAlternateScreen
        );
        let raw = disable_raw_mode();
        screen.and(raw)
    }
}

impl Drop for TerminalGuard {
    fn drop(&mut self) {
        if self.active {
            let mut stdout = io::stdout();
            if let Err(err) = execute!(
                stdout,
                Show,
                DisableMouseCapture,
                DisableBracketedPaste,
                LeaveAlternateScreen
            ) {
                warn!(target: "fluxy::ui", error = %err, "failed to restore terminal screen");
            }
            let _ = disable_raw_mode();
        }
    }
}
