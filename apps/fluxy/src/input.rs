use crate::planner::FrameSpec;
use crate::session::{Action, Mode, Selection};
use crossterm::event::{
    Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers, MouseButton, MouseEventKind,
};

/// What a terminal event means to the app.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Action(Action),
    Resize { columns: u16, rows: u16 },
}

/// Maps a crossterm event to an input given the current mode and the frame
/// on screen (for mouse hit-testing).
pub fn route(event: &Event, mode: Mode, frame: Option<&FrameSpec>) -> Option<Input> {
    match event {
        Event::Key(key) => route_key(key, mode).map(Input::Action),
        Event::Paste(text) if mode == Mode::AwaitingPrompt => {
            Some(Input::Action(Action::Paste(text.clone())))
        }
        Event::Mouse(mouse) => match mouse.kind {
            MouseEventKind::Down(MouseButton::Left) => frame
                .and_then(|frame| frame.control_at(mouse.column, mouse.row))
                .map(|selection| Input::Action(Action::Press(selection))),
            _ => None,
        },
        Event::Resize(columns, rows) => Some(Input::Resize {
            columns: *columns,
            rows: *rows,
        }),
        _ => None,
    }
}

fn route_key(key: &KeyEvent, mode: Mode) -> Option<Action> {
    if key.kind == KeyEventKind::Release {
        return None;
    }
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    if ctrl && matches!(key.code, KeyCode::Char('c') | KeyCode::Char('d')) {
        return Some(Action::Quit);
    }
    if key.code == KeyCode::Esc {
        return Some(Action::Quit);
    }

    if mode == Mode::AwaitingPrompt {
        return match key.code {
            KeyCode::Enter => Some(Action::Submit),
            KeyCode::Backspace => Some(Action::Backspace),
            KeyCode::Char(ch) if !ctrl && !key.modifiers.contains(KeyModifiers::ALT) => {
                Some(Action::Insert(ch))
            }
            _ => None,
        };
    }

    if key.kind == KeyEventKind::Repeat && key.code == KeyCode::Enter {
        return None;
    }
    match key.code {
        KeyCode::Char('q') => Some(Action::Quit),
        KeyCode::Enter | KeyCode::Char(' ') => Some(Action::Activate),
        KeyCode::Tab | KeyCode::Right | KeyCode::Down | KeyCode::Char('l') => Some(Action::Next),
        KeyCode::BackTab | KeyCode::Left | KeyCode::Up | KeyCode::Char('h') => {
            Some(Action::Previous)
        }
        KeyCode::Char('r') => Some(Action::Press(Selection::Primary)),
        KeyCode::Char('d') | KeyCode::Char('s') => Some(Action::Press(Selection::Secondary)),
        _ => None,
    }
}
