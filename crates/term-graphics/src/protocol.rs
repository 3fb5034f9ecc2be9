use std::env;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GraphicsProtocol {
    Kitty,
    Iterm,
}

impl GraphicsProtocol {
    pub fn as_str(self) -> &'static str {
        match self {
            GraphicsProtocol::Kitty => "kitty",
            GraphicsProtocol::Iterm => "iterm",
        }
    }

    /// Picks a protocol from environment hints. Kitty is the fallback since
    /// most graphics-capable terminals speak it.
    pub fn detect(env: &TerminalEnv) -> Self {
        if env.kitty_window_id {
            return GraphicsProtocol::Kitty;
        }
        let program = env.term_program.as_deref().unwrap_or_default();
        if program == "iTerm.app" || env.lc_terminal.as_deref() == Some("iTerm2") {
            return GraphicsProtocol::Iterm;
        }
        if program == "WezTerm" || program == "vscode" {
            return GraphicsProtocol::Iterm;
        }
        GraphicsProtocol::Kitty
    }
}

impl fmt::Display for GraphicsProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The handful of variables terminals set to identify themselves.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TerminalEnv {
    pub term: Option<String>,
    pub term_program: Option<String>,
    pub lc_terminal: Option<String>,
    pub kitty_window_id: bool,
}

impl TerminalEnv {
    pub fn from_process() -> Self {
        let var = |name: &str| env::var(name).ok().filter(|value| !value.is_empty());
        Self {
            term: var("TERM"),
            term_program: var("TERM_PROGRAM"),
            lc_terminal: var("LC_TERMINAL"),
            kitty_window_id: var("KITTY_WINDOW_ID").is_some(),
        }
    }

    /// Human-readable terminal name for diagnostics.
    pub fn describe(&self) -> String {
        if self.kitty_window_id {
            return "kitty".to_string();
        }
        self.term_program
            .clone()
            .or_else(|| self.lc_terminal.clone())
            .or_else(|| self.term.clone())
            .unwrap_or_else(|| "unknown".to_string())
    }
}
