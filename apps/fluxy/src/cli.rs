use clap::{ArgAction, Args, Parser, ValueEnum, ValueHint};
use replicate_client::{AspectRatio, DEFAULT_API_BASE, ModelVariant, OutputFormat};
use std::path::PathBuf;
use term_graphics::{GraphicsProtocol, TerminalEnv};
use url::Url;

use crate::telemetry::logging::{LogConfig, LogLevel};

#[derive(Parser, Debug)]
#[command(
    name = "fluxy",
    about = "🎨 Generate FLUX images and view them inline in your terminal",
    author,
    version,
    disable_version_flag = true
)]
pub struct Cli {
    /// `-V` belongs to `--verbose`, so the version flag is long-only.
    #[arg(long, action = ArgAction::Version, help = "Print version")]
    pub version: Option<bool>,

    #[arg(
        long,
        short = 'p',
        value_name = "TEXT",
        help = "Pre-fill the prompt input"
    )]
    pub prompt: Option<String>,

    #[arg(
        long,
        env = "REPLICATE_API_TOKEN",
        hide_env_values = true,
        value_name = "TOKEN",
        help = "Replicate API token"
    )]
    pub token: Option<String>,

    #[arg(
        long,
        short = 'm',
        value_enum,
        default_value_t = ModelVariant::Schnell,
        help = "FLUX variant to run"
    )]
    pub model: ModelVariant,

    #[arg(
        long,
        short = 'a',
        value_enum,
        default_value_t = AspectRatio::Square,
        help = "Aspect ratio of the generated image"
    )]
    pub aspect: AspectRatio,

    #[arg(
        long,
        short = 'f',
        value_enum,
        default_value_t = OutputFormat::Png,
        help = "Image format requested from the model"
    )]
    pub format: OutputFormat,

    #[arg(
        long,
        short = 'o',
        value_name = "DIR",
        value_hint = ValueHint::DirPath,
        help = "Folder downloaded images are written to (defaults to the current directory)"
    )]
    pub output: Option<PathBuf>,

    #[arg(
        long,
        short = 'd',
        value_enum,
        default_value_t = DisplayChoice::Auto,
        help = "Terminal graphics protocol"
    )]
    pub display: DisplayChoice,

    #[arg(
        long,
        value_name = "SECS",
        help = "Give up on a generation that has not finished after this many seconds"
    )]
    pub timeout: Option<u64>,

    #[arg(
        long,
        env = "REPLICATE_API_BASE",
        default_value = DEFAULT_API_BASE,
        hide = true
    )]
    pub api_base: Url,

    #[command(flatten)]
    pub logging: LoggingArgs,
}

#[derive(Args, Debug, Clone)]
pub struct LoggingArgs {
    #[arg(
        long = "log-level",
        value_enum,
        env = "FLUXY_LOG_LEVEL",
        default_value_t = LogLevel::Warn,
        help = "Minimum log level (error, warn, info, debug, trace)"
    )]
    pub level: LogLevel,

    #[arg(
        long = "log-file",
        value_name = "PATH",
        env = "FLUXY_LOG_FILE",
        value_hint = ValueHint::FilePath,
        help = "Write logs to the specified file instead of the default data directory"
    )]
    pub file: Option<PathBuf>,

    #[arg(long, short = 'V', help = "Shorthand for --log-level debug")]
    pub verbose: bool,
}

impl LoggingArgs {
    pub fn to_config(&self) -> LogConfig {
        let level = if self.verbose {
            self.level.max(LogLevel::Debug)
        } else {
            self.level
        };
        LogConfig {
            level,
            file: self.file.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum DisplayChoice {
    /// Sniff the terminal from its environment variables.
    #[default]
    Auto,
    Kitty,
    Iterm,
}

impl DisplayChoice {
    pub fn resolve(self, env: &TerminalEnv) -> GraphicsProtocol {
        match self {
            DisplayChoice::Auto => GraphicsProtocol::detect(env),
            DisplayChoice::Kitty => GraphicsProtocol::Kitty,
            DisplayChoice::Iterm => GraphicsProtocol::Iterm,
        }
    }
}
