use crate::cli::{Cli, DisplayChoice};
use crate::telemetry::logging::LogConfig;
use replicate_client::{ClientConfig, ModelParams};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Older releases read the token from this variable.
pub const LEGACY_TOKEN_ENV: &str = "REPLICATE_API_KEY";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing API token; pass --token or set REPLICATE_API_TOKEN")]
    MissingToken,
    #[error("--timeout must be at least one second")]
    ZeroTimeout,
    #[error("API base {0} cannot be used as a base URL")]
    InvalidApiBase(Url),
}

/// Validated settings, built once at startup and handed to the session and
/// the job driver.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub token: String,
    pub api_base: Url,
    pub model: ModelParams,
    pub prompt: Option<String>,
    pub output_dir: Option<PathBuf>,
    pub display: DisplayChoice,
    pub poll_timeout: Option<Duration>,
    pub logging: LogConfig,
}

impl AppConfig {
    pub fn from_cli(cli: Cli) -> Result<Self, ConfigError> {
        let legacy = std::env::var(LEGACY_TOKEN_ENV).ok();
        Self::resolve(cli, legacy)
    }

    fn resolve(cli: Cli, legacy_token: Option<String>) -> Result<Self, ConfigError> {
        let token = cli
            .token
            .filter(|token| !token.trim().is_empty())
            .or_else(|| legacy_token.filter(|token| !token.trim().is_empty()))
            .ok_or(ConfigError::MissingToken)?;

        let poll_timeout = match cli.timeout {
            Some(0) => return Err(ConfigError::ZeroTimeout),
            Some(secs) => Some(Duration::from_secs(secs)),
            None => None,
        };

        if cli.api_base.cannot_be_a_base() {
            return Err(ConfigError::InvalidApiBase(cli.api_base));
        }

        Ok(Self {
            token: token.trim().to_string(),
            api_base: cli.api_base,
            model: ModelParams {
                variant: cli.model,
                aspect_ratio: cli.aspect,
                output_format: cli.format,
            },
            prompt: cli.prompt.filter(|prompt| !prompt.trim().is_empty()),
            output_dir: cli.output,
            display: cli.display,
            poll_timeout,
            logging: cli.logging.to_config(),
        })
    }

    pub fn client_config(&self) -> ClientConfig {
        ClientConfig::new(self.api_base.clone(), self.token.clone()).with_timeout(self.poll_timeout)
    }
}
