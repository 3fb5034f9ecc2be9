use crate::config::ConfigError;
use crate::save::SaveError;
use crate::telemetry::logging::InitError;
use replicate_client::ClientError;
use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Config(#[from] ConfigError),
    #[error("{0}")]
    Client(#[from] ClientError),
    #[error("{0}")]
    Save(#[from] SaveError),
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("logging initialization failed: {0}")]
    Logging(#[from] InitError),
    #[error("terminal runtime error: {0}")]
    Runtime(String),
}
