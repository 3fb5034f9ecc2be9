//! Minimal client for Replicate-style prediction APIs, specialised for the
//! hosted FLUX models.

mod client;
mod error;
mod model;
mod prediction;

pub use client::{ClientConfig, DEFAULT_API_BASE, DEFAULT_POLL_INTERVAL, ReplicateClient};
pub use error::{ClientError, Stage};
pub use model::{
    AspectRatio, GenerationRequest, MAX_SAFETY_TOLERANCE, ModelParams, ModelVariant,
    OUTPUT_QUALITY, OutputFormat, PredictionBody, PredictionInput, VariantDefaults,
};
pub use prediction::{JobStatus, Prediction, PredictionStatus, PredictionUrls};
