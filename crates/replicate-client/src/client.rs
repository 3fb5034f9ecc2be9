use crate::error::{ClientError, Stage};
use crate::model::GenerationRequest;
use crate::prediction::{JobStatus, Prediction};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tokio::time::{Instant, sleep};
use tracing::{debug, info, warn};
use url::Url;

pub const DEFAULT_API_BASE: &str = "https://api.replicate.com/";
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub api_base: Url,
    pub token: String,
    pub poll_interval: Duration,
    /// Upper bound on the whole poll phase. `None` polls until the service
    /// reports a terminal status.
    pub timeout: Option<Duration>,
}

impl ClientConfig {
    pub fn new(api_base: Url, token: impl Into<String>) -> Self {
        Self {
            api_base,
            token: token.into(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            timeout: None,
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

#[derive(Debug, Clone)]
pub struct ReplicateClient {
    http: Client,
    config: ClientConfig,
}

impl ReplicateClient {
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|err| ClientError::Config(err.to_string()))?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn url(&self, path: &str) -> Result<Url, ClientError> {
        self.config
            .api_base
            .join(path)
            .map_err(|err| ClientError::Config(format!("invalid API path '{path}': {err}")))
    }

    fn parse_url(raw: &str) -> Result<Url, ClientError> {
        Url::parse(raw).map_err(|err| ClientError::Config(format!("invalid URL '{raw}': {err}")))
    }

    /// Checks the request before anything touches the network.
    pub fn validate(&self, request: &GenerationRequest) -> Result<(), ClientError> {
        if self.config.token.trim().is_empty() {
            return Err(ClientError::MissingToken);
        }
        if request.prompt.trim().is_empty() {
            return Err(ClientError::EmptyPrompt);
        }
        Ok(())
    }

    pub async fn submit(&self, request: &GenerationRequest) -> Result<Prediction, ClientError> {
        self.validate(request)?;
        let url = self.url(&request.params.variant.predictions_path())?;
        debug!(
            target: "replicate::client",
            %url,
            variant = request.params.variant.name(),
            "submitting prediction"
        );

        let response = self
            .http
            .post(url)
            .bearer_auth(&self.config.token)
            .json(&request.body())
            .send()
            .await
            .map_err(ClientError::http(Stage::Submit))?;

        read_json(Stage::Submit, response).await
    }

    pub async fn poll(&self, prediction: &Prediction) -> Result<Prediction, ClientError> {
        let url = Self::parse_url(&prediction.urls.get)?;
        let response = self
            .http
            .get(url)
            .bearer_auth(&self.config.token)
            .send()
            .await
            .map_err(ClientError::http(Stage::Poll))?;

        read_json(Stage::Poll, response).await
    }

    /// Downloads an output file. Delivery URLs are public, so no credential
    /// is attached.
    pub async fn fetch_output(&self, url: &str) -> Result<Vec<u8>, ClientError> {
        let url = Self::parse_url(url)?;
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(ClientError::http(Stage::Fetch))?;
        let response = check_status(Stage::Fetch, response).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(ClientError::http(Stage::Fetch))?;
        Ok(bytes.to_vec())
    }

    /// Submits, polls until the prediction settles, and downloads the first
    /// output.
    pub async fn generate(&self, request: &GenerationRequest) -> Result<Vec<u8>, ClientError> {
        self.validate(request)?;

        let started = Instant::now();
        let mut prediction = self.submit(request).await?;
        info!(
            target: "replicate::client",
            id = %prediction.id,
            status = ?prediction.status,
            "prediction created"
        );

        let output = loop {
            match prediction.job_status()? {
                JobStatus::Succeeded(url) => break url,
                JobStatus::Failed(reason) => {
                    warn!(target: "replicate::client", id = %prediction.id, %reason, "prediction failed");
                    return Err(ClientError::PredictionFailed(reason));
                }
                JobStatus::Canceled => {
                    warn!(target: "replicate::client", id = %prediction.id, "prediction canceled");
                    return Err(ClientError::PredictionCanceled);
                }
                JobStatus::Pending => {}
            }

            if let Some(limit) = self.config.timeout {
                if started.elapsed() >= limit {
                    return Err(ClientError::TimedOut(limit));
                }
            }

            sleep(self.config.poll_interval).await;
            prediction = self.poll(&prediction).await?;
            debug!(
                target: "replicate::client",
                id = %prediction.id,
                status = ?prediction.status,
                "polled prediction"
            );
        };

        let bytes = self.fetch_output(&output).await?;
        info!(
            target: "replicate::client",
            id = %prediction.id,
            bytes = bytes.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "output downloaded"
        );
        Ok(bytes)
    }
}

async fn check_status(stage: Stage, response: Response) -> Result<Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ClientError::Status {
        stage,
        status,
        body: error_detail(&body),
    })
}

async fn read_json<T: DeserializeOwned>(stage: Stage, response: Response) -> Result<T, ClientError> {
    let response = check_status(stage, response).await?;
    response.json().await.map_err(ClientError::http(stage))
}

/// Error bodies are usually `{"detail": "..."}`; fall back to the raw text.
fn error_detail(body: &str) -> String {
    #[derive(serde::Deserialize)]
    struct ErrorBody {
        detail: Option<String>,
        title: Option<String>,
    }

    match serde_json::from_str::<ErrorBody>(body) {
        Ok(ErrorBody {
            detail: Some(detail),
            ..
        }) => detail,
        Ok(ErrorBody {
            title: Some(title),
            ..
        }) => title,
        _ => body.trim().to_string(),
    }
}
