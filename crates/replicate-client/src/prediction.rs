use crate::error::ClientError;
use serde::Deserialize;
use serde_json::Value;

/// A prediction as returned by the create and get endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct Prediction {
    pub id: String,
    pub status: PredictionStatus,
    #[serde(default)]
    pub output: Option<Value>,
    #[serde(default)]
    pub error: Option<Value>,
    pub urls: PredictionUrls,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PredictionUrls {
    pub get: String,
    #[serde(default)]
    pub cancel: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PredictionStatus {
    Starting,
    Processing,
    Succeeded,
    Failed,
    Canceled,
    /// Any status this client does not know yet; treated as still running.
    #[serde(other)]
    Unknown,
}

/// Where a prediction stands, with its payload already interpreted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobStatus {
    Pending,
    Succeeded(String),
    Failed(String),
    Canceled,
}

impl Prediction {
    pub fn job_status(&self) -> Result<JobStatus, ClientError> {
        Ok(match self.status {
            PredictionStatus::Starting
            | PredictionStatus::Processing
            | PredictionStatus::Unknown => JobStatus::Pending,
            PredictionStatus::Succeeded => {
                let output = self.output.as_ref().unwrap_or(&Value::Null);
                JobStatus::Succeeded(output_url(output)?)
            }
            PredictionStatus::Failed => JobStatus::Failed(failure_reason(self.error.as_ref())),
            PredictionStatus::Canceled => JobStatus::Canceled,
        })
    }
}

/// The output is either one URL or a list of URLs; the first one wins.
pub fn output_url(output: &Value) -> Result<String, ClientError> {
    match output {
        Value::String(url) if !url.is_empty() => Ok(url.clone()),
        Value::Array(items) => match items.first() {
            Some(Value::String(url)) if !url.is_empty() => Ok(url.clone()),
            Some(other) => Err(ClientError::UnexpectedOutput(format!(
                "first output entry is not a URL: {other}"
            ))),
            None => Err(ClientError::UnexpectedOutput("output list is empty".into())),
        },
        Value::Null => Err(ClientError::UnexpectedOutput(
            "prediction succeeded without output".into(),
        )),
        other => Err(ClientError::UnexpectedOutput(other.to_string())),
    }
}

pub fn failure_reason(error: Option<&Value>) -> String {
    match error {
        Some(Value::String(reason)) if !reason.is_empty() => reason.clone(),
        None | Some(Value::Null) | Some(Value::String(_)) => "unknown error".to_string(),
        Some(other) => other.to_string(),
    }
}
