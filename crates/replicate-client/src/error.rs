use reqwest::StatusCode;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Which leg of a prediction a transport error happened on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Submit,
    Poll,
    Fetch,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Stage::Submit => "submit",
            Stage::Poll => "poll",
            Stage::Fetch => "fetch",
        })
    }
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("missing API token; pass --token or set REPLICATE_API_TOKEN")]
    MissingToken,
    #[error("prompt must not be empty")]
    EmptyPrompt,
    #[error("config error: {0}")]
    Config(String),
    #[error("{stage} request failed: {source}")]
    Http {
        stage: Stage,
        #[source]
        source: reqwest::Error,
    },
    #[error("{stage} request returned {status}: {body}")]
    Status {
        stage: Stage,
        status: StatusCode,
        body: String,
    },
    #[error("prediction failed: {0}")]
    PredictionFailed(String),
    #[error("prediction was canceled")]
    PredictionCanceled,
    #[error("unexpected prediction output: {0}")]
    UnexpectedOutput(String),
    #[error("prediction did not finish within {}s", .0.as_secs())]
    TimedOut(Duration),
}

impl ClientError {
    pub(crate) fn http(stage: Stage) -> impl FnOnce(reqwest::Error) -> ClientError {
        move |source| ClientError::Http { stage, source }
    }

    /// True for problems that no amount of retrying the same request fixes.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            ClientError::MissingToken | ClientError::EmptyPrompt | ClientError::Config(_)
        )
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, ClientError::Http { .. } | ClientError::Status { .. })
    }

    pub fn is_remote_failure(&self) -> bool {
        matches!(
            self,
            ClientError::PredictionFailed(_) | ClientError::PredictionCanceled
        )
    }
}
