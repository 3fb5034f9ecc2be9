use crate::session::{Failure, FailureKind, GeneratedImage, GenerationToken};
use replicate_client::{ClientError, GenerationRequest, ModelParams, ReplicateClient};
use std::future::Future;
use std::sync::Arc;
use std::sync::mpsc::Sender;
use std::time::Instant;
use term_graphics::GraphicsProtocol;
use tokio::runtime::Handle;
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, info, warn};

/// One finished generation, tagged with the token it was dispatched under.
#[derive(Debug)]
pub struct JobCompletion {
    pub token: GenerationToken,
    pub outcome: Result<GeneratedImage, Failure>,
}

impl From<ClientError> for Failure {
    fn from(err: ClientError) -> Self {
        let kind = match &err {
            ClientError::MissingToken | ClientError::EmptyPrompt | ClientError::Config(_) => {
                FailureKind::Configuration
            }
            ClientError::Http { .. } | ClientError::Status { .. } => FailureKind::Transport,
            ClientError::PredictionFailed(_) | ClientError::PredictionCanceled => {
                FailureKind::RemoteJob
            }
            ClientError::UnexpectedOutput(_) => FailureKind::UnexpectedOutput,
            ClientError::TimedOut(_) => FailureKind::Timeout,
        };
        Failure::new(kind, err.to_string())
    }
}

/// Runs one generation to completion: submit, poll, download.
pub async fn start(
    client: &ReplicateClient,
    prompt: &str,
    params: ModelParams,
) -> Result<Vec<u8>, Failure> {
    let request = GenerationRequest::new(prompt, params);
    client.generate(&request).await.map_err(Failure::from)
}

/// Spawns generations on the runtime and reports each one back to the UI
/// thread over a channel.
#[derive(Clone)]
pub struct JobDriver {
    client: Arc<ReplicateClient>,
    params: ModelParams,
    protocol: GraphicsProtocol,
    runtime: Handle,
    completions: Sender<JobCompletion>,
}

impl JobDriver {
    pub fn new(
        client: Arc<ReplicateClient>,
        params: ModelParams,
        protocol: GraphicsProtocol,
        runtime: Handle,
        completions: Sender<JobCompletion>,
    ) -> Self {
        Self {
            client,
            params,
            protocol,
            runtime,
            completions,
        }
    }

    pub fn dispatch(&self, token: GenerationToken, prompt: String) -> JoinHandle<()> {
        let client = Arc::clone(&self.client);
        let params = self.params;
        let protocol = self.protocol;
        debug!(target: "fluxy::job", %token, variant = params.variant.name(), "generation dispatched");
        self.report(token, async move {
            let bytes = start(&client, &prompt, params).await?;
            Ok::<_, Failure>(GeneratedImage::prepare(bytes, protocol))
        })
    }

    /// Runs `work` as its own task and sends exactly one completion for it,
    /// even when the task panics or is aborted.
    fn report<F>(&self, token: GenerationToken, work: F) -> JoinHandle<()>
    where
        F: Future<Output = Result<GeneratedImage, Failure>> + Send + 'static,
    {
        let worker = self.runtime.spawn(work);
        let completions = self.completions.clone();
        self.runtime.spawn(async move {
            let started = Instant::now();
            let outcome = worker.await.unwrap_or_else(|err| Err(Failure::from(err)));

            match &outcome {
                Ok(image) => info!(
                    target: "fluxy::job",
                    %token,
                    bytes = image.bytes.len(),
                    decodable = image.pixels.is_ok(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "generation finished"
                ),
                Err(failure) => warn!(
                    target: "fluxy::job",
                    %token,
                    kind = ?failure.kind,
                    error = %failure,
                    "generation failed"
                ),
            }

            if completions.send(JobCompletion { token, outcome }).is_err() {
                debug!(target: "fluxy::job", %token, "ui loop gone; dropping completion");
            }
        })
    }
}

impl From<JoinError> for Failure {
    fn from(err: JoinError) -> Self {
        if !err.is_panic() {
            return Failure::new(FailureKind::Internal, "generation task was cancelled");
        }
        let payload = err.into_panic();
        let detail = payload
            .downcast_ref::<&str>()
            .map(|msg| msg.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        Failure::new(
            FailureKind::Internal,
            format!("generation task panicked: {detail}"),
        )
    }
}
