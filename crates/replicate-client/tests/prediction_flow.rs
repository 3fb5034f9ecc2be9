use axum::{
    Json, Router,
    extract::{Path, State},
    http::{HeaderMap, StatusCode, header},
    routing::{get, post},
};
use replicate_client::{
    AspectRatio, ClientConfig, ClientError, GenerationRequest, ModelParams, ModelVariant,
    OutputFormat, ReplicateClient, Stage,
};
use serde_json::{Value, json};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tracing_subscriber::{EnvFilter, fmt::SubscriberBuilder};
use url::Url;

const IMAGE_BYTES: &[u8] = b"\x89PNG\r\n\x1a\nnot-really-a-png";

/// What the stub reports once the pending polls are used up.
#[derive(Clone)]
enum Terminal {
    Succeeded(Value),
    Failed(Value),
    Canceled,
    Never,
}

#[derive(Clone)]
struct Stub {
    base: String,
    pending_polls: usize,
    terminal: Terminal,
    submit_status: StatusCode,
    file_status: StatusCode,
    hits: Arc<AtomicUsize>,
    polls: Arc<AtomicUsize>,
    submitted: Arc<Mutex<Option<(String, Value)>>>,
    authorization: Arc<Mutex<Option<String>>>,
}

impl Stub {
    fn prediction(&self, status: &str) -> Value {
        json!({
            "id": "p-123",
            "status": status,
            "urls": {
                "get": format!("{}/v1/predictions/p-123", self.base),
                "cancel": format!("{}/v1/predictions/p-123/cancel", self.base),
            }
        })
    }

    fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

struct StubBuilder {
    pending_polls: usize,
    terminal: Box<dyn FnOnce(&str) -> Terminal>,
    submit_status: StatusCode,
    file_status: StatusCode,
}

impl StubBuilder {
    fn new(terminal: impl FnOnce(&str) -> Terminal + 'static) -> Self {
        Self {
            pending_polls: 0,
            terminal: Box::new(terminal),
            submit_status: StatusCode::CREATED,
            file_status: StatusCode::OK,
        }
    }

    fn pending_polls(mut self, polls: usize) -> Self {
        self.pending_polls = polls;
        self
    }

    fn submit_status(mut self, status: StatusCode) -> Self {
        self.submit_status = status;
        self
    }

    fn file_status(mut self, status: StatusCode) -> Self {
        self.file_status = status;
        self
    }

    async fn spawn(self) -> Server {
        let _ = SubscriberBuilder::default()
            .with_test_writer()
            .with_env_filter(EnvFilter::from_default_env())
            .try_init();

        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("listener bind");
        let addr = listener.local_addr().expect("local addr");
        let base = format!("http://{addr}");
        let stub = Stub {
            terminal: (self.terminal)(&base),
            base,
            pending_polls: self.pending_polls,
            submit_status: self.submit_status,
            file_status: self.file_status,
            hits: Arc::default(),
            polls: Arc::default(),
            submitted: Arc::default(),
            authorization: Arc::default(),
        };
        let router = Router::new()
            .route("/v1/models/black-forest-labs/:model/predictions", post(submit))
            .route("/v1/predictions/:id", get(poll))
            .route("/files/:name", get(file))
            .with_state(stub.clone());

        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        tokio::spawn(async move {
            axum::serve(listener, router)
                .with_graceful_shutdown(async {
                    let _ = shutdown_rx.await;
                })
                .await
                .ok();
        });

        Server {
            stub,
            addr,
            shutdown: Some(shutdown_tx),
        }
    }
}

struct Server {
    stub: Stub,
    addr: SocketAddr,
    shutdown: Option<oneshot::Sender<()>>,
}

impl Server {
    fn config(&self, token: &str) -> ClientConfig {
        let base = Url::parse(&format!("http://{}/", self.addr)).unwrap();
        ClientConfig::new(base, token).with_poll_interval(Duration::from_millis(10))
    }

    fn client(&self, token: &str) -> ReplicateClient {
        ReplicateClient::new(self.config(token)).expect("build client")
    }
}

impl Drop for Server {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
    }
}

async fn submit(
    State(stub): State<Stub>,
    Path(model): Path<String>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    stub.hits.fetch_add(1, Ordering::SeqCst);
    *stub.submitted.lock().unwrap() = Some((model, body));
    *stub.authorization.lock().unwrap() = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);
    if !stub.submit_status.is_success() {
        return (
            stub.submit_status,
            Json(json!({"title": "Unauthenticated", "detail": "invalid token"})),
        );
    }
    (StatusCode::CREATED, Json(stub.prediction("starting")))
}

async fn poll(State(stub): State<Stub>) -> Json<Value> {
    stub.hits.fetch_add(1, Ordering::SeqCst);
    let seen = stub.polls.fetch_add(1, Ordering::SeqCst) + 1;
    if seen <= stub.pending_polls {
        return Json(stub.prediction("processing"));
    }
    Json(match &stub.terminal {
        Terminal::Succeeded(output) => {
            let mut body = stub.prediction("succeeded");
            body["output"] = output.clone();
            body
        }
        Terminal::Failed(error) => {
            let mut body = stub.prediction("failed");
            body["error"] = error.clone();
            body
        }
        Terminal::Canceled => stub.prediction("canceled"),
        Terminal::Never => stub.prediction("processing"),
    })
}

async fn file(State(stub): State<Stub>) -> (StatusCode, Vec<u8>) {
    stub.hits.fetch_add(1, Ordering::SeqCst);
    if !stub.file_status.is_success() {
        return (stub.file_status, Vec::new());
    }
    (StatusCode::OK, IMAGE_BYTES.to_vec())
}

fn fox(variant: ModelVariant) -> GenerationRequest {
    GenerationRequest::new(
        "a red fox",
        ModelParams {
            variant,
            aspect_ratio: AspectRatio::Square,
            output_format: OutputFormat::Png,
        },
    )
}

#[test_timeout::tokio_timeout_test(10)]
async fn generate_polls_until_succeeded_and_downloads_first_output() {
    let server = StubBuilder::new(|base| {
        Terminal::Succeeded(json!([
            format!("{base}/files/first.png"),
            format!("{base}/files/second.png")
        ]))
    })
    .pending_polls(2)
    .spawn()
    .await;

    let bytes = server
        .client("r8_secret")
        .generate(&fox(ModelVariant::Schnell))
        .await
        .expect("generation succeeds");

    assert_eq!(bytes, IMAGE_BYTES);
    assert_eq!(server.stub.polls.load(Ordering::SeqCst), 3);

    let (model, body) = server.stub.submitted.lock().unwrap().clone().expect("submitted");
    assert_eq!(model, "flux-schnell");
    assert_eq!(
        body,
        json!({
            "input": {
                "prompt": "a red fox",
                "aspect_ratio": "1:1",
                "output_format": "png",
                "output_quality": 100,
                "disable_safety_checker": true,
            }
        })
    );
    assert_eq!(
        server.stub.authorization.lock().unwrap().as_deref(),
        Some("Bearer r8_secret")
    );
}

#[test_timeout::tokio_timeout_test(10)]
async fn string_output_is_fetched() {
    let server = StubBuilder::new(|base| Terminal::Succeeded(json!(format!("{base}/files/out.webp"))))
        .spawn()
        .await;

    let bytes = server
        .client("r8_secret")
        .generate(&fox(ModelVariant::Dev))
        .await
        .expect("generation succeeds");
    assert_eq!(bytes, IMAGE_BYTES);

    let (model, body) = server.stub.submitted.lock().unwrap().clone().expect("submitted");
    assert_eq!(model, "flux-dev");
    assert!(body["input"].get("disable_safety_checker").is_none());
    assert!(body["input"].get("safety_tolerance").is_none());
}

#[test_timeout::tokio_timeout_test(10)]
async fn empty_token_fails_without_network_calls() {
    let server = StubBuilder::new(|_| Terminal::Never).spawn().await;

    let err = server
        .client("")
        .generate(&fox(ModelVariant::Schnell))
        .await
        .unwrap_err();

    assert!(matches!(err, ClientError::MissingToken));
    assert!(err.is_configuration());
    assert_eq!(server.stub.hits(), 0);
}

#[test_timeout::tokio_timeout_test(10)]
async fn blank_prompt_fails_without_network_calls() {
    let server = StubBuilder::new(|_| Terminal::Never).spawn().await;

    let request = GenerationRequest::new("   ", ModelParams::default());
    let err = server.client("r8_secret").generate(&request).await.unwrap_err();

    assert!(matches!(err, ClientError::EmptyPrompt));
    assert_eq!(server.stub.hits(), 0);
}

#[test_timeout::tokio_timeout_test(10)]
async fn failed_prediction_reports_service_reason() {
    let server = StubBuilder::new(|_| Terminal::Failed(json!("CUDA out of memory")))
        .pending_polls(1)
        .spawn()
        .await;

    let err = server
        .client("r8_secret")
        .generate(&fox(ModelVariant::Pro))
        .await
        .unwrap_err();

    match err {
        ClientError::PredictionFailed(reason) => assert_eq!(reason, "CUDA out of memory"),
        other => panic!("unexpected error: {other:?}"),
    }
    let (model, body) = server.stub.submitted.lock().unwrap().clone().expect("submitted");
    assert_eq!(model, "flux-pro");
    assert_eq!(body["input"]["safety_tolerance"], json!(5));
}

#[test_timeout::tokio_timeout_test(10)]
async fn canceled_prediction_is_a_remote_failure() {
    let server = StubBuilder::new(|_| Terminal::Canceled).spawn().await;

    let err = server
        .client("r8_secret")
        .generate(&fox(ModelVariant::Schnell))
        .await
        .unwrap_err();

    assert!(matches!(err, ClientError::PredictionCanceled));
    assert!(err.is_remote_failure());
}

#[test_timeout::tokio_timeout_test(10)]
async fn empty_output_list_is_unexpected() {
    let server = StubBuilder::new(|_| Terminal::Succeeded(json!([]))).spawn().await;

    let err = server
        .client("r8_secret")
        .generate(&fox(ModelVariant::Schnell))
        .await
        .unwrap_err();

    assert!(matches!(err, ClientError::UnexpectedOutput(_)));
}

#[test_timeout::tokio_timeout_test(10)]
async fn rejected_submit_surfaces_status_and_detail() {
    let server = StubBuilder::new(|_| Terminal::Never)
        .submit_status(StatusCode::UNAUTHORIZED)
        .spawn()
        .await;

    let err = server
        .client("r8_wrong")
        .generate(&fox(ModelVariant::Schnell))
        .await
        .unwrap_err();

    match err {
        ClientError::Status {
            stage,
            status,
            body,
        } => {
            assert_eq!(stage, Stage::Submit);
            assert_eq!(status, reqwest::StatusCode::UNAUTHORIZED);
            assert_eq!(body, "invalid token");
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test_timeout::tokio_timeout_test(10)]
async fn failed_download_is_a_transport_error() {
    let server = StubBuilder::new(|base| Terminal::Succeeded(json!(format!("{base}/files/gone.png"))))
        .file_status(StatusCode::NOT_FOUND)
        .spawn()
        .await;

    let err = server
        .client("r8_secret")
        .generate(&fox(ModelVariant::Schnell))
        .await
        .unwrap_err();

    assert!(err.is_transport());
    assert!(matches!(
        err,
        ClientError::Status {
            stage: Stage::Fetch,
            ..
        }
    ));
}

#[test_timeout::tokio_timeout_test(10)]
async fn poll_deadline_stops_a_stuck_prediction() {
    let server = StubBuilder::new(|_| Terminal::Never).spawn().await;
    let config = server
        .config("r8_secret")
        .with_timeout(Some(Duration::from_millis(50)));
    let client = ReplicateClient::new(config).unwrap();

    let err = client.generate(&fox(ModelVariant::Schnell)).await.unwrap_err();

    assert!(matches!(err, ClientError::TimedOut(_)));
    assert!(server.stub.polls.load(Ordering::SeqCst) >= 1);
}
