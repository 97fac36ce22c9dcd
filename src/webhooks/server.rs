//! Admission webhook server.
//!
//! Provides HTTPS endpoints for Kubernetes admission webhooks.
//!
//! To enable webhooks:
//! 1. Deploy cert-manager for TLS certificates
//! 2. Apply the configurations printed by `eks-config-webhook manifests`
//! 3. Mount the TLS certificate secret to the pod at /etc/webhook/certs/

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{Json, Router, body::Bytes, extract::State, http::StatusCode, routing::post};
use kube::Resource;
use kube::core::DynamicObject;
use kube::core::admission::{AdmissionRequest, AdmissionResponse, AdmissionReview, Operation};
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::crd::EksConfigTemplate;
use crate::health::HealthState;
use crate::webhooks::admission::{AdmissionError, Defaulter, Validator};
use crate::webhooks::dispatch;
use crate::webhooks::registration::webhook_paths;

/// Default path to webhook TLS certificate
pub const WEBHOOK_CERT_PATH: &str = "/etc/webhook/certs/tls.crt";
/// Default path to webhook TLS private key
pub const WEBHOOK_KEY_PATH: &str = "/etc/webhook/certs/tls.key";
/// Default webhook server port
pub const WEBHOOK_PORT: u16 = 9443;

/// Reason attached to denials caused by an exceeded decision deadline
pub const REASON_TIMEOUT: &str = "Timeout";

const MUTATE: &str = "mutate";
const VALIDATE: &str = "validate";

/// Shared state for webhook handlers
pub struct WebhookState {
    /// Deadline for a single admission decision
    pub admission_timeout: Duration,
    pub health: Arc<HealthState>,
}

impl WebhookState {
    pub fn new(admission_timeout: Duration, health: Arc<HealthState>) -> Self {
        Self {
            admission_timeout,
            health,
        }
    }
}

/// Errors that can occur when running the webhook server
#[derive(Error, Debug)]
pub enum WebhookError {
    /// TLS configuration error
    #[error("TLS configuration error: {0}")]
    TlsConfig(String),

    /// Server error
    #[error("Webhook server error: {0}")]
    Server(String),
}

type HandlerResponse = (StatusCode, Json<AdmissionReview<DynamicObject>>);

/// Collects the admission routes of every registered resource type.
pub struct WebhookRoutes {
    router: Router<Arc<WebhookState>>,
}

impl Default for WebhookRoutes {
    fn default() -> Self {
        Self::new()
    }
}

impl WebhookRoutes {
    pub fn new() -> Self {
        Self {
            router: Router::new(),
        }
    }

    /// Serve `K`'s defaulting capability on its mutate path.
    pub fn register_defaulter<K>(mut self) -> Self
    where
        K: Resource<DynamicType = ()>
            + Defaulter
            + Clone
            + Serialize
            + DeserializeOwned
            + Send
            + Sync
            + 'static,
    {
        let paths = webhook_paths::<K>();
        self.router = self.router.route(&paths.mutate, post(mutate_handler::<K>));
        self
    }

    /// Serve `K`'s validation capability on its validate path.
    pub fn register_validator<K>(mut self) -> Self
    where
        K: Resource<DynamicType = ()> + Validator + Clone + DeserializeOwned + Send + Sync + 'static,
    {
        let paths = webhook_paths::<K>();
        self.router = self
            .router
            .route(&paths.validate, post(validate_handler::<K>));
        self
    }

    /// Serve both capabilities of `K`.
    pub fn register<K>(self) -> Self
    where
        K: Resource<DynamicType = ()>
            + Defaulter
            + Validator
            + Clone
            + Serialize
            + DeserializeOwned
            + Send
            + Sync
            + 'static,
    {
        self.register_defaulter::<K>().register_validator::<K>()
    }

    pub fn with_state(self, state: Arc<WebhookState>) -> Router {
        self.router.with_state(state)
    }
}

/// Create the webhook router
pub fn create_webhook_router(state: Arc<WebhookState>) -> Router {
    WebhookRoutes::new()
        .register::<EksConfigTemplate>()
        .with_state(state)
}

/// Why a body could not be turned into a typed request.
enum Rejection {
    /// The body is not an AdmissionReview; answered as is.
    Invalid(HandlerResponse),
    /// A well-formed review whose object does not deserialize as the typed
    /// resource, e.g. an unknown enum value or an object stored by an older
    /// schema.
    Undecodable {
        request: AdmissionRequest<DynamicObject>,
        error: serde_json::Error,
    },
}

/// Parse an AdmissionReview body into a typed request.
fn parse_request<K>(body: &[u8]) -> Result<AdmissionRequest<K>, Rejection>
where
    K: Resource + DeserializeOwned,
{
    let typed_err = match serde_json::from_slice::<AdmissionReview<K>>(body) {
        Ok(review) => {
            return review.try_into().map_err(|e| {
                error!(error = %e, "Failed to extract admission request");
                Rejection::Invalid(invalid_review(format!("Invalid AdmissionReview: {}", e)))
            });
        }
        Err(e) => e,
    };

    let review: AdmissionReview<DynamicObject> = serde_json::from_slice(body).map_err(|e| {
        error!(error = %e, "Failed to parse admission review");
        Rejection::Invalid(invalid_review(format!("Invalid AdmissionReview: {}", e)))
    })?;
    let request: AdmissionRequest<DynamicObject> = review.try_into().map_err(|e| {
        error!(error = %e, "Failed to extract admission request");
        Rejection::Invalid(invalid_review(format!("Invalid AdmissionReview: {}", e)))
    })?;

    Err(Rejection::Undecodable {
        request,
        error: typed_err,
    })
}

/// Answer a review whose object could not be decoded.
///
/// Operations in which the webhook never inspects the object are allowed;
/// every other operation fails closed with the request uid preserved.
fn answer_undecodable(
    state: &WebhookState,
    webhook: &str,
    request: &AdmissionRequest<DynamicObject>,
    error: &serde_json::Error,
    allowed: bool,
    started: Instant,
) -> HandlerResponse {
    if allowed {
        debug!(uid = %request.uid, error = %error, "Allowing request with undecodable object");
        observe(state, webhook, request, None, started);
        return (
            StatusCode::OK,
            Json(AdmissionResponse::from(request).into_review()),
        );
    }

    let err = AdmissionError::Internal(format!("malformed object: {error}"));
    observe(state, webhook, request, Some(&err), started);
    (
        StatusCode::OK,
        Json(dispatch::deny(request, &err).into_review()),
    )
}

fn invalid_review(message: String) -> HandlerResponse {
    (
        StatusCode::BAD_REQUEST,
        Json(AdmissionResponse::invalid(message).into_review()),
    )
}

/// Run a decision on the blocking pool, failing closed once `deadline` passes.
async fn decide_within<T, F>(deadline: Duration, decide: F) -> Result<T, AdmissionError>
where
    F: FnOnce() -> Result<T, AdmissionError> + Send + 'static,
    T: Send + 'static,
{
    match tokio::time::timeout(deadline, tokio::task::spawn_blocking(decide)).await {
        Ok(Ok(decision)) => decision,
        Ok(Err(e)) => Err(AdmissionError::Internal(format!(
            "admission decision aborted: {e}"
        ))),
        Err(_) => Err(AdmissionError::denied(
            REASON_TIMEOUT,
            format!(
                "admission decision exceeded its {}ms deadline",
                deadline.as_millis()
            ),
        )),
    }
}

fn operation_label(operation: &Operation) -> &'static str {
    match operation {
        Operation::Create => "CREATE",
        Operation::Update => "UPDATE",
        Operation::Delete => "DELETE",
        Operation::Connect => "CONNECT",
    }
}

/// Log and record the outcome of a decision.
fn observe<K: Resource>(
    state: &WebhookState,
    webhook: &str,
    request: &AdmissionRequest<K>,
    error: Option<&AdmissionError>,
    started: Instant,
) {
    let uid = &request.uid;
    let operation = operation_label(&request.operation);
    match error {
        None => info!(uid = %uid, webhook, operation, "Admission request allowed"),
        Some(AdmissionError::Internal(message)) => {
            error!(uid = %uid, webhook, operation, error = %message, "Admission request failed, denying");
            state.health.metrics.record_error(webhook);
        }
        Some(e) => {
            warn!(uid = %uid, webhook, operation, reason = %e.reason(), message = %e.message(), "Admission request denied");
        }
    }
    state.health.metrics.record_admission(
        webhook,
        operation,
        error.is_none(),
        started.elapsed().as_secs_f64(),
    );
}

/// Defaulting admission webhook handler
async fn mutate_handler<K>(State(state): State<Arc<WebhookState>>, body: Bytes) -> HandlerResponse
where
    K: Resource + Defaulter + Clone + Serialize + DeserializeOwned + Send + Sync + 'static,
{
    let started = Instant::now();
    let request = match parse_request::<K>(&body) {
        Ok(req) => req,
        Err(Rejection::Invalid(response)) => return response,
        // Only creates are defaulted
        Err(Rejection::Undecodable { request, error }) => {
            let allowed = !matches!(request.operation, Operation::Create);
            return answer_undecodable(&state, MUTATE, &request, &error, allowed, started);
        }
    };

    debug!(
        uid = %request.uid,
        operation = ?request.operation,
        namespace = ?request.namespace,
        name = %request.name,
        "Processing mutation request"
    );

    let candidate = request.clone();
    let decision = decide_within(state.admission_timeout, move || {
        dispatch::review_mutation(&candidate)
    })
    .await;

    let failure = decision.as_ref().err().cloned();
    let response = dispatch::mutation_response(&request, decision);
    // A patch that fails to serialize is denied after the decision succeeded
    let failure = failure.or_else(|| {
        (!response.allowed).then(|| AdmissionError::Internal(response.result.message.clone()))
    });
    observe(&state, MUTATE, &request, failure.as_ref(), started);

    (StatusCode::OK, Json(response.into_review()))
}

/// Validating admission webhook handler
async fn validate_handler<K>(State(state): State<Arc<WebhookState>>, body: Bytes) -> HandlerResponse
where
    K: Resource + Validator + Clone + DeserializeOwned + Send + Sync + 'static,
{
    let started = Instant::now();
    let request = match parse_request::<K>(&body) {
        Ok(req) => req,
        Err(Rejection::Invalid(response)) => return response,
        // Deletes must go through even for objects this version cannot read
        Err(Rejection::Undecodable { request, error }) => {
            let allowed = matches!(request.operation, Operation::Delete | Operation::Connect);
            return answer_undecodable(&state, VALIDATE, &request, &error, allowed, started);
        }
    };

    debug!(
        uid = %request.uid,
        operation = ?request.operation,
        namespace = ?request.namespace,
        name = %request.name,
        "Processing validation request"
    );

    let candidate = request.clone();
    let decision = decide_within(state.admission_timeout, move || {
        dispatch::review_validation(&candidate)
    })
    .await;

    observe(&state, VALIDATE, &request, decision.as_ref().err(), started);

    (
        StatusCode::OK,
        Json(dispatch::validation_response(&request, &decision).into_review()),
    )
}

/// Run the webhook server with TLS
///
/// Binds to 0.0.0.0 on `port` and serves the registered admission paths.
/// TLS certificates are loaded from the paths specified.
///
/// # Arguments
/// * `state` - Shared handler state
/// * `port` - Port to listen on
/// * `cert_path` - Path to TLS certificate file (PEM format)
/// * `key_path` - Path to TLS private key file (PEM format)
pub async fn run_webhook_server(
    state: Arc<WebhookState>,
    port: u16,
    cert_path: &Path,
    key_path: &Path,
) -> Result<(), WebhookError> {
    use axum_server::tls_rustls::RustlsConfig;

    let health = state.health.clone();
    let app = create_webhook_router(state);

    let config = RustlsConfig::from_pem_file(cert_path, key_path)
        .await
        .map_err(|e| WebhookError::TlsConfig(e.to_string()))?;

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let handle = axum_server::Handle::new();

    // Ready only once the listener is bound
    {
        let handle = handle.clone();
        tokio::spawn(async move {
            if let Some(bound) = handle.listening().await {
                info!(port = bound.port(), "Webhook server listening with TLS");
                health.set_ready(true).await;
            }
        });
    }

    axum_server::bind_rustls(addr, config)
        .handle(handle)
        .serve(app.into_make_service())
        .await
        .map_err(|e| WebhookError::Server(e.to_string()))?;

    Ok(())
}
