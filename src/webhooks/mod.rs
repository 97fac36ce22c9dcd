//! Admission webhooks for bootstrap templates.
//!
//! Each resource type implements [`Defaulter`] and/or [`Validator`]. The
//! server routes AdmissionReviews to [`dispatch`], which calls those
//! capabilities and turns the outcome into an allow, deny or patch:
//! - Defaulting: fills unset fields and answers with a JSON patch
//! - Validation: structural checks on create, immutability on update

pub mod admission;
pub mod dispatch;
mod eks_config_template;
pub mod policies;
pub mod registration;
mod server;

pub use admission::{AdmissionError, Defaulter, ValidationResult, Validator};
pub use eks_config_template::{DEFAULT_FILE_OWNER, DEFAULT_FILE_PERMISSIONS};
pub use policies::ValidationContext;
pub use registration::{
    ServiceTarget, WebhookPaths, mutating_webhook_configuration,
    validating_webhook_configuration, webhook_paths,
};
pub use server::{
    REASON_TIMEOUT, WEBHOOK_CERT_PATH, WEBHOOK_KEY_PATH, WEBHOOK_PORT, WebhookError,
    WebhookRoutes, WebhookState, create_webhook_router, run_webhook_server,
};

// Re-export kube-rs admission types for contract testing
pub use kube::core::admission::{AdmissionRequest, AdmissionResponse, AdmissionReview, Operation};
