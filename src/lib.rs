//! eks-config-webhook library crate
//!
//! This module exports the EKSConfigTemplate resource, its admission hooks,
//! and the servers that expose them to the Kubernetes API server.

pub mod config;
pub mod crd;
pub mod health;
pub mod webhooks;

pub use health::HealthState;
pub use webhooks::{
    WEBHOOK_CERT_PATH, WEBHOOK_KEY_PATH, WEBHOOK_PORT, WebhookError, WebhookState,
    create_webhook_router, run_webhook_server,
};
