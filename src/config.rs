//! Command-line and environment configuration.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use kube::CustomResourceExt;
use serde::Serialize;
use thiserror::Error;

use crate::crd::EksConfigTemplate;
use crate::webhooks::registration::{
    DEFAULT_TIMEOUT_SECONDS, ServiceTarget, mutating_webhook_configuration,
    validating_webhook_configuration,
};
use crate::webhooks::{WEBHOOK_CERT_PATH, WEBHOOK_KEY_PATH, WEBHOOK_PORT};

/// Default health server port
pub const HEALTH_PORT: u16 = 8080;

/// Admission webhook for EKSConfigTemplate bootstrap templates
#[derive(Parser, Debug)]
#[command(name = "eks-config-webhook", version, about)]
#[command(args_conflicts_with_subcommands = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Serve flags used when no subcommand is given
    #[command(flatten)]
    pub serve: ServeArgs,
}

impl Cli {
    /// The selected command; `serve` when none is given.
    pub fn command(self) -> Commands {
        self.command.unwrap_or(Commands::Serve(self.serve))
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the TLS webhook server and the health server
    Serve(ServeArgs),
    /// Print the CRD and webhook configurations as YAML
    Manifests(ManifestArgs),
}

#[derive(Args, Debug, Clone)]
pub struct ServeArgs {
    /// Port the TLS webhook server listens on
    #[arg(long, env = "WEBHOOK_PORT", default_value_t = WEBHOOK_PORT)]
    pub webhook_port: u16,

    /// PEM certificate served by the webhook
    #[arg(long, env = "WEBHOOK_CERT_PATH", default_value = WEBHOOK_CERT_PATH)]
    pub cert_path: PathBuf,

    /// PEM private key for the certificate
    #[arg(long, env = "WEBHOOK_KEY_PATH", default_value = WEBHOOK_KEY_PATH)]
    pub key_path: PathBuf,

    /// Port of the plain-HTTP health and metrics server
    #[arg(long, env = "HEALTH_PORT", default_value_t = HEALTH_PORT)]
    pub health_port: u16,

    /// Deadline for a single admission decision, in seconds
    #[arg(long, env = "ADMISSION_TIMEOUT_SECS", default_value_t = DEFAULT_TIMEOUT_SECONDS as u64)]
    pub admission_timeout_secs: u64,
}

impl ServeArgs {
    pub fn admission_timeout(&self) -> Duration {
        Duration::from_secs(self.admission_timeout_secs)
    }
}

#[derive(Args, Debug, Clone)]
pub struct ManifestArgs {
    /// Name of the Service fronting the webhook
    #[arg(long)]
    pub service_name: String,

    /// Namespace of the Service
    #[arg(long)]
    pub service_namespace: String,

    /// Port of the Service
    #[arg(long, default_value_t = 443)]
    pub service_port: i32,

    /// PEM CA bundle to embed; leave unset when a CA injector fills it in
    #[arg(long)]
    pub ca_bundle_file: Option<PathBuf>,

    /// Seconds the API server waits for each webhook
    #[arg(long, default_value_t = DEFAULT_TIMEOUT_SECONDS)]
    pub timeout_seconds: i32,
}

/// Errors rendering the deployment manifests
#[derive(Error, Debug)]
pub enum ManifestError {
    #[error("failed to read CA bundle {path}: {source}")]
    CaBundle {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to serialize manifest: {0}")]
    Serialize(#[from] serde_yaml::Error),
}

impl ManifestArgs {
    pub fn service_target(&self) -> Result<ServiceTarget, ManifestError> {
        let ca_bundle = match &self.ca_bundle_file {
            Some(path) => Some(std::fs::read(path).map_err(|source| ManifestError::CaBundle {
                path: path.clone(),
                source,
            })?),
            None => None,
        };
        Ok(ServiceTarget {
            name: self.service_name.clone(),
            namespace: self.service_namespace.clone(),
            port: self.service_port,
            ca_bundle,
            timeout_seconds: self.timeout_seconds,
        })
    }
}

/// Render the CRD and both webhook configurations as one YAML stream.
pub fn render_manifests(target: &ServiceTarget) -> Result<String, ManifestError> {
    let documents = [
        to_yaml(&EksConfigTemplate::crd())?,
        to_yaml(&mutating_webhook_configuration::<EksConfigTemplate>(target))?,
        to_yaml(&validating_webhook_configuration::<EksConfigTemplate>(target))?,
    ];
    Ok(documents.join("---\n"))
}

fn to_yaml<T: Serialize>(value: &T) -> Result<String, ManifestError> {
    Ok(serde_yaml::to_string(value)?)
}
