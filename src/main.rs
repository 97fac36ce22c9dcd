//! eks-config-webhook - Admission webhook for EKSConfigTemplate resources.
//!
//! This is the main entry point that:
//! - Initializes structured logging
//! - Starts the health server and the TLS webhook server (`serve`)
//! - Or prints the CRD and webhook registrations (`manifests`)

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::signal;
use tracing::{error, info};

use eks_config_webhook::config::{Cli, Commands, ServeArgs, render_manifests};
use eks_config_webhook::health::{HealthState, run_health_server};
use eks_config_webhook::{WebhookState, run_webhook_server};

/// Grace period for in-flight admission requests to complete during shutdown
const SHUTDOWN_GRACE_PERIOD_SECS: u64 = 5;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    match cli.command() {
        Commands::Manifests(args) => {
            let target = args.service_target()?;
            print!("{}", render_manifests(&target)?);
            Ok(())
        }
        Commands::Serve(args) => serve(args).await,
    }
}

async fn serve(args: ServeArgs) -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("eks_config_webhook=info".parse()?),
        )
        .json()
        .init();

    info!(
        webhook_port = args.webhook_port,
        health_port = args.health_port,
        admission_timeout_secs = args.admission_timeout_secs,
        "Starting eks-config-webhook"
    );

    // rustls needs a process-wide provider before any TLS config is built
    if rustls::crypto::aws_lc_rs::default_provider()
        .install_default()
        .is_err()
    {
        info!("rustls crypto provider already installed");
    }

    // Create shared health state
    let health_state = Arc::new(HealthState::new());

    // Start health server immediately so liveness probes work during startup
    let health_handle = {
        let health_state = health_state.clone();
        let port = args.health_port;
        tokio::spawn(async move {
            if let Err(e) = run_health_server(health_state, port).await {
                error!("Health server error: {}", e);
            }
        })
    };

    let webhook_handle = {
        let state = Arc::new(WebhookState::new(
            args.admission_timeout(),
            health_state.clone(),
        ));
        tokio::spawn(async move {
            run_webhook_server(state, args.webhook_port, &args.cert_path, &args.key_path).await
        })
    };

    // Wait for any task to complete (or fail), or shutdown signal
    tokio::select! {
        result = health_handle => {
            if let Err(e) = result {
                error!("Health server task panicked: {}", e);
            }
        }
        result = webhook_handle => {
            // Webhook server failures exit non-zero
            match result {
                Ok(Ok(())) => info!("Webhook server exited"),
                Ok(Err(e)) => {
                    error!("Webhook server error: {}", e);
                    return Err(e.into());
                }
                Err(e) => {
                    error!("Webhook server task panicked: {}", e);
                    return Err(e.into());
                }
            }
        }
        // Handle graceful shutdown on SIGTERM or SIGINT
        _ = shutdown_signal() => {
            info!("Received shutdown signal, initiating graceful shutdown...");

            // Mark as not ready so the Service stops routing admission requests here
            health_state.set_ready(false).await;
            info!("Marked webhook as not ready");

            info!(
                "Waiting {}s for in-flight admission requests to complete...",
                SHUTDOWN_GRACE_PERIOD_SECS
            );
            tokio::time::sleep(Duration::from_secs(SHUTDOWN_GRACE_PERIOD_SECS)).await;

            info!("Grace period complete, shutting down");
        }
    }

    info!("Webhook stopped");
    Ok(())
}

/// Wait for shutdown signal (SIGTERM or SIGINT)
///
/// Note: Signal handler setup failures are fatal - the webhook cannot shut down
/// gracefully without them. Using expect() here is intentional.
#[allow(clippy::expect_used)]
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
