//! template-validator - admission webhook for templated KubeVirt VMs.
//!
//! This is the main entry point that:
//! - Initializes structured logging
//! - Creates the Kubernetes client
//! - Starts the template and VM informers
//! - Starts the health server and the webhook server

use std::sync::Arc;
use std::time::Duration;

use kube::runtime::reflector;
use kube::{Api, Client};
use tokio::signal;
use tracing::{error, info, warn};

use template_validator::crd::Template;
use template_validator::health::run_health_server;
use template_validator::informers::{
    TemplateStore, run_template_informer, run_vm_informer, template_reflector,
    templates_available, wait_for_vm_index,
};
use template_validator::{
    Evaluator, HealthState, ReferenceObject, ValidatorConfig, VmTemplateIndex, WebhookState,
    run_webhook_server,
};

/// Grace period for in-flight admission requests during shutdown
const SHUTDOWN_GRACE_PERIOD_SECS: u64 = 5;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("template_validator=info".parse()?)
                .add_directive("kube=info".parse()?),
        )
        .json()
        .init();

    info!("Starting template-validator");

    if rustls::crypto::aws_lc_rs::default_provider()
        .install_default()
        .is_err()
    {
        warn!("rustls crypto provider was already installed");
    }

    let config = ValidatorConfig::from_env()?;
    info!(
        webhook = %config.webhook_addr(),
        health = %config.health_addr(),
        tls = config.tls_enabled(),
        "Loaded configuration"
    );

    let reference = Arc::new(ReferenceObject::new()?);
    let evaluator = Evaluator::new(reference);

    let client = Client::try_default().await?;
    info!("Connected to Kubernetes cluster");

    let health_state = Arc::new(HealthState::new());
    let vm_index = Arc::new(VmTemplateIndex::default());

    // Templates only exist on OpenShift; without them the store stays empty
    let template_api: Api<Template> = Api::all(client.clone());
    let (templates, template_handle) = if templates_available(&template_api).await {
        let (store, stream) = template_reflector(template_api);
        (store, Some(tokio::spawn(run_template_informer(stream))))
    } else {
        let (store, _writer) = reflector::store::<Template>();
        (store, None)
    };

    let vm_informer_handle = tokio::spawn(run_vm_informer(client.clone(), vm_index.clone()));

    // Ready once both caches hold a full list
    {
        let health_state = health_state.clone();
        let vm_index = vm_index.clone();
        let templates = templates.clone();
        let wait_templates = template_handle.is_some();
        tokio::spawn(async move {
            if wait_templates && let Err(e) = templates.wait_until_ready().await {
                error!(error = %e, "Template store never became ready");
                return;
            }
            wait_for_vm_index(&vm_index).await;
            info!("Caches synced, ready to admit requests");
            health_state.set_ready(true);
        });
    }

    let health_handle = {
        let health_state = health_state.clone();
        let addr = config.health_addr();
        tokio::spawn(async move {
            if let Err(e) = run_health_server(health_state, addr).await {
                error!("Health server error: {}", e);
            }
        })
    };

    let webhook_handle = {
        let templates: Arc<dyn TemplateStore> = Arc::new(templates);
        let state = Arc::new(WebhookState::new(
            templates,
            vm_index,
            evaluator,
            health_state.clone(),
        ));
        let config = config.clone();
        tokio::spawn(async move {
            if let Err(e) = run_webhook_server(state, &config).await {
                error!("Webhook server error: {}", e);
            }
        })
    };

    // Wait for any task to complete (or fail), or shutdown signal
    tokio::select! {
        result = webhook_handle => {
            if let Err(e) = result {
                error!("Webhook server task panicked: {}", e);
            }
        }
        result = health_handle => {
            if let Err(e) = result {
                error!("Health server task panicked: {}", e);
            }
        }
        result = vm_informer_handle => {
            if let Err(e) = result {
                error!("VM informer task panicked: {}", e);
            }
        }
        result = async {
            match template_handle {
                Some(handle) => handle.await,
                None => std::future::pending().await,
            }
        } => {
            if let Err(e) = result {
                error!("Template informer task panicked: {}", e);
            }
        }
        // Handle graceful shutdown on SIGTERM or SIGINT
        _ = shutdown_signal() => {
            info!("Received shutdown signal, initiating graceful shutdown...");

            // Mark as not ready to stop receiving new requests
            health_state.set_ready(false);
            info!("Marked validator as not ready");

            info!(
                "Waiting {}s for in-flight admission requests to complete...",
                SHUTDOWN_GRACE_PERIOD_SECS
            );
            tokio::time::sleep(Duration::from_secs(SHUTDOWN_GRACE_PERIOD_SECS)).await;
        }
    }

    info!("Validator stopped");
    Ok(())
}

/// Wait for shutdown signal (SIGTERM or SIGINT)
///
/// Note: Signal handler setup failures are fatal - the validator cannot shut
/// down gracefully without them.
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
