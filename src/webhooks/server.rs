//! Admission webhook server.
//!
//! Provides HTTP endpoints for Kubernetes admission webhooks:
//! - `POST /virtualmachine-validate` - VM create/update validation
//! - `POST /template-validate` - Template deletion protection
//! - `GET /readyz` - Readiness of the caches backing both
//!
//! TLS is served when a certificate and key are mounted in the certificate
//! directory, plain HTTP otherwise.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::routing::{get, post};
use axum::{Json, Router, extract::State, http::StatusCode, response::IntoResponse};
use axum_server::tls_rustls::RustlsConfig;
use kube::core::DynamicObject;
use kube::core::admission::{AdmissionRequest, AdmissionResponse, AdmissionReview, Operation};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use crate::config::ValidatorConfig;
use crate::crd::Template;
use crate::health::{self, HealthState};
use crate::informers::{TemplateStore, VmTemplateIndex};
use crate::validation::Evaluator;
use crate::webhooks::policies::{
    ValidationContext, ValidationResult, template_deletion, virtual_machine,
};

pub const VM_VALIDATE_PATH: &str = "/virtualmachine-validate";
pub const TEMPLATE_VALIDATE_PATH: &str = "/template-validate";

/// Shared state for webhook handlers
pub struct WebhookState {
    pub templates: Arc<dyn TemplateStore>,
    pub vm_index: Arc<VmTemplateIndex>,
    pub evaluator: Evaluator,
    pub health: Arc<HealthState>,
}

impl WebhookState {
    pub fn new(
        templates: Arc<dyn TemplateStore>,
        vm_index: Arc<VmTemplateIndex>,
        evaluator: Evaluator,
        health: Arc<HealthState>,
    ) -> Self {
        Self {
            templates,
            vm_index,
            evaluator,
            health,
        }
    }

    pub fn context(&self) -> ValidationContext<'_> {
        ValidationContext {
            templates: self.templates.as_ref(),
            vm_index: &self.vm_index,
            evaluator: &self.evaluator,
        }
    }
}

/// Create the webhook router
pub fn create_webhook_router(state: Arc<WebhookState>) -> Router {
    let probes = Router::new()
        .route("/readyz", get(health::readyz))
        .with_state(state.health.clone());

    Router::new()
        .route(VM_VALIDATE_PATH, post(validate_virtual_machine))
        .route(TEMPLATE_VALIDATE_PATH, post(validate_template))
        .with_state(state)
        .merge(probes)
}

fn decode<K: DeserializeOwned>(object: &DynamicObject) -> Result<K, serde_json::Error> {
    serde_json::to_value(object).and_then(serde_json::from_value)
}

/// Decide on a VirtualMachine admission request
pub fn admit_vm(
    ctx: &ValidationContext<'_>,
    request: &AdmissionRequest<DynamicObject>,
) -> ValidationResult {
    if request.resource.resource != "virtualmachines" {
        return ValidationResult::error(format!(
            "expected resource {} to be 'virtualmachines'",
            request.resource.resource
        ));
    }

    if request.operation == Operation::Delete {
        return ValidationResult::allowed();
    }

    let Some(object) = &request.object else {
        return ValidationResult::error("missing object in request");
    };
    match serde_json::to_value(object) {
        Ok(vm) => virtual_machine::validate(ctx, vm),
        Err(e) => ValidationResult::error(format!("failed to read VirtualMachine: {e}")),
    }
}

/// Decide on a Template admission request
pub fn admit_template(
    ctx: &ValidationContext<'_>,
    request: &AdmissionRequest<DynamicObject>,
) -> ValidationResult {
    if request.operation != Operation::Delete {
        return ValidationResult::allowed();
    }

    if request.resource.resource != "templates" {
        return ValidationResult::error(format!(
            "expected resource {} to be 'templates'",
            request.resource.resource
        ));
    }

    let Some(object) = &request.old_object else {
        return ValidationResult::error("missing oldObject in request");
    };
    match decode::<Template>(object) {
        Ok(template) => template_deletion::validate(ctx, &template),
        Err(e) => ValidationResult::error(format!("failed to decode Template: {e}")),
    }
}

type Admit = fn(&ValidationContext<'_>, &AdmissionRequest<DynamicObject>) -> ValidationResult;

fn handle(
    state: &WebhookState,
    review: AdmissionReview<DynamicObject>,
    admit: Admit,
) -> (StatusCode, Json<AdmissionReview<DynamicObject>>) {
    let request: AdmissionRequest<DynamicObject> = match review.try_into() {
        Ok(req) => req,
        Err(e) => {
            error!(error = %e, "Failed to extract admission request");
            return (
                StatusCode::BAD_REQUEST,
                Json(
                    AdmissionResponse::invalid(format!("Invalid AdmissionReview: {}", e))
                        .into_review(),
                ),
            );
        }
    };

    let uid = &request.uid;
    debug!(
        uid = %uid,
        operation = ?request.operation,
        namespace = ?request.namespace,
        name = %request.name,
        "Processing admission request"
    );

    let result = admit(&state.context(), &request);
    if result.allowed {
        info!(uid = %uid, name = %request.name, "Admission request allowed");
    } else {
        warn!(
            uid = %uid,
            name = %request.name,
            code = result.code,
            details = result.message.as_deref().unwrap_or_default(),
            "Admission request denied"
        );
    }

    (
        StatusCode::OK,
        Json(result.into_response(&request).into_review()),
    )
}

async fn validate_virtual_machine(
    State(state): State<Arc<WebhookState>>,
    Json(body): Json<AdmissionReview<DynamicObject>>,
) -> impl IntoResponse {
    handle(&state, body, admit_vm)
}

async fn validate_template(
    State(state): State<Arc<WebhookState>>,
    Json(body): Json<AdmissionReview<DynamicObject>>,
) -> impl IntoResponse {
    handle(&state, body, admit_template)
}

/// Errors that can occur when running the webhook server
#[derive(Error, Debug)]
pub enum WebhookError {
    #[error("TLS configuration error: {0}")]
    TlsConfig(#[source] io::Error),

    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("webhook server error: {0}")]
    Server(#[source] io::Error),
}

/// Run the webhook server until it fails.
pub async fn run_webhook_server(
    state: Arc<WebhookState>,
    config: &ValidatorConfig,
) -> Result<(), WebhookError> {
    let app = create_webhook_router(state);
    let addr = config.webhook_addr();

    if config.tls_enabled() {
        let tls = RustlsConfig::from_pem_file(config.cert_path(), config.key_path())
            .await
            .map_err(WebhookError::TlsConfig)?;

        info!(%addr, "Webhook server listening with TLS");
        axum_server::bind_rustls(addr, tls)
            .serve(app.into_make_service())
            .await
            .map_err(WebhookError::Server)?;
    } else {
        warn!(%addr, cert_dir = %config.cert_dir.display(), "Webhook certificates not found, serving plain HTTP");
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|source| WebhookError::Bind { addr, source })?;
        axum::serve(listener, app)
            .await
            .map_err(WebhookError::Server)?;
    }

    Ok(())
}
