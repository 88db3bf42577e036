//! Validating admission webhooks.
//!
//! - VirtualMachine CREATE/UPDATE: evaluate the rules of the VM's template
//! - Template DELETE: protect common templates still used for validation

pub mod policies;
mod server;

pub use policies::template_deletion;
pub use policies::virtual_machine::{self, RulesError};
pub use policies::{ValidationContext, ValidationResult};
pub use server::{
    TEMPLATE_VALIDATE_PATH, VM_VALIDATE_PATH, WebhookError, WebhookState, admit_template,
    admit_vm, create_webhook_router, run_webhook_server,
};

// Re-export kube-rs admission types for contract testing
pub use kube::core::admission::{AdmissionRequest, AdmissionResponse, AdmissionReview, Operation};
