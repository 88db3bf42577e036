//! Admission policies.
//!
//! - `virtual_machine`: VMs must satisfy the rules of their template (or
//!   their own inline rules) on CREATE and UPDATE
//! - `template_deletion`: common templates still referenced by VMs for
//!   validation cannot be deleted

pub mod template_deletion;
pub mod virtual_machine;

use std::fmt;

use kube::Resource;
use kube::core::admission::{AdmissionRequest, AdmissionResponse};
use kube::core::response::{Status, StatusCause as ApiStatusCause, StatusDetails};

use crate::informers::{TemplateStore, VmTemplateIndex};
use crate::validation::{Evaluator, StatusCause};

/// Reason attached to every field-level cause
pub const FIELD_VALUE_INVALID: &str = "FieldValueInvalid";

/// Result of a policy check
#[derive(Debug, PartialEq)]
pub struct ValidationResult {
    /// Whether the request is admitted
    pub allowed: bool,
    /// HTTP-style status code of a rejection
    pub code: u16,
    /// Machine-readable reason (if not allowed)
    pub reason: Option<String>,
    /// Detailed message (if not allowed)
    pub message: Option<String>,
    /// Field-level causes of a rejection
    pub causes: Vec<StatusCause>,
}

impl ValidationResult {
    /// Create an allowed result
    pub fn allowed() -> Self {
        Self {
            allowed: true,
            code: 200,
            reason: None,
            message: None,
            causes: Vec::new(),
        }
    }

    /// Create a denied result
    pub fn denied(code: u16, reason: &str, message: &str) -> Self {
        Self {
            allowed: false,
            code,
            reason: Some(reason.to_string()),
            message: Some(message.to_string()),
            causes: Vec::new(),
        }
    }

    /// Reject with one cause per violated rule.
    ///
    /// The overall message is the cause messages joined with `", "`.
    pub fn invalid(causes: Vec<StatusCause>) -> Self {
        let message = causes
            .iter()
            .map(|c| c.message.as_str())
            .collect::<Vec<_>>()
            .join(", ");
        Self {
            causes,
            ..Self::denied(422, "Invalid", &message)
        }
    }

    /// Reject a request that could not be processed
    pub fn error(err: impl fmt::Display) -> Self {
        Self {
            allowed: false,
            code: 400,
            reason: None,
            message: Some(err.to_string()),
            causes: Vec::new(),
        }
    }

    /// Render as the response to `request`.
    pub fn into_response<T: Resource>(self, request: &AdmissionRequest<T>) -> AdmissionResponse {
        let mut response = AdmissionResponse::from(request);
        if self.allowed {
            return response;
        }

        let mut status = Status::failure(
            self.message.as_deref().unwrap_or_default(),
            self.reason.as_deref().unwrap_or_default(),
        )
        .with_code(self.code);
        if !self.causes.is_empty() {
            status = status.with_details(StatusDetails {
                name: String::new(),
                group: String::new(),
                kind: String::new(),
                uid: String::new(),
                retry_after_seconds: 0,
                causes: self
                    .causes
                    .into_iter()
                    .map(|cause| ApiStatusCause {
                        reason: FIELD_VALUE_INVALID.to_string(),
                        message: cause.message,
                        field: cause.field,
                    })
                    .collect(),
            });
        }

        response.allowed = false;
        response.result = status;
        response
    }
}

/// What the policies need to reach a decision
pub struct ValidationContext<'a> {
    /// Parent templates by `namespace/name`
    pub templates: &'a dyn TemplateStore,
    /// VMs by the template they reference
    pub vm_index: &'a VmTemplateIndex,
    pub evaluator: &'a Evaluator,
}
