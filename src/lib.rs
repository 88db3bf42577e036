//! template-validator library crate
//!
//! Admission webhook checking KubeVirt VirtualMachines against the
//! validation rules of the template they were created from.

pub mod config;
pub mod crd;
pub mod health;
pub mod informers;
pub mod labels;
pub mod validation;
pub mod webhooks;

pub use config::{ConfigError, ValidatorConfig};
pub use health::HealthState;
pub use informers::{TemplateStore, VmTemplateIndex};
pub use validation::{Evaluator, ReferenceObject, Rule};
pub use webhooks::{WebhookError, WebhookState, run_webhook_server};
