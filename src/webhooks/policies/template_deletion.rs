//! Template deletion protection policy.
//!
//! Older common templates carry their validation rules in an annotation.
//! Such a template cannot be deleted while VMs still reference it for
//! validation, or those VMs could no longer be updated.

use tracing::info;

use super::{ValidationContext, ValidationResult};
use crate::crd::Template;
use crate::labels::{TEMPLATE_TYPE_LABEL, TEMPLATE_VALIDATIONS_KEY};

/// Validate the deletion of `template`
pub fn validate(ctx: &ValidationContext<'_>, template: &Template) -> ValidationResult {
    if !template.has_label(TEMPLATE_TYPE_LABEL) {
        return ValidationResult::allowed();
    }
    if template.annotation(TEMPLATE_VALIDATIONS_KEY).is_none() {
        return ValidationResult::allowed();
    }

    let key = template.key();
    let mut vms = ctx.vm_index.vms_for_template(&key);
    if vms.is_empty() {
        return ValidationResult::allowed();
    }
    vms.sort();

    info!(template = %key, vms = vms.len(), "Refusing to delete referenced template");
    ValidationResult::denied(
        403,
        "Forbidden",
        &format!(
            "Template cannot be deleted, because the following VMs are referencing it for validation: {}",
            vms.join(", ")
        ),
    )
}
