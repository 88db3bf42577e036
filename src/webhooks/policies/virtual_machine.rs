//! VirtualMachine rule validation policy.
//!
//! The rules applied to a VM come from, in order of precedence:
//! 1. nowhere, when the VM carries the skip annotation
//! 2. the VM's own `vm.kubevirt.io/validations` annotation
//! 3. the `validations` annotation of its parent template
//!
//! VMs without a template reference are admitted as they are.
//!
//! Rules run on the object exactly as submitted, so fields the typed
//! [`VirtualMachine`](crate::crd::VirtualMachine) does not model still exist
//! for them.

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

use super::{ValidationContext, ValidationResult};
use crate::informers::TemplateStore;
use crate::labels::{
    TEMPLATE_NAMESPACE_OLD_KEY, TEMPLATE_NAMESPACE_KEY, TEMPLATE_VALIDATIONS_KEY, TemplateKey,
    TemplateKeys, VM_SKIP_VALIDATIONS_KEY, VM_VALIDATIONS_KEY, annotation, has_annotation,
};
use crate::validation::{self, Evaluator, Rule, StatusCause, parse_rules};

/// Failure to determine the rules of a VM
#[derive(Error, Debug)]
pub enum RulesError {
    #[error("missing parent template (key={key}) for {vm}")]
    MissingTemplate { key: String, vm: String },

    #[error("invalid validation rules: {0}")]
    Parse(#[from] validation::Error),
}

/// Find the rule set governing the VM described by `meta`.
pub fn resolve_rules(
    meta: &ObjectMeta,
    templates: &dyn TemplateStore,
) -> Result<Vec<Rule>, RulesError> {
    let name = meta.name.clone().unwrap_or_default();

    if has_annotation(meta, VM_SKIP_VALIDATIONS_KEY) {
        debug!(vm = %name, namespace = ?meta.namespace, "Validation skipped by annotation");
        return Ok(Vec::new());
    }

    if let Some(inline) = annotation(meta, VM_VALIDATIONS_KEY)
        && !inline.is_empty()
    {
        return Ok(parse_rules(inline.as_bytes())?);
    }

    let keys = TemplateKeys::from_meta(meta);
    log_template_keys(&name, &keys);
    if !keys.is_valid() {
        debug!(vm = %name, "No parent template");
        return Ok(Vec::new());
    }

    let key = keys.get().to_string();
    let Some(template) = templates.get_by_key(&key) else {
        let err = RulesError::MissingTemplate { key, vm: name };
        warn!(error = %err, "Parent template not found");
        return Err(err);
    };
    debug!(vm = %name, template = %key, "Found parent template");

    let rules = template
        .annotation(TEMPLATE_VALIDATIONS_KEY)
        .unwrap_or_default();
    Ok(parse_rules(rules.as_bytes())?)
}

fn log_template_keys(vm: &str, keys: &TemplateKeys) {
    log_template_key(vm, "labels", &keys.label_key);
    if !keys.label_key.is_valid() {
        log_template_key(vm, "annotations", &keys.annotation_key);
    }
}

fn log_template_key(vm: &str, source: &str, key: &TemplateKey) {
    if !key.old_namespace.is_empty() {
        warn!(
            vm,
            source,
            "VM uses legacy template namespace key {}, should be updated to {}",
            TEMPLATE_NAMESPACE_OLD_KEY,
            TEMPLATE_NAMESPACE_KEY
        );
    }
    if key.any_namespace().is_empty() {
        debug!(vm, source, "VM has no template namespace");
    }
    if key.name.is_empty() {
        debug!(vm, source, "VM has no template name");
    }
}

/// CPU topology fields the VM controller defaults to 1
const CPU_TOPOLOGY: [&str; 3] = ["sockets", "cores", "threads"];

/// Default CPU topology fields left unset or at zero, as the VM controller
/// will. VMs without a `cpu` block are left alone.
pub fn set_default_values(vm: &mut Value) {
    let Some(cpu) = vm
        .pointer_mut("/spec/template/spec/domain/cpu")
        .and_then(Value::as_object_mut)
    else {
        return;
    };
    for field in CPU_TOPOLOGY {
        let unset = cpu
            .get(field)
            .is_none_or(|v| v.is_null() || v.as_u64() == Some(0));
        if unset {
            cpu.insert(field.to_string(), Value::from(1));
        }
    }
}

/// Evaluate `rules` on the JSON of a VM and return the causes for rejecting it.
pub fn validate_vm(evaluator: &Evaluator, rules: &[Rule], vm: &mut Value) -> Vec<StatusCause> {
    let name = vm
        .pointer("/metadata/name")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    if rules.is_empty() {
        debug!(vm = %name, "No admission rules");
        return Vec::new();
    }

    set_default_values(vm);

    let result = evaluator.evaluate(rules, vm);
    info!(
        vm = %name,
        rules = rules.len(),
        succeeded = result.succeeded(),
        "Evaluation finished"
    );
    result.to_status_causes()
}

/// Validate a VM being created or updated, given as submitted.
pub fn validate(ctx: &ValidationContext<'_>, mut vm: Value) -> ValidationResult {
    let meta: ObjectMeta = match vm.get("metadata").cloned().map(serde_json::from_value) {
        Some(Ok(meta)) => meta,
        None => ObjectMeta::default(),
        Some(Err(e)) => {
            return ValidationResult::error(format!(
                "failed to decode VirtualMachine metadata: {e}"
            ));
        }
    };
    if meta.deletion_timestamp.is_some() {
        return ValidationResult::allowed();
    }

    let rules = match resolve_rules(&meta, ctx.templates) {
        Ok(rules) => rules,
        Err(e) => return ValidationResult::error(e),
    };

    let causes = validate_vm(ctx.evaluator, &rules, &mut vm);
    if causes.is_empty() {
        ValidationResult::allowed()
    } else {
        ValidationResult::invalid(causes)
    }
}
