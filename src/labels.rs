//! Labels and annotations linking VMs to templates.

use std::collections::BTreeMap;
use std::fmt;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;

/// Name of the template a VM was created from
pub const TEMPLATE_NAME_KEY: &str = "vm.kubevirt.io/template";
/// Namespace of the template a VM was created from
pub const TEMPLATE_NAMESPACE_KEY: &str = "vm.kubevirt.io/template.namespace";
/// Legacy spelling of [`TEMPLATE_NAMESPACE_KEY`]
pub const TEMPLATE_NAMESPACE_OLD_KEY: &str = "vm.kubevirt.io/template-namespace";
/// Template annotation carrying the rule set
pub const TEMPLATE_VALIDATIONS_KEY: &str = "validations";
/// VM annotation carrying its own rule set, overriding the template's
pub const VM_VALIDATIONS_KEY: &str = "vm.kubevirt.io/validations";
/// VM annotation disabling validation altogether
pub const VM_SKIP_VALIDATIONS_KEY: &str = "vm.kubevirt.io/skip-validations";
/// Label marking a common template
pub const TEMPLATE_TYPE_LABEL: &str = "template.kubevirt.io/type";

/// Reference to a template, as read from one label or annotation map
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TemplateKey {
    pub name: String,
    pub namespace: String,
    pub old_namespace: String,
}

impl TemplateKey {
    fn from_map(map: Option<&BTreeMap<String, String>>) -> Self {
        let Some(map) = map else {
            return Self::default();
        };
        let get = |key: &str| map.get(key).cloned().unwrap_or_default();
        Self {
            name: get(TEMPLATE_NAME_KEY),
            namespace: get(TEMPLATE_NAMESPACE_KEY),
            old_namespace: get(TEMPLATE_NAMESPACE_OLD_KEY),
        }
    }

    /// The current namespace key, falling back to the legacy one
    pub fn any_namespace(&self) -> &str {
        if self.namespace.is_empty() {
            &self.old_namespace
        } else {
            &self.namespace
        }
    }

    pub fn is_valid(&self) -> bool {
        !self.name.is_empty() && !self.any_namespace().is_empty()
    }
}

/// Renders `namespace/name`, or nothing when the key is incomplete.
impl fmt::Display for TemplateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.is_valid() {
            return Ok(());
        }
        write!(f, "{}/{}", self.any_namespace(), self.name)
    }
}

/// Template references found in the labels and annotations of an object
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct TemplateKeys {
    pub label_key: TemplateKey,
    pub annotation_key: TemplateKey,
}

impl TemplateKeys {
    pub fn from_meta(meta: &ObjectMeta) -> Self {
        Self {
            label_key: TemplateKey::from_map(meta.labels.as_ref()),
            annotation_key: TemplateKey::from_map(meta.annotations.as_ref()),
        }
    }

    /// Labels win over annotations when both are usable.
    pub fn get(&self) -> &TemplateKey {
        if self.label_key.is_valid() {
            &self.label_key
        } else {
            &self.annotation_key
        }
    }

    pub fn is_valid(&self) -> bool {
        self.label_key.is_valid() || self.annotation_key.is_valid()
    }
}

pub fn has_annotation(meta: &ObjectMeta, key: &str) -> bool {
    meta.annotations
        .as_ref()
        .is_some_and(|a| a.contains_key(key))
}

pub fn annotation<'a>(meta: &'a ObjectMeta, key: &str) -> Option<&'a str> {
    meta.annotations
        .as_ref()
        .and_then(|a| a.get(key))
        .map(String::as_str)
}
