//! Test fixtures and builder patterns for VirtualMachines and Templates.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::Arc;

use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use serde_json::{Value, json};
use template_validator::crd::{Template, VirtualMachine};
use template_validator::labels::{
    TEMPLATE_NAME_KEY, TEMPLATE_NAMESPACE_KEY, TEMPLATE_NAMESPACE_OLD_KEY, TEMPLATE_TYPE_LABEL,
    TEMPLATE_VALIDATIONS_KEY, VM_SKIP_VALIDATIONS_KEY, VM_VALIDATIONS_KEY,
};
use template_validator::{Evaluator, ReferenceObject};

/// The cirros demo VM: two virtio disks on a q35 machine with 128M of memory.
pub fn cirros_vm() -> Value {
    json!({
        "apiVersion": "kubevirt.io/v1",
        "kind": "VirtualMachine",
        "metadata": {"name": "vm-cirros", "namespace": "default"},
        "spec": {
            "running": false,
            "template": {
                "metadata": {"labels": {"kubevirt.io/vm": "vm-cirros"}},
                "spec": {
                    "domain": {
                        "devices": {"disks": [
                            {"name": "containerdisk", "disk": {"bus": "virtio"}},
                            {"name": "cloudinitdisk", "disk": {"bus": "virtio"}}
                        ]},
                        "machine": {"type": "q35"},
                        "resources": {"requests": {"memory": "128M"}}
                    },
                    "terminationGracePeriodSeconds": 0,
                    "volumes": [
                        {"name": "containerdisk",
                         "containerDisk": {"image": "kubevirt/cirros-container-disk-demo:latest"}},
                        {"name": "cloudinitdisk",
                         "cloudInitNoCloud": {"userDataBase64": "IyEvYmluL3NoCgplY2hvICdwcmludGVkIGZyb20gY2xvdWQtaW5pdCB1c2VyZGF0YScK"}}
                    ]
                }
            }
        }
    })
}

pub fn evaluator() -> Evaluator {
    Evaluator::new(Arc::new(ReferenceObject::new().expect("reference object")))
}

/// Builder for VirtualMachine test fixtures, starting from [`cirros_vm`].
///
/// # Example
/// ```ignore
/// let vm = VirtualMachineBuilder::new("test-vm")
///     .template("openshift", "fedora")
///     .memory("2Gi")
///     .build();
/// ```
#[derive(Clone, Debug)]
pub struct VirtualMachineBuilder {
    value: Value,
    labels: BTreeMap<String, String>,
    annotations: BTreeMap<String, String>,
}

impl VirtualMachineBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        let mut value = cirros_vm();
        value["metadata"]["name"] = Value::String(name.into());
        Self {
            value,
            labels: BTreeMap::new(),
            annotations: BTreeMap::new(),
        }
    }

    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.value["metadata"]["namespace"] = Value::String(namespace.into());
        self
    }

    /// Reference a parent template through labels
    pub fn template(mut self, namespace: &str, name: &str) -> Self {
        self.labels.insert(TEMPLATE_NAME_KEY.into(), name.into());
        self.labels
            .insert(TEMPLATE_NAMESPACE_KEY.into(), namespace.into());
        self
    }

    /// Reference a parent template with the legacy namespace key
    pub fn legacy_template(mut self, namespace: &str, name: &str) -> Self {
        self.labels.insert(TEMPLATE_NAME_KEY.into(), name.into());
        self.labels
            .insert(TEMPLATE_NAMESPACE_OLD_KEY.into(), namespace.into());
        self
    }

    pub fn inline_rules(mut self, rules: &str) -> Self {
        self.annotations
            .insert(VM_VALIDATIONS_KEY.into(), rules.into());
        self
    }

    pub fn skip_validation(mut self) -> Self {
        self.annotations
            .insert(VM_SKIP_VALIDATIONS_KEY.into(), String::new());
        self
    }

    pub fn memory(mut self, memory: &str) -> Self {
        self.value["spec"]["template"]["spec"]["domain"]["resources"]["requests"]["memory"] =
            Value::String(memory.into());
        self
    }

    pub fn cpu(mut self, cpu: Value) -> Self {
        self.value["spec"]["template"]["spec"]["domain"]["cpu"] = cpu;
        self
    }

    pub fn disk_bus(mut self, disk: usize, bus: &str) -> Self {
        self.value["spec"]["template"]["spec"]["domain"]["devices"]["disks"][disk]["disk"]["bus"] =
            Value::String(bus.into());
        self
    }

    pub fn json(&self) -> Value {
        let mut value = self.value.clone();
        if !self.labels.is_empty() {
            value["metadata"]["labels"] = json!(self.labels);
        }
        if !self.annotations.is_empty() {
            value["metadata"]["annotations"] = json!(self.annotations);
        }
        value
    }

    pub fn build(&self) -> VirtualMachine {
        serde_json::from_value(self.json()).expect("valid VirtualMachine")
    }
}

/// Builder for Template test fixtures.
#[derive(Clone, Debug)]
pub struct TemplateBuilder {
    name: String,
    namespace: String,
    common: bool,
    validations: Option<String>,
}

impl TemplateBuilder {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            common: false,
            validations: None,
        }
    }

    /// Mark as a common template
    pub fn common(mut self) -> Self {
        self.common = true;
        self
    }

    pub fn validations(mut self, rules: impl Into<String>) -> Self {
        self.validations = Some(rules.into());
        self
    }

    pub fn build(&self) -> Template {
        let mut metadata = ObjectMeta {
            name: Some(self.name.clone()),
            namespace: Some(self.namespace.clone()),
            ..Default::default()
        };
        if self.common {
            metadata.labels = Some([(TEMPLATE_TYPE_LABEL.to_string(), "base".to_string())].into());
        }
        if let Some(rules) = &self.validations {
            metadata.annotations = Some([(TEMPLATE_VALIDATIONS_KEY.to_string(), rules.clone())].into());
        }
        Template {
            metadata,
            ..Default::default()
        }
    }
}
