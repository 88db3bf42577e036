//! Unit tests for template-validator.
//!
//! These tests run without a Kubernetes cluster and test individual
//! components in isolation.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::indexing_slicing)]

#[path = "../common/mod.rs"]
mod common;

mod path_tests {
    use serde_json::json;
    use template_validator::validation::{Error, Path, find_on_object_or_reference};

    use crate::common::cirros_vm;

    #[test]
    fn test_dollar_prefix_is_optional() {
        let plain = Path::compile("jsonpath::.spec.domain.machine.type").unwrap();
        let dollar = Path::compile("jsonpath::$.spec.domain.machine.type").unwrap();
        assert_eq!(plain, dollar);

        let vm = cirros_vm();
        let values = dollar.find(&vm).unwrap().as_string().unwrap();
        assert_eq!(values, vec!["q35"]);
    }

    #[test]
    fn test_prefix_required() {
        assert!(matches!(
            Path::compile(".spec.domain.cpu.cores"),
            Err(Error::InvalidPath)
        ));
    }

    #[test]
    fn test_disk_buses() {
        let vm = cirros_vm();
        let path = Path::compile("jsonpath::.spec.domain.devices.disks[*].disk.bus").unwrap();
        assert_eq!(
            path.find(&vm).unwrap().as_string().unwrap(),
            vec!["virtio", "virtio"]
        );
    }

    #[test]
    fn test_filter_expression() {
        let vm = cirros_vm();
        let path = Path::compile(
            "jsonpath::.spec.volumes[?(@.name == 'containerdisk')].containerDisk.image",
        )
        .unwrap();
        assert_eq!(
            path.find(&vm).unwrap().as_string().unwrap(),
            vec!["kubevirt/cirros-container-disk-demo:latest"]
        );
    }

    #[test]
    fn test_reference_fallback() {
        let vm = cirros_vm();
        let reference = json!({"spec": {"template": {"spec": {"domain": {"cpu": {"cores": 0}}}}}});
        let path = Path::compile("jsonpath::.spec.domain.cpu.cores").unwrap();

        assert!(path.find(&vm).is_err());
        let values = find_on_object_or_reference(&path, &vm, &reference)
            .unwrap()
            .as_int64()
            .unwrap();
        assert_eq!(values, vec![0]);
    }

    #[test]
    fn test_memory_quantity_as_int() {
        let vm = cirros_vm();
        let path = Path::compile("jsonpath::.spec.domain.resources.requests.memory").unwrap();
        assert_eq!(path.find(&vm).unwrap().as_int64().unwrap(), vec![128_000_000]);
    }
}

mod rule_tests {
    use template_validator::validation::{Error, IntOrPath, RuleType, StringOrPath, parse_rules};

    #[test]
    fn test_parse_full_rule_set() {
        let rules = parse_rules(
            br#"[
                {"name": "core-limits", "valid": "jsonpath::.spec.domain.cpu.cores",
                 "path": "jsonpath::.spec.domain.cpu.cores", "rule": "integer",
                 "message": "cpu cores must be limited", "min": 1, "max": 8},
                {"name": "supported-bus", "path": "jsonpath::.spec.devices.disks[*].type",
                 "rule": "enum", "message": "the disk bus type must be one of the supported values",
                 "values": ["virtio", "scsi", "jsonpath::.spec.domain.machine.type"]},
                {"name": "host-name", "path": "jsonpath::.spec.hostname", "rule": "string",
                 "message": "hostname must be reasonable", "minLength": 1, "maxLength": 63,
                 "justWarning": true},
                {"name": "mac", "path": "jsonpath::.spec.domain.devices.interfaces[*].macAddress",
                 "rule": "regex", "message": "mac must be local", "regex": "^02:"}
            ]"#,
        )
        .unwrap();

        assert_eq!(rules.len(), 4);
        assert_eq!(rules[0].rule, RuleType::Integer);
        assert_eq!(rules[0].min, Some(IntOrPath::Int(1)));
        assert!(rules[0].valid.is_some());
        assert_eq!(rules[1].rule, RuleType::Enum);
        assert!(rules[1].values[0].is_literal());
        assert!(!rules[1].values[2].is_literal());
        assert_eq!(rules[1].values[1], StringOrPath::String("scsi".into()));
        assert!(rules[2].just_warning);
        assert_eq!(rules[3].regex.as_deref(), Some("^02:"));
    }

    #[test]
    fn test_empty_payload() {
        assert!(parse_rules(b"").unwrap().is_empty());
        assert!(parse_rules(b"[]").unwrap().is_empty());
    }

    #[test]
    fn test_malformed_path_rejects_payload() {
        let err = parse_rules(
            br#"[{"name": "r", "rule": "integer", "message": "m",
                  "path": "jsonpath::random56junk%(*$%&*()"}]"#,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Serialization(_)));
    }

    #[test]
    fn test_unknown_rule_type_parses() {
        let rules = parse_rules(
            br#"[{"name": "r", "rule": "value-set", "message": "m",
                  "path": "jsonpath::.spec.domain.machine.type"}]"#,
        )
        .unwrap();
        assert!(!rules[0].rule.is_valid());
    }
}

mod evaluator_tests {
    use template_validator::validation::parse_rules;

    use crate::common::{VirtualMachineBuilder, cirros_vm, evaluator};

    #[test]
    fn test_uninitialized_path_can_be_skipped() {
        let rules = parse_rules(
            br#"[{"name": "LimitCores", "rule": "integer",
                  "path": "jsonpath::.spec.domain.cpu.cores",
                  "valid": "jsonpath::.spec.domain.cpu.cores",
                  "message": "testing", "min": 1, "max": 8}]"#,
        )
        .unwrap();
        let result = evaluator().evaluate(&rules, &cirros_vm());
        assert!(result.succeeded());
        assert!(result.reports[0].skipped);
        assert!(!result.reports[0].satisfied);
    }

    #[test]
    fn test_uninitialized_path_intermixed_with_valid_paths() {
        let rules = parse_rules(
            br#"[
                {"name": "EnoughMemory", "rule": "integer",
                 "path": "jsonpath::.spec.domain.resources.requests.memory",
                 "message": "Memory size not specified", "min": 67108864, "max": 536870912},
                {"name": "LimitCores", "rule": "integer",
                 "path": "jsonpath::.spec.domain.cpu.cores",
                 "message": "Core amount not within range", "min": 1, "max": 4},
                {"name": "SupportedChipset", "rule": "enum",
                 "path": "jsonpath::.spec.domain.machine.type",
                 "message": "machine type must be a supported value", "values": ["q35"]}
            ]"#,
        )
        .unwrap();
        let result = evaluator().evaluate(&rules, &cirros_vm());
        assert!(!result.succeeded());

        let causes = result.to_status_causes();
        assert_eq!(causes.len(), 1);
        assert_eq!(causes[0].field, ".spec.domain.cpu.cores");
        assert_eq!(
            causes[0].message,
            "Core amount not within range: value 0 is lower than minimum [1]"
        );
    }

    #[test]
    fn test_warning_does_not_mask_failure() {
        let rules = parse_rules(
            br#"[
                {"name": "disk bus", "rule": "enum",
                 "path": "jsonpath::.spec.domain.devices.disks[*].disk.bus",
                 "message": "testing", "values": ["sata"], "justWarning": true},
                {"name": "rule-2", "rule": "integer", "min": 6, "max": 8,
                 "path": "jsonpath::.spec.domain.cpu.cores", "message": "enough cores"}
            ]"#,
        )
        .unwrap();
        let result = evaluator().evaluate(&rules, &cirros_vm());
        assert!(!result.succeeded());
        for report in &result.reports {
            assert!(!report.skipped);
            assert!(!report.satisfied);
            assert!(report.error.is_none());
        }
    }

    #[test]
    fn test_broken_warning_rule_does_not_block() {
        let rules = parse_rules(
            br#"[
                {"name": "disk bus", "rule": "enum",
                 "path": "jsonpath::.spec.domain.devices.some.non.existing.path",
                 "message": "testing", "values": ["sata"], "justWarning": true},
                {"name": "rule-2", "rule": "integer", "min": 0, "max": 8,
                 "path": "jsonpath::.spec.domain.cpu.cores", "message": "enough cores"}
            ]"#,
        )
        .unwrap();
        let result = evaluator().evaluate(&rules, &cirros_vm());
        assert!(result.succeeded());
        assert!(result.reports[0].error.is_some());
        assert!(result.reports[1].satisfied);
    }

    #[test]
    fn test_malformed_rule_fails_rule_set() {
        let rules = parse_rules(
            br#"[
                {"name": "EnoughMemory", "rule": "integer",
                 "path": "jsonpath::.spec.domain.resources.requests.memory",
                 "message": "Memory size not specified", "min": 67108864, "max": 536870912},
                {"name": "SupportedChipset", "rule": "value-set",
                 "path": "jsonpath::.spec.domain.machine.type",
                 "message": "machine type must be a supported value", "values": ["q35"]}
            ]"#,
        )
        .unwrap();
        let result = evaluator().evaluate(&rules, &cirros_vm());
        assert!(!result.succeeded());
        assert!(result.reports[0].satisfied);
    }

    #[test]
    fn test_bound_read_from_vm() {
        let rules = parse_rules(
            br#"[{"name": "threads-per-core", "rule": "integer",
                  "path": "jsonpath::.spec.domain.cpu.threads",
                  "message": "no more threads than cores",
                  "max": "jsonpath::.spec.domain.cpu.cores"}]"#,
        )
        .unwrap();

        let vm = VirtualMachineBuilder::new("vm")
            .cpu(serde_json::json!({"cores": 2, "threads": 4}))
            .json();
        let result = evaluator().evaluate(&rules, &vm);
        assert!(!result.succeeded());
        assert_eq!(result.reports[0].message, "value 4 is higher than maximum [2]");

        let vm = VirtualMachineBuilder::new("vm")
            .cpu(serde_json::json!({"cores": 4, "threads": 2}))
            .json();
        assert!(evaluator().evaluate(&rules, &vm).succeeded());
    }

    #[test]
    fn test_regex_on_disk_names() {
        let rules = parse_rules(
            br#"[{"name": "disk-names", "rule": "regex",
                  "path": "jsonpath::.spec.domain.devices.disks[*].name",
                  "message": "disk names end in disk", "regex": "disk$"}]"#,
        )
        .unwrap();
        let result = evaluator().evaluate(&rules, &cirros_vm());
        assert!(result.succeeded());
        assert_eq!(
            result.reports[0].message,
            "All [containerdisk, cloudinitdisk] match disk$"
        );
    }

    #[test]
    fn test_typed_vm_evaluation() {
        let rules = parse_rules(
            br#"[{"name": "bus", "rule": "enum",
                  "path": "jsonpath::.spec.domain.devices.disks[*].disk.bus",
                  "message": "virtio only", "values": ["virtio"]}]"#,
        )
        .unwrap();

        let vm = VirtualMachineBuilder::new("vm").disk_bus(1, "sata").build();
        let result = evaluator().evaluate_vm(&rules, &vm).unwrap();
        assert!(!result.succeeded());
        assert_eq!(
            result.reports[0].message,
            "Some of [virtio, sata] are not in [virtio]"
        );
    }
}

mod index_tests {
    use template_validator::VmTemplateIndex;

    use crate::common::VirtualMachineBuilder;

    #[test]
    fn test_legacy_namespace_key_is_indexed() {
        let index = VmTemplateIndex::default();
        let vm = VirtualMachineBuilder::new("vm-1")
            .legacy_template("openshift", "rhel8")
            .build();
        index.add(&vm);
        assert_eq!(index.vms_for_template("openshift/rhel8"), vec!["default/vm-1"]);
    }

    #[test]
    fn test_inline_and_skipped_vms_not_indexed() {
        let index = VmTemplateIndex::default();
        index.add(
            &VirtualMachineBuilder::new("inline")
                .template("openshift", "fedora")
                .inline_rules("[]")
                .build(),
        );
        index.add(
            &VirtualMachineBuilder::new("skipped")
                .template("openshift", "fedora")
                .skip_validation()
                .build(),
        );
        assert!(index.list().is_empty());
    }

    #[test]
    fn test_filter_transition_on_update() {
        let index = VmTemplateIndex::default();
        let untemplated = VirtualMachineBuilder::new("vm-1").build();
        let templated = VirtualMachineBuilder::new("vm-1")
            .template("openshift", "fedora")
            .build();

        index.update(&untemplated);
        assert!(index.get_by_key("default/vm-1").is_none());

        index.update(&templated);
        assert_eq!(index.vms_for_template("openshift/fedora").len(), 1);

        index.update(&untemplated);
        assert!(index.vms_for_template("openshift/fedora").is_empty());
        assert!(index.get_by_key("default/vm-1").is_none());
    }
}

mod webhook_tests {
    use std::collections::HashMap;
    use std::sync::Arc;

    use template_validator::VmTemplateIndex;
    use template_validator::crd::Template;
    use template_validator::webhooks::{
        RulesError, ValidationContext, template_deletion, virtual_machine,
    };

    use crate::common::{TemplateBuilder, VirtualMachineBuilder, evaluator};

    const MEMORY_RULES: &str = r#"[{
        "name": "EnoughMemory", "rule": "integer",
        "path": "jsonpath::.spec.domain.resources.requests.memory",
        "message": "Memory size not within range", "min": 67108864, "max": 536870912
    }]"#;

    fn store(templates: &[Template]) -> HashMap<String, Arc<Template>> {
        templates
            .iter()
            .map(|t| (t.key(), Arc::new(t.clone())))
            .collect()
    }

    #[test]
    fn test_inline_rules_override_template() {
        let templates = store(&[TemplateBuilder::new("openshift", "fedora")
            .validations(MEMORY_RULES)
            .build()]);
        let vm = VirtualMachineBuilder::new("vm")
            .template("openshift", "fedora")
            .inline_rules("[]")
            .build();
        assert!(virtual_machine::resolve_rules(&vm.metadata, &templates).unwrap().is_empty());
    }

    #[test]
    fn test_template_without_validations() {
        let templates = store(&[TemplateBuilder::new("openshift", "fedora").build()]);
        let vm = VirtualMachineBuilder::new("vm")
            .template("openshift", "fedora")
            .build();
        assert!(virtual_machine::resolve_rules(&vm.metadata, &templates).unwrap().is_empty());
    }

    #[test]
    fn test_missing_template_error() {
        let vm = VirtualMachineBuilder::new("vm")
            .template("openshift", "fedora")
            .build();
        let err = virtual_machine::resolve_rules(&vm.metadata, &store(&[])).unwrap_err();
        assert!(matches!(err, RulesError::MissingTemplate { .. }));
    }

    #[test]
    fn test_vm_admission_end_to_end() {
        let templates = store(&[TemplateBuilder::new("openshift", "fedora")
            .validations(MEMORY_RULES)
            .build()]);
        let index = VmTemplateIndex::default();
        let evaluator = evaluator();
        let ctx = ValidationContext {
            templates: &templates,
            vm_index: &index,
            evaluator: &evaluator,
        };

        let vm = VirtualMachineBuilder::new("vm")
            .template("openshift", "fedora")
            .memory("1M")
            .json();
        let result = virtual_machine::validate(&ctx, vm);
        assert!(!result.allowed);
        assert_eq!(
            result.message.as_deref(),
            Some("Memory size not within range: value 1000000 is lower than minimum [67108864]")
        );

        let vm = VirtualMachineBuilder::new("vm")
            .template("openshift", "fedora")
            .json();
        assert!(virtual_machine::validate(&ctx, vm).allowed);

        let mut vm = VirtualMachineBuilder::new("vm")
            .template("openshift", "fedora")
            .json();
        vm["spec"]["template"]["spec"]["domain"]["resources"]["requests"]["memory"] =
            serde_json::json!(33554432);
        let result = virtual_machine::validate(&ctx, vm);
        assert_eq!(result.code, 422);
        assert_eq!(result.causes[0].field, ".spec.domain.resources.requests.memory");
    }

    #[test]
    fn test_template_deletion_lists_vms() {
        let template = TemplateBuilder::new("openshift", "fedora")
            .common()
            .validations(MEMORY_RULES)
            .build();
        let templates = store(&[]);
        let index = VmTemplateIndex::default();
        index.add(
            &VirtualMachineBuilder::new("vm-1")
                .template("openshift", "fedora")
                .build(),
        );
        let evaluator = evaluator();
        let ctx = ValidationContext {
            templates: &templates,
            vm_index: &index,
            evaluator: &evaluator,
        };

        let result = template_deletion::validate(&ctx, &template);
        assert!(!result.allowed);
        assert_eq!(
            result.message.as_deref(),
            Some(
                "Template cannot be deleted, because the following VMs are referencing it for validation: default/vm-1"
            )
        );
    }
}
