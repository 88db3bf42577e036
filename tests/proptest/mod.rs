// Test code is allowed to panic on failure
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::panic,
    clippy::string_slice
)]

//! Property-based tests for template-validator.
//!
//! Uses proptest to generate random inputs and verify invariants.

#[path = "../common/mod.rs"]
mod common;

use std::collections::{BTreeMap, BTreeSet};

use proptest::prelude::*;
use serde_json::json;

use template_validator::VmTemplateIndex;
use template_validator::crd::VirtualMachine;
use template_validator::validation::quantity::parse_quantity_i64;
use template_validator::validation::{Range, parse_rules};

use common::{VirtualMachineBuilder, evaluator};

/// Strategy for optional range bounds.
fn any_bound() -> impl Strategy<Value = Option<i64>> {
    prop_oneof![Just(None), (-1000i64..1000).prop_map(Some)]
}

/// One mutation of the VM index.
#[derive(Clone, Debug)]
enum IndexOp {
    /// Upsert `vm-<n>`, optionally referencing `openshift/tpl-<m>`
    Upsert(u8, Option<u8>),
    Delete(u8),
}

fn any_index_op() -> impl Strategy<Value = IndexOp> {
    prop_oneof![
        (0u8..8, proptest::option::of(0u8..3)).prop_map(|(vm, tpl)| IndexOp::Upsert(vm, tpl)),
        (0u8..8).prop_map(IndexOp::Delete),
    ]
}

fn vm(n: u8, template: Option<u8>) -> VirtualMachine {
    let builder = VirtualMachineBuilder::new(format!("vm-{n}"));
    match template {
        Some(t) => builder.template("openshift", &format!("tpl-{t}")).build(),
        None => builder.build(),
    }
}

proptest! {
    /// Range inclusion matches the plain comparison of both bounds.
    #[test]
    fn range_includes_matches_bounds(min in any_bound(), max in any_bound(), value in -2000i64..2000) {
        let range = Range::new(min, max);
        let expected = min.is_none_or(|m| value >= m) && max.is_none_or(|m| value <= m);
        prop_assert_eq!(range.includes(value), expected);
    }

    /// Plain decimal strings parse to the integer they spell.
    #[test]
    fn quantity_plain_digits(value in 0i64..i64::MAX) {
        prop_assert_eq!(parse_quantity_i64(&value.to_string()), Some(value));
    }

    /// Decimal SI suffixes scale by powers of 1000.
    #[test]
    fn quantity_decimal_suffix(value in 0i64..1_000_000) {
        prop_assert_eq!(parse_quantity_i64(&format!("{value}k")), Some(value * 1_000));
        prop_assert_eq!(parse_quantity_i64(&format!("{value}M")), Some(value * 1_000_000));
        prop_assert_eq!(parse_quantity_i64(&format!("{value}Mi")), Some(value * 1_048_576));
    }

    /// An integer rule on memory is satisfied exactly when the request lies
    /// in the interval, and evaluating twice gives the same outcome.
    #[test]
    fn memory_rule_matches_interval(
        memory in 1i64..1_000_000,
        min in 1i64..1_000_000,
        span in 0i64..1_000_000,
    ) {
        let max = min + span;
        let payload = json!([{
            "name": "memory",
            "rule": "integer",
            "path": "jsonpath::.spec.domain.resources.requests.memory",
            "message": "memory out of range",
            "min": min,
            "max": max,
        }])
        .to_string();
        let rules = parse_rules(payload.as_bytes()).unwrap();
        let vm = VirtualMachineBuilder::new("vm").memory(&memory.to_string()).json();

        let evaluator = evaluator();
        let first = evaluator.evaluate(&rules, &vm);
        let second = evaluator.evaluate(&rules, &vm);

        prop_assert_eq!(first.succeeded(), (min..=max).contains(&memory));
        prop_assert_eq!(first.succeeded(), second.succeeded());
        prop_assert_eq!(&first.reports[0].message, &second.reports[0].message);
        prop_assert_eq!(first.to_status_causes(), second.to_status_causes());
    }

    /// After any sequence of updates and deletes, the reverse map agrees
    /// with the entries of the index.
    #[test]
    fn index_reverse_map_is_consistent(ops in proptest::collection::vec(any_index_op(), 0..40)) {
        let index = VmTemplateIndex::default();
        let mut model: BTreeMap<String, String> = BTreeMap::new();

        for op in &ops {
            match *op {
                IndexOp::Upsert(n, template) => {
                    index.update(&vm(n, template));
                    let key = format!("default/vm-{n}");
                    match template {
                        Some(t) => {
                            model.insert(key, format!("openshift/tpl-{t}"));
                        }
                        None => {
                            model.remove(&key);
                        }
                    }
                }
                IndexOp::Delete(n) => {
                    index.delete(&vm(n, None));
                    model.remove(&format!("default/vm-{n}"));
                }
            }
        }

        let keys: BTreeSet<String> = index.list_keys().into_iter().collect();
        prop_assert_eq!(keys, model.keys().cloned().collect::<BTreeSet<_>>());

        for t in 0u8..3 {
            let template = format!("openshift/tpl-{t}");
            let indexed: BTreeSet<String> = index.vms_for_template(&template).into_iter().collect();
            let expected: BTreeSet<String> = model
                .iter()
                .filter(|(_, tpl)| **tpl == template)
                .map(|(vm, _)| vm.clone())
                .collect();
            prop_assert_eq!(indexed, expected);
        }
    }
}
