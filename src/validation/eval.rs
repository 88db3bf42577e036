//! Rule-set evaluation.
//!
//! Evaluation is greedy: every rule is processed and reported, and one
//! failing rule never stops the others. Per rule, in input order:
//!
//! 1. well-formedness (unique name, known type, path and message present)
//! 2. applicability (`valid` must resolve on the VM itself)
//! 3. specialization against the VM and reference object
//! 4. application
//!
//! Malformed rules always fail the evaluation. Errors in steps 3 and 4, and
//! unsatisfied rules, fail it unless the rule is `justWarning`.

use std::collections::HashSet;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use super::error::{Error, Result};
use super::reference::ReferenceObject;
use super::rules::Rule;
use crate::crd::VirtualMachine;

/// Outcome of one rule
#[derive(Debug)]
pub struct Report<'a> {
    pub rule: &'a Rule,
    /// Not applicable to this VM
    pub skipped: bool,
    pub satisfied: bool,
    /// Explanation rendered by the applier
    pub message: String,
    pub error: Option<Error>,
}

impl<'a> Report<'a> {
    fn new(rule: &'a Rule) -> Self {
        Self {
            rule,
            skipped: false,
            satisfied: false,
            message: String::new(),
            error: None,
        }
    }
}

/// A field-level reason for rejecting a VM
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StatusCause {
    pub field: String,
    pub message: String,
}

/// Reports of one evaluation plus the aggregate verdict
#[derive(Debug, Default)]
pub struct EvaluationResult<'a> {
    pub reports: Vec<Report<'a>>,
    failed: bool,
}

impl<'a> EvaluationResult<'a> {
    pub fn succeeded(&self) -> bool {
        !self.failed
    }

    fn fail(&mut self, rule: &'a Rule, error: Error) {
        self.reports.push(Report {
            error: Some(error),
            ..Report::new(rule)
        });
        self.failed = true;
    }

    fn warn(&mut self, rule: &'a Rule, error: Error) {
        warn!(rule = %rule.name, error = %error, "{}", rule.message);
        self.reports.push(Report {
            error: Some(error),
            ..Report::new(rule)
        });
    }

    fn skip(&mut self, rule: &'a Rule) {
        self.reports.push(Report {
            skipped: true,
            ..Report::new(rule)
        });
    }

    fn applied(&mut self, rule: &'a Rule, satisfied: bool, message: String) {
        self.reports.push(Report {
            satisfied,
            message,
            ..Report::new(rule)
        });
        if !satisfied {
            if rule.just_warning {
                warn!(rule = %rule.name, error = %Error::UnsatisfiedRule, "{}", rule.message);
            } else {
                self.failed = true;
            }
        }
    }

    /// One cause per report that errored or was applied and not satisfied.
    /// Empty when the evaluation succeeded.
    pub fn to_status_causes(&self) -> Vec<StatusCause> {
        if self.succeeded() {
            return Vec::new();
        }
        self.reports
            .iter()
            .filter_map(|report| {
                let detail = match &report.error {
                    Some(error) => error.to_string(),
                    None if !report.skipped && !report.satisfied => report.message.clone(),
                    None => return None,
                };
                Some(StatusCause {
                    field: report.rule.field().to_string(),
                    message: format!("{}: {}", report.rule.message, detail),
                })
            })
            .collect()
    }
}

/// Applies rule sets to VMs
#[derive(Clone, Debug)]
pub struct Evaluator {
    reference: Arc<ReferenceObject>,
}

impl Evaluator {
    pub fn new(reference: Arc<ReferenceObject>) -> Self {
        Self { reference }
    }

    /// Evaluate a typed VM.
    ///
    /// Only fields modelled by [`VirtualMachine`] are visible to the rules.
    /// Use [`evaluate`](Self::evaluate) on the submitted JSON to see all of
    /// them.
    pub fn evaluate_vm<'a>(
        &self,
        rules: &'a [Rule],
        vm: &VirtualMachine,
    ) -> Result<EvaluationResult<'a>> {
        let value = serde_json::to_value(vm)?;
        Ok(self.evaluate(rules, &value))
    }

    /// Evaluate the JSON view of a VM.
    pub fn evaluate<'a>(&self, rules: &'a [Rule], vm: &Value) -> EvaluationResult<'a> {
        let reference = self.reference.value();
        let mut names = HashSet::new();
        let mut result = EvaluationResult::default();

        for rule in rules {
            if !names.insert(rule.name.as_str()) {
                debug!(rule = %rule.name, "rule failed: duplicate name");
                result.fail(rule, Error::DuplicateRuleName);
                continue;
            }

            if let Err(e) = rule.validate() {
                debug!(rule = %rule.name, error = %e, "rule failed: malformed");
                result.fail(rule, e);
                continue;
            }

            if !rule.is_applicable_on(vm) {
                debug!(rule = %rule.name, "rule skipped: not applicable");
                result.skip(rule);
                continue;
            }

            let mut applier = match rule.specialize(vm, reference) {
                Ok(applier) => applier,
                Err(e) => {
                    debug!(rule = %rule.name, error = %e, "rule failed: cannot specialize");
                    if rule.just_warning {
                        result.warn(rule, e);
                    } else {
                        result.fail(rule, e);
                    }
                    continue;
                }
            };

            let satisfied = match applier.apply(vm, reference) {
                Ok(satisfied) => satisfied,
                Err(e) => {
                    debug!(rule = %rule.name, error = %e, "rule failed: cannot apply");
                    if rule.just_warning {
                        result.warn(rule, e);
                    } else {
                        result.fail(rule, e);
                    }
                    continue;
                }
            };

            let message = applier.to_string();
            debug!(
                rule = %rule.name,
                status = if satisfied { "OK" } else { "FAIL" },
                message = %message,
                "rule applied"
            );
            result.applied(rule, satisfied, message);
        }

        result
    }
}
