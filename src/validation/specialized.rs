//! Specialized, directly executable forms of rules.
//!
//! A [`Rule`](super::Rule) is specialized against one VM: its bounds and
//! allow-lists are resolved to concrete values, then the resulting
//! [`RuleApplier`] checks the values found at the rule's target path.
//! After `apply`, the applier renders a human explanation via `Display`.

use std::fmt;

use regex::Regex;
use serde_json::Value;

use super::error::{Error, Result};
use super::path::{Path, find_on_object_or_reference};
use super::variants::IntOrPath;

/// Inclusive range with optional bounds
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Range {
    pub min: Option<i64>,
    pub max: Option<i64>,
}

impl Range {
    pub fn new(min: Option<i64>, max: Option<i64>) -> Self {
        Self { min, max }
    }

    /// Resolve the bounds of a rule against the VM and reference object.
    pub fn decode(
        min: Option<&IntOrPath>,
        max: Option<&IntOrPath>,
        vm: &Value,
        reference: &Value,
    ) -> Result<Self> {
        Ok(Self {
            min: min.map(|m| m.decode(vm, reference)).transpose()?,
            max: max.map(|m| m.decode(vm, reference)).transpose()?,
        })
    }

    pub fn includes(&self, value: i64) -> bool {
        self.min.is_none_or(|min| value >= min) && self.max.is_none_or(|max| value <= max)
    }

    fn lower_bound(&self) -> String {
        self.min.map_or_else(|| "N/A".to_string(), |v| v.to_string())
    }

    fn upper_bound(&self) -> String {
        self.max.map_or_else(|| "N/A".to_string(), |v| v.to_string())
    }
}

/// A rule ready to be applied
#[derive(Debug)]
pub enum RuleApplier<'r> {
    Integer(IntRule<'r>),
    String(StringRule<'r>),
    Enum(EnumRule<'r>),
    Regex(RegexRule<'r>),
}

impl RuleApplier<'_> {
    /// Check every value at the target path. Returns whether all of them
    /// satisfy the rule.
    pub fn apply(&mut self, vm: &Value, reference: &Value) -> Result<bool> {
        match self {
            RuleApplier::Integer(rule) => rule.apply(vm, reference),
            RuleApplier::String(rule) => rule.apply(vm, reference),
            RuleApplier::Enum(rule) => rule.apply(vm, reference),
            RuleApplier::Regex(rule) => rule.apply(vm, reference),
        }
    }
}

impl fmt::Display for RuleApplier<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleApplier::Integer(rule) => fmt::Display::fmt(rule, f),
            RuleApplier::String(rule) => fmt::Display::fmt(rule, f),
            RuleApplier::Enum(rule) => fmt::Display::fmt(rule, f),
            RuleApplier::Regex(rule) => fmt::Display::fmt(rule, f),
        }
    }
}

fn target_strings(target: &Path, vm: &Value, reference: &Value) -> Result<Vec<String>> {
    let values = find_on_object_or_reference(target, vm, reference)?.as_string()?;
    if values.is_empty() {
        return Err(Error::NoValuesFound);
    }
    Ok(values)
}

#[derive(Debug)]
pub struct IntRule<'r> {
    target: &'r Path,
    range: Range,
    current: Vec<i64>,
    satisfied: bool,
}

impl<'r> IntRule<'r> {
    pub fn new(target: &'r Path, range: Range) -> Self {
        Self {
            target,
            range,
            current: Vec::new(),
            satisfied: false,
        }
    }

    fn apply(&mut self, vm: &Value, reference: &Value) -> Result<bool> {
        let values = find_on_object_or_reference(self.target, vm, reference)?.as_int64()?;
        if values.is_empty() {
            return Err(Error::NoValuesFound);
        }
        self.satisfied = values.iter().all(|v| self.range.includes(*v));
        self.current = values;
        Ok(self.satisfied)
    }
}

impl fmt::Display for IntRule<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let lower = self.range.lower_bound();
        let upper = self.range.upper_bound();
        if self.satisfied {
            let values: Vec<String> = self.current.iter().map(i64::to_string).collect();
            return write!(
                f,
                "All values [{}] are in interval [{}, {}]",
                values.join(", "),
                lower,
                upper
            );
        }

        let mut violations = Vec::new();
        for &value in &self.current {
            if self.range.min.is_some_and(|min| value < min) {
                violations.push(format!("value {} is lower than minimum [{}]", value, lower));
            }
            if self.range.max.is_some_and(|max| value > max) {
                violations.push(format!("value {} is higher than maximum [{}]", value, upper));
            }
        }
        f.write_str(&violations.join(", "))
    }
}

#[derive(Debug)]
pub struct StringRule<'r> {
    target: &'r Path,
    length: Range,
    current: Vec<String>,
    satisfied: bool,
}

impl<'r> StringRule<'r> {
    pub fn new(target: &'r Path, length: Range) -> Self {
        Self {
            target,
            length,
            current: Vec::new(),
            satisfied: false,
        }
    }

    fn apply(&mut self, vm: &Value, reference: &Value) -> Result<bool> {
        let values = target_strings(self.target, vm, reference)?;
        self.satisfied = values
            .iter()
            .all(|v| self.length.includes(i64::try_from(v.len()).unwrap_or(i64::MAX)));
        self.current = values;
        Ok(self.satisfied)
    }
}

impl fmt::Display for StringRule<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (lower, upper) = (self.length.lower_bound(), self.length.upper_bound());
        if self.satisfied {
            write!(f, "Lengths of all strings are in interval [{}, {}]", lower, upper)
        } else {
            write!(f, "Lengths of some strings are not in interval [{}, {}]", lower, upper)
        }
    }
}

#[derive(Debug)]
pub struct EnumRule<'r> {
    target: &'r Path,
    allowed: Vec<String>,
    current: Vec<String>,
    satisfied: bool,
}

impl<'r> EnumRule<'r> {
    pub fn new(target: &'r Path, allowed: Vec<String>) -> Self {
        Self {
            target,
            allowed,
            current: Vec::new(),
            satisfied: false,
        }
    }

    fn apply(&mut self, vm: &Value, reference: &Value) -> Result<bool> {
        let values = target_strings(self.target, vm, reference)?;
        self.satisfied = values.iter().all(|v| self.allowed.contains(v));
        self.current = values;
        Ok(self.satisfied)
    }
}

impl fmt::Display for EnumRule<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let current = self.current.join(", ");
        let allowed = self.allowed.join(", ");
        if self.satisfied {
            write!(f, "All [{}] are in [{}]", current, allowed)
        } else {
            write!(f, "Some of [{}] are not in [{}]", current, allowed)
        }
    }
}

#[derive(Debug)]
pub struct RegexRule<'r> {
    target: &'r Path,
    regex: Regex,
    current: Vec<String>,
    satisfied: bool,
}

impl<'r> RegexRule<'r> {
    pub fn new(target: &'r Path, pattern: &str) -> Result<Self> {
        Ok(Self {
            target,
            regex: Regex::new(pattern)?,
            current: Vec::new(),
            satisfied: false,
        })
    }

    fn apply(&mut self, vm: &Value, reference: &Value) -> Result<bool> {
        let values = target_strings(self.target, vm, reference)?;
        self.satisfied = values.iter().all(|v| self.regex.is_match(v));
        self.current = values;
        Ok(self.satisfied)
    }
}

impl fmt::Display for RegexRule<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let current = self.current.join(", ");
        if self.satisfied {
            write!(f, "All [{}] match {}", current, self.regex)
        } else {
            write!(f, "Some of [{}] do not match {}", current, self.regex)
        }
    }
}
