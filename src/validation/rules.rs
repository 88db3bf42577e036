//! Declarative validation rules.
//!
//! Rules arrive as a JSON array, usually from the `validations` annotation
//! of a Template:
//!
//! ```json
//! [{
//!   "name": "minimal-required-memory",
//!   "path": "jsonpath::.spec.domain.resources.requests.memory",
//!   "rule": "integer",
//!   "message": "This VM requires more memory.",
//!   "min": 1073741824
//! }]
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::{Error, Result};
use super::path::Path;
use super::specialized::{EnumRule, IntRule, Range, RegexRule, RuleApplier, StringRule};
use super::variants::{IntOrPath, StringOrPath};

/// Kind of check a rule performs
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(from = "String", into = "String")]
pub enum RuleType {
    Integer,
    String,
    Enum,
    Regex,
    /// Anything else, kept verbatim so evaluation can report it
    Unrecognized(String),
}

impl Default for RuleType {
    fn default() -> Self {
        RuleType::Unrecognized(String::new())
    }
}

impl RuleType {
    pub fn is_valid(&self) -> bool {
        !matches!(self, RuleType::Unrecognized(_))
    }
}

impl From<String> for RuleType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "integer" => RuleType::Integer,
            "string" => RuleType::String,
            "enum" => RuleType::Enum,
            "regex" => RuleType::Regex,
            _ => RuleType::Unrecognized(value),
        }
    }
}

impl From<RuleType> for String {
    fn from(value: RuleType) -> Self {
        value.to_string()
    }
}

impl fmt::Display for RuleType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RuleType::Integer => f.write_str("integer"),
            RuleType::String => f.write_str("string"),
            RuleType::Enum => f.write_str("enum"),
            RuleType::Regex => f.write_str("regex"),
            RuleType::Unrecognized(other) => f.write_str(other),
        }
    }
}

/// A single validation rule.
///
/// Required keys are optional here so that a rule missing one still parses
/// and is reported per rule during evaluation instead of rejecting the
/// whole payload.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Rule {
    #[serde(default)]
    pub rule: RuleType,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<Path>,
    #[serde(default)]
    pub message: String,

    /// Rule applies only when this path exists on the VM
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub valid: Option<Path>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub just_warning: bool,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values: Vec<StringOrPath>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<IntOrPath>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<IntOrPath>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<IntOrPath>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<IntOrPath>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regex: Option<String>,
}

impl Rule {
    /// The target path, or `MissingRequiredKey` if absent or empty.
    pub fn target(&self) -> Result<&Path> {
        match &self.path {
            Some(path) if !path.expr().is_empty() => Ok(path),
            _ => Err(Error::MissingRequiredKey),
        }
    }

    /// Field reference used in admission causes.
    pub fn field(&self) -> &str {
        self.path.as_ref().map_or("", Path::expr)
    }

    /// Check type and required keys.
    pub fn validate(&self) -> Result<()> {
        if !self.rule.is_valid() {
            return Err(Error::UnrecognizedRuleType);
        }
        self.target()?;
        if self.message.is_empty() {
            return Err(Error::MissingRequiredKey);
        }
        Ok(())
    }

    /// A rule without `valid` always applies. Otherwise `valid` must resolve
    /// on the VM itself (never the reference object) to at least one value.
    pub fn is_applicable_on(&self, vm: &Value) -> bool {
        match &self.valid {
            None => true,
            Some(valid) => valid.find(vm).is_ok_and(|results| !results.is_empty()),
        }
    }

    /// Resolve the rule parameters against the VM and build its applier.
    pub fn specialize(&self, vm: &Value, reference: &Value) -> Result<RuleApplier<'_>> {
        let target = self.target()?;
        let applier = match self.rule {
            RuleType::Integer => RuleApplier::Integer(IntRule::new(
                target,
                Range::decode(self.min.as_ref(), self.max.as_ref(), vm, reference)?,
            )),
            RuleType::String => RuleApplier::String(StringRule::new(
                target,
                Range::decode(
                    self.min_length.as_ref(),
                    self.max_length.as_ref(),
                    vm,
                    reference,
                )?,
            )),
            RuleType::Enum => {
                let allowed = self
                    .values
                    .iter()
                    .map(|value| value.decode(vm, reference))
                    .collect::<Result<Vec<_>>>()?;
                RuleApplier::Enum(EnumRule::new(target, allowed))
            }
            RuleType::Regex => RuleApplier::Regex(RegexRule::new(
                target,
                self.regex.as_deref().unwrap_or_default(),
            )?),
            RuleType::Unrecognized(_) => return Err(Error::UnrecognizedRuleType),
        };
        Ok(applier)
    }
}

/// Parse a rule set. An empty payload is an empty rule set.
pub fn parse_rules(data: &[u8]) -> Result<Vec<Rule>> {
    if data.iter().all(u8::is_ascii_whitespace) {
        return Ok(Vec::new());
    }
    Ok(serde_json::from_slice(data)?)
}
