//! Error types for the validation engine.

use thiserror::Error;

/// Error type for path resolution, rule parsing and rule application
#[derive(Error, Debug)]
pub enum Error {
    /// The expression does not address anything on the given object,
    /// or it lacks the `jsonpath::` prefix.
    #[error("invalid JSONPath")]
    InvalidPath,

    /// The expression carries the prefix but cannot be parsed
    #[error("malformed JSONPath {expr:?}: {reason}")]
    MalformedPath { expr: String, reason: String },

    #[error("unrecognized Rule type")]
    UnrecognizedRuleType,

    #[error("duplicate Rule Name")]
    DuplicateRuleName,

    #[error("missing required key")]
    MissingRequiredKey,

    #[error("rule is not satisfied")]
    UnsatisfiedRule,

    #[error("no values were found")]
    NoValuesFound,

    #[error("expected one value, found {0}")]
    ExpectedSingleValue(usize),

    /// A resolved value cannot be converted to the type the rule needs
    #[error("mismatching type: found {found}, expected {expected}")]
    MismatchingType {
        found: String,
        expected: &'static str,
    },

    #[error("invalid regex: {0}")]
    InvalidRegex(#[from] regex::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Check if this error means the path does not exist on the object
    pub fn is_invalid_path(&self) -> bool {
        matches!(self, Error::InvalidPath)
    }
}

/// Result type alias for validation operations
pub type Result<T> = std::result::Result<T, Error>;
