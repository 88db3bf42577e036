//! Template-provided validation rules and their evaluation.
//!
//! A template carries a JSON array of [`Rule`]s in its `validations`
//! annotation. The [`Evaluator`] applies such a rule set to the JSON view of
//! a VirtualMachine, resolving missing optional fields against a
//! [`ReferenceObject`] that holds the defaults.

pub mod error;
pub mod eval;
pub mod path;
pub mod quantity;
pub mod reference;
pub mod rules;
pub mod specialized;
pub mod variants;

pub use error::{Error, Result};
pub use eval::{EvaluationResult, Evaluator, Report, StatusCause};
pub use path::{Path, Results, find_on_object_or_reference};
pub use reference::ReferenceObject;
pub use rules::{Rule, RuleType, parse_rules};
pub use specialized::{Range, RuleApplier};
pub use variants::{IntOrPath, StringOrPath};
