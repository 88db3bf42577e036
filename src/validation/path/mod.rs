//! Path expressions addressing values inside a VirtualMachine.
//!
//! A rule path looks like `jsonpath::.spec.domain.cpu.cores`. The prefix is
//! mandatory and an optional leading `$` is ignored. The expression is always
//! resolved relative to `.spec.template` of the VM, so the example above
//! reads `.spec.template.spec.domain.cpu.cores`.
//!
//! Resolution follows the Kubernetes JSONPath evaluator: a field that no
//! input object carries, an out-of-bounds index, or indexing something that
//! is not an array makes the whole lookup fail with [`Error::InvalidPath`].
//! A lookup that succeeds may still match nothing, e.g. `[*]` on an empty
//! list.

mod parser;

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use super::error::{Error, Result};
use super::quantity::parse_quantity_i64;
use parser::{Filter, Operator, Segment};

/// Prefix marking a string as a path expression
pub const JSONPATH_PREFIX: &str = "jsonpath::";

/// Every rule path is rooted here
const TEMPLATE_ROOT: &str = ".spec.template";

/// A compiled path expression
#[derive(Clone)]
pub struct Path {
    expr: String,
    segments: Vec<Segment>,
}

impl Path {
    /// Compile a prefixed expression.
    pub fn compile(expr: &str) -> Result<Self> {
        let Some(stripped) = expr.trim().strip_prefix(JSONPATH_PREFIX) else {
            return Err(Error::InvalidPath);
        };
        let stripped = stripped.strip_prefix('$').unwrap_or(stripped);

        let rooted = format!("{TEMPLATE_ROOT}{stripped}");
        let segments = parser::parse(&rooted).map_err(|reason| Error::MalformedPath {
            expr: expr.to_string(),
            reason,
        })?;

        Ok(Self {
            expr: stripped.to_string(),
            segments,
        })
    }

    /// The user-facing expression, without prefix and root.
    pub fn expr(&self) -> &str {
        &self.expr
    }

    /// Resolve the path against `obj`.
    pub fn find<'a>(&self, obj: &'a Value) -> Result<Results<'a>> {
        resolve(&self.segments, vec![obj])
            .map(Results)
            .ok_or(Error::InvalidPath)
    }
}

impl PartialEq for Path {
    fn eq(&self, other: &Self) -> bool {
        self.expr == other.expr
    }
}

impl fmt::Debug for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Path({JSONPATH_PREFIX}{})", self.expr)
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.expr)
    }
}

impl<'de> Deserialize<'de> for Path {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let expr = String::deserialize(deserializer)?;
        Path::compile(&expr).map_err(serde::de::Error::custom)
    }
}

impl Serialize for Path {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&format!("{JSONPATH_PREFIX}{}", self.expr))
    }
}

/// Resolve the path on `obj`, falling back to `reference` when the path
/// does not exist on `obj`.
pub fn find_on_object_or_reference<'a>(
    path: &Path,
    obj: &'a Value,
    reference: &'a Value,
) -> Result<Results<'a>> {
    match path.find(obj) {
        Err(e) if e.is_invalid_path() => path.find(reference),
        other => other,
    }
}

/// Values matched by a path, in resolution order
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Results<'a>(Vec<&'a Value>);

impl<'a> Results<'a> {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn values(&self) -> &[&'a Value] {
        &self.0
    }

    /// Convert every match to an integer.
    ///
    /// Integer numbers of any width that fit `i64` are taken as is, floats
    /// are rounded half away from zero and quantity strings are converted
    /// when they denote an exact integer.
    pub fn as_int64(&self) -> Result<Vec<i64>> {
        self.0.iter().copied().map(value_as_int64).collect()
    }

    /// Convert every match to a string; only JSON strings qualify.
    pub fn as_string(&self) -> Result<Vec<String>> {
        self.0
            .iter()
            .map(|value| match value {
                Value::String(s) => Ok(s.clone()),
                other => Err(Error::MismatchingType {
                    found: type_name(other).to_string(),
                    expected: "string",
                }),
            })
            .collect()
    }
}

fn value_as_int64(value: &Value) -> Result<i64> {
    let mismatch = || Error::MismatchingType {
        found: type_name(value).to_string(),
        expected: "int or resource.Quantity",
    };
    match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(i)
            } else if let Some(u) = n.as_u64() {
                i64::try_from(u).map_err(|_| mismatch())
            } else {
                match n.as_f64() {
                    Some(f) if f.is_finite() => Ok(f.round() as i64),
                    _ => Err(mismatch()),
                }
            }
        }
        Value::String(s) => parse_quantity_i64(s).ok_or_else(mismatch),
        _ => Err(mismatch()),
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Walk `segments` starting from `input`. `None` means resolution failed.
fn resolve<'a>(segments: &[Segment], mut input: Vec<&'a Value>) -> Option<Vec<&'a Value>> {
    for segment in segments {
        input = match segment {
            Segment::Recursive => {
                let mut descendants = Vec::new();
                for &value in &input {
                    collect_descendants(value, &mut descendants);
                }
                descendants
            }
            other => step(other, &input)?,
        };
    }
    Some(input)
}

fn step<'a>(segment: &Segment, input: &[&'a Value]) -> Option<Vec<&'a Value>> {
    let mut output = Vec::new();
    match segment {
        Segment::Field(name) => {
            if input.is_empty() {
                return Some(output);
            }
            output.extend(
                input
                    .iter()
                    .copied()
                    .filter_map(|value| value.as_object().and_then(|map| map.get(name))),
            );
            if output.is_empty() {
                return None;
            }
        }
        Segment::Wildcard => {
            for &value in input {
                match value {
                    Value::Object(map) => output.extend(map.values()),
                    Value::Array(items) => output.extend(items.iter()),
                    _ => {}
                }
            }
        }
        Segment::AllElements => {
            for &value in input {
                output.extend(elements(value)?.iter());
            }
        }
        Segment::Index(index) => {
            for &value in input {
                let items = elements(value)?;
                let position = normalize_index(*index, items.len());
                output.push(items.get(usize::try_from(position).ok()?)?);
            }
        }
        Segment::Slice { start, end, step } => {
            for &value in input {
                output.extend(slice(elements(value)?, *start, *end, *step)?);
            }
        }
        Segment::Filter(filter) => {
            for &value in input {
                output.extend(
                    elements(value)?
                        .iter()
                        .filter(|item| filter_matches(filter, item)),
                );
            }
        }
        Segment::Recursive => output.extend(input.iter().copied()),
    }
    Some(output)
}

fn elements(value: &Value) -> Option<&[Value]> {
    value.as_array().map(Vec::as_slice)
}

fn normalize_index(index: i64, len: usize) -> i64 {
    let len = i64::try_from(len).unwrap_or(i64::MAX);
    if index < 0 { index + len } else { index }
}

fn slice<'a>(
    items: &'a [Value],
    start: Option<i64>,
    end: Option<i64>,
    step: Option<i64>,
) -> Option<Vec<&'a Value>> {
    let len = i64::try_from(items.len()).ok()?;
    let start = start.map_or(0, |s| normalize_index(s, items.len()));
    let end = end.map_or(len, |e| normalize_index(e, items.len()));
    if start == end {
        return Some(Vec::new());
    }
    if start < 0 || start >= len || end < 0 || end > len || start > end {
        return None;
    }
    let step = usize::try_from(step.unwrap_or(1)).ok()?;
    let start = usize::try_from(start).ok()?;
    let end = usize::try_from(end).ok()?;
    Some(items.get(start..end)?.iter().step_by(step).collect())
}

fn collect_descendants<'a>(value: &'a Value, out: &mut Vec<&'a Value>) {
    out.push(value);
    match value {
        Value::Object(map) => map.values().for_each(|v| collect_descendants(v, out)),
        Value::Array(items) => items.iter().for_each(|v| collect_descendants(v, out)),
        _ => {}
    }
}

fn filter_matches(filter: &Filter, item: &Value) -> bool {
    let Some(lefts) = resolve(&filter.left, vec![item]) else {
        return false;
    };
    match &filter.comparison {
        None => !lefts.is_empty(),
        Some((operator, literal)) => lefts
            .iter()
            .any(|left| compare(left, *operator, literal)),
    }
}

fn compare(left: &Value, operator: Operator, right: &Value) -> bool {
    let ordering = match (left, right) {
        (Value::Number(a), Value::Number(b)) => a
            .as_f64()
            .zip(b.as_f64())
            .and_then(|(a, b)| a.partial_cmp(&b)),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        _ => None,
    };
    match (operator, ordering) {
        (Operator::Eq, Some(o)) => o == Ordering::Equal,
        (Operator::Ne, Some(o)) => o != Ordering::Equal,
        (Operator::Ne, None) => true,
        (Operator::Lt, Some(o)) => o == Ordering::Less,
        (Operator::Le, Some(o)) => o != Ordering::Greater,
        (Operator::Gt, Some(o)) => o == Ordering::Greater,
        (Operator::Ge, Some(o)) => o != Ordering::Less,
        (_, None) => false,
    }
}
