//! Rule parameters that are either a literal or a path into the VM.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

use super::error::{Error, Result};
use super::path::{JSONPATH_PREFIX, Path, find_on_object_or_reference};

/// An integer literal, or a path resolving to one integer
#[derive(Clone, Debug, PartialEq)]
pub enum IntOrPath {
    Int(i64),
    Path(Path),
}

impl IntOrPath {
    pub fn is_literal(&self) -> bool {
        matches!(self, IntOrPath::Int(_))
    }

    /// Produce the integer, reading it from the VM (or the reference
    /// object) when this is a path.
    pub fn decode(&self, obj: &Value, reference: &Value) -> Result<i64> {
        match self {
            IntOrPath::Int(value) => Ok(*value),
            IntOrPath::Path(path) => {
                let results = find_on_object_or_reference(path, obj, reference)?;
                match results.as_int64()?.as_slice() {
                    [value] => Ok(*value),
                    values => Err(Error::ExpectedSingleValue(values.len())),
                }
            }
        }
    }
}

impl<'de> Deserialize<'de> for IntOrPath {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().filter(|f| f.is_finite()).map(|f| f.round() as i64))
                .map(IntOrPath::Int)
                .ok_or_else(|| serde::de::Error::custom(format!("integer out of range: {n}"))),
            Value::String(s) => Path::compile(&s)
                .map(IntOrPath::Path)
                .map_err(serde::de::Error::custom),
            other => Err(serde::de::Error::custom(format!(
                "expected integer or path, found {other}"
            ))),
        }
    }
}

impl Serialize for IntOrPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            IntOrPath::Int(value) => serializer.serialize_i64(*value),
            IntOrPath::Path(path) => path.serialize(serializer),
        }
    }
}

/// A string literal, or a path resolving to one string
#[derive(Clone, Debug, PartialEq)]
pub enum StringOrPath {
    String(String),
    Path(Path),
}

impl StringOrPath {
    pub fn is_literal(&self) -> bool {
        matches!(self, StringOrPath::String(_))
    }

    pub fn decode(&self, obj: &Value, reference: &Value) -> Result<String> {
        match self {
            StringOrPath::String(value) => Ok(value.clone()),
            StringOrPath::Path(path) => {
                let results = find_on_object_or_reference(path, obj, reference)?;
                let mut values = results.as_string()?;
                match values.len() {
                    1 => Ok(values.remove(0)),
                    n => Err(Error::ExpectedSingleValue(n)),
                }
            }
        }
    }
}

impl<'de> Deserialize<'de> for StringOrPath {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        if value.trim_start().starts_with(JSONPATH_PREFIX) {
            Path::compile(&value)
                .map(StringOrPath::Path)
                .map_err(serde::de::Error::custom)
        } else {
            Ok(StringOrPath::String(value))
        }
    }
}

impl Serialize for StringOrPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        match self {
            StringOrPath::String(value) => serializer.serialize_str(value),
            StringOrPath::Path(path) => path.serialize(serializer),
        }
    }
}
