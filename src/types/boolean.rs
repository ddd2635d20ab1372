use super::{AttributeSpec, TypeHandler};
use crate::core::value::parse_number;
use crate::core::{Document, ValidationError, Value};
use std::collections::HashSet;

pub const DEFAULT_TRUTHY: &[&str] = &[
    "y", "yes", "j", "ja", "on", "hi", "high", "true", "t", "set", "x",
];

pub const DEFAULT_FALSY: &[&str] = &[
    "n", "no", "nein", "off", "lo", "low", "false", "f", "clr", "clear", "-",
];

/// Booleans, stored as `1`/`0`.
///
/// Stored strings are read through two word lists compared case-insensitively.
/// Empty and whitespace-only strings always read as false.
#[derive(Debug, Clone)]
pub struct BooleanType {
    truthy: HashSet<String>,
    falsy: HashSet<String>,
}

impl BooleanType {
    pub fn with_vocabulary<T, F>(truthy: T, falsy: F) -> Self
    where
        T: IntoIterator,
        T::Item: Into<String>,
        F: IntoIterator,
        F::Item: Into<String>,
    {
        Self {
            truthy: truthy.into_iter().map(|w| w.into().to_lowercase()).collect(),
            falsy: falsy.into_iter().map(|w| w.into().to_lowercase()).collect(),
        }
    }

    fn read_word(&self, word: &str) -> bool {
        let normalized = word.trim().to_lowercase();
        if normalized.is_empty() || self.falsy.contains(&normalized) {
            return false;
        }
        if self.truthy.contains(&normalized) {
            return true;
        }
        match parse_number(&normalized) {
            Some(number) => number != 0.0 && !number.is_nan(),
            None => !word.is_empty(),
        }
    }
}

impl Default for BooleanType {
    fn default() -> Self {
        Self::with_vocabulary(DEFAULT_TRUTHY.iter().copied(), DEFAULT_FALSY.iter().copied())
    }
}

impl TypeHandler for BooleanType {
    fn name(&self) -> &'static str {
        "boolean"
    }

    fn aliases(&self) -> &'static [&'static str] {
        &["bool"]
    }

    fn coerce(&self, value: &Value, _spec: &AttributeSpec) -> Value {
        match value {
            Value::Null => Value::Null,
            other => Value::Boolean(other.is_truthy()),
        }
    }

    fn serialize(&self, value: &Value) -> Document {
        match value {
            Value::Null => Document::Null,
            other => Document::from(u8::from(other.is_truthy())),
        }
    }

    fn deserialize(&self, stored: &Document) -> Value {
        match stored {
            Document::Null => Value::Null,
            Document::String(word) => Value::Boolean(self.read_word(word)),
            other => Value::Boolean(Value::from_json(other).is_truthy()),
        }
    }

    fn is_valid(
        &self,
        name: &str,
        value: &Value,
        spec: &AttributeSpec,
        errors: &mut Vec<ValidationError>,
    ) {
        match value {
            Value::Null if spec.required => {
                errors.push(ValidationError::Required { field: name.to_string() })
            }
            Value::Null | Value::Boolean(_) => {}
            _ => errors.push(ValidationError::InvalidValue {
                field: name.to_string(),
                expected: "boolean",
            }),
        }
    }
}
