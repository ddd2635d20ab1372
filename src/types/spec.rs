use crate::core::Value;
use crate::core::value::parse_number;
use chrono::{DateTime, Utc};
use regex::Regex;
use std::collections::BTreeMap;

/// Type assumed for attributes declared without one.
pub const DEFAULT_TYPE: &str = "string";

/// A string constraint, either as written or already compiled.
#[derive(Debug, Clone)]
pub enum Pattern {
    Source(String),
    Compiled(Regex),
}

impl Pattern {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Source(source) => source,
            Self::Compiled(regex) => regex.as_str(),
        }
    }

    pub fn regex(&self) -> Option<&Regex> {
        match self {
            Self::Source(_) => None,
            Self::Compiled(regex) => Some(regex),
        }
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

/// Declaration of one basic attribute.
///
/// Constraints are interpreted by the attribute's type handler; a handler's
/// `check_definition` normalizes them once when the model is compiled.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeSpec {
    pub type_name: Option<String>,
    pub required: bool,
    pub default: Option<Value>,
    pub min: Option<Value>,
    pub max: Option<Value>,
    pub step: Option<Value>,
    pub length: Option<usize>,
    pub pattern: Option<Pattern>,
    pub trim: bool,
    pub reduce_space: bool,
    pub upper_case: bool,
    pub lower_case: bool,
    pub locale: Option<String>,
    pub time: bool,
    pub extra: BTreeMap<String, Value>,
}

impl Default for AttributeSpec {
    fn default() -> Self {
        Self {
            type_name: None,
            required: false,
            default: None,
            min: None,
            max: None,
            step: None,
            length: None,
            pattern: None,
            trim: false,
            reduce_space: false,
            upper_case: false,
            lower_case: false,
            locale: None,
            time: true,
            extra: BTreeMap::new(),
        }
    }
}

impl AttributeSpec {
    /// An attribute without a declared type.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn of(type_name: impl Into<String>) -> Self {
        Self {
            type_name: Some(type_name.into()),
            ..Self::default()
        }
    }

    pub fn type_name(&self) -> &str {
        self.type_name.as_deref().unwrap_or(DEFAULT_TYPE)
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn default_value(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn min(mut self, value: impl Into<Value>) -> Self {
        self.min = Some(value.into());
        self
    }

    pub fn max(mut self, value: impl Into<Value>) -> Self {
        self.max = Some(value.into());
        self
    }

    pub fn step(mut self, value: impl Into<Value>) -> Self {
        self.step = Some(value.into());
        self
    }

    pub fn length(mut self, length: usize) -> Self {
        self.length = Some(length);
        self
    }

    pub fn pattern(mut self, source: impl Into<String>) -> Self {
        self.pattern = Some(Pattern::Source(source.into()));
        self
    }

    pub fn regex(mut self, regex: Regex) -> Self {
        self.pattern = Some(Pattern::Compiled(regex));
        self
    }

    pub fn trim(mut self) -> Self {
        self.trim = true;
        self
    }

    pub fn reduce_space(mut self) -> Self {
        self.reduce_space = true;
        self
    }

    pub fn upper_case(mut self) -> Self {
        self.upper_case = true;
        self
    }

    pub fn lower_case(mut self) -> Self {
        self.lower_case = true;
        self
    }

    pub fn locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = Some(locale.into());
        self
    }

    pub fn without_time(mut self) -> Self {
        self.time = false;
        self
    }

    pub fn min_number(&self) -> Option<f64> {
        self.min.as_ref().and_then(numeric_constraint)
    }

    pub fn max_number(&self) -> Option<f64> {
        self.max.as_ref().and_then(numeric_constraint)
    }

    pub fn step_number(&self) -> Option<f64> {
        self.step.as_ref().and_then(numeric_constraint)
    }

    pub fn min_date(&self) -> Option<DateTime<Utc>> {
        self.min.as_ref().and_then(Value::as_date).copied()
    }

    pub fn max_date(&self) -> Option<DateTime<Utc>> {
        self.max.as_ref().and_then(Value::as_date).copied()
    }

    /// Reads a declaration such as `{"type": "integer", "min": 0}`.
    ///
    /// Both `camelCase` and `snake_case` option names are accepted. Options
    /// nobody recognizes are kept in `extra` for custom handlers.
    pub fn from_json(json: &serde_json::Value) -> Result<Self, String> {
        let Some(object) = json.as_object() else {
            return Err(format!("attribute declaration must be an object, got {}", json));
        };

        let mut spec = Self::default();
        for (key, value) in object {
            match key.as_str() {
                "type" => spec.type_name = Some(expect_str(key, value)?.to_string()),
                "required" => spec.required = expect_bool(key, value)?,
                "default" => spec.default = Some(Value::from_json(value)),
                "min" => spec.min = optional(value),
                "max" => spec.max = optional(value),
                "step" => spec.step = optional(value),
                "length" => {
                    let Some(length) = value.as_u64() else {
                        return Err(format!("'length' must be a non-negative integer, got {}", value));
                    };
                    spec.length = Some(length as usize);
                }
                "pattern" => spec.pattern = Some(Pattern::Source(expect_str(key, value)?.to_string())),
                "trim" => spec.trim = expect_bool(key, value)?,
                "reduceSpace" | "reduce_space" => spec.reduce_space = expect_bool(key, value)?,
                "upperCase" | "upper_case" => spec.upper_case = expect_bool(key, value)?,
                "lowerCase" | "lower_case" => spec.lower_case = expect_bool(key, value)?,
                "locale" => spec.locale = Some(expect_str(key, value)?.to_string()),
                "time" => spec.time = expect_bool(key, value)?,
                _ => {
                    spec.extra.insert(key.clone(), Value::from_json(value));
                }
            }
        }
        Ok(spec)
    }
}

/// Numeric reading of a bound: numbers and numeric strings only.
pub(crate) fn numeric_constraint(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Integer(_) | Value::Float(_) => value.to_number(),
        Value::Text(s) => parse_number(s.trim())?,
        _ => return None,
    };
    (!number.is_nan()).then_some(number)
}

fn optional(value: &serde_json::Value) -> Option<Value> {
    (!value.is_null()).then(|| Value::from_json(value))
}

fn expect_str<'a>(key: &str, value: &'a serde_json::Value) -> Result<&'a str, String> {
    value
        .as_str()
        .ok_or_else(|| format!("'{}' must be a string, got {}", key, value))
}

fn expect_bool(key: &str, value: &serde_json::Value) -> Result<bool, String> {
    value
        .as_bool()
        .ok_or_else(|| format!("'{}' must be a boolean, got {}", key, value))
}
