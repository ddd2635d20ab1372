use super::{AttributeSpec, CompareOp, Pattern, TypeHandler, compare_ordered};
use crate::core::{Document, ModelResult, ValidationError, Value};
use regex::Regex;

lazy_static::lazy_static! {
    static ref WHITESPACE_RUN: Regex = Regex::new(r"\s+").expect("valid whitespace pattern");
}

#[derive(Debug, Clone, Copy, Default)]
pub struct StringType;

impl StringType {
    fn to_text(value: &Value) -> String {
        match value {
            Value::Text(s) => s.clone(),
            Value::Date(d) => d.format("%Y-%m-%dT%H:%M:%SZ").to_string(),
            other => other.to_string(),
        }
    }
}

/// Locales whose dotted and dotless `i` case-map differently.
fn is_turkic(locale: Option<&str>) -> bool {
    locale
        .map(|l| l.to_ascii_lowercase())
        .is_some_and(|l| l == "tr" || l == "az" || l.starts_with("tr-") || l.starts_with("az-"))
}

fn to_upper(text: &str, locale: Option<&str>) -> String {
    if is_turkic(locale) {
        text.replace('i', "İ").to_uppercase()
    } else {
        text.to_uppercase()
    }
}

fn to_lower(text: &str, locale: Option<&str>) -> String {
    if is_turkic(locale) {
        text.replace('I', "ı").replace('İ', "i").to_lowercase()
    } else {
        text.to_lowercase()
    }
}

impl TypeHandler for StringType {
    fn name(&self) -> &'static str {
        "string"
    }

    fn aliases(&self) -> &'static [&'static str] {
        &["text"]
    }

    fn check_definition(&self, spec: &mut AttributeSpec) -> Vec<String> {
        let mut problems = Vec::new();
        if spec.upper_case && spec.lower_case {
            problems.push("upperCase and lowerCase are mutually exclusive".to_string());
        }
        if let Some(Pattern::Source(source)) = spec.pattern.clone() {
            match Regex::new(&source) {
                Ok(regex) => spec.pattern = Some(Pattern::Compiled(regex)),
                Err(err) => problems.push(format!("invalid pattern /{}/: {}", source, err)),
            }
        }
        problems
    }

    fn coerce(&self, value: &Value, spec: &AttributeSpec) -> Value {
        if value.is_null() {
            return if spec.required {
                Value::Text(String::new())
            } else {
                Value::Null
            };
        }

        let mut text = Self::to_text(value);
        if spec.trim {
            text = text.trim().to_string();
        }
        if spec.reduce_space {
            text = WHITESPACE_RUN.replace_all(&text, " ").into_owned();
        }
        if spec.upper_case {
            text = to_upper(&text, spec.locale.as_deref());
        } else if spec.lower_case {
            text = to_lower(&text, spec.locale.as_deref());
        }
        Value::Text(text)
    }

    fn serialize(&self, value: &Value) -> Document {
        match value {
            Value::Null => Document::Null,
            other => Document::String(Self::to_text(other)),
        }
    }

    fn is_valid(
        &self,
        name: &str,
        value: &Value,
        spec: &AttributeSpec,
        errors: &mut Vec<ValidationError>,
    ) {
        let text = match value {
            Value::Null => {
                if spec.required {
                    errors.push(ValidationError::Required { field: name.to_string() });
                }
                return;
            }
            Value::Text(text) => text,
            _ => {
                errors.push(ValidationError::InvalidValue {
                    field: name.to_string(),
                    expected: "string",
                });
                return;
            }
        };

        if spec.required && text.is_empty() {
            errors.push(ValidationError::Required { field: name.to_string() });
        }
        if let Some(max) = spec.length {
            if text.chars().count() > max {
                errors.push(ValidationError::TooLong {
                    field: name.to_string(),
                    max,
                });
            }
        }
        if let Some(pattern) = &spec.pattern {
            let matches = match pattern.regex() {
                Some(regex) => regex.is_match(text),
                // Only reachable for specs that never went through check_definition.
                None => Regex::new(pattern.as_str()).is_ok_and(|regex| regex.is_match(text)),
            };
            if !matches {
                errors.push(ValidationError::PatternMismatch {
                    field: name.to_string(),
                    pattern: pattern.as_str().to_string(),
                });
            }
        }
    }

    fn compare(&self, value: &Value, reference: &Value, op: CompareOp) -> ModelResult<bool> {
        compare_ordered(self.name(), value, reference, op)
    }
}
