use super::spec::numeric_constraint;
use super::{AttributeSpec, CompareOp, TypeHandler, compare_ordered, round_half_up, snap_to_step};
use crate::core::{Document, ModelResult, ValidationError, Value};

/// Whole numbers. Inputs are rounded half up, then snapped to `step`.
#[derive(Debug, Clone, Copy, Default)]
pub struct IntegerType;

/// Floating point numbers with optional `step` snapping.
#[derive(Debug, Clone, Copy, Default)]
pub struct NumberType;

fn coerce_numeric(value: &Value, spec: &AttributeSpec, whole: bool) -> Value {
    let blank = match value {
        Value::Null => true,
        Value::Text(s) => s.trim().is_empty(),
        _ => false,
    };
    if blank {
        return if spec.required {
            Value::Float(f64::NAN)
        } else {
            Value::Null
        };
    }

    let mut number = value.to_number();
    if whole {
        number = round_half_up(number);
    }
    if let Some(step) = spec.step_number() {
        number = snap_to_step(number, step, spec.min_number().unwrap_or(0.0));
        if whole {
            number = round_half_up(number);
        }
    }

    if whole && number.is_finite() && number.abs() < i64::MAX as f64 {
        Value::Integer(number as i64)
    } else {
        Value::Float(number)
    }
}

fn check_numeric_definition(spec: &mut AttributeSpec) -> Vec<String> {
    let mut problems = Vec::new();

    for (label, bound) in [("min", &mut spec.min), ("max", &mut spec.max)] {
        let Some(raw) = bound.take() else {
            continue;
        };
        match numeric_constraint(&raw) {
            Some(number) => *bound = Some(Value::Float(number)),
            None => {
                problems.push(format!("{} must be numeric, got {}", label, raw));
                *bound = Some(raw);
            }
        }
    }
    if let (Some(min), Some(max)) = (spec.min_number(), spec.max_number()) {
        if min > max {
            std::mem::swap(&mut spec.min, &mut spec.max);
        }
    }

    if let Some(raw) = spec.step.take() {
        match numeric_constraint(&raw) {
            Some(step) if step.is_finite() && step > 0.0 => spec.step = Some(Value::Float(step)),
            _ => {
                problems.push(format!("step must be a positive number, got {}", raw));
                spec.step = Some(raw);
            }
        }
    }
    problems
}

fn check_numeric_value(
    type_name: &'static str,
    name: &str,
    value: &Value,
    spec: &AttributeSpec,
    errors: &mut Vec<ValidationError>,
) {
    let number = match value {
        Value::Null => {
            if spec.required {
                errors.push(ValidationError::Required { field: name.to_string() });
            }
            return;
        }
        Value::Integer(_) | Value::Float(_) => value.to_number(),
        _ => {
            errors.push(ValidationError::InvalidValue {
                field: name.to_string(),
                expected: type_name,
            });
            return;
        }
    };

    let min = spec.min_number();
    let max = spec.max_number();
    if number.is_nan() {
        if let Some(min) = min {
            errors.push(ValidationError::BelowMinimum {
                field: name.to_string(),
                min: min.to_string(),
            });
        }
        if let Some(max) = max {
            errors.push(ValidationError::AboveMaximum {
                field: name.to_string(),
                max: max.to_string(),
            });
        }
        if spec.required && min.is_none() && max.is_none() {
            errors.push(ValidationError::InvalidValue {
                field: name.to_string(),
                expected: type_name,
            });
        }
        return;
    }

    if let Some(min) = min.filter(|min| number < *min) {
        errors.push(ValidationError::BelowMinimum {
            field: name.to_string(),
            min: min.to_string(),
        });
    }
    if let Some(max) = max.filter(|max| number > *max) {
        errors.push(ValidationError::AboveMaximum {
            field: name.to_string(),
            max: max.to_string(),
        });
    }
}

fn serialize_numeric(value: &Value) -> Document {
    match value {
        Value::Integer(i) => Document::from(*i),
        Value::Float(f) => serde_json::Number::from_f64(*f)
            .map(Document::Number)
            .unwrap_or(Document::Null),
        Value::Null => Document::Null,
        other => serialize_numeric(&Value::Float(other.to_number())),
    }
}

impl TypeHandler for IntegerType {
    fn name(&self) -> &'static str {
        "integer"
    }

    fn aliases(&self) -> &'static [&'static str] {
        &["int"]
    }

    fn check_definition(&self, spec: &mut AttributeSpec) -> Vec<String> {
        check_numeric_definition(spec)
    }

    fn coerce(&self, value: &Value, spec: &AttributeSpec) -> Value {
        coerce_numeric(value, spec, true)
    }

    fn serialize(&self, value: &Value) -> Document {
        serialize_numeric(value)
    }

    fn is_valid(
        &self,
        name: &str,
        value: &Value,
        spec: &AttributeSpec,
        errors: &mut Vec<ValidationError>,
    ) {
        check_numeric_value(self.name(), name, value, spec, errors);
    }

    fn compare(&self, value: &Value, reference: &Value, op: CompareOp) -> ModelResult<bool> {
        compare_ordered(self.name(), value, reference, op)
    }
}

impl TypeHandler for NumberType {
    fn name(&self) -> &'static str {
        "number"
    }

    fn aliases(&self) -> &'static [&'static str] {
        &["float", "double"]
    }

    fn check_definition(&self, spec: &mut AttributeSpec) -> Vec<String> {
        check_numeric_definition(spec)
    }

    fn coerce(&self, value: &Value, spec: &AttributeSpec) -> Value {
        coerce_numeric(value, spec, false)
    }

    fn serialize(&self, value: &Value) -> Document {
        serialize_numeric(value)
    }

    fn is_valid(
        &self,
        name: &str,
        value: &Value,
        spec: &AttributeSpec,
        errors: &mut Vec<ValidationError>,
    ) {
        check_numeric_value(self.name(), name, value, spec, errors);
    }

    fn compare(&self, value: &Value, reference: &Value, op: CompareOp) -> ModelResult<bool> {
        compare_ordered(self.name(), value, reference, op)
    }
}
