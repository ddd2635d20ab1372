use super::{AttributeSpec, CompareOp, TypeHandler, compare_ordered, snap_to_step};
use crate::core::value::date_from_millis;
use crate::core::{Document, ModelResult, ValidationError, Value};
use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use regex::Regex;

/// Storage format for dates.
pub const DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

lazy_static::lazy_static! {
    static ref TIMESTAMP: Regex = Regex::new(r"^-?\d+$").expect("valid timestamp pattern");
}

/// Instants in UTC. Strings without an offset are read as UTC.
#[derive(Debug, Clone, Copy, Default)]
pub struct DateType;

/// Reads an instant from a date, a millisecond timestamp or a date string.
pub fn parse_date(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::Date(date) => Some(*date),
        Value::Integer(millis) => date_from_millis(*millis),
        Value::Float(millis) if millis.is_finite() => date_from_millis(millis.trunc() as i64),
        Value::Text(text) => parse_date_text(text.trim()),
        _ => None,
    }
}

fn parse_date_text(text: &str) -> Option<DateTime<Utc>> {
    if text.is_empty() {
        return None;
    }
    if TIMESTAMP.is_match(text) {
        return text.parse::<i64>().ok().and_then(date_from_millis);
    }
    if let Ok(date) = DateTime::parse_from_rfc3339(text) {
        return Some(date.with_timezone(&Utc));
    }
    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Some(naive.and_utc());
        }
    }
    if let Ok(day) = NaiveDate::parse_from_str(text, "%Y-%m-%d") {
        return day.and_hms_opt(0, 0, 0).map(|naive| naive.and_utc());
    }
    DateTime::parse_from_rfc2822(text)
        .ok()
        .map(|date| date.with_timezone(&Utc))
}

fn start_of_day(date: DateTime<Utc>) -> DateTime<Utc> {
    date.date_naive()
        .and_hms_opt(0, 0, 0)
        .map(|naive| naive.and_utc())
        .unwrap_or(date)
}

fn format_date(date: &DateTime<Utc>) -> String {
    date.format(DATE_FORMAT).to_string()
}

impl TypeHandler for DateType {
    fn name(&self) -> &'static str {
        "date"
    }

    fn aliases(&self) -> &'static [&'static str] {
        &["datetime", "timestamp"]
    }

    fn check_definition(&self, spec: &mut AttributeSpec) -> Vec<String> {
        let mut problems = Vec::new();

        for (label, bound) in [("min", &mut spec.min), ("max", &mut spec.max)] {
            let Some(raw) = bound.take() else {
                continue;
            };
            match parse_date(&raw) {
                Some(date) => *bound = Some(Value::Date(date)),
                None => {
                    problems.push(format!("{} is not a valid date: {}", label, raw));
                    *bound = Some(raw);
                }
            }
        }
        if let (Some(min), Some(max)) = (spec.min_date(), spec.max_date()) {
            if min > max {
                std::mem::swap(&mut spec.min, &mut spec.max);
            }
        }

        if let Some(raw) = spec.step.take() {
            match super::spec::numeric_constraint(&raw) {
                Some(step) if step.is_finite() && step > 0.0 => spec.step = Some(Value::Float(step)),
                _ => {
                    problems.push(format!("step must be a positive number of milliseconds, got {}", raw));
                    spec.step = Some(raw);
                }
            }
        }
        problems
    }

    fn coerce(&self, value: &Value, spec: &AttributeSpec) -> Value {
        if value.is_null() {
            return Value::Null;
        }
        let Some(mut date) = parse_date(value) else {
            return value.clone();
        };

        if !spec.time {
            date = start_of_day(date);
        }
        if let Some(step) = spec.step_number() {
            let min = spec.min_date().map_or(0.0, |min| min.timestamp_millis() as f64);
            let snapped = snap_to_step(date.timestamp_millis() as f64, step, min);
            if let Some(snapped) = date_from_millis(snapped as i64) {
                date = snapped;
            }
        }
        Value::Date(date)
    }

    fn serialize(&self, value: &Value) -> Document {
        match value {
            Value::Date(date) => Document::String(format_date(date)),
            _ => Document::Null,
        }
    }

    fn is_valid(
        &self,
        name: &str,
        value: &Value,
        spec: &AttributeSpec,
        errors: &mut Vec<ValidationError>,
    ) {
        let date = match value {
            Value::Null => {
                if spec.required {
                    errors.push(ValidationError::Required { field: name.to_string() });
                }
                return;
            }
            Value::Date(date) => date,
            _ => {
                errors.push(ValidationError::InvalidValue {
                    field: name.to_string(),
                    expected: "date",
                });
                return;
            }
        };

        if let Some(min) = spec.min_date().filter(|min| date < min) {
            errors.push(ValidationError::BelowMinimum {
                field: name.to_string(),
                min: format_date(&min),
            });
        }
        if let Some(max) = spec.max_date().filter(|max| date > max) {
            errors.push(ValidationError::AboveMaximum {
                field: name.to_string(),
                max: format_date(&max),
            });
        }
    }

    fn compare(&self, value: &Value, reference: &Value, op: CompareOp) -> ModelResult<bool> {
        compare_ordered(self.name(), value, reference, op)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    #[test]
    fn test_parses_common_inputs() {
        let expected = Value::Date(utc(2024, 3, 9, 14, 30, 0));
        let spec = AttributeSpec::of("date");
        assert_eq!(DateType.coerce(&"2024-03-09T14:30:00Z".into(), &spec), expected);
        assert_eq!(DateType.coerce(&"2024-03-09T16:30:00+02:00".into(), &spec), expected);
        assert_eq!(DateType.coerce(&"2024-03-09 14:30".into(), &spec), expected);
        assert_eq!(DateType.coerce(&"Sat, 9 Mar 2024 14:30:00 +0000".into(), &spec), expected);
        assert_eq!(DateType.coerce(&Value::Integer(1_709_994_600_000), &spec), expected);
        assert_eq!(DateType.coerce(&"1709994600000".into(), &spec), expected);
        assert_eq!(
            DateType.coerce(&"2024-03-09".into(), &spec),
            Value::Date(utc(2024, 3, 9, 0, 0, 0))
        );
    }

    #[test]
    fn test_invalid_input_is_kept_and_rejected() {
        let spec = AttributeSpec::of("date");
        let value = DateType.coerce(&"someday".into(), &spec);
        assert_eq!(value, Value::Text("someday".into()));
        assert_eq!(DateType.serialize(&value), Document::Null);

        let mut errors = Vec::new();
        DateType.is_valid("born", &value, &spec, &mut errors);
        assert!(matches!(errors[0], ValidationError::InvalidValue { expected: "date", .. }));
    }

    #[test]
    fn test_time_truncation_and_step() {
        let day_only = AttributeSpec::of("date").without_time();
        assert_eq!(
            DateType.coerce(&"2024-03-09T23:59:59Z".into(), &day_only),
            Value::Date(utc(2024, 3, 9, 0, 0, 0))
        );

        let mut quarter_hour = AttributeSpec::of("date").step(15 * 60 * 1000);
        assert!(DateType.check_definition(&mut quarter_hour).is_empty());
        let snapped = DateType.coerce(&"2024-03-09T10:08:00Z".into(), &quarter_hour);
        assert_eq!(snapped, Value::Date(utc(2024, 3, 9, 10, 15, 0)));
        assert_eq!(DateType.coerce(&snapped, &quarter_hour), snapped);
    }

    #[test]
    fn test_check_definition_normalizes_bounds() {
        let mut spec = AttributeSpec::of("date").min("2025-01-01").max("2020-01-01");
        assert!(DateType.check_definition(&mut spec).is_empty());
        assert_eq!(spec.min_date(), Some(utc(2020, 1, 1, 0, 0, 0)));
        assert_eq!(spec.max_date(), Some(utc(2025, 1, 1, 0, 0, 0)));

        let mut bad = AttributeSpec::of("date").min("tomorrow").step(-1);
        assert_eq!(DateType.check_definition(&mut bad).len(), 2);
    }

    #[test]
    fn test_serialize_round_trip_drops_milliseconds() {
        let spec = AttributeSpec::of("date");
        let value = DateType.coerce(&"2024-03-09T14:30:00.250Z".into(), &spec);
        let stored = DateType.serialize(&value);
        assert_eq!(stored, json!("2024-03-09T14:30:00Z"));
        assert_eq!(
            DateType.coerce(&DateType.deserialize(&stored), &spec),
            Value::Date(utc(2024, 3, 9, 14, 30, 0))
        );
    }
}
