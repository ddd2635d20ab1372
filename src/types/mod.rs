//! Value types an attribute can be declared with.
//!
//! Every type is a [`TypeHandler`] registered in a [`TypeRegistry`] under its
//! canonical name and aliases. The schema compiler resolves each attribute's
//! handler once; instances only ever go through the resolved handlers.

pub mod boolean;
pub mod date;
pub mod numeric;
pub mod spec;
pub mod string;

use crate::core::{Document, ModelError, ModelResult, ValidationError, Value};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

pub use boolean::BooleanType;
pub use date::DateType;
pub use numeric::{IntegerType, NumberType};
pub use spec::{AttributeSpec, DEFAULT_TYPE, Pattern};
pub use string::StringType;

/// Comparison operators understood by [`TypeHandler::compare`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
    Eq,
    NotEq,
    Null,
    NotNull,
    Not,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl CompareOp {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Eq => "eq",
            Self::NotEq => "noteq",
            Self::Null => "null",
            Self::NotNull => "notnull",
            Self::Not => "not",
            Self::Gt => "gt",
            Self::Gte => "gte",
            Self::Lt => "lt",
            Self::Lte => "lte",
        }
    }

    pub fn is_ordered(&self) -> bool {
        matches!(self, Self::Gt | Self::Gte | Self::Lt | Self::Lte)
    }
}

impl FromStr for CompareOp {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "eq" => Ok(Self::Eq),
            "noteq" => Ok(Self::NotEq),
            "null" => Ok(Self::Null),
            "notnull" => Ok(Self::NotNull),
            "not" => Ok(Self::Not),
            "gt" => Ok(Self::Gt),
            "gte" => Ok(Self::Gte),
            "lt" => Ok(Self::Lt),
            "lte" => Ok(Self::Lte),
            _ => Err(ModelError::UnsupportedComparison {
                op: s.to_string(),
                type_name: "any".to_string(),
            }),
        }
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coercion, validation, (de)serialization and comparison for one value type.
pub trait TypeHandler: Send + Sync {
    /// Canonical type name.
    fn name(&self) -> &'static str;

    fn aliases(&self) -> &'static [&'static str] {
        &[]
    }

    /// Validates and normalizes an attribute declaration, returning problems found.
    fn check_definition(&self, _spec: &mut AttributeSpec) -> Vec<String> {
        Vec::new()
    }

    /// Normalizes any input into this type's in-memory form. Must be idempotent.
    fn coerce(&self, value: &Value, spec: &AttributeSpec) -> Value;

    fn serialize(&self, value: &Value) -> Document;

    fn deserialize(&self, stored: &Document) -> Value {
        Value::from_json(stored)
    }

    /// Appends every constraint violation of `value` to `errors`.
    fn is_valid(
        &self,
        name: &str,
        value: &Value,
        spec: &AttributeSpec,
        errors: &mut Vec<ValidationError>,
    );

    fn compare(&self, value: &Value, reference: &Value, op: CompareOp) -> ModelResult<bool> {
        compare_unordered(self.name(), value, reference, op)
    }
}

/// `eq`, `noteq`, `null`, `notnull` and `not`; ordered operators are rejected.
pub fn compare_unordered(
    type_name: &str,
    value: &Value,
    reference: &Value,
    op: CompareOp,
) -> ModelResult<bool> {
    match op {
        CompareOp::Eq => Ok(value == reference),
        CompareOp::NotEq => Ok(value != reference),
        CompareOp::Null => Ok(value.is_null()),
        CompareOp::NotNull => Ok(!value.is_null()),
        CompareOp::Not => Ok(!value.is_truthy()),
        _ => Err(ModelError::UnsupportedComparison {
            op: op.to_string(),
            type_name: type_name.to_string(),
        }),
    }
}

/// Adds `gt`, `gte`, `lt` and `lte` on top of [`compare_unordered`].
/// Values without a mutual ordering never match.
pub fn compare_ordered(
    type_name: &str,
    value: &Value,
    reference: &Value,
    op: CompareOp,
) -> ModelResult<bool> {
    if !op.is_ordered() {
        return compare_unordered(type_name, value, reference, op);
    }
    let Some(ordering) = value.partial_order(reference) else {
        return Ok(false);
    };
    Ok(match op {
        CompareOp::Gt => ordering == Ordering::Greater,
        CompareOp::Gte => ordering != Ordering::Less,
        CompareOp::Lt => ordering == Ordering::Less,
        _ => ordering != Ordering::Greater,
    })
}

/// Round half up, the way a dynamic language's `Math.round` does.
pub(crate) fn round_half_up(value: f64) -> f64 {
    (value + 0.5).floor()
}

/// Snaps `value` onto the grid `min + k * step`.
pub(crate) fn snap_to_step(value: f64, step: f64, min: f64) -> f64 {
    round_half_up((value - min) / step) * step + min
}

/// Name (and alias) to handler lookup, case-insensitive.
pub struct TypeRegistry {
    handlers: Vec<Arc<dyn TypeHandler>>,
    lookup: HashMap<String, usize>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self {
            handlers: Vec::new(),
            lookup: HashMap::new(),
        }
    }

    /// Registers a handler. A later handler claiming the same name or alias wins.
    pub fn register(&mut self, handler: Arc<dyn TypeHandler>) {
        let index = self.handlers.len();
        log::debug!("registered type handler: {}", handler.name());
        for name in std::iter::once(handler.name()).chain(handler.aliases().iter().copied()) {
            self.lookup.insert(name.to_ascii_lowercase(), index);
        }
        self.handlers.push(handler);
    }

    /// Registry with string, integer, number, boolean and date.
    pub fn with_default_types() -> Self {
        let mut registry = Self::new();

        registry.register(Arc::new(StringType));
        registry.register(Arc::new(IntegerType));
        registry.register(Arc::new(NumberType));
        registry.register(Arc::new(BooleanType::default()));
        registry.register(Arc::new(DateType));

        registry
    }

    pub fn resolve(&self, name: &str) -> Option<Arc<dyn TypeHandler>> {
        self.lookup
            .get(&name.trim().to_ascii_lowercase())
            .map(|index| Arc::clone(&self.handlers[*index]))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.lookup.contains_key(&name.trim().to_ascii_lowercase())
    }

    /// Canonical names of the handlers currently reachable by name.
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self
            .handlers
            .iter()
            .enumerate()
            .filter(|(index, handler)| {
                self.lookup.get(handler.name()) == Some(index)
            })
            .map(|(_, handler)| handler.name())
            .collect();
        names.sort_unstable();
        names
    }
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::with_default_types()
    }
}
