//! Change tracking over an instance's fields.
//!
//! [`TrackedFields`] owns a [`FieldBag`] together with the one
//! [`ChangeContext`] recording which dotted paths were written since the last
//! commit. All reads and writes go through a [`Monitor`], an explicit wrapper
//! that can descend into owned lists and objects. Every nested monitor borrows
//! the root's context, so there is exactly one change set per instance.

use crate::core::{ModelError, ModelResult, Record, Value};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

/// Virtual field name that reads back the change context. Never stored.
pub const CHANGES_FIELD: &str = "__changes__";

/// Dotted labels of every path written since the last commit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeContext {
    changed: BTreeSet<String>,
}

impl ChangeContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_dirty(&self) -> bool {
        !self.changed.is_empty()
    }

    pub fn contains(&self, label: &str) -> bool {
        self.changed.contains(label)
    }

    pub fn len(&self) -> usize {
        self.changed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changed.is_empty()
    }

    pub fn changed(&self) -> impl Iterator<Item = &str> {
        self.changed.iter().map(String::as_str)
    }

    pub fn labels(&self) -> Vec<String> {
        self.changed.iter().cloned().collect()
    }

    fn mark(&mut self, label: String) {
        self.changed.insert(label);
    }

    /// Forgets all recorded changes.
    pub fn commit(&mut self) {
        self.changed.clear();
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MonitorOptions {
    /// Descend into owned lists and objects, tracking their writes as `parent.child`.
    pub recursive: bool,
    /// Log a warning when a path that already has an unsaved change is written again.
    pub warn: bool,
    /// Only track names the bag owns (or that are new); writes shadowing an
    /// inherited value go untracked.
    pub just_owned: bool,
}

impl MonitorOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    pub fn warn(mut self, warn: bool) -> Self {
        self.warn = warn;
        self
    }

    pub fn just_owned(mut self, just_owned: bool) -> Self {
        self.just_owned = just_owned;
        self
    }
}

/// Owned fields layered over an optional shared, read-only layer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldBag {
    own: Record,
    inherited: Option<Arc<Record>>,
}

impl FieldBag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_record(own: Record) -> Self {
        Self {
            own,
            inherited: None,
        }
    }

    pub fn with_inherited(mut self, inherited: Arc<Record>) -> Self {
        self.inherited = Some(inherited);
        self
    }

    /// Owned value, falling back to the inherited layer.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.own
            .get(name)
            .or_else(|| self.inherited.as_ref().and_then(|layer| layer.get(name)))
    }

    pub fn owns(&self, name: &str) -> bool {
        self.own.contains_key(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn own_fields(&self) -> &Record {
        &self.own
    }

    pub fn inherited(&self) -> Option<&Arc<Record>> {
        self.inherited.as_ref()
    }

    fn insert(&mut self, name: &str, value: Value) {
        self.own.insert(name.to_string(), value);
    }
}

fn list_index(name: &str) -> Option<usize> {
    name.parse::<usize>().ok()
}

enum Target<'a> {
    Bag(&'a mut FieldBag),
    Object(&'a mut BTreeMap<String, Value>),
    List(&'a mut Vec<Value>),
}

impl<'a> Target<'a> {
    fn lookup(&self, name: &str) -> Option<&Value> {
        match self {
            Self::Bag(bag) => bag.get(name),
            Self::Object(map) => map.get(name),
            Self::List(items) => list_index(name).and_then(|index| items.get(index)),
        }
    }

    fn owns(&self, name: &str) -> bool {
        match self {
            Self::Bag(bag) => bag.owns(name),
            Self::Object(map) => map.contains_key(name),
            Self::List(items) => list_index(name).is_some_and(|index| index < items.len()),
        }
    }

    fn child_mut(&mut self, name: &str) -> Option<Target<'_>> {
        let value = match self {
            Self::Bag(bag) => bag.own.get_mut(name),
            Self::Object(map) => map.get_mut(name),
            Self::List(items) => match list_index(name) {
                Some(index) => items.get_mut(index),
                None => None,
            },
        }?;
        Target::container(value)
    }

    fn into_child(self, name: &str) -> Option<Target<'a>> {
        let value = match self {
            Self::Bag(bag) => bag.own.get_mut(name),
            Self::Object(map) => map.get_mut(name),
            Self::List(items) => match list_index(name) {
                Some(index) => items.get_mut(index),
                None => None,
            },
        }?;
        Target::container(value)
    }

    fn container(value: &'a mut Value) -> Option<Target<'a>> {
        match value {
            Value::Object(map) => Some(Target::Object(map)),
            Value::List(items) => Some(Target::List(items)),
            _ => None,
        }
    }

    fn assign(&mut self, name: &str, value: Value) -> ModelResult<()> {
        match self {
            Self::Bag(bag) => bag.insert(name, value),
            Self::Object(map) => {
                map.insert(name.to_string(), value);
            }
            Self::List(items) => {
                let index = list_index(name).ok_or_else(|| ModelError::InvalidIndex(name.to_string()))?;
                if index < items.len() {
                    items[index] = value;
                } else {
                    items.resize(index, Value::Null);
                    items.push(value);
                }
            }
        }
        Ok(())
    }
}

/// What a read through a [`Monitor`] produced.
pub enum Field<'a> {
    Value(&'a Value),
    Nested(Monitor<'a>),
    Context(&'a ChangeContext),
}

/// Read/write wrapper over a field bag, object or list.
pub struct Monitor<'a> {
    target: Target<'a>,
    context: &'a mut ChangeContext,
    options: MonitorOptions,
    prefix: String,
}

impl<'a> Monitor<'a> {
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn context(&self) -> &ChangeContext {
        &*self.context
    }

    pub fn options(&self) -> MonitorOptions {
        self.options
    }

    /// Raw value of a field. The reserved context name is never a value.
    pub fn get(&self, name: &str) -> Option<&Value> {
        if name == CHANGES_FIELD {
            return None;
        }
        self.target.lookup(name)
    }

    fn can_nest(&self, name: &str) -> bool {
        self.options.recursive
            && self.target.owns(name)
            && self.target.lookup(name).is_some_and(Value::is_container)
    }

    fn child_prefix(&self, name: &str) -> String {
        format!("{}{}.", self.prefix, name)
    }

    /// Reads a field, wrapping owned containers when the monitor is recursive.
    pub fn field(&mut self, name: &str) -> Option<Field<'_>> {
        if name == CHANGES_FIELD {
            return Some(Field::Context(&*self.context));
        }
        if self.can_nest(name) {
            let prefix = self.child_prefix(name);
            let target = self.target.child_mut(name)?;
            return Some(Field::Nested(Monitor {
                target,
                context: &mut *self.context,
                options: self.options,
                prefix,
            }));
        }
        self.target.lookup(name).map(Field::Value)
    }

    /// Monitor over a nested list or object, if it can be tracked.
    pub fn nested(&mut self, name: &str) -> Option<Monitor<'_>> {
        match self.field(name)? {
            Field::Nested(monitor) => Some(monitor),
            Field::Value(_) | Field::Context(_) => None,
        }
    }

    pub fn into_nested(self, name: &str) -> Option<Monitor<'a>> {
        if name == CHANGES_FIELD || !self.can_nest(name) {
            return None;
        }
        let prefix = self.child_prefix(name);
        let Monitor {
            target,
            context,
            options,
            ..
        } = self;
        Some(Monitor {
            target: target.into_child(name)?,
            context,
            options,
            prefix,
        })
    }

    /// Writes a field, recording its dotted label unless the value is unchanged.
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> ModelResult<()> {
        let value = value.into();
        if name == CHANGES_FIELD {
            return Err(ModelError::ReservedField(name.to_string()));
        }
        if matches!(self.target, Target::List(_)) && list_index(name).is_none() {
            return Err(ModelError::InvalidIndex(name.to_string()));
        }

        let current = self.target.lookup(name);
        let unchanged = current == Some(&value);
        let existed = current.is_some();
        if !unchanged {
            let tracked = !self.options.just_owned || self.target.owns(name) || !existed;
            if tracked {
                let label = format!("{}{}", self.prefix, name);
                if self.options.warn && self.context.contains(&label) {
                    log::warn!("overwriting previously changed, unsaved value '{}'", label);
                }
                self.context.mark(label);
            }
        }
        self.target.assign(name, value)
    }
}

/// The root of an instance's fields: the bag, its change context and options.
#[derive(Debug, Default)]
pub struct TrackedFields {
    bag: FieldBag,
    context: ChangeContext,
    options: MonitorOptions,
}

impl TrackedFields {
    /// Wraps a bag with a fresh, empty change context.
    pub fn new(bag: FieldBag, options: MonitorOptions) -> Self {
        Self {
            bag,
            context: ChangeContext::new(),
            options,
        }
    }

    pub fn bag(&self) -> &FieldBag {
        &self.bag
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.bag.get(name)
    }

    pub fn context(&self) -> &ChangeContext {
        &self.context
    }

    pub fn options(&self) -> MonitorOptions {
        self.options
    }

    pub fn is_dirty(&self) -> bool {
        self.context.is_dirty()
    }

    pub fn commit(&mut self) {
        self.context.commit();
    }

    pub fn monitor(&mut self) -> Monitor<'_> {
        Monitor {
            target: Target::Bag(&mut self.bag),
            context: &mut self.context,
            options: self.options,
            prefix: String::new(),
        }
    }

    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> ModelResult<()> {
        self.monitor().set(name, value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(pairs: &[(&str, Value)]) -> Record {
        pairs
            .iter()
            .map(|(name, value)| (name.to_string(), value.clone()))
            .collect()
    }

    #[test]
    fn test_identical_write_is_not_tracked() {
        let bag = FieldBag::from_record(record(&[("x", Value::Integer(1))]));
        let mut fields = TrackedFields::new(bag, MonitorOptions::new());

        fields.set("x", 1i64).unwrap();
        assert!(!fields.is_dirty());

        fields.set("x", 2i64).unwrap();
        assert_eq!(fields.context().labels(), vec!["x".to_string()]);
        assert_eq!(fields.get("x"), Some(&Value::Integer(2)));
    }

    #[test]
    fn test_just_owned_skips_inherited_names() {
        let defaults = Arc::new(record(&[("color", Value::Text("red".into()))]));
        let bag = FieldBag::new().with_inherited(defaults);
        let options = MonitorOptions::new().just_owned(true);
        let mut fields = TrackedFields::new(bag, options);

        assert_eq!(fields.get("color"), Some(&Value::Text("red".into())));
        fields.set("color", "blue").unwrap();
        assert!(!fields.is_dirty());
        assert!(fields.bag().owns("color"));

        fields.set("size", 3i64).unwrap();
        assert!(fields.context().contains("size"));

        fields.set("color", "green").unwrap();
        assert!(fields.context().contains("color"));
    }

    #[test]
    fn test_reserved_field_reads_context_and_rejects_writes() {
        let mut fields = TrackedFields::new(FieldBag::new(), MonitorOptions::new());
        fields.set("a", 1i64).unwrap();

        let mut monitor = fields.monitor();
        match monitor.field(CHANGES_FIELD) {
            Some(Field::Context(context)) => assert!(context.contains("a")),
            _ => panic!("expected the change context"),
        }
        assert!(monitor.get(CHANGES_FIELD).is_none());
        assert!(matches!(
            monitor.set(CHANGES_FIELD, 5i64),
            Err(ModelError::ReservedField(_))
        ));
        assert!(!fields.bag().contains(CHANGES_FIELD));
    }

    #[test]
    fn test_list_writes_extend_and_validate_indices() {
        let items = Value::List(vec![Value::Integer(1)]);
        let bag = FieldBag::from_record(record(&[("items", items)]));
        let mut fields = TrackedFields::new(bag, MonitorOptions::new().recursive(true));

        {
            let mut root = fields.monitor();
            let mut list = root.nested("items").unwrap();
            list.set("2", 9i64).unwrap();
            assert!(matches!(list.set("first", 0i64), Err(ModelError::InvalidIndex(_))));
        }

        assert_eq!(
            fields.get("items"),
            Some(&Value::List(vec![
                Value::Integer(1),
                Value::Null,
                Value::Integer(9)
            ]))
        );
        assert_eq!(fields.context().labels(), vec!["items.2".to_string()]);
    }

    #[test]
    fn test_non_recursive_monitor_does_not_descend() {
        let nested = Value::Object(record(&[("b", Value::Integer(1))]));
        let bag = FieldBag::from_record(record(&[("a", nested)]));
        let mut fields = TrackedFields::new(bag, MonitorOptions::new());

        let mut root = fields.monitor();
        assert!(root.nested("a").is_none());
        assert!(matches!(root.field("a"), Some(Field::Value(Value::Object(_)))));
    }
}
