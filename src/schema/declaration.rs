use crate::core::{Document, ModelError, ModelResult, ValidationError, Value};
use crate::model::ModelInstance;
use crate::types::AttributeSpec;
use std::fmt;
use std::sync::Arc;

pub const ON_BEFORE_VALIDATE: &str = "onBeforeValidate";
pub const ON_AFTER_VALIDATE: &str = "onAfterValidate";

/// Callback bound to a lifecycle event. Returning an error stops the
/// remaining callbacks of the event.
pub type Hook =
    Arc<dyn Fn(&mut ModelInstance, &mut Vec<ValidationError>) -> ModelResult<()> + Send + Sync>;

/// A derived field backed by user code instead of storage.
pub trait ComputedAttribute: Send + Sync {
    fn get(&self, instance: &ModelInstance) -> Value;

    fn set(&self, instance: &mut ModelInstance, value: Value) -> ModelResult<()>;
}

type Getter = dyn Fn(&ModelInstance) -> Value + Send + Sync;
type Setter = dyn Fn(&mut ModelInstance, Value) -> ModelResult<()> + Send + Sync;

/// Closure-backed [`ComputedAttribute`]. Without a setter, writes are rejected.
pub struct Computed {
    name: String,
    getter: Box<Getter>,
    setter: Option<Box<Setter>>,
}

impl Computed {
    pub fn read_only<G>(name: impl Into<String>, getter: G) -> Self
    where
        G: Fn(&ModelInstance) -> Value + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            getter: Box::new(getter),
            setter: None,
        }
    }

    pub fn new<G, S>(name: impl Into<String>, getter: G, setter: S) -> Self
    where
        G: Fn(&ModelInstance) -> Value + Send + Sync + 'static,
        S: Fn(&mut ModelInstance, Value) -> ModelResult<()> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            getter: Box::new(getter),
            setter: Some(Box::new(setter)),
        }
    }
}

impl ComputedAttribute for Computed {
    fn get(&self, instance: &ModelInstance) -> Value {
        (self.getter)(instance)
    }

    fn set(&self, instance: &mut ModelInstance, value: Value) -> ModelResult<()> {
        match &self.setter {
            Some(setter) => setter(instance, value),
            None => Err(ModelError::ReadOnlyField(self.name.clone())),
        }
    }
}

/// One entry of a flat schema declaration.
#[derive(Clone)]
pub enum SchemaEntry {
    Attribute(AttributeSpec),
    Computed(Arc<dyn ComputedAttribute>),
    Hooks(Vec<Hook>),
    /// A declared value that is neither an attribute, a computed nor hooks.
    Invalid(Document),
}

impl fmt::Debug for SchemaEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Attribute(spec) => f.debug_tuple("Attribute").field(spec).finish(),
            Self::Computed(_) => f.write_str("Computed(..)"),
            Self::Hooks(hooks) => write!(f, "Hooks({} callbacks)", hooks.len()),
            Self::Invalid(value) => f.debug_tuple("Invalid").field(value).finish(),
        }
    }
}

/// Ordered, flat declaration of a model's attributes, computeds and hooks.
#[derive(Debug, Clone, Default)]
pub struct SchemaDefinition {
    entries: Vec<(String, SchemaEntry)>,
}

impl SchemaDefinition {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entry(mut self, name: impl Into<String>, entry: SchemaEntry) -> Self {
        self.entries.push((name.into(), entry));
        self
    }

    pub fn attribute(self, name: impl Into<String>, spec: AttributeSpec) -> Self {
        self.entry(name, SchemaEntry::Attribute(spec))
    }

    pub fn computed(self, computed: Computed) -> Self {
        let name = computed.name.clone();
        self.entry(name, SchemaEntry::Computed(Arc::new(computed)))
    }

    pub fn computed_with(self, name: impl Into<String>, computed: Arc<dyn ComputedAttribute>) -> Self {
        self.entry(name, SchemaEntry::Computed(computed))
    }

    /// Appends one callback to the hook list of `event`.
    pub fn hook<F>(self, event: impl Into<String>, hook: F) -> Self
    where
        F: Fn(&mut ModelInstance, &mut Vec<ValidationError>) -> ModelResult<()>
            + Send
            + Sync
            + 'static,
    {
        let hook: Hook = Arc::new(hook);
        self.entry(event, SchemaEntry::Hooks(vec![hook]))
    }

    pub fn hooks(self, event: impl Into<String>, hooks: Vec<Hook>) -> Self {
        self.entry(event, SchemaEntry::Hooks(hooks))
    }

    pub fn entries(&self) -> &[(String, SchemaEntry)] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Reads a JSON schema where every object value declares an attribute.
    ///
    /// JSON cannot express computeds or hooks, so every other value becomes an
    /// [`SchemaEntry::Invalid`] entry and is reported when the model is compiled.
    pub fn from_json(json: &Document) -> ModelResult<Self> {
        let Some(object) = json.as_object() else {
            return Err(ModelError::InvalidSchema(format!(
                "schema must be an object, got {}",
                json
            )));
        };

        let mut definition = Self::new();
        for (name, value) in object {
            let entry = if value.is_object() {
                let spec = AttributeSpec::from_json(value).map_err(|reason| {
                    ModelError::InvalidSchema(format!("attribute '{}': {}", name, reason))
                })?;
                SchemaEntry::Attribute(spec)
            } else {
                SchemaEntry::Invalid(value.clone())
            };
            definition.entries.push((name.clone(), entry));
        }
        Ok(definition)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_json_maps_objects_to_attributes() {
        let definition = SchemaDefinition::from_json(&json!({
            "name": {},
            "age": {"type": "integer", "min": 0},
            "nickname": "string"
        }))
        .unwrap();

        let kinds: Vec<(&str, bool)> = definition
            .entries()
            .iter()
            .map(|(name, entry)| (name.as_str(), matches!(entry, SchemaEntry::Attribute(_))))
            .collect();
        assert_eq!(kinds, vec![("name", true), ("age", true), ("nickname", false)]);
    }

    #[test]
    fn test_from_json_keeps_source_order() {
        let definition = SchemaDefinition::from_json(&json!({"zeta": {}, "alpha": {}})).unwrap();
        let names: Vec<&str> = definition.entries().iter().map(|(name, _)| name.as_str()).collect();
        assert_eq!(names, vec!["zeta", "alpha"]);
    }

    #[test]
    fn test_from_json_rejects_non_objects() {
        assert!(matches!(
            SchemaDefinition::from_json(&json!([1, 2])),
            Err(ModelError::InvalidSchema(_))
        ));
        assert!(matches!(
            SchemaDefinition::from_json(&json!({"age": {"required": 1}})),
            Err(ModelError::InvalidSchema(_))
        ));
    }
}
