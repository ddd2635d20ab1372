use super::declaration::{ComputedAttribute, Hook, ON_AFTER_VALIDATE, ON_BEFORE_VALIDATE, SchemaDefinition};
use super::splitter::{split, upsert};
use crate::adapter::Adapter;
use crate::config::ModelConfig;
use crate::core::{AdapterError, Document, ModelError, ModelResult, Record, ValidationError, Value};
use crate::monitor::FieldBag;
use crate::types::{AttributeSpec, TypeHandler, TypeRegistry};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

/// Member names of the instance runtime. Fields with these names get no accessor.
pub const RESERVED_NAMES: &[&str] = &[
    "uuid",
    "exists",
    "load",
    "reload",
    "save",
    "remove",
    "validate",
    "to_object",
    "toObject",
    "is_new",
    "isNew",
    "properties",
    "loaded",
    "adapter",
    "data_key",
    "dataKey",
    "prototype",
    "constructor",
    "super",
    "__proto__",
];

pub fn is_reserved(name: &str) -> bool {
    RESERVED_NAMES.contains(&name)
}

pub fn is_identifier(value: &str) -> bool {
    let mut chars = value.chars();
    let Some(first) = chars.next() else {
        return false;
    };

    if !(first.is_ascii_alphabetic() || first == '_') {
        return false;
    }

    chars.all(|ch| ch.is_ascii_alphanumeric() || ch == '_')
}

/// What a compiled model extends.
#[derive(Clone, Default)]
pub enum BaseType {
    #[default]
    Root,
    Model(Arc<CompiledModel>),
}

/// One attribute of the compiled plan: its frozen spec and resolved handler.
#[derive(Clone)]
pub struct FieldPlan {
    name: String,
    spec: Arc<AttributeSpec>,
    handler: Arc<dyn TypeHandler>,
}

impl FieldPlan {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn spec(&self) -> &AttributeSpec {
        &self.spec
    }

    pub fn handler(&self) -> &dyn TypeHandler {
        self.handler.as_ref()
    }
}

impl fmt::Debug for FieldPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FieldPlan")
            .field("name", &self.name)
            .field("type", &self.handler.name())
            .finish()
    }
}

/// How instance field access by name is dispatched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldAccessor {
    /// Index into [`CompiledModel::attributes`].
    Attribute(usize),
    /// Index into [`CompiledModel::computeds`].
    Computed(usize),
}

/// Immutable runtime descriptor of a defined model.
pub struct CompiledModel {
    name: String,
    base: Option<Arc<CompiledModel>>,
    attributes: Vec<FieldPlan>,
    computeds: Vec<(String, Arc<dyn ComputedAttribute>)>,
    hooks: BTreeMap<String, Vec<Hook>>,
    accessors: HashMap<String, FieldAccessor>,
    defaults: Arc<Record>,
    adapter: Arc<dyn Adapter>,
    config: ModelConfig,
}

impl fmt::Debug for CompiledModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledModel")
            .field("name", &self.name)
            .field("base", &self.base.as_ref().map(|base| base.name()))
            .field("attributes", &self.attributes)
            .field(
                "computeds",
                &self.computeds.iter().map(|(name, _)| name).collect::<Vec<_>>(),
            )
            .field("hooks", &self.hooks.keys().collect::<Vec<_>>())
            .field("adapter", &self.adapter.name())
            .finish()
    }
}

impl CompiledModel {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn base(&self) -> Option<&Arc<CompiledModel>> {
        self.base.as_ref()
    }

    /// Whether this model is `other` or extends it, directly or not.
    pub fn extends(&self, other: &CompiledModel) -> bool {
        if std::ptr::eq(self, other) {
            return true;
        }
        self.base.as_ref().is_some_and(|base| base.extends(other))
    }

    pub fn adapter(&self) -> &Arc<dyn Adapter> {
        &self.adapter
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    pub fn attributes(&self) -> &[FieldPlan] {
        &self.attributes
    }

    pub fn attribute(&self, name: &str) -> Option<&FieldPlan> {
        self.attributes.iter().find(|plan| plan.name == name)
    }

    pub fn computeds(&self) -> impl Iterator<Item = (&str, &Arc<dyn ComputedAttribute>)> {
        self.computeds
            .iter()
            .map(|(name, computed)| (name.as_str(), computed))
    }

    pub fn computed(&self, name: &str) -> Option<&Arc<dyn ComputedAttribute>> {
        self.computeds
            .iter()
            .find(|(existing, _)| existing == name)
            .map(|(_, computed)| computed)
    }

    pub fn accessor(&self, name: &str) -> Option<FieldAccessor> {
        self.accessors.get(name).copied()
    }

    pub fn hooks(&self, event: &str) -> &[Hook] {
        self.hooks.get(event).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Whether `validate()` has to go through the before/after callbacks.
    pub fn has_validation_hooks(&self) -> bool {
        !self.hooks(ON_BEFORE_VALIDATE).is_empty() || !self.hooks(ON_AFTER_VALIDATE).is_empty()
    }

    /// Attribute defaults, shared as the inherited layer of every field bag.
    pub fn defaults(&self) -> &Arc<Record> {
        &self.defaults
    }

    /// Key prefix under which every record of this model is stored.
    pub fn key_prefix(&self) -> String {
        format!("models/{}/items/", self.name)
    }

    /// `models/<Name>/items/<uuid>`, or the `%u` template for unsaved instances.
    pub fn data_key(&self, uuid: Option<&str>) -> String {
        format!("{}{}", self.key_prefix(), uuid.unwrap_or(crate::adapter::UUID_PLACEHOLDER))
    }

    /// A bag with no own fields reading through the defaults.
    pub fn empty_bag(&self) -> FieldBag {
        FieldBag::new().with_inherited(Arc::clone(&self.defaults))
    }

    /// Coerces every attribute present in `record`, in declaration order.
    ///
    /// Absent attributes stay absent unless coercion of null yields a value.
    pub fn coerce_all(&self, record: &mut Record) {
        for plan in &self.attributes {
            let current = record.get(&plan.name).unwrap_or(&Value::Null);
            let coerced = plan.handler.coerce(current, &plan.spec);
            if record.contains_key(&plan.name) || !coerced.is_null() {
                record.insert(plan.name.clone(), coerced);
            }
        }
    }

    pub fn validate_all(&self, fields: &FieldBag) -> Vec<ValidationError> {
        let mut errors = Vec::new();
        for plan in &self.attributes {
            let value = fields.get(&plan.name).unwrap_or(&Value::Null);
            plan.handler.is_valid(&plan.name, value, &plan.spec, &mut errors);
        }
        errors
    }

    /// Storable record with exactly one entry per attribute.
    pub fn serialize_all(&self, fields: &FieldBag) -> Document {
        let record: serde_json::Map<String, Document> = self
            .attributes
            .iter()
            .map(|plan| {
                let value = fields.get(&plan.name).unwrap_or(&Value::Null);
                (plan.name.clone(), plan.handler.serialize(value))
            })
            .collect();
        Document::Object(record)
    }

    /// Reads the attributes out of a stored record. Unknown keys are dropped.
    pub fn deserialize_all(&self, key: &str, document: &Document) -> ModelResult<Record> {
        let Some(object) = document.as_object() else {
            return Err(AdapterError::Malformed {
                key: key.to_string(),
                reason: format!("expected an object, got {}", document),
            }
            .into());
        };
        Ok(self
            .attributes
            .iter()
            .filter_map(|plan| {
                object
                    .get(&plan.name)
                    .map(|stored| (plan.name.clone(), plan.handler.deserialize(stored)))
            })
            .collect())
    }
}

/// Turns schema declarations into [`CompiledModel`]s.
pub struct SchemaCompiler<'r> {
    types: &'r TypeRegistry,
    default_adapter: Arc<dyn Adapter>,
    config: ModelConfig,
}

impl<'r> SchemaCompiler<'r> {
    pub fn new(types: &'r TypeRegistry, default_adapter: Arc<dyn Adapter>) -> Self {
        Self {
            types,
            default_adapter,
            config: ModelConfig::default(),
        }
    }

    pub fn with_config(mut self, config: ModelConfig) -> Self {
        self.config = config;
        self
    }

    /// Compiles one model.
    ///
    /// A model extending `base` starts from the base's attributes, computeds
    /// and hooks (base hooks run first) and uses the base's adapter unless
    /// one is given.
    pub fn compile(
        &self,
        name: &str,
        definition: &SchemaDefinition,
        base: BaseType,
        adapter: Option<Arc<dyn Adapter>>,
    ) -> ModelResult<CompiledModel> {
        if !is_identifier(name) {
            return Err(ModelError::InvalidModelName(name.to_string()));
        }

        let declared = split(definition).map_err(|problems| ModelError::InvalidDefinition {
            model: name.to_string(),
            problems,
        })?;

        let base = match base {
            BaseType::Root => None,
            BaseType::Model(model) => Some(model),
        };
        let (mut attributes, mut computeds, mut hooks) = match &base {
            Some(base) => (
                base.attributes
                    .iter()
                    .map(|plan| (plan.name.clone(), plan.clone()))
                    .collect::<Vec<_>>(),
                base.computeds.clone(),
                base.hooks.clone(),
            ),
            None => (Vec::new(), Vec::new(), BTreeMap::new()),
        };

        let mut problems = Vec::new();
        for (attribute, spec) in declared.attributes {
            match self.compile_attribute(&attribute, spec)? {
                Ok(plan) => upsert(&mut attributes, &attribute, plan),
                Err(found) => problems.extend(
                    found
                        .into_iter()
                        .map(|problem| format!("attribute '{}': {}", attribute, problem)),
                ),
            }
        }
        if !problems.is_empty() {
            return Err(ModelError::InvalidDefinition {
                model: name.to_string(),
                problems,
            });
        }

        for (computed, implementation) in declared.computeds {
            upsert(&mut computeds, &computed, implementation);
        }
        for (event, callbacks) in declared.hooks {
            hooks.entry(event).or_default().extend(callbacks);
        }

        let attributes: Vec<FieldPlan> = attributes.into_iter().map(|(_, plan)| plan).collect();
        let accessors = build_accessors(name, &attributes, &computeds);
        let defaults: Record = attributes
            .iter()
            .filter_map(|plan| {
                plan.spec
                    .default
                    .as_ref()
                    .map(|value| (plan.name.clone(), value.clone()))
            })
            .collect();

        let adapter = adapter
            .or_else(|| base.as_ref().map(|base| Arc::clone(&base.adapter)))
            .unwrap_or_else(|| Arc::clone(&self.default_adapter));

        log::debug!(
            "compiled model '{}' with {} attributes, {} computeds on {} adapter",
            name,
            attributes.len(),
            computeds.len(),
            adapter.name()
        );

        Ok(CompiledModel {
            name: name.to_string(),
            base,
            attributes,
            computeds,
            hooks,
            accessors,
            defaults: Arc::new(defaults),
            adapter,
            config: self.config,
        })
    }

    /// Resolves the handler and normalizes the spec. The outer error is fatal
    /// (unknown type); the inner one lists definition problems.
    fn compile_attribute(
        &self,
        name: &str,
        mut spec: AttributeSpec,
    ) -> ModelResult<Result<FieldPlan, Vec<String>>> {
        let Some(handler) = self.types.resolve(spec.type_name()) else {
            return Err(ModelError::UnknownType {
                attribute: name.to_string(),
                type_name: spec.type_name().to_string(),
            });
        };
        spec.type_name = Some(handler.name().to_string());

        let problems = handler.check_definition(&mut spec);
        if !problems.is_empty() {
            return Ok(Err(problems));
        }
        if let Some(default) = spec.default.take() {
            spec.default = Some(handler.coerce(&default, &spec));
        }

        Ok(Ok(FieldPlan {
            name: name.to_string(),
            spec: Arc::new(spec),
            handler,
        }))
    }
}

/// Accessors for computeds first, then attributes so an attribute wins a
/// name collision. Reserved runtime names are skipped.
fn build_accessors(
    model: &str,
    attributes: &[FieldPlan],
    computeds: &[(String, Arc<dyn ComputedAttribute>)],
) -> HashMap<String, FieldAccessor> {
    let mut accessors = HashMap::new();
    let names = computeds
        .iter()
        .enumerate()
        .map(|(index, (name, _))| (name.as_str(), FieldAccessor::Computed(index)))
        .chain(
            attributes
                .iter()
                .enumerate()
                .map(|(index, plan)| (plan.name.as_str(), FieldAccessor::Attribute(index))),
        );

    for (name, accessor) in names {
        if is_reserved(name) {
            log::warn!(
                "field '{}' of model '{}' collides with a reserved member and gets no accessor",
                name,
                model
            );
            continue;
        }
        accessors.insert(name.to_string(), accessor);
    }
    accessors
}
