use crate::adapter::{Adapter, MemoryAdapter};
use crate::config::ModelConfig;
use crate::core::{Document, ModelError, ModelResult};
use crate::schema::{BaseType, CompiledModel, SchemaCompiler, SchemaDefinition};
use crate::types::{TypeHandler, TypeRegistry};
use std::collections::HashMap;
use std::sync::Arc;

/// Entry point for defining models: the type registry, the default adapter
/// and every model compiled so far, by name.
pub struct ModelRegistry {
    types: TypeRegistry,
    adapter: Arc<dyn Adapter>,
    config: ModelConfig,
    models: HashMap<String, Arc<CompiledModel>>,
}

impl ModelRegistry {
    pub fn new(adapter: Arc<dyn Adapter>) -> Self {
        Self {
            types: TypeRegistry::with_default_types(),
            adapter,
            config: ModelConfig::default(),
            models: HashMap::new(),
        }
    }

    /// A registry whose models are stored in a [`MemoryAdapter`] by default.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryAdapter::new()))
    }

    pub fn with_types(mut self, types: TypeRegistry) -> Self {
        self.types = types;
        self
    }

    pub fn with_config(mut self, config: ModelConfig) -> Self {
        self.config = config;
        self
    }

    pub fn types(&self) -> &TypeRegistry {
        &self.types
    }

    /// Makes a custom type available to models defined afterwards.
    pub fn register_type(&mut self, handler: Arc<dyn TypeHandler>) {
        self.types.register(handler);
    }

    pub fn adapter(&self) -> &Arc<dyn Adapter> {
        &self.adapter
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    /// Defines a root model on the default adapter.
    pub fn define(
        &mut self,
        name: &str,
        definition: &SchemaDefinition,
    ) -> ModelResult<Arc<CompiledModel>> {
        self.define_with(name, definition, BaseType::Root, None)
    }

    /// Defines `name` as an extension of the already defined model `base`.
    pub fn extend(
        &mut self,
        base: &str,
        name: &str,
        definition: &SchemaDefinition,
    ) -> ModelResult<Arc<CompiledModel>> {
        let Some(base) = self.get(base) else {
            return Err(ModelError::InvalidSchema(format!(
                "base model '{}' is not defined",
                base
            )));
        };
        self.define_with(name, definition, BaseType::Model(base), None)
    }

    pub fn define_with(
        &mut self,
        name: &str,
        definition: &SchemaDefinition,
        base: BaseType,
        adapter: Option<Arc<dyn Adapter>>,
    ) -> ModelResult<Arc<CompiledModel>> {
        let model = SchemaCompiler::new(&self.types, Arc::clone(&self.adapter))
            .with_config(self.config)
            .compile(name, definition, base, adapter)?;
        let model = Arc::new(model);

        if self.models.insert(name.to_string(), Arc::clone(&model)).is_some() {
            log::debug!("model '{}' redefined", name);
        }
        Ok(model)
    }

    /// Defines a root model from a JSON schema.
    pub fn define_json(&mut self, name: &str, schema: &Document) -> ModelResult<Arc<CompiledModel>> {
        let definition = SchemaDefinition::from_json(schema)?;
        self.define(name, &definition)
    }

    pub fn get(&self, name: &str) -> Option<Arc<CompiledModel>> {
        self.models.get(name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.models.keys().cloned().collect();
        names.sort();
        names
    }
}

impl Default for ModelRegistry {
    fn default() -> Self {
        Self::in_memory()
    }
}
