use crate::adapter::{ReadOptions, key_uuid};
use crate::config::UnsavedChangesPolicy;
use crate::core::{Document, ModelError, ModelResult, Record, ValidationError, Value};
use crate::monitor::{ChangeContext, FieldBag, Monitor, TrackedFields};
use crate::schema::{CompiledModel, FieldAccessor, ON_AFTER_VALIDATE, ON_BEFORE_VALIDATE};
use futures::future::{self, BoxFuture, FutureExt, Shared};
use std::fmt;
use std::sync::Arc;
use tracing::Instrument;

/// Shared result of the one storage read behind `load()`. `None` for
/// instances that were never stored.
pub type PendingLoad = Shared<BoxFuture<'static, ModelResult<Option<Arc<Document>>>>>;

fn resolved() -> PendingLoad {
    future::ready(Ok(None)).boxed().shared()
}

fn parse_uuid(value: &str) -> ModelResult<String> {
    uuid::Uuid::parse_str(value)
        .map(|uuid| uuid.hyphenated().to_string())
        .map_err(|_| ModelError::InvalidUuid(value.to_string()))
}

/// A handle on one record of a compiled model.
///
/// An instance is *new* until its first save assigns a uuid, *bound* once it
/// has one, and *loaded* once the stored record has been applied. New
/// instances count as loaded.
pub struct ModelInstance {
    model: Arc<CompiledModel>,
    uuid: Option<String>,
    properties: TrackedFields,
    loaded: Option<PendingLoad>,
    applied: bool,
}

impl fmt::Debug for ModelInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelInstance")
            .field("model", &self.model.name())
            .field("uuid", &self.uuid)
            .field("properties", self.properties.bag().own_fields())
            .field("changes", self.properties.context())
            .field("loaded", &self.is_loaded())
            .finish()
    }
}

impl CompiledModel {
    /// A new instance holding only the attribute defaults.
    pub fn new_instance(self: &Arc<Self>) -> ModelInstance {
        ModelInstance {
            model: Arc::clone(self),
            uuid: None,
            properties: TrackedFields::new(self.empty_bag(), self.config().monitor),
            loaded: Some(resolved()),
            applied: true,
        }
    }

    /// A new instance with `values` assigned through the field accessors.
    pub fn new_with(self: &Arc<Self>, values: Record) -> ModelResult<ModelInstance> {
        let mut instance = self.new_instance();
        for (name, value) in values {
            instance.set(&name, value)?;
        }
        Ok(instance)
    }

    /// A handle on the stored record `uuid`. Nothing is read until `load()`.
    pub fn bind(self: &Arc<Self>, uuid: &str) -> ModelResult<ModelInstance> {
        let uuid = parse_uuid(uuid)?;
        Ok(ModelInstance {
            model: Arc::clone(self),
            uuid: Some(uuid),
            properties: TrackedFields::new(self.empty_bag(), self.config().monitor),
            loaded: None,
            applied: false,
        })
    }

    pub async fn open(self: &Arc<Self>, uuid: &str) -> ModelResult<ModelInstance> {
        let mut instance = self.bind(uuid)?;
        instance.load().await?;
        Ok(instance)
    }
}

impl ModelInstance {
    pub fn model(&self) -> &Arc<CompiledModel> {
        &self.model
    }

    pub fn uuid(&self) -> Option<&str> {
        self.uuid.as_deref()
    }

    /// Assigns the uuid. It can be set once and must parse as a UUID.
    pub fn assign_uuid(&mut self, uuid: &str) -> ModelResult<()> {
        if let Some(current) = &self.uuid {
            return Err(ModelError::UuidAlreadySet {
                current: current.clone(),
            });
        }
        self.uuid = Some(parse_uuid(uuid)?);
        Ok(())
    }

    pub fn data_key(&self) -> String {
        self.model.data_key(self.uuid.as_deref())
    }

    pub fn is_new(&self) -> bool {
        self.uuid.is_none()
    }

    pub fn is_loaded(&self) -> bool {
        self.loaded.is_some() && self.applied
    }

    pub fn is_dirty(&self) -> bool {
        self.properties.is_dirty()
    }

    pub fn changes(&self) -> &ChangeContext {
        self.properties.context()
    }

    pub fn properties(&self) -> &FieldBag {
        self.properties.bag()
    }

    /// Tracked access to the raw fields, including nested lists and objects.
    pub fn properties_mut(&mut self) -> Monitor<'_> {
        self.properties.monitor()
    }

    fn unknown(&self, name: &str) -> ModelError {
        ModelError::UnknownField {
            model: self.model.name().to_string(),
            field: name.to_string(),
        }
    }

    /// Reads an attribute or computed by name.
    pub fn get(&self, name: &str) -> ModelResult<Value> {
        let model = Arc::clone(&self.model);
        match model.accessor(name) {
            Some(FieldAccessor::Attribute(index)) => {
                let plan = &model.attributes()[index];
                Ok(self.properties.get(plan.name()).cloned().unwrap_or(Value::Null))
            }
            Some(FieldAccessor::Computed(_)) => match model.computed(name) {
                Some(computed) => Ok(computed.get(self)),
                None => Err(self.unknown(name)),
            },
            None => Err(self.unknown(name)),
        }
    }

    /// Writes an attribute (coerced to its type) or hands the value to a computed.
    pub fn set(&mut self, name: &str, value: impl Into<Value>) -> ModelResult<()> {
        let value = value.into();
        let model = Arc::clone(&self.model);
        match model.accessor(name) {
            Some(FieldAccessor::Attribute(index)) => {
                let plan = &model.attributes()[index];
                let coerced = plan.handler().coerce(&value, plan.spec());
                self.properties.set(plan.name(), coerced)
            }
            Some(FieldAccessor::Computed(_)) => match model.computed(name) {
                Some(computed) => computed.set(self, value),
                None => Err(self.unknown(name)),
            },
            None => Err(self.unknown(name)),
        }
    }

    /// The single read shared by every `load()` until the next `reload()`.
    pub fn pending_load(&mut self) -> PendingLoad {
        if let Some(pending) = &self.loaded {
            return pending.clone();
        }

        let pending = match &self.uuid {
            None => resolved(),
            Some(_) => {
                let adapter = Arc::clone(self.model.adapter());
                let key = self.data_key();
                async move {
                    let document = adapter.read(&key, ReadOptions::default()).await?;
                    Ok::<_, ModelError>(Some(Arc::new(document)))
                }
                .boxed()
                .shared()
            }
        };
        self.loaded = Some(pending.clone());
        pending
    }

    /// Reads the stored record once and replaces the fields with it.
    pub async fn load(&mut self) -> ModelResult<&mut Self> {
        self.load_with(true).await?;
        Ok(self)
    }

    /// Forgets the previous read and loads again.
    ///
    /// The unsaved-changes policy is applied once, before anything is
    /// forgotten.
    pub async fn reload(&mut self) -> ModelResult<&mut Self> {
        self.check_unsaved_changes()?;
        if !self.is_new() {
            self.loaded = None;
            self.applied = false;
        }
        self.load_with(false).await?;
        Ok(self)
    }

    async fn load_with(&mut self, check_changes: bool) -> ModelResult<()> {
        let span = tracing::debug_span!("model.load", model = self.model.name(), uuid = ?self.uuid);
        async {
            let document = self.pending_load().await?;
            if !self.applied {
                if let Some(document) = document {
                    self.apply(&document, check_changes)?;
                }
                self.applied = true;
            }
            Ok::<_, ModelError>(())
        }
        .instrument(span)
        .await
    }

    fn check_unsaved_changes(&self) -> ModelResult<()> {
        if !self.is_dirty() {
            return Ok(());
        }
        match self.model.config().on_unsaved_changes {
            UnsavedChangesPolicy::Ignore => Ok(()),
            UnsavedChangesPolicy::Warn => {
                log::warn!(
                    "discarding unsaved changes on {}: {}",
                    self.data_key(),
                    self.changes().labels().join(", ")
                );
                Ok(())
            }
            UnsavedChangesPolicy::Fail => Err(ModelError::UnsavedChanges {
                key: self.data_key(),
                changed: self.changes().labels(),
            }),
        }
    }

    fn apply(&mut self, document: &Document, check_changes: bool) -> ModelResult<()> {
        let key = self.data_key();
        let mut record = self.model.deserialize_all(&key, document)?;
        self.model.coerce_all(&mut record);
        if check_changes {
            self.check_unsaved_changes()?;
        }

        let bag = FieldBag::from_record(record).with_inherited(Arc::clone(self.model.defaults()));
        self.properties = TrackedFields::new(bag, self.model.config().monitor);
        Ok(())
    }

    /// Runs the validation hooks around the attribute checks.
    pub fn validate(&mut self) -> ModelResult<Vec<ValidationError>> {
        let model = Arc::clone(&self.model);
        if !model.has_validation_hooks() {
            return Ok(model.validate_all(self.properties.bag()));
        }

        let mut errors = Vec::new();
        for hook in model.hooks(ON_BEFORE_VALIDATE) {
            hook(self, &mut errors)?;
        }
        errors.extend(model.validate_all(self.properties.bag()));
        for hook in model.hooks(ON_AFTER_VALIDATE) {
            hook(self, &mut errors)?;
        }
        Ok(errors)
    }

    /// Validates and stores the instance. A loaded, unchanged instance is not written.
    pub async fn save(&mut self) -> ModelResult<&mut Self> {
        let span = tracing::debug_span!("model.save", model = self.model.name(), uuid = ?self.uuid);
        async {
            if !self.is_new() {
                if !self.is_loaded() {
                    return Err(ModelError::NotLoaded {
                        key: self.data_key(),
                    });
                }
                if !self.is_dirty() {
                    tracing::trace!("no changes, skipping write");
                    return Ok(());
                }
            }

            let errors = self.validate()?;
            if !errors.is_empty() {
                return Err(ModelError::Validation {
                    model: self.model.name().to_string(),
                    errors,
                });
            }

            let adapter = Arc::clone(self.model.adapter());
            let document = self.model.serialize_all(self.properties.bag());
            if self.is_new() {
                let key = adapter.create(&self.data_key(), document).await?;
                self.assign_uuid(key_uuid(&key))?;
                self.loaded = Some(resolved());
                self.applied = true;
                tracing::debug!(key = %key, "record created");
            } else {
                adapter.write(&self.data_key(), document).await?;
            }
            self.properties.commit();
            Ok::<_, ModelError>(())
        }
        .instrument(span)
        .await?;
        Ok(self)
    }

    /// Deletes the stored record. The handle stays usable.
    pub async fn remove(&mut self) -> ModelResult<&mut Self> {
        if !self.is_new() {
            let key = self.data_key();
            let span = tracing::debug_span!("model.remove", key = %key);
            self.model
                .adapter()
                .remove(&key)
                .instrument(span)
                .await?;
        }
        Ok(self)
    }

    /// Whether the record is stored. Always false for new instances.
    pub async fn exists(&self) -> ModelResult<bool> {
        if self.is_new() {
            return Ok(false);
        }
        Ok(self.model.adapter().has(&self.data_key()).await?)
    }

    /// Snapshot of every computed (unless omitted), every attribute and the uuid.
    pub fn to_object(&self, omit_computed: bool) -> Record {
        let mut object = Record::new();
        if !omit_computed {
            for (name, computed) in self.model.computeds() {
                object.insert(name.to_string(), computed.get(self));
            }
        }
        for plan in self.model.attributes() {
            let value = self.properties.get(plan.name()).cloned().unwrap_or(Value::Null);
            object.insert(plan.name().to_string(), value);
        }
        object.insert(
            "uuid".to_string(),
            self.uuid.clone().map(Value::Text).unwrap_or(Value::Null),
        );
        object
    }
}
