use async_trait::async_trait;
use futures::stream::BoxStream;
use rustmemodel::{
    Adapter, AdapterResult, AttributeSpec, CompiledModel, Document, MemoryAdapter, ModelConfig,
    ModelError, ModelRegistry, ReadOptions, SchemaDefinition, UnsavedChangesPolicy, Value,
};
use serde_json::json;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio_test::{assert_err, assert_ok};

/// Memory adapter that counts the calls reaching storage.
#[derive(Default)]
struct CountingAdapter {
    inner: MemoryAdapter,
    creates: AtomicUsize,
    reads: AtomicUsize,
    writes: AtomicUsize,
}

impl CountingAdapter {
    fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    fn writes(&self) -> usize {
        self.creates.load(Ordering::SeqCst) + self.writes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Adapter for CountingAdapter {
    fn name(&self) -> &'static str {
        "counting"
    }

    async fn create(&self, key_template: &str, data: Document) -> AdapterResult<String> {
        self.creates.fetch_add(1, Ordering::SeqCst);
        self.inner.create(key_template, data).await
    }

    async fn has(&self, key: &str) -> AdapterResult<bool> {
        self.inner.has(key).await
    }

    async fn list(&self, parent: &str) -> AdapterResult<Vec<String>> {
        self.inner.list(parent).await
    }

    async fn read(&self, key: &str, options: ReadOptions) -> AdapterResult<Document> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.inner.read(key, options).await
    }

    async fn write(&self, key: &str, data: Document) -> AdapterResult<Document> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.inner.write(key, data).await
    }

    async fn remove(&self, key: &str) -> AdapterResult<String> {
        self.inner.remove(key).await
    }

    fn key_stream<'a>(
        &'a self,
        prefix: &'a str,
        max_depth: Option<usize>,
        separator: &'a str,
    ) -> BoxStream<'a, AdapterResult<String>> {
        self.inner.key_stream(prefix, max_depth, separator)
    }
}

fn person_model(config: ModelConfig) -> (Arc<CountingAdapter>, Arc<CompiledModel>) {
    let adapter = Arc::new(CountingAdapter::default());
    let mut registry = ModelRegistry::new(adapter.clone()).with_config(config);
    let person = registry
        .define(
            "Person",
            &SchemaDefinition::new()
                .attribute("name", AttributeSpec::of("string"))
                .attribute("age", AttributeSpec::of("integer").min(0))
                .attribute("status", AttributeSpec::of("string").default_value("draft")),
        )
        .unwrap();
    (adapter, person)
}

async fn stored_jane(person: &Arc<CompiledModel>) -> String {
    let mut jane = person.new_instance();
    jane.set("name", "Jane").unwrap();
    jane.set("age", 30i64).unwrap();
    jane.save().await.unwrap();
    jane.uuid().unwrap().to_string()
}

#[tokio::test]
async fn negative_age_fails_validation_and_save() {
    let (adapter, person) = person_model(ModelConfig::new());
    let mut instance = person.new_instance();
    instance.set("age", -5i64).unwrap();

    let errors = instance.validate().unwrap();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].to_string().contains("minimum"));

    let err = assert_err!(instance.save().await);
    assert!(matches!(err, ModelError::Validation { .. }));
    assert_eq!(adapter.writes(), 0);
}

#[tokio::test]
async fn first_save_assigns_uuid_and_second_save_is_a_no_op() {
    let (adapter, person) = person_model(ModelConfig::new());
    let mut jane = person.new_instance();
    jane.set("name", "Jane").unwrap();
    jane.set("age", 30i64).unwrap();
    assert!(jane.is_new());

    assert_ok!(jane.save().await);
    let uuid = jane.uuid().unwrap().to_string();
    assert!(uuid::Uuid::parse_str(&uuid).is_ok());
    assert!(!jane.is_new());
    assert!(!jane.is_dirty());
    assert_eq!(adapter.writes(), 1);

    assert_ok!(jane.save().await);
    assert_eq!(jane.uuid(), Some(uuid.as_str()));
    assert_eq!(adapter.writes(), 1);
}

#[tokio::test]
async fn saved_instance_loads_back_with_defaults() {
    let (_adapter, person) = person_model(ModelConfig::new());
    let uuid = stored_jane(&person).await;

    let stored = person.open(&uuid).await.unwrap();
    assert_eq!(stored.get("name").unwrap(), Value::from("Jane"));
    assert_eq!(stored.get("age").unwrap(), Value::Integer(30));
    assert_eq!(stored.get("status").unwrap(), Value::from("draft"));
    assert!(stored.is_loaded());
    assert!(!stored.is_dirty());

    let document = person
        .adapter()
        .read(&stored.data_key(), ReadOptions::default())
        .await
        .unwrap();
    assert_eq!(document, json!({"name": "Jane", "age": 30, "status": "draft"}));
}

#[tokio::test]
async fn modified_instance_is_written_once() {
    let (adapter, person) = person_model(ModelConfig::new());
    let uuid = stored_jane(&person).await;

    let mut jane = person.open(&uuid).await.unwrap();
    jane.set("age", 31i64).unwrap();
    assert_eq!(jane.changes().labels(), vec!["age".to_string()]);

    jane.save().await.unwrap();
    assert!(!jane.is_dirty());
    assert_eq!(adapter.writes(), 2);

    let reopened = person.open(&uuid).await.unwrap();
    assert_eq!(reopened.get("age").unwrap(), Value::Integer(31));
}

#[tokio::test]
async fn concurrent_loads_share_one_read() {
    let (adapter, person) = person_model(ModelConfig::new());
    let uuid = stored_jane(&person).await;

    let mut jane = person.bind(&uuid).unwrap();
    let first = jane.pending_load();
    let second = jane.pending_load();
    let (first, second) = futures::join!(first, second);
    assert_eq!(first.unwrap(), second.unwrap());
    assert_eq!(adapter.reads(), 1);

    jane.load().await.unwrap();
    jane.load().await.unwrap();
    assert_eq!(adapter.reads(), 1);
    assert_eq!(jane.get("name").unwrap(), Value::from("Jane"));

    jane.reload().await.unwrap();
    assert_eq!(adapter.reads(), 2);
}

#[tokio::test]
async fn new_instance_load_never_touches_storage() {
    let (adapter, person) = person_model(ModelConfig::new());
    let mut instance = person.new_instance();
    instance.load().await.unwrap();
    assert_eq!(adapter.reads(), 0);
    assert!(!instance.exists().await.unwrap());
}

#[tokio::test]
async fn uuid_cannot_be_reassigned() {
    let (_adapter, person) = person_model(ModelConfig::new());
    let uuid = stored_jane(&person).await;

    let mut jane = person.bind(&uuid).unwrap();
    let err = assert_err!(jane.assign_uuid(&uuid::Uuid::new_v4().to_string()));
    assert!(matches!(err, ModelError::UuidAlreadySet { .. }));
    assert_eq!(jane.uuid(), Some(uuid.as_str()));
}

#[tokio::test]
async fn reload_with_unsaved_changes_fails_by_default() {
    let (_adapter, person) = person_model(ModelConfig::new());
    let uuid = stored_jane(&person).await;

    let mut jane = person.open(&uuid).await.unwrap();
    jane.set("name", "Janet").unwrap();

    let err = assert_err!(jane.reload().await);
    assert!(matches!(err, ModelError::UnsavedChanges { ref changed, .. } if changed == &vec!["name".to_string()]));
    assert_eq!(jane.get("name").unwrap(), Value::from("Janet"));
    assert!(jane.is_dirty());
}

#[tokio::test]
async fn reload_discards_changes_under_lenient_policies() {
    for policy in [UnsavedChangesPolicy::Warn, UnsavedChangesPolicy::Ignore] {
        let (_adapter, person) = person_model(ModelConfig::new().on_unsaved_changes(policy));
        let uuid = stored_jane(&person).await;

        let mut jane = person.open(&uuid).await.unwrap();
        jane.set("name", "Janet").unwrap();
        jane.reload().await.unwrap();

        assert_eq!(jane.get("name").unwrap(), Value::from("Jane"), "policy {}", policy);
        assert!(!jane.is_dirty());
    }
}

#[tokio::test]
async fn load_of_dirty_bound_instance_respects_policy() {
    let (adapter, person) = person_model(ModelConfig::new());
    let uuid = stored_jane(&person).await;

    let mut jane = person.bind(&uuid).unwrap();
    jane.set("age", 99i64).unwrap();
    assert_err!(jane.load().await);
    assert!(!jane.is_loaded());
    assert_eq!(jane.get("age").unwrap(), Value::Integer(99));
    assert_eq!(adapter.reads(), 1);
}

#[tokio::test]
async fn remove_deletes_record_but_keeps_handle() {
    let (_adapter, person) = person_model(ModelConfig::new());
    let uuid = stored_jane(&person).await;

    let mut jane = person.open(&uuid).await.unwrap();
    assert!(jane.exists().await.unwrap());
    jane.remove().await.unwrap();
    assert!(!jane.exists().await.unwrap());
    assert_eq!(jane.uuid(), Some(uuid.as_str()));

    let err = assert_err!(person.open(&uuid).await);
    assert!(matches!(err, ModelError::Adapter(_)));
}

#[tokio::test]
async fn to_object_snapshots_fields_and_uuid() {
    let (_adapter, person) = person_model(ModelConfig::new());
    let uuid = stored_jane(&person).await;

    let jane = person.open(&uuid).await.unwrap();
    let object = jane.to_object(false);
    assert_eq!(object.get("uuid"), Some(&Value::Text(uuid)));
    assert_eq!(object.get("status"), Some(&Value::from("draft")));
    assert_eq!(object.len(), 4);
}

#[tokio::test]
async fn tiny_float_changes_are_tracked_and_stored() {
    let adapter = Arc::new(CountingAdapter::default());
    let mut registry = ModelRegistry::new(adapter.clone());
    let sample = registry
        .define(
            "Sample",
            &SchemaDefinition::new().attribute("x", AttributeSpec::of("number")),
        )
        .unwrap();

    let mut zero = sample.new_instance();
    zero.set("x", 0.0f64).unwrap();
    zero.save().await.unwrap();
    let uuid = zero.uuid().unwrap().to_string();

    let mut tiny = sample.open(&uuid).await.unwrap();
    tiny.set("x", 1e-20f64).unwrap();
    assert_eq!(tiny.changes().labels(), vec!["x".to_string()]);
    tiny.save().await.unwrap();
    assert_eq!(adapter.writes(), 2);

    let reopened = sample.open(&uuid).await.unwrap();
    assert_eq!(reopened.get("x").unwrap().as_f64(), Some(1e-20));
}
