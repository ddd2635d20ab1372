use rustmemodel::core::Document;
use rustmemodel::schema::SchemaEntry;
use rustmemodel::{
    Adapter, AttributeSpec, BaseType, CompareOp, Computed, MemoryAdapter, ModelError, ModelInstance,
    ModelRegistry, ON_AFTER_VALIDATE, ON_BEFORE_VALIDATE, SchemaDefinition,
    TypeHandler, ValidationError, Value,
};
use serde_json::json;
use std::sync::Arc;

/// Lower-cased text that must contain an `@`.
struct EmailType;

impl TypeHandler for EmailType {
    fn name(&self) -> &'static str {
        "email"
    }

    fn coerce(&self, value: &Value, _spec: &AttributeSpec) -> Value {
        match value {
            Value::Null => Value::Null,
            other => Value::Text(other.to_string().trim().to_lowercase()),
        }
    }

    fn serialize(&self, value: &Value) -> Document {
        value.to_json()
    }

    fn is_valid(
        &self,
        field: &str,
        value: &Value,
        spec: &AttributeSpec,
        errors: &mut Vec<ValidationError>,
    ) {
        match value.as_str() {
            Some(text) if text.contains('@') => {}
            None if !spec.required => {}
            _ => errors.push(ValidationError::InvalidValue {
                field: field.to_string(),
                expected: "email address",
            }),
        }
    }
}

#[test]
fn invalid_model_names_are_rejected() {
    let mut registry = ModelRegistry::in_memory();
    for name in ["", "9lives", "my model", "dash-ed"] {
        let err = registry.define(name, &SchemaDefinition::new()).unwrap_err();
        assert!(matches!(err, ModelError::InvalidModelName(_)), "name {:?}", name);
    }
}

#[test]
fn unknown_types_are_fatal() {
    let mut registry = ModelRegistry::in_memory();
    let err = registry
        .define_json("Ship", &json!({"mass": {"type": "tonnage"}}))
        .unwrap_err();
    assert_eq!(
        err,
        ModelError::UnknownType {
            attribute: "mass".into(),
            type_name: "tonnage".into()
        }
    );
    assert!(registry.get("Ship").is_none());
}

#[test]
fn non_record_schemas_and_entries_are_rejected() {
    let mut registry = ModelRegistry::in_memory();
    assert!(matches!(
        registry.define_json("Ship", &json!("mass")),
        Err(ModelError::InvalidSchema(_))
    ));

    let err = registry
        .define_json("Ship", &json!({"mass": {"type": "number"}, "onBeforeValidate": 3}))
        .unwrap_err();
    match err {
        ModelError::InvalidDefinition { model, problems } => {
            assert_eq!(model, "Ship");
            assert_eq!(problems.len(), 1);
            assert!(problems[0].contains("onBeforeValidate"));
        }
        other => panic!("unexpected error {other}"),
    }

    let definition = SchemaDefinition::new().entry("hooks", SchemaEntry::Invalid(json!([1, 2])));
    assert!(matches!(
        registry.define("Ship", &definition),
        Err(ModelError::InvalidDefinition { .. })
    ));
}

#[test]
fn type_names_resolve_case_insensitively() {
    let mut registry = ModelRegistry::in_memory();
    let model = registry
        .define_json(
            "Reading",
            &json!({
                "label": {},
                "count": {"type": "Int"},
                "ratio": {"type": "DOUBLE"},
                "taken": {"type": "datetime"},
                "ok": {"type": "boolean"}
            }),
        )
        .unwrap();

    let types: Vec<(&str, &str)> = model
        .attributes()
        .iter()
        .map(|plan| (plan.name(), plan.spec().type_name()))
        .collect();
    assert_eq!(
        types,
        vec![
            ("label", "string"),
            ("count", "integer"),
            ("ratio", "number"),
            ("taken", "date"),
            ("ok", "boolean"),
        ]
    );
}

#[test]
fn json_attributes_keep_declaration_order() {
    let mut registry = ModelRegistry::in_memory();
    let model = registry
        .define_json("Ordered", &json!({"zeta": {}, "alpha": {}, "mid": {"type": "integer"}}))
        .unwrap();

    let names: Vec<&str> = model.attributes().iter().map(|plan| plan.name()).collect();
    assert_eq!(names, vec!["zeta", "alpha", "mid"]);
}

#[tokio::test]
async fn custom_types_take_part_in_the_whole_lifecycle() {
    let mut registry = ModelRegistry::in_memory();
    registry.register_type(Arc::new(EmailType));
    let contact = registry
        .define(
            "Contact",
            &SchemaDefinition::new().attribute("email", AttributeSpec::of("email").required()),
        )
        .unwrap();

    let mut invalid = contact.new_instance();
    invalid.set("email", "nobody").unwrap();
    assert_eq!(invalid.validate().unwrap().len(), 1);

    let mut ada = contact.new_instance();
    ada.set("email", "  Ada@Example.com ").unwrap();
    ada.save().await.unwrap();

    let found = contact
        .find_by_attribute("email", "ADA@example.com", CompareOp::Eq, 0, None)
        .await
        .unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].uuid(), ada.uuid());
}

#[tokio::test]
async fn extended_models_inherit_fields_hooks_and_adapter() {
    let mut registry = ModelRegistry::in_memory();
    let person = registry
        .define(
            "Person",
            &SchemaDefinition::new()
                .attribute("name", AttributeSpec::of("string"))
                .hook(ON_BEFORE_VALIDATE, |instance: &mut ModelInstance, _errors| {
                    if instance.get("name")?.is_null() {
                        instance.set("name", "anonymous")?;
                    }
                    Ok(())
                }),
        )
        .unwrap();

    let archive = Arc::new(MemoryAdapter::new());
    let employee = registry
        .define_with(
            "Employee",
            &SchemaDefinition::new()
                .attribute("salary", AttributeSpec::of("number").min(0))
                .hook(ON_AFTER_VALIDATE, |instance: &mut ModelInstance, errors: &mut Vec<ValidationError>| {
                    if instance.get("name")? == Value::from("anonymous") {
                        errors.push(ValidationError::custom("name", "employees need a name"));
                    }
                    Ok(())
                }),
            BaseType::Model(person.clone()),
            Some(archive.clone() as Arc<dyn Adapter>),
        )
        .unwrap();

    assert!(employee.extends(&person));
    assert_eq!(employee.data_key(None), "models/Employee/items/%u");

    let mut nameless = employee.new_instance();
    let errors = nameless.validate().unwrap();
    assert_eq!(nameless.get("name").unwrap(), Value::from("anonymous"));
    assert_eq!(errors.len(), 1);
    assert!(errors[0].to_string().contains("employees need a name"));

    let mut bob = employee.new_instance();
    bob.set("name", "Bob").unwrap();
    bob.set("salary", "1200.50").unwrap();
    bob.save().await.unwrap();
    assert_eq!(archive.len().await, 1);
    assert!(registry.adapter().list("models").await.unwrap().is_empty());
}

#[test]
fn hook_errors_stop_validation() {
    let mut registry = ModelRegistry::in_memory();
    let model = registry
        .define(
            "Locked",
            &SchemaDefinition::new()
                .attribute("code", AttributeSpec::of("string"))
                .hook(ON_BEFORE_VALIDATE, |_: &mut ModelInstance, _: &mut Vec<ValidationError>| {
                    Err(ModelError::Hook {
                        event: ON_BEFORE_VALIDATE.into(),
                        message: "locked".into(),
                    })
                }),
        )
        .unwrap();

    let mut instance = model.new_instance();
    assert!(matches!(instance.validate(), Err(ModelError::Hook { .. })));
}

#[test]
fn computed_attributes_delegate_reads_and_writes() {
    let mut registry = ModelRegistry::in_memory();
    let model = registry
        .define(
            "Name",
            &SchemaDefinition::new()
                .attribute("first", AttributeSpec::of("string"))
                .attribute("last", AttributeSpec::of("string"))
                .computed(Computed::new(
                    "full",
                    |instance: &ModelInstance| {
                        let first = instance.get("first").unwrap_or(Value::Null);
                        let last = instance.get("last").unwrap_or(Value::Null);
                        Value::Text(format!("{} {}", first, last))
                    },
                    |instance: &mut ModelInstance, value: Value| {
                        let text = value.to_string();
                        let (first, last) = text.split_once(' ').unwrap_or((text.as_str(), ""));
                        instance.set("first", first)?;
                        instance.set("last", last)
                    },
                )),
        )
        .unwrap();

    let mut instance = model.new_instance();
    instance.set("full", "Grace Hopper").unwrap();
    assert_eq!(instance.get("first").unwrap(), Value::from("Grace"));
    assert_eq!(instance.get("full").unwrap(), Value::from("Grace Hopper"));
    assert_eq!(
        instance.to_object(true).keys().cloned().collect::<Vec<_>>(),
        vec!["first".to_string(), "last".to_string(), "uuid".to_string()]
    );
}
