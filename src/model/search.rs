use super::ModelInstance;
use crate::adapter::key_uuid;
use crate::core::{ModelError, ModelResult, Value};
use crate::schema::CompiledModel;
use crate::types::CompareOp;
use futures::TryStreamExt;
use std::sync::Arc;
use tracing::Instrument;

impl CompiledModel {
    /// Loads stored instances whose attribute `name` compares to `value` under `op`.
    ///
    /// The search value is coerced once with the attribute's type. Records are
    /// visited in key order; the first `offset` matches are skipped and the
    /// scan stops as soon as `limit` matches were collected.
    pub async fn find_by_attribute(
        self: &Arc<Self>,
        name: &str,
        value: impl Into<Value>,
        op: CompareOp,
        offset: usize,
        limit: Option<usize>,
    ) -> ModelResult<Vec<ModelInstance>> {
        let Some(plan) = self.attribute(name) else {
            return Err(ModelError::UnknownField {
                model: self.name().to_string(),
                field: name.to_string(),
            });
        };
        let reference = plan.handler().coerce(&value.into(), plan.spec());

        let span = tracing::debug_span!("model.find", model = self.name(), attribute = name, op = %op);
        async {
            let mut found = Vec::new();
            if limit == Some(0) {
                return Ok(found);
            }

            let adapter = Arc::clone(self.adapter());
            let prefix = self.key_prefix();
            let mut keys = adapter.key_stream(&prefix, Some(1), "/");
            let mut skipped = 0;

            while let Some(key) = keys.try_next().await? {
                let mut instance = match self.bind(key_uuid(&key)) {
                    Ok(instance) => instance,
                    Err(err) => {
                        log::warn!("skipping stored key {}: {}", key, err);
                        continue;
                    }
                };
                instance.load().await?;

                let current = instance.properties().get(name).cloned().unwrap_or(Value::Null);
                if !plan.handler().compare(&current, &reference, op)? {
                    continue;
                }
                if skipped < offset {
                    skipped += 1;
                    continue;
                }

                found.push(instance);
                if limit.is_some_and(|limit| found.len() >= limit) {
                    break;
                }
            }
            tracing::debug!(matches = found.len(), "search finished");
            Ok::<_, ModelError>(found)
        }
        .instrument(span)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::MemoryAdapter;
    use crate::schema::{BaseType, SchemaCompiler, SchemaDefinition};
    use crate::types::{AttributeSpec, TypeRegistry};

    async fn people(ages: &[i64]) -> Arc<CompiledModel> {
        let types = TypeRegistry::with_default_types();
        let definition = SchemaDefinition::new().attribute("age", AttributeSpec::of("integer"));
        let model = Arc::new(
            SchemaCompiler::new(&types, Arc::new(MemoryAdapter::new()))
                .compile("Person", &definition, BaseType::Root, None)
                .unwrap(),
        );
        for age in ages {
            let mut instance = model.new_instance();
            instance.set("age", *age).unwrap();
            instance.save().await.unwrap();
        }
        model
    }

    #[tokio::test]
    async fn test_find_applies_offset_and_limit() {
        let model = people(&[30, 30, 30, 40]).await;

        let all = model
            .find_by_attribute("age", "30", CompareOp::Eq, 0, None)
            .await
            .unwrap();
        assert_eq!(all.len(), 3);

        let page = model
            .find_by_attribute("age", 30i64, CompareOp::Eq, 1, Some(1))
            .await
            .unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].uuid(), all[1].uuid());

        let older = model
            .find_by_attribute("age", 35i64, CompareOp::Gt, 0, None)
            .await
            .unwrap();
        assert_eq!(older.len(), 1);
        assert_eq!(older[0].get("age").unwrap(), Value::Integer(40));
    }

    #[tokio::test]
    async fn test_find_rejects_unknown_attribute() {
        let model = people(&[]).await;
        assert!(matches!(
            model.find_by_attribute("height", 1i64, CompareOp::Eq, 0, None).await,
            Err(ModelError::UnknownField { .. })
        ));
    }
}
