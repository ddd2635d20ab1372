use super::declaration::{ComputedAttribute, Hook, SchemaDefinition, SchemaEntry};
use crate::types::AttributeSpec;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// A declaration partitioned by kind, each list in declaration order.
#[derive(Clone, Default)]
pub struct SplitSchema {
    pub attributes: Vec<(String, AttributeSpec)>,
    pub computeds: Vec<(String, Arc<dyn ComputedAttribute>)>,
    pub hooks: BTreeMap<String, Vec<Hook>>,
}

impl fmt::Debug for SplitSchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SplitSchema")
            .field("attributes", &self.attributes)
            .field(
                "computeds",
                &self.computeds.iter().map(|(name, _)| name).collect::<Vec<_>>(),
            )
            .field(
                "hooks",
                &self
                    .hooks
                    .iter()
                    .map(|(event, hooks)| (event, hooks.len()))
                    .collect::<BTreeMap<_, _>>(),
            )
            .finish()
    }
}

/// Replaces an entry of the same name in place, or appends.
pub(crate) fn upsert<T>(entries: &mut Vec<(String, T)>, name: &str, item: T) {
    match entries.iter_mut().find(|(existing, _)| existing.as_str() == name) {
        Some(slot) => slot.1 = item,
        None => entries.push((name.to_string(), item)),
    }
}

/// Partitions a declaration into attributes, computeds and hooks.
///
/// Redeclaring an attribute or computed replaces the earlier one; hook lists
/// of the same event are concatenated. Every unusable entry is reported.
pub fn split(definition: &SchemaDefinition) -> Result<SplitSchema, Vec<String>> {
    let mut split = SplitSchema::default();
    let mut problems = Vec::new();

    for (name, entry) in definition.entries() {
        if name.trim().is_empty() {
            problems.push("schema entries need a non-empty name".to_string());
            continue;
        }
        match entry {
            SchemaEntry::Attribute(spec) => upsert(&mut split.attributes, name, spec.clone()),
            SchemaEntry::Computed(computed) => {
                upsert(&mut split.computeds, name, Arc::clone(computed))
            }
            SchemaEntry::Hooks(hooks) => split
                .hooks
                .entry(name.clone())
                .or_default()
                .extend(hooks.iter().cloned()),
            SchemaEntry::Invalid(value) => problems.push(format!(
                "'{}' must be an attribute declaration, a computed attribute or a list of hooks, got {}",
                name, value
            )),
        }
    }

    if problems.is_empty() {
        Ok(split)
    } else {
        Err(problems)
    }
}
