use super::keys::{fill_key_template, within_depth};
use super::{Adapter, ReadOptions};
use crate::core::{AdapterResult, Document};
use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use std::collections::{BTreeMap, BTreeSet};
use tokio::sync::RwLock;

/// Records kept in an ordered in-process map.
#[derive(Debug, Default)]
pub struct MemoryAdapter {
    records: RwLock<BTreeMap<String, Document>>,
}

impl MemoryAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    async fn matching_keys(&self, prefix: &str, max_depth: Option<usize>, separator: &str) -> Vec<String> {
        self.records
            .read()
            .await
            .keys()
            .filter(|key| within_depth(key, prefix, max_depth, separator))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl Adapter for MemoryAdapter {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn create(&self, key_template: &str, data: Document) -> AdapterResult<String> {
        let key = fill_key_template(key_template)?;
        self.records.write().await.insert(key.clone(), data);
        Ok(key)
    }

    async fn has(&self, key: &str) -> AdapterResult<bool> {
        Ok(self.records.read().await.contains_key(key))
    }

    async fn list(&self, parent: &str) -> AdapterResult<Vec<String>> {
        let parent = parent.trim_end_matches('/');
        let prefix = if parent.is_empty() {
            String::new()
        } else {
            format!("{}/", parent)
        };

        let records = self.records.read().await;
        let children: BTreeSet<String> = records
            .keys()
            .filter_map(|key| key.strip_prefix(&prefix))
            .filter_map(|rest| rest.split('/').next())
            .filter(|segment| !segment.is_empty())
            .map(|segment| format!("{}{}", prefix, segment))
            .collect();
        Ok(children.into_iter().collect())
    }

    async fn read(&self, key: &str, options: ReadOptions) -> AdapterResult<Document> {
        match self.records.read().await.get(key) {
            Some(record) => Ok(record.clone()),
            None => options.missing(key),
        }
    }

    async fn write(&self, key: &str, data: Document) -> AdapterResult<Document> {
        self.records
            .write()
            .await
            .insert(key.to_string(), data.clone());
        Ok(data)
    }

    async fn remove(&self, key: &str) -> AdapterResult<String> {
        self.records.write().await.remove(key);
        Ok(key.to_string())
    }

    fn key_stream<'a>(
        &'a self,
        prefix: &'a str,
        max_depth: Option<usize>,
        separator: &'a str,
    ) -> BoxStream<'a, AdapterResult<String>> {
        stream::once(self.matching_keys(prefix, max_depth, separator))
            .flat_map(|keys| stream::iter(keys.into_iter().map(Ok)))
            .boxed()
    }
}
