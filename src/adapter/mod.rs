//! Storage contract for model records.
//!
//! Every operation of [`Adapter`] rejects as unsupported unless a backend
//! overrides it. Two backends ship with the crate: [`MemoryAdapter`] and the
//! sharded [`FileTreeAdapter`].

pub mod file_tree;
pub mod keys;
pub mod memory;

use crate::core::{AdapterError, AdapterResult, Document};
use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};

pub use file_tree::FileTreeAdapter;
pub use keys::{
    UUID_PLACEHOLDER, fill_key_template, has_shard_shape, key_to_path, key_uuid, path_to_key,
    within_depth,
};
pub use memory::MemoryAdapter;

/// Options for [`Adapter::read`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReadOptions {
    /// Returned instead of a "no such record" error when the key is absent.
    pub if_missing: Option<Document>,
}

impl ReadOptions {
    pub fn if_missing(value: Document) -> Self {
        Self {
            if_missing: Some(value),
        }
    }

    /// Resolves a missing key to the fallback or to [`AdapterError::NoSuchRecord`].
    pub fn missing(self, key: &str) -> AdapterResult<Document> {
        self.if_missing
            .ok_or_else(|| AdapterError::NoSuchRecord(key.to_string()))
    }
}

#[async_trait]
pub trait Adapter: Send + Sync {
    fn name(&self) -> &'static str {
        "adapter"
    }

    /// Stores `data` under `key_template` with `%u` replaced, returning the key.
    async fn create(&self, _key_template: &str, _data: Document) -> AdapterResult<String> {
        Err(AdapterError::Unsupported("create"))
    }

    async fn has(&self, _key: &str) -> AdapterResult<bool> {
        Err(AdapterError::Unsupported("has"))
    }

    /// Keys of the direct children of `parent`.
    async fn list(&self, _parent: &str) -> AdapterResult<Vec<String>> {
        Err(AdapterError::Unsupported("list"))
    }

    async fn read(&self, _key: &str, _options: ReadOptions) -> AdapterResult<Document> {
        Err(AdapterError::Unsupported("read"))
    }

    async fn write(&self, _key: &str, _data: Document) -> AdapterResult<Document> {
        Err(AdapterError::Unsupported("write"))
    }

    /// Deletes `key`. Succeeds whether or not the key existed.
    async fn remove(&self, _key: &str) -> AdapterResult<String> {
        Err(AdapterError::Unsupported("remove"))
    }

    /// Stored keys under `prefix`, at most `max_depth` segments below it.
    fn key_stream<'a>(
        &'a self,
        _prefix: &'a str,
        _max_depth: Option<usize>,
        _separator: &'a str,
    ) -> BoxStream<'a, AdapterResult<String>> {
        stream::once(async { Err(AdapterError::Unsupported("key_stream")) }).boxed()
    }

    /// Records under `prefix`, read one by one as the key stream advances.
    fn value_stream<'a>(
        &'a self,
        prefix: &'a str,
        max_depth: Option<usize>,
        separator: &'a str,
    ) -> BoxStream<'a, AdapterResult<Document>> {
        self.key_stream(prefix, max_depth, separator)
            .and_then(move |key| async move { self.read(&key, ReadOptions::default()).await })
            .boxed()
    }

    async fn begin(&self) -> AdapterResult<()> {
        Err(AdapterError::MissingTransactionSupport)
    }

    async fn roll_back(&self) -> AdapterResult<()> {
        Err(AdapterError::MissingTransactionSupport)
    }

    async fn commit(&self) -> AdapterResult<()> {
        Err(AdapterError::MissingTransactionSupport)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Inert;

    impl Adapter for Inert {}

    #[tokio::test]
    async fn test_defaults_reject_everything() {
        let adapter = Inert;
        assert_eq!(
            adapter.create("a/%u", json!({})).await,
            Err(AdapterError::Unsupported("create"))
        );
        assert_eq!(
            adapter.read("a", ReadOptions::default()).await,
            Err(AdapterError::Unsupported("read"))
        );
        assert_eq!(adapter.begin().await, Err(AdapterError::MissingTransactionSupport));
        assert_eq!(adapter.commit().await, Err(AdapterError::MissingTransactionSupport));
        assert_eq!(adapter.roll_back().await, Err(AdapterError::MissingTransactionSupport));

        let keys: Vec<_> = adapter.key_stream("", None, "/").collect().await;
        assert_eq!(keys, vec![Err(AdapterError::Unsupported("key_stream"))]);
    }

    #[test]
    fn test_read_options_fallback() {
        assert_eq!(
            ReadOptions::if_missing(json!({"x": 1})).missing("k"),
            Ok(json!({"x": 1}))
        );
        assert_eq!(
            ReadOptions::default().missing("k"),
            Err(AdapterError::NoSuchRecord("k".into()))
        );
    }
}
