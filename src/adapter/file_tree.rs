use super::keys::{fill_key_template, has_shard_shape, key_to_path, path_to_key, within_depth};
use super::{Adapter, ReadOptions};
use crate::core::{AdapterError, AdapterResult, Document};
use async_trait::async_trait;
use futures::stream::{self, BoxStream, StreamExt};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;

const RECORD_EXTENSION: &str = "json";

/// One pretty-printed JSON file per record under a root directory.
///
/// Keys map onto relative paths through [`key_to_path`], so a key ending in a
/// UUID lands in a two-level shard directory. Writes go to a temporary file
/// that is renamed into place.
#[derive(Debug, Clone)]
pub struct FileTreeAdapter {
    root: PathBuf,
}

impl FileTreeAdapter {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn check_key(key: &str) -> AdapterResult<()> {
        let invalid = |reason: &str| AdapterError::InvalidKey {
            key: key.to_string(),
            reason: reason.to_string(),
        };
        if key.is_empty() {
            return Err(invalid("key is empty"));
        }
        if key.starts_with('/') || key.contains('\\') {
            return Err(invalid("key must be a relative, '/'-separated path"));
        }
        if key.split('/').any(|segment| segment.is_empty() || segment == "." || segment == "..") {
            return Err(invalid("key contains an empty or relative segment"));
        }
        if has_shard_shape(key) {
            return Err(invalid("key contains a reserved sharded-uuid segment run"));
        }
        Ok(())
    }

    fn directory_for(&self, key: &str) -> PathBuf {
        let mut path = self.root.clone();
        for segment in key_to_path(key).split('/').filter(|segment| !segment.is_empty()) {
            path.push(segment);
        }
        path
    }

    /// File holding the record stored under `key`.
    pub fn path_for(&self, key: &str) -> AdapterResult<PathBuf> {
        Self::check_key(key)?;
        let mut path = self.directory_for(key);
        let file_name = format!(
            "{}.{}",
            path.file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default(),
            RECORD_EXTENSION
        );
        path.set_file_name(file_name);
        Ok(path)
    }

    fn key_for(&self, path: &Path) -> Option<String> {
        let relative = path.strip_prefix(&self.root).ok()?;
        let joined = relative
            .components()
            .map(|component| component.as_os_str().to_string_lossy().into_owned())
            .collect::<Vec<_>>()
            .join("/");
        let stem = joined.strip_suffix(&format!(".{}", RECORD_EXTENSION))?;
        Some(path_to_key(stem))
    }

    async fn collect_keys(
        &self,
        prefix: &str,
        max_depth: Option<usize>,
        separator: &str,
    ) -> AdapterResult<Vec<String>> {
        let start = match prefix.rfind('/') {
            Some(end) => self.directory_for(&prefix[..end]),
            None => self.root.clone(),
        };

        let mut keys = Vec::new();
        let mut pending = vec![start];
        while let Some(dir) = pending.pop() {
            let mut entries = match fs::read_dir(&dir).await {
                Ok(entries) => entries,
                Err(err) if err.kind() == ErrorKind::NotFound => continue,
                Err(err) => return Err(err.into()),
            };
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                if entry.file_type().await?.is_dir() {
                    pending.push(path);
                } else if let Some(key) = self.key_for(&path) {
                    if within_depth(&key, prefix, max_depth, separator) {
                        keys.push(key);
                    }
                }
            }
        }
        keys.sort();
        Ok(keys)
    }
}

async fn atomic_write(path: &Path, bytes: &[u8]) -> AdapterResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await.map_err(|err| {
            AdapterError::Io(format!(
                "Failed to create parent directory '{}': {}",
                parent.display(),
                err
            ))
        })?;
    }

    let tmp = path.with_extension("tmp");
    fs::write(&tmp, bytes).await.map_err(|err| {
        AdapterError::Io(format!(
            "Failed to write temp file '{}': {}",
            tmp.display(),
            err
        ))
    })?;

    fs::rename(&tmp, path).await.map_err(|err| {
        AdapterError::Io(format!(
            "Failed to rename temp file '{}' -> '{}': {}",
            tmp.display(),
            path.display(),
            err
        ))
    })?;
    Ok(())
}

#[async_trait]
impl Adapter for FileTreeAdapter {
    fn name(&self) -> &'static str {
        "file-tree"
    }

    async fn create(&self, key_template: &str, data: Document) -> AdapterResult<String> {
        let key = fill_key_template(key_template)?;
        self.write(&key, data).await?;
        Ok(key)
    }

    async fn has(&self, key: &str) -> AdapterResult<bool> {
        let path = self.path_for(key)?;
        Ok(fs::try_exists(&path).await?)
    }

    async fn list(&self, parent: &str) -> AdapterResult<Vec<String>> {
        let parent = parent.trim_end_matches('/');
        let dir = if parent.is_empty() {
            self.root.clone()
        } else {
            Self::check_key(parent)?;
            self.directory_for(parent)
        };

        let mut entries = match fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };

        let parent_path = key_to_path(parent);
        let suffix = format!(".{}", RECORD_EXTENSION);
        let mut children = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let file_name = entry.file_name().to_string_lossy().into_owned();
            let name = if let Some(stem) = file_name.strip_suffix(&suffix) {
                stem.to_string()
            } else if entry.file_type().await?.is_dir() {
                file_name
            } else {
                continue;
            };
            let child = if parent_path.is_empty() {
                name
            } else {
                format!("{}/{}", parent_path, name)
            };
            children.push(path_to_key(&child));
        }
        children.sort();
        children.dedup();
        Ok(children)
    }

    async fn read(&self, key: &str, options: ReadOptions) -> AdapterResult<Document> {
        let path = self.path_for(key)?;
        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => return options.missing(key),
            Err(err) => return Err(err.into()),
        };
        serde_json::from_slice(&bytes).map_err(|err| AdapterError::Malformed {
            key: key.to_string(),
            reason: err.to_string(),
        })
    }

    async fn write(&self, key: &str, data: Document) -> AdapterResult<Document> {
        let path = self.path_for(key)?;
        let bytes = serde_json::to_vec_pretty(&data)?;
        atomic_write(&path, &bytes).await?;
        tracing::trace!(key, path = %path.display(), "record written");
        Ok(data)
    }

    async fn remove(&self, key: &str) -> AdapterResult<String> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(key.to_string()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(key.to_string()),
            Err(err) => Err(err.into()),
        }
    }

    fn key_stream<'a>(
        &'a self,
        prefix: &'a str,
        max_depth: Option<usize>,
        separator: &'a str,
    ) -> BoxStream<'a, AdapterResult<String>> {
        stream::once(self.collect_keys(prefix, max_depth, separator))
            .flat_map(|result| match result {
                Ok(keys) => stream::iter(keys.into_iter().map(Ok)).boxed(),
                Err(err) => stream::once(async move { Err(err) }).boxed(),
            })
            .boxed()
    }
}
