use crate::core::{AdapterError, AdapterResult};
use regex::Regex;
use uuid::Uuid;

/// Placeholder in key templates replaced by a fresh identifier.
pub const UUID_PLACEHOLDER: &str = "%u";

lazy_static::lazy_static! {
    static ref UUID_SEGMENT: Regex = Regex::new(
        r"^[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$"
    ).expect("valid uuid pattern");
    static ref SHARD: Regex = Regex::new(r"^[0-9a-fA-F]{2}$").expect("valid shard pattern");
    static ref SHARD_TAIL: Regex = Regex::new(
        r"^[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$"
    ).expect("valid shard tail pattern");
}

/// Substitutes the `%u` placeholder of a key template with a new v4 UUID.
pub fn fill_key_template(template: &str) -> AdapterResult<String> {
    if !template.contains(UUID_PLACEHOLDER) {
        return Err(AdapterError::InvalidKey {
            key: template.to_string(),
            reason: format!("template has no '{}' placeholder", UUID_PLACEHOLDER),
        });
    }
    Ok(template.replacen(UUID_PLACEHOLDER, &Uuid::new_v4().to_string(), 1))
}

/// Splits every UUID segment of a key into `xx/yy/rest` so that one
/// directory never holds more than 256 entries per level.
pub fn key_to_path(key: &str) -> String {
    key.split('/')
        .map(|segment| {
            if UUID_SEGMENT.is_match(segment) {
                format!("{}/{}/{}", &segment[..2], &segment[2..4], &segment[4..])
            } else {
                segment.to_string()
            }
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Inverse of [`key_to_path`].
///
/// Any run of segments shaped `xx/yy/xxxx-xxxx-xxxx-xxxx-xxxxxxxxxxxx` (hex)
/// is read back as one UUID, so keys containing such a run do not round-trip.
/// See [`has_shard_shape`].
pub fn path_to_key(path: &str) -> String {
    let segments: Vec<&str> = path.split('/').collect();
    let mut joined = Vec::with_capacity(segments.len());
    let mut index = 0;
    while index < segments.len() {
        let sharded = index + 2 < segments.len()
            && SHARD.is_match(segments[index])
            && SHARD.is_match(segments[index + 1])
            && SHARD_TAIL.is_match(segments[index + 2]);
        if sharded {
            joined.push(format!(
                "{}{}{}",
                segments[index],
                segments[index + 1],
                segments[index + 2]
            ));
            index += 3;
        } else {
            joined.push(segments[index].to_string());
            index += 1;
        }
    }
    joined.join("/")
}

/// Whether `key` already contains a sharded-UUID run, which [`path_to_key`]
/// would collapse into a single segment.
pub fn has_shard_shape(key: &str) -> bool {
    path_to_key(key) != key
}

/// Whether `key` lies under `prefix` at most `max_depth` segments deep.
pub fn within_depth(key: &str, prefix: &str, max_depth: Option<usize>, separator: &str) -> bool {
    let Some(rest) = key.strip_prefix(prefix) else {
        return false;
    };
    let separator = if separator.is_empty() { "/" } else { separator };
    let depth = rest.split(separator).filter(|segment| !segment.is_empty()).count();
    depth > 0 && max_depth.is_none_or(|max| depth <= max)
}

/// Last segment of a key, which holds the record's uuid.
pub fn key_uuid(key: &str) -> &str {
    key.rsplit('/').next().unwrap_or(key)
}
