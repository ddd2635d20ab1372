use crate::core::{Document, ModelError};
use crate::monitor::MonitorOptions;
use serde::Deserialize;
use std::fmt;
use std::str::FromStr;

/// What `load()` does when the instance has changes that were never saved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnsavedChangesPolicy {
    /// Replace the fields silently.
    Ignore,
    /// Log a warning, then replace the fields.
    Warn,
    /// Reject the load and keep the current fields.
    #[default]
    Fail,
}

impl FromStr for UnsavedChangesPolicy {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ignore" => Ok(Self::Ignore),
            "warn" => Ok(Self::Warn),
            "fail" => Ok(Self::Fail),
            other => Err(ModelError::Config(format!(
                "unknown unsaved changes policy '{}', expected ignore, warn or fail",
                other
            ))),
        }
    }
}

impl fmt::Display for UnsavedChangesPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ignore => write!(f, "ignore"),
            Self::Warn => write!(f, "warn"),
            Self::Fail => write!(f, "fail"),
        }
    }
}

/// Runtime settings shared by every model compiled with them
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelConfig {
    /// Policy applied when a (re)load would discard unsaved changes
    pub on_unsaved_changes: UnsavedChangesPolicy,

    /// Change tracking options for instance fields
    pub monitor: MonitorOptions,
}

impl ModelConfig {
    /// Create the default configuration
    pub fn new() -> Self {
        Self {
            on_unsaved_changes: UnsavedChangesPolicy::Fail,
            monitor: MonitorOptions::new().recursive(true).warn(true),
        }
    }

    /// Set the unsaved changes policy
    pub fn on_unsaved_changes(mut self, policy: UnsavedChangesPolicy) -> Self {
        self.on_unsaved_changes = policy;
        self
    }

    /// Track writes inside nested lists and objects
    pub fn recursive(mut self, recursive: bool) -> Self {
        self.monitor.recursive = recursive;
        self
    }

    /// Warn when an unsaved change is overwritten
    pub fn warn_on_overwrite(mut self, warn: bool) -> Self {
        self.monitor.warn = warn;
        self
    }

    /// Leave writes that only shadow attribute defaults untracked
    pub fn just_owned(mut self, just_owned: bool) -> Self {
        self.monitor.just_owned = just_owned;
        self
    }

    /// Parse from a settings string
    ///
    /// Format: `key=value` pairs separated by `;` or `&`, for example
    /// `on_unsaved_changes=warn; recursive=false`.
    pub fn from_settings(settings: &str) -> Result<Self, ModelError> {
        let mut config = Self::new();
        for pair in settings.split([';', '&']).map(str::trim).filter(|p| !p.is_empty()) {
            let Some((key, value)) = pair.split_once('=') else {
                return Err(ModelError::Config(format!("expected key=value, got '{}'", pair)));
            };
            let value = value.trim();
            match key.trim() {
                "on_unsaved_changes" => config.on_unsaved_changes = value.parse()?,
                "recursive" => config.monitor.recursive = parse_flag(key, value)?,
                "warn" => config.monitor.warn = parse_flag(key, value)?,
                "just_owned" => config.monitor.just_owned = parse_flag(key, value)?,
                other => return Err(ModelError::Config(format!("unknown setting '{}'", other))),
            }
        }
        Ok(config)
    }
}

/// Settings as they appear in a JSON document. Absent keys keep their defaults.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigDocument {
    on_unsaved_changes: Option<UnsavedChangesPolicy>,
    recursive: Option<bool>,
    warn: Option<bool>,
    just_owned: Option<bool>,
}

impl ModelConfig {
    /// Parse from a JSON object such as `{"on_unsaved_changes": "warn"}`
    pub fn from_json(json: &Document) -> Result<Self, ModelError> {
        let document: ConfigDocument = serde_json::from_value(json.clone())
            .map_err(|err| ModelError::Config(err.to_string()))?;

        let mut config = Self::new();
        if let Some(policy) = document.on_unsaved_changes {
            config.on_unsaved_changes = policy;
        }
        if let Some(recursive) = document.recursive {
            config.monitor.recursive = recursive;
        }
        if let Some(warn) = document.warn {
            config.monitor.warn = warn;
        }
        if let Some(just_owned) = document.just_owned {
            config.monitor.just_owned = just_owned;
        }
        Ok(config)
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_flag(key: &str, value: &str) -> Result<bool, ModelError> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "yes" | "on" | "1" => Ok(true),
        "false" | "no" | "off" | "0" => Ok(false),
        _ => Err(ModelError::Config(format!(
            "setting '{}' expects a boolean, got '{}'",
            key.trim(),
            value
        ))),
    }
}
