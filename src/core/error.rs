use thiserror::Error;

/// Storage failures reported by an [`Adapter`](crate::adapter::Adapter).
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AdapterError {
    #[error("no such record @{0}")]
    NoSuchRecord(String),

    #[error("adapter does not support {0}")]
    Unsupported(&'static str),

    #[error("missing transaction support")]
    MissingTransactionSupport,

    #[error("Invalid key '{key}': {reason}")]
    InvalidKey { key: String, reason: String },

    #[error("Malformed record @{key}: {reason}")]
    Malformed { key: String, reason: String },

    #[error("I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for AdapterError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for AdapterError {
    fn from(err: serde_json::Error) -> Self {
        Self::Malformed {
            key: String::new(),
            reason: err.to_string(),
        }
    }
}

pub type AdapterResult<T> = std::result::Result<T, AdapterError>;

/// A single validation finding. These are collected, never raised on their own.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("{field} is required")]
    Required { field: String },

    #[error("{field} is below the minimum value {min}")]
    BelowMinimum { field: String, min: String },

    #[error("{field} is above the maximum value {max}")]
    AboveMaximum { field: String, max: String },

    #[error("{field} is longer than {max} characters")]
    TooLong { field: String, max: usize },

    #[error("{field} does not match pattern /{pattern}/")]
    PatternMismatch { field: String, pattern: String },

    #[error("{field} is not a valid {expected}")]
    InvalidValue { field: String, expected: &'static str },

    #[error("{field}: {message}")]
    Custom { field: String, message: String },
}

impl ValidationError {
    pub fn custom(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Custom {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn field(&self) -> &str {
        match self {
            Self::Required { field }
            | Self::BelowMinimum { field, .. }
            | Self::AboveMaximum { field, .. }
            | Self::TooLong { field, .. }
            | Self::PatternMismatch { field, .. }
            | Self::InvalidValue { field, .. }
            | Self::Custom { field, .. } => field,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ModelError {
    #[error("Invalid model name '{0}'")]
    InvalidModelName(String),

    #[error("Invalid schema: {0}")]
    InvalidSchema(String),

    #[error("Unknown type '{type_name}' for attribute '{attribute}'")]
    UnknownType { attribute: String, type_name: String },

    #[error("Invalid definition of model '{model}': {}", .problems.join("; "))]
    InvalidDefinition { model: String, problems: Vec<String> },

    #[error("Validation of '{model}' failed: {}", join_messages(.errors))]
    Validation {
        model: String,
        errors: Vec<ValidationError>,
    },

    #[error("Model '{model}' has no field '{field}'")]
    UnknownField { model: String, field: String },

    #[error("Field '{0}' is read-only")]
    ReadOnlyField(String),

    #[error("Field '{0}' is reserved")]
    ReservedField(String),

    #[error("Invalid list index '{0}'")]
    InvalidIndex(String),

    #[error("Cannot save {key}: instance is not loaded")]
    NotLoaded { key: String },

    #[error("uuid is already set to {current}")]
    UuidAlreadySet { current: String },

    #[error("Invalid uuid '{0}'")]
    InvalidUuid(String),

    #[error("Unsaved changes on {key} would be discarded: {}", .changed.join(", "))]
    UnsavedChanges { key: String, changed: Vec<String> },

    #[error("Unsupported comparison '{op}' for type {type_name}")]
    UnsupportedComparison { op: String, type_name: String },

    #[error("Hook '{event}' failed: {message}")]
    Hook { event: String, message: String },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error(transparent)]
    Adapter(#[from] AdapterError),
}

fn join_messages(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

pub type ModelResult<T> = std::result::Result<T, ModelError>;
