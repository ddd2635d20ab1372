//! Schema-driven models with typed attributes, change tracking and
//! pluggable storage adapters.
//!
//! ```
//! use rustmemodel::{AttributeSpec, ModelRegistry, SchemaDefinition, Value};
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut registry = ModelRegistry::in_memory();
//! let person = registry.define(
//!     "Person",
//!     &SchemaDefinition::new()
//!         .attribute("name", AttributeSpec::of("string").required().trim())
//!         .attribute("age", AttributeSpec::of("integer").min(0)),
//! )?;
//!
//! let mut ada = person.new_instance();
//! ada.set("name", "  Ada ")?;
//! ada.set("age", "36")?;
//! ada.save().await?;
//!
//! let uuid = ada.uuid().unwrap_or_default().to_string();
//! let stored = person.open(&uuid).await?;
//! assert_eq!(stored.get("name")?, Value::from("Ada"));
//! assert_eq!(stored.get("age")?, Value::Integer(36));
//! # Ok(())
//! # }
//! ```

// ============================================================================
// RustMemoModel Library
// ============================================================================

pub mod adapter;
pub mod config;
pub mod core;
pub mod model;
pub mod monitor;
pub mod schema;
pub mod types;

// Re-export main types for convenience
pub use adapter::{Adapter, FileTreeAdapter, MemoryAdapter, ReadOptions};
pub use config::{ModelConfig, UnsavedChangesPolicy};
pub use crate::core::{
    AdapterError, AdapterResult, Document, ModelError, ModelResult, Record, ValidationError, Value,
};
pub use model::{ModelInstance, ModelRegistry};
pub use monitor::{CHANGES_FIELD, ChangeContext, FieldBag, Monitor, MonitorOptions, TrackedFields};
pub use schema::{
    BaseType, CompiledModel, Computed, ComputedAttribute, ON_AFTER_VALIDATE, ON_BEFORE_VALIDATE,
    SchemaCompiler, SchemaDefinition,
};
pub use types::{AttributeSpec, CompareOp, TypeHandler, TypeRegistry};
