//! Model declarations and their compilation into runtime descriptors.

pub mod compiler;
pub mod declaration;
pub mod splitter;

pub use compiler::{
    BaseType, CompiledModel, FieldAccessor, FieldPlan, RESERVED_NAMES, SchemaCompiler,
    is_identifier, is_reserved,
};
pub use declaration::{
    Computed, ComputedAttribute, Hook, ON_AFTER_VALIDATE, ON_BEFORE_VALIDATE, SchemaDefinition,
    SchemaEntry,
};
pub use splitter::{SplitSchema, split};
