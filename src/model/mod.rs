//! Runtime side of compiled models: instances, their lifecycle against an
//! adapter, attribute search and the registry models are defined through.

pub mod instance;
pub mod registry;
pub mod search;

pub use instance::{ModelInstance, PendingLoad};
pub use registry::ModelRegistry;
