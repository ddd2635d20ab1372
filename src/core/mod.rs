pub mod error;
pub mod value;

pub use error::{AdapterError, AdapterResult, ModelError, ModelResult, ValidationError};
pub use value::{Document, Record, Value};
