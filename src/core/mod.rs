pub mod dates;
pub mod error;
pub mod types;

pub use error::{Result, SchemaError};
pub use types::{Attributes, ENUM_DELIMITER, StorageType, is_json_encoded};
