use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Attribute bag of an entity instance, keyed by attribute name.
pub type Attributes = Map<String, Value>;

/// Separator used when ENUM multi-values are flattened for storage.
pub const ENUM_DELIMITER: &str = ";";

/// Storage-level type of a field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StorageType {
    Text,
    Int,
    Float,
    Bool,
    Timestamp,
    Json,
    Enum,
    Media,
    HasOne,
    HasMany,
    ManyToMany,
    Meta,
}

impl StorageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Text => "TEXT",
            Self::Int => "INT",
            Self::Float => "FLOAT",
            Self::Bool => "BOOL",
            Self::Timestamp => "TIMESTAMP",
            Self::Json => "JSON",
            Self::Enum => "ENUM",
            Self::Media => "MEDIA",
            Self::HasOne => "HASONE",
            Self::HasMany => "HASMANY",
            Self::ManyToMany => "MANYTOMANY",
            Self::Meta => "META",
        }
    }

    /// Relations whose linked set lives outside the entity's own row.
    pub fn is_remote_relation(&self) -> bool {
        matches!(self, Self::HasMany | Self::ManyToMany)
    }
}

impl fmt::Display for StorageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returns true when `value` is a string holding an already encoded JSON document.
pub fn is_json_encoded(value: &Value) -> bool {
    match value {
        Value::String(raw) => serde_json::from_str::<Value>(raw).is_ok(),
        _ => false,
    }
}
