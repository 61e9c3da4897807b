use crate::core::SchemaError;
use crate::validation::ValidationErrors;
use std::fmt;

/// Failure of a resource operation, keyed to stable HTTP semantics.
#[derive(Debug)]
pub enum ServiceError {
    /// Requested record or relation is absent.
    NotFound(String),
    /// Attribute validation failed; carries every field's messages.
    Validation(ValidationErrors),
    /// Request payload has the wrong shape.
    Input(String),
    /// Relation changes refused by the entity.
    Forbidden(String),
    /// Infrastructure/runtime failure.
    Internal(String),
}

impl ServiceError {
    pub fn not_found(entity: &str, id: impl fmt::Display) -> Self {
        Self::NotFound(format!("{entity} not found: {id}"))
    }

    pub fn input(message: impl Into<String>) -> Self {
        Self::Input(message.into())
    }
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound(message)
            | Self::Input(message)
            | Self::Forbidden(message)
            | Self::Internal(message) => write!(f, "{message}"),
            Self::Validation(errors) => write!(f, "{errors}"),
        }
    }
}

impl std::error::Error for ServiceError {}

impl From<SchemaError> for ServiceError {
    fn from(err: SchemaError) -> Self {
        match err {
            SchemaError::Validation(errors) => Self::Validation(errors),
            SchemaError::NotFound(what) => Self::NotFound(format!("{what} not found")),
            SchemaError::UnknownRelation(name) => Self::NotFound(format!("relation '{name}' not found")),
            SchemaError::RelationDenied(_) => Self::Forbidden("Insufficient permissions".to_string()),
            other => {
                log::error!("Resource operation failed: {other}");
                Self::Internal(other.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_errors_map_to_service_errors() {
        let mut errors = ValidationErrors::new();
        errors.add("title", "The title field is required.");

        assert!(matches!(ServiceError::from(SchemaError::from(errors)), ServiceError::Validation(e) if e.has("title")));
        assert!(matches!(
            ServiceError::from(SchemaError::UnknownRelation("tags".into())),
            ServiceError::NotFound(_)
        ));
        assert!(matches!(
            ServiceError::from(SchemaError::RelationDenied("tags".into())),
            ServiceError::Forbidden(_)
        ));
        assert!(matches!(
            ServiceError::from(SchemaError::Media("disk full".into())),
            ServiceError::Internal(message) if message.contains("disk full")
        ));
    }
}
