use crate::validation::ValidationErrors;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("Field definition for {field} is invalid: {message}")]
    InvalidFieldDefinition { field: String, message: String },

    #[error("Validation failed: {0}")]
    Validation(ValidationErrors),

    #[error("Changes to relation '{0}' are not allowed")]
    RelationDenied(String),

    #[error("Relation '{0}' is not registered")]
    UnknownRelation(String),

    #[error("Contract violation: {0}")]
    ContractViolation(String),

    #[error("Precondition failed: {0}")]
    Precondition(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("Media error: {0}")]
    Media(String),

    #[error("Upload error: {0}")]
    Upload(String),

    #[error("Lock error: {0}")]
    LockError(String),

    #[error("I/O error: {0}")]
    IoError(String),
}

impl SchemaError {
    pub fn invalid_field(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidFieldDefinition {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Structured validation messages, when this is a validation failure.
    pub fn validation_errors(&self) -> Option<&ValidationErrors> {
        match self {
            Self::Validation(errors) => Some(errors),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, SchemaError>;

impl<T> From<std::sync::PoisonError<T>> for SchemaError {
    fn from(err: std::sync::PoisonError<T>) -> Self {
        Self::LockError(err.to_string())
    }
}

impl From<std::io::Error> for SchemaError {
    fn from(err: std::io::Error) -> Self {
        Self::IoError(err.to_string())
    }
}

impl From<ValidationErrors> for SchemaError {
    fn from(errors: ValidationErrors) -> Self {
        Self::Validation(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_field_message_names_field_and_reason() {
        let err = SchemaError::invalid_field("title", "group key sidebar not configured");
        assert_eq!(
            err.to_string(),
            "Field definition for title is invalid: group key sidebar not configured"
        );
    }

    #[test]
    fn test_validation_errors_are_exposed_structurally() {
        let mut errors = ValidationErrors::default();
        errors.add("title", "The title field is required.");
        let err = SchemaError::from(errors);

        let exposed = err.validation_errors().expect("validation variant");
        assert_eq!(exposed.messages("title").len(), 1);
        assert!(SchemaError::NotFound("Article 4".into()).validation_errors().is_none());
    }
}
