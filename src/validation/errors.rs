use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Attribute → messages, in attribute order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ValidationErrors(BTreeMap<String, Vec<String>>);

impl ValidationErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, attribute: impl Into<String>, message: impl Into<String>) {
        self.0.entry(attribute.into()).or_default().push(message.into());
    }

    pub fn messages(&self, attribute: &str) -> &[String] {
        self.0.get(attribute).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn first(&self, attribute: &str) -> Option<&str> {
        self.messages(attribute).first().map(String::as_str)
    }

    pub fn has(&self, attribute: &str) -> bool {
        self.0.contains_key(attribute)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of attributes with at least one message.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn attributes(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<String>)> {
        self.0.iter()
    }

    /// Fold `other` into this set, keeping existing messages first.
    pub fn merge(&mut self, other: ValidationErrors) {
        for (attribute, messages) in other.0 {
            self.0.entry(attribute).or_default().extend(messages);
        }
    }
}

impl fmt::Display for ValidationErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let total: usize = self.0.values().map(Vec::len).sum();
        let Some(first) = self.0.values().flatten().next() else {
            return f.write_str("The given data was invalid.");
        };

        match total - 1 {
            0 => f.write_str(first),
            1 => write!(f, "{first} (and 1 more error)"),
            more => write!(f, "{first} (and {more} more errors)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_messages_accumulate_per_attribute() {
        let mut errors = ValidationErrors::new();
        errors.add("title", "The title field is required.");
        errors.add("title", "The title must be a string.");
        errors.add("status", "The selected status is invalid.");

        assert_eq!(errors.messages("title").len(), 2);
        assert!(errors.messages("body").is_empty());
        assert_eq!(errors.len(), 2);
        assert_eq!(
            serde_json::to_value(&errors).unwrap(),
            json!({
                "status": ["The selected status is invalid."],
                "title": ["The title field is required.", "The title must be a string."]
            })
        );
    }

    #[test]
    fn test_display_summarizes() {
        let mut errors = ValidationErrors::new();
        assert_eq!(errors.to_string(), "The given data was invalid.");

        errors.add("status", "The selected status is invalid.");
        errors.add("title", "The title field is required.");
        assert_eq!(
            errors.to_string(),
            "The selected status is invalid. (and 1 more error)"
        );
    }
}
