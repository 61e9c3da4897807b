//! Attribute transformations applied around validation and storage.

use crate::builder::FlatDefinition;
use crate::core::dates::to_storage_format;
use crate::core::{Attributes, ENUM_DELIMITER, StorageType, is_json_encoded};
use serde_json::Value;
use std::collections::BTreeMap;

/// Storage form of `raw`.
///
/// ENUM arrays are joined with `;` after dropping `null` and empty entries;
/// JSON values not already encoded are serialized. Other attributes pass through.
pub fn transform_attributes(flat: &FlatDefinition, mut raw: Attributes) -> Attributes {
    for (name, value) in raw.iter_mut() {
        match flat.storage_type(name) {
            Some(StorageType::Json) => {
                if !value.is_null() && !is_json_encoded(value) {
                    *value = Value::String(value.to_string());
                }
            }
            Some(StorageType::Enum) => {
                if let Value::Array(items) = value {
                    *value = Value::String(join_enum_values(items));
                }
            }
            _ => {}
        }
    }
    raw
}

/// Validation form of `raw`: encoded JSON attributes are decoded.
///
/// ENUM strings are left joined, so multi-value rules see the stored form.
pub fn transform_attributes_for_validation(flat: &FlatDefinition, mut raw: Attributes) -> Attributes {
    for (name, value) in raw.iter_mut() {
        if flat.storage_type(name) != Some(StorageType::Json) {
            continue;
        }
        if let Value::String(encoded) = value {
            if let Ok(decoded) = serde_json::from_str::<Value>(encoded) {
                *value = decoded;
            }
        }
    }
    raw
}

fn join_enum_values(items: &[Value]) -> String {
    items
        .iter()
        .filter_map(|item| match item {
            Value::Null => None,
            Value::String(s) if s.is_empty() => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        })
        .collect::<Vec<_>>()
        .join(ENUM_DELIMITER)
}

/// Rules whose top-level key is a present attribute or a fillable name.
pub fn select_rules(
    rules: &BTreeMap<String, String>,
    attributes: &Attributes,
    fillable: &[String],
) -> BTreeMap<String, String> {
    rules
        .iter()
        .filter(|(key, _)| {
            let top = key.split('.').next().unwrap_or(key);
            attributes.contains_key(top) || fillable.iter().any(|name| name == top)
        })
        .map(|(key, rule)| (key.clone(), rule.clone()))
        .collect()
}

/// Re-render the named date attributes in UTC storage form.
///
/// Empty values and values that do not parse as dates are left for the
/// `date` rules to report.
pub fn canonicalize_dates<'a>(attributes: &mut Attributes, date_fields: impl IntoIterator<Item = &'a str>) {
    for field in date_fields {
        let Some(Value::String(raw)) = attributes.get(field) else {
            continue;
        };
        if let Some(canonical) = to_storage_format(raw) {
            attributes.insert(field.to_string(), Value::String(canonical));
        }
    }
}

/// Keep only fillable attributes.
pub fn filter_fillable(attributes: Attributes, fillable: &[String]) -> Attributes {
    attributes
        .into_iter()
        .filter(|(key, _)| fillable.iter().any(|name| name == key))
        .collect()
}

/// Emptiness as used to decide whether a synchronized attribute was sent.
pub fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Bool(b) => !b,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty() || s == "0",
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::builder::DefinitionBuilder;
    use crate::field::{CheckboxField, JsonField, TextField};
    use serde_json::json;

    fn flat() -> FlatDefinition {
        let mut builder = DefinitionBuilder::new();
        builder
            .add_field(TextField::new("title"))
            .unwrap()
            .add_field(CheckboxField::new("tags").options([("a", "A"), ("b", "B")]))
            .unwrap()
            .add_field(JsonField::new("settings"))
            .unwrap();
        builder.flat_definition()
    }

    fn attrs(value: Value) -> Attributes {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_enum_arrays_are_joined_without_blanks() {
        let out = transform_attributes(&flat(), attrs(json!({"tags": ["a", "", null, "b"]})));
        assert_eq!(out["tags"], json!("a;b"));
    }

    #[test]
    fn test_json_values_are_encoded_once() {
        let flat = flat();
        let out = transform_attributes(&flat, attrs(json!({"settings": {"dark": true}, "title": "x"})));
        assert_eq!(out["settings"], json!("{\"dark\":true}"));
        assert_eq!(out["title"], json!("x"));

        let again = transform_attributes(&flat, out.clone());
        assert_eq!(again, out);

        let decoded = transform_attributes_for_validation(&flat, out);
        assert_eq!(decoded["settings"], json!({"dark": true}));
    }

    #[test]
    fn test_validation_form_leaves_enum_strings_joined() {
        let out = transform_attributes_for_validation(&flat(), attrs(json!({"tags": "a;b"})));
        assert_eq!(out["tags"], json!("a;b"));
    }

    #[test]
    fn test_rule_selection_uses_presence_or_fillable() {
        let rules: BTreeMap<String, String> = [
            ("a".to_string(), "required".to_string()),
            ("b".to_string(), "required".to_string()),
            ("c.*".to_string(), "nullable".to_string()),
        ]
        .into();
        let selected = select_rules(&rules, &attrs(json!({"a": 1})), &["a".into(), "b".into()]);
        assert_eq!(selected.keys().collect::<Vec<_>>(), vec!["a", "b"]);

        let selected = select_rules(&rules, &attrs(json!({"c": ["x"]})), &[]);
        assert!(selected.contains_key("c.*"));
    }

    #[test]
    fn test_dates_are_canonicalized_to_utc() {
        let mut attributes = attrs(json!({"published_at": "2024-05-01T10:00:00+02:00", "other": "x"}));
        canonicalize_dates(&mut attributes, ["published_at", "missing"]);
        assert_eq!(attributes["published_at"], json!("2024-05-01 08:00:00"));
    }
}
