use crate::core::StorageType;
use crate::field::payload::ExtraData;
use serde::Serialize;
use serde_json::Value;

/// Finalized, immutable description of one field.
///
/// Produced by a field builder's `definition()` and stored by the
/// [`DefinitionBuilder`](crate::builder::DefinitionBuilder); every key of the
/// wire format is always present.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldDescriptor {
    pub name: String,
    #[serde(rename = "type")]
    pub storage_type: StorageType,
    pub input_type: String,
    pub label: Option<String>,
    pub description: Option<String>,
    pub placeholder: Option<String>,
    #[serde(rename = "default")]
    pub default_value: Value,
    pub required: bool,
    pub rule_string: String,
    pub validation_key: String,
    pub show_label: bool,
    pub hidden: bool,
    /// Input-only hiding marker; folded into `hidden` once registered.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub input_hidden: bool,
    pub hidden_on: Vec<String>,
    pub fillable: bool,
    pub group: String,
    pub extra_data: ExtraData,
}

impl FieldDescriptor {
    pub fn is(&self, storage_type: StorageType) -> bool {
        self.storage_type == storage_type
    }

    /// Sub-field descriptors of a nested field.
    pub fn nested_descriptors(&self) -> Vec<&FieldDescriptor> {
        self.extra_data
            .nested()
            .and_then(|nested| nested.fields.as_ref())
            .map(|fields| fields.descriptors())
            .unwrap_or_default()
    }
}
