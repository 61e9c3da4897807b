//! Typed, variant-specific configuration carried in a descriptor's `extra_data`.
//!
//! Every variant owns one payload shape. The open JSON map only exists at the
//! serialization boundary (`ExtraData::to_json`) and for user supplied extras.

use crate::builder::FieldGroups;
use crate::field::descriptor::FieldDescriptor;
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use serde_json::{Map, Value, json};

/// Ordered `key → label` option list of a choice field.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OptionList(Vec<(String, String)>);

impl OptionList {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn from_pairs<K, L>(items: impl IntoIterator<Item = (K, L)>) -> Self
    where
        K: Into<String>,
        L: Into<String>,
    {
        Self(items.into_iter().map(|(k, l)| (k.into(), l.into())).collect())
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(key, _)| key.as_str())
    }

    pub fn label(&self, key: &str) -> Option<&str> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, label)| label.as_str())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, L: Into<String>, const N: usize> From<[(K, L); N]> for OptionList {
    fn from(items: [(K, L); N]) -> Self {
        Self::from_pairs(items)
    }
}

impl<K: Into<String>, L: Into<String>> From<Vec<(K, L)>> for OptionList {
    fn from(items: Vec<(K, L)>) -> Self {
        Self::from_pairs(items)
    }
}

impl Serialize for OptionList {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (key, label) in &self.0 {
            map.serialize_entry(key, label)?;
        }
        map.end()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct LengthBounds {
    pub min: Option<usize>,
    pub max: Option<usize>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChoiceConfig {
    pub options: Option<OptionList>,
    pub styling_format: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TemporalConfig {
    pub timezone: String,
    pub min: Option<String>,
    pub max: Option<String>,
}

impl Default for TemporalConfig {
    fn default() -> Self {
        Self {
            timezone: "UTC".to_string(),
            min: None,
            max: None,
        }
    }
}

/// Sub-schema owned by a nested field, flattened or kept in its groups.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum NestedFields {
    Flat(Vec<FieldDescriptor>),
    Grouped(FieldGroups),
}

impl NestedFields {
    /// All descriptors regardless of grouping, in registration order.
    pub fn descriptors(&self) -> Vec<&FieldDescriptor> {
        match self {
            Self::Flat(fields) => fields.iter().collect(),
            Self::Grouped(groups) => groups.iter().flat_map(|g| g.fields.iter()).collect(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct NestedConfig {
    pub fields: Option<NestedFields>,
    /// Meta relation the nested key/values are stored through.
    pub relation: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchConfig {
    pub multiple: bool,
    pub prefetch: bool,
    pub search_field: String,
    pub display_field: String,
    pub extra_display_field: Option<String>,
    pub display_field_labels: Option<Value>,
}

impl SearchConfig {
    pub fn single() -> Self {
        Self {
            multiple: false,
            prefetch: false,
            search_field: "title".to_string(),
            display_field: "title".to_string(),
            extra_display_field: None,
            display_field_labels: None,
        }
    }

    pub fn multiple() -> Self {
        Self {
            multiple: true,
            ..Self::single()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RelationConfig {
    pub relation: Option<String>,
    pub related_to: Option<String>,
    pub endpoint: Option<String>,
    pub parent_model: Option<String>,
    pub search: Option<SearchConfig>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaType {
    Files,
    Images,
}

impl MediaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Files => "files",
            Self::Images => "images",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MediaConfig {
    pub media_type: MediaType,
    pub mime_types: Vec<String>,
    pub collection: Option<String>,
    pub multiple: Option<bool>,
    pub upload_endpoint: Option<String>,
}

/// Closed set of variant payloads.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum FieldPayload {
    #[default]
    None,
    Text(LengthBounds),
    Toggle { styling_format: Option<String> },
    Choice(ChoiceConfig),
    Temporal(TemporalConfig),
    Confirmation { match_field: Option<String> },
    Nested(NestedConfig),
    Relation(RelationConfig),
    Media(MediaConfig),
}

impl FieldPayload {
    fn to_json(&self) -> Map<String, Value> {
        let mut map = Map::new();
        match self {
            Self::None => {}
            Self::Text(bounds) => {
                if let Some(max) = bounds.max {
                    map.insert("max".into(), json!(max));
                }
                if let Some(min) = bounds.min {
                    map.insert("min".into(), json!(min));
                }
            }
            Self::Toggle { styling_format } => {
                if let Some(format) = styling_format {
                    map.insert("styling_format".into(), json!(format));
                }
            }
            Self::Choice(config) => {
                if let Some(options) = &config.options {
                    map.insert("options".into(), json!(options));
                }
                if let Some(format) = &config.styling_format {
                    map.insert("styling_format".into(), json!(format));
                }
            }
            Self::Temporal(config) => {
                map.insert("timezone".into(), json!(config.timezone));
                if let Some(min) = &config.min {
                    map.insert("min".into(), json!(min));
                }
                if let Some(max) = &config.max {
                    map.insert("max".into(), json!(max));
                }
            }
            Self::Confirmation { match_field } => {
                if let Some(field) = match_field {
                    map.insert("match_field".into(), json!(field));
                }
            }
            Self::Nested(config) => {
                if let Some(relation) = &config.relation {
                    map.insert("relation".into(), json!(relation));
                }
                if let Some(fields) = &config.fields {
                    map.insert("fields".into(), json!(fields));
                }
            }
            Self::Relation(config) => {
                if let Some(search) = &config.search {
                    map.insert("multiple".into(), json!(search.multiple));
                    map.insert("prefetch".into(), json!(search.prefetch));
                    map.insert("search_field".into(), json!(search.search_field));
                    map.insert("display_field".into(), json!(search.display_field));
                    map.insert(
                        "extra_display_field".into(),
                        search.extra_display_field.as_ref().map_or(json!(false), |f| json!(f)),
                    );
                    map.insert(
                        "display_field_labels".into(),
                        search.display_field_labels.clone().unwrap_or(json!(false)),
                    );
                }
                if let Some(relation) = &config.relation {
                    map.insert("relation".into(), json!(relation));
                }
                if let Some(related_to) = &config.related_to {
                    map.insert("related_to".into(), json!(related_to));
                }
                if let Some(endpoint) = &config.endpoint {
                    map.insert("endpoint".into(), json!(endpoint));
                }
                if let Some(parent) = &config.parent_model {
                    map.insert("parent_model".into(), json!(parent));
                }
            }
            Self::Media(config) => {
                map.insert("media_type".into(), json!(config.media_type.as_str()));
                map.insert("tus".into(), json!(config.upload_endpoint.is_some()));
                map.insert(
                    "tus_endpoint".into(),
                    json!(config.upload_endpoint.clone().unwrap_or_default()),
                );
                map.insert("mime_types".into(), json!(config.mime_types));
                map.insert("collection".into(), json!(config.collection));
                if let Some(multiple) = config.multiple {
                    map.insert("multiple".into(), json!(multiple));
                }
            }
        }
        map
    }
}

/// `extra_data` of a descriptor: the typed payload plus user supplied extras.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtraData {
    pub payload: FieldPayload,
    pub custom: Map<String, Value>,
}

impl ExtraData {
    /// Wire form: payload keys, with custom extras deep-merged on top.
    pub fn to_json(&self) -> Map<String, Value> {
        let mut map = self.payload.to_json();
        merge_json(&mut map, &self.custom);
        map
    }

    pub fn get(&self, key: &str) -> Option<Value> {
        self.to_json().remove(key)
    }

    pub fn nested(&self) -> Option<&NestedConfig> {
        match &self.payload {
            FieldPayload::Nested(config) => Some(config),
            _ => None,
        }
    }

    pub fn relation(&self) -> Option<&RelationConfig> {
        match &self.payload {
            FieldPayload::Relation(config) => Some(config),
            _ => None,
        }
    }

    pub fn media(&self) -> Option<&MediaConfig> {
        match &self.payload {
            FieldPayload::Media(config) => Some(config),
            _ => None,
        }
    }
}

impl Serialize for ExtraData {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

/// Recursive merge: objects merge key by key, anything else is replaced.
pub fn merge_json(target: &mut Map<String, Value>, patch: &Map<String, Value>) {
    for (key, value) in patch {
        match (target.get_mut(key), value) {
            (Some(Value::Object(existing)), Value::Object(incoming)) => merge_json(existing, incoming),
            _ => {
                target.insert(key.clone(), value.clone());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_replaces_lists_and_merges_maps() {
        let mut target = json!({"mime_types": ["a", "b", "c"], "nested": {"x": 1, "y": 2}})
            .as_object()
            .cloned()
            .unwrap();
        let patch = json!({"mime_types": ["z"], "nested": {"y": 3}})
            .as_object()
            .cloned()
            .unwrap();

        merge_json(&mut target, &patch);

        assert_eq!(target["mime_types"], json!(["z"]));
        assert_eq!(target["nested"], json!({"x": 1, "y": 3}));
    }

    #[test]
    fn test_option_list_keeps_insertion_order() {
        let options = OptionList::from([("draft", "Draft"), ("live", "Live"), ("archived", "Archived")]);
        let encoded = serde_json::to_string(&options).unwrap();
        assert_eq!(encoded, r#"{"draft":"Draft","live":"Live","archived":"Archived"}"#);
        assert_eq!(options.label("live"), Some("Live"));
    }

    #[test]
    fn test_custom_extras_override_payload_keys() {
        let extra = ExtraData {
            payload: FieldPayload::Text(LengthBounds { min: None, max: Some(255) }),
            custom: json!({"max": 80, "hint": "short"}).as_object().cloned().unwrap(),
        };

        assert_eq!(extra.get("max"), Some(json!(80)));
        assert_eq!(extra.get("hint"), Some(json!("short")));
    }

    #[test]
    fn test_search_relation_payload_uses_false_for_unset_display_extras() {
        let extra = ExtraData {
            payload: FieldPayload::Relation(RelationConfig {
                search: Some(SearchConfig::single()),
                ..RelationConfig::default()
            }),
            custom: Map::new(),
        };

        let json = extra.to_json();
        assert_eq!(json["extra_display_field"], json!(false));
        assert_eq!(json["display_field_labels"], json!(false));
        assert_eq!(json["multiple"], json!(false));
    }
}
