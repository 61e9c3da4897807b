use crate::core::StorageType;
use crate::field::FieldDescriptor;
use serde::ser::{SerializeMap, Serializer};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Tab behaviour of a group: plain, or part of the named tab set.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Tabbed {
    #[default]
    No,
    Group(String),
}

impl Serialize for Tabbed {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::No => serializer.serialize_bool(false),
            Self::Group(key) => serializer.serialize_str(key),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldGroup {
    pub key: String,
    pub label: String,
    pub description: String,
    pub tabbed: Tabbed,
    pub order: i64,
    pub fields: Vec<FieldDescriptor>,
}

impl FieldGroup {
    pub fn new(key: &str, label: &str, description: &str, tabbed: Tabbed, order: i64) -> Self {
        Self {
            key: key.to_string(),
            label: label.to_string(),
            description: description.to_string(),
            tabbed,
            order,
            fields: Vec::new(),
        }
    }
}

/// Groups in registration order, serialized as a `key → group` map.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldGroups(Vec<FieldGroup>);

impl FieldGroups {
    pub fn new(groups: Vec<FieldGroup>) -> Self {
        Self(groups)
    }

    pub fn get(&self, key: &str) -> Option<&FieldGroup> {
        self.0.iter().find(|group| group.key == key)
    }

    pub(crate) fn get_mut(&mut self, key: &str) -> Option<&mut FieldGroup> {
        self.0.iter_mut().find(|group| group.key == key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// Insert, or replace in place when the key already exists.
    pub(crate) fn upsert(&mut self, group: FieldGroup) {
        match self.get_mut(&group.key) {
            Some(existing) => *existing = group,
            None => self.0.push(group),
        }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldGroup> {
        self.0.iter()
    }

    /// Every field of every group, groups taken in registration order.
    pub fn into_fields(self) -> Vec<FieldDescriptor> {
        self.0.into_iter().flat_map(|group| group.fields).collect()
    }
}

impl Serialize for FieldGroups {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for group in &self.0 {
            map.serialize_entry(&group.key, group)?;
        }
        map.end()
    }
}

/// Attribute name lists derived from field flags. Each name appears once.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Guards {
    pub fillable: Vec<String>,
    pub hidden: Vec<String>,
}

impl Guards {
    pub(crate) fn push_unique(list: &mut Vec<String>, name: &str) {
        if !list.iter().any(|existing| existing == name) {
            list.push(name.to_string());
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ModelInfo {
    pub name: Option<String>,
    pub plural_name: Option<String>,
}

/// Grouped definition of an entity type: the document served to form renderers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompiledDefinition {
    pub model_info: ModelInfo,
    pub guards: Guards,
    pub rules: BTreeMap<String, String>,
    pub field_groups: FieldGroups,
    pub options: Map<String, Value>,
}

/// Field name → descriptor, in registration order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlatDefinition(Vec<FieldDescriptor>);

impl FlatDefinition {
    pub fn new(fields: Vec<FieldDescriptor>) -> Self {
        Self(fields)
    }

    pub fn get(&self, name: &str) -> Option<&FieldDescriptor> {
        self.0.iter().find(|field| field.name == name)
    }

    pub fn storage_type(&self, name: &str) -> Option<StorageType> {
        self.get(name).map(|field| field.storage_type)
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldDescriptor> {
        self.0.iter()
    }

    pub fn of_type(&self, storage_type: StorageType) -> impl Iterator<Item = &FieldDescriptor> {
        self.0.iter().filter(move |field| field.storage_type == storage_type)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for FlatDefinition {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for field in &self.0 {
            map.serialize_entry(&field.name, field)?;
        }
        map.end()
    }
}
