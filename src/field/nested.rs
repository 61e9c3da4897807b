//! Fields owning a sub-schema: JSON objects, repeatable JSON rows and meta key/values.
//!
//! The sub-schema is described with a fresh [`DefinitionBuilder`]. Its rules are
//! re-keyed under the parent's validation key: `parent.child` for a single
//! object and `parent.*.child` for repeatable rows.

use crate::builder::DefinitionBuilder;
use crate::core::{Result, StorageType};
use crate::field::base::{Field, FieldBase, FieldKind};
use crate::field::payload::{FieldPayload, NestedConfig, NestedFields};
use std::collections::BTreeMap;

/// Collected output of a nested builder.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubSchema {
    rules: BTreeMap<String, String>,
    fields: Option<NestedFields>,
}

impl SubSchema {
    fn prefixed_rules(&self, parent: &str, repeatable: bool) -> BTreeMap<String, String> {
        let infix = if repeatable { ".*." } else { "." };
        self.rules
            .iter()
            .map(|(key, rule)| (format!("{parent}{infix}{key}"), rule.clone()))
            .collect()
    }
}

/// Variants owning a [`SubSchema`].
pub trait Nested {
    fn sub_schema_mut(&mut self) -> &mut SubSchema;
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Json {
    schema: SubSchema,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RepeatableJson {
    schema: SubSchema,
}

/// Key/value pairs persisted through a meta relation instead of a column.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Meta {
    schema: SubSchema,
    relation: Option<String>,
}

impl FieldKind for Json {
    const STORAGE_TYPE: StorageType = StorageType::Json;
    const INPUT_TYPE: &'static str = "nested-fields";

    fn payload(&self, _base: &FieldBase) -> FieldPayload {
        FieldPayload::Nested(NestedConfig {
            fields: self.schema.fields.clone(),
            relation: None,
        })
    }

    fn nested_rules(&self, validation_key: &str) -> BTreeMap<String, String> {
        self.schema.prefixed_rules(validation_key, false)
    }
}

impl FieldKind for RepeatableJson {
    const STORAGE_TYPE: StorageType = StorageType::Json;
    const INPUT_TYPE: &'static str = "repeatable-nested-fields";

    fn payload(&self, _base: &FieldBase) -> FieldPayload {
        FieldPayload::Nested(NestedConfig {
            fields: self.schema.fields.clone(),
            relation: None,
        })
    }

    fn nested_rules(&self, validation_key: &str) -> BTreeMap<String, String> {
        self.schema.prefixed_rules(validation_key, true)
    }
}

impl FieldKind for Meta {
    const STORAGE_TYPE: StorageType = StorageType::Meta;
    const INPUT_TYPE: &'static str = "nested-fields";

    fn init(base: &mut FieldBase) {
        base.fillable = false;
    }

    fn payload(&self, _base: &FieldBase) -> FieldPayload {
        FieldPayload::Nested(NestedConfig {
            fields: self.schema.fields.clone(),
            relation: self.relation.clone(),
        })
    }

    fn nested_rules(&self, validation_key: &str) -> BTreeMap<String, String> {
        self.schema.prefixed_rules(validation_key, false)
    }
}

impl Nested for Json {
    fn sub_schema_mut(&mut self) -> &mut SubSchema {
        &mut self.schema
    }
}

impl Nested for RepeatableJson {
    fn sub_schema_mut(&mut self) -> &mut SubSchema {
        &mut self.schema
    }
}

impl Nested for Meta {
    fn sub_schema_mut(&mut self) -> &mut SubSchema {
        &mut self.schema
    }
}

impl<K: FieldKind + Nested> Field<K> {
    /// Describe the sub-schema; its fields are flattened across groups.
    pub fn fields<F>(self, build: F) -> Self
    where
        F: FnOnce(&mut DefinitionBuilder) -> Result<()>,
    {
        self.fields_in(DefinitionBuilder::new(), false, build)
    }

    /// Describe the sub-schema keeping its field groups.
    pub fn grouped_fields<F>(self, build: F) -> Self
    where
        F: FnOnce(&mut DefinitionBuilder) -> Result<()>,
    {
        self.fields_in(DefinitionBuilder::new(), true, build)
    }

    /// Describe the sub-schema on a caller-prepared builder.
    ///
    /// A failing callback is recorded and reported when this field is added
    /// to its parent builder.
    pub fn fields_in<F>(mut self, mut builder: DefinitionBuilder, use_groups: bool, build: F) -> Self
    where
        F: FnOnce(&mut DefinitionBuilder) -> Result<()>,
    {
        if let Err(err) = build(&mut builder) {
            self.base.flag_defect(format!("nested fields could not be defined: {err}"));
            return self;
        }

        let definition = builder.full_definition();
        let fields = if use_groups {
            NestedFields::Grouped(definition.field_groups)
        } else {
            NestedFields::Flat(definition.field_groups.into_fields())
        };

        let schema = self.kind.sub_schema_mut();
        schema.rules = definition.rules;
        schema.fields = Some(fields);
        self
    }
}

impl Field<Meta> {
    /// Meta field stored through `relation`.
    pub fn for_relation(relation: &str, name: &str) -> Self {
        Self::new(name).relation_name(relation)
    }

    pub fn relation_name(mut self, relation: &str) -> Self {
        self.kind.relation = Some(relation.to_string());
        self
    }
}
