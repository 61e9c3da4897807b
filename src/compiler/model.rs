use super::{CompilationContext, CompiledViews, DefinitionCompiler, Entity};
use crate::builder::{CompiledDefinition, FlatDefinition, Guards};
use crate::core::{Attributes, Result, SchemaError, StorageType};
use crate::field::FieldDescriptor;
use crate::pipeline::transform::{
    canonicalize_dates, filter_fillable, select_rules, transform_attributes,
    transform_attributes_for_validation,
};
use crate::relation::RelationInfo;
use crate::store::RecordId;
use crate::validation::Validator;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;

/// An entity instance: attributes plus the compiled definition of its type.
pub struct Model<E: Entity> {
    compiler: Arc<DefinitionCompiler>,
    entity: E,
    id: Option<RecordId>,
    attributes: Attributes,
    fillable: Vec<String>,
    hidden: Vec<String>,
    rules: BTreeMap<String, String>,
    full: Option<Arc<CompiledDefinition>>,
    flat: Option<Arc<FlatDefinition>>,
    /// Validate in [`prepare_for_save`](Self::prepare_for_save).
    pub validate_on_save: bool,
}

impl<E: Entity> Model<E> {
    pub fn new(compiler: Arc<DefinitionCompiler>) -> Result<Self> {
        Self::with_entity(compiler, E::default())
    }

    pub fn with_entity(compiler: Arc<DefinitionCompiler>, entity: E) -> Result<Self> {
        let mut model = Self {
            compiler,
            id: None,
            attributes: Map::new(),
            fillable: entity.fillable(),
            hidden: entity.hidden(),
            rules: entity.rules(),
            full: None,
            flat: None,
            validate_on_save: entity.validate_on_save(),
            entity,
        };

        if E::DEFINE_ON_CONSTRUCT {
            model.compile_definition(false)?;
        }
        Ok(model)
    }

    /// A model for a stored record.
    pub fn from_record(
        compiler: Arc<DefinitionCompiler>,
        id: RecordId,
        attributes: Attributes,
    ) -> Result<Self> {
        let mut model = Self::new(compiler)?;
        model.id = Some(id);
        model.attributes = attributes;
        Ok(model)
    }

    pub fn entity(&self) -> &E {
        &self.entity
    }

    pub fn id(&self) -> Option<RecordId> {
        self.id
    }

    pub fn exists(&self) -> bool {
        self.id.is_some()
    }

    pub(crate) fn set_id(&mut self, id: RecordId) {
        self.id = Some(id);
    }

    pub fn compile_definition(&mut self, force: bool) -> Result<()> {
        self.compile_definition_in(&CompilationContext::new(), force)
    }

    /// Compile within an existing context, e.g. from another entity's `define`.
    pub fn compile_definition_in(&mut self, context: &CompilationContext, force: bool) -> Result<()> {
        if !force && self.is_defined() {
            return Ok(());
        }

        if let Some(CompiledViews { full, flat }) = self.compiler.compile(&self.entity, context, force)? {
            self.set_field_definition(full, flat);
        }
        Ok(())
    }

    pub fn is_defined(&self) -> bool {
        let full = self
            .full
            .as_ref()
            .is_some_and(|full| !full.field_groups.is_empty());
        let flat = self.flat.as_ref().is_some_and(|flat| !flat.is_empty());
        full && flat
    }

    /// Attach a compiled definition.
    ///
    /// Guard names are added once each; compiled rules fill in keys the
    /// entity does not define itself.
    pub fn set_field_definition(&mut self, full: Arc<CompiledDefinition>, flat: Arc<FlatDefinition>) {
        for name in &full.guards.fillable {
            Guards::push_unique(&mut self.fillable, name);
        }
        for name in &full.guards.hidden {
            Guards::push_unique(&mut self.hidden, name);
        }
        for (key, rule) in &full.rules {
            self.rules.entry(key.clone()).or_insert_with(|| rule.clone());
        }

        self.full = Some(full);
        self.flat = Some(flat);
    }

    pub fn full_definition(&mut self) -> Result<Arc<CompiledDefinition>> {
        if !self.is_defined() {
            self.compile_definition(false)?;
        }
        self.full
            .clone()
            .ok_or_else(|| SchemaError::Precondition(format!("{} has no definition", E::TYPE_NAME)))
    }

    pub fn flat_definition(&mut self) -> Result<Arc<FlatDefinition>> {
        if self.flat.as_ref().is_none_or(|flat| flat.is_empty()) {
            self.compile_definition(false)?;
        }
        self.flat
            .clone()
            .ok_or_else(|| SchemaError::Precondition(format!("{} has no definition", E::TYPE_NAME)))
    }

    /// Default value of every field, by name.
    pub fn field_defaults(&mut self) -> Result<Map<String, Value>> {
        let flat = self.flat_definition()?;
        Ok(flat
            .iter()
            .map(|field| (field.name.clone(), field.default_value.clone()))
            .collect())
    }

    pub fn field_default(&mut self, name: &str) -> Result<Option<Value>> {
        let flat = self.flat_definition()?;
        Ok(flat.get(name).map(|field| field.default_value.clone()))
    }

    /// HASMANY and MANYTOMANY fields.
    pub fn remote_relation_fields(&mut self) -> Result<Vec<FieldDescriptor>> {
        let flat = self.flat_definition()?;
        Ok(flat
            .iter()
            .filter(|field| field.storage_type.is_remote_relation())
            .cloned()
            .collect())
    }

    /// Relation by name, falling back to its plural.
    pub fn relation_info(&self, name: &str) -> Result<RelationInfo> {
        self.entity.relations().require(name).cloned()
    }

    pub fn fillable(&self) -> &[String] {
        &self.fillable
    }

    pub fn hidden(&self) -> &[String] {
        &self.hidden
    }

    pub fn rules(&self) -> &BTreeMap<String, String> {
        &self.rules
    }

    pub fn set_rules(&mut self, rules: BTreeMap<String, String>) {
        self.rules = rules;
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    pub fn get_attribute(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    pub fn set_attribute(&mut self, name: &str, value: Value) {
        self.attributes.insert(name.to_string(), value);
    }

    /// Assign attributes as given; filtering is up to [`prepare_attributes`](Self::prepare_attributes).
    pub fn fill(&mut self, attributes: Attributes) {
        self.attributes.extend(attributes);
    }

    /// Canonicalize date attributes to UTC and, when `filter_fillable`,
    /// drop every non-fillable key.
    pub fn prepare_attributes(&mut self, mut input: Attributes, filter_fillable_keys: bool) -> Result<Attributes> {
        if !self.is_defined() {
            self.compile_definition(false)?;
        }

        let mut date_fields: Vec<String> = self
            .flat
            .as_ref()
            .map(|flat| {
                flat.of_type(StorageType::Timestamp)
                    .map(|field| field.name.clone())
                    .collect()
            })
            .unwrap_or_default();
        date_fields.extend(self.entity.dates());
        canonicalize_dates(&mut input, date_fields.iter().map(String::as_str));

        if filter_fillable_keys {
            input = filter_fillable(input, &self.fillable);
        }
        Ok(input)
    }

    pub fn transform_attributes(&mut self, raw: Attributes) -> Result<Attributes> {
        let flat = self.flat_definition()?;
        Ok(transform_attributes(&flat, raw))
    }

    pub fn transform_attributes_for_validation(&mut self, raw: Attributes) -> Result<Attributes> {
        let flat = self.flat_definition()?;
        Ok(transform_attributes_for_validation(&flat, raw))
    }

    /// Validate the current attributes against the applicable rules.
    pub fn validate(&mut self) -> Result<()> {
        let data = self.transform_attributes_for_validation(self.attributes.clone())?;
        let rules = select_rules(&self.rules, &data, &self.fillable);

        let mut validator = Validator::make(Value::Object(data), &rules);
        self.entity.before_validation(&mut validator);
        validator.validate().map(|_| ())
    }

    /// The saving hook: compile when needed, validate, then store-encode attributes.
    pub fn prepare_for_save(&mut self) -> Result<()> {
        if E::FORCE_DEFINE_ON_SAVE || !self.is_defined() {
            self.compile_definition(E::FORCE_DEFINE_ON_SAVE)?;
        }

        if self.validate_on_save {
            self.validate()?;
        }

        let flat = self.flat_definition()?;
        let raw = std::mem::take(&mut self.attributes);
        self.attributes = transform_attributes(&flat, raw);
        Ok(())
    }

    /// Attributes without hidden names, keyed by `id` first when stored.
    pub fn to_visible_json(&self) -> Value {
        let mut out = Map::new();
        if let Some(id) = self.id {
            out.insert("id".to_string(), Value::from(id));
        }
        for (name, value) in &self.attributes {
            if !self.hidden.iter().any(|hidden| hidden == name) {
                out.insert(name.clone(), value.clone());
            }
        }
        Value::Object(out)
    }
}
