//! Definition builder.
//!
//! Accumulates finalized field descriptors into groups and derives the guard
//! lists and validation rules of an entity type from them. The builder is
//! handed to an entity's `define` hook by the compiler; the hook adds its
//! fields and hands the builder back.

mod definition;

pub use definition::{
    CompiledDefinition, FieldGroup, FieldGroups, FlatDefinition, Guards, ModelInfo, Tabbed,
};

use crate::compiler::CompilationContext;
use crate::config::SchemaConfig;
use crate::core::{Result, SchemaError};
use crate::field::{FieldDescriptor, FieldSpec};
use crate::i18n::Localizer;
use crate::naming::pluralize;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::time::Duration;

const UNNAMED_FIELD: &str = "unnamed field";

#[derive(Debug, Clone)]
pub struct DefinitionBuilder {
    entity_type: Option<String>,
    model_info: ModelInfo,
    groups: FieldGroups,
    default_group: String,
    fields: Vec<FieldDescriptor>,
    guards: Guards,
    rules: BTreeMap<String, String>,
    options: Map<String, Value>,
    cacheable: bool,
    cache_ttl: Duration,
    supports_tags: bool,
    context: CompilationContext,
}

impl DefinitionBuilder {
    /// Unbound builder seeded with the stock field groups.
    pub fn new() -> Self {
        Self::with_config(&SchemaConfig::default())
    }

    pub fn with_config(config: &SchemaConfig) -> Self {
        Self {
            entity_type: None,
            model_info: ModelInfo::default(),
            groups: FieldGroups::new(config.field_groups.clone()),
            default_group: config.default_field_group.clone(),
            fields: Vec::new(),
            guards: Guards::default(),
            rules: BTreeMap::new(),
            options: Map::new(),
            cacheable: false,
            cache_ttl: config.cache_ttl,
            supports_tags: false,
            context: CompilationContext::default(),
        }
    }

    /// Bind to an entity type and resolve its display names.
    ///
    /// Names come from `models.<type>.singular|plural`, falling back to the
    /// type name and its plural.
    pub fn for_entity(mut self, type_name: &str, localizer: &dyn Localizer) -> Self {
        let key = type_name.to_lowercase();
        let singular = format!("models.{key}.singular");
        let plural = format!("models.{key}.plural");

        self.model_info.name = Some(
            localizer
                .get(&singular)
                .filter(|_| localizer.has(&singular))
                .unwrap_or_else(|| type_name.to_string()),
        );
        self.model_info.plural_name = Some(
            localizer
                .get(&plural)
                .filter(|_| localizer.has(&plural))
                .unwrap_or_else(|| pluralize(type_name)),
        );
        self.entity_type = Some(type_name.to_string());
        self
    }

    pub(crate) fn with_tag_support(mut self, supports_tags: bool) -> Self {
        self.supports_tags = supports_tags;
        self
    }

    pub(crate) fn with_context(mut self, context: CompilationContext) -> Self {
        self.context = context;
        self
    }

    pub fn entity_type(&self) -> Option<&str> {
        self.entity_type.as_deref()
    }

    pub fn model_info(&self) -> &ModelInfo {
        &self.model_info
    }

    /// Compilation in progress; pass it on when compiling other entities from a hook.
    pub fn context(&self) -> &CompilationContext {
        &self.context
    }

    /// Register a group. Re-registering a key replaces it in place.
    /// `order` defaults to the number of groups known before the call.
    pub fn add_group(
        &mut self,
        key: &str,
        label: &str,
        description: Option<&str>,
        tabbed: Tabbed,
        order: Option<i64>,
    ) -> &mut Self {
        let order = order.unwrap_or(self.groups.len() as i64);
        self.groups.upsert(FieldGroup::new(
            key,
            label,
            description.unwrap_or_default(),
            tabbed,
            order,
        ));
        self
    }

    /// Finalize and register a field.
    ///
    /// A field registered under an existing name replaces the earlier one,
    /// keeping its position.
    pub fn add_field(&mut self, field: impl FieldSpec) -> Result<&mut Self> {
        self.register(&field)?;
        Ok(self)
    }

    /// Register fields in order. The first failure aborts; earlier fields stay registered.
    pub fn add_fields(&mut self, fields: Vec<Box<dyn FieldSpec>>) -> Result<&mut Self> {
        for field in &fields {
            self.register(field.as_ref())?;
        }
        Ok(self)
    }

    pub fn set_options(&mut self, options: Map<String, Value>) -> &mut Self {
        self.options = options;
        self
    }

    /// Cache the compiled definition for `ttl` (default from configuration).
    ///
    /// Caching needs a tag-capable cache store, since cached definitions are
    /// invalidated by flushing their shared tag.
    pub fn set_cacheable(&mut self, cacheable: bool, ttl: Option<Duration>) -> Result<&mut Self> {
        if cacheable && !self.supports_tags {
            return Err(SchemaError::Precondition(
                "the definition cache store does not support tagging".to_string(),
            ));
        }

        self.cacheable = cacheable;
        if let Some(ttl) = ttl {
            self.cache_ttl = ttl;
        }
        Ok(self)
    }

    pub fn is_cacheable(&self) -> bool {
        self.cacheable && self.supports_tags
    }

    pub fn cache_ttl(&self) -> Duration {
        self.cache_ttl
    }

    pub fn rules(&self) -> &BTreeMap<String, String> {
        &self.rules
    }

    pub fn guards(&self) -> &Guards {
        &self.guards
    }

    /// Grouped view; fields are appended to their group in registration order.
    pub fn full_definition(&self) -> CompiledDefinition {
        let mut groups = self.groups.clone();
        for field in &self.fields {
            if let Some(group) = groups.get_mut(&field.group) {
                group.fields.push(field.clone());
            }
        }

        CompiledDefinition {
            model_info: self.model_info.clone(),
            guards: self.guards.clone(),
            rules: self.rules.clone(),
            field_groups: groups,
            options: self.options.clone(),
        }
    }

    pub fn flat_definition(&self) -> FlatDefinition {
        FlatDefinition::new(self.fields.clone())
    }

    fn register(&mut self, field: &dyn FieldSpec) -> Result<()> {
        let mut definition = field.definition();

        if definition.name.is_empty() {
            return Err(SchemaError::invalid_field(UNNAMED_FIELD, "name is required"));
        }
        if definition.input_type.is_empty() {
            return Err(SchemaError::invalid_field(&definition.name, "input_type is required"));
        }
        if let Some(defect) = field.defect() {
            return Err(SchemaError::invalid_field(&definition.name, defect));
        }

        if definition.hidden {
            Guards::push_unique(&mut self.guards.hidden, &definition.name);
        }

        if definition.input_hidden {
            definition.hidden = true;
            definition.input_hidden = false;
        }

        if definition.fillable {
            Guards::push_unique(&mut self.guards.fillable, &definition.name);
        }

        self.rules.extend(field.nested_rules());

        if !definition.rule_string.is_empty() {
            self.rules
                .insert(definition.validation_key.clone(), definition.rule_string.clone());
        }

        let group = match field.group_key() {
            Some(key) => key.to_string(),
            None => field
                .preferred_group()
                .filter(|key| self.groups.contains(key))
                .map(str::to_string)
                .unwrap_or_else(|| self.default_group.clone()),
        };
        if !self.groups.contains(&group) {
            return Err(SchemaError::invalid_field(
                &definition.name,
                format!("group key {group} not configured"),
            ));
        }
        definition.group = group;

        match self.fields.iter_mut().find(|existing| existing.name == definition.name) {
            Some(existing) => *existing = definition,
            None => self.fields.push(definition),
        }
        Ok(())
    }
}

impl Default for DefinitionBuilder {
    fn default() -> Self {
        Self::new()
    }
}
