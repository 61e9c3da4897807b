//! Per-entity definition compilation.
//!
//! An [`Entity`] describes its fields through `define`. The
//! [`DefinitionCompiler`] runs that hook, caches the compiled views under a
//! shared tag and guards against re-entrant compilation of the same type
//! within one [`CompilationContext`]. [`Model`] binds a compiled definition to
//! an attribute bag and runs the save-time pipeline over it.

pub mod cache;
mod model;

pub use cache::{DefinitionCache, InMemoryDefinitionCache, NullDefinitionCache, TaggedCache};
pub use model::Model;

use crate::builder::{CompiledDefinition, DefinitionBuilder, FlatDefinition};
use crate::config::SchemaConfig;
use crate::core::{Result, SchemaError};
use crate::i18n::{Localizer, NoLocalization};
use crate::relation::RelationRegistry;
use crate::validation::Validator;
use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex};
use tracing::{Level, event, info_span};

/// Grouped and flat views produced by one compilation.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledViews {
    pub full: Arc<CompiledDefinition>,
    pub flat: Arc<FlatDefinition>,
}

/// Entity types currently being compiled along one call chain.
///
/// Cloning shares the underlying set, so a context handed from a `define`
/// hook to a nested compilation sees the outer marks.
#[derive(Debug, Clone, Default)]
pub struct CompilationContext {
    compiling: Arc<Mutex<HashSet<String>>>,
}

impl CompilationContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_compiling(&self, type_name: &str) -> bool {
        self.compiling
            .lock()
            .map(|set| set.contains(type_name))
            .unwrap_or(false)
    }

    fn enter(&self, type_name: &str) -> Result<CompilingGuard> {
        let marked = self.compiling.lock()?.insert(type_name.to_string());
        Ok(CompilingGuard {
            context: self.clone(),
            type_name: type_name.to_string(),
            marked,
        })
    }
}

/// Clears the compiling mark on drop, including when `define` fails.
struct CompilingGuard {
    context: CompilationContext,
    type_name: String,
    marked: bool,
}

impl Drop for CompilingGuard {
    fn drop(&mut self) {
        if !self.marked {
            return;
        }
        if let Ok(mut set) = self.context.compiling.lock() {
            set.remove(&self.type_name);
        }
    }
}

/// Schema-backed entity type.
pub trait Entity: Default + Send + Sync + 'static {
    /// Unqualified type name; lowercased it is the cache key.
    const TYPE_NAME: &'static str;

    /// Compile as soon as a model is constructed.
    const DEFINE_ON_CONSTRUCT: bool = false;

    /// Recompile on every save, for definitions carrying dynamic data.
    const FORCE_DEFINE_ON_SAVE: bool = false;

    /// Describe the entity's fields and hand the builder back.
    fn define(&self, builder: DefinitionBuilder) -> Result<DefinitionBuilder>;

    fn relations(&self) -> RelationRegistry {
        RelationRegistry::for_entity(Self::TYPE_NAME)
    }

    /// Entity-level fillable names, merged with the definition's guards.
    fn fillable(&self) -> Vec<String> {
        Vec::new()
    }

    fn hidden(&self) -> Vec<String> {
        Vec::new()
    }

    /// Entity-level rules; they take precedence over compiled ones.
    fn rules(&self) -> BTreeMap<String, String> {
        BTreeMap::new()
    }

    /// Attributes canonicalized to UTC alongside TIMESTAMP fields.
    fn dates(&self) -> Vec<String> {
        vec!["created_at".to_string(), "updated_at".to_string()]
    }

    fn validate_on_save(&self) -> bool {
        true
    }

    fn allow_relation_changes(&self, _relation: &str) -> bool {
        false
    }

    /// Last chance to adjust the validator before it is evaluated.
    fn before_validation(&self, _validator: &mut Validator) {}
}

/// Compiles entity definitions through a shared cache.
pub struct DefinitionCompiler {
    config: SchemaConfig,
    cache: Arc<dyn DefinitionCache>,
    localizer: Arc<dyn Localizer>,
}

impl DefinitionCompiler {
    /// Compiler backed by an in-memory cache sized from `config`.
    pub fn new(config: SchemaConfig) -> Self {
        let cache = Arc::new(InMemoryDefinitionCache::new(config.cache_capacity));
        Self {
            config,
            cache,
            localizer: Arc::new(NoLocalization),
        }
    }

    pub fn with_cache(mut self, cache: Arc<dyn DefinitionCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_localizer(mut self, localizer: Arc<dyn Localizer>) -> Self {
        self.localizer = localizer;
        self
    }

    pub fn config(&self) -> &SchemaConfig {
        &self.config
    }

    pub fn cache(&self) -> &Arc<dyn DefinitionCache> {
        &self.cache
    }

    /// Compile the definition of `E`.
    ///
    /// Returns `None` when the type is already being compiled in `context`
    /// and `force` is not set. Without `force`, a cached definition is
    /// returned instead of running `define`.
    pub fn compile<E: Entity>(
        &self,
        entity: &E,
        context: &CompilationContext,
        force: bool,
    ) -> Result<Option<CompiledViews>> {
        let type_name = E::TYPE_NAME;
        let span = info_span!("schema.compile", entity_type = %type_name, force);
        let _enter = span.enter();

        if !force && context.is_compiling(E::TYPE_NAME) {
            event!(Level::DEBUG, "definition already compiling, skipped");
            return Ok(None);
        }

        let key = E::TYPE_NAME.to_lowercase();
        if !force {
            if let Some(views) = self.cached(&key) {
                event!(Level::DEBUG, cache_key = %key, "definition cache hit");
                return Ok(Some(views));
            }
            event!(Level::DEBUG, cache_key = %key, "definition cache miss");
        }

        let builder = {
            let _guard = context.enter(E::TYPE_NAME)?;
            let builder = DefinitionBuilder::with_config(&self.config)
                .for_entity(E::TYPE_NAME, self.localizer.as_ref())
                .with_tag_support(self.cache.supports_tags())
                .with_context(context.clone());
            entity.define(builder)?
        };

        if builder.entity_type() != Some(E::TYPE_NAME) {
            return Err(SchemaError::ContractViolation(format!(
                "define for {} must return the builder it was given",
                E::TYPE_NAME
            )));
        }

        let views = CompiledViews {
            full: Arc::new(builder.full_definition()),
            flat: Arc::new(builder.flat_definition()),
        };

        if builder.is_cacheable() {
            let tagged = TaggedCache::new(self.cache.as_ref(), &[self.config.cache_tag.as_str()]);
            match tagged.put(&key, views.clone(), builder.cache_ttl()) {
                Ok(()) => event!(Level::DEBUG, cache_key = %key, "definition cached"),
                Err(err) => log::warn!("Failed to cache definition for {}: {}", E::TYPE_NAME, err),
            }
        }

        Ok(Some(views))
    }

    /// Drop every cached definition.
    pub fn flush_definitions(&self) -> Result<()> {
        TaggedCache::new(self.cache.as_ref(), &[self.config.cache_tag.as_str()]).flush()
    }

    /// Cached views, provided both are non-empty. Cache failures count as misses.
    fn cached(&self, key: &str) -> Option<CompiledViews> {
        if !self.cache.supports_tags() {
            return None;
        }

        let tagged = TaggedCache::new(self.cache.as_ref(), &[self.config.cache_tag.as_str()]);
        match tagged.get(key) {
            Ok(Some(views)) if !views.flat.is_empty() && !views.full.field_groups.is_empty() => {
                Some(views)
            }
            Ok(_) => None,
            Err(err) => {
                log::warn!("Definition cache unavailable, recompiling {key}: {err}");
                None
            }
        }
    }
}

impl Default for DefinitionCompiler {
    fn default() -> Self {
        Self::new(SchemaConfig::default())
    }
}
