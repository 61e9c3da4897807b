//! Relation-backed field variants.

use crate::config::RELATIONS_FIELD_GROUP;
use crate::core::StorageType;
use crate::field::base::{Field, FieldBase, FieldKind};
use crate::field::payload::{FieldPayload, RelationConfig, SearchConfig};
use crate::naming::{endpoint_for, to_snake_case};
use crate::relation::RelationRegistry;
use serde_json::Value;

const SEARCH_PLACEHOLDER: &str = "Search..";

/// Variants bound to a relation of the owning entity.
pub trait Relational {
    /// Unnamed fields take the relation's foreign key instead of its method.
    const NAMED_BY_FOREIGN_KEY: bool = false;

    fn relation_mut(&mut self) -> &mut RelationConfig;

    fn on_resolved(&mut self, _registry: &RelationRegistry) {}
}

/// Variants backed by a search-as-you-type picker.
pub trait Searchable {
    fn search_mut(&mut self) -> &mut SearchConfig;
}

/// Single related record picked through search.
#[derive(Debug, Clone, PartialEq)]
pub struct HasOne {
    relation: RelationConfig,
}

impl Default for HasOne {
    fn default() -> Self {
        Self {
            relation: RelationConfig {
                search: Some(SearchConfig::single()),
                ..RelationConfig::default()
            },
        }
    }
}

/// Several related records picked through search.
#[derive(Debug, Clone, PartialEq)]
pub struct HasManySelect {
    relation: RelationConfig,
}

impl Default for HasManySelect {
    fn default() -> Self {
        Self {
            relation: RelationConfig {
                search: Some(SearchConfig::multiple()),
                ..RelationConfig::default()
            },
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct HasMany {
    relation: RelationConfig,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ManyToMany {
    relation: RelationConfig,
}

impl FieldKind for HasOne {
    const STORAGE_TYPE: StorageType = StorageType::HasOne;
    const INPUT_TYPE: &'static str = "model-search";

    fn init(base: &mut FieldBase) {
        base.push_rule("numeric");
        base.fillable = false;
        base.placeholder = Some(SEARCH_PLACEHOLDER.to_string());
    }

    fn payload(&self, _base: &FieldBase) -> FieldPayload {
        FieldPayload::Relation(self.relation.clone())
    }
}

impl FieldKind for HasManySelect {
    const STORAGE_TYPE: StorageType = StorageType::HasMany;
    const INPUT_TYPE: &'static str = "model-search";

    fn init(base: &mut FieldBase) {
        base.push_rule("array");
        base.fillable = false;
        base.placeholder = Some(SEARCH_PLACEHOLDER.to_string());
    }

    fn payload(&self, _base: &FieldBase) -> FieldPayload {
        FieldPayload::Relation(self.relation.clone())
    }
}

impl FieldKind for HasMany {
    const STORAGE_TYPE: StorageType = StorageType::HasMany;
    const INPUT_TYPE: &'static str = "relation-list";

    fn init(base: &mut FieldBase) {
        base.push_rule("array");
        base.fillable = false;
    }

    fn preferred_group() -> Option<&'static str> {
        Some(RELATIONS_FIELD_GROUP)
    }

    fn payload(&self, _base: &FieldBase) -> FieldPayload {
        FieldPayload::Relation(self.relation.clone())
    }
}

impl FieldKind for ManyToMany {
    const STORAGE_TYPE: StorageType = StorageType::ManyToMany;
    const INPUT_TYPE: &'static str = "relation-list";

    fn init(base: &mut FieldBase) {
        base.push_rule("array");
        base.fillable = false;
    }

    fn preferred_group() -> Option<&'static str> {
        Some(RELATIONS_FIELD_GROUP)
    }

    fn payload(&self, _base: &FieldBase) -> FieldPayload {
        FieldPayload::Relation(self.relation.clone())
    }
}

impl Relational for HasOne {
    const NAMED_BY_FOREIGN_KEY: bool = true;

    fn relation_mut(&mut self) -> &mut RelationConfig {
        &mut self.relation
    }
}

impl Relational for HasManySelect {
    fn relation_mut(&mut self) -> &mut RelationConfig {
        &mut self.relation
    }

    fn on_resolved(&mut self, registry: &RelationRegistry) {
        self.relation.parent_model = registry.owner().map(str::to_string);
    }
}

impl Relational for HasMany {
    fn relation_mut(&mut self) -> &mut RelationConfig {
        &mut self.relation
    }
}

impl Relational for ManyToMany {
    fn relation_mut(&mut self) -> &mut RelationConfig {
        &mut self.relation
    }
}

impl Searchable for HasOne {
    fn search_mut(&mut self) -> &mut SearchConfig {
        self.relation.search.get_or_insert_with(SearchConfig::single)
    }
}

impl Searchable for HasManySelect {
    fn search_mut(&mut self) -> &mut SearchConfig {
        self.relation.search.get_or_insert_with(SearchConfig::multiple)
    }
}

impl<K: FieldKind + Relational> Field<K> {
    /// Bind the field to `relation` as registered in `registry`.
    ///
    /// Unnamed fields are named after the relation (or its foreign key for
    /// single-valued pickers). Unknown relations are reported when the field
    /// is added to a builder.
    pub fn relation(mut self, relation: &str, registry: &RelationRegistry) -> Self {
        let Some(info) = registry.resolve(relation) else {
            self.base.flag_defect(format!("relation {relation} is not registered"));
            return self;
        };

        if self.base.name.is_none() {
            let name = if K::NAMED_BY_FOREIGN_KEY {
                match &info.foreign_key {
                    Some(foreign_key) => foreign_key.clone(),
                    None => {
                        self.base.flag_defect(format!(
                            "relationship {relation} must be of type HasOne or BelongsTo"
                        ));
                        return self;
                    }
                }
            } else {
                to_snake_case(&info.method)
            };
            self = self.name(&name);
        }

        let config = self.kind.relation_mut();
        config.relation = Some(info.method.clone());
        config.related_to = Some(info.related_type.clone());
        config.endpoint = Some(endpoint_for(&info.related_type));
        self.kind.on_resolved(registry);
        self
    }

    pub fn endpoint(mut self, endpoint: &str) -> Self {
        self.kind.relation_mut().endpoint = Some(endpoint.to_string());
        self
    }
}

impl<K: FieldKind + Searchable> Field<K> {
    /// Attribute searched on the related entity; optionally also displayed.
    pub fn search_field(mut self, field: &str, set_display_field: bool) -> Self {
        let search = self.kind.search_mut();
        search.search_field = field.to_string();
        if set_display_field {
            search.display_field = field.to_string();
        }
        self
    }

    pub fn display_field(mut self, field: &str) -> Self {
        self.kind.search_mut().display_field = field.to_string();
        self
    }

    pub fn prefetch(mut self, prefetch: bool) -> Self {
        self.kind.search_mut().prefetch = prefetch;
        self
    }

    pub fn extra_display_field(mut self, field: &str) -> Self {
        self.kind.search_mut().extra_display_field = Some(field.to_string());
        self
    }

    pub fn display_field_labels(mut self, labels: Value) -> Self {
        self.kind.search_mut().display_field_labels = Some(labels);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::FieldSpec;
    use serde_json::json;

    fn registry() -> RelationRegistry {
        RelationRegistry::for_entity("Article")
            .belongs_to("author", "User", "author_id")
            .has_many("comments", "Comment")
            .belongs_to_many("relatedArticles", "BlogPost")
    }

    #[test]
    fn test_many_to_many_derives_name_and_endpoint() {
        let def = Field::<ManyToMany>::default()
            .relation("relatedArticles", &registry())
            .definition();

        assert_eq!(def.name, "related_articles");
        assert_eq!(def.validation_key, "related_articles");
        assert_eq!(def.extra_data.get("relation"), Some(json!("relatedArticles")));
        assert_eq!(def.extra_data.get("related_to"), Some(json!("BlogPost")));
        assert_eq!(def.extra_data.get("endpoint"), Some(json!("blog-posts")));
        assert_eq!(def.rule_string, "nullable|array");
        assert!(!def.fillable);
    }

    #[test]
    fn test_has_one_is_named_after_foreign_key() {
        let def = Field::<HasOne>::default()
            .relation("author", &registry())
            .search_field("name", true)
            .definition();

        assert_eq!(def.name, "author_id");
        assert_eq!(def.input_type, "model-search");
        assert_eq!(def.extra_data.get("search_field"), Some(json!("name")));
        assert_eq!(def.extra_data.get("display_field"), Some(json!("name")));
        assert_eq!(def.extra_data.get("multiple"), Some(json!(false)));
    }

    #[test]
    fn test_has_one_requires_single_valued_relation() {
        let field = Field::<HasOne>::default().relation("comments", &registry());
        assert!(field.defect().unwrap().contains("must be of type HasOne"));
    }

    #[test]
    fn test_has_many_select_records_parent_model() {
        let def = Field::<HasManySelect>::new("comment_ids")
            .relation("comment", &registry())
            .definition();

        assert_eq!(def.extra_data.get("parent_model"), Some(json!("Article")));
        assert_eq!(def.extra_data.get("relation"), Some(json!("comments")));
        assert_eq!(def.extra_data.get("multiple"), Some(json!(true)));
    }

    #[test]
    fn test_unknown_relation_is_a_defect() {
        let field = Field::<HasMany>::default().relation("likes", &registry());
        assert_eq!(field.defect(), Some("relation likes is not registered"));
    }
}
