//! Explicit relation registry consulted by relation fields and the resource service.

use crate::core::{Result, SchemaError};
use crate::naming::pluralize;
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum RelationKind {
    HasOne,
    HasMany,
    BelongsTo,
    BelongsToMany,
}

impl RelationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HasOne => "HasOne",
            Self::HasMany => "HasMany",
            Self::BelongsTo => "BelongsTo",
            Self::BelongsToMany => "BelongsToMany",
        }
    }

    /// Many-to-many links live in a pivot and are attached/detached;
    /// every other kind is (dis)associated through a foreign key.
    pub fn uses_pivot(&self) -> bool {
        matches!(self, Self::BelongsToMany)
    }
}

/// Resolved description of one relation of an entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RelationInfo {
    pub method: String,
    pub related_type: String,
    pub kind: RelationKind,
    /// Attribute holding the related id, for single-valued relations.
    pub foreign_key: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct RelationRegistry {
    owner: Option<String>,
    relations: Vec<RelationInfo>,
}

impl RelationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_entity(owner: &str) -> Self {
        Self {
            owner: Some(owner.to_string()),
            relations: Vec::new(),
        }
    }

    pub fn owner(&self) -> Option<&str> {
        self.owner.as_deref()
    }

    /// Register a relation; an existing one with the same method is replaced.
    pub fn register(mut self, info: RelationInfo) -> Self {
        self.relations.retain(|existing| existing.method != info.method);
        self.relations.push(info);
        self
    }

    pub fn has_one(self, method: &str, related_type: &str, foreign_key: &str) -> Self {
        self.register(RelationInfo {
            method: method.to_string(),
            related_type: related_type.to_string(),
            kind: RelationKind::HasOne,
            foreign_key: Some(foreign_key.to_string()),
        })
    }

    pub fn belongs_to(self, method: &str, related_type: &str, foreign_key: &str) -> Self {
        self.register(RelationInfo {
            method: method.to_string(),
            related_type: related_type.to_string(),
            kind: RelationKind::BelongsTo,
            foreign_key: Some(foreign_key.to_string()),
        })
    }

    pub fn has_many(self, method: &str, related_type: &str) -> Self {
        self.register(RelationInfo {
            method: method.to_string(),
            related_type: related_type.to_string(),
            kind: RelationKind::HasMany,
            foreign_key: None,
        })
    }

    pub fn belongs_to_many(self, method: &str, related_type: &str) -> Self {
        self.register(RelationInfo {
            method: method.to_string(),
            related_type: related_type.to_string(),
            kind: RelationKind::BelongsToMany,
            foreign_key: None,
        })
    }

    /// Look a relation up by its exact name, then by its plural.
    pub fn resolve(&self, name: &str) -> Option<&RelationInfo> {
        self.find(name).or_else(|| self.find(&pluralize(name)))
    }

    pub fn require(&self, name: &str) -> Result<&RelationInfo> {
        self.resolve(name)
            .ok_or_else(|| SchemaError::UnknownRelation(name.to_string()))
    }

    pub fn iter(&self) -> impl Iterator<Item = &RelationInfo> {
        self.relations.iter()
    }

    fn find(&self, method: &str) -> Option<&RelationInfo> {
        self.relations.iter().find(|info| info.method == method)
    }
}
