//! Persistence collaborator contract.
//!
//! The schema layer never stores data itself; the resource service and the
//! after-save synchronization talk to an [`EntityStore`].

mod memory;

pub use memory::MemoryStore;

use crate::core::{Attributes, Result};
use crate::relation::RelationInfo;
use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

pub type RecordId = u64;

pub const DEFAULT_PER_PAGE: usize = 15;

/// A stored row: its id plus attributes in storage form.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Record {
    pub id: RecordId,
    #[serde(flatten)]
    pub attributes: Attributes,
}

/// One key/value row of a meta relation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MetaEntry {
    pub id: RecordId,
    pub meta_key: String,
    pub meta_value: Value,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListQuery {
    pub paginate: bool,
    pub per_page: usize,
    pub page: usize,
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            paginate: true,
            per_page: DEFAULT_PER_PAGE,
            page: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub current_page: usize,
    pub per_page: usize,
    pub last_page: usize,
    pub total: usize,
    pub data: Vec<T>,
}

impl<T> Page<T> {
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Page<U> {
        Page {
            current_page: self.current_page,
            per_page: self.per_page,
            last_page: self.last_page,
            total: self.total,
            data: self.data.into_iter().map(f).collect(),
        }
    }
}

/// Either every row, or one page of rows.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Listing<T> {
    All(Vec<T>),
    Paged(Page<T>),
}

impl<T> Listing<T> {
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Listing<U> {
        match self {
            Self::All(items) => Listing::All(items.into_iter().map(f).collect()),
            Self::Paged(page) => Listing::Paged(page.map(f)),
        }
    }
}

#[async_trait]
pub trait EntityStore: Send + Sync {
    async fn list(&self, entity_type: &str, query: &ListQuery) -> Result<Listing<Record>>;

    async fn find(&self, entity_type: &str, id: RecordId) -> Result<Option<Record>>;

    async fn insert(&self, entity_type: &str, attributes: Attributes) -> Result<Record>;

    /// Merge `attributes` into an existing row.
    async fn update(&self, entity_type: &str, id: RecordId, attributes: Attributes) -> Result<Record>;

    /// Returns false when the row did not exist.
    async fn delete(&self, entity_type: &str, id: RecordId) -> Result<bool>;

    /// Replace the linked set of `relation` with exactly `related`.
    async fn sync_relation(
        &self,
        entity_type: &str,
        id: RecordId,
        relation: &RelationInfo,
        related: &[RecordId],
    ) -> Result<()>;

    /// Link one related row: pivot attach, or foreign-key association.
    async fn attach(&self, entity_type: &str, id: RecordId, relation: &RelationInfo, related: RecordId) -> Result<()>;

    async fn detach(&self, entity_type: &str, id: RecordId, relation: &RelationInfo, related: RecordId) -> Result<()>;

    async fn related_ids(&self, entity_type: &str, id: RecordId, relation: &str) -> Result<Vec<RecordId>>;

    async fn load_meta(&self, entity_type: &str, id: RecordId, relation: &str) -> Result<Vec<MetaEntry>>;

    /// Insert or update the row keyed by `key`.
    async fn upsert_meta(
        &self,
        entity_type: &str,
        id: RecordId,
        relation: &str,
        key: &str,
        value: Value,
    ) -> Result<MetaEntry>;
}
