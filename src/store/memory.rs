use super::{EntityStore, ListQuery, Listing, MetaEntry, Page, Record, RecordId};
use crate::core::{Attributes, Result, SchemaError};
use crate::relation::{RelationInfo, RelationKind};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tokio::sync::RwLock;

type OwnerKey = (String, RecordId, String);

#[derive(Default)]
struct State {
    next_id: RecordId,
    tables: HashMap<String, BTreeMap<RecordId, Attributes>>,
    links: HashMap<OwnerKey, BTreeSet<RecordId>>,
    meta: HashMap<OwnerKey, Vec<MetaEntry>>,
}

impl State {
    fn allocate_id(&mut self) -> RecordId {
        self.next_id += 1;
        self.next_id
    }

    fn row_mut(&mut self, entity_type: &str, id: RecordId) -> Result<&mut Attributes> {
        self.tables
            .get_mut(entity_type)
            .and_then(|rows| rows.get_mut(&id))
            .ok_or_else(|| SchemaError::NotFound(format!("{entity_type} {id}")))
    }

    fn exists(&self, entity_type: &str, id: RecordId) -> bool {
        self.tables
            .get(entity_type)
            .is_some_and(|rows| rows.contains_key(&id))
    }
}

fn owner_key(entity_type: &str, id: RecordId, relation: &str) -> OwnerKey {
    (entity_type.to_string(), id, relation.to_string())
}

/// Foreign-key relations are stored on the row itself; the rest as link sets.
fn foreign_key(relation: &RelationInfo) -> Option<&str> {
    match relation.kind {
        RelationKind::BelongsTo | RelationKind::HasOne => relation.foreign_key.as_deref(),
        _ => None,
    }
}

/// In-process [`EntityStore`] keyed by entity type name.
#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EntityStore for MemoryStore {
    async fn list(&self, entity_type: &str, query: &ListQuery) -> Result<Listing<Record>> {
        let state = self.state.read().await;
        let rows: Vec<Record> = state
            .tables
            .get(entity_type)
            .map(|rows| {
                rows.iter()
                    .map(|(id, attributes)| Record {
                        id: *id,
                        attributes: attributes.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default();

        if !query.paginate {
            return Ok(Listing::All(rows));
        }

        let per_page = query.per_page.max(1);
        let page = query.page.max(1);
        let total = rows.len();
        let data = rows.into_iter().skip((page - 1) * per_page).take(per_page).collect();

        Ok(Listing::Paged(Page {
            current_page: page,
            per_page,
            last_page: total.div_ceil(per_page).max(1),
            total,
            data,
        }))
    }

    async fn find(&self, entity_type: &str, id: RecordId) -> Result<Option<Record>> {
        let state = self.state.read().await;
        Ok(state
            .tables
            .get(entity_type)
            .and_then(|rows| rows.get(&id))
            .map(|attributes| Record {
                id,
                attributes: attributes.clone(),
            }))
    }

    async fn insert(&self, entity_type: &str, mut attributes: Attributes) -> Result<Record> {
        let mut state = self.state.write().await;
        let id = state.allocate_id();
        attributes.remove("id");
        state
            .tables
            .entry(entity_type.to_string())
            .or_default()
            .insert(id, attributes.clone());
        Ok(Record { id, attributes })
    }

    async fn update(&self, entity_type: &str, id: RecordId, attributes: Attributes) -> Result<Record> {
        let mut state = self.state.write().await;
        let row = state.row_mut(entity_type, id)?;
        for (key, value) in attributes {
            if key != "id" {
                row.insert(key, value);
            }
        }
        Ok(Record {
            id,
            attributes: row.clone(),
        })
    }

    async fn delete(&self, entity_type: &str, id: RecordId) -> Result<bool> {
        let mut state = self.state.write().await;
        let removed = state
            .tables
            .get_mut(entity_type)
            .and_then(|rows| rows.remove(&id))
            .is_some();

        if removed {
            state.links.retain(|(owner, owner_id, _), _| !(owner == entity_type && *owner_id == id));
            state.meta.retain(|(owner, owner_id, _), _| !(owner == entity_type && *owner_id == id));
        }
        Ok(removed)
    }

    async fn sync_relation(
        &self,
        entity_type: &str,
        id: RecordId,
        relation: &RelationInfo,
        related: &[RecordId],
    ) -> Result<()> {
        let mut state = self.state.write().await;
        if !state.exists(entity_type, id) {
            return Err(SchemaError::NotFound(format!("{entity_type} {id}")));
        }

        state.links.insert(
            owner_key(entity_type, id, &relation.method),
            related.iter().copied().collect(),
        );
        Ok(())
    }

    async fn attach(&self, entity_type: &str, id: RecordId, relation: &RelationInfo, related: RecordId) -> Result<()> {
        let mut state = self.state.write().await;
        if let Some(column) = foreign_key(relation) {
            state.row_mut(entity_type, id)?.insert(column.to_string(), Value::from(related));
            return Ok(());
        }

        if !state.exists(entity_type, id) {
            return Err(SchemaError::NotFound(format!("{entity_type} {id}")));
        }
        state
            .links
            .entry(owner_key(entity_type, id, &relation.method))
            .or_default()
            .insert(related);
        Ok(())
    }

    async fn detach(&self, entity_type: &str, id: RecordId, relation: &RelationInfo, related: RecordId) -> Result<()> {
        let mut state = self.state.write().await;
        if let Some(column) = foreign_key(relation) {
            let row = state.row_mut(entity_type, id)?;
            if row.get(column) == Some(&Value::from(related)) {
                row.insert(column.to_string(), Value::Null);
            }
            return Ok(());
        }

        if let Some(links) = state.links.get_mut(&owner_key(entity_type, id, &relation.method)) {
            links.remove(&related);
        }
        Ok(())
    }

    async fn related_ids(&self, entity_type: &str, id: RecordId, relation: &str) -> Result<Vec<RecordId>> {
        let state = self.state.read().await;
        Ok(state
            .links
            .get(&owner_key(entity_type, id, relation))
            .map(|links| links.iter().copied().collect())
            .unwrap_or_default())
    }

    async fn load_meta(&self, entity_type: &str, id: RecordId, relation: &str) -> Result<Vec<MetaEntry>> {
        let state = self.state.read().await;
        Ok(state
            .meta
            .get(&owner_key(entity_type, id, relation))
            .cloned()
            .unwrap_or_default())
    }

    async fn upsert_meta(
        &self,
        entity_type: &str,
        id: RecordId,
        relation: &str,
        key: &str,
        value: Value,
    ) -> Result<MetaEntry> {
        let mut state = self.state.write().await;
        if !state.exists(entity_type, id) {
            return Err(SchemaError::NotFound(format!("{entity_type} {id}")));
        }

        let entry_id = state.allocate_id();
        let entries = state.meta.entry(owner_key(entity_type, id, relation)).or_default();
        if let Some(existing) = entries.iter_mut().find(|entry| entry.meta_key == key) {
            existing.meta_value = value;
            return Ok(existing.clone());
        }

        let entry = MetaEntry {
            id: entry_id,
            meta_key: key.to_string(),
            meta_value: value,
        };
        entries.push(entry.clone());
        Ok(entry)
    }
}
