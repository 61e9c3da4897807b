//! Data that lives outside the entity's own row: meta key/values, remote
//! relation sets and media files.
//!
//! [`validate_meta`] runs before the row is saved; [`after_save`] once it has
//! an id.

use super::transform::is_blank;
use crate::builder::FlatDefinition;
use crate::compiler::Entity;
use crate::core::{Attributes, Result, SchemaError, StorageType};
use crate::field::{FieldDescriptor, MediaConfig, MediaType};
use crate::media::{
    FileOperation, FileSource, MediaItem, MediaLibrary, MediaOwner, MediaSource, NewMedia,
    ParsedOperation, decode_base64_payload, parse_operations, removals_first, sniff_mime,
};
use crate::store::{EntityStore, RecordId};
use crate::uploads::UploadStore;
use crate::validation::{ValidationErrors, Validator, path};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Collaborators the after-save step writes through.
#[derive(Clone, Copy)]
pub struct SyncContext<'a> {
    pub store: &'a dyn EntityStore,
    pub media: &'a dyn MediaLibrary,
    pub uploads: &'a dyn UploadStore,
}

struct MetaInput<'a> {
    name: &'a str,
    relation: &'a str,
    value: &'a Value,
    fields: Vec<&'a FieldDescriptor>,
}

/// META fields sent with a non-empty value and bound to a relation.
fn meta_fields<'a>(flat: &'a FlatDefinition, input: &'a Attributes) -> Vec<MetaInput<'a>> {
    flat.of_type(StorageType::Meta)
        .filter_map(|field| {
            let value = input.get(&field.name).filter(|value| !is_blank(value))?;
            let nested = field.extra_data.nested()?;
            let relation = nested.relation.as_deref()?;
            nested.fields.as_ref()?;
            Some(MetaInput {
                name: &field.name,
                relation,
                value,
                fields: field.nested_descriptors(),
            })
        })
        .collect()
}

fn not_an_object(name: &str) -> SchemaError {
    let mut errors = ValidationErrors::new();
    errors.add(name, format!("The {} field must be an array.", path::display_name(name)));
    SchemaError::Validation(errors)
}

/// Validate sent meta values merged over the ones already stored for `id`.
pub async fn validate_meta(
    store: &dyn EntityStore,
    entity_type: &str,
    id: Option<RecordId>,
    flat: &FlatDefinition,
    input: &Attributes,
) -> Result<()> {
    for meta in meta_fields(flat, input) {
        let Value::Object(incoming) = meta.value else {
            return Err(not_an_object(meta.name));
        };

        let mut merged = Map::new();
        if let Some(id) = id {
            for entry in store.load_meta(entity_type, id, meta.relation).await? {
                merged.insert(entry.meta_key, entry.meta_value);
            }
        }
        merged.extend(incoming.clone());

        let mut data = Value::Object(Map::new());
        for (key, value) in merged {
            path::set(&mut data, &key, value);
        }

        let rules: BTreeMap<String, String> = meta
            .fields
            .iter()
            .filter(|sub| !sub.rule_string.is_empty())
            .map(|sub| (sub.name.clone(), sub.rule_string.clone()))
            .collect();

        Validator::make(data, &rules).validate()?;
    }
    Ok(())
}

/// Persist meta values, remote relation sets and media for a saved row.
pub async fn after_save<E: Entity>(
    ctx: SyncContext<'_>,
    entity: &E,
    id: RecordId,
    flat: &FlatDefinition,
    input: &Attributes,
) -> Result<()> {
    save_meta(ctx, entity, id, flat, input).await?;
    sync_relations(ctx, entity, id, flat, input).await?;

    let owner = MediaOwner::new(E::TYPE_NAME, id);
    for field in flat.of_type(StorageType::Media) {
        if let Some(value) = input.get(&field.name).filter(|value| !is_blank(value)) {
            sync_media(ctx, &owner, field, value).await;
        }
    }
    Ok(())
}

async fn save_meta<E: Entity>(
    ctx: SyncContext<'_>,
    entity: &E,
    id: RecordId,
    flat: &FlatDefinition,
    input: &Attributes,
) -> Result<()> {
    for meta in meta_fields(flat, input) {
        if !entity.allow_relation_changes(meta.relation) {
            continue;
        }
        let Value::Object(incoming) = meta.value else {
            continue;
        };

        for sub in &meta.fields {
            let Some(value) = incoming.get(&sub.name) else {
                continue;
            };

            let is_media = sub.is(StorageType::Media);
            let stored = if is_media { Value::Null } else { value.clone() };
            let entry = ctx
                .store
                .upsert_meta(E::TYPE_NAME, id, meta.relation, &sub.name, stored)
                .await?;

            if is_media && !is_blank(value) {
                let owner = MediaOwner::new(format!("{}:{}", E::TYPE_NAME, meta.relation), entry.id);
                sync_media(ctx, &owner, sub, value).await;
            }
        }
    }
    Ok(())
}

async fn sync_relations<E: Entity>(
    ctx: SyncContext<'_>,
    entity: &E,
    id: RecordId,
    flat: &FlatDefinition,
    input: &Attributes,
) -> Result<()> {
    let registry = entity.relations();
    let remote = flat.iter().filter(|field| field.storage_type.is_remote_relation());

    for field in remote {
        let Some(value) = input.get(&field.name) else {
            continue;
        };
        let Some(relation) = field.extra_data.relation().and_then(|r| r.relation.as_deref()) else {
            continue;
        };
        if !entity.allow_relation_changes(relation) {
            log::debug!("Skipping sync of {relation} on {}: changes not allowed", E::TYPE_NAME);
            continue;
        }

        let info = registry.require(relation)?;
        let related = relation_ids(&field.name, value)?;
        ctx.store.sync_relation(E::TYPE_NAME, id, info, &related).await?;
    }
    Ok(())
}

/// Ids from an array or a single number; anything else syncs to none.
fn relation_ids(field: &str, value: &Value) -> Result<Vec<RecordId>> {
    let single = |value: &Value| match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };

    match value {
        Value::Array(items) => items
            .iter()
            .map(|item| {
                single(item).ok_or_else(|| {
                    let mut errors = ValidationErrors::new();
                    errors.add(field, format!("The {} field must only contain ids.", path::display_name(field)));
                    SchemaError::Validation(errors)
                })
            })
            .collect(),
        other => Ok(single(other).into_iter().collect()),
    }
}

/// Apply the file operations sent for a media field.
///
/// Failures are per file: they are logged and the remaining operations still run.
pub async fn sync_media(ctx: SyncContext<'_>, owner: &MediaOwner, field: &FieldDescriptor, value: &Value) {
    let Some(config) = field.extra_data.media() else {
        return;
    };
    let collection = config.collection.clone().unwrap_or_else(|| field.name.clone());

    let mut operations = Vec::new();
    for parsed in parse_operations(value) {
        match parsed {
            ParsedOperation::Valid(op) => operations.push(op),
            ParsedOperation::Invalid { index, reason } => {
                log::error!("Skipping file {index} of {}: {reason}", field.name);
            }
        }
    }

    for op in removals_first(operations) {
        let result = match op {
            FileOperation::Remove { id } => ctx.media.remove(owner, id).await,
            FileOperation::Add { source, name } => add_file(ctx, owner, config, &collection, source, name)
                .await
                .map(|_| ()),
        };
        if let Err(err) = result {
            log::error!("Media sync for {} on {} {} failed: {err}", field.name, owner.owner_type, owner.id);
        }
    }
}

async fn add_file(
    ctx: SyncContext<'_>,
    owner: &MediaOwner,
    config: &MediaConfig,
    collection: &str,
    source: FileSource,
    name: Option<String>,
) -> Result<MediaItem> {
    let (source, mime_type) = match source {
        FileSource::Base64(data) => {
            let decoded = decode_base64_payload(&data)?;
            let mime_type = sniff_mime(&decoded.bytes, decoded.declared_mime.as_deref());
            (MediaSource::Bytes(decoded.bytes), mime_type)
        }
        FileSource::Upload(key) => {
            let upload = ctx.uploads.resolve(&key).await?;
            (MediaSource::Path(upload.path), upload.mime_type)
        }
    };

    if !config.mime_types.iter().any(|allowed| allowed == &mime_type) {
        return Err(SchemaError::Media(format!("MIME type {mime_type} is not allowed")));
    }

    let media = NewMedia {
        source,
        mime_type,
        collection: collection.to_string(),
        name: None,
        content_disposition: None,
    };
    let media = match config.media_type {
        MediaType::Files => NewMedia { name, ..media }.attachment(),
        MediaType::Images => media,
    };
    ctx.media.add(owner, media).await
}
