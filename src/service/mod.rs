//! Generic create/read/update/delete over a schema-backed entity.
//!
//! A [`ResourceService`] drives one entity type through the model pipeline:
//! attributes are prepared and validated by the compiled definition, the row
//! goes to the [`EntityStore`], and meta values, remote relations and media
//! are synchronized afterwards.

mod error;

pub use error::ServiceError;

use crate::compiler::{DefinitionCompiler, Entity, Model};
use crate::core::{Attributes, SchemaError};
use crate::media::MediaLibrary;
use crate::pipeline::{SyncContext, after_save, is_blank, validate_meta};
use crate::relation::RelationInfo;
use crate::store::{EntityStore, ListQuery, Listing, Record, RecordId};
use crate::uploads::UploadStore;
use serde_json::{Map, Value};
use std::marker::PhantomData;
use std::sync::Arc;

pub type ServiceResult<T> = std::result::Result<T, ServiceError>;

pub struct ResourceService<E: Entity> {
    compiler: Arc<DefinitionCompiler>,
    store: Arc<dyn EntityStore>,
    media: Arc<dyn MediaLibrary>,
    uploads: Arc<dyn UploadStore>,
    _entity: PhantomData<fn() -> E>,
}

impl<E: Entity> Clone for ResourceService<E> {
    fn clone(&self) -> Self {
        Self {
            compiler: Arc::clone(&self.compiler),
            store: Arc::clone(&self.store),
            media: Arc::clone(&self.media),
            uploads: Arc::clone(&self.uploads),
            _entity: PhantomData,
        }
    }
}

impl<E: Entity> ResourceService<E> {
    pub fn new(
        compiler: Arc<DefinitionCompiler>,
        store: Arc<dyn EntityStore>,
        media: Arc<dyn MediaLibrary>,
        uploads: Arc<dyn UploadStore>,
    ) -> Self {
        Self {
            compiler,
            store,
            media,
            uploads,
            _entity: PhantomData,
        }
    }

    pub fn store(&self) -> &Arc<dyn EntityStore> {
        &self.store
    }

    fn sync_context(&self) -> SyncContext<'_> {
        SyncContext {
            store: self.store.as_ref(),
            media: self.media.as_ref(),
            uploads: self.uploads.as_ref(),
        }
    }

    fn model(&self) -> ServiceResult<Model<E>> {
        let mut model = Model::new(Arc::clone(&self.compiler))?;
        model.compile_definition(false)?;
        Ok(model)
    }

    async fn find_record(&self, id: RecordId) -> ServiceResult<Record> {
        self.store
            .find(E::TYPE_NAME, id)
            .await?
            .ok_or_else(|| ServiceError::not_found(E::TYPE_NAME, id))
    }

    /// The grouped definition document, or the flat field map.
    pub fn definition(&self, flat: bool) -> ServiceResult<Value> {
        let mut model = self.model()?;
        let document = if flat {
            serde_json::to_value(&*model.flat_definition()?)
        } else {
            serde_json::to_value(&*model.full_definition()?)
        };
        document.map_err(|err| ServiceError::Internal(err.to_string()))
    }

    pub async fn list(&self, query: &ListQuery) -> ServiceResult<Listing<Value>> {
        let model = self.model()?;
        let listing = self.store.list(E::TYPE_NAME, query).await?;
        Ok(listing.map(|record| visible(record, model.hidden())))
    }

    pub async fn view(&self, id: RecordId) -> ServiceResult<Value> {
        let record = self.find_record(id).await?;
        let mut model = Model::<E>::from_record(Arc::clone(&self.compiler), record.id, record.attributes)?;
        model.compile_definition(false)?;
        Ok(model.to_visible_json())
    }

    /// Create a record from request `input`.
    ///
    /// `manual` attributes are set by the caller and bypass the fillable filter.
    pub async fn create(&self, input: Attributes, manual: Attributes) -> ServiceResult<Value> {
        let mut model = self.model()?;
        let mut fillables = model.prepare_attributes(input.clone(), true)?;
        fillables.extend(model.prepare_attributes(manual, false)?);

        let flat = model.flat_definition()?;
        validate_meta(self.store.as_ref(), E::TYPE_NAME, None, &flat, &input).await?;

        model.fill(fillables);
        model.prepare_for_save()?;

        let record = self.store.insert(E::TYPE_NAME, model.attributes().clone()).await?;
        model.set_id(record.id);
        after_save(self.sync_context(), model.entity(), record.id, &flat, &input).await?;

        log::debug!("Created {} {}", E::TYPE_NAME, record.id);
        self.view(record.id).await
    }

    pub async fn update(&self, id: RecordId, input: Attributes) -> ServiceResult<Value> {
        let record = self.find_record(id).await?;
        let mut model = Model::<E>::from_record(Arc::clone(&self.compiler), record.id, record.attributes)?;
        model.compile_definition(false)?;

        let fillables = model.prepare_attributes(input.clone(), true)?;
        let flat = model.flat_definition()?;
        validate_meta(self.store.as_ref(), E::TYPE_NAME, Some(id), &flat, &input).await?;

        model.fill(fillables);
        model.prepare_for_save()?;

        self.store.update(E::TYPE_NAME, id, model.attributes().clone()).await?;
        after_save(self.sync_context(), model.entity(), id, &flat, &input).await?;

        self.view(id).await
    }

    pub async fn delete(&self, id: RecordId) -> ServiceResult<()> {
        if !self.store.delete(E::TYPE_NAME, id).await? {
            return Err(ServiceError::not_found(E::TYPE_NAME, id));
        }
        Ok(())
    }

    /// Link `related` rows through `relation`.
    ///
    /// Refused before any change unless the entity allows changes to the relation.
    pub async fn attach(&self, id: RecordId, relation: &str, related: &[RecordId]) -> ServiceResult<()> {
        let info = self.permitted_relation(id, relation).await?;
        for related_id in related {
            self.store.attach(E::TYPE_NAME, id, &info, *related_id).await?;
        }
        log::debug!("Attached {:?} to {} {} via {}", related, E::TYPE_NAME, id, info.method);
        Ok(())
    }

    pub async fn detach(&self, id: RecordId, relation: &str, related: &[RecordId]) -> ServiceResult<()> {
        let info = self.permitted_relation(id, relation).await?;
        for related_id in related {
            self.store.detach(E::TYPE_NAME, id, &info, *related_id).await?;
        }
        Ok(())
    }

    async fn permitted_relation(
        &self,
        id: RecordId,
        relation: &str,
    ) -> ServiceResult<RelationInfo> {
        let record = self.find_record(id).await?;
        let mut model = Model::<E>::from_record(Arc::clone(&self.compiler), record.id, record.attributes)?;
        model.compile_definition(false)?;

        let info = model.relation_info(relation)?;
        if !model.entity().allow_relation_changes(&info.method) {
            return Err(SchemaError::RelationDenied(info.method).into());
        }
        Ok(info)
    }
}

fn visible(record: Record, hidden: &[String]) -> Value {
    let mut out = Map::new();
    out.insert("id".to_string(), Value::from(record.id));
    for (name, value) in record.attributes {
        if !hidden.iter().any(|h| *h == name) {
            out.insert(name, value);
        }
    }
    Value::Object(out)
}

/// Request attributes: the `data` object when present, else the body itself.
pub fn request_attributes(body: Value) -> ServiceResult<Attributes> {
    match body {
        Value::Object(mut map) => match map.remove("data") {
            Some(Value::Object(data)) => Ok(data),
            Some(other) => {
                map.insert("data".to_string(), other);
                Ok(map)
            }
            None => Ok(map),
        },
        Value::Null => Ok(Attributes::new()),
        _ => Err(ServiceError::input("request body must be a JSON object")),
    }
}

/// Related ids from `related_id`, or else `related_ids` (array or single value).
pub fn related_ids_from(params: &Value) -> ServiceResult<Vec<RecordId>> {
    let parse = |value: &Value| -> ServiceResult<RecordId> {
        let id = match value {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        };
        id.ok_or_else(|| ServiceError::input(format!("invalid related id {value}")))
    };

    if let Some(single) = params.get("related_id").filter(|v| !is_blank(v)) {
        return Ok(vec![parse(single)?]);
    }
    match params.get("related_ids").filter(|v| !is_blank(v)) {
        Some(Value::Array(items)) => items.iter().map(parse).collect(),
        Some(single) => Ok(vec![parse(single)?]),
        None => Ok(Vec::new()),
    }
}
