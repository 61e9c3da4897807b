//! HTTP adapter for [`ResourceService`].
//!
//! Routes, relative to where the router is nested:
//! - `GET /` (`paginate`, `per_page`, `page`)
//! - `GET /definition` (`flat`)
//! - `GET /:id`, `PUT|PATCH /:id`, `DELETE /:id`
//! - `POST /`
//! - `POST /:id/relations/:relation/attach|detach` (`related_id` or `related_ids`)

use crate::compiler::Entity;
use crate::service::{ResourceService, ServiceError, related_ids_from, request_attributes};
use crate::store::{DEFAULT_PER_PAGE, ListQuery, Listing, RecordId};
use crate::validation::ValidationErrors;
use axum::Json;
use axum::Router;
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use http::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub message: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<ValidationErrors>,
}

#[derive(Debug)]
pub enum WebError {
    Input(String),
    Validation(ValidationErrors),
    NotFound(String),
    Forbidden(String),
    Internal(String),
}

impl From<ServiceError> for WebError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::NotFound(message) => Self::NotFound(message),
            ServiceError::Validation(errors) => Self::Validation(errors),
            ServiceError::Input(message) => Self::Input(message),
            ServiceError::Forbidden(message) => Self::Forbidden(message),
            ServiceError::Internal(message) => Self::Internal(message),
        }
    }
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        let (status, message, code, errors) = match self {
            WebError::Validation(errors) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "The given data was invalid.".to_string(),
                "validation_error",
                Some(errors),
            ),
            WebError::Input(msg) => (StatusCode::UNPROCESSABLE_ENTITY, msg, "input_error", None),
            WebError::NotFound(msg) => (StatusCode::NOT_FOUND, msg, "not_found", None),
            WebError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg, "forbidden", None),
            WebError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg, "internal_error", None),
        };

        let body = Json(ErrorResponse {
            message,
            code: code.to_string(),
            errors,
        });

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, WebError>;

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub paginate: Option<String>,
    pub per_page: Option<usize>,
    pub page: Option<usize>,
}

impl ListParams {
    pub fn into_query(self) -> ListQuery {
        let paginate = !matches!(self.paginate.as_deref(), Some("false" | "0"));
        ListQuery {
            paginate,
            per_page: self.per_page.filter(|n| *n > 0).unwrap_or(DEFAULT_PER_PAGE),
            page: self.page.filter(|n| *n > 0).unwrap_or(1),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct DefinitionParams {
    pub flat: Option<String>,
}

/// Router exposing one entity type.
pub fn resource_router<E: Entity>(service: ResourceService<E>) -> Router {
    Router::new()
        .route("/", get(list_records::<E>).post(create_record::<E>))
        .route("/definition", get(definition::<E>))
        .route(
            "/:id",
            get(view_record::<E>)
                .put(update_record::<E>)
                .patch(update_record::<E>)
                .delete(delete_record::<E>),
        )
        .route("/:id/relations/:relation/attach", post(attach_relation::<E>))
        .route("/:id/relations/:relation/detach", post(detach_relation::<E>))
        .with_state(service)
}

async fn list_records<E: Entity>(
    State(service): State<ResourceService<E>>,
    Query(params): Query<ListParams>,
) -> Result<Json<Listing<Value>>> {
    Ok(Json(service.list(&params.into_query()).await?))
}

async fn definition<E: Entity>(
    State(service): State<ResourceService<E>>,
    Query(params): Query<DefinitionParams>,
) -> Result<Json<Value>> {
    let flat = matches!(params.flat.as_deref(), Some(flag) if !matches!(flag, "" | "0" | "false"));
    Ok(Json(service.definition(flat)?))
}

async fn view_record<E: Entity>(
    State(service): State<ResourceService<E>>,
    Path(id): Path<RecordId>,
) -> Result<Json<Value>> {
    Ok(Json(service.view(id).await?))
}

async fn create_record<E: Entity>(State(service): State<ResourceService<E>>, body: Bytes) -> Result<Response> {
    let input = request_attributes(parse_body(&body)?)?;
    let created = service.create(input, Map::new()).await?;
    Ok((StatusCode::CREATED, Json(created)).into_response())
}

async fn update_record<E: Entity>(
    State(service): State<ResourceService<E>>,
    Path(id): Path<RecordId>,
    body: Bytes,
) -> Result<Json<Value>> {
    let input = request_attributes(parse_body(&body)?)?;
    Ok(Json(service.update(id, input).await?))
}

async fn delete_record<E: Entity>(
    State(service): State<ResourceService<E>>,
    Path(id): Path<RecordId>,
) -> Result<StatusCode> {
    service.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn attach_relation<E: Entity>(
    State(service): State<ResourceService<E>>,
    Path((id, relation)): Path<(RecordId, String)>,
    Query(query): Query<Map<String, Value>>,
    body: Bytes,
) -> Result<StatusCode> {
    let related = related_ids_from(&relation_params(query, &body)?)?;
    service.attach(id, &relation, &related).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn detach_relation<E: Entity>(
    State(service): State<ResourceService<E>>,
    Path((id, relation)): Path<(RecordId, String)>,
    Query(query): Query<Map<String, Value>>,
    body: Bytes,
) -> Result<StatusCode> {
    let related = related_ids_from(&relation_params(query, &body)?)?;
    service.detach(id, &relation, &related).await?;
    Ok(StatusCode::NO_CONTENT)
}

fn parse_body(body: &Bytes) -> Result<Value> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Null);
    }
    serde_json::from_slice(body).map_err(|err| WebError::Input(format!("request body is not valid JSON: {err}")))
}

/// Query parameters with body keys layered on top.
fn relation_params(mut query: Map<String, Value>, body: &Bytes) -> Result<Value> {
    match parse_body(body)? {
        Value::Object(fields) => query.extend(fields),
        Value::Null => {}
        _ => return Err(WebError::Input("request body must be a JSON object".to_string())),
    }
    Ok(Value::Object(query))
}
