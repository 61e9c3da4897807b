use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use schemaform::builder::DefinitionBuilder;
use schemaform::field::{ImageUploadField, ManyToManyField, PasswordField, SelectField, TextField};
use schemaform::media::{MediaEvent, MediaOwner};
use schemaform::{
    DefinitionCompiler, DiskUploadStore, Entity, EntityStore, MediaLibrary, MemoryMediaLibrary, MemoryStore,
    RelationRegistry, ResourceService, SchemaConfig, resource_router,
};
use serde_json::{Value, json};
use std::sync::Arc;
use tower::ServiceExt;

const PNG: &[u8] = b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR";

#[derive(Default)]
struct Post;

impl Entity for Post {
    const TYPE_NAME: &'static str = "Post";

    fn define(&self, mut builder: DefinitionBuilder) -> schemaform::Result<DefinitionBuilder> {
        let relations = self.relations();
        builder
            .add_field(TextField::new("title").required(true))?
            .add_field(SelectField::new("status").options([("draft", "Draft"), ("live", "Live")]))?
            .add_field(PasswordField::new("secret").hidden(true))?
            .add_field(ManyToManyField::new("tags").relation("tags", &relations))?
            .add_field(ImageUploadField::new("gallery"))?;
        Ok(builder)
    }

    fn relations(&self) -> RelationRegistry {
        RelationRegistry::for_entity(Self::TYPE_NAME)
            .belongs_to_many("tags", "Tag")
            .has_many("comments", "Comment")
    }

    fn allow_relation_changes(&self, relation: &str) -> bool {
        relation == "tags"
    }
}

struct Harness {
    router: axum::Router,
    store: Arc<MemoryStore>,
    media: Arc<MemoryMediaLibrary>,
    _uploads: tempfile::TempDir,
    upload_root: std::path::PathBuf,
}

fn harness() -> Harness {
    let uploads_dir = tempfile::tempdir().expect("upload dir");
    let upload_root = uploads_dir.path().to_path_buf();

    let store = Arc::new(MemoryStore::new());
    let media = Arc::new(MemoryMediaLibrary::new());
    let service = ResourceService::<Post>::new(
        Arc::new(DefinitionCompiler::new(SchemaConfig::default())),
        store.clone(),
        media.clone(),
        Arc::new(DiskUploadStore::new(upload_root.clone(), 1024 * 1024)),
    );

    Harness {
        router: axum::Router::new().nest("/api/posts", resource_router(service)),
        store,
        media,
        _uploads: uploads_dir,
        upload_root,
    }
}

fn json_request(method: Method, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .expect("request")
}

fn empty_request(method: Method, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .expect("request")
}

async fn decode_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("response body");
    serde_json::from_slice(&bytes).expect("json body")
}

async fn create_post(router: &axum::Router, body: Value) -> u64 {
    let response = router
        .clone()
        .oneshot(json_request(Method::POST, "/api/posts", body))
        .await
        .expect("create response");
    assert_eq!(response.status(), StatusCode::CREATED);
    decode_json(response)
        .await
        .get("id")
        .and_then(Value::as_u64)
        .expect("created id")
}

#[tokio::test]
async fn test_crud_routes_drive_the_model_pipeline() {
    let Harness { router, store, .. } = harness();

    let created = router
        .clone()
        .oneshot(json_request(
            Method::POST,
            "/api/posts",
            json!({"data": {"title": "Hello", "status": "draft", "secret": "s3cret", "unknown": 1}}),
        ))
        .await
        .expect("create response");
    assert_eq!(created.status(), StatusCode::CREATED);
    let created_body = decode_json(created).await;
    let id = created_body.get("id").and_then(Value::as_u64).expect("created id");
    assert_eq!(created_body["title"], json!("Hello"));
    assert!(created_body.get("secret").is_none());
    assert!(created_body.get("unknown").is_none());

    let stored = store.find("Post", id).await.expect("find").expect("stored row");
    assert_eq!(stored.attributes.get("secret"), Some(&json!("s3cret")));

    let invalid = router
        .clone()
        .oneshot(json_request(
            Method::POST,
            "/api/posts",
            json!({"title": "", "status": "unknown"}),
        ))
        .await
        .expect("invalid response");
    assert_eq!(invalid.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let invalid_body = decode_json(invalid).await;
    assert_eq!(invalid_body["code"], json!("validation_error"));
    assert_eq!(invalid_body["errors"]["title"], json!(["The title field is required."]));
    assert_eq!(invalid_body["errors"]["status"], json!(["The selected status is invalid."]));

    let updated = router
        .clone()
        .oneshot(json_request(Method::PATCH, &format!("/api/posts/{id}"), json!({"status": "live"})))
        .await
        .expect("update response");
    assert_eq!(updated.status(), StatusCode::OK);
    let updated_body = decode_json(updated).await;
    assert_eq!(updated_body["status"], json!("live"));
    assert_eq!(updated_body["title"], json!("Hello"));

    let listed = router
        .clone()
        .oneshot(empty_request(Method::GET, "/api/posts?per_page=5"))
        .await
        .expect("list response");
    assert_eq!(listed.status(), StatusCode::OK);
    let listed_body = decode_json(listed).await;
    assert_eq!(listed_body["total"], json!(1));
    assert_eq!(listed_body["per_page"], json!(5));
    assert_eq!(listed_body["data"][0]["id"], json!(id));
    assert!(listed_body["data"][0].get("secret").is_none());

    let all = router
        .clone()
        .oneshot(empty_request(Method::GET, "/api/posts?paginate=false"))
        .await
        .expect("list response");
    let all_body = decode_json(all).await;
    assert_eq!(all_body.as_array().map(Vec::len), Some(1));

    let deleted = router
        .clone()
        .oneshot(empty_request(Method::DELETE, &format!("/api/posts/{id}")))
        .await
        .expect("delete response");
    assert_eq!(deleted.status(), StatusCode::NO_CONTENT);

    let missing = router
        .clone()
        .oneshot(empty_request(Method::GET, &format!("/api/posts/{id}")))
        .await
        .expect("view response");
    assert_eq!(missing.status(), StatusCode::NOT_FOUND);
    assert_eq!(decode_json(missing).await["code"], json!("not_found"));
}

#[tokio::test]
async fn test_definition_route_serves_grouped_and_flat_views() {
    let Harness { router, .. } = harness();

    let full = router
        .clone()
        .oneshot(empty_request(Method::GET, "/api/posts/definition"))
        .await
        .expect("definition response");
    assert_eq!(full.status(), StatusCode::OK);
    let full_body = decode_json(full).await;
    assert_eq!(full_body["rules"]["title"], json!("required|string|max:255"));
    assert!(full_body["field_groups"].is_object());

    let flat = router
        .clone()
        .oneshot(empty_request(Method::GET, "/api/posts/definition?flat=1"))
        .await
        .expect("flat response");
    let flat_body = decode_json(flat).await;
    assert_eq!(flat_body["status"]["type"], json!("ENUM"));
    assert_eq!(flat_body["gallery"]["input_type"], json!("image-upload"));
}

#[tokio::test]
async fn test_relations_sync_on_save_and_respect_permissions() {
    let Harness { router, store, .. } = harness();
    let id = create_post(&router, json!({"title": "Tagged", "tags": [2, 3]})).await;

    let mut tags = store.related_ids("Post", id, "tags").await.expect("tags");
    tags.sort_unstable();
    assert_eq!(tags, vec![2, 3]);

    let attached = router
        .clone()
        .oneshot(json_request(
            Method::POST,
            &format!("/api/posts/{id}/relations/tags/attach"),
            json!({"related_ids": [4, "5"]}),
        ))
        .await
        .expect("attach response");
    assert_eq!(attached.status(), StatusCode::NO_CONTENT);

    let detached = router
        .clone()
        .oneshot(empty_request(
            Method::POST,
            &format!("/api/posts/{id}/relations/tags/detach?related_id=2"),
        ))
        .await
        .expect("detach response");
    assert_eq!(detached.status(), StatusCode::NO_CONTENT);

    let mut tags = store.related_ids("Post", id, "tags").await.expect("tags");
    tags.sort_unstable();
    assert_eq!(tags, vec![3, 4, 5]);

    let forbidden = router
        .clone()
        .oneshot(json_request(
            Method::POST,
            &format!("/api/posts/{id}/relations/comments/attach"),
            json!({"related_id": 7}),
        ))
        .await
        .expect("forbidden response");
    assert_eq!(forbidden.status(), StatusCode::FORBIDDEN);
    assert_eq!(decode_json(forbidden).await["message"], json!("Insufficient permissions"));
    assert!(store.related_ids("Post", id, "comments").await.expect("comments").is_empty());

    let unknown = router
        .clone()
        .oneshot(json_request(
            Method::POST,
            &format!("/api/posts/{id}/relations/authors/attach"),
            json!({"related_id": 1}),
        ))
        .await
        .expect("unknown relation response");
    assert_eq!(unknown.status(), StatusCode::NOT_FOUND);

    let bad_ids = router
        .clone()
        .oneshot(json_request(
            Method::POST,
            &format!("/api/posts/{id}/relations/tags/attach"),
            json!({"related_ids": ["x"]}),
        ))
        .await
        .expect("bad ids response");
    assert_eq!(bad_ids.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn test_media_removals_run_before_additions() {
    let Harness {
        router,
        media,
        upload_root,
        _uploads,
        ..
    } = harness();
    let encoded = STANDARD.encode(PNG);

    let id = create_post(
        &router,
        json!({"title": "Gallery", "gallery": [{"add": true, "base64": encoded, "name": "one.png"}]}),
    )
    .await;
    assert_eq!(media.events().await, vec![MediaEvent::Added(1)]);

    tokio::fs::write(upload_root.join("chunked01"), PNG)
        .await
        .expect("write upload");

    let updated = router
        .clone()
        .oneshot(json_request(
            Method::PUT,
            &format!("/api/posts/{id}"),
            json!({"gallery": [
                {"add": true, "tusKey": "chunked01"},
                {"add": true, "base64": STANDARD.encode(b"plain text")},
                {"remove": true, "id": 1}
            ]}),
        ))
        .await
        .expect("update response");
    assert_eq!(updated.status(), StatusCode::OK);

    assert_eq!(
        media.events().await,
        vec![MediaEvent::Added(1), MediaEvent::Removed(1), MediaEvent::Added(2)]
    );

    let items = media
        .list(&MediaOwner::new("Post", id), Some("gallery"))
        .await
        .expect("media items");
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].mime_type, "image/png");
    assert_eq!(items[0].content_disposition, None);
}

#[tokio::test]
async fn test_malformed_bodies_are_rejected() {
    let Harness { router, .. } = harness();

    let request = Request::builder()
        .method(Method::POST)
        .uri("/api/posts")
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .expect("request");
    let response = router.clone().oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(decode_json(response).await["code"], json!("input_error"));

    let response = router
        .clone()
        .oneshot(json_request(Method::POST, "/api/posts", json!([1, 2])))
        .await
        .expect("response");
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}
