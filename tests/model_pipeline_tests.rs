use schemaform::builder::DefinitionBuilder;
use schemaform::field::{CheckboxField, DateTimeField, JsonField, PasswordField, SelectField, TextField};
use schemaform::{Attributes, DefinitionCompiler, Entity, Model, SchemaConfig, SchemaError};
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

#[derive(Default)]
struct Article;

impl Entity for Article {
    const TYPE_NAME: &'static str = "Article";

    fn define(&self, mut builder: DefinitionBuilder) -> schemaform::Result<DefinitionBuilder> {
        builder
            .add_field(TextField::new("title").required(true))?
            .add_field(SelectField::new("status").options([("draft", "Draft"), ("live", "Live")]))?
            .add_field(CheckboxField::new("channels").options([("web", "Web"), ("print", "Print")]))?
            .add_field(JsonField::new("settings"))?
            .add_field(DateTimeField::new("published_at"))?
            .add_field(PasswordField::new("secret").hidden(true))?;
        Ok(builder)
    }
}

static CACHED_DEFINES: AtomicUsize = AtomicUsize::new(0);

#[derive(Default)]
struct CachedArticle;

impl Entity for CachedArticle {
    const TYPE_NAME: &'static str = "CachedArticle";

    fn define(&self, mut builder: DefinitionBuilder) -> schemaform::Result<DefinitionBuilder> {
        CACHED_DEFINES.fetch_add(1, Ordering::SeqCst);
        builder
            .set_cacheable(true, None)?
            .add_field(TextField::new("title").required(true))?;
        Ok(builder)
    }
}

#[derive(Default)]
struct Forever;

impl Entity for Forever {
    const TYPE_NAME: &'static str = "Forever";

    fn define(&self, mut builder: DefinitionBuilder) -> schemaform::Result<DefinitionBuilder> {
        builder
            .set_cacheable(true, Some(Duration::MAX))?
            .add_field(TextField::new("title"))?;
        Ok(builder)
    }
}

#[derive(Default)]
struct Scoped;

impl Entity for Scoped {
    const TYPE_NAME: &'static str = "Scoped";

    fn define(&self, builder: DefinitionBuilder) -> schemaform::Result<DefinitionBuilder> {
        Ok(builder)
    }

    fn fillable(&self) -> Vec<String> {
        vec!["a".to_string(), "b".to_string()]
    }

    fn rules(&self) -> BTreeMap<String, String> {
        [
            ("a".to_string(), "required".to_string()),
            ("b".to_string(), "required".to_string()),
            ("c".to_string(), "required".to_string()),
        ]
        .into()
    }
}

fn compiler() -> Arc<DefinitionCompiler> {
    Arc::new(DefinitionCompiler::new(SchemaConfig::default()))
}

fn attrs(value: Value) -> Attributes {
    value.as_object().cloned().expect("object")
}

#[test]
fn test_article_validation_reports_every_failing_field() {
    let mut model = Model::<Article>::new(compiler()).expect("model");
    let input = model
        .prepare_attributes(attrs(json!({"title": "", "status": "unknown"})), true)
        .expect("prepare");
    model.fill(input);

    let err = model.validate().expect_err("invalid article");
    let errors = err.validation_errors().expect("validation failure");
    assert_eq!(errors.messages("title"), ["The title field is required."]);
    assert_eq!(errors.messages("status"), ["The selected status is invalid."]);
    assert_eq!(errors.len(), 2);
}

#[test]
fn test_article_passes_and_keeps_status() {
    let mut model = Model::<Article>::new(compiler()).expect("model");
    let input = model
        .prepare_attributes(attrs(json!({"title": "Hi", "status": "live"})), true)
        .expect("prepare");
    model.fill(input);

    model.prepare_for_save().expect("valid article");
    assert_eq!(model.get_attribute("status"), Some(&json!("live")));
    assert_eq!(model.get_attribute("title"), Some(&json!("Hi")));
}

#[test]
fn test_save_encodes_json_and_joins_enum_arrays() {
    let mut model = Model::<Article>::new(compiler()).expect("model");
    model.fill(attrs(json!({
        "title": "Hi",
        "channels": ["web", "", null, "print"],
        "settings": {"featured": true}
    })));
    model.validate_on_save = false;
    model.prepare_for_save().expect("save");

    assert_eq!(model.get_attribute("channels"), Some(&json!("web;print")));
    let stored = model.get_attribute("settings").cloned().expect("settings");
    assert_eq!(stored, json!("{\"featured\":true}"));

    let decoded = model
        .transform_attributes_for_validation(model.attributes().clone())
        .expect("decode");
    assert_eq!(decoded["settings"], json!({"featured": true}));
    assert_eq!(decoded["channels"], json!("web;print"));
}

#[test]
fn test_prepare_attributes_normalizes_dates_and_filters_guards() {
    let mut model = Model::<Article>::new(compiler()).expect("model");
    let prepared = model
        .prepare_attributes(
            attrs(json!({
                "title": "Hi",
                "published_at": "2024-03-01T12:30:00+01:00",
                "created_at": "2024-03-01 12:30:00 +0100",
                "unknown": 1
            })),
            true,
        )
        .expect("prepare");

    assert_eq!(prepared["published_at"], json!("2024-03-01 11:30:00"));
    assert!(prepared.get("unknown").is_none());
    assert!(prepared.get("created_at").is_none());

    let manual = model
        .prepare_attributes(attrs(json!({"created_at": "2024-03-01 12:30:00 +0100"})), false)
        .expect("prepare manual");
    assert_eq!(manual["created_at"], json!("2024-03-01 11:30:00"));
}

#[test]
fn test_hidden_fields_are_left_out_of_visible_json() {
    let mut model = Model::<Article>::from_record(compiler(), 3, attrs(json!({"title": "Hi", "secret": "x"})))
        .expect("model");
    model.compile_definition(false).expect("compile");

    assert_eq!(model.to_visible_json(), json!({"id": 3, "title": "Hi"}));
}

#[test]
fn test_validation_scope_covers_present_and_fillable_keys() {
    let mut model = Model::<Scoped>::new(compiler()).expect("model");
    model.fill(attrs(json!({"a": "x"})));

    let err = model.validate().expect_err("b is missing");
    let errors = err.validation_errors().expect("validation failure");
    assert!(errors.has("b"));
    assert!(!errors.has("a"));
    assert!(!errors.has("c"));
}

#[test]
fn test_cached_definitions_skip_define_until_flushed() {
    let compiler = compiler();

    let mut first = Model::<CachedArticle>::new(Arc::clone(&compiler)).expect("model");
    first.compile_definition(false).expect("compile");
    let mut second = Model::<CachedArticle>::new(Arc::clone(&compiler)).expect("model");
    second.compile_definition(false).expect("compile");

    assert_eq!(CACHED_DEFINES.load(Ordering::SeqCst), 1);
    assert_eq!(
        first.full_definition().expect("full"),
        second.full_definition().expect("full")
    );

    compiler.flush_definitions().expect("flush");
    let mut third = Model::<CachedArticle>::new(Arc::clone(&compiler)).expect("model");
    third.compile_definition(false).expect("compile");
    assert_eq!(CACHED_DEFINES.load(Ordering::SeqCst), 2);

    let mut forced = Model::<CachedArticle>::new(compiler).expect("model");
    forced.compile_definition(true).expect("compile");
    assert_eq!(CACHED_DEFINES.load(Ordering::SeqCst), 3);
}

#[test]
fn test_unbounded_cache_lifetime_still_compiles_and_caches() {
    let compiler = compiler();

    let mut first = Model::<Forever>::new(Arc::clone(&compiler)).expect("model");
    first.compile_definition(false).expect("compile");
    let mut second = Model::<Forever>::new(compiler).expect("model");
    second.compile_definition(false).expect("compile");

    assert_eq!(
        first.full_definition().expect("full"),
        second.full_definition().expect("full")
    );
    assert_eq!(second.rules().get("title").map(String::as_str), Some("nullable|string|max:255"));
}

#[test]
fn test_definition_errors_abort_compilation() {
    #[derive(Default)]
    struct Broken;

    impl Entity for Broken {
        const TYPE_NAME: &'static str = "Broken";

        fn define(&self, mut builder: DefinitionBuilder) -> schemaform::Result<DefinitionBuilder> {
            builder.add_field(TextField::new("title").group("sidebar"))?;
            Ok(builder)
        }
    }

    let mut model = Model::<Broken>::new(compiler()).expect("model");
    let err = model.compile_definition(false).expect_err("unknown group");
    assert!(matches!(err, SchemaError::InvalidFieldDefinition { field, .. } if field == "title"));
    assert!(!model.is_defined());
}
