// ============================================================================
// schemaform Library
// ============================================================================

//! Declarative field definitions for entities.
//!
//! An entity describes its fields once, through [`Entity::define`]; the
//! compiled definition then drives mass-assignment guards, validation rules,
//! attribute transformation, form metadata and a generic CRUD surface.
//!
//! ```
//! use schemaform::builder::DefinitionBuilder;
//! use schemaform::field::{SelectField, TextField};
//! use schemaform::{DefinitionCompiler, Entity, Model, SchemaConfig};
//! use std::sync::Arc;
//!
//! #[derive(Default)]
//! struct Article;
//!
//! impl Entity for Article {
//!     const TYPE_NAME: &'static str = "Article";
//!
//!     fn define(&self, mut builder: DefinitionBuilder) -> schemaform::Result<DefinitionBuilder> {
//!         builder
//!             .add_field(TextField::new("title").required(true))?
//!             .add_field(SelectField::new("status").options([("draft", "Draft"), ("live", "Live")]))?;
//!         Ok(builder)
//!     }
//! }
//!
//! # fn main() -> schemaform::Result<()> {
//! let compiler = Arc::new(DefinitionCompiler::new(SchemaConfig::default()));
//! let mut model = Model::<Article>::new(compiler)?;
//! model.compile_definition(false)?;
//!
//! assert!(model.fillable().iter().any(|name| name == "status"));
//! assert_eq!(model.flat_definition()?.len(), 2);
//! # Ok(())
//! # }
//! ```

pub mod builder;
pub mod compiler;
pub mod config;
pub mod core;
pub mod field;
pub mod i18n;
pub mod media;
pub mod naming;
pub mod pipeline;
pub mod relation;
pub mod service;
pub mod store;
pub mod uploads;
pub mod validation;
pub mod web;

// Re-export main types for convenience
pub use builder::{CompiledDefinition, DefinitionBuilder, FlatDefinition};
pub use compiler::{CompilationContext, DefinitionCompiler, Entity, Model};
pub use config::SchemaConfig;
pub use core::{Attributes, Result, SchemaError, StorageType};
pub use field::FieldDescriptor;
pub use relation::{RelationInfo, RelationKind, RelationRegistry};
pub use validation::{ValidationErrors, Validator};

// ============================================================================
// Resource surface
// ============================================================================

pub use media::{MediaLibrary, MemoryMediaLibrary};
pub use service::{ResourceService, ServiceError};
pub use store::{EntityStore, MemoryStore};
pub use uploads::{DiskUploadStore, UploadStore};
pub use web::resource_router;
