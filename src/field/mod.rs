//! Field descriptors.
//!
//! A field is configured fluently through [`Field<K>`], where `K` is the variant
//! marker that fixes the storage type and owns the variant payload. Capabilities
//! shared by several variants (length bounds, option lists, date bounds,
//! relations, uploads, sub-schemas) are generic over the variant.
//!
//! ```
//! use schemaform::field::{SelectField, TextField};
//!
//! let title = TextField::new("title").label("Title").required(true).max_length(120);
//! let status = SelectField::new("status").options([("draft", "Draft"), ("live", "Live")]);
//!
//! assert_eq!(title.rule_string(), "required|string|max:120");
//! assert_eq!(status.rule_string(), "nullable|in:draft,live");
//! ```

mod base;
pub mod descriptor;
pub mod kinds;
pub mod media;
pub mod nested;
pub mod payload;
pub mod relation;

pub use base::{Field, FieldBase, FieldKind, FieldSpec};
pub use descriptor::FieldDescriptor;
pub use payload::{
    ChoiceConfig, ExtraData, FieldPayload, LengthBounds, MediaConfig, MediaType, NestedConfig,
    NestedFields, OptionList, RelationConfig, SearchConfig, TemporalConfig,
};

pub type TextField = Field<kinds::Text>;
pub type TextAreaField = Field<kinds::TextArea>;
pub type EmailField = Field<kinds::Email>;
pub type TelField = Field<kinds::Tel>;
pub type PasswordField = Field<kinds::Password>;
pub type PasswordConfirmField = Field<kinds::PasswordConfirm>;
pub type WysiwygField = Field<kinds::Wysiwyg>;
pub type IntField = Field<kinds::Int>;
pub type FloatField = Field<kinds::Float>;
pub type BoolField = Field<kinds::Bool>;
pub type SelectField = Field<kinds::Select>;
pub type RadioField = Field<kinds::Radio>;
pub type CheckboxField = Field<kinds::Checkbox>;
pub type DateField = Field<kinds::Date>;
pub type DateTimeField = Field<kinds::DateTime>;
pub type TimeField = Field<kinds::Time>;
pub type JsonField = Field<nested::Json>;
pub type RepeatableJsonField = Field<nested::RepeatableJson>;
pub type MetaField = Field<nested::Meta>;
pub type HasOneField = Field<relation::HasOne>;
pub type HasManyField = Field<relation::HasMany>;
pub type HasManySelectField = Field<relation::HasManySelect>;
pub type ManyToManyField = Field<relation::ManyToMany>;
pub type FileUploadField = Field<media::FileUpload>;
pub type ImageUploadField = Field<media::ImageUpload>;
