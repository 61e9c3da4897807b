//! File and image upload fields.

use crate::core::StorageType;
use crate::field::base::{Field, FieldBase, FieldKind};
use crate::field::payload::{FieldPayload, MediaConfig, MediaType};
use serde_json::json;

pub const DEFAULT_IMAGE_MIME_TYPES: &[&str] = &["image/jpeg", "image/png"];

pub const DEFAULT_FILE_MIME_TYPES: &[&str] = &[
    "image/jpeg",
    "image/png",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "application/vnd.ms-excel",
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
    "application/vnd.ms-powerpoint",
    "application/vnd.openxmlformats-officedocument.presentationml.presentation",
    "application/vnd.oasis.opendocument.text",
    "application/vnd.oasis.opendocument.presentation",
    "application/vnd.oasis.opendocument.spreadsheet",
    "application/vnd.apple.keynote",
    "application/x-iwork-pages-sffpages",
    "application/x-iwork-keynote-sffkey",
    "application/vnd.apple.pages",
    "application/x-iwork-numbers-sffnumbers",
    "application/vnd.apple.numbers",
    "text/plain",
    "text/csv",
    "application/pdf",
    "application/zip",
];

/// Upload variants sharing [`MediaConfig`].
pub trait Upload {
    fn media_mut(&mut self) -> &mut MediaConfig;
}

#[derive(Debug, Clone, PartialEq)]
pub struct FileUpload {
    media: MediaConfig,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImageUpload {
    media: MediaConfig,
}

impl Default for FileUpload {
    fn default() -> Self {
        Self {
            media: MediaConfig {
                media_type: MediaType::Files,
                mime_types: DEFAULT_FILE_MIME_TYPES.iter().map(|m| m.to_string()).collect(),
                collection: None,
                multiple: None,
                upload_endpoint: None,
            },
        }
    }
}

impl Default for ImageUpload {
    fn default() -> Self {
        Self {
            media: MediaConfig {
                media_type: MediaType::Images,
                mime_types: DEFAULT_IMAGE_MIME_TYPES.iter().map(|m| m.to_string()).collect(),
                collection: None,
                multiple: None,
                upload_endpoint: None,
            },
        }
    }
}

fn init_upload(base: &mut FieldBase) {
    base.fillable = false;
    base.push_rule("array");
    base.default_value = json!([]);
}

/// Collection falls back to the field name.
fn media_payload(media: &MediaConfig, base: &FieldBase) -> FieldPayload {
    let mut media = media.clone();
    if media.collection.is_none() {
        media.collection = base.name.clone();
    }
    FieldPayload::Media(media)
}

impl FieldKind for FileUpload {
    const STORAGE_TYPE: StorageType = StorageType::Media;
    const INPUT_TYPE: &'static str = "file-upload";

    fn init(base: &mut FieldBase) {
        init_upload(base);
    }

    fn payload(&self, base: &FieldBase) -> FieldPayload {
        media_payload(&self.media, base)
    }
}

impl FieldKind for ImageUpload {
    const STORAGE_TYPE: StorageType = StorageType::Media;
    const INPUT_TYPE: &'static str = "image-upload";

    fn init(base: &mut FieldBase) {
        init_upload(base);
    }

    fn payload(&self, base: &FieldBase) -> FieldPayload {
        media_payload(&self.media, base)
    }
}

impl Upload for FileUpload {
    fn media_mut(&mut self) -> &mut MediaConfig {
        &mut self.media
    }
}

impl Upload for ImageUpload {
    fn media_mut(&mut self) -> &mut MediaConfig {
        &mut self.media
    }
}

impl<K: FieldKind + Upload> Field<K> {
    pub fn multiple(mut self, multiple: bool) -> Self {
        self.kind.media_mut().multiple = Some(multiple);
        self
    }

    pub fn collection(mut self, collection: &str) -> Self {
        self.kind.media_mut().collection = Some(collection.to_string());
        self
    }

    /// Replace the accepted MIME types.
    pub fn allowed_mime_types<I, S>(mut self, mime_types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.kind.media_mut().mime_types = mime_types.into_iter().map(Into::into).collect();
        self
    }

    /// Accept chunked uploads through `endpoint`.
    pub fn chunked_uploads(mut self, endpoint: &str) -> Self {
        self.kind.media_mut().upload_endpoint = Some(endpoint.to_string());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::field::FieldSpec;

    #[test]
    fn test_image_upload_defaults() {
        let def = Field::<ImageUpload>::new("gallery").multiple(true).definition();

        assert_eq!(def.storage_type, StorageType::Media);
        assert_eq!(def.default_value, json!([]));
        assert_eq!(def.rule_string, "nullable|array");
        assert!(!def.fillable);
        assert_eq!(def.extra_data.get("collection"), Some(json!("gallery")));
        assert_eq!(def.extra_data.get("media_type"), Some(json!("images")));
        assert_eq!(def.extra_data.get("mime_types"), Some(json!(["image/jpeg", "image/png"])));
        assert_eq!(def.extra_data.get("tus"), Some(json!(false)));
        assert_eq!(def.extra_data.get("multiple"), Some(json!(true)));
    }

    #[test]
    fn test_mime_types_are_replaced_not_merged() {
        let def = Field::<FileUpload>::new("attachments")
            .allowed_mime_types(["application/pdf"])
            .collection("docs")
            .chunked_uploads("/uploads")
            .definition();

        assert_eq!(def.extra_data.get("mime_types"), Some(json!(["application/pdf"])));
        assert_eq!(def.extra_data.get("collection"), Some(json!("docs")));
        assert_eq!(def.extra_data.get("tus"), Some(json!(true)));
        assert_eq!(def.extra_data.get("tus_endpoint"), Some(json!("/uploads")));
    }
}
