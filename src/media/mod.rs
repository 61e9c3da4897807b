//! Media library contract and file-operation handling for MEDIA fields.

pub mod mime;
pub mod operations;

pub use mime::{DecodedPayload, decode_base64_payload, sniff_mime};
pub use operations::{FileOperation, FileSource, ParsedOperation, parse_operations, removals_first};

use crate::core::{Result, SchemaError};
use crate::store::RecordId;
use async_trait::async_trait;
use serde::Serialize;
use std::path::PathBuf;
use tokio::sync::Mutex;

/// Owner of a media item: an entity row, or a meta entry as `Type:relation`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct MediaOwner {
    pub owner_type: String,
    pub id: RecordId,
}

impl MediaOwner {
    pub fn new(owner_type: impl Into<String>, id: RecordId) -> Self {
        Self {
            owner_type: owner_type.into(),
            id,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum MediaSource {
    Bytes(Vec<u8>),
    Path(PathBuf),
}

/// A file ready to be attached to a collection.
#[derive(Debug, Clone, PartialEq)]
pub struct NewMedia {
    pub source: MediaSource,
    pub mime_type: String,
    pub collection: String,
    /// Display name, when the client supplied one.
    pub name: Option<String>,
    pub content_disposition: Option<String>,
}

impl NewMedia {
    /// Attachment disposition used for generic files.
    pub fn attachment(mut self) -> Self {
        self.content_disposition = Some(match &self.name {
            Some(name) => format!("attachment; filename=\"{name}\""),
            None => "attachment".to_string(),
        });
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MediaItem {
    pub id: RecordId,
    pub owner: MediaOwner,
    pub collection: String,
    pub mime_type: String,
    pub name: Option<String>,
    pub content_disposition: Option<String>,
    pub size: u64,
}

#[async_trait]
pub trait MediaLibrary: Send + Sync {
    async fn add(&self, owner: &MediaOwner, media: NewMedia) -> Result<MediaItem>;

    /// Remove an item of `owner`; `NotFound` if it does not belong to it.
    async fn remove(&self, owner: &MediaOwner, id: RecordId) -> Result<()>;

    async fn list(&self, owner: &MediaOwner, collection: Option<&str>) -> Result<Vec<MediaItem>>;
}

/// One call recorded by [`MemoryMediaLibrary`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaEvent {
    Added(RecordId),
    Removed(RecordId),
}

#[derive(Default)]
struct LibraryState {
    next_id: RecordId,
    items: Vec<MediaItem>,
    events: Vec<MediaEvent>,
}

/// In-process [`MediaLibrary`] that keeps a log of applied operations.
#[derive(Default)]
pub struct MemoryMediaLibrary {
    state: Mutex<LibraryState>,
}

impl MemoryMediaLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn events(&self) -> Vec<MediaEvent> {
        self.state.lock().await.events.clone()
    }
}

#[async_trait]
impl MediaLibrary for MemoryMediaLibrary {
    async fn add(&self, owner: &MediaOwner, media: NewMedia) -> Result<MediaItem> {
        let size = match &media.source {
            MediaSource::Bytes(bytes) => bytes.len() as u64,
            MediaSource::Path(path) => tokio::fs::metadata(path).await?.len(),
        };

        let mut state = self.state.lock().await;
        state.next_id += 1;
        let item = MediaItem {
            id: state.next_id,
            owner: owner.clone(),
            collection: media.collection,
            mime_type: media.mime_type,
            name: media.name,
            content_disposition: media.content_disposition,
            size,
        };
        state.items.push(item.clone());
        state.events.push(MediaEvent::Added(item.id));
        Ok(item)
    }

    async fn remove(&self, owner: &MediaOwner, id: RecordId) -> Result<()> {
        let mut state = self.state.lock().await;
        let position = state
            .items
            .iter()
            .position(|item| item.id == id && &item.owner == owner)
            .ok_or_else(|| SchemaError::NotFound(format!("media {id}")))?;
        state.items.remove(position);
        state.events.push(MediaEvent::Removed(id));
        Ok(())
    }

    async fn list(&self, owner: &MediaOwner, collection: Option<&str>) -> Result<Vec<MediaItem>> {
        let state = self.state.lock().await;
        Ok(state
            .items
            .iter()
            .filter(|item| &item.owner == owner)
            .filter(|item| collection.is_none_or(|c| item.collection == c))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png(collection: &str) -> NewMedia {
        NewMedia {
            source: MediaSource::Bytes(vec![1, 2, 3]),
            mime_type: "image/png".into(),
            collection: collection.into(),
            name: None,
            content_disposition: None,
        }
    }

    #[tokio::test]
    async fn test_items_are_scoped_to_owner() {
        let library = MemoryMediaLibrary::new();
        let page = MediaOwner::new("Page", 1);
        let other = MediaOwner::new("Page", 2);

        let item = library.add(&page, png("gallery")).await.unwrap();
        library.add(&page, png("cover")).await.unwrap();
        assert_eq!(item.size, 3);

        assert_eq!(library.list(&page, Some("gallery")).await.unwrap().len(), 1);
        assert_eq!(library.list(&page, None).await.unwrap().len(), 2);

        let err = library.remove(&other, item.id).await.unwrap_err();
        assert!(matches!(err, SchemaError::NotFound(_)));
        library.remove(&page, item.id).await.unwrap();

        assert_eq!(
            library.events().await,
            vec![MediaEvent::Added(1), MediaEvent::Added(2), MediaEvent::Removed(1)]
        );
    }

    #[test]
    fn test_attachment_disposition_names_file() {
        let mut media = png("files");
        assert_eq!(media.clone().attachment().content_disposition.as_deref(), Some("attachment"));
        media.name = Some("report.pdf".into());
        assert_eq!(
            media.attachment().content_disposition.as_deref(),
            Some("attachment; filename=\"report.pdf\"")
        );
    }
}
