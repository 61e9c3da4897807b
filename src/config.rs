//! Process configuration for definition compilation, caching and uploads.

use crate::builder::{FieldGroup, Tabbed};
use crate::core::{Result, SchemaError};
use crate::field::media::{DEFAULT_FILE_MIME_TYPES, DEFAULT_IMAGE_MIME_TYPES};
use std::path::PathBuf;
use std::time::Duration;

/// Default cache lifetime of a compiled definition (two weeks).
pub const DEFAULT_CACHE_TTL_MINUTES: u64 = 20160;

/// Tag shared by every cached definition so they can be flushed together.
pub const DEFAULT_CACHE_TAG: &str = "schemaform.model_definitions";

/// Group assigned to fields that do not name one.
pub const DEFAULT_FIELD_GROUP: &str = "general";

/// Group relation-list fields land in when it is configured.
pub const RELATIONS_FIELD_GROUP: &str = "relations";

/// Configuration shared by builders, the compiler and the upload store
#[derive(Debug, Clone)]
pub struct SchemaConfig {
    /// Groups every new builder is seeded with
    pub field_groups: Vec<FieldGroup>,

    /// Group used when a field does not name one
    pub default_field_group: String,

    /// Tag under which compiled definitions are cached
    pub cache_tag: String,

    /// Default time-to-live for cacheable definitions
    pub cache_ttl: Duration,

    /// Maximum number of definitions held by the in-memory cache
    pub cache_capacity: usize,

    /// Directory chunked uploads are assembled into
    pub upload_dir: PathBuf,

    /// Largest accepted upload in bytes
    pub upload_max_size: u64,

    /// Age after which an unclaimed upload is removed
    pub upload_stale_after: Duration,

    /// MIME types accepted by file-upload fields by default
    pub allowed_file_mime_types: Vec<String>,

    /// MIME types accepted by image-upload fields by default
    pub allowed_image_mime_types: Vec<String>,
}

impl SchemaConfig {
    /// Create a configuration with the stock defaults
    pub fn new() -> Self {
        Self {
            field_groups: vec![
                FieldGroup::new(DEFAULT_FIELD_GROUP, "", "", Tabbed::No, 0),
                FieldGroup::new(RELATIONS_FIELD_GROUP, "", "", Tabbed::No, 100),
            ],
            default_field_group: DEFAULT_FIELD_GROUP.to_string(),
            cache_tag: DEFAULT_CACHE_TAG.to_string(),
            cache_ttl: Duration::from_secs(DEFAULT_CACHE_TTL_MINUTES * 60),
            cache_capacity: 512,
            upload_dir: std::env::temp_dir().join("schemaform-uploads"),
            upload_max_size: 100 * 1024 * 1024,
            upload_stale_after: Duration::from_secs(2 * 24 * 60 * 60),
            allowed_file_mime_types: DEFAULT_FILE_MIME_TYPES.iter().map(|m| m.to_string()).collect(),
            allowed_image_mime_types: DEFAULT_IMAGE_MIME_TYPES.iter().map(|m| m.to_string()).collect(),
        }
    }

    /// Overlay `SCHEMAFORM_*` environment variables on the defaults
    pub fn from_env() -> Result<Self> {
        let mut config = Self::new();

        if let Ok(group) = std::env::var("SCHEMAFORM_DEFAULT_FIELD_GROUP") {
            config.default_field_group = group;
        }
        if let Ok(tag) = std::env::var("SCHEMAFORM_CACHE_TAG") {
            config.cache_tag = tag;
        }
        if let Ok(minutes) = std::env::var("SCHEMAFORM_CACHE_TTL_MINUTES") {
            config.cache_ttl = parse_env_duration("SCHEMAFORM_CACHE_TTL_MINUTES", &minutes, 60)?;
        }
        if let Ok(dir) = std::env::var("SCHEMAFORM_UPLOAD_DIR") {
            config.upload_dir = PathBuf::from(dir);
        }
        if let Ok(size) = std::env::var("SCHEMAFORM_UPLOAD_MAX_SIZE") {
            config.upload_max_size = parse_env_number("SCHEMAFORM_UPLOAD_MAX_SIZE", &size)?;
        }
        if let Ok(hours) = std::env::var("SCHEMAFORM_UPLOAD_STALE_HOURS") {
            config.upload_stale_after = parse_env_duration("SCHEMAFORM_UPLOAD_STALE_HOURS", &hours, 3600)?;
        }

        config.validate().map_err(SchemaError::Precondition)?;
        Ok(config)
    }

    /// Replace the seeded field groups
    pub fn field_groups(mut self, groups: Vec<FieldGroup>) -> Self {
        self.field_groups = groups;
        self
    }

    /// Set the default field group
    pub fn default_field_group(mut self, key: &str) -> Self {
        self.default_field_group = key.to_string();
        self
    }

    /// Set the cache tag
    pub fn cache_tag(mut self, tag: &str) -> Self {
        self.cache_tag = tag.to_string();
        self
    }

    /// Set the default cache time-to-live
    pub fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    /// Set the in-memory cache capacity
    pub fn cache_capacity(mut self, capacity: usize) -> Self {
        self.cache_capacity = capacity;
        self
    }

    /// Set the upload directory
    pub fn upload_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.upload_dir = dir.into();
        self
    }

    /// Set the maximum upload size
    pub fn upload_max_size(mut self, bytes: u64) -> Self {
        self.upload_max_size = bytes;
        self
    }

    /// Set the stale upload threshold
    pub fn upload_stale_after(mut self, age: Duration) -> Self {
        self.upload_stale_after = age;
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.default_field_group.is_empty() {
            return Err("Default field group cannot be empty".to_string());
        }

        if !self.field_groups.iter().any(|g| g.key == self.default_field_group) {
            return Err(format!(
                "Default field group '{}' is not one of the configured groups",
                self.default_field_group
            ));
        }

        if self.cache_capacity == 0 {
            return Err("cache_capacity must be > 0".to_string());
        }

        if self.upload_max_size == 0 {
            return Err("upload_max_size must be > 0".to_string());
        }

        Ok(())
    }
}

impl Default for SchemaConfig {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_env_number(name: &str, raw: &str) -> Result<u64> {
    raw.trim()
        .parse::<u64>()
        .map_err(|_| SchemaError::Precondition(format!("{name} must be a non-negative integer, got '{raw}'")))
}

/// Parse a count of `unit_secs`-second units into a duration.
fn parse_env_duration(name: &str, raw: &str, unit_secs: u64) -> Result<Duration> {
    parse_env_number(name, raw)?
        .checked_mul(unit_secs)
        .map(Duration::from_secs)
        .ok_or_else(|| SchemaError::Precondition(format!("{name} is too large, got '{raw}'")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SchemaConfig::default();
        assert_eq!(config.default_field_group, "general");
        assert_eq!(config.cache_ttl, Duration::from_secs(20160 * 60));
        assert_eq!(config.field_groups.len(), 2);
        assert_eq!(config.field_groups[1].key, "relations");
        assert_eq!(config.field_groups[1].order, 100);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_builder() {
        let config = SchemaConfig::new()
            .cache_tag("defs")
            .cache_capacity(8)
            .upload_max_size(1024);

        assert_eq!(config.cache_tag, "defs");
        assert_eq!(config.cache_capacity, 8);
        assert_eq!(config.upload_max_size, 1024);
    }

    #[test]
    fn test_validation() {
        let config = SchemaConfig::new().default_field_group("sidebar");
        assert!(config.validate().is_err());

        let config = SchemaConfig::new().cache_capacity(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_env_number_parsing() {
        assert_eq!(parse_env_number("X", " 42 ").unwrap(), 42);
        assert!(parse_env_number("X", "soon").is_err());
    }

    #[test]
    fn test_env_duration_rejects_overflow() {
        assert_eq!(parse_env_duration("X", "2", 60).unwrap(), Duration::from_secs(120));
        let err = parse_env_duration("X", &u64::MAX.to_string(), 60).unwrap_err();
        assert!(matches!(err, SchemaError::Precondition(message) if message.contains("too large")));
    }
}
