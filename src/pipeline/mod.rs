//! Save-time attribute pipeline.
//!
//! [`transform`] holds the pure conversions between request, validation and
//! storage forms; [`sync`] writes the parts of an entity that live outside
//! its row once the row is saved.

pub mod sync;
pub mod transform;

pub use sync::{SyncContext, after_save, sync_media, validate_meta};
pub use transform::{
    canonicalize_dates, filter_fillable, is_blank, select_rules, transform_attributes,
    transform_attributes_for_validation,
};
