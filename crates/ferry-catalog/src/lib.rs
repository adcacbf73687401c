//! Offline artifact catalog for Ferry.
//!
//! This crate indexes what a capture produced: images tagged for offline use
//! (enumerated from a saved listing or a live container engine) and volume
//! capture directories. `Catalog::build` is the only place that touches the
//! filesystem or spawns processes; everything downstream reads the finished,
//! immutable `Catalog`.

pub mod catalog;
pub mod entry;
pub mod layout;
pub mod source;

pub use catalog::Catalog;
pub use entry::{split_tag, ArtifactKind, CatalogEntry};
pub use layout::BundleLayout;
pub use source::{parse_listing, CatalogSource, ImageSource, DEFAULT_OFFLINE_SUFFIX};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("catalog source '{location}' unavailable: {reason}")]
    Unavailable { location: String, reason: String },
    #[error("catalog I/O error: {0}")]
    Io(#[from] std::io::Error),
}
