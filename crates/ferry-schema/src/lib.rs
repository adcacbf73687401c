//! Compose manifest model, image references, and mount specs for Ferry.
//!
//! This crate defines the schema layer: a lossless YAML node-tree `Manifest`
//! with typed accessors for the `image` and short-syntax `volumes` fields of
//! each service, `ImageReference` parsing, `MountSpec` parsing, and the
//! deterministic name sanitization used for volume capture identifiers.

pub mod manifest;
pub mod mount;
pub mod reference;
pub mod sanitize;
pub mod types;

pub use manifest::{
    parse_manifest_file, parse_manifest_str, ImageField, Manifest, ManifestError,
    ServiceDefinition, VolumeEntry,
};
pub use mount::{classify_source, MountError, MountSpec, SourceKind};
pub use reference::{ImageReference, ReferenceError, DEFAULT_TAG};
pub use sanitize::{capture_id, normalize_separators, sanitize};
pub use types::{ArtifactId, CaptureId, ServiceName};
