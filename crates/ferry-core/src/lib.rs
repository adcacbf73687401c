//! Migration engine for Ferry.
//!
//! This crate ties the manifest model and the artifact catalog together: the
//! reference resolver cascade maps each service's `image` to an offline
//! catalog image, the path remapper moves bind-mount and named-volume sources
//! under a restore root, and `rewrite` applies both to a whole manifest,
//! producing the rewritten manifest plus a `ChangeLog` that can later be
//! reverted.

pub mod changelog;
pub mod remap;
pub mod resolver;
pub mod rewrite;

pub use changelog::{
    revert, ChangeLog, ChangeOutcome, ChangeRecord, Field, RevertConflict, RevertReport, Summary,
};
pub use remap::{remap, Remap, RemapRule, Remapper, SkipReason, VolumePolicy, VolumeRule};
pub use resolver::{
    resolve, resolve_query, NotFoundReason, Outcome, Query, Resolution, Strategy, StrategyAttempt,
};
pub use rewrite::{rewrite, RewriteOptions};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("manifest error: {0}")]
    Manifest(#[from] ferry_schema::ManifestError),
    #[error("catalog error: {0}")]
    Catalog(#[from] ferry_catalog::CatalogError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("invalid volume policy: {0}")]
    InvalidPolicy(String),
    #[error("restore root must be absolute: {0}")]
    RelativeRestoreRoot(String),
}
