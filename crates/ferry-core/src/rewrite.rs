//! Whole-manifest rewrite: image resolution plus mount remapping.

use crate::changelog::{ChangeLog, ChangeRecord, Field};
use crate::remap::{Remap, Remapper, VolumePolicy};
use crate::resolver::{resolve, Outcome};
use crate::CoreError;
use ferry_catalog::Catalog;
use ferry_schema::{ImageField, Manifest, ServiceDefinition, VolumeEntry};
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct RewriteOptions {
    /// Absolute directory captured volume data is restored under.
    pub restore_root: PathBuf,
    pub project_prefix: Option<String>,
    pub policy: VolumePolicy,
}

impl RewriteOptions {
    pub fn new(restore_root: impl Into<PathBuf>) -> Self {
        Self {
            restore_root: restore_root.into(),
            project_prefix: None,
            policy: VolumePolicy::default(),
        }
    }

    #[must_use]
    pub fn with_prefix(mut self, prefix: Option<String>) -> Self {
        self.project_prefix = prefix.filter(|p| !p.trim().is_empty());
        self
    }

    #[must_use]
    pub fn with_policy(mut self, policy: VolumePolicy) -> Self {
        self.policy = policy;
        self
    }
}

/// A pending edit collected while walking the manifest.
enum Edit {
    Image { service: String, value: String },
    Volume { service: String, index: usize, value: String },
}

/// Rewrite `manifest` for offline use against `catalog`.
///
/// Only per-service `image` scalars and short-syntax `volumes` entries are
/// touched. Unresolvable images and unsupported mounts are recorded in the
/// returned [`ChangeLog`]; they never abort the rewrite. Errors come only
/// from invalid options or a manifest that fails to serialize.
pub fn rewrite(
    manifest: &Manifest,
    catalog: &Catalog,
    options: &RewriteOptions,
) -> Result<(Manifest, ChangeLog), CoreError> {
    if !options.restore_root.is_absolute() {
        return Err(CoreError::RelativeRestoreRoot(
            options.restore_root.display().to_string(),
        ));
    }
    options.policy.validate()?;

    let source_digest = manifest.digest()?;
    let declared = manifest.declared_volumes();
    let remapper = Remapper::new(&options.restore_root)
        .with_catalog(catalog)
        .with_declared(&declared)
        .with_policy(&options.policy)
        .with_prefix(options.project_prefix.as_deref());

    let mut records = Vec::new();
    let mut edits = Vec::new();
    for service in manifest.services() {
        rewrite_image(&service, catalog, options, &mut records, &mut edits);
        rewrite_volumes(&service, &remapper, &mut records, &mut edits);
    }

    let mut output = manifest.clone();
    for edit in edits {
        match edit {
            Edit::Image { service, value } => output.set_image(&service, &value)?,
            Edit::Volume {
                service,
                index,
                value,
            } => output.set_volume(&service, index, &value)?,
        }
    }

    let log = ChangeLog {
        source_digest,
        output_digest: output.digest()?,
        restore_root: options.restore_root.clone(),
        project_prefix: options.project_prefix.clone(),
        records,
    };
    let summary = log.summary();
    info!(
        "rewrite complete: {} applied, {} not found, {} skipped",
        summary.applied, summary.not_found, summary.skipped
    );
    Ok((output, log))
}

fn rewrite_image(
    service: &ServiceDefinition<'_>,
    catalog: &Catalog,
    options: &RewriteOptions,
    records: &mut Vec<ChangeRecord>,
    edits: &mut Vec<Edit>,
) {
    let name = service.name();
    let reference = match service.image() {
        ImageField::Absent => {
            records.push(ChangeRecord::skipped(
                name,
                Field::Image,
                "",
                "no image reference (builds from source)".to_owned(),
            ));
            return;
        }
        ImageField::Inherited => {
            warn!("{name}: image comes from a merge key; left unresolved");
            records.push(ChangeRecord::not_found(
                name,
                Field::Image,
                "",
                "unsupported shape: image inherited via merge key".to_owned(),
            ));
            return;
        }
        ImageField::NonString => {
            warn!("{name}: image is not a string; left as is");
            records.push(ChangeRecord::skipped(
                name,
                Field::Image,
                "",
                "unsupported shape: image is not a string".to_owned(),
            ));
            return;
        }
        ImageField::Reference(r) => r,
    };

    if catalog.contains_image(reference) {
        records.push(ChangeRecord::skipped(
            name,
            Field::Image,
            reference,
            "already an offline catalog reference".to_owned(),
        ));
        return;
    }

    let resolution = resolve(name, reference, catalog, options.project_prefix.as_deref());
    let record = match &resolution.outcome {
        Outcome::Resolved {
            entry, strategy, ..
        } => {
            edits.push(Edit::Image {
                service: name.to_owned(),
                value: entry.id.to_string(),
            });
            ChangeRecord::applied(name, Field::Image, reference, &entry.id, strategy.to_string())
        }
        Outcome::NotFound(reason) => {
            ChangeRecord::not_found(name, Field::Image, reference, reason.to_string())
        }
    };
    records.push(record.with_attempts(resolution.attempts));
}

fn rewrite_volumes(
    service: &ServiceDefinition<'_>,
    remapper: &Remapper<'_>,
    records: &mut Vec<ChangeRecord>,
    edits: &mut Vec<Edit>,
) {
    let name = service.name();
    for (index, entry) in service.volumes().into_iter().enumerate() {
        let field = Field::Volume(index);
        let record = match entry {
            VolumeEntry::Opaque(kind) => ChangeRecord::skipped(
                name,
                field,
                &kind,
                "unsupported shape: long-form mount".to_owned(),
            ),
            VolumeEntry::Short(Err(e), raw) => {
                warn!("{name}: mount '{raw}' not parsed: {e}");
                ChangeRecord::skipped(name, field, &raw, format!("unsupported shape: {e}"))
            }
            VolumeEntry::Short(Ok(spec), raw) => match remapper.remap(&spec, name) {
                Remap::Remapped { spec: new, rule } => {
                    let value = new.to_string();
                    info!("{name}: mount '{raw}' -> '{value}' ({rule})");
                    edits.push(Edit::Volume {
                        service: name.to_owned(),
                        index,
                        value: value.clone(),
                    });
                    ChangeRecord::applied(name, field, &raw, &value, rule.to_string())
                }
                Remap::Unchanged(reason) => {
                    ChangeRecord::skipped(name, field, &raw, reason.to_string())
                }
            },
        };
        records.push(record);
    }
}
