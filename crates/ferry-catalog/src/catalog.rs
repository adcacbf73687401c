use crate::entry::{split_tag, ArtifactKind, CatalogEntry};
use crate::source::{enumerate_images, enumerate_volumes, CatalogSource, DEFAULT_OFFLINE_SUFFIX};
use crate::CatalogError;
use ferry_schema::ArtifactId;
use serde::Serialize;
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Read-only index of offline artifacts, ordered by identifier.
///
/// Built once per run and never mutated afterwards, so it can be shared
/// freely between resolutions.
#[derive(Debug, Clone, Serialize)]
pub struct Catalog {
    offline_suffix: String,
    entries: BTreeMap<ArtifactId, CatalogEntry>,
}

impl Default for Catalog {
    fn default() -> Self {
        Self::empty(DEFAULT_OFFLINE_SUFFIX)
    }
}

impl Catalog {
    pub fn empty(offline_suffix: &str) -> Self {
        Self {
            offline_suffix: offline_suffix.to_owned(),
            entries: BTreeMap::new(),
        }
    }

    /// Enumerate every configured source.
    ///
    /// Image references not tagged with the offline suffix are ignored. A
    /// source that cannot be read fails the whole build; sources that are
    /// merely empty produce an empty catalog.
    pub fn build(source: &CatalogSource) -> Result<Self, CatalogError> {
        let mut catalog = Self::empty(&source.offline_suffix);

        if let Some(images) = &source.images {
            let refs = enumerate_images(images)?;
            let total = refs.len();
            for reference in refs {
                catalog.insert_image_ref(&reference);
            }
            debug!(
                "image source yielded {total} references, {} tagged '{}'",
                catalog.images().count(),
                catalog.offline_suffix
            );
        }

        if let Some(root) = &source.volumes {
            for (name, path) in enumerate_volumes(root)? {
                catalog.insert(CatalogEntry::volume(&name, path));
            }
        }

        info!(
            "catalog built: {} images, {} volume captures",
            catalog.images().count(),
            catalog.volumes().count()
        );
        Ok(catalog)
    }

    /// Build from already enumerated entries; duplicates collapse by identifier.
    pub fn from_entries(
        offline_suffix: &str,
        entries: impl IntoIterator<Item = CatalogEntry>,
    ) -> Self {
        let mut catalog = Self::empty(offline_suffix);
        for entry in entries {
            catalog.insert(entry);
        }
        catalog
    }

    /// Catalog of images from plain `repo:tag` strings; non-offline tags are dropped.
    pub fn from_image_refs<'a>(
        offline_suffix: &str,
        refs: impl IntoIterator<Item = &'a str>,
    ) -> Self {
        let mut catalog = Self::empty(offline_suffix);
        for reference in refs {
            catalog.insert_image_ref(reference);
        }
        catalog
    }

    pub fn offline_suffix(&self) -> &str {
        &self.offline_suffix
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&CatalogEntry> {
        self.entries.get(id)
    }

    pub fn entries(&self) -> impl Iterator<Item = &CatalogEntry> {
        self.entries.values()
    }

    pub fn images(&self) -> impl Iterator<Item = &CatalogEntry> {
        self.of_kind(ArtifactKind::Image)
    }

    pub fn volumes(&self) -> impl Iterator<Item = &CatalogEntry> {
        self.of_kind(ArtifactKind::VolumeSnapshot)
    }

    /// True when `reference` is exactly the identifier of a catalog image.
    pub fn contains_image(&self, reference: &str) -> bool {
        self.get(reference)
            .is_some_and(|e| e.kind == ArtifactKind::Image)
    }

    fn of_kind(&self, kind: ArtifactKind) -> impl Iterator<Item = &CatalogEntry> {
        self.entries.values().filter(move |e| e.kind == kind)
    }

    fn insert(&mut self, entry: CatalogEntry) {
        self.entries.insert(entry.id.clone(), entry);
    }

    fn insert_image_ref(&mut self, reference: &str) {
        match split_tag(reference.trim()) {
            Some((repository, tag)) if tag == self.offline_suffix && !repository.is_empty() => {
                let entry = CatalogEntry::image(repository, &self.offline_suffix);
                self.insert(entry);
            }
            _ => debug!("ignoring non-offline image '{reference}'"),
        }
    }
}
