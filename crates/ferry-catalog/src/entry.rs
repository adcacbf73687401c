use ferry_schema::ArtifactId;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Image,
    VolumeSnapshot,
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Image => f.write_str("image"),
            Self::VolumeSnapshot => f.write_str("volume"),
        }
    }
}

/// One offline artifact.
///
/// For images `id` is the full local reference (`repo:offline`) and
/// `capture_name` is the repository without the offline tag. For volume
/// snapshots both are the capture directory name and `path` points at it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub kind: ArtifactKind,
    pub id: ArtifactId,
    pub capture_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

impl CatalogEntry {
    pub fn image(repository: &str, suffix: &str) -> Self {
        Self {
            kind: ArtifactKind::Image,
            id: ArtifactId::new(format!("{repository}:{suffix}")),
            capture_name: repository.to_owned(),
            path: None,
        }
    }

    pub fn volume(dir_name: &str, path: impl Into<PathBuf>) -> Self {
        Self {
            kind: ArtifactKind::VolumeSnapshot,
            id: ArtifactId::new(dir_name),
            capture_name: dir_name.to_owned(),
            path: Some(path.into()),
        }
    }

    /// Repository part of an image entry; the capture name for volumes.
    pub fn repository(&self) -> &str {
        &self.capture_name
    }
}

/// Split `repo:tag` at the tag separator, ignoring colons inside a registry
/// host:port prefix.
pub fn split_tag(reference: &str) -> Option<(&str, &str)> {
    let last_slash = reference.rfind('/').map_or(0, |i| i + 1);
    let colon = reference[last_slash..].rfind(':')? + last_slash;
    Some((&reference[..colon], &reference[colon + 1..]))
}
