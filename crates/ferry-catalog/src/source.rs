use crate::layout::BundleLayout;
use crate::CatalogError;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::debug;

/// Tag marking an image as prepared for offline use.
pub const DEFAULT_OFFLINE_SUFFIX: &str = "offline";

/// Placeholder the container engine prints for untagged images.
const UNTAGGED: &str = "<none>";

/// Where image references are enumerated from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    /// A text file with one `repo:tag` per line; `#` starts a comment.
    Listing(PathBuf),
    /// Live enumeration through a container engine CLI (`docker`, `podman`).
    Engine { program: String },
}

/// Descriptor of every location a catalog is built from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogSource {
    pub images: Option<ImageSource>,
    pub volumes: Option<PathBuf>,
    pub offline_suffix: String,
}

impl Default for CatalogSource {
    fn default() -> Self {
        Self {
            images: None,
            volumes: None,
            offline_suffix: DEFAULT_OFFLINE_SUFFIX.to_owned(),
        }
    }
}

impl CatalogSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Images from `images.list`, volumes from `volumes/` of a capture bundle.
    pub fn from_bundle(layout: &BundleLayout) -> Self {
        Self {
            images: Some(ImageSource::Listing(layout.images_list())),
            volumes: Some(layout.volumes_dir()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_images(mut self, images: ImageSource) -> Self {
        self.images = Some(images);
        self
    }

    #[must_use]
    pub fn with_volumes(mut self, root: impl Into<PathBuf>) -> Self {
        self.volumes = Some(root.into());
        self
    }

    #[must_use]
    pub fn with_suffix(mut self, suffix: &str) -> Self {
        self.offline_suffix = suffix.trim_start_matches(':').to_owned();
        self
    }
}

pub(crate) fn enumerate_images(source: &ImageSource) -> Result<Vec<String>, CatalogError> {
    match source {
        ImageSource::Listing(path) => read_listing(path),
        ImageSource::Engine { program } => engine_listing(program),
    }
}

fn read_listing(path: &Path) -> Result<Vec<String>, CatalogError> {
    let content = fs::read_to_string(path).map_err(|e| CatalogError::Unavailable {
        location: path.display().to_string(),
        reason: e.to_string(),
    })?;
    Ok(parse_listing(&content))
}

fn engine_listing(program: &str) -> Result<Vec<String>, CatalogError> {
    debug!("enumerating images via '{program} image ls'");
    let output = Command::new(program)
        .args(["image", "ls", "--format", "{{.Repository}}:{{.Tag}}"])
        .output()
        .map_err(|e| CatalogError::Unavailable {
            location: program.to_owned(),
            reason: e.to_string(),
        })?;

    if !output.status.success() {
        return Err(CatalogError::Unavailable {
            location: program.to_owned(),
            reason: String::from_utf8_lossy(&output.stderr).trim().to_owned(),
        });
    }

    Ok(parse_listing(&String::from_utf8_lossy(&output.stdout)))
}

/// Non-empty, non-comment lines, skipping untagged placeholders.
pub fn parse_listing(content: &str) -> Vec<String> {
    content
        .lines()
        .map(|line| line.split('#').next().unwrap_or("").trim())
        .filter(|line| !line.is_empty() && !line.contains(UNTAGGED))
        .map(str::to_owned)
        .collect()
}

/// Capture directories directly under `root`, sorted by name.
pub(crate) fn enumerate_volumes(root: &Path) -> Result<Vec<(String, PathBuf)>, CatalogError> {
    let unavailable = |reason: String| CatalogError::Unavailable {
        location: root.display().to_string(),
        reason,
    };
    if !root.is_dir() {
        return Err(unavailable("not a directory".to_owned()));
    }

    let mut dirs = Vec::new();
    for entry in fs::read_dir(root).map_err(|e| unavailable(e.to_string()))? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with('.') || !entry.file_type()?.is_dir() {
            continue;
        }
        dirs.push((name, entry.path()));
    }
    dirs.sort();
    Ok(dirs)
}
