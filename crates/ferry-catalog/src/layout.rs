use std::path::PathBuf;

const IMAGES_LIST: &str = "images.list";
const VOLUMES_DIR: &str = "volumes";
const COMPOSE_FILE: &str = "docker-compose.yml";

/// Directory layout of a capture bundle copied to the offline host.
///
/// ```text
/// <root>/images.list         one `repo:tag` per line, saved at capture time
/// <root>/volumes/<capture>/  one directory per captured mount
/// <root>/docker-compose.yml  the manifest as it was captured
/// ```
#[derive(Debug, Clone)]
pub struct BundleLayout {
    root: PathBuf,
}

impl BundleLayout {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[inline]
    pub fn images_list(&self) -> PathBuf {
        self.root.join(IMAGES_LIST)
    }

    #[inline]
    pub fn volumes_dir(&self) -> PathBuf {
        self.root.join(VOLUMES_DIR)
    }

    #[inline]
    pub fn compose_file(&self) -> PathBuf {
        self.root.join(COMPOSE_FILE)
    }

    #[inline]
    pub fn volume_path(&self, capture: &str) -> PathBuf {
        self.volumes_dir().join(capture)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_paths_are_correct() {
        let layout = BundleLayout::new("/srv/bundle");
        assert_eq!(layout.images_list(), PathBuf::from("/srv/bundle/images.list"));
        assert_eq!(layout.volumes_dir(), PathBuf::from("/srv/bundle/volumes"));
        assert_eq!(
            layout.compose_file(),
            PathBuf::from("/srv/bundle/docker-compose.yml")
        );
        assert_eq!(
            layout.volume_path("db_data"),
            PathBuf::from("/srv/bundle/volumes/db_data")
        );
    }
}
