pub mod catalog;
pub mod completions;
pub mod man_pages;
pub mod resolve;
pub mod revert;
pub mod rewrite;

use crate::config::FerryConfig;
use clap::Args;
use ferry_catalog::{BundleLayout, Catalog, CatalogSource, ImageSource};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::NamedTempFile;

pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_FAILURE: u8 = 1;
pub const EXIT_MANIFEST_ERROR: u8 = 2;
pub const EXIT_CATALOG_ERROR: u8 = 3;
pub const EXIT_UNRESOLVED: u8 = 4;

/// Where the offline catalog is read from.
#[derive(Debug, Clone, Default, Args)]
pub struct CatalogArgs {
    /// Capture bundle root (`images.list`, `volumes/` and `docker-compose.yml`).
    #[arg(long)]
    pub bundle: Option<PathBuf>,
    /// Image listing file, one `repo:tag` per line.
    #[arg(long, conflicts_with = "engine")]
    pub images: Option<PathBuf>,
    /// Enumerate images through a container engine CLI (e.g. docker, podman).
    #[arg(long)]
    pub engine: Option<String>,
    /// Directory holding one sub-directory per captured volume.
    #[arg(long)]
    pub volumes: Option<PathBuf>,
    /// Tag marking images prepared for offline use.
    #[arg(long)]
    pub suffix: Option<String>,
}

impl CatalogArgs {
    /// Flags first, then config; a bundle supplies both locations unless overridden.
    pub fn source(&self, config: &FerryConfig) -> Result<CatalogSource, String> {
        let mut source = match &self.bundle {
            Some(root) => CatalogSource::from_bundle(&BundleLayout::new(root)),
            None => CatalogSource::new(),
        };

        if let Some(images) = &self.images {
            source = source.with_images(ImageSource::Listing(images.clone()));
        } else if let Some(program) = &self.engine {
            source = source.with_images(ImageSource::Engine {
                program: program.clone(),
            });
        } else if source.images.is_none() {
            if let Some(images) = &config.images {
                source = source.with_images(ImageSource::Listing(images.clone()));
            }
        }

        if let Some(volumes) = &self.volumes {
            source = source.with_volumes(volumes.clone());
        } else if source.volumes.is_none() {
            if let Some(volumes) = &config.volumes {
                source = source.with_volumes(volumes.clone());
            }
        }

        if let Some(suffix) = self.suffix.as_deref().or(config.offline_suffix.as_deref()) {
            source = source.with_suffix(suffix);
        }

        if source.images.is_none() && source.volumes.is_none() {
            return Err(
                "no catalog source: pass --bundle, --images, --engine or --volumes, or set images/volumes in ferry.toml"
                    .to_owned(),
            );
        }
        Ok(source)
    }
}

pub const DEFAULT_MANIFEST: &str = "docker-compose.yml";

/// The manifest named on the command line, else the one captured in the
/// bundle, else `./docker-compose.yml`.
pub fn manifest_path(explicit: Option<&Path>, bundle: Option<&Path>) -> PathBuf {
    match (explicit, bundle) {
        (Some(path), _) => path.to_path_buf(),
        (None, Some(root)) => BundleLayout::new(root).compose_file(),
        (None, None) => PathBuf::from(DEFAULT_MANIFEST),
    }
}

pub fn build_catalog(source: &CatalogSource, json: bool) -> Result<Catalog, String> {
    let pb = (!json).then(|| spinner("indexing offline artifacts..."));
    match Catalog::build(source) {
        Ok(catalog) => {
            if let Some(pb) = &pb {
                spin_ok(
                    pb,
                    &format!(
                        "catalog: {} images, {} volume captures",
                        catalog.images().count(),
                        catalog.volumes().count()
                    ),
                );
            }
            Ok(catalog)
        }
        Err(e) => {
            if let Some(pb) = &pb {
                spin_fail(pb, "catalog unavailable");
            }
            Err(format!("catalog error: {e}"))
        }
    }
}

pub fn json_pretty(value: &impl serde::Serialize) -> Result<String, String> {
    serde_json::to_string_pretty(value).map_err(|e| format!("JSON serialization failed: {e}"))
}

pub fn write_atomic(dest: &Path, content: &str) -> Result<(), String> {
    let dir = dest
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
    let mut tmp = NamedTempFile::new_in(&dir).map_err(|e| format!("write temp file: {e}"))?;
    use std::io::Write;
    tmp.write_all(content.as_bytes())
        .map_err(|e| format!("write temp file: {e}"))?;
    tmp.as_file()
        .sync_all()
        .map_err(|e| format!("fsync temp file: {e}"))?;
    tmp.persist(dest)
        .map_err(|e| format!("persist {}: {}", dest.display(), e.error))?;
    Ok(())
}

pub fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .expect("valid template")
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
    );
    pb.set_message(msg.to_owned());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

pub fn spin_ok(pb: &ProgressBar, msg: &str) {
    pb.set_style(ProgressStyle::with_template("{msg}").expect("valid template"));
    pb.finish_with_message(format!("✓ {msg}"));
}

pub fn spin_fail(pb: &ProgressBar, msg: &str) {
    pb.set_style(ProgressStyle::with_template("{msg}").expect("valid template"));
    pb.finish_with_message(format!("✗ {msg}"));
}

pub fn colorize_outcome(outcome: &str) -> String {
    use console::Style;
    match outcome {
        "applied" | "resolved" => Style::new().green().apply_to(outcome).to_string(),
        "not_found" => Style::new().red().bold().apply_to(outcome).to_string(),
        "skipped" => Style::new().dim().apply_to(outcome).to_string(),
        "ambiguous" => Style::new().yellow().apply_to(outcome).to_string(),
        other => other.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_pretty_serializes_string() {
        let val = serde_json::json!({"key": "value"});
        let result = json_pretty(&val).unwrap();
        assert!(result.contains("\"key\""));
        assert!(result.contains("\"value\""));
    }

    #[test]
    fn manifest_defaults_to_bundle_compose_file() {
        let bundle = Path::new("/srv/bundle");
        assert_eq!(
            manifest_path(None, Some(bundle)),
            PathBuf::from("/srv/bundle/docker-compose.yml")
        );
        assert_eq!(
            manifest_path(Some(Path::new("app.yml")), Some(bundle)),
            PathBuf::from("app.yml")
        );
        assert_eq!(manifest_path(None, None), PathBuf::from(DEFAULT_MANIFEST));
    }

    #[test]
    fn colorize_outcome_keeps_text() {
        for outcome in ["applied", "not_found", "skipped", "ambiguous"] {
            assert!(colorize_outcome(outcome).contains(outcome));
        }
        assert_eq!(colorize_outcome("other"), "other");
    }

    #[test]
    fn exit_codes_are_distinct() {
        let codes = [
            EXIT_SUCCESS,
            EXIT_FAILURE,
            EXIT_MANIFEST_ERROR,
            EXIT_CATALOG_ERROR,
            EXIT_UNRESOLVED,
        ];
        for (i, a) in codes.iter().enumerate() {
            assert!(codes[i + 1..].iter().all(|b| a != b));
        }
    }

    #[test]
    fn write_atomic_replaces_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.yml");
        std::fs::write(&path, "old").unwrap();
        write_atomic(&path, "new").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "new");
    }

    #[test]
    fn bundle_source_uses_bundle_locations() {
        let args = CatalogArgs {
            bundle: Some(PathBuf::from("/srv/bundle")),
            ..CatalogArgs::default()
        };
        let source = args.source(&FerryConfig::default()).unwrap();
        assert_eq!(
            source.images,
            Some(ImageSource::Listing(PathBuf::from("/srv/bundle/images.list")))
        );
        assert_eq!(source.volumes, Some(PathBuf::from("/srv/bundle/volumes")));
    }

    #[test]
    fn flags_override_config_locations() {
        let config = FerryConfig {
            images: Some(PathBuf::from("/cfg/images.list")),
            volumes: Some(PathBuf::from("/cfg/volumes")),
            offline_suffix: Some("airgap".to_owned()),
            ..FerryConfig::default()
        };
        let args = CatalogArgs {
            engine: Some("podman".to_owned()),
            ..CatalogArgs::default()
        };
        let source = args.source(&config).unwrap();
        assert_eq!(
            source.images,
            Some(ImageSource::Engine {
                program: "podman".to_owned()
            })
        );
        assert_eq!(source.volumes, Some(PathBuf::from("/cfg/volumes")));
        assert_eq!(source.offline_suffix, "airgap");
    }

    #[test]
    fn no_source_is_an_error() {
        assert!(CatalogArgs::default()
            .source(&FerryConfig::default())
            .is_err());
    }

    #[test]
    fn spinner_creates_progress_bar() {
        let pb = spinner("testing...");
        spin_ok(&pb, "done");
    }
}
