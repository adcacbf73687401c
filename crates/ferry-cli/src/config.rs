use ferry_core::{VolumePolicy, VolumeRule};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

pub const CONFIG_FILE: &str = "ferry.toml";
pub const CONFIG_ENV: &str = "FERRY_CONFIG";
pub const DEFAULT_RESTORE_ROOT: &str = "/offline_volumes";

/// Settings read from `ferry.toml`; every key is optional and command-line
/// flags take precedence.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FerryConfig {
    #[serde(default)]
    pub project_prefix: Option<String>,
    #[serde(default)]
    pub restore_root: Option<PathBuf>,
    #[serde(default)]
    pub offline_suffix: Option<String>,
    /// Image listing file.
    #[serde(default)]
    pub images: Option<PathBuf>,
    /// Root of the volume capture directories.
    #[serde(default)]
    pub volumes: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub volume_rules: Vec<VolumeRule>,
}

impl FerryConfig {
    /// Load from `--config`, then `$FERRY_CONFIG`, then `./ferry.toml`.
    ///
    /// An explicitly named file must exist; a missing `./ferry.toml` yields
    /// the empty config.
    pub fn load_default(explicit: Option<&Path>) -> Result<Self, String> {
        if let Some(path) = explicit {
            return Self::load(path);
        }
        if let Some(path) = std::env::var_os(CONFIG_ENV).filter(|v| !v.is_empty()) {
            return Self::load(Path::new(&path));
        }
        let local = Path::new(CONFIG_FILE);
        if local.is_file() {
            return Self::load(local);
        }
        debug!("no {CONFIG_FILE} found, using defaults");
        Ok(Self::default())
    }

    pub fn load(path: &Path) -> Result<Self, String> {
        debug!("loading config from {}", path.display());
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("failed to read config {}: {e}", path.display()))?;
        toml::from_str(&content).map_err(|e| format!("invalid config {}: {e}", path.display()))
    }

    pub fn restore_root(&self, flag: Option<&Path>) -> PathBuf {
        flag.map(Path::to_path_buf)
            .or_else(|| self.restore_root.clone())
            .unwrap_or_else(|| PathBuf::from(DEFAULT_RESTORE_ROOT))
    }

    pub fn project_prefix(&self, flag: Option<&str>) -> Option<String> {
        flag.map(str::to_owned)
            .or_else(|| self.project_prefix.clone())
    }

    pub fn policy(&self) -> VolumePolicy {
        VolumePolicy::new(self.volume_rules.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ferry.toml");

        let config = FerryConfig {
            project_prefix: Some("dify_test".to_owned()),
            restore_root: Some(PathBuf::from("/srv/restore")),
            volume_rules: vec![VolumeRule {
                contains: "postgresql".to_owned(),
                target: "db".to_owned(),
            }],
            ..FerryConfig::default()
        };
        std::fs::write(&path, toml::to_string_pretty(&config).unwrap()).unwrap();

        assert_eq!(FerryConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn parses_volume_rules_table_array() {
        let config: FerryConfig = toml::from_str(
            r#"
project_prefix = "proj"
offline_suffix = "airgap"

[[volume_rules]]
contains = "redis"
target = "cache/redis"
"#,
        )
        .unwrap();
        assert_eq!(config.offline_suffix.as_deref(), Some("airgap"));
        assert_eq!(config.policy().rules.len(), 1);
        assert_eq!(config.policy().rules[0].target, "cache/redis");
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ferry.toml");
        std::fs::write(&path, "restore_rot = \"/x\"\n").unwrap();
        let err = FerryConfig::load(&path).unwrap_err();
        assert!(err.contains("invalid config"));
    }

    #[test]
    fn explicit_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(FerryConfig::load_default(Some(&dir.path().join("nope.toml"))).is_err());
    }

    #[test]
    fn flags_override_config() {
        let config = FerryConfig {
            project_prefix: Some("from_config".to_owned()),
            restore_root: Some(PathBuf::from("/from/config")),
            ..FerryConfig::default()
        };
        assert_eq!(
            config.restore_root(Some(Path::new("/from/flag"))),
            PathBuf::from("/from/flag")
        );
        assert_eq!(config.restore_root(None), PathBuf::from("/from/config"));
        assert_eq!(config.project_prefix(Some("flag")).as_deref(), Some("flag"));
        assert_eq!(
            FerryConfig::default().restore_root(None),
            PathBuf::from(DEFAULT_RESTORE_ROOT)
        );
    }
}
