use crate::CoreError;
use ferry_catalog::{Catalog, CatalogEntry};
use ferry_schema::{capture_id, sanitize, ArtifactId, MountSpec, SourceKind};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Component, Path};
use tracing::debug;

/// A caller-supplied mapping: sources (or matched capture names) containing
/// `contains` are restored from `restore_root / target`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VolumeRule {
    pub contains: String,
    pub target: String,
}

/// Ordered list of [`VolumeRule`]s; the first match wins. Empty by default.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VolumePolicy {
    pub rules: Vec<VolumeRule>,
}

impl VolumePolicy {
    pub fn new(rules: Vec<VolumeRule>) -> Self {
        Self { rules }
    }

    /// Targets must be non-empty relative paths that stay under the root.
    pub fn validate(&self) -> Result<(), CoreError> {
        for rule in &self.rules {
            let target = Path::new(&rule.target);
            let escapes = target
                .components()
                .any(|c| !matches!(c, Component::Normal(_)));
            if rule.contains.is_empty() || rule.target.is_empty() || escapes {
                return Err(CoreError::InvalidPolicy(format!(
                    "rule '{}' -> '{}': target must be a relative path below the restore root",
                    rule.contains, rule.target
                )));
            }
        }
        Ok(())
    }

    fn find(&self, haystacks: &[&str]) -> Option<&VolumeRule> {
        self.rules
            .iter()
            .find(|rule| haystacks.iter().any(|h| h.contains(rule.contains.as_str())))
    }
}

/// How a remapped source was derived.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemapRule {
    /// A capture directory named exactly `sanitize(service_destination)`.
    CaptureExact(ArtifactId),
    /// A capture directory `{prefix}_{service}[-N]_{destination}`, named after
    /// the container rather than the service.
    CaptureFuzzy(ArtifactId),
    /// A policy rule, identified by its `contains` pattern.
    Policy(String),
    /// `restore_root / basename(source)`.
    Basename,
}

impl fmt::Display for RemapRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CaptureExact(id) => write!(f, "capture_exact({id})"),
            Self::CaptureFuzzy(id) => write!(f, "capture_fuzzy({id})"),
            Self::Policy(pattern) => write!(f, "policy({pattern})"),
            Self::Basename => f.write_str("basename"),
        }
    }
}

/// Why a mount was left untouched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    AnonymousVolume,
    AlreadyUnderRestoreRoot,
    UnsupportedSource(String),
    UnknownVolume(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AnonymousVolume => f.write_str("anonymous volume has no source"),
            Self::AlreadyUnderRestoreRoot => f.write_str("source already under restore root"),
            Self::UnsupportedSource(s) => write!(f, "unsupported source '{s}'"),
            Self::UnknownVolume(s) => write!(f, "volume '{s}' is not declared or captured"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Remap {
    Remapped { spec: MountSpec, rule: RemapRule },
    Unchanged(SkipReason),
}

impl Remap {
    /// The mount after remapping; `original` when unchanged.
    pub fn into_spec(self, original: &MountSpec) -> MountSpec {
        match self {
            Self::Remapped { spec, .. } => spec,
            Self::Unchanged(_) => original.clone(),
        }
    }
}

/// Maps mount sources under a restore root.
///
/// Without a declared-volume list every bare name counts as a volume;
/// with one, only declared or captured names are remapped.
#[derive(Debug, Clone, Copy)]
pub struct Remapper<'a> {
    restore_root: &'a Path,
    catalog: Option<&'a Catalog>,
    declared: Option<&'a [String]>,
    policy: Option<&'a VolumePolicy>,
    prefix: Option<&'a str>,
}

impl<'a> Remapper<'a> {
    pub fn new(restore_root: &'a Path) -> Self {
        Self {
            restore_root,
            catalog: None,
            declared: None,
            policy: None,
            prefix: None,
        }
    }

    #[must_use]
    pub fn with_catalog(mut self, catalog: &'a Catalog) -> Self {
        self.catalog = Some(catalog);
        self
    }

    #[must_use]
    pub fn with_declared(mut self, declared: &'a [String]) -> Self {
        self.declared = Some(declared);
        self
    }

    #[must_use]
    pub fn with_policy(mut self, policy: &'a VolumePolicy) -> Self {
        self.policy = Some(policy);
        self
    }

    /// Project prefix container names were captured under.
    #[must_use]
    pub fn with_prefix(mut self, prefix: Option<&'a str>) -> Self {
        self.prefix = prefix.filter(|p| !p.is_empty());
        self
    }

    pub fn remap(&self, spec: &MountSpec, service: &str) -> Remap {
        let Some(source) = spec.source.as_deref() else {
            return Remap::Unchanged(SkipReason::AnonymousVolume);
        };

        let capture = self.find_capture(service, &spec.destination);

        match spec.source_kind() {
            Some(SourceKind::Path) => {
                if Path::new(source).starts_with(self.restore_root) {
                    return Remap::Unchanged(SkipReason::AlreadyUnderRestoreRoot);
                }
            }
            Some(SourceKind::Name) => {
                let declared = self
                    .declared
                    .map_or(true, |names| names.iter().any(|n| n == source));
                if !declared && capture.is_none() {
                    return Remap::Unchanged(SkipReason::UnknownVolume(source.to_owned()));
                }
            }
            Some(SourceKind::Other) | None => {
                return Remap::Unchanged(SkipReason::UnsupportedSource(source.to_owned()));
            }
        }

        let capture_name = capture.map(|(e, _)| e.id.as_str());
        let policy_rule = self.policy.and_then(|p| {
            let mut haystacks = vec![source];
            haystacks.extend(capture_name);
            p.find(&haystacks)
        });

        let (dir, rule) = if let Some(rule) = policy_rule {
            (rule.target.clone(), RemapRule::Policy(rule.contains.clone()))
        } else if let Some((entry, exact)) = capture {
            let rule = if exact {
                RemapRule::CaptureExact(entry.id.clone())
            } else {
                RemapRule::CaptureFuzzy(entry.id.clone())
            };
            (entry.id.to_string(), rule)
        } else {
            let name = source_basename(source)
                .unwrap_or_else(|| capture_id(service, &spec.destination).into_inner());
            (name, RemapRule::Basename)
        };

        let new_source = self.restore_root.join(dir).to_string_lossy().into_owned();
        debug!("{service}: mount '{source}' -> '{new_source}' ({rule})");
        Remap::Remapped {
            spec: spec.with_source(new_source),
            rule,
        }
    }

    fn find_capture(&self, service: &str, destination: &str) -> Option<(&'a CatalogEntry, bool)> {
        let catalog = self.catalog?;
        let exact = capture_id(service, destination);
        if let Some(entry) = catalog.volumes().find(|e| e.id == *exact) {
            return Some((entry, true));
        }
        let tail = format!("_{}", sanitize(destination));
        catalog
            .volumes()
            .find(|e| {
                e.id.strip_suffix(tail.as_str())
                    .is_some_and(|head| self.names_service(head, service))
            })
            .map(|e| (e, false))
    }

    /// `head` is `service` or `{prefix}_{service}`, optionally followed by a
    /// `-N` replica number.
    fn names_service(&self, head: &str, service: &str) -> bool {
        let head = strip_replica(head);
        head == sanitize(service)
            || self
                .prefix
                .is_some_and(|prefix| head == sanitize(&format!("{prefix}_{service}")))
    }
}

fn strip_replica(name: &str) -> &str {
    match name.rsplit_once('-') {
        Some((base, n)) if !n.is_empty() && n.bytes().all(|b| b.is_ascii_digit()) => base,
        _ => name,
    }
}

/// Remap against `restore_root` alone: no catalog, no policy, every bare
/// name treated as a volume.
pub fn remap(spec: &MountSpec, service: &str, restore_root: &Path) -> MountSpec {
    Remapper::new(restore_root)
        .remap(spec, service)
        .into_spec(spec)
}

/// Directory name a source is restored under.
///
/// Project-relative sources are captured by their top-level directory, so
/// `./data/api` restores from `data`. Absolute and home paths use their last
/// component, volume names themselves.
fn source_basename(source: &str) -> Option<String> {
    let path = Path::new(source);
    let relative = source.starts_with("./") || source.starts_with("../");
    let mut normals = path.components().filter_map(|c| match c {
        Component::Normal(s) => Some(s.to_string_lossy().into_owned()),
        _ => None,
    });
    let name = if relative {
        normals.next()
    } else {
        normals.last()
    };
    name.filter(|n| n != "~")
}
