use crate::mount::{MountError, MountSpec};
use serde_yaml::{Mapping, Value};
use std::fs;
use std::path::Path;
use thiserror::Error;

const SERVICES_KEY: &str = "services";
const IMAGE_KEY: &str = "image";
const VOLUMES_KEY: &str = "volumes";
const MERGE_KEY: &str = "<<";

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("failed to read manifest file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse manifest: {0}")]
    ParseYaml(#[from] serde_yaml::Error),
    #[error("malformed manifest: {0}")]
    Malformed(String),
    #[error("unsupported shape in service '{service}' field '{field}': {reason}")]
    UnsupportedShape {
        service: String,
        field: String,
        reason: String,
    },
    #[error("failed to serialize manifest: {0}")]
    Emit(String),
    #[error("serialized manifest does not round-trip: {0}")]
    RoundTrip(String),
    #[error("unknown service '{0}'")]
    UnknownService(String),
    #[error("service '{service}' has no volume entry at index {index}")]
    NoSuchVolume { service: String, index: usize },
}

/// One entry of a service's `volumes` sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VolumeEntry {
    /// Short-syntax string, parsed or not.
    Short(Result<MountSpec, MountError>, String),
    /// Long-form object or other non-string value, carried through untouched.
    Opaque(String),
}

/// How a service declares its image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageField<'a> {
    /// No `image` key, or an explicit null (the service builds from source).
    Absent,
    Reference(&'a str),
    /// A scalar that is not a string, e.g. a bare number.
    NonString,
    /// No `image` key of its own, but a `<<` merge key brings one in.
    Inherited,
}

/// Borrowed view of one entry under `services`.
#[derive(Debug, Clone, Copy)]
pub struct ServiceDefinition<'a> {
    name: &'a str,
    body: &'a Mapping,
}

impl<'a> ServiceDefinition<'a> {
    pub fn name(&self) -> &'a str {
        self.name
    }

    pub fn image(&self) -> ImageField<'a> {
        match self.body.get(IMAGE_KEY) {
            None if self.merges_image() => ImageField::Inherited,
            None | Some(Value::Null) => ImageField::Absent,
            Some(Value::String(s)) if s.trim().is_empty() => ImageField::Absent,
            Some(Value::String(s)) => ImageField::Reference(s),
            Some(_) => ImageField::NonString,
        }
    }

    fn merges_image(&self) -> bool {
        let has_image = |v: &Value| {
            v.as_mapping()
                .and_then(|m| m.get(IMAGE_KEY))
                .is_some_and(|image| !image.is_null())
        };
        match self.body.get(MERGE_KEY) {
            Some(Value::Sequence(seq)) => seq.iter().any(has_image),
            Some(other) => has_image(other),
            None => false,
        }
    }

    /// Entries of the `volumes` sequence in document order.
    pub fn volumes(&self) -> Vec<VolumeEntry> {
        let Some(Value::Sequence(seq)) = self.body.get(VOLUMES_KEY) else {
            return Vec::new();
        };
        seq.iter()
            .map(|item| match item {
                Value::String(s) => VolumeEntry::Short(MountSpec::parse(s), s.clone()),
                other => VolumeEntry::Opaque(describe(other).to_owned()),
            })
            .collect()
    }

    pub fn body(&self) -> &'a Mapping {
        self.body
    }
}

/// A parsed compose-style manifest.
///
/// The whole document is kept as a YAML node tree. Only a service's `image`
/// scalar and individual `volumes` entries are ever edited; every other node,
/// including document-level `version`, `networks`, `volumes` and `x-*`
/// extensions, is carried through as parsed.
#[derive(Debug, Clone, PartialEq)]
pub struct Manifest {
    root: Mapping,
}

impl Manifest {
    pub fn services(&self) -> impl Iterator<Item = ServiceDefinition<'_>> {
        self.services_mapping()
            .into_iter()
            .flat_map(Mapping::iter)
            .filter_map(|(k, v)| match (k, v) {
                (Value::String(name), Value::Mapping(body)) => Some(ServiceDefinition {
                    name: name.as_str(),
                    body,
                }),
                _ => None,
            })
    }

    pub fn service(&self, name: &str) -> Option<ServiceDefinition<'_>> {
        self.services().find(|s| s.name() == name)
    }

    /// Keys of the document-level `volumes` mapping.
    pub fn declared_volumes(&self) -> Vec<String> {
        match self.root.get(VOLUMES_KEY) {
            Some(Value::Mapping(map)) => map
                .keys()
                .filter_map(|k| k.as_str().map(str::to_owned))
                .collect(),
            _ => Vec::new(),
        }
    }

    pub fn set_image(&mut self, service: &str, image: &str) -> Result<(), ManifestError> {
        let body = self.service_body_mut(service)?;
        body.insert(Value::from(IMAGE_KEY), Value::from(image));
        Ok(())
    }

    /// Replace the short-syntax string at `index` of a service's `volumes`.
    pub fn set_volume(
        &mut self,
        service: &str,
        index: usize,
        spec: &str,
    ) -> Result<(), ManifestError> {
        let body = self.service_body_mut(service)?;
        let slot = match body.get_mut(VOLUMES_KEY) {
            Some(Value::Sequence(seq)) => seq.get_mut(index),
            _ => None,
        };
        let Some(slot) = slot else {
            return Err(ManifestError::NoSuchVolume {
                service: service.to_owned(),
                index,
            });
        };
        *slot = Value::from(spec);
        Ok(())
    }

    /// Raw string at `volumes[index]`, if that entry is a string.
    pub fn volume_at(&self, service: &str, index: usize) -> Option<&str> {
        self.service(service)?
            .body()
            .get(VOLUMES_KEY)?
            .as_sequence()?
            .get(index)?
            .as_str()
    }

    /// Serialize to YAML.
    ///
    /// The output is reparsed and compared node-by-node (including mapping key
    /// order) against the in-memory tree before it is returned.
    pub fn serialize(&self) -> Result<String, ManifestError> {
        let doc = Value::Mapping(self.root.clone());
        let out = serde_yaml::to_string(&doc).map_err(|e| ManifestError::Emit(e.to_string()))?;
        let reparsed: Value =
            serde_yaml::from_str(&out).map_err(|e| ManifestError::RoundTrip(e.to_string()))?;
        if let Some(path) = first_divergence(&doc, &reparsed, "$") {
            return Err(ManifestError::RoundTrip(format!("node {path} changed")));
        }
        Ok(out)
    }

    /// Blake3 hex digest of the serialized document.
    pub fn digest(&self) -> Result<String, ManifestError> {
        let out = self.serialize()?;
        Ok(blake3::hash(out.as_bytes()).to_hex().to_string())
    }

    fn services_mapping(&self) -> Option<&Mapping> {
        self.root.get(SERVICES_KEY).and_then(Value::as_mapping)
    }

    fn service_body_mut(&mut self, service: &str) -> Result<&mut Mapping, ManifestError> {
        self.root
            .get_mut(SERVICES_KEY)
            .and_then(Value::as_mapping_mut)
            .and_then(|services| services.get_mut(service))
            .and_then(Value::as_mapping_mut)
            .ok_or_else(|| ManifestError::UnknownService(service.to_owned()))
    }
}

pub fn parse_manifest_str(input: &str) -> Result<Manifest, ManifestError> {
    let doc: Value = serde_yaml::from_str(input)?;
    let root = match doc {
        Value::Mapping(root) => root,
        other => {
            return Err(ManifestError::Malformed(format!(
                "document root must be a mapping, found {}",
                describe(&other)
            )))
        }
    };

    let services = match root.get(SERVICES_KEY) {
        Some(Value::Mapping(services)) => services,
        Some(other) => {
            return Err(ManifestError::Malformed(format!(
                "'services' must be a mapping, found {}",
                describe(other)
            )))
        }
        None => {
            return Err(ManifestError::Malformed(
                "missing top-level 'services' mapping".to_owned(),
            ))
        }
    };

    for (key, body) in services {
        let Some(name) = key.as_str() else {
            return Err(ManifestError::UnsupportedShape {
                service: format!("{key:?}"),
                field: SERVICES_KEY.to_owned(),
                reason: "service name is not a string".to_owned(),
            });
        };
        validate_service(name, body)?;
    }

    Ok(Manifest { root })
}

pub fn parse_manifest_file(path: impl AsRef<Path>) -> Result<Manifest, ManifestError> {
    let content = fs::read_to_string(path)?;
    parse_manifest_str(&content)
}

fn validate_service(name: &str, body: &Value) -> Result<(), ManifestError> {
    let unsupported = |field: &str, reason: String| ManifestError::UnsupportedShape {
        service: name.to_owned(),
        field: field.to_owned(),
        reason,
    };

    let Value::Mapping(body) = body else {
        return Err(unsupported(
            "",
            format!("service body must be a mapping, found {}", describe(body)),
        ));
    };

    if let Some(image) = body.get(IMAGE_KEY) {
        if matches!(
            image,
            Value::Sequence(_) | Value::Mapping(_) | Value::Tagged(_)
        ) {
            return Err(unsupported(
                IMAGE_KEY,
                format!("expected a scalar image reference, found {}", describe(image)),
            ));
        }
    }

    if let Some(volumes) = body.get(VOLUMES_KEY) {
        if !matches!(volumes, Value::Sequence(_) | Value::Null) {
            return Err(unsupported(
                VOLUMES_KEY,
                format!("expected a sequence of mounts, found {}", describe(volumes)),
            ));
        }
    }

    Ok(())
}

fn describe(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Sequence(_) => "a sequence",
        Value::Mapping(_) => "a mapping",
        Value::Tagged(_) => "a tagged value",
    }
}

fn first_divergence(a: &Value, b: &Value, path: &str) -> Option<String> {
    match (a, b) {
        (Value::Mapping(ma), Value::Mapping(mb)) => {
            if ma.len() != mb.len() {
                return Some(path.to_owned());
            }
            for ((ka, va), (kb, vb)) in ma.iter().zip(mb.iter()) {
                if ka != kb {
                    return Some(path.to_owned());
                }
                let child = format!("{path}.{}", ka.as_str().unwrap_or("?"));
                if let Some(p) = first_divergence(va, vb, &child) {
                    return Some(p);
                }
            }
            None
        }
        (Value::Sequence(sa), Value::Sequence(sb)) => {
            if sa.len() != sb.len() {
                return Some(path.to_owned());
            }
            sa.iter()
                .zip(sb.iter())
                .enumerate()
                .find_map(|(i, (va, vb))| first_divergence(va, vb, &format!("{path}[{i}]")))
        }
        _ if a == b => None,
        _ => Some(path.to_owned()),
    }
}
