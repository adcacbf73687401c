use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Tag assumed when a reference does not carry one.
pub const DEFAULT_TAG: &str = "latest";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReferenceError {
    #[error("image reference is empty")]
    Empty,
    #[error("invalid image reference '{reference}': {reason}")]
    Invalid { reference: String, reason: String },
}

/// Parsed form of an image reference string.
///
/// `registry.example.com:5000/team/app:1.2@sha256:...` splits into registry
/// `registry.example.com:5000`, namespace `team`, name `app`, tag `1.2` and
/// the digest. The tag defaults to [`DEFAULT_TAG`], never to an empty string.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageReference {
    pub registry: Option<String>,
    pub namespace: Option<String>,
    pub name: String,
    pub tag: String,
    pub digest: Option<String>,
}

impl ImageReference {
    pub fn parse(raw: &str) -> Result<Self, ReferenceError> {
        let input = raw.trim();
        if input.is_empty() {
            return Err(ReferenceError::Empty);
        }
        if input.chars().any(char::is_whitespace) {
            return Err(invalid(input, "contains whitespace"));
        }

        let (path_and_tag, digest) = match input.split_once('@') {
            Some((rest, digest)) if !digest.is_empty() => (rest, Some(digest.to_owned())),
            Some(_) => return Err(invalid(input, "empty digest")),
            None => (input, None),
        };

        // A ':' after the last '/' separates the tag; earlier colons belong
        // to a registry port.
        let last_slash = path_and_tag.rfind('/').map_or(0, |i| i + 1);
        let (path, tag) = match path_and_tag[last_slash..].rfind(':') {
            Some(i) => {
                let split = last_slash + i;
                let tag = &path_and_tag[split + 1..];
                if tag.is_empty() {
                    return Err(invalid(input, "empty tag"));
                }
                (&path_and_tag[..split], tag.to_owned())
            }
            None => (path_and_tag, DEFAULT_TAG.to_owned()),
        };

        let mut segments: Vec<&str> = path.split('/').collect();
        if segments.iter().any(|s| s.is_empty()) {
            return Err(invalid(input, "empty path segment"));
        }

        let registry = if segments.len() > 1 && is_registry(segments[0]) {
            Some(segments.remove(0).to_owned())
        } else {
            None
        };
        let name = segments
            .pop()
            .ok_or_else(|| invalid(input, "missing repository name"))?
            .to_owned();
        let namespace = if segments.is_empty() {
            None
        } else {
            Some(segments.join("/"))
        };

        Ok(Self {
            registry,
            namespace,
            name,
            tag,
            digest,
        })
    }

    /// Repository path without registry or tag, e.g. `langgenius/dify-api`.
    pub fn repository(&self) -> String {
        match &self.namespace {
            Some(ns) => format!("{ns}/{}", self.name),
            None => self.name.clone(),
        }
    }

    /// Last repository segment with `/` and `-` replaced by `_`.
    pub fn sanitized_name(&self) -> String {
        self.name.replace(['/', '-'], "_")
    }
}

impl fmt::Display for ImageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(registry) = &self.registry {
            write!(f, "{registry}/")?;
        }
        write!(f, "{}:{}", self.repository(), self.tag)?;
        if let Some(digest) = &self.digest {
            write!(f, "@{digest}")?;
        }
        Ok(())
    }
}

fn is_registry(segment: &str) -> bool {
    segment.contains('.') || segment.contains(':') || segment == "localhost"
}

fn invalid(reference: &str, reason: &str) -> ReferenceError {
    ReferenceError::Invalid {
        reference: reference.to_owned(),
        reason: reason.to_owned(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_namespaced_reference() {
        let r = ImageReference::parse("langgenius/dify-api:1.4.0").unwrap();
        assert_eq!(r.registry, None);
        assert_eq!(r.namespace.as_deref(), Some("langgenius"));
        assert_eq!(r.name, "dify-api");
        assert_eq!(r.tag, "1.4.0");
        assert_eq!(r.repository(), "langgenius/dify-api");
        assert_eq!(r.sanitized_name(), "dify_api");
    }

    #[test]
    fn missing_tag_defaults_to_latest() {
        let r = ImageReference::parse("redis").unwrap();
        assert_eq!(r.tag, "latest");
        assert_eq!(r.to_string(), "redis:latest");
    }

    #[test]
    fn registry_with_port_is_not_a_tag() {
        let r = ImageReference::parse("localhost:5000/tools/app").unwrap();
        assert_eq!(r.registry.as_deref(), Some("localhost:5000"));
        assert_eq!(r.namespace.as_deref(), Some("tools"));
        assert_eq!(r.name, "app");
        assert_eq!(r.tag, "latest");
    }

    #[test]
    fn dotted_first_segment_is_registry() {
        let r = ImageReference::parse("myregistry.local/foo-bar:2.0").unwrap();
        assert_eq!(r.registry.as_deref(), Some("myregistry.local"));
        assert_eq!(r.namespace, None);
        assert_eq!(r.name, "foo-bar");
    }

    #[test]
    fn digest_is_split_off() {
        let r = ImageReference::parse("nginx:1.25@sha256:abcd").unwrap();
        assert_eq!(r.tag, "1.25");
        assert_eq!(r.digest.as_deref(), Some("sha256:abcd"));
        assert_eq!(r.to_string(), "nginx:1.25@sha256:abcd");
    }

    #[test]
    fn rejects_empty_and_malformed() {
        assert_eq!(ImageReference::parse("  "), Err(ReferenceError::Empty));
        assert!(ImageReference::parse("nginx:").is_err());
        assert!(ImageReference::parse("a//b").is_err());
        assert!(ImageReference::parse("has space:1").is_err());
    }
}
