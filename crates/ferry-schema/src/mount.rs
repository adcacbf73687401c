use serde::Serialize;
use std::fmt;
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MountError {
    #[error("mount entry is empty")]
    Empty,
    #[error("mount '{0}' has no destination")]
    MissingDestination(String),
    #[error("mount '{spec}': destination '{destination}' is not absolute")]
    RelativeDestination { spec: String, destination: String },
    #[error("mount '{0}' has more than three ':'-separated parts")]
    TooManyParts(String),
}

/// How a mount source is interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Host path: `/abs`, `./rel`, `../rel`, `~/home`, `.` or `..`.
    Path,
    /// Bare identifier that may name a volume.
    Name,
    /// Anything else (interpolations, markers with unusual characters).
    Other,
}

/// A short-syntax mount entry `source:destination[:options]`.
///
/// The destination always starts with `/`. An entry with only a destination
/// is an anonymous volume and has no source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MountSpec {
    pub source: Option<String>,
    pub destination: String,
    pub options: Option<String>,
}

impl MountSpec {
    pub fn parse(spec: &str) -> Result<Self, MountError> {
        let trimmed = spec.trim();
        if trimmed.is_empty() {
            return Err(MountError::Empty);
        }

        let parts: Vec<&str> = trimmed.split(':').collect();
        let (source, destination, options) = match parts.as_slice() {
            [destination] => (None, *destination, None),
            [source, destination] => (Some(*source), *destination, None),
            [source, destination, options] => (Some(*source), *destination, Some(*options)),
            _ => return Err(MountError::TooManyParts(trimmed.to_owned())),
        };

        if destination.is_empty() {
            return Err(MountError::MissingDestination(trimmed.to_owned()));
        }
        if !destination.starts_with('/') {
            // A single relative token is a source without a destination.
            if source.is_none() {
                return Err(MountError::MissingDestination(trimmed.to_owned()));
            }
            return Err(MountError::RelativeDestination {
                spec: trimmed.to_owned(),
                destination: destination.to_owned(),
            });
        }
        if source.is_some_and(str::is_empty) {
            return Err(MountError::MissingDestination(trimmed.to_owned()));
        }

        Ok(Self {
            source: source.map(str::to_owned),
            destination: destination.to_owned(),
            options: options.filter(|o| !o.is_empty()).map(str::to_owned),
        })
    }

    pub fn source_kind(&self) -> Option<SourceKind> {
        self.source.as_deref().map(classify_source)
    }

    #[must_use]
    pub fn with_source(&self, source: impl Into<String>) -> Self {
        Self {
            source: Some(source.into()),
            destination: self.destination.clone(),
            options: self.options.clone(),
        }
    }
}

impl fmt::Display for MountSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(source) = &self.source {
            write!(f, "{source}:")?;
        }
        f.write_str(&self.destination)?;
        if let Some(options) = &self.options {
            write!(f, ":{options}")?;
        }
        Ok(())
    }
}

pub fn classify_source(source: &str) -> SourceKind {
    if source.starts_with('/')
        || source.starts_with("./")
        || source.starts_with("../")
        || source.starts_with('~')
        || source == "."
        || source == ".."
    {
        return SourceKind::Path;
    }
    let mut chars = source.chars();
    let leading_ok = chars.next().is_some_and(|c| c.is_ascii_alphanumeric());
    if leading_ok
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
    {
        SourceKind::Name
    } else {
        SourceKind::Other
    }
}
