use crate::resolver::StrategyAttempt;
use crate::CoreError;
use ferry_schema::{ImageField, Manifest};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::str::FromStr;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Which service field a record refers to; serialized as `image` or
/// `volumes[i]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum Field {
    Image,
    /// Entry of the service's `volumes` sequence, by position.
    Volume(usize),
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Image => f.write_str("image"),
            Self::Volume(i) => write!(f, "volumes[{i}]"),
        }
    }
}

impl FromStr for Field {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "image" {
            return Ok(Self::Image);
        }
        s.strip_prefix("volumes[")
            .and_then(|rest| rest.strip_suffix(']'))
            .and_then(|index| index.parse().ok())
            .map(Self::Volume)
            .ok_or_else(|| format!("invalid field '{s}', expected 'image' or 'volumes[N]'"))
    }
}

impl From<Field> for String {
    fn from(field: Field) -> Self {
        field.to_string()
    }
}

impl TryFrom<String> for Field {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeOutcome {
    Applied,
    NotFound,
    Skipped,
}

impl fmt::Display for ChangeOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Applied => f.write_str("applied"),
            Self::NotFound => f.write_str("not_found"),
            Self::Skipped => f.write_str("skipped"),
        }
    }
}

/// One attempted edit.
///
/// `after` is set only for applied records. Applied records name the
/// `strategy` (image resolution strategy or mount remap rule); the others
/// carry a `reason`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeRecord {
    pub service: String,
    pub field: Field,
    pub before: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after: Option<String>,
    pub outcome: ChangeOutcome,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub attempts: Vec<StrategyAttempt>,
}

impl ChangeRecord {
    pub fn applied(service: &str, field: Field, before: &str, after: &str, strategy: String) -> Self {
        Self {
            service: service.to_owned(),
            field,
            before: before.to_owned(),
            after: Some(after.to_owned()),
            outcome: ChangeOutcome::Applied,
            strategy: Some(strategy),
            reason: None,
            attempts: Vec::new(),
        }
    }

    pub fn not_found(service: &str, field: Field, before: &str, reason: String) -> Self {
        Self {
            service: service.to_owned(),
            field,
            before: before.to_owned(),
            after: None,
            outcome: ChangeOutcome::NotFound,
            strategy: None,
            reason: Some(reason),
            attempts: Vec::new(),
        }
    }

    pub fn skipped(service: &str, field: Field, before: &str, reason: String) -> Self {
        Self {
            service: service.to_owned(),
            field,
            before: before.to_owned(),
            after: None,
            outcome: ChangeOutcome::Skipped,
            strategy: None,
            reason: Some(reason),
            attempts: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_attempts(mut self, attempts: Vec<StrategyAttempt>) -> Self {
        self.attempts = attempts;
        self
    }
}

/// Counts per outcome plus the services whose image stayed unresolved.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Summary {
    pub applied: usize,
    pub not_found: usize,
    pub skipped: usize,
    pub unresolved_services: Vec<String>,
}

/// Ordered account of every edit a rewrite attempted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangeLog {
    pub source_digest: String,
    pub output_digest: String,
    pub restore_root: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_prefix: Option<String>,
    pub records: Vec<ChangeRecord>,
}

impl ChangeLog {
    pub fn summary(&self) -> Summary {
        let mut summary = Summary::default();
        for record in &self.records {
            match record.outcome {
                ChangeOutcome::Applied => summary.applied += 1,
                ChangeOutcome::Skipped => summary.skipped += 1,
                ChangeOutcome::NotFound => {
                    summary.not_found += 1;
                    if record.field == Field::Image
                        && !summary.unresolved_services.contains(&record.service)
                    {
                        summary.unresolved_services.push(record.service.clone());
                    }
                }
            }
        }
        summary
    }

    /// True when any service image was left unresolved.
    pub fn has_unresolved(&self) -> bool {
        self.records
            .iter()
            .any(|r| r.outcome == ChangeOutcome::NotFound && r.field == Field::Image)
    }

    pub fn to_json(&self) -> Result<String, CoreError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn load(path: &Path) -> Result<Self, CoreError> {
        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }
}

/// An applied record whose field no longer holds the value it wrote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RevertConflict {
    pub service: String,
    pub field: Field,
    pub expected: String,
    pub found: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RevertReport {
    pub reverted: usize,
    pub conflicts: Vec<RevertConflict>,
    /// Whether the manifest was byte-identical to the rewrite output before reverting.
    pub digest_matched: bool,
}

/// Undo every applied record of `log` whose field still holds its `after` value.
pub fn revert(manifest: &mut Manifest, log: &ChangeLog) -> Result<RevertReport, CoreError> {
    let mut report = RevertReport {
        digest_matched: manifest.digest()? == log.output_digest,
        ..RevertReport::default()
    };

    for record in log
        .records
        .iter()
        .filter(|r| r.outcome == ChangeOutcome::Applied)
    {
        let Some(after) = record.after.as_deref() else {
            continue;
        };
        let current = current_value(manifest, &record.service, record.field);
        if current.as_deref() != Some(after) {
            warn!(
                "{} {}: expected '{after}', found {:?}; not reverted",
                record.service, record.field, current
            );
            report.conflicts.push(RevertConflict {
                service: record.service.clone(),
                field: record.field,
                expected: after.to_owned(),
                found: current,
            });
            continue;
        }
        match record.field {
            Field::Image => manifest.set_image(&record.service, &record.before)?,
            Field::Volume(i) => manifest.set_volume(&record.service, i, &record.before)?,
        }
        report.reverted += 1;
    }

    info!(
        "reverted {} edits, {} conflicts",
        report.reverted,
        report.conflicts.len()
    );
    Ok(report)
}

fn current_value(manifest: &Manifest, service: &str, field: Field) -> Option<String> {
    match field {
        Field::Image => match manifest.service(service)?.image() {
            ImageField::Reference(r) => Some(r.to_owned()),
            ImageField::Absent | ImageField::NonString | ImageField::Inherited => None,
        },
        Field::Volume(i) => manifest.volume_at(service, i).map(str::to_owned),
    }
}
