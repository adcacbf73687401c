//! Image reference resolution against the offline catalog.
//!
//! Resolution runs a fixed cascade of [`Strategy`] matchers. Each matcher is a
//! pure function from a [`Query`] and the catalog to an ordered candidate
//! list. The first strategy that yields any candidate wins; when it yields
//! several, the lexicographically smallest identifier is chosen and the
//! resolution is marked ambiguous.

use ferry_catalog::{Catalog, CatalogEntry};
use ferry_schema::{normalize_separators, ArtifactId, ImageReference};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info, warn};

/// One reference to resolve, with the context it appears in.
#[derive(Debug, Clone)]
pub struct Query<'a> {
    pub service: &'a str,
    pub reference: &'a str,
    pub prefix: Option<&'a str>,
    parsed: Option<ImageReference>,
}

impl<'a> Query<'a> {
    pub fn new(service: &'a str, reference: &'a str, prefix: Option<&'a str>) -> Self {
        Self {
            service,
            reference,
            prefix: prefix.map(str::trim).filter(|p| !p.is_empty()),
            parsed: ImageReference::parse(reference).ok(),
        }
    }

    /// Parsed reference, if `reference` is well formed.
    pub fn parsed(&self) -> Option<&ImageReference> {
        self.parsed.as_ref()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// `{prefix}_*{service}*`
    PrefixedService,
    /// `*{service}*`
    BareService,
    /// `{prefix}_{sanitized}` or `{sanitized}`, exact
    SanitizedOriginal,
    /// normalized repository contains the normalized base name
    BaseNameFuzzy,
}

type Matcher = for<'c> fn(&Query<'_>, &'c Catalog) -> Vec<&'c CatalogEntry>;

impl Strategy {
    /// Priority order of the cascade.
    pub const CASCADE: [Self; 4] = [
        Self::PrefixedService,
        Self::BareService,
        Self::SanitizedOriginal,
        Self::BaseNameFuzzy,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::PrefixedService => "prefixed_service",
            Self::BareService => "bare_service",
            Self::SanitizedOriginal => "sanitized_original",
            Self::BaseNameFuzzy => "base_name_fuzzy",
        }
    }

    /// Catalog images this strategy accepts, ordered by identifier.
    pub fn candidates<'c>(self, query: &Query<'_>, catalog: &'c Catalog) -> Vec<&'c CatalogEntry> {
        let matcher: Matcher = match self {
            Self::PrefixedService => prefixed_service,
            Self::BareService => bare_service,
            Self::SanitizedOriginal => sanitized_original,
            Self::BaseNameFuzzy => base_name_fuzzy,
        };
        matcher(query, catalog)
    }

    /// Why the strategy cannot run for this query, if it cannot.
    fn inapplicable(self, query: &Query<'_>) -> Option<&'static str> {
        match self {
            Self::PrefixedService if query.prefix.is_none() => Some("no project prefix"),
            Self::SanitizedOriginal | Self::BaseNameFuzzy if query.parsed.is_none() => {
                Some("unparsable reference")
            }
            _ => None,
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

fn prefixed_service<'c>(query: &Query<'_>, catalog: &'c Catalog) -> Vec<&'c CatalogEntry> {
    let Some(prefix) = query.prefix else {
        return Vec::new();
    };
    let head = format!("{prefix}_");
    catalog
        .images()
        .filter(|e| {
            e.repository()
                .strip_prefix(head.as_str())
                .is_some_and(|rest| rest.contains(query.service))
        })
        .collect()
}

fn bare_service<'c>(query: &Query<'_>, catalog: &'c Catalog) -> Vec<&'c CatalogEntry> {
    catalog
        .images()
        .filter(|e| e.repository().contains(query.service))
        .collect()
}

fn sanitized_original<'c>(query: &Query<'_>, catalog: &'c Catalog) -> Vec<&'c CatalogEntry> {
    let Some(parsed) = query.parsed() else {
        return Vec::new();
    };
    let sanitized = parsed.sanitized_name();
    let prefixed = query.prefix.map(|p| format!("{p}_{sanitized}"));
    catalog
        .images()
        .filter(|e| e.repository() == sanitized || prefixed.as_deref() == Some(e.repository()))
        .collect()
}

fn base_name_fuzzy<'c>(query: &Query<'_>, catalog: &'c Catalog) -> Vec<&'c CatalogEntry> {
    let Some(parsed) = query.parsed() else {
        return Vec::new();
    };
    let base = normalize_separators(&parsed.name);
    catalog
        .images()
        .filter(|e| normalize_separators(e.repository()).contains(&base))
        .collect()
}

/// Record of one strategy in the cascade.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategyAttempt {
    pub strategy: Strategy,
    pub candidates: Vec<ArtifactId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skipped: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotFoundReason {
    NoCatalogEntries,
    NoStrategyMatched,
}

impl fmt::Display for NotFoundReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoCatalogEntries => f.write_str("no catalog entries"),
            Self::NoStrategyMatched => f.write_str("no strategy matched"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Resolved {
        entry: CatalogEntry,
        strategy: Strategy,
        ambiguous: bool,
    },
    NotFound(NotFoundReason),
}

/// Full account of resolving one reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    pub service: String,
    pub reference: String,
    pub attempts: Vec<StrategyAttempt>,
    pub outcome: Outcome,
}

impl Resolution {
    pub fn entry(&self) -> Option<&CatalogEntry> {
        match &self.outcome {
            Outcome::Resolved { entry, .. } => Some(entry),
            Outcome::NotFound(_) => None,
        }
    }

    pub fn strategy(&self) -> Option<Strategy> {
        match &self.outcome {
            Outcome::Resolved { strategy, .. } => Some(*strategy),
            Outcome::NotFound(_) => None,
        }
    }
}

/// Resolve `reference` used by `service` to an offline catalog image.
pub fn resolve(
    service: &str,
    reference: &str,
    catalog: &Catalog,
    prefix: Option<&str>,
) -> Resolution {
    resolve_query(&Query::new(service, reference, prefix), catalog)
}

pub fn resolve_query(query: &Query<'_>, catalog: &Catalog) -> Resolution {
    let mut attempts = Vec::with_capacity(Strategy::CASCADE.len());
    let finish = |attempts, outcome| Resolution {
        service: query.service.to_owned(),
        reference: query.reference.to_owned(),
        attempts,
        outcome,
    };

    if catalog.images().next().is_none() {
        warn!(
            "{}: '{}' not resolved: no catalog entries",
            query.service, query.reference
        );
        return finish(attempts, Outcome::NotFound(NotFoundReason::NoCatalogEntries));
    }

    for strategy in Strategy::CASCADE {
        if let Some(why) = strategy.inapplicable(query) {
            debug!("{}: {strategy} skipped ({why})", query.service);
            attempts.push(StrategyAttempt {
                strategy,
                candidates: Vec::new(),
                skipped: Some(why.to_owned()),
            });
            continue;
        }

        let candidates = strategy.candidates(query, catalog);
        debug!(
            "{}: {strategy} on '{}' -> {} candidate(s)",
            query.service,
            query.reference,
            candidates.len()
        );
        attempts.push(StrategyAttempt {
            strategy,
            candidates: candidates.iter().map(|e| e.id.clone()).collect(),
            skipped: None,
        });

        if let Some(first) = candidates.first() {
            let ambiguous = candidates.len() > 1;
            if ambiguous {
                warn!(
                    "{}: {strategy} matched {} images, choosing '{}'",
                    query.service,
                    candidates.len(),
                    first.id
                );
            }
            info!(
                "{}: '{}' -> '{}' via {strategy}",
                query.service, query.reference, first.id
            );
            let outcome = Outcome::Resolved {
                entry: (*first).clone(),
                strategy,
                ambiguous,
            };
            return finish(attempts, outcome);
        }
    }

    warn!(
        "{}: '{}' not resolved: no strategy matched",
        query.service, query.reference
    );
    finish(attempts, Outcome::NotFound(NotFoundReason::NoStrategyMatched))
}
