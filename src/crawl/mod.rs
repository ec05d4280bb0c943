//! Reference crawling.
//!
//! A publication points to mandate holders, persons, governing bodies and the
//! like by URI. The crawler fetches those documents and merges their facts in
//! so the validator sees the entities themselves, not just their identifiers.
//! The fact set only grows; a failed fetch is logged and skipped.
//!
//! Expansion runs in two levels. Level one fetches every entity the document
//! references. Level two fetches entities referenced from the governing-body
//! documents of level one, and is skipped once an administrative unit is
//! already known. Both level-two rules are switches on [`CrawlPolicy`].
//!
//! # Components
//!
//! - **Dereference**: fetches one URI into facts
//! - **HttpDereferencer**: content negotiation, timeout, retries, lenient mode
//! - **StaticDereferencer**: in-memory or directory-backed documents with a
//!   request log
//! - **Crawler**: the two-level expansion with bounded, ordered concurrency
//!
//! # Example
//!
//! ```rust,ignore
//! let dereferencer = HttpDereferencer::new(FetchOptions::default(), None)?;
//! let stats = Crawler::new(&dereferencer).crawl(&mut facts).await;
//! println!("{} requested, {} failed", stats.requested, stats.failed);
//! ```

mod fetch;

pub use fetch::{Dereference, FetchOptions, HttpDereferencer, StaticDereferencer};

use crate::model::Fact;
use crate::store::FactSet;
use crate::vocab::BESTUURSEENHEID;
use futures::stream::{self, StreamExt};
use indexmap::IndexSet;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use std::collections::HashSet;
use strum::Display;
use tracing::{debug, info, warn};

static ENTITY_PATH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"/(mandatarissen|personen|functionarissen|bestuursorganen|bestuurseenheden|werkingsgebieden)/")
        .expect("static regex")
});

/// Kinds of entity worth dereferencing, recognized by their URI path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum EntityKind {
    Mandataris,
    Persoon,
    Functionaris,
    Bestuursorgaan,
    Bestuurseenheid,
    Werkingsgebied,
}

impl EntityKind {
    pub fn classify(uri: &str) -> Option<Self> {
        let captures = ENTITY_PATH.captures(uri)?;
        Some(match &captures[1] {
            "mandatarissen" => EntityKind::Mandataris,
            "personen" => EntityKind::Persoon,
            "functionarissen" => EntityKind::Functionaris,
            "bestuursorganen" => EntityKind::Bestuursorgaan,
            "bestuurseenheden" => EntityKind::Bestuurseenheid,
            _ => EntityKind::Werkingsgebied,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlPolicy {
    pub expand_governing_bodies: bool,
    pub skip_when_administrative_unit_known: bool,
    pub max_concurrent_fetches: usize,
}

impl Default for CrawlPolicy {
    fn default() -> Self {
        Self {
            expand_governing_bodies: true,
            skip_when_administrative_unit_known: true,
            max_concurrent_fetches: 8,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CrawlStats {
    pub requested: usize,
    pub failed: usize,
    pub facts_added: usize,
    pub levels: usize,
}

pub struct Crawler<'a> {
    dereferencer: &'a dyn Dereference,
    policy: CrawlPolicy,
}

impl<'a> Crawler<'a> {
    pub fn new(dereferencer: &'a dyn Dereference) -> Self {
        Self::with_policy(dereferencer, CrawlPolicy::default())
    }

    pub fn with_policy(dereferencer: &'a dyn Dereference, policy: CrawlPolicy) -> Self {
        Self {
            dereferencer,
            policy,
        }
    }

    /// Grows `facts` with the documents of referenced entities. Never removes
    /// facts; a URI is requested at most once.
    pub async fn crawl(&self, facts: &mut FactSet) -> CrawlStats {
        let mut seen = HashSet::new();
        let mut stats = CrawlStats::default();

        let level_one = entity_references(facts.iris(), &mut seen);
        let fetched = self.fetch_level(level_one, facts, &mut stats).await;

        if !self.policy.expand_governing_bodies {
            debug!("governing-body expansion disabled");
        } else if self.policy.skip_when_administrative_unit_known && facts.has_instance(BESTUURSEENHEID)
        {
            debug!("administrative unit already known, skipping second level");
        } else {
            let from_bodies = fetched
                .iter()
                .filter(|(uri, _)| EntityKind::classify(uri) == Some(EntityKind::Bestuursorgaan))
                .flat_map(|(_, facts)| facts.iter())
                .flat_map(|fact| fact.subject.as_iri().into_iter().chain(fact.object.as_iri()));
            let level_two = entity_references(from_bodies, &mut seen);
            self.fetch_level(level_two, facts, &mut stats).await;
        }

        info!(
            requested = stats.requested,
            failed = stats.failed,
            facts_added = stats.facts_added,
            levels = stats.levels,
            "crawl finished"
        );
        stats
    }

    /// Fetches one level and merges the results in request order.
    async fn fetch_level(
        &self,
        uris: Vec<String>,
        facts: &mut FactSet,
        stats: &mut CrawlStats,
    ) -> Vec<(String, Vec<Fact>)> {
        if uris.is_empty() {
            return Vec::new();
        }
        stats.levels += 1;
        stats.requested += uris.len();
        debug!(level = stats.levels, count = uris.len(), "dereferencing level");

        let results: Vec<_> = stream::iter(uris)
            .map(|uri| async move {
                let result = self.dereferencer.dereference(&uri).await;
                (uri, result)
            })
            .buffered(self.policy.max_concurrent_fetches.max(1))
            .collect()
            .await;

        let mut fetched = Vec::with_capacity(results.len());
        for (uri, result) in results {
            match result {
                Ok(document) => {
                    stats.facts_added += facts.extend(document.iter().cloned());
                    fetched.push((uri, document));
                }
                Err(error) => {
                    stats.failed += 1;
                    warn!(%uri, %error, "dereference failed, continuing");
                }
            }
        }
        fetched
    }
}

/// Unseen entity URIs in first-mention order; marks them seen.
fn entity_references<'s>(
    iris: impl Iterator<Item = &'s str>,
    seen: &mut HashSet<String>,
) -> Vec<String> {
    let candidates: IndexSet<&str> = iris
        .filter(|iri| EntityKind::classify(iri).is_some())
        .collect();
    candidates
        .into_iter()
        .filter(|iri| seen.insert(iri.to_string()))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_entity_paths() {
        assert_eq!(
            EntityKind::classify("https://data.lblod.info/id/mandatarissen/5C3F"),
            Some(EntityKind::Mandataris)
        );
        assert_eq!(
            EntityKind::classify("http://data.lblod.info/id/bestuursorganen/abc"),
            Some(EntityKind::Bestuursorgaan)
        );
        assert_eq!(EntityKind::classify("http://example.org/zittingen/1"), None);
    }

    #[test]
    fn references_are_deduplicated_against_seen() {
        let mut seen = HashSet::from(["http://x.org/personen/1".to_string()]);
        let found = entity_references(
            [
                "http://x.org/personen/1",
                "http://x.org/personen/2",
                "http://x.org/personen/2",
                "http://x.org/zittingen/3",
            ]
            .into_iter(),
            &mut seen,
        );
        assert_eq!(found, vec!["http://x.org/personen/2"]);
        assert!(seen.contains("http://x.org/personen/2"));
    }
}
