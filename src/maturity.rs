//! Maturity tiers and the scorer that folds validation findings into one.
//!
//! Shapes and property shapes may carry a tier (`Niveau 1` to `Niveau 3`).
//! Tiers are cumulative: a publication holds tier N only when every tier up
//! to N is clean. A tier is clean when every class it requires has an
//! instance, every optional property it expects is used somewhere, and none
//! of its properties or shape constraints failed.
//!
//! # Components
//!
//! - **MaturityTier**: `Niveau 0` to `Niveau 3`, ordered
//! - **MaturityTally**: invalid properties and failed constraints per tier,
//!   filled in by the validator while it runs
//! - **MaturityScorer**: turns shapes, facts and a tally into a report
//! - **MaturityReport**: achieved tier, per-tier findings and mandate holders
//!   that were never dereferenced
//!
//! # Example
//!
//! ```rust,ignore
//! let report = MaturityScorer::new(&shapes, &facts)
//!     .with_sparse_paths(config.maturity.sparse_optional_paths.clone())
//!     .score(ctx.tally());
//! println!("achieved {}", report.achieved_tier);
//! ```

use crate::crawl::EntityKind;
use crate::model::{ConstraintResult, Node, ValidatedProperty};
use crate::shapes::ShapeSet;
use crate::store::FactSet;
use crate::vocab::{AANTAL_ONTHOUDERS, AANTAL_TEGENSTANDERS};
use indexmap::IndexSet;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
)]
pub enum MaturityTier {
    #[strum(serialize = "Niveau 0")]
    #[serde(rename = "Niveau 0")]
    Niveau0,
    #[strum(serialize = "Niveau 1")]
    #[serde(rename = "Niveau 1")]
    Niveau1,
    #[strum(serialize = "Niveau 2")]
    #[serde(rename = "Niveau 2")]
    Niveau2,
    #[strum(serialize = "Niveau 3")]
    #[serde(rename = "Niveau 3")]
    Niveau3,
}

impl MaturityTier {
    pub const HIGHEST: MaturityTier = MaturityTier::Niveau3;

    /// The tier directly below, saturating at `Niveau0`.
    pub fn below(self) -> Self {
        match self {
            MaturityTier::Niveau0 | MaturityTier::Niveau1 => MaturityTier::Niveau0,
            MaturityTier::Niveau2 => MaturityTier::Niveau1,
            MaturityTier::Niveau3 => MaturityTier::Niveau2,
        }
    }

    /// Tiers that carry checks, lowest first.
    pub fn scored() -> impl Iterator<Item = MaturityTier> {
        MaturityTier::iter().filter(|tier| *tier != MaturityTier::Niveau0)
    }
}

// =============================================================================
// Tally
// =============================================================================

/// Findings collected during one validation run.
///
/// The ceiling starts at the highest tier and only ever drops. It is the
/// bound the findings alone imply; the score comes from the per-tier
/// reports and always sits at or below it.
#[derive(Debug, Clone)]
pub struct MaturityTally {
    invalid: BTreeMap<MaturityTier, Vec<ValidatedProperty>>,
    failed_constraints: BTreeMap<MaturityTier, Vec<ConstraintResult>>,
    ceiling: MaturityTier,
}

impl Default for MaturityTally {
    fn default() -> Self {
        Self {
            invalid: BTreeMap::new(),
            failed_constraints: BTreeMap::new(),
            ceiling: MaturityTier::HIGHEST,
        }
    }
}

impl MaturityTally {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_invalid(&mut self, tier: MaturityTier, property: ValidatedProperty) {
        self.invalid.entry(tier).or_default().push(property);
        self.lower_below(tier);
    }

    pub fn record_failed_constraints(&mut self, tier: MaturityTier, results: &[ConstraintResult]) {
        if results.is_empty() {
            return;
        }
        self.failed_constraints
            .entry(tier)
            .or_default()
            .extend_from_slice(results);
        self.lower_below(tier);
    }

    fn lower_below(&mut self, tier: MaturityTier) {
        self.ceiling = self.ceiling.min(tier.below());
    }

    pub fn ceiling(&self) -> MaturityTier {
        self.ceiling
    }

    pub fn invalid_at(&self, tier: MaturityTier) -> &[ValidatedProperty] {
        self.invalid.get(&tier).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn failed_constraints_at(&self, tier: MaturityTier) -> &[ConstraintResult] {
        self.failed_constraints
            .get(&tier)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

// =============================================================================
// Report
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MissingProperty {
    pub target_class: String,
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TierReport {
    pub tier: MaturityTier,
    pub missing_classes: Vec<String>,
    pub missing_optional_properties: Vec<MissingProperty>,
    pub invalid_properties: Vec<ValidatedProperty>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failed_constraints: Vec<ConstraintResult>,
}

impl TierReport {
    pub fn is_achieved(&self) -> bool {
        self.missing_classes.is_empty()
            && self.missing_optional_properties.is_empty()
            && self.invalid_properties.is_empty()
            && self.failed_constraints.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MaturityReport {
    pub achieved_tier: MaturityTier,
    pub per_tier: Vec<TierReport>,
    /// Mandate holders the document points to that were never resolved.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub undereferenced_mandataries: Vec<String>,
}

impl MaturityReport {
    pub fn tier(&self, tier: MaturityTier) -> Option<&TierReport> {
        self.per_tier.iter().find(|report| report.tier == tier)
    }
}

// =============================================================================
// Scorer
// =============================================================================

pub struct MaturityScorer<'a> {
    shapes: &'a ShapeSet,
    facts: &'a FactSet,
    sparse_paths: Vec<String>,
}

impl<'a> MaturityScorer<'a> {
    pub fn new(shapes: &'a ShapeSet, facts: &'a FactSet) -> Self {
        Self {
            shapes,
            facts,
            sparse_paths: default_sparse_paths(),
        }
    }

    /// Optional properties that are never reported missing.
    pub fn with_sparse_paths(mut self, paths: Vec<String>) -> Self {
        self.sparse_paths = paths;
        self
    }

    pub fn score(&self, tally: &MaturityTally) -> MaturityReport {
        let per_tier: Vec<TierReport> = MaturityTier::scored()
            .map(|tier| TierReport {
                tier,
                missing_classes: self.missing_classes(tier),
                missing_optional_properties: self.missing_optional_properties(tier),
                invalid_properties: tally.invalid_at(tier).to_vec(),
                failed_constraints: tally.failed_constraints_at(tier).to_vec(),
            })
            .collect();

        let achieved = per_tier
            .iter()
            .take_while(|report| report.is_achieved())
            .map(|report| report.tier)
            .last()
            .unwrap_or(MaturityTier::Niveau0);
        // Every finding behind the ceiling also fails its own tier report.
        debug_assert!(achieved <= tally.ceiling());

        MaturityReport {
            achieved_tier: achieved,
            per_tier,
            undereferenced_mandataries: self.undereferenced_mandataries(),
        }
    }

    fn missing_classes(&self, tier: MaturityTier) -> Vec<String> {
        self.shapes
            .iter()
            .filter(|shape| shape.maturity_tier == Some(tier))
            .map(|shape| shape.target_class.as_str())
            .filter(|class| !self.facts.has_instance(class))
            .collect::<IndexSet<_>>()
            .into_iter()
            .map(str::to_string)
            .collect()
    }

    fn missing_optional_properties(&self, tier: MaturityTier) -> Vec<MissingProperty> {
        let mut missing = IndexSet::new();
        for shape in self.shapes.iter() {
            for property in &shape.properties {
                if property.maturity_tier != Some(tier)
                    || !property.is_optional()
                    || self.sparse_paths.contains(&property.path)
                {
                    continue;
                }
                let used = self
                    .facts
                    .instances_of(&shape.target_class)
                    .any(|instance| self.facts.objects(instance, &property.path).next().is_some());
                if !used {
                    missing.insert(MissingProperty {
                        target_class: shape.target_class.clone(),
                        path: property.path.clone(),
                    });
                }
            }
        }
        missing.into_iter().collect()
    }

    fn undereferenced_mandataries(&self) -> Vec<String> {
        self.facts
            .iter()
            .filter_map(|fact| fact.object.as_iri())
            .filter(|iri| EntityKind::classify(iri) == Some(EntityKind::Mandataris))
            .filter(|iri| self.facts.types_of(&Node::iri(*iri)).next().is_none())
            .collect::<IndexSet<_>>()
            .into_iter()
            .map(str::to_string)
            .collect()
    }
}

pub fn default_sparse_paths() -> Vec<String> {
    vec![AANTAL_TEGENSTANDERS.to_string(), AANTAL_ONTHOUDERS.to_string()]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Fact;
    use crate::shapes::{NodeShape, PropertyShape};
    use crate::vocab::RDF_TYPE;

    const ZITTING: &str = "http://data.vlaanderen.be/ns/besluit#Zitting";
    const STEMMING: &str = "http://data.vlaanderen.be/ns/besluit#Stemming";

    fn property(path: &str, min_count: u32, tier: MaturityTier) -> PropertyShape {
        PropertyShape {
            name: path.to_string(),
            description: None,
            path: path.to_string(),
            target_class: None,
            min_count,
            max_count: None,
            maturity_tier: Some(tier),
            constraints: Vec::new(),
        }
    }

    fn shape(class: &str, tier: Option<MaturityTier>, properties: Vec<PropertyShape>) -> NodeShape {
        NodeShape {
            id: format!("{class}Shape"),
            target_class: class.to_string(),
            name: "shape".to_string(),
            maturity_tier: tier,
            properties,
            constraints: Vec::new(),
        }
    }

    fn invalid(path: &str) -> ValidatedProperty {
        ValidatedProperty {
            name: path.to_string(),
            description: None,
            path: path.to_string(),
            target_class: None,
            min_count: 1,
            max_count: None,
            actual_count: 0,
            value: Vec::new(),
            valid: false,
            maturity_tier: Some(MaturityTier::Niveau1),
            constraint_results: Vec::new(),
        }
    }

    fn zitting_facts() -> FactSet {
        FactSet::from_facts(vec![Fact::new(
            Node::iri("http://example.org/zitting/1"),
            RDF_TYPE,
            Node::iri(ZITTING),
        )])
    }

    #[test]
    fn tier_strings_round_trip_through_strum() {
        assert_eq!(MaturityTier::Niveau2.to_string(), "Niveau 2");
        assert_eq!("Niveau 3".parse::<MaturityTier>().unwrap(), MaturityTier::Niveau3);
        assert!("Niveau 7".parse::<MaturityTier>().is_err());
    }

    #[test]
    fn clean_publication_reaches_highest_tier() {
        let shapes = ShapeSet::new(vec![shape(ZITTING, Some(MaturityTier::Niveau1), vec![])]);
        let facts = zitting_facts();
        let report = MaturityScorer::new(&shapes, &facts).score(&MaturityTally::new());
        assert_eq!(report.achieved_tier, MaturityTier::Niveau3);
    }

    #[test]
    fn missing_class_blocks_its_tier_and_above() {
        let shapes = ShapeSet::new(vec![
            shape(ZITTING, Some(MaturityTier::Niveau1), vec![]),
            shape(STEMMING, Some(MaturityTier::Niveau2), vec![]),
        ]);
        let facts = zitting_facts();
        let report = MaturityScorer::new(&shapes, &facts).score(&MaturityTally::new());
        assert_eq!(report.achieved_tier, MaturityTier::Niveau1);
        assert_eq!(
            report.tier(MaturityTier::Niveau2).unwrap().missing_classes,
            vec![STEMMING.to_string()]
        );
    }

    #[test]
    fn lower_failure_blocks_clean_higher_tiers() {
        let shapes = ShapeSet::new(vec![shape(STEMMING, Some(MaturityTier::Niveau1), vec![])]);
        let facts = zitting_facts();
        let report = MaturityScorer::new(&shapes, &facts).score(&MaturityTally::new());
        assert_eq!(report.achieved_tier, MaturityTier::Niveau0);
        assert!(report.tier(MaturityTier::Niveau2).unwrap().is_achieved());
    }

    #[test]
    fn unused_optional_property_is_missing_except_vote_tallies() {
        let shapes = ShapeSet::new(vec![shape(
            ZITTING,
            None,
            vec![
                property("http://example.org/unused", 0, MaturityTier::Niveau2),
                property(AANTAL_TEGENSTANDERS, 0, MaturityTier::Niveau2),
                property("http://example.org/required", 1, MaturityTier::Niveau2),
            ],
        )]);
        let facts = zitting_facts();
        let report = MaturityScorer::new(&shapes, &facts).score(&MaturityTally::new());
        let tier2 = report.tier(MaturityTier::Niveau2).unwrap();
        assert_eq!(
            tier2.missing_optional_properties,
            vec![MissingProperty {
                target_class: ZITTING.to_string(),
                path: "http://example.org/unused".to_string(),
            }]
        );
        assert_eq!(report.achieved_tier, MaturityTier::Niveau1);
    }

    #[test]
    fn ceiling_never_rises_after_an_invalid_property() {
        let mut tally = MaturityTally::new();
        tally.record_invalid(MaturityTier::Niveau1, invalid("http://example.org/p"));
        assert_eq!(tally.ceiling(), MaturityTier::Niveau0);

        tally.record_invalid(MaturityTier::Niveau3, invalid("http://example.org/q"));
        assert_eq!(tally.ceiling(), MaturityTier::Niveau0);

        let shapes = ShapeSet::default();
        let facts = FactSet::new();
        let report = MaturityScorer::new(&shapes, &facts).score(&tally);
        assert_eq!(report.achieved_tier, MaturityTier::Niveau0);
        assert_eq!(report.tier(MaturityTier::Niveau1).unwrap().invalid_properties.len(), 1);
    }

    #[test]
    fn score_comes_from_tier_reports_not_the_ceiling() {
        let mut tally = MaturityTally::new();
        let mut failed = invalid("http://example.org/p");
        failed.maturity_tier = Some(MaturityTier::Niveau2);
        tally.record_invalid(MaturityTier::Niveau2, failed);

        // Clean tier one, failing tier two: walk and ceiling agree.
        let shapes = ShapeSet::new(vec![shape(ZITTING, Some(MaturityTier::Niveau1), vec![])]);
        let facts = zitting_facts();
        let report = MaturityScorer::new(&shapes, &facts).score(&tally);
        assert_eq!(report.achieved_tier, MaturityTier::Niveau1);
        assert_eq!(tally.ceiling(), MaturityTier::Niveau1);

        // A missing tier-one class drops the score below the ceiling.
        let shapes = ShapeSet::new(vec![shape(STEMMING, Some(MaturityTier::Niveau1), vec![])]);
        let report = MaturityScorer::new(&shapes, &facts).score(&tally);
        assert_eq!(report.achieved_tier, MaturityTier::Niveau0);
        assert!(!report.tier(MaturityTier::Niveau2).unwrap().is_achieved());
    }

    #[test]
    fn lists_mandataries_without_type_facts() {
        let facts = FactSet::from_facts(vec![Fact::new(
            Node::iri("http://example.org/stemming/1"),
            "http://data.vlaanderen.be/ns/besluit#heeftVoorstander",
            Node::iri("https://data.lblod.info/id/mandatarissen/42"),
        )]);
        let shapes = ShapeSet::default();
        let report = MaturityScorer::new(&shapes, &facts).score(&MaturityTally::new());
        assert_eq!(
            report.undereferenced_mandataries,
            vec!["https://data.lblod.info/id/mandatarissen/42".to_string()]
        );
    }
}
