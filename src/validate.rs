//! Shape validation of a parsed forest.
//!
//! Every typed subject is checked against each node shape that targets its
//! class. A property is valid when its count is within `sh:minCount` and
//! `sh:maxCount`, its values have the required class, no text value is blank
//! and none of its embedded queries returns a row.
//!
//! # Components
//!
//! - **ShapeValidator**: validates roots against a compiled [`ShapeSet`]
//! - **RunContext**: all state of one run; the verdict cache keyed by subject
//!   identity, the subjects currently on the stack, the maturity tally and
//!   the optional progress hook
//! - **Verdict**: cached outcome of one subject, shaped or not
//!
//! A subject is validated at most once per context and always from the copy
//! where the parser expanded its edges, so the verdict does not depend on
//! which parent reaches it first. A reference back into a subject that is
//! still being validated is reported as its plain identifier.
//!
//! # Example
//!
//! ```rust,ignore
//! let engine = OxigraphEngine::from_facts(&facts)?;
//! let mut ctx = RunContext::new();
//! let validated = ShapeValidator::new(&shapes, &engine).validate_all(&parse(&facts), &mut ctx)?;
//! let report = MaturityScorer::new(&shapes, &facts).score(ctx.tally());
//! ```

use crate::constraint::ConstraintEvaluator;
use crate::error::{Result, ValidatorError};
use crate::maturity::MaturityTally;
use crate::model::{
    ConstraintResult, ParsedSubject, ParsedValue, ProcessedProperty, PropertyValue,
    SubjectProperties, ValidatedProperty, ValidatedSubject,
};
use crate::shapes::{NodeShape, PropertyShape, ShapeSet};
use crate::store::QueryEngine;
use crate::vocab::{FUNCTIONARIS, MANDATARIS, PROV_LOCATION, is_distinct_target_relation, short_name};
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{HashMap, HashSet};
use tracing::{debug, trace};

/// A bare identifier with a URI scheme, e.g. `https://…` or `urn:…`.
static URI_SCHEME: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9+.\-]*:\S+$").expect("static regex"));

// =============================================================================
// Run Context
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Progress {
    pub validated: usize,
    pub total: usize,
    pub uri: String,
}

/// Returning an error from the hook aborts the run.
pub type ProgressHook<'a> = Box<dyn FnMut(&Progress) -> anyhow::Result<()> + Send + 'a>;

/// Outcome of validating one subject.
#[derive(Debug, Clone, PartialEq)]
pub enum Verdict {
    /// No shape targets the subject's class.
    Unshaped(ValidatedSubject),
    /// One entry per matching shape.
    Shaped(Vec<ValidatedSubject>),
}

impl Verdict {
    pub fn subjects(&self) -> &[ValidatedSubject] {
        match self {
            Verdict::Unshaped(subject) => std::slice::from_ref(subject),
            Verdict::Shaped(subjects) => subjects,
        }
    }
}

#[derive(Default)]
pub struct RunContext<'a> {
    cache: HashMap<String, Verdict>,
    in_progress: HashSet<String>,
    tally: MaturityTally,
    progress: Option<ProgressHook<'a>>,
    validations: usize,
}

impl<'a> RunContext<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_progress(mut self, hook: ProgressHook<'a>) -> Self {
        self.progress = Some(hook);
        self
    }

    pub fn tally(&self) -> &MaturityTally {
        &self.tally
    }

    pub fn into_tally(self) -> MaturityTally {
        self.tally
    }

    /// Number of subjects actually validated, cache hits excluded.
    pub fn validations(&self) -> usize {
        self.validations
    }

    pub fn cached(&self, uri: &str) -> Option<&Verdict> {
        self.cache.get(uri)
    }

    fn report_progress(&mut self, progress: Progress) -> Result<()> {
        match self.progress.as_mut() {
            Some(hook) => hook(&progress).map_err(ValidatorError::Aborted),
            None => Ok(()),
        }
    }
}

// =============================================================================
// Validator
// =============================================================================

pub struct ShapeValidator<'a> {
    shapes: &'a ShapeSet,
    constraints: ConstraintEvaluator<'a>,
}

impl<'a> ShapeValidator<'a> {
    pub fn new(shapes: &'a ShapeSet, engine: &'a dyn QueryEngine) -> Self {
        Self {
            shapes,
            constraints: ConstraintEvaluator::new(engine),
        }
    }

    /// Validates every root in order. The progress hook runs before each.
    pub fn validate_all(
        &self,
        subjects: &[ParsedSubject],
        ctx: &mut RunContext<'_>,
    ) -> Result<Vec<ValidatedSubject>> {
        let pass = Pass::new(self, subjects);
        let total = subjects.len();
        let mut validated = Vec::with_capacity(total);
        for (index, subject) in subjects.iter().enumerate() {
            ctx.report_progress(Progress {
                validated: index,
                total,
                uri: subject.uri(),
            })?;
            validated.extend(pass.resolve(subject, ctx).unwrap_or_default());
        }
        Ok(validated)
    }

    /// Validated entries for `subject`, from the cache when it was seen before.
    pub fn validate(&self, subject: &ParsedSubject, ctx: &mut RunContext<'_>) -> Vec<ValidatedSubject> {
        Pass::new(self, std::slice::from_ref(subject))
            .resolve(subject, ctx)
            .unwrap_or_default()
    }
}

/// One walk over a parsed forest.
///
/// The parser expands a subject's edges only the first time it meets the
/// subject; later copies hold plain references. `expanded` maps every URI to
/// that first copy and validation always starts from it, so a verdict does
/// not depend on which copy the walk happens to reach first.
struct Pass<'v, 's> {
    validator: &'v ShapeValidator<'v>,
    expanded: HashMap<String, &'s ParsedSubject>,
}

impl<'v, 's> Pass<'v, 's> {
    fn new(validator: &'v ShapeValidator<'v>, roots: &'s [ParsedSubject]) -> Self {
        let mut expanded: HashMap<String, &'s ParsedSubject> = HashMap::new();
        // Pre-order, matching the order in which the parser met each subject.
        let mut stack: Vec<&'s ParsedSubject> = roots.iter().rev().collect();
        while let Some(subject) = stack.pop() {
            let uri = subject.uri();
            if expanded.contains_key(&uri) {
                continue;
            }
            expanded.insert(uri, subject);
            stack.extend(
                subject
                    .properties
                    .iter()
                    .rev()
                    .filter_map(|property| match &property.value {
                        ParsedValue::Subject(nested) => Some(nested.as_ref()),
                        ParsedValue::Literal(_) | ParsedValue::Reference(_) => None,
                    }),
            );
        }
        Self { validator, expanded }
    }

    /// `None` while the subject is still being validated further up the stack.
    fn resolve(&self, subject: &ParsedSubject, ctx: &mut RunContext<'_>) -> Option<Vec<ValidatedSubject>> {
        let uri = subject.uri();
        if let Some(verdict) = ctx.cache.get(&uri) {
            trace!(%uri, "validation cache hit");
            return Some(verdict.subjects().to_vec());
        }
        if !ctx.in_progress.insert(uri.clone()) {
            trace!(%uri, "cyclic reference, keeping identifier");
            return None;
        }

        let subject: &ParsedSubject = match self.expanded.get(&uri) {
            Some(first) => *first,
            None => subject,
        };
        ctx.validations += 1;
        let verdict = self.verdict(subject, ctx);
        ctx.in_progress.remove(&uri);

        let subjects = verdict.subjects().to_vec();
        ctx.cache.insert(uri, verdict);
        Some(subjects)
    }

    fn verdict(&self, subject: &ParsedSubject, ctx: &mut RunContext<'_>) -> Verdict {
        let shapes: Vec<&NodeShape> = self.validator.shapes.shapes_for(&subject.class).collect();
        if shapes.is_empty() {
            return Verdict::Unshaped(self.processed(subject, ctx));
        }
        Verdict::Shaped(
            shapes
                .into_iter()
                .map(|shape| self.validate_against(subject, shape, ctx))
                .collect(),
        )
    }

    fn validate_against(
        &self,
        subject: &ParsedSubject,
        shape: &NodeShape,
        ctx: &mut RunContext<'_>,
    ) -> ValidatedSubject {
        let properties: Vec<ValidatedProperty> = shape
            .properties
            .iter()
            .map(|property| self.validate_property(subject, property, ctx))
            .collect();

        let constraint_results: Vec<ConstraintResult> = shape
            .constraints
            .iter()
            .flat_map(|constraint| {
                self.validator
                    .constraints
                    .evaluate(&subject.node, constraint, None)
            })
            .collect();
        if let Some(tier) = shape.maturity_tier {
            ctx.tally.record_failed_constraints(tier, &constraint_results);
        }

        let valid_count = properties.iter().filter(|property| property.valid).count();
        debug!(
            uri = %subject.node,
            shape = %shape.id,
            valid = valid_count,
            total = properties.len(),
            "validated subject"
        );

        ValidatedSubject {
            uri: subject.uri(),
            class: subject.class.clone(),
            class_name: short_name(&subject.class),
            used_shape: Some(shape.id.clone()),
            shape_name: Some(shape.name.clone()),
            total_count: properties.len(),
            valid_count: Some(valid_count),
            properties: SubjectProperties::Validated(properties),
            constraint_results,
        }
    }

    fn validate_property(
        &self,
        subject: &ParsedSubject,
        property: &PropertyShape,
        ctx: &mut RunContext<'_>,
    ) -> ValidatedProperty {
        let values: Vec<&ParsedValue> = subject.values_for(&property.path).collect();
        let actual_count = count_values(&property.path, &values);

        let within_bounds = actual_count >= property.min_count as usize
            && property
                .max_count
                .is_none_or(|max| actual_count <= max as usize);
        let type_ok = property
            .target_class
            .as_deref()
            .is_none_or(|class| values_match_class(class, &values));
        let has_blank_text = values
            .iter()
            .any(|value| matches!(value, ParsedValue::Literal(text) if text.trim().is_empty()));

        let constraint_results: Vec<ConstraintResult> = property
            .constraints
            .iter()
            .flat_map(|constraint| {
                self.validator.constraints.evaluate(
                    &subject.node,
                    constraint,
                    Some(property.path.as_str()),
                )
            })
            .collect();

        let valid = within_bounds && type_ok && !has_blank_text && constraint_results.is_empty();
        let value = self.resolve_values(&values, ctx);

        let validated = ValidatedProperty {
            name: property.name.clone(),
            description: property.description.clone(),
            path: property.path.clone(),
            target_class: property.target_class.clone(),
            min_count: property.min_count,
            max_count: property.max_count,
            actual_count,
            value,
            valid,
            maturity_tier: property.maturity_tier,
            constraint_results,
        };

        if !valid {
            trace!(
                uri = %subject.node,
                path = %property.path,
                actual_count,
                within_bounds,
                type_ok,
                "invalid property"
            );
            if let Some(tier) = property.maturity_tier {
                ctx.tally.record_invalid(tier, validated.clone());
            }
        }
        validated
    }

    /// Reports every property of a subject no shape targets, grouped by path.
    fn processed(&self, subject: &ParsedSubject, ctx: &mut RunContext<'_>) -> ValidatedSubject {
        let mut by_path: IndexMap<&str, Vec<&ParsedValue>> = IndexMap::new();
        for property in &subject.properties {
            by_path
                .entry(property.path.as_str())
                .or_default()
                .push(&property.value);
        }

        let properties: Vec<ProcessedProperty> = by_path
            .into_iter()
            .map(|(path, values)| ProcessedProperty {
                name: short_name(path),
                path: path.to_string(),
                actual_count: values.len(),
                value: self.resolve_values(&values, ctx),
            })
            .collect();

        ValidatedSubject {
            uri: subject.uri(),
            class: subject.class.clone(),
            class_name: short_name(&subject.class),
            used_shape: None,
            shape_name: None,
            total_count: properties.len(),
            valid_count: None,
            properties: SubjectProperties::Processed(properties),
            constraint_results: Vec::new(),
        }
    }

    /// Nested subjects are validated through the cache; each of their
    /// shaped entries becomes one value.
    fn resolve_values(&self, values: &[&ParsedValue], ctx: &mut RunContext<'_>) -> Vec<PropertyValue> {
        let mut resolved = Vec::with_capacity(values.len());
        for value in values {
            match value {
                ParsedValue::Literal(text) | ParsedValue::Reference(text) => {
                    resolved.push(PropertyValue::Text(text.clone()))
                }
                ParsedValue::Subject(nested) => match self.resolve(nested, ctx) {
                    Some(subjects) => resolved.extend(subjects.into_iter().map(PropertyValue::Subject)),
                    None => resolved.push(PropertyValue::Text(nested.uri())),
                },
            }
        }
        resolved
    }
}

/// Occurrences, or distinct targets for relations that restate the same body.
fn count_values(path: &str, values: &[&ParsedValue]) -> usize {
    if is_distinct_target_relation(path) {
        values
            .iter()
            .map(|value| value.identity())
            .collect::<HashSet<_>>()
            .len()
    } else {
        values.len()
    }
}

fn values_match_class(class: &str, values: &[&ParsedValue]) -> bool {
    // A location is judged by cardinality alone.
    if class == PROV_LOCATION {
        return true;
    }
    let all_external = !values.is_empty()
        && values
            .iter()
            .all(|value| value.text().is_some_and(|text| URI_SCHEME.is_match(text)));
    if all_external {
        return true;
    }
    values.iter().all(|value| match value {
        ParsedValue::Subject(nested) => {
            nested.class == class || (class == FUNCTIONARIS && nested.class == MANDATARIS)
        }
        ParsedValue::Literal(_) | ParsedValue::Reference(_) => false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::maturity::MaturityTier;
    use crate::model::{Node, ParsedProperty};
    use crate::store::Row;

    const PERSON: &str = "http://xmlns.com/foaf/0.1/Person";
    const NAME: &str = "http://xmlns.com/foaf/0.1/name";

    struct NoQueries;

    impl QueryEngine for NoQueries {
        fn select(&self, _query: &str) -> Result<Vec<Row>> {
            Ok(Vec::new())
        }
    }

    fn subject(uri: &str, class: &str, properties: Vec<(&str, ParsedValue)>) -> ParsedSubject {
        ParsedSubject {
            node: Node::iri(uri),
            class: class.to_string(),
            properties: properties
                .into_iter()
                .map(|(path, value)| ParsedProperty {
                    path: path.to_string(),
                    value,
                })
                .collect(),
        }
    }

    fn literal(text: &str) -> ParsedValue {
        ParsedValue::Literal(text.to_string())
    }

    fn property(path: &str, min_count: u32, max_count: Option<u32>) -> PropertyShape {
        PropertyShape {
            name: short_name(path),
            description: None,
            path: path.to_string(),
            target_class: None,
            min_count,
            max_count,
            maturity_tier: None,
            constraints: Vec::new(),
        }
    }

    fn shape(id: &str, class: &str, properties: Vec<PropertyShape>) -> NodeShape {
        NodeShape {
            id: id.to_string(),
            target_class: class.to_string(),
            name: short_name(id),
            maturity_tier: None,
            properties,
            constraints: Vec::new(),
        }
    }

    fn validate_one(shapes: &ShapeSet, subject: &ParsedSubject) -> Vec<ValidatedSubject> {
        let engine = NoQueries;
        let validator = ShapeValidator::new(shapes, &engine);
        validator.validate(subject, &mut RunContext::new())
    }

    #[test]
    fn exactly_one_name_is_the_only_valid_count() {
        let shapes = ShapeSet::new(vec![shape(
            "http://example.org/PersonShape",
            PERSON,
            vec![property(NAME, 1, Some(1))],
        )]);
        let cases = [
            (vec![], false),
            (vec![(NAME, literal("Ann"))], true),
            (vec![(NAME, literal("Ann")), (NAME, literal("Anna"))], false),
        ];
        for (properties, expected) in cases {
            let count = properties.len();
            let subject = subject("http://example.org/p", PERSON, properties);
            let validated = validate_one(&shapes, &subject);
            let name = &validated[0].validated_properties()[0];
            assert_eq!(name.actual_count, count);
            assert_eq!(name.valid, expected, "{count} occurrences");
        }
    }

    #[test]
    fn whitespace_text_is_invalid() {
        let shapes = ShapeSet::new(vec![shape(
            "http://example.org/PersonShape",
            PERSON,
            vec![property(NAME, 1, None)],
        )]);
        let subject = subject("http://example.org/p", PERSON, vec![(NAME, literal("   "))]);
        let validated = validate_one(&shapes, &subject);
        assert!(!validated[0].validated_properties()[0].valid);
        assert_eq!(validated[0].valid_count, Some(0));
    }

    #[test]
    fn unshaped_subject_is_processed() {
        let subject = subject(
            "http://example.org/p",
            PERSON,
            vec![(NAME, literal("Ann")), (NAME, literal("Anna"))],
        );
        let validated = validate_one(&ShapeSet::default(), &subject);
        assert_eq!(validated.len(), 1);
        assert!(!validated[0].is_shaped());
        assert_eq!(validated[0].valid_count, None);
        let SubjectProperties::Processed(properties) = &validated[0].properties else {
            panic!("expected processed properties");
        };
        assert_eq!(properties.len(), 1);
        assert_eq!(properties[0].name, "name");
        assert_eq!(properties[0].actual_count, 2);
    }

    #[test]
    fn held_by_counts_distinct_targets() {
        let held_by = crate::vocab::IS_GEHOUDEN_DOOR;
        let organ = || ParsedValue::Reference("http://example.org/organ/1".to_string());
        let zitting = "http://data.vlaanderen.be/ns/besluit#Zitting";
        let shapes = ShapeSet::new(vec![shape(
            "http://example.org/ZittingShape",
            zitting,
            vec![property(held_by, 1, Some(1))],
        )]);
        let subject = subject(
            "http://example.org/zitting",
            zitting,
            vec![(held_by, organ()), (held_by, organ())],
        );
        let validated = validate_one(&shapes, &subject);
        let property = &validated[0].validated_properties()[0];
        assert_eq!(property.actual_count, 1);
        assert!(property.valid);
    }

    #[test]
    fn target_class_exceptions() {
        let nested = |class: &str| {
            ParsedValue::Subject(Box::new(subject("http://example.org/x", class, vec![])))
        };
        let external = ParsedValue::Reference("https://data.example.org/id/1".to_string());

        assert!(values_match_class(PERSON, &[&nested(PERSON)]));
        assert!(!values_match_class(PERSON, &[&nested("http://example.org/Other")]));
        assert!(values_match_class(FUNCTIONARIS, &[&nested(MANDATARIS)]));
        assert!(values_match_class(PROV_LOCATION, &[&nested("http://example.org/Other")]));
        assert!(values_match_class(PERSON, &[&external]));
        assert!(!values_match_class(PERSON, &[&external, &nested("http://example.org/Other")]));
        assert!(!values_match_class(PERSON, &[&literal("just text")]));
    }

    #[test]
    fn nested_verdict_ignores_shape_property_order() {
        use crate::model::Fact;
        use crate::parse::parse;
        use crate::store::FactSet;
        use crate::vocab::RDF_TYPE;

        let ex = |local: &str| format!("http://example.org/{local}");
        let link = |from: &str, predicate: &str, to: &str| {
            Fact::new(Node::iri(ex(from)), ex(predicate), Node::iri(ex(to)))
        };
        let typed = |uri: &str, class: &str| Fact::new(Node::iri(ex(uri)), RDF_TYPE, Node::iri(ex(class)));
        // r reaches y twice: through x first, then directly.
        let facts = FactSet::from_facts(vec![
            typed("r", "Root"),
            link("r", "p1", "x"),
            link("r", "p2", "y"),
            typed("x", "Middle"),
            link("x", "q", "y"),
            typed("y", "Leaf"),
            link("y", "link", "z"),
            typed("z", "Wrong"),
        ]);
        let parsed = parse(&facts);

        let mut leaf_link = property(&ex("link"), 0, None);
        leaf_link.target_class = Some(ex("Right"));
        let verdicts: Vec<bool> = [["p1", "p2"], ["p2", "p1"]]
            .into_iter()
            .map(|order| {
                let shapes = ShapeSet::new(vec![
                    shape(
                        &ex("RootShape"),
                        &ex("Root"),
                        order.into_iter().map(|path| property(&ex(path), 0, None)).collect(),
                    ),
                    shape(&ex("LeafShape"), &ex("Leaf"), vec![leaf_link.clone()]),
                ]);
                let engine = NoQueries;
                let validator = ShapeValidator::new(&shapes, &engine);
                let validated = validator
                    .validate_all(&parsed, &mut RunContext::new())
                    .expect("validation");
                let leaf = validated
                    .iter()
                    .find(|subject| subject.uri == ex("y"))
                    .expect("leaf entry");
                leaf.validated_properties()[0].valid
            })
            .collect();

        assert_eq!(verdicts, vec![false, false]);
    }

    #[test]
    fn invalid_tiered_property_lowers_the_ceiling() {
        let mut name = property(NAME, 1, None);
        name.maturity_tier = Some(MaturityTier::Niveau1);
        let shapes = ShapeSet::new(vec![shape("http://example.org/S", PERSON, vec![name])]);
        let engine = NoQueries;
        let validator = ShapeValidator::new(&shapes, &engine);
        let mut ctx = RunContext::new();

        let broken = subject("http://example.org/p1", PERSON, vec![]);
        let fine = subject("http://example.org/p2", PERSON, vec![(NAME, literal("Ann"))]);
        validator
            .validate_all(&[broken, fine], &mut ctx)
            .expect("validation");

        assert_eq!(ctx.tally().ceiling(), MaturityTier::Niveau0);
        assert_eq!(ctx.tally().invalid_at(MaturityTier::Niveau1).len(), 1);
    }

    #[test]
    fn progress_hook_can_abort() {
        let shapes = ShapeSet::default();
        let engine = NoQueries;
        let validator = ShapeValidator::new(&shapes, &engine);
        let mut seen = 0;
        let mut ctx = RunContext::new().with_progress(Box::new(|progress: &Progress| -> anyhow::Result<()> {
            seen += 1;
            anyhow::ensure!(progress.validated < 1, "stop after first subject");
            Ok(())
        }));
        let subjects = vec![
            subject("http://example.org/a", PERSON, vec![]),
            subject("http://example.org/b", PERSON, vec![]),
        ];
        let error = validator.validate_all(&subjects, &mut ctx).unwrap_err();
        assert!(matches!(error, ValidatorError::Aborted(_)));
        drop(ctx);
        assert_eq!(seen, 2);
    }
}
