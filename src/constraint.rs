//! Embedded SELECT constraints.
//!
//! A constraint query lists violations: every row it returns is one failure.

use crate::model::{ConstraintResult, Node};
use crate::shapes::SparqlConstraint;
use crate::store::{QueryEngine, Row};
use crate::vocab::{PATH_PLACEHOLDER, THIS_PLACEHOLDER};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use tracing::{debug, warn};

pub const BLANK_NODE_MESSAGE: &str = "blank nodes are not supported here";

/// `{?var}` or `{$var}` inside a constraint message.
static MESSAGE_VARIABLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{[?$]([A-Za-z_][A-Za-z0-9_]*)\}").expect("static regex"));

pub struct ConstraintEvaluator<'a> {
    engine: &'a dyn QueryEngine,
}

impl<'a> ConstraintEvaluator<'a> {
    pub fn new(engine: &'a dyn QueryEngine) -> Self {
        Self { engine }
    }

    /// Runs one constraint against `focus`. `path` is set for constraints
    /// declared on a property shape.
    pub fn evaluate(
        &self,
        focus: &Node,
        constraint: &SparqlConstraint,
        path: Option<&str>,
    ) -> Vec<ConstraintResult> {
        let Some((select, message)) = constraint.parts() else {
            debug!(focus = %focus, "constraint without select or message is inert");
            return Vec::new();
        };

        let Some(focus_iri) = focus.as_iri() else {
            return vec![ConstraintResult {
                focus_node: focus.key(),
                result_path: path.map(str::to_string),
                value: None,
                message: BLANK_NODE_MESSAGE.to_string(),
            }];
        };

        let query = rewrite(select, focus_iri, path);
        let rows = match self.engine.select(&query) {
            Ok(rows) => rows,
            Err(error) => {
                warn!(focus = focus_iri, %error, "constraint query failed, ignoring");
                return Vec::new();
            }
        };

        rows.iter()
            .map(|row| ConstraintResult {
                focus_node: row
                    .get("this")
                    .map(Node::key)
                    .unwrap_or_else(|| focus_iri.to_string()),
                result_path: row
                    .get("path")
                    .map(Node::key)
                    .or_else(|| path.map(str::to_string)),
                value: row.get("value").map(Node::key),
                message: render_message(message, row),
            })
            .collect()
    }
}

fn rewrite(select: &str, focus: &str, path: Option<&str>) -> String {
    let query = select.replace(THIS_PLACEHOLDER, &format!("<{focus}>"));
    match path {
        Some(path) => query.replace(PATH_PLACEHOLDER, &format!("<{path}>")),
        None => query,
    }
}

/// Substitutes row bindings into the message. Unbound variables stay as written.
fn render_message(message: &str, row: &Row) -> String {
    MESSAGE_VARIABLE
        .replace_all(message, |caps: &Captures<'_>| match row.get(&caps[1]) {
            Some(node) => node.value().to_string(),
            None => caps[0].to_string(),
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Result, ValidatorError};
    use crate::rdf::facts_from_str;
    use crate::store::{FactSet, OxigraphEngine};
    use oxigraph::io::RdfFormat;
    use std::cell::Cell;

    const FACTS: &str = r#"
        @prefix ex: <http://example.org/> .
        ex:zitting ex:duur 0 ; ex:titel "zitting" .
        ex:ok ex:duur 90 .
    "#;

    fn engine() -> OxigraphEngine {
        let facts = facts_from_str(FACTS, RdfFormat::Turtle).expect("turtle");
        OxigraphEngine::from_facts(&FactSet::from_facts(facts)).expect("store")
    }

    fn constraint(select: &str, message: &str) -> SparqlConstraint {
        SparqlConstraint {
            select: Some(select.to_string()),
            message: Some(message.to_string()),
        }
    }

    const ZERO_DURATION: &str =
        "SELECT ?value WHERE { $this <http://example.org/duur> ?value . FILTER(?value <= 0) }";

    #[test]
    fn rows_become_results() {
        let engine = engine();
        let evaluator = ConstraintEvaluator::new(&engine);
        let results = evaluator.evaluate(
            &Node::iri("http://example.org/zitting"),
            &constraint(ZERO_DURATION, "duur moet positief zijn, kreeg {?value}"),
            None,
        );
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].focus_node, "http://example.org/zitting");
        assert_eq!(results[0].value.as_deref(), Some("0"));
        assert_eq!(results[0].message, "duur moet positief zijn, kreeg 0");

        let clean = evaluator.evaluate(
            &Node::iri("http://example.org/ok"),
            &constraint(ZERO_DURATION, "duur moet positief zijn"),
            None,
        );
        assert!(clean.is_empty());
    }

    #[test]
    fn path_placeholder_is_substituted() {
        let engine = engine();
        let evaluator = ConstraintEvaluator::new(&engine);
        let results = evaluator.evaluate(
            &Node::iri("http://example.org/zitting"),
            &constraint(
                "SELECT ?value WHERE { $this $PATH ?value }",
                "waarde {$value} op {?missing}",
            ),
            Some("http://example.org/titel"),
        );
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].result_path.as_deref(), Some("http://example.org/titel"));
        assert_eq!(results[0].message, "waarde zitting op {?missing}");
    }

    #[test]
    fn malformed_query_yields_nothing() {
        let engine = engine();
        let evaluator = ConstraintEvaluator::new(&engine);
        let results = evaluator.evaluate(
            &Node::iri("http://example.org/zitting"),
            &constraint("SELECT WHERE {", "never"),
            None,
        );
        assert!(results.is_empty());
    }

    struct CountingEngine {
        calls: Cell<usize>,
    }

    impl QueryEngine for CountingEngine {
        fn select(&self, _query: &str) -> Result<Vec<Row>> {
            self.calls.set(self.calls.get() + 1);
            Err(ValidatorError::Store("unreachable".to_string()))
        }
    }

    #[test]
    fn blank_focus_is_reported_without_querying() {
        let engine = CountingEngine { calls: Cell::new(0) };
        let evaluator = ConstraintEvaluator::new(&engine);
        let results = evaluator.evaluate(
            &Node::blank("b0"),
            &constraint(ZERO_DURATION, "ignored"),
            Some("http://example.org/duur"),
        );
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].focus_node, "_:b0");
        assert_eq!(results[0].message, BLANK_NODE_MESSAGE);
        assert_eq!(engine.calls.get(), 0);
    }

    #[test]
    fn incomplete_constraint_is_inert() {
        let engine = CountingEngine { calls: Cell::new(0) };
        let evaluator = ConstraintEvaluator::new(&engine);
        let inert = SparqlConstraint {
            select: None,
            message: Some("orphan message".to_string()),
        };
        assert!(evaluator.evaluate(&Node::blank("b0"), &inert, None).is_empty());
        assert_eq!(engine.calls.get(), 0);
    }
}
