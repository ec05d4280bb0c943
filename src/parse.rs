//! Turns a flat fact set into a forest of typed subjects.
//!
//! Each distinct typed subject becomes one root. Objects that are themselves
//! typed subjects are nested, but a given (subject, predicate) edge is
//! expanded only once per pass; later encounters degrade to a plain
//! reference. That edge set is what bounds the recursion on cyclic graphs.

use crate::model::{Node, ParsedProperty, ParsedSubject, ParsedValue};
use crate::store::FactSet;
use crate::vocab::{FOAF_DOCUMENT, RDF_TYPE};
use std::collections::{HashMap, HashSet};
use tracing::trace;

pub struct GraphParser<'a> {
    facts: &'a FactSet,
    expanded: HashMap<Node, HashSet<&'a str>>,
}

impl<'a> GraphParser<'a> {
    pub fn new(facts: &'a FactSet) -> Self {
        Self {
            facts,
            expanded: HashMap::new(),
        }
    }

    /// Parses every typed subject. Untyped subjects are dropped.
    pub fn parse_all(&mut self) -> Vec<ParsedSubject> {
        let facts = self.facts;
        facts
            .subjects()
            .filter_map(|subject| self.parse_subject(subject))
            .collect()
    }

    pub fn parse_subject(&mut self, subject: &Node) -> Option<ParsedSubject> {
        let facts = self.facts;
        let types: Vec<&str> = facts.types_of(subject).collect();
        let first_type = *types.first()?;
        let is_document = types.contains(&FOAF_DOCUMENT);
        let class = if is_document { FOAF_DOCUMENT } else { first_type };

        // Claim all of this subject's edges before recursing, so that a cycle
        // back into it finds them taken.
        let claimed: HashSet<&'a str> = {
            let expanded = self.expanded.entry(subject.clone()).or_default();
            facts
                .facts_for(subject)
                .map(|fact| fact.predicate.as_str())
                .filter(|predicate| *predicate != RDF_TYPE)
                .filter(|predicate| expanded.insert(*predicate))
                .collect()
        };

        let mut properties = Vec::new();
        for fact in facts.facts_for(subject) {
            if fact.predicate == RDF_TYPE {
                if is_document {
                    properties.push(ParsedProperty {
                        path: fact.predicate.clone(),
                        value: ParsedValue::Reference(fact.object.key()),
                    });
                }
                continue;
            }

            let value = match &fact.object {
                Node::Literal { value, .. } => ParsedValue::Literal(value.clone()),
                object if claimed.contains(fact.predicate.as_str()) => {
                    match self.parse_subject(object) {
                        Some(nested) => ParsedValue::Subject(Box::new(nested)),
                        None => ParsedValue::Reference(object.key()),
                    }
                }
                object => {
                    trace!(
                        subject = %subject,
                        predicate = %fact.predicate,
                        "edge already expanded, keeping reference"
                    );
                    ParsedValue::Reference(object.key())
                }
            };
            properties.push(ParsedProperty {
                path: fact.predicate.clone(),
                value,
            });
        }

        Some(ParsedSubject {
            node: subject.clone(),
            class: class.to_string(),
            properties,
        })
    }
}

/// Parses a fact set into one entry per distinct typed subject.
pub fn parse(facts: &FactSet) -> Vec<ParsedSubject> {
    GraphParser::new(facts).parse_all()
}
