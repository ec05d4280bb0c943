//! The working set of facts and the query capability run over it.
//!
//! `FactSet` only ever grows: the crawler appends to it, everything after the
//! crawl reads it. `QueryEngine` is the seam for declarative queries; the
//! default implementation loads the facts into an in-memory oxigraph store.

use crate::error::{Result, ValidatorError};
use crate::model::{Fact, Node};
use crate::vocab::RDF_TYPE;
use indexmap::IndexMap;
use oxigraph::model::{BlankNode, GraphName, Literal, NamedNode, Quad, Term};
use oxigraph::sparql::QueryResults;
use oxigraph::store::Store;
use std::collections::HashSet;
use tracing::{debug, warn};

const XSD_STRING: &str = "http://www.w3.org/2001/XMLSchema#string";
const RDF_LANG_STRING: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#langString";

// =============================================================================
// Fact Set
// =============================================================================

/// Append-only set of facts, deduplicated by exact triple match.
#[derive(Debug, Clone, Default)]
pub struct FactSet {
    facts: Vec<Fact>,
    seen: HashSet<Fact>,
    by_subject: IndexMap<Node, Vec<usize>>,
}

impl FactSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_facts(facts: impl IntoIterator<Item = Fact>) -> Self {
        let mut set = Self::new();
        set.extend(facts);
        set
    }

    /// Adds a fact unless an identical one is already present.
    pub fn insert(&mut self, fact: Fact) -> bool {
        if self.seen.contains(&fact) {
            return false;
        }
        let index = self.facts.len();
        self.by_subject
            .entry(fact.subject.clone())
            .or_default()
            .push(index);
        self.seen.insert(fact.clone());
        self.facts.push(fact);
        true
    }

    /// Merges facts in, returning how many were new.
    pub fn extend(&mut self, facts: impl IntoIterator<Item = Fact>) -> usize {
        facts
            .into_iter()
            .map(|fact| self.insert(fact))
            .filter(|added| *added)
            .count()
    }

    pub fn len(&self) -> usize {
        self.facts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.facts.is_empty()
    }

    pub fn contains(&self, fact: &Fact) -> bool {
        self.seen.contains(fact)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Fact> {
        self.facts.iter()
    }

    /// Distinct subjects in first-seen order.
    pub fn subjects(&self) -> impl Iterator<Item = &Node> {
        self.by_subject.keys()
    }

    pub fn has_subject(&self, subject: &Node) -> bool {
        self.by_subject.contains_key(subject)
    }

    pub fn facts_for<'a>(&'a self, subject: &Node) -> impl Iterator<Item = &'a Fact> + use<'a> {
        self.by_subject
            .get(subject)
            .map(|indices| indices.as_slice())
            .unwrap_or_default()
            .iter()
            .map(|&index| &self.facts[index])
    }

    pub fn objects<'a>(
        &'a self,
        subject: &Node,
        predicate: &'a str,
    ) -> impl Iterator<Item = &'a Node> + use<'a> {
        self.facts_for(subject)
            .filter(move |fact| fact.predicate == predicate)
            .map(|fact| &fact.object)
    }

    /// Declared classes of a subject, in statement order.
    pub fn types_of<'a>(&'a self, subject: &Node) -> impl Iterator<Item = &'a str> + use<'a> {
        self.objects(subject, RDF_TYPE).filter_map(Node::as_iri)
    }

    pub fn instances_of<'a>(&'a self, class: &'a str) -> impl Iterator<Item = &'a Node> + 'a {
        self.facts
            .iter()
            .filter(move |fact| {
                fact.predicate == RDF_TYPE && fact.object.as_iri() == Some(class)
            })
            .map(|fact| &fact.subject)
    }

    pub fn has_instance(&self, class: &str) -> bool {
        self.instances_of(class).next().is_some()
    }

    /// Every IRI mentioned in subject or object position.
    pub fn iris(&self) -> impl Iterator<Item = &str> {
        self.facts.iter().flat_map(|fact| {
            fact.subject
                .as_iri()
                .into_iter()
                .chain(fact.object.as_iri())
        })
    }
}

impl FromIterator<Fact> for FactSet {
    fn from_iter<I: IntoIterator<Item = Fact>>(iter: I) -> Self {
        Self::from_facts(iter)
    }
}

// =============================================================================
// Query Engine
// =============================================================================

/// One solution of a SELECT query: variable name to bound term.
pub type Row = IndexMap<String, Node>;

/// Declarative query capability over a fact set.
pub trait QueryEngine {
    /// Runs a SELECT query. Non-SELECT queries yield no rows.
    fn select(&self, query: &str) -> Result<Vec<Row>>;
}

/// `QueryEngine` over an in-memory oxigraph store.
pub struct OxigraphEngine {
    store: Store,
}

impl OxigraphEngine {
    pub fn from_facts(facts: &FactSet) -> Result<Self> {
        let store = Store::new().map_err(|e| ValidatorError::Store(e.to_string()))?;
        let mut skipped = 0usize;
        for fact in facts.iter() {
            match to_quad(fact) {
                Ok(Some(quad)) => {
                    store
                        .insert(&quad)
                        .map_err(|e| ValidatorError::Store(e.to_string()))?;
                }
                Ok(None) => skipped += 1,
                Err(error) => {
                    debug!(%error, "fact not representable in query store");
                    skipped += 1;
                }
            }
        }
        if skipped > 0 {
            warn!(skipped, "facts left out of the query store");
        }
        Ok(Self { store })
    }
}

impl QueryEngine for OxigraphEngine {
    fn select(&self, query: &str) -> Result<Vec<Row>> {
        let results = self
            .store
            .query(query)
            .map_err(|e| ValidatorError::Store(e.to_string()))?;

        let mut rows = Vec::new();
        if let QueryResults::Solutions(solutions) = results {
            for solution in solutions {
                let solution = solution.map_err(|e| ValidatorError::Store(e.to_string()))?;
                let mut row = Row::new();
                for (variable, term) in solution.iter() {
                    if let Some(node) = node_from_term(term) {
                        row.insert(variable.as_str().to_string(), node);
                    }
                }
                rows.push(row);
            }
        }
        Ok(rows)
    }
}

// =============================================================================
// Term conversion
// =============================================================================

pub(crate) fn node_from_term(term: &Term) -> Option<Node> {
    match term {
        Term::NamedNode(node) => Some(Node::Iri(node.as_str().to_string())),
        Term::BlankNode(node) => Some(Node::Blank(node.as_str().to_string())),
        Term::Literal(literal) => {
            let datatype = literal.datatype().as_str();
            Some(Node::Literal {
                value: literal.value().to_string(),
                datatype: (datatype != XSD_STRING && datatype != RDF_LANG_STRING)
                    .then(|| datatype.to_string()),
                language: literal.language().map(str::to_string),
            })
        }
        #[allow(unreachable_patterns)]
        _ => None,
    }
}

fn named_node(iri: &str) -> Result<NamedNode> {
    NamedNode::new(iri).map_err(|e| ValidatorError::InvalidIri {
        iri: iri.to_string(),
        reason: e.to_string(),
    })
}

fn blank_node(id: &str) -> Result<BlankNode> {
    BlankNode::new(id).map_err(|e| ValidatorError::InvalidIri {
        iri: format!("_:{id}"),
        reason: e.to_string(),
    })
}

fn to_term(node: &Node) -> Result<Term> {
    Ok(match node {
        Node::Iri(iri) => named_node(iri)?.into(),
        Node::Blank(id) => blank_node(id)?.into(),
        Node::Literal {
            value,
            language: Some(language),
            ..
        } => Literal::new_language_tagged_literal(value.as_str(), language.as_str())
            .map_err(|e| ValidatorError::parse("literal", e))?
            .into(),
        Node::Literal {
            value,
            datatype: Some(datatype),
            ..
        } => Literal::new_typed_literal(value.as_str(), named_node(datatype)?).into(),
        Node::Literal { value, .. } => Literal::new_simple_literal(value.as_str()).into(),
    })
}

fn to_quad(fact: &Fact) -> Result<Option<Quad>> {
    let predicate = named_node(&fact.predicate)?;
    let object = to_term(&fact.object)?;
    let quad = match &fact.subject {
        Node::Iri(iri) => Quad::new(named_node(iri)?, predicate, object, GraphName::DefaultGraph),
        Node::Blank(id) => Quad::new(blank_node(id)?, predicate, object, GraphName::DefaultGraph),
        Node::Literal { .. } => return Ok(None),
    };
    Ok(Some(quad))
}
