#![allow(dead_code)]

use oxigraph::io::RdfFormat;
use publication_validator::model::{Fact, Node};
use publication_validator::rdf::{facts_from_str, read_facts};
use std::path::PathBuf;

pub const PREFIXES: &str = r#"
@prefix sh: <http://www.w3.org/ns/shacl#> .
@prefix foaf: <http://xmlns.com/foaf/0.1/> .
@prefix besluit: <http://data.vlaanderen.be/ns/besluit#> .
@prefix mandaat: <http://data.vlaanderen.be/ns/mandaat#> .
@prefix lblodBesluit: <http://lblod.data.gift/vocabularies/besluit/> .
@prefix skos: <http://www.w3.org/2004/02/skos/core#> .
@prefix ex: <http://example.org/> .
"#;

pub const PERSON: &str = "http://xmlns.com/foaf/0.1/Person";
pub const NAME: &str = "http://xmlns.com/foaf/0.1/name";

/// Parses Turtle with the shared prefixes prepended.
pub fn turtle(body: &str) -> Vec<Fact> {
    facts_from_str(&format!("{PREFIXES}\n{body}"), RdfFormat::Turtle).expect("fixture turtle")
}

pub fn fixture_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/lblod")
}

pub fn fixture(name: &str) -> Vec<Fact> {
    read_facts(&fixture_dir().join(name)).expect("fixture file")
}

pub fn link(from: &str, predicate: &str, to: &str) -> Fact {
    Fact::new(Node::iri(from), predicate, Node::iri(to))
}

pub fn typed(uri: &str, class: &str) -> Fact {
    link(uri, publication_validator::vocab::RDF_TYPE, class)
}
