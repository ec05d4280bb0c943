//! Reading RDF text into facts.

use crate::error::{Result, ValidatorError};
use crate::model::Fact;
use crate::store::node_from_term;
use oxigraph::io::{RdfFormat, RdfParser};
use oxigraph::model::Term;
use std::path::Path;

/// Resolves a format from a media type such as `text/turtle; charset=utf-8`.
pub fn format_from_media_type(media_type: &str) -> Option<RdfFormat> {
    let essence = media_type.split(';').next().unwrap_or(media_type).trim();
    RdfFormat::from_media_type(essence)
}

pub fn format_from_path(path: &Path) -> Result<RdfFormat> {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .ok_or_else(|| ValidatorError::UnsupportedFormat(path.display().to_string()))?;
    RdfFormat::from_extension(extension)
        .ok_or_else(|| ValidatorError::UnsupportedFormat(extension.to_string()))
}

/// Parses facts in document order. Quads in named graphs are flattened.
pub fn facts_from_slice(content: &[u8], format: RdfFormat, base_iri: Option<&str>) -> Result<Vec<Fact>> {
    let mut parser = RdfParser::from_format(format);
    if let Some(base) = base_iri {
        parser = parser
            .with_base_iri(base)
            .map_err(|e| ValidatorError::InvalidIri {
                iri: base.to_string(),
                reason: e.to_string(),
            })?;
    }

    let mut facts = Vec::new();
    for quad in parser.for_reader(content) {
        let quad = quad.map_err(|e| ValidatorError::parse(format.name(), e))?;
        let subject = Term::from(quad.subject);
        let (Some(subject), Some(object)) = (node_from_term(&subject), node_from_term(&quad.object))
        else {
            continue;
        };
        facts.push(Fact::new(subject, quad.predicate.as_str(), object));
    }
    Ok(facts)
}

pub fn facts_from_str(content: &str, format: RdfFormat) -> Result<Vec<Fact>> {
    facts_from_slice(content.as_bytes(), format, None)
}

pub fn read_facts(path: &Path) -> Result<Vec<Fact>> {
    let format = format_from_path(path)?;
    let content = std::fs::read(path)?;
    facts_from_slice(&content, format, None)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Node;
    use crate::vocab::RDF_TYPE;

    #[test]
    fn turtle_is_read_in_document_order() {
        let facts = facts_from_str(
            r#"
            @prefix foaf: <http://xmlns.com/foaf/0.1/> .
            <http://example.org/p1> a foaf:Person, foaf:Agent ;
                foaf:name "Ann" .
            "#,
            RdfFormat::Turtle,
        )
        .expect("parse");

        assert_eq!(facts.len(), 3);
        assert_eq!(facts[0].predicate, RDF_TYPE);
        assert_eq!(facts[0].object, Node::iri("http://xmlns.com/foaf/0.1/Person"));
        assert_eq!(facts[2].object, Node::literal("Ann"));
    }

    #[test]
    fn media_type_parameters_are_ignored() {
        assert_eq!(
            format_from_media_type("text/turtle; charset=utf-8"),
            Some(RdfFormat::Turtle)
        );
        assert_eq!(format_from_media_type("text/html"), None);
    }

    #[test]
    fn broken_turtle_is_a_parse_error() {
        let error = facts_from_str("<http://example.org/a> <b", RdfFormat::Turtle).unwrap_err();
        assert!(matches!(error, ValidatorError::Parse { .. }));
    }
}
