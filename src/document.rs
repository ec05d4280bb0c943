//! Document-type sniffing for publications.

use crate::store::FactSet;
use crate::vocab::{
    DOCUMENT_TYPE_AGENDA, DOCUMENT_TYPE_BESLUITENLIJST, DOCUMENT_TYPE_NOTULEN, DOCUMENT_TYPE_PREFIX,
    RDF_TYPE,
};
use serde::Serialize;
use strum::{Display, EnumString};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Display, EnumString)]
pub enum DocumentType {
    Notulen,
    Besluitenlijst,
    Agenda,
    #[strum(serialize = "unknown document type")]
    #[serde(rename = "unknown document type")]
    Unknown,
}

impl DocumentType {
    pub fn from_type_iri(iri: &str) -> Option<Self> {
        match iri {
            DOCUMENT_TYPE_NOTULEN => Some(DocumentType::Notulen),
            DOCUMENT_TYPE_BESLUITENLIJST => Some(DocumentType::Besluitenlijst),
            DOCUMENT_TYPE_AGENDA => Some(DocumentType::Agenda),
            _ => None,
        }
    }
}

/// First recognized decision-document type tag in the facts.
pub fn determine_document_type(facts: &FactSet) -> DocumentType {
    facts
        .iter()
        .filter(|fact| fact.predicate == RDF_TYPE)
        .filter_map(|fact| fact.object.as_iri())
        .filter(|iri| iri.starts_with(DOCUMENT_TYPE_PREFIX))
        .find_map(DocumentType::from_type_iri)
        .unwrap_or(DocumentType::Unknown)
}
