//! The handful of IRIs the engine gives special meaning to.

pub const RDF_TYPE: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#type";

// Shape vocabulary
pub const SH_NODE_SHAPE: &str = "http://www.w3.org/ns/shacl#NodeShape";
pub const SH_TARGET_CLASS: &str = "http://www.w3.org/ns/shacl#targetClass";
pub const SH_PROPERTY: &str = "http://www.w3.org/ns/shacl#property";
pub const SH_PATH: &str = "http://www.w3.org/ns/shacl#path";
pub const SH_NAME: &str = "http://www.w3.org/ns/shacl#name";
pub const SH_DESCRIPTION: &str = "http://www.w3.org/ns/shacl#description";
pub const SH_CLASS: &str = "http://www.w3.org/ns/shacl#class";
pub const SH_MIN_COUNT: &str = "http://www.w3.org/ns/shacl#minCount";
pub const SH_MAX_COUNT: &str = "http://www.w3.org/ns/shacl#maxCount";
pub const SH_SPARQL: &str = "http://www.w3.org/ns/shacl#sparql";
pub const SH_SELECT: &str = "http://www.w3.org/ns/shacl#select";
pub const SH_MESSAGE: &str = "http://www.w3.org/ns/shacl#message";
pub const MATURITY_LEVEL: &str = "http://lblod.data.gift/vocabularies/besluit/maturiteitsniveau";

/// Sentinel class for publication documents.
pub const FOAF_DOCUMENT: &str = "http://xmlns.com/foaf/0.1/Document";

pub const DOCUMENT_TYPE_PREFIX: &str = "https://data.vlaanderen.be/id/concept/BesluitDocumentType/";
pub const DOCUMENT_TYPE_NOTULEN: &str =
    "https://data.vlaanderen.be/id/concept/BesluitDocumentType/8e791b27-7600-4577-b24e-c7c29e0eb773";
pub const DOCUMENT_TYPE_BESLUITENLIJST: &str =
    "https://data.vlaanderen.be/id/concept/BesluitDocumentType/3fa67785-ffdc-4b30-8880-2b99d97b4dee";
pub const DOCUMENT_TYPE_AGENDA: &str =
    "https://data.vlaanderen.be/id/concept/BesluitDocumentType/13fefad6-a9d6-4025-83b5-e4cbee3a8965";

// Classes with relaxed type checks
pub const PROV_LOCATION: &str = "http://www.w3.org/ns/prov#Location";
pub const FUNCTIONARIS: &str = "http://data.lblod.info/vocabularies/leidinggevenden/Functionaris";
pub const MANDATARIS: &str = "http://data.vlaanderen.be/ns/mandaat#Mandataris";

pub const BESTUURSEENHEID: &str = "http://data.vlaanderen.be/ns/besluit#Bestuurseenheid";
pub const BESTUURSORGAAN: &str = "http://data.vlaanderen.be/ns/besluit#Bestuursorgaan";

// Relations counted by distinct target rather than by occurrence
pub const IS_GEHOUDEN_DOOR: &str = "http://data.vlaanderen.be/ns/besluit#isGehoudenDoor";
pub const IS_TIJDSPECIALISATIE_VAN: &str = "http://data.vlaanderen.be/ns/mandaat#isTijdspecialisatieVan";

// Vote tallies that are legitimately absent
pub const AANTAL_TEGENSTANDERS: &str = "http://data.vlaanderen.be/ns/besluit#aantalTegenstanders";
pub const AANTAL_ONTHOUDERS: &str = "http://data.vlaanderen.be/ns/besluit#aantalOnthouders";

/// Placeholder for the focus node inside an embedded constraint query.
pub const THIS_PLACEHOLDER: &str = "$this";
/// Placeholder for the property path inside a property-level constraint query.
pub const PATH_PLACEHOLDER: &str = "$PATH";

pub fn is_distinct_target_relation(path: &str) -> bool {
    path == IS_GEHOUDEN_DOOR || path == IS_TIJDSPECIALISATIE_VAN
}

/// Readable name for an IRI: the shorter of the fragment after the last `#`
/// and the segment after the last `/`.
pub fn short_name(uri: &str) -> String {
    let after_hash = uri.rsplit('#').next().unwrap_or(uri);
    let after_slash = uri.rsplit('/').next().unwrap_or(uri);
    let name = if after_hash.len() < after_slash.len() {
        after_hash
    } else {
        after_slash
    };
    if name.is_empty() {
        uri.to_string()
    } else {
        name.to_string()
    }
}
