use crate::maturity::{MaturityReport, MaturityTier};
use serde::Serialize;
use std::fmt;

// =============================================================================
// Facts
// =============================================================================

/// A term in subject or object position.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Node {
    Iri(String),
    Blank(String),
    Literal {
        value: String,
        datatype: Option<String>,
        language: Option<String>,
    },
}

impl Node {
    pub fn iri(value: impl Into<String>) -> Self {
        Node::Iri(value.into())
    }

    pub fn blank(id: impl Into<String>) -> Self {
        Node::Blank(id.into())
    }

    pub fn literal(value: impl Into<String>) -> Self {
        Node::Literal {
            value: value.into(),
            datatype: None,
            language: None,
        }
    }

    /// The lexical value: IRI text, blank node label, or literal string.
    pub fn value(&self) -> &str {
        match self {
            Node::Iri(iri) => iri,
            Node::Blank(id) => id,
            Node::Literal { value, .. } => value,
        }
    }

    pub fn as_iri(&self) -> Option<&str> {
        match self {
            Node::Iri(iri) => Some(iri),
            _ => None,
        }
    }

    pub fn is_literal(&self) -> bool {
        matches!(self, Node::Literal { .. })
    }

    pub fn is_blank(&self) -> bool {
        matches!(self, Node::Blank(_))
    }

    /// Identifier used when the node is reported: the IRI, or `_:label`.
    pub fn key(&self) -> String {
        match self {
            Node::Iri(iri) => iri.clone(),
            Node::Blank(id) => format!("_:{id}"),
            Node::Literal { value, .. } => value.clone(),
        }
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Iri(iri) => write!(f, "<{iri}>"),
            Node::Blank(id) => write!(f, "_:{id}"),
            Node::Literal {
                value,
                language: Some(lang),
                ..
            } => write!(f, "{value:?}@{lang}"),
            Node::Literal {
                value,
                datatype: Some(datatype),
                ..
            } => write!(f, "{value:?}^^<{datatype}>"),
            Node::Literal { value, .. } => write!(f, "{value:?}"),
        }
    }
}

/// One subject–predicate–object statement. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fact {
    pub subject: Node,
    pub predicate: String,
    pub object: Node,
}

impl Fact {
    pub fn new(subject: Node, predicate: impl Into<String>, object: Node) -> Self {
        Self {
            subject,
            predicate: predicate.into(),
            object,
        }
    }
}

// =============================================================================
// Parsed forest
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedSubject {
    pub node: Node,
    pub class: String,
    pub properties: Vec<ParsedProperty>,
}

impl ParsedSubject {
    pub fn uri(&self) -> String {
        self.node.key()
    }

    pub fn values_for<'a>(&'a self, path: &'a str) -> impl Iterator<Item = &'a ParsedValue> + 'a {
        self.properties
            .iter()
            .filter(move |property| property.path == path)
            .map(|property| &property.value)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedProperty {
    pub path: String,
    pub value: ParsedValue,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ParsedValue {
    Literal(String),
    /// An IRI or blank node that did not resolve to a typed subject, or an
    /// edge that was already expanded earlier in the pass.
    Reference(String),
    Subject(Box<ParsedSubject>),
}

impl ParsedValue {
    /// Identity used for distinct-target counting.
    pub fn identity(&self) -> String {
        match self {
            ParsedValue::Literal(value) | ParsedValue::Reference(value) => value.clone(),
            ParsedValue::Subject(subject) => subject.uri(),
        }
    }

    pub fn text(&self) -> Option<&str> {
        match self {
            ParsedValue::Literal(value) | ParsedValue::Reference(value) => Some(value),
            ParsedValue::Subject(_) => None,
        }
    }
}

// =============================================================================
// Validation output
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidatedSubject {
    pub uri: String,
    pub class: String,
    pub class_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub used_shape: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shape_name: Option<String>,
    pub total_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub valid_count: Option<usize>,
    pub properties: SubjectProperties,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub constraint_results: Vec<ConstraintResult>,
}

impl ValidatedSubject {
    pub fn is_shaped(&self) -> bool {
        self.used_shape.is_some()
    }

    pub fn validated_properties(&self) -> &[ValidatedProperty] {
        match &self.properties {
            SubjectProperties::Validated(properties) => properties,
            SubjectProperties::Processed(_) => &[],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum SubjectProperties {
    Validated(Vec<ValidatedProperty>),
    Processed(Vec<ProcessedProperty>),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidatedProperty {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_class: Option<String>,
    pub min_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_count: Option<u32>,
    pub actual_count: usize,
    pub value: Vec<PropertyValue>,
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maturity_tier: Option<MaturityTier>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub constraint_results: Vec<ConstraintResult>,
}

/// A property of a subject no shape applies to: reported, never judged.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessedProperty {
    pub name: String,
    pub path: String,
    pub value: Vec<PropertyValue>,
    pub actual_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PropertyValue {
    Text(String),
    Subject(ValidatedSubject),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConstraintResult {
    pub focus_node: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result_path: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    pub message: String,
}

// =============================================================================
// Aggregated report
// =============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassCollection {
    #[serde(rename = "classURI")]
    pub class_uri: String,
    pub class_name: String,
    pub count: usize,
    pub objects: Vec<ValidatedSubject>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub compliance: Option<ClassCompliance>,
}

/// Maturity findings that concern one class.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassCompliance {
    /// Lowest tier that requires the class while the document has no instance of it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub missing_at_tier: Option<MaturityTier>,
    pub missing_optional_properties: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidatedPublication {
    pub classes: Vec<ClassCollection>,
    pub maturity: MaturityTier,
    pub maturity_report: MaturityReport,
}
