//! Shape definitions compiled from shape facts.
//!
//! Shapes arrive as ordinary facts. Compilation walks every node shape and
//! folds its statements into typed structs, failing the run when a node
//! shape has no `sh:targetClass`.
//!
//! # Components
//!
//! - **ShapeStatement**: one classified statement about a shape. Only the
//!   predicates listed there carry meaning; anything else is `Unrecognized`
//!   and ignored
//! - **NodeShape**: target class, display name, maturity tier, property
//!   shapes and shape-level constraints
//! - **PropertyShape**: path, cardinality, required class, maturity tier and
//!   property-level constraints
//! - **SparqlConstraint**: an embedded SELECT query with its message template
//! - **ShapeSet**: the compiled shapes in declaration order
//!
//! # Example
//!
//! ```rust,ignore
//! let shapes = ShapeSet::compile(&FactSet::from_facts(read_facts(path)?))?;
//! for shape in shapes.shapes_for("http://data.vlaanderen.be/ns/besluit#Zitting") {
//!     println!("{} has {} properties", shape.name, shape.properties.len());
//! }
//! ```

use crate::error::{Result, ValidatorError};
use crate::maturity::MaturityTier;
use crate::model::{Fact, Node};
use crate::store::FactSet;
use crate::vocab::{
    MATURITY_LEVEL, RDF_TYPE, SH_CLASS, SH_DESCRIPTION, SH_MAX_COUNT, SH_MESSAGE, SH_MIN_COUNT,
    SH_NAME, SH_NODE_SHAPE, SH_PATH, SH_PROPERTY, SH_SELECT, SH_SPARQL, SH_TARGET_CLASS,
    short_name,
};
use indexmap::IndexSet;
use std::str::FromStr;
use tracing::{debug, trace, warn};

// =============================================================================
// Statements
// =============================================================================

#[derive(Debug, Clone, PartialEq)]
pub enum ShapeStatement {
    TargetClass(String),
    Property(Node),
    Name(String),
    Description(String),
    Path(String),
    Class(String),
    MinCount(u32),
    MaxCount(u32),
    MaturityLevel(MaturityTier),
    Sparql(Node),
    Select(String),
    Message(String),
    /// A recognized predicate whose object has the wrong shape.
    Malformed { predicate: String, value: String },
    Unrecognized { predicate: String },
}

impl ShapeStatement {
    pub fn classify(fact: &Fact) -> Self {
        let object = &fact.object;
        let malformed = || ShapeStatement::Malformed {
            predicate: fact.predicate.clone(),
            value: object.key(),
        };
        let iri = |wrap: fn(String) -> ShapeStatement| match object.as_iri() {
            Some(iri) => wrap(iri.to_string()),
            None => malformed(),
        };
        let resource = |wrap: fn(Node) -> ShapeStatement| {
            if object.is_literal() {
                malformed()
            } else {
                wrap(object.clone())
            }
        };
        let count = |wrap: fn(u32) -> ShapeStatement| match object.value().trim().parse::<u32>() {
            Ok(count) if object.is_literal() => wrap(count),
            _ => malformed(),
        };

        match fact.predicate.as_str() {
            SH_TARGET_CLASS => iri(ShapeStatement::TargetClass),
            SH_PROPERTY => resource(ShapeStatement::Property),
            SH_NAME => ShapeStatement::Name(object.value().to_string()),
            SH_DESCRIPTION => ShapeStatement::Description(object.value().to_string()),
            SH_PATH => iri(ShapeStatement::Path),
            SH_CLASS => iri(ShapeStatement::Class),
            SH_MIN_COUNT => count(ShapeStatement::MinCount),
            SH_MAX_COUNT => count(ShapeStatement::MaxCount),
            MATURITY_LEVEL => match MaturityTier::from_str(object.value().trim()) {
                Ok(tier) => ShapeStatement::MaturityLevel(tier),
                Err(_) => malformed(),
            },
            SH_SPARQL => resource(ShapeStatement::Sparql),
            SH_SELECT => ShapeStatement::Select(object.value().to_string()),
            SH_MESSAGE => ShapeStatement::Message(object.value().to_string()),
            _ => ShapeStatement::Unrecognized {
                predicate: fact.predicate.clone(),
            },
        }
    }
}

// =============================================================================
// Shapes
// =============================================================================

/// An embedded SELECT constraint. Inert unless both parts are present.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SparqlConstraint {
    pub select: Option<String>,
    pub message: Option<String>,
}

impl SparqlConstraint {
    fn compile(node: &Node, facts: &FactSet) -> Self {
        let mut constraint = SparqlConstraint::default();
        for fact in facts.facts_for(node) {
            match ShapeStatement::classify(fact) {
                ShapeStatement::Select(select) => constraint.select = Some(select),
                ShapeStatement::Message(message) => constraint.message = Some(message),
                _ => {}
            }
        }
        constraint
    }

    pub fn parts(&self) -> Option<(&str, &str)> {
        Some((self.select.as_deref()?, self.message.as_deref()?))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PropertyShape {
    pub name: String,
    pub description: Option<String>,
    pub path: String,
    pub target_class: Option<String>,
    pub min_count: u32,
    pub max_count: Option<u32>,
    pub maturity_tier: Option<MaturityTier>,
    pub constraints: Vec<SparqlConstraint>,
}

impl PropertyShape {
    fn compile(node: &Node, facts: &FactSet) -> Option<Self> {
        let mut name = None;
        let mut description = None;
        let mut path = None;
        let mut target_class = None;
        let mut min_count = 0;
        let mut max_count = None;
        let mut maturity_tier = None;
        let mut constraints = Vec::new();

        for fact in facts.facts_for(node) {
            match ShapeStatement::classify(fact) {
                ShapeStatement::Name(value) => name = Some(value),
                ShapeStatement::Description(value) => description = Some(value),
                ShapeStatement::Path(value) => path = Some(value),
                ShapeStatement::Class(value) => target_class = Some(value),
                ShapeStatement::MinCount(value) => min_count = value,
                ShapeStatement::MaxCount(value) => max_count = Some(value),
                ShapeStatement::MaturityLevel(tier) => maturity_tier = Some(tier),
                ShapeStatement::Sparql(constraint) => {
                    constraints.push(SparqlConstraint::compile(&constraint, facts))
                }
                ShapeStatement::Malformed { predicate, value } => {
                    warn!(property = %node, %predicate, %value, "ignoring malformed shape statement");
                }
                other => trace!(property = %node, statement = ?other, "statement not used on property shapes"),
            }
        }

        let Some(path) = path else {
            warn!(property = %node, "property shape without a simple sh:path is skipped");
            return None;
        };

        Some(Self {
            name: name.unwrap_or_else(|| short_name(&path)),
            description,
            path,
            target_class,
            min_count,
            max_count,
            maturity_tier,
            constraints,
        })
    }

    pub fn is_optional(&self) -> bool {
        self.min_count == 0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NodeShape {
    pub id: String,
    pub target_class: String,
    pub name: String,
    pub maturity_tier: Option<MaturityTier>,
    pub properties: Vec<PropertyShape>,
    pub constraints: Vec<SparqlConstraint>,
}

// =============================================================================
// Shape Set
// =============================================================================

/// All shapes of an application profile, in declaration order.
#[derive(Debug, Clone, Default)]
pub struct ShapeSet {
    shapes: Vec<NodeShape>,
}

impl ShapeSet {
    pub fn new(shapes: Vec<NodeShape>) -> Self {
        Self { shapes }
    }

    /// Compiles every node shape in the facts. A shape is any subject typed
    /// `sh:NodeShape` or carrying `sh:targetClass`; one without a target class
    /// makes the whole set unusable.
    pub fn compile(facts: &FactSet) -> Result<Self> {
        let mut shape_nodes: IndexSet<&Node> = IndexSet::new();
        for fact in facts.iter() {
            let is_shape = fact.predicate == SH_TARGET_CLASS
                || (fact.predicate == RDF_TYPE && fact.object.as_iri() == Some(SH_NODE_SHAPE));
            if is_shape {
                shape_nodes.insert(&fact.subject);
            }
        }

        let mut shapes = Vec::new();
        for node in shape_nodes {
            shapes.extend(Self::compile_node_shape(node, facts)?);
        }
        debug!(shape_count = shapes.len(), "compiled shapes");
        Ok(Self { shapes })
    }

    /// One `NodeShape` per declared target class.
    fn compile_node_shape(node: &Node, facts: &FactSet) -> Result<Vec<NodeShape>> {
        let mut target_classes = Vec::new();
        let mut name = None;
        let mut maturity_tier = None;
        let mut properties = Vec::new();
        let mut constraints = Vec::new();

        for fact in facts.facts_for(node) {
            match ShapeStatement::classify(fact) {
                ShapeStatement::TargetClass(class) => target_classes.push(class),
                ShapeStatement::Name(value) => name = Some(value),
                ShapeStatement::MaturityLevel(tier) => maturity_tier = Some(tier),
                ShapeStatement::Property(property) => {
                    properties.extend(PropertyShape::compile(&property, facts))
                }
                ShapeStatement::Sparql(constraint) => {
                    constraints.push(SparqlConstraint::compile(&constraint, facts))
                }
                ShapeStatement::Malformed { predicate, value } => {
                    warn!(shape = %node, %predicate, %value, "ignoring malformed shape statement");
                }
                _ => {}
            }
        }

        if target_classes.is_empty() {
            return Err(ValidatorError::MissingTargetClass { shape: node.key() });
        }

        let id = node.key();
        let name = name.unwrap_or_else(|| short_name(&id));
        Ok(target_classes
            .into_iter()
            .map(|target_class| NodeShape {
                id: id.clone(),
                target_class,
                name: name.clone(),
                maturity_tier,
                properties: properties.clone(),
                constraints: constraints.clone(),
            })
            .collect())
    }

    pub fn iter(&self) -> impl Iterator<Item = &NodeShape> {
        self.shapes.iter()
    }

    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }

    /// Every shape targeting `class`; more than one means polymorphism.
    pub fn shapes_for<'a>(&'a self, class: &'a str) -> impl Iterator<Item = &'a NodeShape> + 'a {
        self.shapes
            .iter()
            .filter(move |shape| shape.target_class == class)
    }

    /// Distinct target classes in declaration order.
    pub fn target_classes(&self) -> IndexSet<&str> {
        self.shapes
            .iter()
            .map(|shape| shape.target_class.as_str())
            .collect()
    }
}
