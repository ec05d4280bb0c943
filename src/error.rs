//! Errors that abort a validation run.
//!
//! Most problems in a publication are findings, not errors: they end up in the
//! report. Only the conditions below stop a run.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ValidatorError {
    #[error("shape '{shape}' declares no sh:targetClass")]
    MissingTargetClass { shape: String },

    #[error("failed to parse {format} input: {reason}")]
    Parse { format: String, reason: String },

    #[error("unsupported RDF format '{0}'")]
    UnsupportedFormat(String),

    #[error("invalid IRI '{iri}': {reason}")]
    InvalidIri { iri: String, reason: String },

    #[error("fact store failure: {0}")]
    Store(String),

    #[error("failed to fetch '{uri}': {reason}")]
    Fetch { uri: String, reason: String },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("validation run aborted: {0}")]
    Aborted(#[source] anyhow::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ValidatorError {
    pub fn parse(format: impl Into<String>, reason: impl ToString) -> Self {
        ValidatorError::Parse {
            format: format.into(),
            reason: reason.to_string(),
        }
    }

    pub fn fetch(uri: impl Into<String>, reason: impl ToString) -> Self {
        ValidatorError::Fetch {
            uri: uri.into(),
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ValidatorError>;
