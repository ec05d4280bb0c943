pub mod aggregate;
pub mod config;
pub mod constraint;
pub mod crawl;
pub mod document;
pub mod error;
pub mod logging;
pub mod maturity;
pub mod model;
pub mod parse;
pub mod pipeline;
pub mod rdf;
pub mod shapes;
pub mod store;
pub mod validate;
pub mod vocab;

pub use config::{CliArgs, ValidatorConfig};
pub use crawl::{CrawlPolicy, Crawler, Dereference, HttpDereferencer, StaticDereferencer};
pub use error::{Result, ValidatorError};
pub use logging::{LoggingConfig, init_logging};
pub use maturity::{MaturityReport, MaturityTier};
pub use model::{ClassCollection, Fact, Node, ValidatedPublication, ValidatedSubject};
pub use pipeline::{PublicationValidator, ValidationRun, validate_publication};
pub use store::{FactSet, QueryEngine};

use anyhow::Context;
use std::io::Write;

/// Reads both inputs, validates and writes the JSON report to `out`.
pub async fn run_cli(args: CliArgs, mut out: impl Write) -> anyhow::Result<()> {
    let config = ValidatorConfig::from_args(&args)?;

    let document = rdf::read_facts(&args.document)
        .with_context(|| format!("failed to read document {:?}", args.document))?;
    let shapes = rdf::read_facts(&args.shapes)
        .with_context(|| format!("failed to read shapes {:?}", args.shapes))?;

    let validator = PublicationValidator::new(config)?;
    let run = validator.validate(document, shapes).await?;

    if args.pretty {
        serde_json::to_writer_pretty(&mut out, &run)?;
    } else {
        serde_json::to_writer(&mut out, &run)?;
    }
    writeln!(out)?;
    Ok(())
}
