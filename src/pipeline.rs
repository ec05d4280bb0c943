//! End-to-end validation of one publication.

use crate::aggregate::aggregate;
use crate::config::ValidatorConfig;
use crate::crawl::{CrawlStats, Crawler, Dereference, HttpDereferencer, StaticDereferencer};
use crate::document::{DocumentType, determine_document_type};
use crate::error::Result;
use crate::logging::run_span;
use crate::maturity::MaturityScorer;
use crate::model::{Fact, ValidatedPublication};
use crate::parse::parse;
use crate::shapes::ShapeSet;
use crate::store::{FactSet, OxigraphEngine};
use crate::validate::{ProgressHook, RunContext, ShapeValidator};
use serde::Serialize;
use tracing::{Instrument, debug, info};
use uuid::Uuid;

/// Report of one run: the publication verdict plus run metadata.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationRun {
    pub run_id: Uuid,
    pub document_type: DocumentType,
    pub crawl: CrawlStats,
    #[serde(flatten)]
    pub publication: ValidatedPublication,
}

pub struct PublicationValidator {
    config: ValidatorConfig,
    dereferencer: Box<dyn Dereference>,
}

impl PublicationValidator {
    /// Dereferences over HTTP, or from `crawl.offline_dir` when set.
    pub fn new(config: ValidatorConfig) -> Result<Self> {
        let dereferencer: Box<dyn Dereference> = match config.crawl.offline_dir.as_deref() {
            Some(dir) => Box::new(StaticDereferencer::from_dir(dir)?),
            None => Box::new(HttpDereferencer::new(
                config.fetch_options(),
                config.fetch.proxy.as_deref(),
            )?),
        };
        Ok(Self::with_dereferencer(config, dereferencer))
    }

    pub fn with_dereferencer(config: ValidatorConfig, dereferencer: Box<dyn Dereference>) -> Self {
        Self {
            config,
            dereferencer,
        }
    }

    pub fn config(&self) -> &ValidatorConfig {
        &self.config
    }

    pub async fn validate(&self, document: Vec<Fact>, shape_facts: Vec<Fact>) -> Result<ValidationRun> {
        self.validate_with_progress(document, shape_facts, None).await
    }

    /// Runs crawl, parse, validation, scoring and aggregation. Every piece of
    /// run state is created here and dropped with the run.
    pub async fn validate_with_progress(
        &self,
        document: Vec<Fact>,
        shape_facts: Vec<Fact>,
        progress: Option<ProgressHook<'_>>,
    ) -> Result<ValidationRun> {
        let run_id = Uuid::new_v4();
        async move {
            let shapes = ShapeSet::compile(&FactSet::from_facts(shape_facts))?;

            let mut facts = FactSet::from_facts(document);
            let crawl = if self.config.crawl.enabled {
                Crawler::with_policy(self.dereferencer.as_ref(), self.config.crawl_policy())
                    .crawl(&mut facts)
                    .await
            } else {
                debug!("crawling disabled");
                CrawlStats::default()
            };

            let document_type = determine_document_type(&facts);
            let mut ctx = RunContext::new();
            if let Some(hook) = progress {
                ctx = ctx.with_progress(hook);
            }
            let publication = validate_publication(
                &facts,
                &shapes,
                &mut ctx,
                self.config.maturity.sparse_optional_paths.clone(),
            )?;

            info!(
                %document_type,
                facts = facts.len(),
                classes = publication.classes.len(),
                maturity = %publication.maturity,
                "validation finished"
            );
            Ok(ValidationRun {
                run_id,
                document_type,
                crawl,
                publication,
            })
        }
        .instrument(run_span(run_id))
        .await
    }
}

/// Validates an already complete fact set: parse, validate, score, aggregate.
pub fn validate_publication(
    facts: &FactSet,
    shapes: &ShapeSet,
    ctx: &mut RunContext<'_>,
    sparse_optional_paths: Vec<String>,
) -> Result<ValidatedPublication> {
    let engine = OxigraphEngine::from_facts(facts)?;
    let parsed = parse(facts);
    debug!(subjects = parsed.len(), "parsed publication");

    let validated = ShapeValidator::new(shapes, &engine).validate_all(&parsed, ctx)?;
    let report = MaturityScorer::new(shapes, facts)
        .with_sparse_paths(sparse_optional_paths)
        .score(ctx.tally());
    let classes = aggregate(validated, shapes, &report);

    Ok(ValidatedPublication {
        classes,
        maturity: report.achieved_tier,
        maturity_report: report,
    })
}
