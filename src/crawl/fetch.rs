//! Dereferencing entity URIs into facts.

use crate::error::{Result, ValidatorError};
use crate::model::Fact;
use crate::rdf::{facts_from_slice, format_from_media_type, read_facts};
use async_trait::async_trait;
use indexmap::IndexSet;
use oxigraph::io::RdfFormat;
use parking_lot::Mutex;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, warn};

/// File extensions loaded from an offline directory. Anything else, notes
/// and `.txt` files included, is left alone.
const OFFLINE_EXTENSIONS: &[&str] = &["ttl", "nt", "nq", "trig", "n3", "rdf", "jsonld"];

const ACCEPT_RDF: &str =
    "text/turtle, application/n-triples;q=0.9, application/ld+json;q=0.8, application/rdf+xml;q=0.7";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchOptions {
    /// Attempts after the first one.
    pub retry_count: u32,
    pub retry_delay: Duration,
    pub timeout: Duration,
    /// Return no facts instead of an error once retries are exhausted.
    pub lenient: bool,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            retry_count: 2,
            retry_delay: Duration::from_millis(2000),
            timeout: Duration::from_secs(30),
            lenient: true,
        }
    }
}

/// Fetches the document a URI identifies and returns its facts.
#[async_trait]
pub trait Dereference: Send + Sync {
    async fn dereference(&self, uri: &str) -> Result<Vec<Fact>>;
}

// =============================================================================
// HTTP
// =============================================================================

pub struct HttpDereferencer {
    client: reqwest::Client,
    options: FetchOptions,
}

impl HttpDereferencer {
    pub fn new(options: FetchOptions, proxy: Option<&str>) -> Result<Self> {
        let mut builder = reqwest::Client::builder()
            .timeout(options.timeout)
            .user_agent(concat!("publication-validator/", env!("CARGO_PKG_VERSION")));
        if let Some(proxy) = proxy {
            let proxy = reqwest::Proxy::all(proxy)
                .map_err(|e| ValidatorError::Config(format!("invalid proxy '{proxy}': {e}")))?;
            builder = builder.proxy(proxy);
        }
        let client = builder
            .build()
            .map_err(|e| ValidatorError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, options })
    }

    async fn fetch_once(&self, uri: &str) -> Result<Vec<Fact>> {
        let response = self
            .client
            .get(uri)
            .header(ACCEPT, ACCEPT_RDF)
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|e| ValidatorError::fetch(uri, e))?;

        let format = match response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
        {
            Some(media_type) => format_from_media_type(media_type)
                .ok_or_else(|| ValidatorError::UnsupportedFormat(media_type.to_string()))?,
            None => RdfFormat::Turtle,
        };

        let body = response
            .bytes()
            .await
            .map_err(|e| ValidatorError::fetch(uri, e))?;
        facts_from_slice(&body, format, Some(uri))
    }
}

#[async_trait]
impl Dereference for HttpDereferencer {
    async fn dereference(&self, uri: &str) -> Result<Vec<Fact>> {
        let attempts = self.options.retry_count + 1;
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.fetch_once(uri).await {
                Ok(facts) => {
                    debug!(uri, attempt, facts = facts.len(), "dereferenced");
                    return Ok(facts);
                }
                Err(error) if attempt < attempts => {
                    warn!(
                        uri,
                        attempt,
                        delay_ms = self.options.retry_delay.as_millis() as u64,
                        %error,
                        "retrying dereference after delay"
                    );
                    tokio::time::sleep(self.options.retry_delay).await;
                }
                Err(error) if self.options.lenient => {
                    warn!(uri, attempts, %error, "giving up on dereference, continuing without it");
                    return Ok(Vec::new());
                }
                Err(error) => return Err(error),
            }
        }
    }
}

// =============================================================================
// Static
// =============================================================================

/// Serves pre-loaded documents and records every request it receives.
#[derive(Debug, Default)]
pub struct StaticDereferencer {
    documents: HashMap<String, Vec<Fact>>,
    requests: Mutex<Vec<String>>,
}

impl StaticDereferencer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document(mut self, uri: impl Into<String>, facts: Vec<Fact>) -> Self {
        self.documents.insert(uri.into(), facts);
        self
    }

    /// Loads every RDF file in `dir`. Each IRI a file describes as subject
    /// resolves to that whole file.
    pub fn from_dir(dir: &Path) -> Result<Self> {
        let mut documents: HashMap<String, Vec<Fact>> = HashMap::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if !path.is_file() || !is_offline_document(&path) {
                debug!(path = %path.display(), "skipping non-RDF file");
                continue;
            }
            let facts = read_facts(&path)?;
            let subjects: IndexSet<&str> = facts
                .iter()
                .filter_map(|fact| fact.subject.as_iri())
                .collect();
            for subject in subjects {
                documents
                    .entry(subject.to_string())
                    .or_default()
                    .extend(facts.iter().cloned());
            }
        }
        debug!(dir = %dir.display(), documents = documents.len(), "loaded offline documents");
        Ok(Self {
            documents,
            requests: Mutex::new(Vec::new()),
        })
    }

    /// URIs requested so far, in request order.
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().clone()
    }
}

fn is_offline_document(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| {
            OFFLINE_EXTENSIONS
                .iter()
                .any(|known| known.eq_ignore_ascii_case(ext))
        })
}

#[async_trait]
impl Dereference for StaticDereferencer {
    async fn dereference(&self, uri: &str) -> Result<Vec<Fact>> {
        self.requests.lock().push(uri.to_string());
        self.documents
            .get(uri)
            .cloned()
            .ok_or_else(|| ValidatorError::fetch(uri, "no offline copy available"))
    }
}
