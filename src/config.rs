use crate::crawl::{CrawlPolicy, FetchOptions};
use crate::maturity::default_sparse_paths;
use anyhow::{Context, Result};
use clap::Parser;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

const DEFAULT_MAX_CONCURRENT_FETCHES: usize = 8;
const DEFAULT_RETRY_COUNT: u32 = 2;
const DEFAULT_RETRY_DELAY_MS: u64 = 2000;
const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, PartialEq)]
pub struct ValidatorConfig {
    pub crawl: CrawlConfig,
    pub fetch: FetchConfig,
    pub maturity: MaturityConfig,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlConfig {
    pub enabled: bool,
    pub expand_governing_bodies: bool,
    pub skip_when_administrative_unit_known: bool,
    pub max_concurrent_fetches: usize,
    /// Serve dereferences from this directory instead of the network.
    pub offline_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchConfig {
    pub retry_count: u32,
    pub retry_delay: Duration,
    pub timeout: Duration,
    pub lenient: bool,
    pub proxy: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaturityConfig {
    /// Optional properties never reported as missing.
    pub sparse_optional_paths: Vec<String>,
}

impl Default for ValidatorConfig {
    fn default() -> Self {
        Self {
            crawl: CrawlConfig {
                enabled: true,
                expand_governing_bodies: true,
                skip_when_administrative_unit_known: true,
                max_concurrent_fetches: DEFAULT_MAX_CONCURRENT_FETCHES,
                offline_dir: None,
            },
            fetch: FetchConfig {
                retry_count: DEFAULT_RETRY_COUNT,
                retry_delay: Duration::from_millis(DEFAULT_RETRY_DELAY_MS),
                timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
                lenient: true,
                proxy: None,
            },
            maturity: MaturityConfig {
                sparse_optional_paths: default_sparse_paths(),
            },
        }
    }
}

impl ValidatorConfig {
    /// CLI flags win over the config file, which wins over defaults.
    pub fn from_args(args: &CliArgs) -> Result<Self> {
        let file_config = match args.config.as_ref() {
            Some(path) => load_config_file(path)?,
            None => PartialConfig::default(),
        };
        Self::layer(args, file_config)
    }

    /// Loads a config file on its own, without CLI overrides.
    pub fn from_file(path: &Path) -> Result<Self> {
        Self::layer(&CliArgs::default(), load_config_file(path)?)
    }

    fn layer(args: &CliArgs, file_config: PartialConfig) -> Result<Self> {
        let defaults = Self::default();
        let PartialConfig {
            crawl: file_crawl,
            fetch: file_fetch,
            maturity: file_maturity,
        } = file_config;

        let crawl = CrawlConfig {
            enabled: !args.no_crawl && file_crawl.enabled.unwrap_or(defaults.crawl.enabled),
            expand_governing_bodies: file_crawl
                .expand_governing_bodies
                .unwrap_or(defaults.crawl.expand_governing_bodies),
            skip_when_administrative_unit_known: file_crawl
                .skip_when_administrative_unit_known
                .unwrap_or(defaults.crawl.skip_when_administrative_unit_known),
            max_concurrent_fetches: args
                .max_concurrent_fetches
                .or(file_crawl.max_concurrent_fetches)
                .unwrap_or(defaults.crawl.max_concurrent_fetches),
            offline_dir: args.offline_dir.clone().or(file_crawl.offline_dir),
        };

        let fetch = FetchConfig {
            retry_count: args
                .retry_count
                .or(file_fetch.retry_count)
                .unwrap_or(defaults.fetch.retry_count),
            retry_delay: file_fetch
                .retry_delay_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.fetch.retry_delay),
            timeout: args
                .timeout_secs
                .or(file_fetch.timeout_secs)
                .map(Duration::from_secs)
                .unwrap_or(defaults.fetch.timeout),
            lenient: file_fetch.lenient.unwrap_or(defaults.fetch.lenient),
            proxy: args
                .proxy
                .clone()
                .or(file_fetch.proxy)
                .filter(|proxy| !proxy.trim().is_empty()),
        };

        let maturity = MaturityConfig {
            sparse_optional_paths: file_maturity
                .sparse_optional_paths
                .unwrap_or(defaults.maturity.sparse_optional_paths),
        };

        let config = Self {
            crawl,
            fetch,
            maturity,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            self.crawl.max_concurrent_fetches > 0,
            "crawl.max_concurrent_fetches must be at least 1"
        );
        anyhow::ensure!(
            !self.fetch.timeout.is_zero(),
            "fetch.timeout_secs must be greater than zero"
        );
        if let Some(dir) = self.crawl.offline_dir.as_ref() {
            anyhow::ensure!(dir.is_dir(), "offline directory {:?} is not a directory", dir);
        }
        Ok(())
    }

    pub fn crawl_policy(&self) -> CrawlPolicy {
        CrawlPolicy {
            expand_governing_bodies: self.crawl.expand_governing_bodies,
            skip_when_administrative_unit_known: self.crawl.skip_when_administrative_unit_known,
            max_concurrent_fetches: self.crawl.max_concurrent_fetches,
        }
    }

    pub fn fetch_options(&self) -> FetchOptions {
        FetchOptions {
            retry_count: self.fetch.retry_count,
            retry_delay: self.fetch.retry_delay,
            timeout: self.fetch.timeout,
            lenient: self.fetch.lenient,
        }
    }
}

#[derive(Parser, Debug, Default, Clone)]
#[command(
    name = "publication-validator",
    about = "Validate a local-government publication against its application profile",
    version
)]
pub struct CliArgs {
    #[arg(long, value_name = "FILE", help = "Publication to validate (format from extension)")]
    pub document: PathBuf,

    #[arg(long, value_name = "FILE", help = "Shape definitions (format from extension)")]
    pub shapes: PathBuf,

    #[arg(
        long,
        value_name = "FILE",
        help = "Path to a configuration file (TOML, YAML or JSON)"
    )]
    pub config: Option<PathBuf>,

    #[arg(long, help = "Validate the document as is, without dereferencing entities")]
    pub no_crawl: bool,

    #[arg(
        long,
        env = "PUBLICATION_VALIDATOR_OFFLINE_DIR",
        value_name = "DIR",
        help = "Resolve entity references from RDF files in this directory"
    )]
    pub offline_dir: Option<PathBuf>,

    #[arg(
        long,
        env = "PUBLICATION_VALIDATOR_MAX_CONCURRENT_FETCHES",
        value_name = "N",
        help = "Maximum number of dereferences in flight",
        value_parser = clap::value_parser!(usize)
    )]
    pub max_concurrent_fetches: Option<usize>,

    #[arg(
        long,
        env = "PUBLICATION_VALIDATOR_RETRY_COUNT",
        value_name = "N",
        help = "Retries per failed dereference"
    )]
    pub retry_count: Option<u32>,

    #[arg(
        long,
        env = "PUBLICATION_VALIDATOR_TIMEOUT_SECS",
        value_name = "SECS",
        help = "Timeout per dereference request"
    )]
    pub timeout_secs: Option<u64>,

    #[arg(
        long,
        env = "PUBLICATION_VALIDATOR_PROXY",
        value_name = "URL",
        help = "Proxy for dereference requests"
    )]
    pub proxy: Option<String>,

    #[arg(long, help = "Pretty-print the JSON report")]
    pub pretty: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct PartialConfig {
    crawl: PartialCrawlConfig,
    fetch: PartialFetchConfig,
    maturity: PartialMaturityConfig,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct PartialCrawlConfig {
    enabled: Option<bool>,
    expand_governing_bodies: Option<bool>,
    skip_when_administrative_unit_known: Option<bool>,
    max_concurrent_fetches: Option<usize>,
    offline_dir: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct PartialFetchConfig {
    retry_count: Option<u32>,
    retry_delay_ms: Option<u64>,
    timeout_secs: Option<u64>,
    lenient: Option<bool>,
    proxy: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct PartialMaturityConfig {
    sparse_optional_paths: Option<Vec<String>>,
}

fn load_config_file(path: &Path) -> Result<PartialConfig> {
    if !path.exists() {
        anyhow::bail!("config file {:?} does not exist", path);
    }
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {:?}", path))?;
    let ext = path
        .extension()
        .and_then(|os| os.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    let parsed = match ext.as_str() {
        "toml" => toml::from_str(&contents)
            .with_context(|| format!("failed to parse TOML config {:?}", path))?,
        "yaml" | "yml" => serde_yaml::from_str(&contents)
            .with_context(|| format!("failed to parse YAML config {:?}", path))?,
        "json" => serde_json::from_str(&contents)
            .with_context(|| format!("failed to parse JSON config {:?}", path))?,
        other => anyhow::bail!("unsupported config extension: {other}"),
    };
    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn args() -> CliArgs {
        CliArgs {
            document: PathBuf::from("document.ttl"),
            shapes: PathBuf::from("shapes.ttl"),
            ..CliArgs::default()
        }
    }

    fn write_config(ext: &str, contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new()
            .suffix(&format!(".{ext}"))
            .tempfile()
            .unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn defaults_without_file() {
        let config = ValidatorConfig::from_args(&args()).unwrap();
        assert_eq!(config, ValidatorConfig::default());
        assert_eq!(config.fetch.retry_count, 2);
        assert_eq!(config.fetch.retry_delay, Duration::from_millis(2000));
        assert_eq!(config.maturity.sparse_optional_paths.len(), 2);
    }

    #[test]
    fn cli_overrides_file_overrides_default() {
        let file = write_config(
            "toml",
            r#"
            [crawl]
            max_concurrent_fetches = 2
            skip_when_administrative_unit_known = false

            [fetch]
            retry_count = 5
            timeout_secs = 10
            "#,
        );
        let mut cli = args();
        cli.config = Some(file.path().to_path_buf());
        cli.retry_count = Some(0);
        cli.no_crawl = true;

        let config = ValidatorConfig::from_args(&cli).unwrap();
        assert!(!config.crawl.enabled);
        assert!(!config.crawl.skip_when_administrative_unit_known);
        assert_eq!(config.crawl.max_concurrent_fetches, 2);
        assert_eq!(config.fetch.retry_count, 0);
        assert_eq!(config.fetch.timeout, Duration::from_secs(10));
        assert!(config.fetch.lenient);
    }

    #[test]
    fn yaml_file_is_accepted() {
        let file = write_config("yaml", "maturity:\n  sparse_optional_paths: []\n");
        let config = ValidatorConfig::from_file(file.path()).unwrap();
        assert!(config.maturity.sparse_optional_paths.is_empty());
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let file = write_config("json", r#"{ "fetch": { "timeout_secs": 0 } }"#);
        let error = ValidatorConfig::from_file(file.path()).unwrap_err();
        assert!(error.to_string().contains("timeout"));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let file = write_config("toml", "[crawl]\nmax_depth = 3\n");
        assert!(ValidatorConfig::from_file(file.path()).is_err());
    }

    #[test]
    fn missing_file_is_an_error() {
        let mut cli = args();
        cli.config = Some(PathBuf::from("/nonexistent/validator.toml"));
        assert!(ValidatorConfig::from_args(&cli).is_err());
    }
}
