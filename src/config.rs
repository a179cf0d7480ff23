//! # Configuration
//!
//! Settings come from a YAML file (`routeloop.yaml` by default) with every
//! field defaulted, then from `ROUTELOOP_*` environment variables.
//!
//! ```yaml
//! routes:
//!   tables: [config/routes.yaml]
//!   generated: config/routes.generated.yaml
//! handlers:
//!   generated_dir: src/handlers/suggested
//!   generated_module: suggested
//! server:
//!   base_url: http://localhost:8080
//! suggester:
//!   log_glob: logs/*.jsonl
//!   min_confidence: 0.88
//!   max_batch: 5
//! ```
//!
//! ## Environment Variables
//!
//! | Variable | Field |
//! |---|---|
//! | `ROUTELOOP_LOG_GLOB` | `suggester.log_glob` |
//! | `ROUTELOOP_MIN_CONFIDENCE` | `suggester.min_confidence` |
//! | `ROUTELOOP_MAX_BATCH` | `suggester.max_batch` |
//! | `ROUTELOOP_GENERATED_DIR` | `handlers.generated_dir` |
//! | `ROUTELOOP_BASE_URL` | `server.base_url` |
//! | `ROUTELOOP_SEED` | `suggester.seed` |
//!
//! Values that do not parse are ignored with a warning.

use crate::handlers::ScaffoldLoader;
use crate::registry::RouteSources;
use crate::suggest::{MaterializerConfig, SelectorConfig};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::warn;
use url::Url;

pub const DEFAULT_CONFIG_FILE: &str = "routeloop.yaml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutesConfig {
    /// Hand-written tables, loaded in order.
    pub tables: Vec<PathBuf>,
    /// Table the suggester appends to.
    pub generated: Option<PathBuf>,
}

impl Default for RoutesConfig {
    fn default() -> Self {
        Self {
            tables: vec![PathBuf::from("config/routes.yaml")],
            generated: Some(PathBuf::from("config/routes.generated.yaml")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HandlersConfig {
    pub generated_dir: PathBuf,
    pub generated_module: String,
}

impl Default for HandlersConfig {
    fn default() -> Self {
        Self {
            generated_dir: PathBuf::from("src/handlers/suggested"),
            generated_module: "suggested".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Base for turning origin-form request targets into URLs.
    pub base_url: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SuggesterConfig {
    pub log_glob: String,
    pub max_log_entries: usize,
    pub min_confidence: f64,
    pub max_batch: usize,
    pub default_auth: String,
    pub dedupe_similarity: Option<f64>,
    /// Fixes the score jitter for reproducible runs.
    pub seed: Option<u64>,
}

impl Default for SuggesterConfig {
    fn default() -> Self {
        Self {
            log_glob: "logs/*.jsonl".to_string(),
            max_log_entries: 10_000,
            min_confidence: 0.88,
            max_batch: 5,
            default_auth: "authenticated".to_string(),
            dedupe_similarity: None,
            seed: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouteloopConfig {
    pub routes: RoutesConfig,
    pub handlers: HandlersConfig,
    pub server: ServerConfig,
    pub suggester: SuggesterConfig,
}

impl RouteloopConfig {
    /// Read a config file. Relative paths inside it stay relative to the working directory.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {path:?}"))?;
        let config: Self = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {path:?}"))?;
        config.validate()?;
        Ok(config)
    }

    /// Explicit file, else `routeloop.yaml` if present, else defaults; then env overrides.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None if Path::new(DEFAULT_CONFIG_FILE).is_file() => {
                Self::from_file(Path::new(DEFAULT_CONFIG_FILE))?
            }
            None => Self::default(),
        };
        config.apply_env_overrides(|key| std::env::var(key).ok());
        config.validate()?;
        Ok(config)
    }

    /// Apply `ROUTELOOP_*` overrides read through `lookup`.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(v) = lookup("ROUTELOOP_LOG_GLOB") {
            self.suggester.log_glob = v;
        }
        if let Some(v) = parse_env(&lookup, "ROUTELOOP_MIN_CONFIDENCE") {
            self.suggester.min_confidence = v;
        }
        if let Some(v) = parse_env(&lookup, "ROUTELOOP_MAX_BATCH") {
            self.suggester.max_batch = v;
        }
        if let Some(v) = lookup("ROUTELOOP_GENERATED_DIR") {
            self.handlers.generated_dir = PathBuf::from(v);
        }
        if let Some(v) = lookup("ROUTELOOP_BASE_URL") {
            self.server.base_url = v;
        }
        if let Some(v) = parse_env(&lookup, "ROUTELOOP_SEED") {
            self.suggester.seed = Some(v);
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        let s = &self.suggester;
        if !(0.0..=1.0).contains(&s.min_confidence) {
            anyhow::bail!("suggester.min_confidence must be within [0, 1], got {}", s.min_confidence);
        }
        if s.max_batch == 0 {
            anyhow::bail!("suggester.max_batch must be at least 1");
        }
        if s.max_log_entries == 0 {
            anyhow::bail!("suggester.max_log_entries must be at least 1");
        }
        if let Some(t) = s.dedupe_similarity {
            if !(-1.0..=1.0).contains(&t) {
                anyhow::bail!("suggester.dedupe_similarity must be within [-1, 1], got {t}");
            }
        }
        self.base_url()?;
        Ok(())
    }

    pub fn base_url(&self) -> anyhow::Result<Url> {
        Url::parse(&self.server.base_url)
            .with_context(|| format!("Invalid server.base_url '{}'", self.server.base_url))
    }

    #[must_use]
    pub fn route_sources(&self) -> RouteSources {
        RouteSources::new(self.routes.tables.clone(), self.routes.generated.clone())
    }

    #[must_use]
    pub fn scaffold_loader(&self) -> ScaffoldLoader {
        ScaffoldLoader::new(
            self.handlers.generated_dir.clone(),
            self.handlers.generated_module.clone(),
        )
    }

    #[must_use]
    pub fn selector(&self) -> SelectorConfig {
        SelectorConfig {
            min_confidence: self.suggester.min_confidence,
            max_batch: self.suggester.max_batch,
            dedupe_similarity: self.suggester.dedupe_similarity,
        }
    }

    #[must_use]
    pub fn materializer(&self) -> MaterializerConfig {
        MaterializerConfig {
            generated_dir: self.handlers.generated_dir.clone(),
            generated_module: self.handlers.generated_module.clone(),
            default_auth: self.suggester.default_auth.clone(),
            route_table: self.routes.generated.clone(),
        }
    }
}

fn parse_env<T: std::str::FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(v) => Some(v),
        Err(_) => {
            warn!(key, value = %raw, "Ignoring unparseable environment override");
            None
        }
    }
}
