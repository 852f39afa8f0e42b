//! # Configuration Module
//!
//! Loads the agent's settings from the environment (and an optional `.env`
//! file) and checks them before any run starts.

use std::env;
use std::path::PathBuf;

use anyhow::{Context, Result};
use research_flow::llm::DEFAULT_API_BASE;
use research_flow::research::DEFAULT_MODEL;
use research_flow::{ModelSelection, WorkflowConfig};

/// Default corpus location
pub const DEFAULT_DATA_FILE: &str = "data/posts.json";

// =============================================================================
// CONFIGURATION STRUCT
// =============================================================================
/// Main configuration for the research agent.
///
/// Workflow thresholds not listed here keep the library defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// Oracle API key (`ORACLE_API_KEY`, falling back to `GROK_API_KEY`)
    pub api_key: String,

    /// Oracle base URL
    pub api_base: String,

    /// Model per workflow role
    pub models: ModelSelection,

    pub max_iterations: usize,
    pub max_replans: usize,

    /// Skip Evaluate and Critique
    pub fast_mode: bool,

    /// JSON array of posts to research over
    pub data_file: PathBuf,

    /// Worker pool size for parallel batches
    pub max_workers: usize,
}

impl Default for Config {
    fn default() -> Self {
        let workflow = WorkflowConfig::default();
        Self {
            api_key: String::new(),
            api_base: DEFAULT_API_BASE.to_string(),
            models: ModelSelection::default(),
            max_iterations: workflow.max_iterations,
            max_replans: workflow.max_replans,
            fast_mode: workflow.fast_mode,
            data_file: PathBuf::from(DEFAULT_DATA_FILE),
            max_workers: 3,
        }
    }
}

// =============================================================================
// CONFIGURATION LOADING
// =============================================================================
impl Config {
    /// Load configuration from the process environment.
    ///
    /// A `.env` file in the working directory is read first when present;
    /// variables already set in the environment win.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from any key lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = Config::default();

        if let Some(key) = var("ORACLE_API_KEY").or_else(|| var("GROK_API_KEY")) {
            config.api_key = key;
        }

        if let Some(base) = var("ORACLE_BASE_URL") {
            config.api_base = base.trim_end_matches('/').to_string();
        }

        if let Some(model) = var("PLANNER_MODEL") {
            config.models = config.models.with_planner(model);
        }
        if let Some(model) = var("ANALYZER_MODEL") {
            config.models = config.models.with_analyzer(model);
        }
        if let Some(model) = var("REFINER_MODEL") {
            config.models = config.models.with_refiner(model);
        }
        if let Some(model) = var("SUMMARIZER_MODEL") {
            config.models = config.models.with_summarizer(model);
        }

        if let Some(val) = var("MAX_ITERATIONS") {
            config.max_iterations = val
                .trim()
                .parse()
                .context("MAX_ITERATIONS must be a non-negative integer")?;
        }

        if let Some(val) = var("MAX_REPLANS") {
            config.max_replans = val
                .trim()
                .parse()
                .context("MAX_REPLANS must be a non-negative integer")?;
        }

        if let Some(val) = var("FAST_MODE") {
            config.fast_mode = parse_flag(&val).context("FAST_MODE must be true or false")?;
        }

        if let Some(val) = var("DATA_FILE") {
            config.data_file = PathBuf::from(val);
        }

        if let Some(val) = var("MAX_WORKERS") {
            config.max_workers = val
                .trim()
                .parse()
                .context("MAX_WORKERS must be a positive integer")?;
        }

        Ok(config)
    }

    /// Validate the configuration.
    ///
    /// A missing API key is fatal: no run can start without an oracle.
    pub fn validate(&self) -> Result<()> {
        if self.api_key.trim().is_empty() {
            anyhow::bail!("ORACLE_API_KEY (or GROK_API_KEY) must be set");
        }

        if !self.api_base.starts_with("http://") && !self.api_base.starts_with("https://") {
            anyhow::bail!("ORACLE_BASE_URL must be an http(s) URL, got: {}", self.api_base);
        }

        for (role, model) in [
            ("PLANNER_MODEL", &self.models.planner),
            ("ANALYZER_MODEL", &self.models.analyzer),
            ("REFINER_MODEL", &self.models.refiner),
            ("SUMMARIZER_MODEL", &self.models.summarizer),
        ] {
            if model.trim().is_empty() {
                anyhow::bail!("{} cannot be empty", role);
            }
        }

        if self.max_iterations > 10 {
            anyhow::bail!("MAX_ITERATIONS must be at most 10, got: {}", self.max_iterations);
        }

        if self.max_replans > 10 {
            anyhow::bail!("MAX_REPLANS must be at most 10, got: {}", self.max_replans);
        }

        if !(1..=32).contains(&self.max_workers) {
            anyhow::bail!("MAX_WORKERS must be between 1 and 32, got: {}", self.max_workers);
        }

        Ok(())
    }

    /// Workflow thresholds: library defaults plus the ceilings set here
    pub fn workflow(&self) -> WorkflowConfig {
        WorkflowConfig::default()
            .with_max_iterations(self.max_iterations)
            .with_max_replans(self.max_replans)
            .with_fast_mode(self.fast_mode)
    }

    /// True when every role still uses the default model
    pub fn uses_default_models(&self) -> bool {
        self.models == ModelSelection::uniform(DEFAULT_MODEL)
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
