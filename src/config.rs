//! Configuration loading from TOML with environment variable overrides.
//!
//! Reads `config.toml` (optional; every field has a default) and then
//! applies the plain environment variables the collector has always
//! honoured: `API_BASE_URL`, `LEAGUE_ID`, `SEASONS`, `RESOURCES`,
//! `CACHE_DIR`, `OUTPUT_DIR`. The API key itself is referenced by env-var
//! name and resolved at runtime.

use anyhow::{Context, Result};
use secrecy::SecretString;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::engine::budget::BudgetConfig;
use crate::engine::planner::PlannerConfig;
use crate::types::Resource;

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub api: ApiConfig,
    pub collection: CollectionConfig,
    pub budget: BudgetSection,
    pub storage: StorageConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub api_key_env: String,
    pub timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: crate::upstream::api_sports::DEFAULT_BASE_URL.to_string(),
            api_key_env: "API_KEY".to_string(),
            timeout_secs: 10,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct CollectionConfig {
    pub leagues: Vec<u32>,
    pub seasons: Vec<u16>,
    pub resources: Vec<Resource>,
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            leagues: vec![71],
            seasons: vec![2022, 2023, 2024],
            resources: Resource::ALL.to_vec(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct BudgetSection {
    pub per_minute: u32,
    pub per_day: u32,
    pub pacing_ms: u64,
    pub max_minute_retries: u32,
}

impl Default for BudgetSection {
    fn default() -> Self {
        let budget = BudgetConfig::default();
        Self {
            per_minute: budget.per_minute,
            per_day: budget.per_day,
            pacing_ms: budget.pacing.as_millis() as u64,
            max_minute_retries: PlannerConfig::default().max_minute_retries,
        }
    }
}

impl BudgetSection {
    pub fn budget_config(&self) -> BudgetConfig {
        BudgetConfig {
            per_minute: self.per_minute,
            per_day: self.per_day,
            pacing: Duration::from_millis(self.pacing_ms),
        }
    }

    pub fn planner_config(&self) -> PlannerConfig {
        PlannerConfig { max_minute_retries: self.max_minute_retries }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    pub cache_dir: String,
    pub output_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            cache_dir: crate::storage::DEFAULT_CACHE_DIR.to_string(),
            output_dir: "output".to_string(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        Self::parse(&contents).with_context(|| format!("Failed to parse config file: {path}"))
    }

    pub fn parse(contents: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path` if it exists, else defaults; then apply env overrides.
    pub fn load_or_default(path: &str) -> Result<Self> {
        let mut config = if Path::new(path).exists() {
            Self::load(path)?
        } else {
            Self::default()
        };
        config.apply_overrides(|name| std::env::var(name).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Apply overrides from a variable lookup (the process env in `main`).
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(url) = lookup("API_BASE_URL") {
            self.api.base_url = url;
        }
        if let Some(leagues) = lookup("LEAGUE_ID") {
            self.collection.leagues = parse_list(&leagues).context("Invalid LEAGUE_ID")?;
        }
        if let Some(seasons) = lookup("SEASONS") {
            self.collection.seasons = parse_list(&seasons).context("Invalid SEASONS")?;
        }
        if let Some(resources) = lookup("RESOURCES") {
            self.collection.resources = parse_list(&resources).context("Invalid RESOURCES")?;
        }
        if let Some(dir) = lookup("CACHE_DIR") {
            self.storage.cache_dir = dir;
        }
        if let Some(dir) = lookup("OUTPUT_DIR") {
            self.storage.output_dir = dir;
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.collection.leagues.is_empty() {
            anyhow::bail!("collection.leagues must not be empty");
        }
        if self.collection.seasons.is_empty() {
            anyhow::bail!("collection.seasons must not be empty");
        }
        if self.budget.per_minute == 0 {
            anyhow::bail!("budget.per_minute must be at least 1");
        }
        Ok(())
    }

    /// Resolve the API key from the environment.
    pub fn resolve_api_key(&self) -> Result<SecretString> {
        let key = Self::resolve_env(&self.api.api_key_env)?;
        if key.trim().is_empty() {
            anyhow::bail!("Environment variable {} is empty", self.api.api_key_env);
        }
        Ok(SecretString::new(key))
    }

    /// Resolve an environment variable name to its value.
    pub fn resolve_env(env_name: &str) -> Result<String> {
        std::env::var(env_name)
            .with_context(|| format!("Environment variable not set: {env_name}"))
    }
}

/// Parse `"2022, 2023,2024"`-style lists.
fn parse_list<T: std::str::FromStr>(raw: &str) -> Result<Vec<T>>
where
    T::Err: std::fmt::Display,
{
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.parse::<T>().map_err(|e| anyhow::anyhow!("{s:?}: {e}")))
        .collect()
}
