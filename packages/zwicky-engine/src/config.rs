use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;

use crate::error::{Result, ZwickyError};

pub const DEFAULT_GATEWAY_URL: &str = "http://localhost:3001/api/ai-gateway";
pub const DEFAULT_MODEL: &str = "anthropic/claude-sonnet-4";

pub const GATEWAY_URL_ENV: &str = "ZWICKY_GATEWAY_URL";
pub const MODEL_ENV: &str = "ZWICKY_MODEL";

/// Per-template `max_tokens` budgets.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct TokenBudgets {
    pub attributes: u32,
    pub idea: u32,
    pub expansion: u32,
    pub variation: u32,
}

impl Default for TokenBudgets {
    fn default() -> Self {
        Self {
            attributes: 1500,
            idea: 300,
            expansion: 1200,
            variation: 350,
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct EngineConfig {
    pub gateway_url: String,
    pub model: String,
    pub budgets: TokenBudgets,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            gateway_url: DEFAULT_GATEWAY_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            budgets: TokenBudgets::default(),
        }
    }
}

impl EngineConfig {
    pub fn config_path(work_dir: &Path) -> PathBuf {
        work_dir.join(".zwicky").join("config.json")
    }

    /// Defaults, then `.zwicky/config.json` under `work_dir` if present, then
    /// the process environment.
    pub async fn load(work_dir: &Path) -> Result<Self> {
        let config = Self::load_file(work_dir).await?.unwrap_or_default();
        Ok(config.with_env(|key| std::env::var(key).ok()))
    }

    pub async fn load_file(work_dir: &Path) -> Result<Option<Self>> {
        let path = Self::config_path(work_dir);
        if !path.exists() {
            return Ok(None);
        }
        debug!(path = %path.display(), "loading engine config");
        let content = fs::read_to_string(&path).await?;
        let config: EngineConfig = serde_json::from_str(&content).map_err(|e| {
            ZwickyError::Config(format!("{}: {}", path.display(), e))
        })?;
        Ok(Some(config))
    }

    /// Applies `ZWICKY_GATEWAY_URL` / `ZWICKY_MODEL` from the given lookup.
    pub fn with_env<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(GATEWAY_URL_ENV).filter(|v| !v.is_empty()) {
            self.gateway_url = url;
        }
        if let Some(model) = lookup(MODEL_ENV).filter(|v| !v.is_empty()) {
            self.model = model;
        }
        self
    }

    pub async fn save(&self, work_dir: &Path) -> Result<()> {
        let path = Self::config_path(work_dir);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        let content = serde_json::to_string_pretty(self).map_err(ZwickyError::serialize)?;
        fs::write(&path, content).await?;
        Ok(())
    }
}
