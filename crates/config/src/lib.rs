//! TOML configuration for the Stride driver.
//!
//! Every section is `#[serde(default)]` so a partial (or absent) file always
//! yields a usable config.  The LLM credential itself is never stored here —
//! it comes from the environment (`OPENROUTER_API_KEY`).

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Name the coach refers to itself by in the system prompt.
    pub name: String,
    pub user_name: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: "Stride".to_string(),
            user_name: String::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    pub provider: String,
    pub model: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "openrouter".to_string(),
            model: "openai/gpt-4o-mini".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// `"redb"` (durable, default) or `"memory"` (ephemeral).
    pub backend: String,
    pub path: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: "redb".to_string(),
            path: ".stride/stride.redb".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StrideConfig {
    pub agent: AgentConfig,
    pub llm: LlmConfig,
    pub store: StoreConfig,
}

impl StrideConfig {
    /// Load from `path`, falling back to defaults when the file is missing.
    /// A present-but-malformed file is an error, not a silent default.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading config at {}", path.display()))?;
        toml::from_str(&raw).with_context(|| format!("parsing config at {}", path.display()))
    }

    /// Apply `STRIDE_*` environment overrides on top of the file values.
    /// Empty variables are ignored.
    pub fn with_env_overrides(mut self) -> Self {
        let override_from = |target: &mut String, var: &str| {
            if let Ok(value) = std::env::var(var) {
                let value = value.trim();
                if !value.is_empty() {
                    *target = value.to_string();
                }
            }
        };
        override_from(&mut self.llm.provider, "STRIDE_PROVIDER");
        override_from(&mut self.llm.model, "STRIDE_MODEL");
        override_from(&mut self.store.backend, "STRIDE_STORE_BACKEND");
        override_from(&mut self.store.path, "STRIDE_STORE_PATH");
        self
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let raw = toml::to_string_pretty(self).context("serializing config")?;
        fs::write(path, raw).with_context(|| format!("writing config to {}", path.display()))
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = StrideConfig::load_or_default(dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.agent.name, "Stride");
        assert_eq!(config.llm.provider, "openrouter");
        assert_eq!(config.store.backend, "redb");
    }

    #[test]
    fn partial_file_fills_remaining_defaults() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("stride.toml");
        fs::write(&path, "[store]\nbackend = \"memory\"\n").unwrap();
        let config = StrideConfig::load_or_default(&path).unwrap();
        assert_eq!(config.store.backend, "memory");
        assert_eq!(config.llm.model, "openai/gpt-4o-mini");
    }

    #[test]
    fn malformed_file_is_an_error() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("broken.toml");
        fs::write(&path, "store = [unclosed").unwrap();
        assert!(StrideConfig::load_or_default(&path).is_err());
    }

    #[test]
    fn env_overrides_replace_file_values() {
        std::env::set_var("STRIDE_MODEL", "anthropic/claude-sonnet-4");
        std::env::set_var("STRIDE_STORE_BACKEND", "");
        let config = StrideConfig::default().with_env_overrides();
        assert_eq!(config.llm.model, "anthropic/claude-sonnet-4");
        // Empty variable leaves the default in place.
        assert_eq!(config.store.backend, "redb");
        std::env::remove_var("STRIDE_MODEL");
        std::env::remove_var("STRIDE_STORE_BACKEND");
    }

    #[test]
    fn save_then_load_roundtrip() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("nested/dir/stride.toml");
        let mut config = StrideConfig::default();
        config.agent.user_name = "Sam".to_string();
        config.save(&path).unwrap();
        let loaded = StrideConfig::load_or_default(&path).unwrap();
        assert_eq!(loaded.agent.user_name, "Sam");
    }
}
