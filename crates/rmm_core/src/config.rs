//! Agent configuration.
//!
//! Settings come from environment variables, optionally layered on top of
//! a JSON settings file:
//!
//! | variable | field |
//! |---|---|
//! | `RMM_MODEL_PROVIDER` | `provider` (`anthropic` or `openai`) |
//! | `RMM_MODEL_ID` | `model_id` |
//! | `ANTHROPIC_API_KEY` / `OPENAI_API_KEY` | `api_key` (per provider) |
//! | `RMM_TEMPERATURE` | `temperature` |
//! | `RMM_MAX_TOKENS` | `max_tokens` |
//! | `RMM_MOCK_MODE` | `mock_mode` |
//! | `RMM_DEFAULT_CLIENT_ID` | `default_client_id` |
//! | `RMM_METRIC_TIME_RANGE` | `metric_time_range` |
//! | `RMM_REQUEST_TIMEOUT_SECS` | `request_timeout_secs` |

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{CoreError, CoreResult};

/// Model provider behind the model collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelProvider {
    Anthropic,
    #[serde(rename = "openai")]
    OpenAI,
}

impl ModelProvider {
    pub fn parse(s: &str) -> CoreResult<Self> {
        match s.trim().to_lowercase().as_str() {
            "anthropic" => Ok(Self::Anthropic),
            "openai" => Ok(Self::OpenAI),
            other => Err(CoreError::Config(format!("unknown model provider: {}", other))),
        }
    }

    pub fn default_model(&self) -> &'static str {
        match self {
            ModelProvider::Anthropic => "claude-sonnet-4-20250514",
            ModelProvider::OpenAI => "gpt-4o-mini",
        }
    }

    pub fn api_key_var(&self) -> &'static str {
        match self {
            ModelProvider::Anthropic => "ANTHROPIC_API_KEY",
            ModelProvider::OpenAI => "OPENAI_API_KEY",
        }
    }
}

/// Runtime configuration for the agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AgentConfig {
    pub provider: ModelProvider,
    pub model_id: String,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
    /// Use simulated collaborators and a canned model.
    pub mock_mode: bool,
    pub default_client_id: String,
    pub metric_time_range: String,
    pub request_timeout_secs: u64,
}

impl Default for AgentConfig {
    fn default() -> Self {
        let provider = ModelProvider::Anthropic;
        Self {
            provider,
            model_id: provider.default_model().to_string(),
            api_key: None,
            temperature: 0.3,
            max_tokens: 2048,
            mock_mode: true,
            default_client_id: "demo-client-001".to_string(),
            metric_time_range: "1h".to_string(),
            request_timeout_secs: 60,
        }
    }
}

impl AgentConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> CoreResult<Self> {
        Self::default().apply_overrides(|key| std::env::var(key).ok())
    }

    /// Load a JSON settings file, then apply environment overrides.
    pub fn from_file(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&content)?;
        debug!("Loaded settings from {:?}", path);
        config.apply_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary key lookup.
    pub fn apply_overrides<F>(mut self, lookup: F) -> CoreResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let provider_overridden = match lookup("RMM_MODEL_PROVIDER") {
            Some(provider) => {
                self.provider = ModelProvider::parse(&provider)?;
                true
            }
            None => false,
        };

        if let Some(model) = lookup("RMM_MODEL_ID").filter(|m| !m.is_empty()) {
            self.model_id = model;
        } else if provider_overridden {
            self.model_id = self.provider.default_model().to_string();
        }

        if let Some(key) = lookup(self.provider.api_key_var()).filter(|k| !k.is_empty()) {
            self.api_key = Some(key);
        }

        if let Some(value) = lookup("RMM_TEMPERATURE") {
            self.temperature = value
                .parse()
                .map_err(|_| CoreError::Config(format!("invalid RMM_TEMPERATURE: {}", value)))?;
        }

        if let Some(value) = lookup("RMM_MAX_TOKENS") {
            self.max_tokens = value
                .parse()
                .map_err(|_| CoreError::Config(format!("invalid RMM_MAX_TOKENS: {}", value)))?;
        }

        if let Some(value) = lookup("RMM_MOCK_MODE") {
            self.mock_mode = value.eq_ignore_ascii_case("true") || value == "1";
        }

        if let Some(value) = lookup("RMM_DEFAULT_CLIENT_ID").filter(|v| !v.is_empty()) {
            self.default_client_id = value;
        }

        if let Some(value) = lookup("RMM_METRIC_TIME_RANGE").filter(|v| !v.is_empty()) {
            self.metric_time_range = value;
        }

        if let Some(value) = lookup("RMM_REQUEST_TIMEOUT_SECS") {
            self.request_timeout_secs = value.parse().map_err(|_| {
                CoreError::Config(format!("invalid RMM_REQUEST_TIMEOUT_SECS: {}", value))
            })?;
        }

        self.validate()?;
        Ok(self)
    }

    /// Check value ranges.
    pub fn validate(&self) -> CoreResult<()> {
        if !(0.0..=1.0).contains(&self.temperature) {
            return Err(CoreError::Config(format!(
                "temperature must be within [0, 1], got {}",
                self.temperature
            )));
        }
        if self.max_tokens == 0 {
            return Err(CoreError::Config("max_tokens must be positive".to_string()));
        }
        if self.default_client_id.trim().is_empty() {
            return Err(CoreError::Config("default client id must not be empty".to_string()));
        }
        Ok(())
    }

    /// Live model calls need a key and mock mode switched off.
    pub fn uses_live_model(&self) -> bool {
        !self.mock_mode && self.api_key.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = AgentConfig::default();
        assert!(config.mock_mode);
        assert_eq!(config.default_client_id, "demo-client-001");
        assert_eq!(config.metric_time_range, "1h");
        assert!(!config.uses_live_model());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_overrides() {
        let config = AgentConfig::default()
            .apply_overrides(lookup(&[
                ("RMM_MODEL_PROVIDER", "openai"),
                ("OPENAI_API_KEY", "sk-test"),
                ("RMM_MOCK_MODE", "false"),
                ("RMM_TEMPERATURE", "0.7"),
            ]))
            .unwrap();

        assert_eq!(config.provider, ModelProvider::OpenAI);
        assert_eq!(config.model_id, "gpt-4o-mini");
        assert_eq!(config.api_key.as_deref(), Some("sk-test"));
        assert!((config.temperature - 0.7).abs() < f32::EPSILON);
        assert!(config.uses_live_model());
    }

    #[test]
    fn test_api_key_follows_provider() {
        let config = AgentConfig::default()
            .apply_overrides(lookup(&[("OPENAI_API_KEY", "sk-test")]))
            .unwrap();
        assert_eq!(config.provider, ModelProvider::Anthropic);
        assert!(config.api_key.is_none());
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(AgentConfig::default()
            .apply_overrides(lookup(&[("RMM_TEMPERATURE", "1.5")]))
            .is_err());
        assert!(AgentConfig::default()
            .apply_overrides(lookup(&[("RMM_MAX_TOKENS", "lots")]))
            .is_err());
        assert!(AgentConfig::default()
            .apply_overrides(lookup(&[("RMM_MODEL_PROVIDER", "bedrock")]))
            .is_err());
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"defaultClientId": "acme-01", "maxTokens": 512, "mockMode": true}}"#
        )
        .unwrap();

        let config = AgentConfig::from_file(file.path()).unwrap();
        assert_eq!(config.default_client_id, "acme-01");
        assert_eq!(config.max_tokens, 512);
        assert_eq!(config.metric_time_range, "1h");
    }
}
