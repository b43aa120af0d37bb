use std::env;
use std::fs;
use std::path::Path;

use anyhow::Result;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    /// Preferred provider auth env var, checked before the proxy fallback.
    pub vendor_token_env: String,
    /// Third-party router proxy auth env var (e.g. OpenRouter).
    pub proxy_token_env: String,
    pub provider_base_url: String,
    pub nano_model: String,
    pub small_model: String,
    pub standard_model: String,
    pub request_timeout_secs: u64,
    pub max_format_retries: u32,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            vendor_token_env: "ANTHROPIC_API_KEY".to_string(),
            proxy_token_env: "OPENROUTER_API_KEY".to_string(),
            provider_base_url: "https://api.anthropic.com".to_string(),
            nano_model: "claude-haiku".to_string(),
            small_model: "claude-haiku".to_string(),
            standard_model: "claude-sonnet".to_string(),
            request_timeout_secs: 20,
            max_format_retries: 2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSection {
    /// Override for the cache directory root. Empty means
    /// `<tmp>/gatekeeper/<session-hash>`.
    pub root_override: String,
    pub acknowledgment_ttl_secs: u64,
    pub acknowledgment_max_entries: usize,
    pub denial_ttl_secs: u64,
    pub rewind_max_entries: usize,
    pub statusline_max_entries: usize,
    pub statusline_ttl_secs: u64,
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            root_override: String::new(),
            acknowledgment_ttl_secs: 3600,
            acknowledgment_max_entries: 50,
            denial_ttl_secs: 1800,
            rewind_max_entries: 100,
            statusline_max_entries: 30,
            statusline_ttl_secs: 600,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineSection {
    /// Number of repeated workaround denials before the "CRITICAL" escalation
    /// prefix is added to the reason text.
    pub denial_escalation_threshold: u32,
    /// Maximum raw entries from the tail an error-acknowledge user quota may
    /// look back before being considered stale.
    pub error_ack_max_stale: usize,
    pub lazy_validation_enabled: bool,
}

impl Default for PipelineSection {
    fn default() -> Self {
        Self {
            denial_escalation_threshold: 3,
            error_ack_max_stale: 6,
            lazy_validation_enabled: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetrySection {
    pub log_level: String,
    /// Optional webhook URL for out-of-band decision logging. Empty disables it.
    pub webhook_url: String,
}

impl Default for TelemetrySection {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            webhook_url: String::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub llm: LlmSection,
    pub cache: CacheSection,
    pub pipeline: PipelineSection,
    pub telemetry: TelemetrySection,
}

impl AppConfig {
    /// Load from `path` if present, falling back to defaults; a missing or
    /// unparsable file is not an error — the sidecar must run with zero
    /// configuration.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let mut config = Self::default();
        if let Ok(raw) = fs::read_to_string(path) {
            config = toml::from_str(&raw)?;
        }
        config.apply_env_overrides();
        Ok(config)
    }

    /// Resolve the config file path from `CLAUDE_PROJECT_DIR` (or the cwd)
    /// and load it, applying environment overrides.
    pub fn load_default() -> Result<Self> {
        let project_dir = env::var("CLAUDE_PROJECT_DIR").unwrap_or_else(|_| ".".to_string());
        Self::load_from(Path::new(&project_dir).join(".gatekeeper.toml"))
    }

    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<()> {
        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent)?;
        }
        let rendered = toml::to_string_pretty(self)?;
        fs::write(path, rendered)?;
        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(url) = env::var("GATEKEEPER_PROVIDER_BASE_URL") {
            if !url.is_empty() {
                self.llm.provider_base_url = url;
            }
        }
        if let Ok(level) = env::var("RUST_LOG") {
            if !level.is_empty() {
                self.telemetry.log_level = level;
            }
        }
        if let Ok(webhook) = env::var("GATEKEEPER_WEBHOOK_URL") {
            if !webhook.is_empty() {
                self.telemetry.webhook_url = webhook;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_sane_values() {
        let config = AppConfig::default();
        assert_eq!(config.pipeline.denial_escalation_threshold, 3);
        assert!(config.pipeline.lazy_validation_enabled);
        assert_eq!(config.telemetry.log_level, "info");
    }

    #[test]
    fn load_from_missing_file_returns_defaults() {
        let config = AppConfig::load_from("/nonexistent/path/.gatekeeper.toml").unwrap();
        assert_eq!(config.llm.standard_model, "claude-sonnet");
    }

    #[test]
    fn load_from_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".gatekeeper.toml");
        fs::write(
            &path,
            r#"
            [pipeline]
            denial_escalation_threshold = 5
            "#,
        )
        .unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.pipeline.denial_escalation_threshold, 5);
        // Unspecified sections still fall back to their defaults.
        assert_eq!(config.cache.rewind_max_entries, 100);
    }

    #[test]
    fn save_and_reload_roundtrips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(".gatekeeper.toml");
        let mut config = AppConfig::default();
        config.pipeline.error_ack_max_stale = 9;
        config.save_to(&path).unwrap();

        let reloaded = AppConfig::load_from(&path).unwrap();
        assert_eq!(reloaded.pipeline.error_ack_max_stale, 9);
    }
}
