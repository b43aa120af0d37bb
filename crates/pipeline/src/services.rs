//! Process-wide singletons the orchestrator needs on every invocation. Per
//! spec.md §9 "Global singletons": the LLM client, the webhook client, and
//! the cache directory have process lifetime, constructed once in `main`
//! and threaded down by reference.

use std::path::PathBuf;

use gatekeeper_cache::{SessionCacheConfig, SessionCaches, cache_root};
use gatekeeper_config::AppConfig;
use gatekeeper_llm::{AuthMode, LlmRunner, ModelCatalog, resolve_auth};

use crate::telemetry::{self, WebhookSink};

pub struct PipelineServices {
    pub config: AppConfig,
    pub llm: LlmRunner,
    pub webhook: Box<dyn WebhookSink>,
}

impl PipelineServices {
    pub fn new(config: AppConfig) -> Self {
        let auth = resolve_auth(&config.llm.vendor_token_env, &config.llm.proxy_token_env)
            .unwrap_or_else(|| AuthMode::Vendor(String::new()));
        let catalog = ModelCatalog {
            nano: config.llm.nano_model.clone(),
            small: config.llm.small_model.clone(),
            standard: config.llm.standard_model.clone(),
        };
        let llm = LlmRunner::new(config.llm.provider_base_url.clone(), auth, catalog, config.llm.request_timeout_secs);
        let webhook = telemetry::sink_for(&config.telemetry.webhook_url);
        Self { config, llm, webhook }
    }

    fn cache_root_path(&self) -> PathBuf {
        if self.config.cache.root_override.is_empty() {
            cache_root().to_path_buf()
        } else {
            PathBuf::from(&self.config.cache.root_override)
        }
    }

    /// Construct the five session-scoped caches for this invocation. Session
    /// identity is the transcript path, compared only for string equality
    /// per spec.md §9's open-question resolution.
    pub fn session_caches(&self, session_id: &str) -> SessionCaches {
        let cache_config = SessionCacheConfig {
            acknowledgment_ttl_secs: self.config.cache.acknowledgment_ttl_secs as i64,
            acknowledgment_max_entries: self.config.cache.acknowledgment_max_entries,
            denial_escalation_threshold: self.config.pipeline.denial_escalation_threshold,
            rewind_max_entries: self.config.cache.rewind_max_entries,
            statusline_max_entries: self.config.cache.statusline_max_entries,
            statusline_ttl_secs: self.config.cache.statusline_ttl_secs as i64,
        };
        SessionCaches::new(&self.cache_root_path(), session_id, &cache_config)
    }
}
