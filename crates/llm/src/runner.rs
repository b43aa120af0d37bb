use std::path::PathBuf;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use crate::clients::{ProviderReply, ProxyClient, VendorClient};
use crate::message::ChatMessage;
use crate::tier::{AuthMode, ModelCatalog, ModelTier};
use crate::tools::{self, ExtraTool};
use crate::usage::Usage;

const SDK_DEFAULT_MAX_TURNS: u32 = 6;

/// `Direct` sends one request with no tools. `Sdk` runs a bounded
/// tool-calling loop restricted to `Read`/`Glob`/`Grep` plus whatever
/// `AgentConfig::extra_tools` opts into — never shell, never write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    Direct,
    Sdk,
}

#[derive(Clone)]
pub struct AgentConfig {
    pub name: &'static str,
    pub tier: ModelTier,
    pub mode: ExecutionMode,
    pub system_prompt: String,
    pub max_tokens: u32,
    pub max_turns: Option<u32>,
    pub extra_tools: Vec<ExtraTool>,
    pub working_dir: Option<PathBuf>,
}

impl AgentConfig {
    pub fn direct(name: &'static str, tier: ModelTier, system_prompt: impl Into<String>) -> Self {
        Self {
            name,
            tier,
            mode: ExecutionMode::Direct,
            system_prompt: system_prompt.into(),
            max_tokens: 1024,
            max_turns: None,
            extra_tools: vec![],
            working_dir: None,
        }
    }

    pub fn sdk(name: &'static str, tier: ModelTier, system_prompt: impl Into<String>, working_dir: PathBuf) -> Self {
        Self {
            name,
            tier,
            mode: ExecutionMode::Sdk,
            system_prompt: into_sdk_system_prompt(system_prompt.into()),
            max_tokens: 1024,
            max_turns: Some(SDK_DEFAULT_MAX_TURNS),
            extra_tools: vec![],
            working_dir: Some(working_dir),
        }
    }
}

fn into_sdk_system_prompt(base: String) -> String {
    format!(
        "{base}\n\nYou have access to read-only tools: Read, Glob, Grep. \
         You may not run shell commands and you may not write or edit files; \
         use these tools only to gather the context you need, then answer."
    )
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunResult {
    pub text: String,
    pub latency: Duration,
    pub tier_name: String,
    pub model: String,
    pub success: bool,
    pub error_count: u32,
    pub usage: Option<Usage>,
    pub cost: Option<f64>,
    pub generation_id: Option<String>,
}

/// Runs agents against either a vendor-native or OpenRouter-style proxy
/// endpoint, normalizing both into one `RunResult` contract. Constructed
/// once per process and treated as a process-lifetime singleton by
/// callers, mirroring the cache directory and statusline buffer.
pub struct LlmRunner {
    vendor: VendorClient,
    proxy: ProxyClient,
    base_url: String,
    auth: AuthMode,
    catalog: ModelCatalog,
}

impl LlmRunner {
    pub fn new(base_url: impl Into<String>, auth: AuthMode, catalog: ModelCatalog, request_timeout_secs: u64) -> Self {
        let timeout = Duration::from_secs(request_timeout_secs);
        Self { vendor: VendorClient::new(timeout), proxy: ProxyClient::new(timeout), base_url: base_url.into(), auth, catalog }
    }

    /// Run one agent call. Never returns `Err` for a provider failure — a
    /// failed call comes back as `success: false` with `[DIRECT ERROR] …` /
    /// `[SDK ERROR] …` text, matching spec.md's "errors are returned as
    /// strings, not thrown" contract. Only a bug in how the caller
    /// constructed `AgentConfig` would be a logic error, and there's
    /// nothing fallible left to surface as `Result::Err` once auth and
    /// model are resolved.
    pub async fn run_agent(&self, config: &AgentConfig, input: &str) -> RunResult {
        let model = self.catalog.resolve(config.tier).to_string();
        let started = Instant::now();

        let result = match config.mode {
            ExecutionMode::Direct => self.run_direct(config, &model, input).await,
            ExecutionMode::Sdk => self.run_sdk(config, &model, input).await,
        };

        RunResult {
            latency: started.elapsed(),
            tier_name: tier_name(config.tier).to_string(),
            model,
            ..result
        }
    }

    /// Issue up to `max_retries` follow-up prompts when `format_validator`
    /// rejects the reply's shape, reprompting with `format_reminder`.
    pub async fn run_agent_with_retry(
        &self,
        config: &AgentConfig,
        input: &str,
        format_validator: impl Fn(&str) -> bool,
        format_reminder: &str,
        max_retries: u32,
    ) -> RunResult {
        let mut attempt_input = input.to_string();
        let mut last = self.run_agent(config, &attempt_input).await;

        let mut retries = 0;
        while retries < max_retries && last.success && !format_validator(&last.text) {
            attempt_input = format!("{attempt_input}\n\n{format_reminder}\n\nYour previous reply was:\n{}", last.text);
            last = self.run_agent(config, &attempt_input).await;
            last.error_count += retries + 1;
            retries += 1;
        }

        last
    }

    async fn run_direct(&self, config: &AgentConfig, model: &str, input: &str) -> RunResult {
        let messages = vec![ChatMessage::user(input)];
        let reply = self.dispatch(model, &config.system_prompt, &messages, config.max_tokens, None).await;

        match reply.error {
            Some(error) => failed_result(format!("[DIRECT ERROR] {error}")),
            None => RunResult {
                text: reply.content,
                latency: Duration::ZERO,
                tier_name: String::new(),
                model: String::new(),
                success: true,
                error_count: 0,
                usage: reply.usage,
                cost: None,
                generation_id: reply.generation_id,
            },
        }
    }

    async fn run_sdk(&self, config: &AgentConfig, model: &str, input: &str) -> RunResult {
        let Some(working_dir) = config.working_dir.clone() else {
            return failed_result("[SDK ERROR] sdk mode requires a working directory".to_string());
        };
        let max_turns = config.max_turns.unwrap_or(SDK_DEFAULT_MAX_TURNS);
        let schemas = tools::tool_schemas(&config.extra_tools);

        let mut messages = vec![ChatMessage::user(input)];
        let mut last_usage = None;
        let mut last_generation_id = None;

        for _ in 0..max_turns {
            let reply = self.dispatch(model, &config.system_prompt, &messages, config.max_tokens, Some(&schemas)).await;
            let Some(error) = reply.error else {
                last_usage = reply.usage.or(last_usage);
                last_generation_id = reply.generation_id.or(last_generation_id);

                if reply.tool_calls.is_empty() {
                    return RunResult {
                        text: reply.content,
                        latency: Duration::ZERO,
                        tier_name: String::new(),
                        model: String::new(),
                        success: true,
                        error_count: 0,
                        usage: last_usage,
                        cost: None,
                        generation_id: last_generation_id,
                    };
                }

                messages.push(ChatMessage::assistant_tool_calls(reply.tool_calls.clone()));
                for call in &reply.tool_calls {
                    let output = tools::run_tool(&call.function.name, &call.function.arguments, &working_dir);
                    messages.push(ChatMessage::tool_result(call.id.clone(), output));
                }
                continue;
            };

            return failed_result(format!("[SDK ERROR] {error}"));
        }

        failed_result(format!("[SDK ERROR] exceeded max_turns ({max_turns}) without a final answer"))
    }

    async fn dispatch(
        &self,
        model: &str,
        system_prompt: &str,
        messages: &[ChatMessage],
        max_tokens: u32,
        tools: Option<&serde_json::Value>,
    ) -> ProviderReply {
        match &self.auth {
            AuthMode::Vendor(key) => self.vendor.complete(&self.base_url, key, model, system_prompt, messages, max_tokens, tools).await,
            AuthMode::Proxy(key) => self.proxy.complete(&self.base_url, key, model, system_prompt, messages, max_tokens, tools).await,
        }
    }
}

fn failed_result(text: String) -> RunResult {
    RunResult {
        text,
        latency: Duration::ZERO,
        tier_name: String::new(),
        model: String::new(),
        success: false,
        error_count: 1,
        usage: None,
        cost: None,
        generation_id: None,
    }
}

fn tier_name(tier: ModelTier) -> &'static str {
    match tier {
        ModelTier::Nano => "nano",
        ModelTier::Small => "small",
        ModelTier::Standard => "standard",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> ModelCatalog {
        ModelCatalog { nano: "haiku".into(), small: "haiku".into(), standard: "sonnet".into() }
    }

    #[test]
    fn direct_agent_config_has_no_tools() {
        let config = AgentConfig::direct("tool-approve", ModelTier::Small, "approve or deny");
        assert_eq!(config.mode, ExecutionMode::Direct);
        assert!(config.extra_tools.is_empty());
        assert!(config.working_dir.is_none());
    }

    #[test]
    fn sdk_agent_config_augments_system_prompt() {
        let config = AgentConfig::sdk("plan-validate", ModelTier::Standard, "check the plan", PathBuf::from("/tmp"));
        assert!(config.system_prompt.contains("Read, Glob, Grep"));
        assert!(config.system_prompt.contains("may not run shell commands"));
    }

    #[tokio::test]
    async fn run_agent_reports_direct_error_when_no_credentials_resolve() {
        let runner = LlmRunner::new(
            "https://example.invalid",
            AuthMode::Vendor("dummy-key".to_string()),
            catalog(),
            1,
        );
        let config = AgentConfig::direct("tool-approve", ModelTier::Small, "approve or deny");
        let result = runner.run_agent(&config, "ls -la").await;
        assert!(!result.success);
        assert!(result.text.starts_with("[DIRECT ERROR]"));
    }
}
