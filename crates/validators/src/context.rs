use std::path::Path;

use gatekeeper_cache::SessionCaches;
use gatekeeper_llm::LlmRunner;
use gatekeeper_transcript::CollectedView;
use serde_json::Value;

/// Shared read-only context every validator is handed. A plain struct
/// rather than a trait so the pipeline can construct it once per hook
/// invocation and pass the same borrow to each ordered step.
pub struct ValidatorContext<'a> {
    pub tool_name: &'a str,
    pub tool_input: &'a Value,
    pub cwd: &'a Path,
    pub collected: &'a CollectedView,
    pub caches: &'a SessionCaches,
    pub llm: &'a LlmRunner,
    pub project_rules: Option<&'a str>,
    pub blacklist_highlights: &'a [String],
    pub max_format_retries: u32,
}

/// Optional slash-command context, used by Tool-Appeal to recognize an
/// explicit user-issued command as grounds for an overturn.
pub struct SlashCommandHint<'a> {
    pub command_name: &'a str,
    pub allowed_tools: Option<&'a [String]>,
}
