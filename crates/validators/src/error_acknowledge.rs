use gatekeeper_llm::{AgentConfig, ModelTier};
use gatekeeper_transcript::format_for_llm;

use crate::context::ValidatorContext;
use crate::parse::{GateOk, parse_ok_or};
use crate::verdict::Verdict;

const AGENT_NAME: &str = "error-acknowledge";

const SYSTEM_PROMPT: &str = "You check whether the assistant has acknowledged a tool error visible in the \
transcript before moving on, rather than silently retrying or ignoring it. Reply with exactly one line: \
OK, or BLOCK: <short reason>.";

const FORMAT_REMINDER: &str = "Reply with exactly one line: OK, or BLOCK: <short reason>.";

/// §4.5 Error-Acknowledge. `needs_llm_check` and `suggested_alternative`
/// are computed by the caller from the deterministic error pre-filter
/// (`gatekeeper_transcript::error_prefilter`) and a conservative scan of
/// recent tool results for an already-suggested alternative tool name —
/// both orchestrator-level concerns this validator only consumes.
///
/// On `NeedsAppeal`, the orchestrator consults Tool-Appeal; if that
/// overturns the block, the orchestrator (not this function) calls
/// `ctx.caches.acknowledgment.acknowledge(error_snippet)` so the same
/// error doesn't re-trigger this agent.
pub async fn check(ctx: &ValidatorContext<'_>, error_snippet: &str, needs_llm_check: bool, suggested_alternative: bool) -> Verdict {
    if !needs_llm_check {
        return Verdict::Continue;
    }
    if ctx.collected.user.is_empty() || (ctx.collected.assistant.is_empty() && ctx.collected.tool_result.is_empty()) {
        return Verdict::Continue;
    }
    if suggested_alternative {
        return Verdict::Continue;
    }

    let Some(user_message) = ctx.collected.user.last() else {
        return Verdict::Continue;
    };
    if ctx.caches.rewind.is_message_checked_by_agent(AGENT_NAME, &user_message.content) {
        return Verdict::Continue;
    }
    let _ = ctx.caches.rewind.mark_message_checked_by_agent(AGENT_NAME, &user_message.content);

    if ctx.caches.acknowledgment.is_acknowledged(error_snippet) {
        return Verdict::Allow;
    }

    let prompt = build_prompt(ctx, error_snippet);
    let config = AgentConfig::direct(AGENT_NAME, ModelTier::Small, SYSTEM_PROMPT);
    let result = ctx
        .llm
        .run_agent_with_retry(&config, &prompt, is_well_formed, FORMAT_REMINDER, ctx.max_format_retries)
        .await;

    if !result.success {
        return Verdict::NeedsAppeal(format!("Malformed response: {}", result.text));
    }

    match parse_ok_or(&result.text, "BLOCK") {
        GateOk::Ok => Verdict::Allow,
        GateOk::Blocked(reason) => Verdict::NeedsAppeal(reason),
    }
}

fn is_well_formed(text: &str) -> bool {
    let trimmed = text.trim();
    trimmed.eq_ignore_ascii_case("OK") || trimmed.to_uppercase().starts_with("BLOCK")
}

fn build_prompt(ctx: &ValidatorContext<'_>, error_snippet: &str) -> String {
    format!(
        "Tool about to run: {}\nInput: {}\nMost recent error seen:\n{error_snippet}\n\nRecent conversation:\n{}",
        ctx.tool_name,
        ctx.tool_input,
        format_for_llm(ctx.collected)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn well_formed_accepts_both_grammars() {
        assert!(is_well_formed("OK"));
        assert!(is_well_formed("BLOCK: error not mentioned"));
        assert!(!is_well_formed("looks fine"));
    }
}
