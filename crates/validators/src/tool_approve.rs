use gatekeeper_llm::{AgentConfig, ModelTier};

use crate::context::ValidatorContext;
use crate::parse::{GateReply, parse_gate_reply};
use crate::verdict::Verdict;

const SYSTEM_PROMPT: &str = "You are a tool-use gatekeeper for an autonomous coding assistant. \
Given a proposed tool call, its working directory, any project rules, and a list of blacklisted \
command patterns already flagged for this call, decide whether to allow it. Reply with exactly \
one line: APPROVE, or DENY: <short reason>.";

const FORMAT_REMINDER: &str = "Reply with exactly one line: APPROVE, or DENY: <short reason>.";

/// §4.5 Tool-Approve. `lazy_mode` skips the LLM entirely (and approves)
/// when the caller passed it and the blacklist returned no highlights —
/// the pre-tool orchestrator's lazy fast path.
pub async fn check(ctx: &ValidatorContext<'_>, lazy_mode: bool) -> Verdict {
    if lazy_mode && ctx.blacklist_highlights.is_empty() {
        return Verdict::Allow;
    }

    let prompt = build_prompt(ctx);
    let config = AgentConfig::direct("tool-approve", ModelTier::Small, SYSTEM_PROMPT);
    let result = ctx
        .llm
        .run_agent_with_retry(&config, &prompt, is_well_formed, FORMAT_REMINDER, ctx.max_format_retries)
        .await;

    if !result.success {
        return Verdict::NeedsAppeal(format!("Malformed response: {}", result.text));
    }

    match parse_gate_reply(&result.text) {
        GateReply::Approve => Verdict::Allow,
        GateReply::Deny(reason) => Verdict::NeedsAppeal(reason),
    }
}

fn is_well_formed(text: &str) -> bool {
    let trimmed = text.trim();
    trimmed.eq_ignore_ascii_case("APPROVE") || trimmed.to_uppercase().starts_with("DENY")
}

fn build_prompt(ctx: &ValidatorContext<'_>) -> String {
    let mut prompt = format!(
        "Tool: {}\nInput: {}\nWorking directory: {}\n",
        ctx.tool_name,
        ctx.tool_input,
        ctx.cwd.display()
    );
    if let Some(rules) = ctx.project_rules {
        prompt.push_str(&format!("\nProject rules:\n{rules}\n"));
    }
    if !ctx.blacklist_highlights.is_empty() {
        prompt.push_str("\nFlagged patterns:\n");
        for highlight in ctx.blacklist_highlights {
            prompt.push_str(&format!("- {highlight}\n"));
        }
    }
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn well_formed_accepts_both_grammars() {
        assert!(is_well_formed("APPROVE"));
        assert!(is_well_formed("DENY: no structured alternative"));
        assert!(!is_well_formed("sounds fine to me"));
    }
}
