use gatekeeper_llm::{AgentConfig, ModelTier};
use gatekeeper_transcript::format_for_llm;

use crate::context::ValidatorContext;
use crate::parse::{GateReply, parse_gate_reply};
use crate::verdict::Verdict;

const AGENT_NAME: &str = "question-validate";

const SYSTEM_PROMPT: &str = "You check a structured question the assistant is about to ask the user via \
its question tool. Approve only if the question references something the user could actually have seen in \
this conversation, has not already been answered earlier in the transcript, and does not violate workflow \
rules — for example asking an implementation question while the assistant is still in plan mode, when \
implementation detail belongs after plan approval. Reply with exactly one line: APPROVE, or DENY: <short \
reason>.";

const FORMAT_REMINDER: &str = "Reply with exactly one line: APPROVE, or DENY: <short reason>.";

/// §4.5 Question-Validate. Runs only when the host is about to invoke the
/// structured `AskUserQuestion` tool itself; `question_text` and
/// `options` are the tool's proposed arguments. `in_plan_mode` lets the
/// prompt flag the plan-mode workflow-violation case the spec calls out.
pub async fn check(ctx: &ValidatorContext<'_>, question_text: &str, options: &[String], in_plan_mode: bool) -> Verdict {
    let prompt = build_prompt(ctx, question_text, options, in_plan_mode);
    let config = AgentConfig::direct(AGENT_NAME, ModelTier::Small, SYSTEM_PROMPT);
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

fn build_prompt(ctx: &ValidatorContext<'_>, question_text: &str, options: &[String], in_plan_mode: bool) -> String {
    let mut prompt = format!("Proposed question: {question_text}\n");
    if !options.is_empty() {
        prompt.push_str(&format!("Options offered: {}\n", options.join(", ")));
    }
    if in_plan_mode {
        prompt.push_str("\nNote: the assistant is currently in plan mode.\n");
    }
    prompt.push_str("\nConversation so far:\n");
    prompt.push_str(&format_for_llm(ctx.collected));
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn well_formed_accepts_both_grammars() {
        assert!(is_well_formed("APPROVE"));
        assert!(is_well_formed("DENY: already asked and answered above"));
        assert!(!is_well_formed("seems reasonable"));
    }
}
