use gatekeeper_llm::{AgentConfig, ModelTier};
use gatekeeper_transcript::format_for_llm;

use crate::context::ValidatorContext;
use crate::parse::{GateOk, parse_ok_or};
use crate::verdict::{SystemMessage, Verdict};

const AGENT_NAME: &str = "intent-validate";

const SYSTEM_PROMPT: &str = "You are an off-topic detector. Compare the assistant's last response against \
the user's whole message history in this conversation and decide whether the response has drifted away \
from what the user actually asked for. Reply with exactly one line: OK, or INTERVENE: <short feedback for \
the assistant>.";

const FORMAT_REMINDER: &str = "Reply with exactly one line: OK, or INTERVENE: <short feedback for the assistant>.";

/// §4.5 Intent-Validate. Runs at stop time; short-circuits the same way
/// Response-Align's stop variant does when there's no assistant turn to
/// judge against.
pub async fn check(ctx: &ValidatorContext<'_>) -> Verdict {
    if ctx.collected.is_subagent_view() {
        return Verdict::Continue;
    }
    let Some(last_assistant) = ctx.collected.assistant.last() else {
        return Verdict::Continue;
    };
    if ctx.collected.user.is_empty() {
        return Verdict::Continue;
    }

    let prompt = build_prompt(ctx, &last_assistant.content);
    let config = AgentConfig::direct(AGENT_NAME, ModelTier::Small, SYSTEM_PROMPT);
    let result = ctx
        .llm
        .run_agent_with_retry(&config, &prompt, is_well_formed, FORMAT_REMINDER, ctx.max_format_retries)
        .await;

    if !result.success {
        return Verdict::Continue; // stop-hook feedback is advisory, never blocks the host
    }

    match parse_ok_or(&result.text, "INTERVENE") {
        GateOk::Ok => Verdict::Continue,
        GateOk::Blocked(feedback) => Verdict::SynthesizeFeedback(SystemMessage::autogenerated(feedback)),
    }
}

fn is_well_formed(text: &str) -> bool {
    let trimmed = text.trim();
    trimmed.eq_ignore_ascii_case("OK") || trimmed.to_uppercase().starts_with("INTERVENE")
}

fn build_prompt(ctx: &ValidatorContext<'_>, last_assistant_text: &str) -> String {
    format!(
        "Assistant's last response:\n{last_assistant_text}\n\nFull conversation:\n{}",
        format_for_llm(ctx.collected)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn well_formed_accepts_both_grammars() {
        assert!(is_well_formed("OK"));
        assert!(is_well_formed("INTERVENE: this ignores the user's actual request"));
        assert!(!is_well_formed("looks fine"));
    }
}
