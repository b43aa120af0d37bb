use gatekeeper_llm::{AgentConfig, ModelTier};
use gatekeeper_patterns::content_rule_violations;
use gatekeeper_transcript::format_for_llm;

use crate::context::ValidatorContext;
use crate::parse::{GateOk, parse_ok_or};
use crate::verdict::Verdict;

const AGENT_NAME: &str = "plan-validate";

const SYSTEM_PROMPT: &str = "You check whether a plan document being written or edited stays aligned with \
what the user actually asked for in this conversation, and does not introduce scope the user never \
requested. Violation highlights below (time estimates, timeline markers) are already known problems — \
treat their presence as drift even if nothing else is wrong. Reply with exactly one line: OK, or DRIFT: \
<short reason>.";

const FORMAT_REMINDER: &str = "Reply with exactly one line: OK, or DRIFT: <short reason>.";

/// §4.5 Plan-Validate. Runs on writes/edits to a file under the assistant's
/// plans directory. `plan_text` is the proposed new contents.
pub async fn check(ctx: &ValidatorContext<'_>, plan_text: &str) -> Verdict {
    let violations = content_rule_violations(plan_text);
    let prompt = build_prompt(ctx, plan_text, &violations);

    let config = AgentConfig::direct(AGENT_NAME, ModelTier::Small, SYSTEM_PROMPT);
    let result = ctx
        .llm
        .run_agent_with_retry(&config, &prompt, is_well_formed, FORMAT_REMINDER, ctx.max_format_retries)
        .await;

    if !result.success {
        return Verdict::NeedsAppeal(format!("Malformed response: {}", result.text));
    }

    match parse_ok_or(&result.text, "DRIFT") {
        GateOk::Ok => Verdict::Allow,
        GateOk::Blocked(reason) => Verdict::NeedsAppeal(reason),
    }
}

fn is_well_formed(text: &str) -> bool {
    let trimmed = text.trim();
    trimmed.eq_ignore_ascii_case("OK") || trimmed.to_uppercase().starts_with("DRIFT")
}

fn build_prompt(ctx: &ValidatorContext<'_>, plan_text: &str, violations: &[gatekeeper_patterns::RuleViolation]) -> String {
    let mut prompt = format!("Proposed plan contents:\n{plan_text}\n");
    if !violations.is_empty() {
        prompt.push_str("\nKnown violations:\n");
        for violation in violations {
            prompt.push_str(&format!("- {}\n", violation.highlight()));
        }
    }
    prompt.push_str("\nConversation so far:\n");
    prompt.push_str(&format_for_llm(ctx.collected));
    prompt
}
