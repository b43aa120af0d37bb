use gatekeeper_llm::{AgentConfig, ModelTier};
use gatekeeper_patterns::{QuotePreference, StyleFindingKind, detect_emoji_additions, style_diff};
use gatekeeper_transcript::format_for_llm;

use crate::context::ValidatorContext;
use crate::parse::{GateOk, parse_ok_or};
use crate::verdict::Verdict;

const AGENT_NAME: &str = "style-drift";

const SYSTEM_PROMPT: &str = "You check whether an edit to a trusted file introduces a gratuitous style \
change the user never asked for — reformatting untouched lines, rewriting working code for no functional \
reason, or similar churn. Style highlights below are already known facts; weigh them alongside the rest of \
the diff. Reply with exactly one line: OK, or BLOCK: <short reason>.";

const FORMAT_REMINDER: &str = "Reply with exactly one line: OK, or BLOCK: <short reason>.";

/// §4.5 Style-Drift. Runs only for file-edit operations on trusted paths —
/// the orchestrator decides trust; this validator only compares the old and
/// new fragments it's handed. Fast paths short-circuit before any LLM call.
pub async fn check(ctx: &ValidatorContext<'_>, old_text: &str, new_text: &str, quote_preference: QuotePreference) -> Verdict {
    if old_text.is_empty() {
        return Verdict::Allow; // pure insertion of new code
    }
    if new_text.is_empty() {
        return Verdict::Allow; // pure deletion
    }

    let emoji_added = detect_emoji_additions(old_text, new_text);
    if !emoji_added.is_empty() {
        return Verdict::NeedsAppeal(format!("added emoji not requested by the user: {emoji_added:?}"));
    }

    let findings = style_diff(old_text, new_text, quote_preference);
    let quote_finding = findings.iter().find(|f| f.kind == StyleFindingKind::Quote);

    match quote_finding {
        Some(finding) if finding.violates_preference => {
            return Verdict::NeedsAppeal(format!(
                "quote change ({}) violates project preference",
                finding.detail
            ));
        }
        Some(finding) if finding.matches_preference => return Verdict::Allow,
        _ => {}
    }

    if findings.is_empty() {
        return Verdict::Allow;
    }

    let prompt = build_prompt(ctx, old_text, new_text, &findings);
    let config = AgentConfig::direct(AGENT_NAME, ModelTier::Nano, SYSTEM_PROMPT);
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

fn build_prompt(
    ctx: &ValidatorContext<'_>,
    old_text: &str,
    new_text: &str,
    findings: &[gatekeeper_patterns::StyleFinding],
) -> String {
    let mut prompt = format!("Old:\n{old_text}\n\nNew:\n{new_text}\n");
    if !findings.is_empty() {
        prompt.push_str("\nStyle findings:\n");
        for finding in findings {
            prompt.push_str(&format!("- {:?}: {}\n", finding.kind, finding.detail));
        }
    }
    prompt.push_str("\nConversation so far:\n");
    prompt.push_str(&format_for_llm(ctx.collected));
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn is_well_formed_accepts_both_grammars() {
        assert!(is_well_formed("OK"));
        assert!(is_well_formed("BLOCK: unrequested reformat"));
        assert!(!is_well_formed("looks fine"));
    }
}
