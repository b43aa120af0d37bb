use gatekeeper_llm::{AgentConfig, ModelTier};
use gatekeeper_patterns::{detect_plan_approval_phrasing, extract_real_question, looks_like_plain_text_question};
use gatekeeper_transcript::format_for_llm;

use crate::context::ValidatorContext;
use crate::verdict::{SystemMessage, Verdict};

const AGENT_NAME: &str = "response-align-stop";
const ACK_ONLY_MAX_LEN: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StopClassification {
    Question,
    PlanApproval,
    IgnoredError,
    Ok,
}

const CLASSIFIER_SYSTEM_PROMPT: &str = "Classify the assistant's final message in this conversation into \
exactly one category: QUESTION (it asks the user something in plain text instead of using a structured tool), \
PLAN_APPROVAL (it describes a plan and asks the user to approve it in plain text instead of using the \
plan-exit tool), IGNORED_ERROR (prior feedback asked the assistant to address something and it did not), or \
OK (none of the above). Reply with exactly one word: QUESTION, PLAN_APPROVAL, IGNORED_ERROR, or OK.";

/// §4.5 Response-Align, Stop variant + the independent unanswered-question
/// check §4.7 describes. Runs the plan-approval/question classifier first;
/// if it denies, that verdict wins. Otherwise falls through to the
/// short-acknowledgment-to-a-real-question check.
pub async fn check(ctx: &ValidatorContext<'_>) -> Verdict {
    if ctx.collected.is_subagent_view() {
        return Verdict::Continue;
    }
    let (Some(last_user), Some(last_assistant)) = (ctx.collected.user.last(), ctx.collected.assistant.last()) else {
        return Verdict::Continue;
    };
    if last_assistant.index < last_user.index {
        return Verdict::Continue;
    }

    match classify(ctx, &last_assistant.content, &last_user.content).await {
        Verdict::Allow => check_unanswered_short_reply(ctx, &last_user.content, &last_assistant.content).await,
        other => other,
    }
}

async fn classify(ctx: &ValidatorContext<'_>, assistant_text: &str, user_text: &str) -> Verdict {
    let plain_text_question = looks_like_plain_text_question(assistant_text);
    let plan_approval_hint = detect_plan_approval_phrasing(assistant_text);
    let marker_present = SystemMessage::carries_marker(user_text);

    if !plain_text_question && !plan_approval_hint && !marker_present {
        return Verdict::Allow;
    }

    let prompt = format!(
        "Assistant's final message:\n{assistant_text}\n\nFull conversation:\n{}",
        format_for_llm(ctx.collected)
    );
    let mut config = AgentConfig::direct(AGENT_NAME, ModelTier::Small, CLASSIFIER_SYSTEM_PROMPT);
    config.max_tokens = 50;
    let result = ctx.llm.run_agent(&config, &prompt).await;

    match classification_from_reply(&result.text) {
        StopClassification::Question => Verdict::SynthesizeFeedback(SystemMessage::autogenerated(format!(
            "Use the structured question tool instead of asking in plain text: \"{}\"",
            assistant_text.trim()
        ))),
        StopClassification::PlanApproval => Verdict::SynthesizeFeedback(SystemMessage::autogenerated(
            "Use the plan-mode exit tool to present your plan for approval instead of asking in plain text.",
        )),
        StopClassification::IgnoredError => Verdict::SynthesizeFeedback(SystemMessage::autogenerated(
            "Address the feedback from the previous turn before continuing.",
        )),
        StopClassification::Ok => Verdict::Allow,
    }
}

fn classification_from_reply(text: &str) -> StopClassification {
    let upper = text.trim().to_uppercase();
    if upper.contains("PLAN_APPROVAL") {
        StopClassification::PlanApproval
    } else if upper.contains("IGNORED_ERROR") {
        StopClassification::IgnoredError
    } else if upper.contains("QUESTION") {
        StopClassification::Question
    } else {
        StopClassification::Ok
    }
}

const QUESTION_VERIFY_SYSTEM_PROMPT: &str = "You verify whether an extracted fragment of text is genuinely a \
question that needs a user's answer, as opposed to a relative clause or rhetorical aside that merely ends in a \
question mark (e.g. \"I'll fix whatever is causing the build to fail?\" is not a real question). Reply with \
exactly one word: YES or NO.";

/// The independent check: a short, acknowledgment-only reply to a message
/// that genuinely contains a question is suspicious on its own, regardless
/// of what the classifier above decided. §4.7: the extracted candidate
/// still goes through a second LLM call before it is trusted, to avoid
/// false positives on relative clauses.
async fn check_unanswered_short_reply(ctx: &ValidatorContext<'_>, user_text: &str, assistant_text: &str) -> Verdict {
    let trimmed_reply = assistant_text.trim();
    if trimmed_reply.chars().count() >= ACK_ONLY_MAX_LEN {
        return Verdict::Allow;
    }
    if !is_acknowledgment_only(trimmed_reply) {
        return Verdict::Allow;
    }
    let Some(question) = extract_real_question(user_text) else {
        return Verdict::Allow;
    };

    if !verify_is_real_question(ctx, &question).await {
        return Verdict::Allow;
    }

    Verdict::SynthesizeFeedback(SystemMessage::autogenerated(format!(
        "User question not answered: \"{question}\""
    )))
}

async fn verify_is_real_question(ctx: &ValidatorContext<'_>, candidate: &str) -> bool {
    let mut config = AgentConfig::direct("response-align-stop-question-verify", ModelTier::Nano, QUESTION_VERIFY_SYSTEM_PROMPT);
    config.max_tokens = 10;
    let result = ctx.llm.run_agent(&config, &format!("Extracted text: \"{candidate}\"")).await;
    if !result.success {
        // Fail open per spec.md §7 taxonomy #1: advisory checks default to
        // allow when the provider call itself fails, not to a denial.
        return true;
    }
    result.text.trim().to_uppercase().starts_with("YES")
}

const ACK_ONLY_PREFIXES: &[&str] =
    &["ok", "okay", "sure", "got it", "will do", "sounds good", "i'll look into it", "i will look into it", "noted"];

fn is_acknowledgment_only(text: &str) -> bool {
    let lower = text.to_lowercase();
    ACK_ONLY_PREFIXES.iter().any(|prefix| lower.starts_with(prefix))
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use gatekeeper_cache::{SessionCacheConfig, SessionCaches};
    use gatekeeper_llm::{AuthMode, LlmRunner, ModelCatalog};
    use gatekeeper_transcript::CollectedView;
    use serde_json::Value;

    use super::*;

    fn test_runner() -> LlmRunner {
        // An unreachable host: every call deterministically fails closed
        // rather than depending on real network access from a test.
        LlmRunner::new(
            "https://example.invalid",
            AuthMode::Vendor("dummy-key".to_string()),
            ModelCatalog { nano: "nano".into(), small: "small".into(), standard: "standard".into() },
            1,
        )
    }

    fn test_ctx<'a>(llm: &'a LlmRunner, caches: &'a SessionCaches, collected: &'a CollectedView, tool_input: &'a Value) -> ValidatorContext<'a> {
        ValidatorContext {
            tool_name: "",
            tool_input,
            cwd: Path::new("/repo"),
            collected,
            caches,
            llm,
            project_rules: None,
            blacklist_highlights: &[],
            max_format_retries: 1,
        }
    }

    #[test]
    fn classification_from_reply_matches_each_category() {
        assert_eq!(classification_from_reply("QUESTION"), StopClassification::Question);
        assert_eq!(classification_from_reply("PLAN_APPROVAL"), StopClassification::PlanApproval);
        assert_eq!(classification_from_reply("IGNORED_ERROR"), StopClassification::IgnoredError);
        assert_eq!(classification_from_reply("OK"), StopClassification::Ok);
        assert_eq!(classification_from_reply("unparseable nonsense"), StopClassification::Ok);
    }

    #[tokio::test]
    async fn short_ack_to_real_question_is_flagged_when_verification_fails_open() {
        let dir = tempfile::tempdir().unwrap();
        let config = SessionCacheConfig {
            acknowledgment_ttl_secs: 3600,
            acknowledgment_max_entries: 50,
            denial_escalation_threshold: 3,
            rewind_max_entries: 100,
            statusline_max_entries: 30,
            statusline_ttl_secs: 600,
        };
        let caches = SessionCaches::new(dir.path(), "/tmp/session.jsonl", &config);
        let llm = test_runner();
        let collected = CollectedView::default();
        let tool_input = Value::Null;
        let ctx = test_ctx(&llm, &caches, &collected, &tool_input);

        // The verification LLM call is unreachable in this test and fails
        // open (spec.md §7 taxonomy #1), so the deterministic extraction
        // still drives the final verdict here.
        let verdict = check_unanswered_short_reply(&ctx, "Why does the build fail?", "I'll look into it.").await;
        assert!(matches!(verdict, Verdict::SynthesizeFeedback(_)));
    }

    #[tokio::test]
    async fn long_reply_is_not_flagged_even_to_a_question() {
        let dir = tempfile::tempdir().unwrap();
        let config = SessionCacheConfig {
            acknowledgment_ttl_secs: 3600,
            acknowledgment_max_entries: 50,
            denial_escalation_threshold: 3,
            rewind_max_entries: 100,
            statusline_max_entries: 30,
            statusline_ttl_secs: 600,
        };
        let caches = SessionCaches::new(dir.path(), "/tmp/session.jsonl", &config);
        let llm = test_runner();
        let collected = CollectedView::default();
        let tool_input = Value::Null;
        let ctx = test_ctx(&llm, &caches, &collected, &tool_input);

        let verdict = check_unanswered_short_reply(
            &ctx,
            "Why does the build fail?",
            "The build fails because the lockfile is out of date; I've regenerated it and re-run the build.",
        )
        .await;
        assert!(matches!(verdict, Verdict::Allow));
    }

    #[tokio::test]
    async fn ack_only_reply_to_a_statement_is_not_flagged() {
        let dir = tempfile::tempdir().unwrap();
        let config = SessionCacheConfig {
            acknowledgment_ttl_secs: 3600,
            acknowledgment_max_entries: 50,
            denial_escalation_threshold: 3,
            rewind_max_entries: 100,
            statusline_max_entries: 30,
            statusline_ttl_secs: 600,
        };
        let caches = SessionCaches::new(dir.path(), "/tmp/session.jsonl", &config);
        let llm = test_runner();
        let collected = CollectedView::default();
        let tool_input = Value::Null;
        let ctx = test_ctx(&llm, &caches, &collected, &tool_input);

        let verdict = check_unanswered_short_reply(&ctx, "Please fix the build.", "Got it, fixing now.").await;
        assert!(matches!(verdict, Verdict::Allow));
    }
}
