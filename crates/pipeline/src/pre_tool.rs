//! §4.6 Pre-Tool-Use Orchestrator: the strict, ordered dispatch through
//! validators, with the trusted-file lazy path, the pending-validation
//! gate, the low-risk allow-list, and appeal integration at every strict
//! step that can deny.

use std::path::Path;

use gatekeeper_cache::ValidationStatus;
use gatekeeper_patterns::{QuotePreference, blacklist_highlights, workaround_category};
use gatekeeper_transcript::{
    CollectSpec, CollectedView, RoleQuota, ToolResultQuota, error_prefilter, format_for_llm, is_subagent_transcript, read,
};
use gatekeeper_validators::{SlashCommandHint, ValidatorContext, Verdict, claude_md_validate, error_acknowledge, plan_validate, question_validate, response_align_pretool, style_drift, tool_appeal, tool_approve};
use serde_json::Value;

use crate::background::{self, BackgroundValidateArgs};
use crate::hook::{HookDecision, PRE_TOOL_USE_EVENT};
use crate::services::PipelineServices;
use crate::trust;

/// What the orchestrator needs beyond the raw `HookInput`: the resolved
/// session id (the transcript path) and the binary's own path, so the
/// lazy-path can re-spawn itself for background validation.
pub struct PreToolRequest<'a> {
    pub tool_name: &'a str,
    pub tool_input: &'a Value,
    pub transcript_path: &'a str,
    pub cwd: &'a str,
    pub is_plan_mode: bool,
    pub current_exe: &'a Path,
}

fn collect_spec(error_ack_max_stale: usize) -> CollectSpec {
    let mut spec = CollectSpec::new()
        .with_user(RoleQuota::with_max_stale(1, error_ack_max_stale))
        .with_assistant(RoleQuota::with_max_stale(3, error_ack_max_stale * 2))
        .with_tool_result(ToolResultQuota { count: 5, max_stale: Some(error_ack_max_stale * 3), trim: true, max_lines: 200 });
    spec.drop_system_reminders = true;
    spec.drop_slash_command_prompts = true;
    spec.include_first_user_message = true;
    spec.detect_plan_approval = true;
    spec.extract_slash_command = true;
    spec
}

/// Project rules file content, read best-effort. A missing file is not an
/// error — most projects don't carry one.
fn read_project_rules(cwd: &str) -> Option<String> {
    std::fs::read_to_string(Path::new(cwd).join("CLAUDE.md")).ok()
}

fn plan_approval_recently_observed(collected: &CollectedView) -> bool {
    const APPROVAL_MARKERS: &[&str] = &["exit plan mode", "ExitPlanMode", "plan approved", "approved the plan"];
    collected.tool_result.iter().any(|entry| {
        let lower = entry.content.to_lowercase();
        APPROVAL_MARKERS.iter().any(|marker| lower.contains(&marker.to_lowercase()))
    })
}

fn suggested_alternative_seen(collected: &CollectedView, tool_name: &str) -> bool {
    collected.tool_result.iter().any(|entry| entry.content.contains(tool_name) && entry.content.to_lowercase().contains("instead"))
}

/// Run the full pre-tool pipeline and produce a final hook decision. Any
/// unexpected error is caught by the caller (`main`), which converts it
/// into `HookDecision::hook_error` — this function itself never panics on
/// a validator failure, since every validator already folds its own
/// provider/format failures into a `Verdict`.
pub async fn handle(services: &PipelineServices, req: PreToolRequest<'_>) -> HookDecision {
    let started = std::time::Instant::now();
    let tool_name = req.tool_name.to_string();
    let transcript_path = req.transcript_path.to_string();
    let decision = handle_inner(services, req).await;

    // §4.8: every decision is appended to the statusline ring buffer,
    // read-only and best-effort — a write failure never affects the
    // decision already made.
    let caches = services.session_caches(&transcript_path);
    let _ = caches.statusline.push(gatekeeper_cache::StatuslineEntry {
        agent: "pre-tool-pipeline".to_string(),
        decision: if decision.is_deny() { "deny".to_string() } else { "allow".to_string() },
        tool_name,
        execution_type: "direct".to_string(),
        latency_ms: started.elapsed().as_millis() as u64,
        timestamp: 0,
    });
    decision
}

async fn handle_inner(services: &PipelineServices, req: PreToolRequest<'_>) -> HookDecision {
    let transcript_path = Path::new(req.transcript_path);
    let is_subagent = is_subagent_transcript(transcript_path, None);

    let spec = collect_spec(services.config.pipeline.error_ack_max_stale);
    let collected = read(transcript_path, &spec);

    // Universal property: a subagent transcript short-circuits every
    // validator to allow.
    if is_subagent {
        return HookDecision::allow(PRE_TOOL_USE_EVENT);
    }
    // Universal property: zero user messages means allow without invoking
    // any LLM.
    if collected.user.is_empty() {
        return HookDecision::allow(PRE_TOOL_USE_EVENT);
    }

    let caches = services.session_caches(req.transcript_path);

    // §4.6 step 1: trusted-file lazy path.
    if services.config.pipeline.lazy_validation_enabled {
        if let Some(path) = trust::extract_file_path(req.tool_input) {
            if trust::is_trusted_file_edit(req.tool_name, path)
                && trust::is_within_trusted_root(path, Path::new(req.cwd))
                && caches.rewind.first_response_checked()
            {
                if let Some(decision) = pending_gate(&caches) {
                    return decision;
                }
                background::spawn_background_validator(
                    req.current_exe,
                    &BackgroundValidateArgs {
                        session_id: req.transcript_path.to_string(),
                        transcript_path: req.transcript_path.to_string(),
                        tool_name: req.tool_name.to_string(),
                        cwd: req.cwd.to_string(),
                        tool_input: req.tool_input.clone(),
                    },
                );
                return HookDecision::allow(PRE_TOOL_USE_EVENT);
            }
        }
    }

    // §4.6 step 2: pending-validation gate, always consulted.
    if let Some(decision) = pending_gate(&caches) {
        return decision;
    }

    // §4.6 step 3: low-risk allow-list.
    if req.tool_name != "AskUserQuestion" && trust::is_low_risk_tool(req.tool_name) {
        if let Some(user_message) = collected.user.last() {
            let _ = caches.rewind.mark_message_checked_by_agent("response-align-pretool", &user_message.content);
        }
        return HookDecision::allow(PRE_TOOL_USE_EVENT);
    }

    // §4.6 step 5: session-level cache setup, rewind detection, post-plan-
    // approval cache wipe.
    let formatted = format_for_llm(&collected);
    if caches.rewind.detect_rewind(&formatted) {
        let _ = caches.invalidate_all();
    }
    if plan_approval_recently_observed(&collected) && !caches.rewind.first_response_checked() {
        let _ = caches.invalidate_all();
        let _ = caches.rewind.set_first_response_checked(true);
    }
    if let Some(user_message) = collected.user.last() {
        let _ = caches.rewind.record_user_message(&user_message.content, user_message.index);
    }

    let project_rules = read_project_rules(req.cwd);
    let command = trust::extract_command(req.tool_input);
    let blacklist_highlights_vec: Vec<String> =
        command.map(|cmd| blacklist_highlights(cmd).iter().map(|h| h.highlight()).collect()).unwrap_or_default();

    let cwd = Path::new(req.cwd);
    let ctx = ValidatorContext {
        tool_name: req.tool_name,
        tool_input: req.tool_input,
        cwd,
        collected: &collected,
        caches: &caches,
        llm: &services.llm,
        project_rules: project_rules.as_deref(),
        blacklist_highlights: &blacklist_highlights_vec,
        max_format_retries: services.config.llm.max_format_retries,
    };

    // §4.6 step 4: AskUserQuestion special case.
    if req.tool_name == "AskUserQuestion" {
        let question_text = req.tool_input.get("question").and_then(|v| v.as_str()).unwrap_or_default();
        let options: Vec<String> = req
            .tool_input
            .get("options")
            .and_then(|v| v.as_array())
            .map(|arr| arr.iter().filter_map(|o| o.as_str().map(str::to_string)).collect())
            .unwrap_or_default();
        let verdict = question_validate::check(&ctx, question_text, &options, req.is_plan_mode).await;
        return finish_with_appeal(&ctx, verdict, None).await;
    }

    // §4.6 step 6: Error-Acknowledge.
    let scan = error_prefilter(&formatted);
    let suggested_alternative = suggested_alternative_seen(&collected, req.tool_name);
    let error_snippet = scan.matched_patterns.join(", ");
    let verdict = error_acknowledge::check(&ctx, &error_snippet, scan.needs_llm_check, suggested_alternative).await;
    if let Some(decision) = match &verdict {
        Verdict::NeedsAppeal(_) => Some(resolve_appeal_and_maybe_acknowledge(&ctx, &caches, verdict.clone(), &error_snippet).await),
        Verdict::Deny(reason) => Some(deny(reason.clone())),
        _ => None,
    } {
        return decision;
    }

    // §4.6 step 7: Response-Align.
    let verdict = response_align_pretool::check(&ctx).await;
    if let Some(decision) = terminal_or_appeal(&ctx, verdict, None).await {
        return decision;
    }

    // §4.6 step 8: path-based agents.
    if let Some(path) = trust::extract_file_path(req.tool_input) {
        if trust::is_plan_file(path) {
            let plan_text = req.tool_input.get("content").and_then(|v| v.as_str()).unwrap_or_default();
            let verdict = plan_validate::check(&ctx, plan_text).await;
            if let Some(decision) = terminal_or_appeal(&ctx, verdict, None).await {
                return decision;
            }
        } else if trust::is_rules_file(path) {
            let proposed_text = req.tool_input.get("content").and_then(|v| v.as_str()).unwrap_or_default();
            let verdict = claude_md_validate::check(&ctx, proposed_text).await;
            if let Some(decision) = terminal_or_appeal(&ctx, verdict, None).await {
                return decision;
            }
        } else if req.tool_name == "Edit" && trust::is_trusted_file_edit(req.tool_name, path) {
            let old_text = req.tool_input.get("old_string").and_then(|v| v.as_str()).unwrap_or_default();
            let new_text = req.tool_input.get("new_string").and_then(|v| v.as_str()).unwrap_or_default();
            let verdict = style_drift::check(&ctx, old_text, new_text, QuotePreference::Double).await;
            if let Some(decision) = terminal_or_appeal(&ctx, verdict, None).await {
                return decision;
            }
        }
    }

    // §4.6 step 9: ExitPlanMode gate.
    if req.tool_name == "ExitPlanMode" {
        let plan_content = req.tool_input.get("plan").and_then(|v| v.as_str()).unwrap_or_default();
        if plan_content.trim().is_empty() {
            return HookDecision::deny(PRE_TOOL_USE_EVENT, "Cannot exit plan mode with an empty plan.");
        }
    }

    // §4.6 step 10: Tool-Approve, lazy mode when not in plan mode (or
    // running as a subagent, already excluded above).
    let lazy_mode = !req.is_plan_mode;
    let verdict = tool_approve::check(&ctx, lazy_mode).await;
    if let Verdict::NeedsAppeal(reason) = &verdict {
        let original_reason = reason.clone();
        let slash_hint = collected.slash_command.as_ref().map(|cmd| SlashCommandHint {
            command_name: cmd.command_name.as_str(),
            allowed_tools: cmd.allowed_tools.as_deref(),
        });
        let resolved = tool_appeal::check(&ctx, &original_reason, slash_hint).await;
        if let Verdict::Deny(final_reason) = resolved {
            let category = command.and_then(workaround_category);
            let reason = match category {
                Some(category) => {
                    let _ = caches.denial.record_denial(category.as_str());
                    caches.denial.escalate(category.as_str(), &final_reason)
                }
                None => final_reason,
            };
            return HookDecision::deny(PRE_TOOL_USE_EVENT, reason);
        }
    }

    // §4.6 step 11: accept.
    let _ = caches.rewind.set_first_response_checked(true);
    HookDecision::allow(PRE_TOOL_USE_EVENT)
}

/// §4.6 step 2, factored out so both the lazy path and the strict path
/// consult it identically. A cache read failure is tolerated as "nothing
/// pending" per spec.md §7 taxonomy #3 (filesystem errors silently
/// tolerated on caches).
fn pending_gate(caches: &gatekeeper_cache::SessionCaches) -> Option<HookDecision> {
    let pending = caches.pending.take().ok().flatten()?;
    if pending.status == ValidationStatus::Failed {
        let reason = pending.failure_reason.unwrap_or_else(|| "background validation failed".to_string());
        return Some(HookDecision::deny(PRE_TOOL_USE_EVENT, format!("Previous {} had issues: {reason}", pending.tool_name)));
    }
    None
}

/// Run Tool-Appeal against a `NeedsAppeal` verdict and turn the result into
/// a final decision. `Allow`/`Continue` pass through untouched.
async fn terminal_or_appeal(
    ctx: &ValidatorContext<'_>,
    verdict: Verdict,
    slash_command: Option<SlashCommandHint<'_>>,
) -> Option<HookDecision> {
    match verdict {
        Verdict::Allow | Verdict::Continue => None,
        Verdict::Deny(reason) => Some(deny(reason)),
        Verdict::NeedsAppeal(reason) => {
            let resolved = tool_appeal::check(ctx, &reason, slash_command).await;
            match resolved {
                Verdict::Allow => None,
                Verdict::Deny(final_reason) => Some(deny(final_reason)),
                _ => Some(deny(reason)),
            }
        }
        Verdict::SynthesizeFeedback(message) => Some(deny(message.text)),
    }
}

/// Error-Acknowledge's special case: on overturn, record the error as
/// acknowledged so it doesn't re-trigger this agent (§4.5 Error-Acknowledge
/// "on BLOCK").
async fn resolve_appeal_and_maybe_acknowledge(
    ctx: &ValidatorContext<'_>,
    caches: &gatekeeper_cache::SessionCaches,
    verdict: Verdict,
    error_snippet: &str,
) -> HookDecision {
    let Verdict::NeedsAppeal(reason) = verdict else {
        return HookDecision::allow(PRE_TOOL_USE_EVENT);
    };
    match tool_appeal::check(ctx, &reason, None).await {
        Verdict::Allow => {
            let _ = caches.acknowledgment.acknowledge(error_snippet);
            HookDecision::allow(PRE_TOOL_USE_EVENT)
        }
        Verdict::Deny(final_reason) => deny(final_reason),
        _ => deny(reason),
    }
}

async fn finish_with_appeal(ctx: &ValidatorContext<'_>, verdict: Verdict, slash_command: Option<SlashCommandHint<'_>>) -> HookDecision {
    terminal_or_appeal(ctx, verdict, slash_command).await.unwrap_or_else(|| HookDecision::allow(PRE_TOOL_USE_EVENT))
}

fn deny(reason: String) -> HookDecision {
    HookDecision::deny(PRE_TOOL_USE_EVENT, reason)
}

#[cfg(test)]
mod tests {
    use gatekeeper_cache::{PendingValidation, SessionCacheConfig, SessionCaches, ValidationStatus};
    use gatekeeper_transcript::{CollectedMessage, CollectedRole, CollectedView};

    use super::*;

    fn message(role: CollectedRole, content: &str, index: u64) -> CollectedMessage {
        CollectedMessage { role, content: content.to_string(), index }
    }

    fn test_caches(dir: &std::path::Path) -> SessionCaches {
        let config = SessionCacheConfig {
            acknowledgment_ttl_secs: 3600,
            acknowledgment_max_entries: 50,
            denial_escalation_threshold: 3,
            rewind_max_entries: 100,
            statusline_max_entries: 30,
            statusline_ttl_secs: 600,
        };
        SessionCaches::new(dir, "/tmp/session-a.jsonl", &config)
    }

    #[test]
    fn collect_spec_requests_first_user_message_and_plan_detection() {
        let spec = collect_spec(6);
        assert!(spec.include_first_user_message);
        assert!(spec.detect_plan_approval);
        assert!(spec.drop_system_reminders);
        assert!(spec.drop_slash_command_prompts);
        assert_eq!(spec.user.unwrap().count, 1);
    }

    #[test]
    fn plan_approval_marker_detected_in_tool_results() {
        let mut view = CollectedView::default();
        view.tool_result.push(message(CollectedRole::ToolResult, "the user approved the plan via ExitPlanMode", 3));
        assert!(plan_approval_recently_observed(&view));
    }

    #[test]
    fn plan_approval_not_detected_without_marker() {
        let mut view = CollectedView::default();
        view.tool_result.push(message(CollectedRole::ToolResult, "ran the build, it passed", 3));
        assert!(!plan_approval_recently_observed(&view));
    }

    #[test]
    fn suggested_alternative_requires_tool_name_and_instead() {
        let mut view = CollectedView::default();
        view.tool_result.push(message(CollectedRole::ToolResult, "use Grep instead of Bash for searching", 1));
        assert!(suggested_alternative_seen(&view, "Bash"));
        assert!(!suggested_alternative_seen(&view, "Write"));
    }

    #[test]
    fn pending_gate_allows_through_when_cache_empty() {
        let dir = tempfile::tempdir().unwrap();
        let caches = test_caches(dir.path());
        assert!(pending_gate(&caches).is_none());
    }

    #[test]
    fn pending_gate_denies_on_recorded_failure() {
        let dir = tempfile::tempdir().unwrap();
        let caches = test_caches(dir.path());
        caches
            .pending
            .record(PendingValidation {
                status: ValidationStatus::Failed,
                tool_name: "Edit".to_string(),
                file_path: "/repo/src/lib.rs".to_string(),
                failure_reason: Some("style drift detected".to_string()),
            })
            .unwrap();

        let decision = pending_gate(&caches).expect("a failed pending validation must deny");
        assert!(decision.is_deny());
    }

    #[test]
    fn pending_gate_clears_after_being_consumed() {
        let dir = tempfile::tempdir().unwrap();
        let caches = test_caches(dir.path());
        caches
            .pending
            .record(PendingValidation {
                status: ValidationStatus::Passed,
                tool_name: "Edit".to_string(),
                file_path: "/repo/src/lib.rs".to_string(),
                failure_reason: None,
            })
            .unwrap();

        assert!(pending_gate(&caches).is_none(), "a passed validation should not deny");
        assert!(pending_gate(&caches).is_none(), "take() must clear the entry so it isn't replayed");
    }
}
