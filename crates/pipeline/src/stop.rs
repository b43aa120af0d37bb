//! §4.7 Stop-Hook Orchestrator: Response-Align's stop variant (plain-text
//! question / plan-approval / ignored-error classification plus the
//! independent unanswered-question check) followed by Intent-Validate, the
//! off-topic detector. Both agents only ever produce `Continue`, `Allow`,
//! or `SynthesizeFeedback` — there is no appeal step at stop time, since
//! nothing here blocks a tool call; it only re-injects corrective feedback.

use std::path::Path;

use gatekeeper_transcript::{CollectSpec, RoleQuota, ToolResultQuota, is_subagent_transcript, read};
use gatekeeper_validators::{ValidatorContext, Verdict, intent_validate, response_align_stop};
use serde_json::Value;

use crate::hook::{HookDecision, STOP_EVENT};
use crate::services::PipelineServices;

pub struct StopRequest<'a> {
    pub transcript_path: &'a str,
    pub cwd: &'a str,
}

fn collect_spec() -> CollectSpec {
    let mut spec = CollectSpec::new()
        .with_user(RoleQuota::with_max_stale(3, 20))
        .with_assistant(RoleQuota::with_max_stale(3, 20))
        .with_tool_result(ToolResultQuota { count: 3, max_stale: Some(20), trim: true, max_lines: 200 });
    spec.drop_system_reminders = true;
    spec.drop_slash_command_prompts = true;
    spec.include_first_user_message = true;
    spec
}

fn read_project_rules(cwd: &str) -> Option<String> {
    std::fs::read_to_string(Path::new(cwd).join("CLAUDE.md")).ok()
}

/// Run the stop pipeline and produce a final hook decision. Mirrors
/// `pre_tool::handle`'s shape and error-boundary discipline: no validator
/// call here can panic, each one already folds provider/format failures
/// into a `Verdict`.
pub async fn handle(services: &PipelineServices, req: StopRequest<'_>) -> HookDecision {
    let started = std::time::Instant::now();
    let transcript_path = Path::new(req.transcript_path);
    let decision = handle_inner(services, &req, transcript_path).await;

    let caches = services.session_caches(req.transcript_path);
    let _ = caches.statusline.push(gatekeeper_cache::StatuslineEntry {
        agent: "stop-pipeline".to_string(),
        decision: if decision.is_deny() { "deny".to_string() } else { "allow".to_string() },
        tool_name: String::new(),
        execution_type: "direct".to_string(),
        latency_ms: started.elapsed().as_millis() as u64,
        timestamp: 0,
    });
    decision
}

async fn handle_inner(services: &PipelineServices, req: &StopRequest<'_>, transcript_path: &Path) -> HookDecision {
    if is_subagent_transcript(transcript_path, None) {
        return HookDecision::allow(STOP_EVENT);
    }

    let spec = collect_spec();
    let collected = read(transcript_path, &spec);
    if collected.user.is_empty() || collected.assistant.is_empty() {
        return HookDecision::allow(STOP_EVENT);
    }

    let caches = services.session_caches(req.transcript_path);
    let project_rules = read_project_rules(req.cwd);
    let blacklist_highlights: Vec<String> = Vec::new();
    let empty_input = Value::Null;
    let cwd = Path::new(req.cwd);
    let ctx = ValidatorContext {
        tool_name: "",
        tool_input: &empty_input,
        cwd,
        collected: &collected,
        caches: &caches,
        llm: &services.llm,
        project_rules: project_rules.as_deref(),
        blacklist_highlights: &blacklist_highlights,
        max_format_retries: services.config.llm.max_format_retries,
    };

    let verdict = response_align_stop::check(&ctx).await;
    let verdict = match verdict {
        Verdict::Continue | Verdict::Allow => intent_validate::check(&ctx).await,
        other => other,
    };

    match verdict {
        Verdict::Continue | Verdict::Allow => HookDecision::allow(STOP_EVENT),
        Verdict::SynthesizeFeedback(message) => {
            HookDecision::deny(STOP_EVENT, message.text.clone()).with_system_message(message.text)
        }
        Verdict::Deny(reason) => HookDecision::deny(STOP_EVENT, reason),
        Verdict::NeedsAppeal(reason) => HookDecision::deny(STOP_EVENT, reason),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collect_spec_keeps_system_reminders_out() {
        let spec = collect_spec();
        assert!(spec.drop_system_reminders);
        assert!(spec.include_first_user_message);
    }
}
