//! The detached background validator. Spawned by the trusted-file lazy
//! path (§4.6 step 1) so a trusted edit is approved immediately while the
//! slower checks run out-of-band; their verdict lands in the
//! pending-validation cache for the *next* hook invocation to consume.

use std::path::Path;
use std::process::Stdio;

use gatekeeper_cache::{PendingValidation, ValidationStatus};
use gatekeeper_patterns::QuotePreference;
use gatekeeper_transcript::{CollectSpec, RoleQuota, ToolResultQuota, error_prefilter, format_for_llm, read};
use gatekeeper_validators::{ValidatorContext, Verdict, error_acknowledge, response_align_pretool, style_drift};
use serde_json::Value;

use crate::services::PipelineServices;
use crate::trust;

pub const BACKGROUND_VALIDATE_FLAG: &str = "--background-validate";

/// Everything `run_background_validation` needs, serialized onto the
/// child's command line so the detached process needs no stdin pipe.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct BackgroundValidateArgs {
    pub session_id: String,
    pub transcript_path: String,
    pub tool_name: String,
    pub cwd: String,
    pub tool_input: Value,
}

/// Fire-and-forget: re-invoke this binary with the validation payload and
/// don't wait for it. Stdio is ignored both ways — the child reports its
/// result only through the pending-validation cache file.
pub fn spawn_background_validator(current_exe: &Path, args: &BackgroundValidateArgs) {
    let payload = match serde_json::to_string(args) {
        Ok(payload) => payload,
        Err(err) => {
            tracing::warn!(error = %err, "failed to serialize background-validate payload");
            return;
        }
    };
    let mut command = tokio::process::Command::new(current_exe);
    command
        .arg(BACKGROUND_VALIDATE_FLAG)
        .arg(payload)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .kill_on_drop(false);
    match command.spawn() {
        Ok(_child) => {}
        Err(err) => tracing::warn!(error = %err, "failed to spawn background validator"),
    }
}

fn collect_spec() -> CollectSpec {
    CollectSpec::new()
        .with_user(RoleQuota::with_max_stale(3, 20))
        .with_assistant(RoleQuota::with_max_stale(3, 20))
        .with_tool_result(ToolResultQuota { count: 5, max_stale: Some(20), trim: true, max_lines: 200 })
}

/// Run error-acknowledge, response-align, and style-drift sequentially
/// against the trusted edit and record the combined verdict. A `Continue`
/// or `Allow` from every agent is recorded as a pass; the first `Deny` or
/// unresolved `NeedsAppeal` is recorded as a failure the next foreground
/// hook will surface.
pub async fn run_background_validation(services: &PipelineServices, args: &BackgroundValidateArgs) -> anyhow::Result<()> {
    let caches = services.session_caches(&args.session_id);
    let transcript_path = Path::new(&args.transcript_path);
    let collected = read(transcript_path, &collect_spec());
    let formatted = format_for_llm(&collected);
    let scan = error_prefilter(&formatted);

    let cwd = Path::new(&args.cwd);
    let blacklist_highlights: Vec<String> = Vec::new();
    let ctx = ValidatorContext {
        tool_name: &args.tool_name,
        tool_input: &args.tool_input,
        cwd,
        collected: &collected,
        caches: &caches,
        llm: &services.llm,
        project_rules: None,
        blacklist_highlights: &blacklist_highlights,
        max_format_retries: services.config.llm.max_format_retries,
    };

    let error_snippet = scan.matched_patterns.join(", ");
    let verdict = error_acknowledge::check(&ctx, &error_snippet, scan.needs_llm_check, false).await;
    let verdict = match verdict {
        Verdict::Continue | Verdict::Allow => response_align_pretool::check(&ctx).await,
        other => other,
    };
    let verdict = match verdict {
        Verdict::Continue | Verdict::Allow => run_style_drift(&ctx, &args.tool_input).await,
        other => other,
    };

    let file_path = trust::extract_file_path(&args.tool_input).unwrap_or_default().to_string();
    let pending = match verdict {
        Verdict::Continue | Verdict::Allow => PendingValidation {
            status: ValidationStatus::Passed,
            tool_name: args.tool_name.clone(),
            file_path,
            failure_reason: None,
        },
        Verdict::Deny(reason) => PendingValidation {
            status: ValidationStatus::Failed,
            tool_name: args.tool_name.clone(),
            file_path,
            failure_reason: Some(reason),
        },
        Verdict::NeedsAppeal(reason) => PendingValidation {
            status: ValidationStatus::Failed,
            tool_name: args.tool_name.clone(),
            file_path,
            failure_reason: Some(reason),
        },
        Verdict::SynthesizeFeedback(message) => PendingValidation {
            status: ValidationStatus::Failed,
            tool_name: args.tool_name.clone(),
            file_path,
            failure_reason: Some(message.text),
        },
    };

    caches.pending.record(pending)?;
    Ok(())
}

async fn run_style_drift(ctx: &ValidatorContext<'_>, tool_input: &Value) -> Verdict {
    if ctx.tool_name != "Edit" {
        return Verdict::Continue;
    }
    let old_text = tool_input.get("old_string").and_then(|v| v.as_str()).unwrap_or_default();
    let new_text = tool_input.get("new_string").and_then(|v| v.as_str()).unwrap_or_default();
    style_drift::check(ctx, old_text, new_text, QuotePreference::Double).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn background_validate_flag_matches_clap_long_name() {
        assert_eq!(BACKGROUND_VALIDATE_FLAG, "--background-validate");
    }

    #[test]
    fn collect_spec_keeps_a_small_tail_window() {
        let spec = collect_spec();
        assert_eq!(spec.user.unwrap().count, 3);
        assert_eq!(spec.tool_result.unwrap().count, 5);
    }

    #[test]
    fn background_validate_args_round_trip_through_json() {
        let args = BackgroundValidateArgs {
            session_id: "/tmp/session.jsonl".to_string(),
            transcript_path: "/tmp/session.jsonl".to_string(),
            tool_name: "Edit".to_string(),
            cwd: "/repo".to_string(),
            tool_input: serde_json::json!({"file_path": "/repo/src/lib.rs"}),
        };
        let payload = serde_json::to_string(&args).unwrap();
        let restored: BackgroundValidateArgs = serde_json::from_str(&payload).unwrap();
        assert_eq!(restored.tool_name, "Edit");
        assert_eq!(restored.cwd, "/repo");
    }
}
