use gatekeeper_llm::{AgentConfig, ModelTier};
use gatekeeper_transcript::format_for_llm;

use crate::context::{SlashCommandHint, ValidatorContext};
use crate::parse::{AppealReply, parse_appeal_reply};
use crate::verdict::Verdict;

const SYSTEM_PROMPT: &str = "You review a denial from another gatekeeper agent. The original denial is \
always technically correct by default; only overturn it when the transcript shows the user explicitly \
requested exactly this action — ran a matching slash command, or answered a structured question with the \
matching option. Reply with exactly one line: UPHOLD, OVERTURN: APPROVE, or OVERTURN: <new reason>.";

const FORMAT_REMINDER: &str =
    "Reply with exactly one line: UPHOLD, OVERTURN: APPROVE, or OVERTURN: <new reason>.";

/// §4.5 Tool-Appeal. Runs only after another validator has already denied;
/// `original_reason` is the denial this call may uphold or overturn.
pub async fn check(
    ctx: &ValidatorContext<'_>,
    original_reason: &str,
    slash_command: Option<SlashCommandHint<'_>>,
) -> Verdict {
    let prompt = build_prompt(ctx, original_reason, slash_command);
    let config = AgentConfig::direct("tool-appeal", ModelTier::Small, SYSTEM_PROMPT);
    let result = ctx
        .llm
        .run_agent_with_retry(&config, &prompt, is_well_formed, FORMAT_REMINDER, ctx.max_format_retries)
        .await;

    if !result.success {
        return Verdict::Deny(original_reason.to_string());
    }

    match parse_appeal_reply(&result.text) {
        AppealReply::Uphold => Verdict::Deny(original_reason.to_string()),
        AppealReply::OverturnApprove => Verdict::Allow,
        AppealReply::Overturn(reason) => Verdict::Deny(reason),
        AppealReply::Deny(Some(reason)) => Verdict::Deny(reason),
        AppealReply::Deny(None) => Verdict::Deny(original_reason.to_string()),
    }
}

fn is_well_formed(text: &str) -> bool {
    let upper = text.trim().to_uppercase();
    upper.starts_with("UPHOLD") || upper.starts_with("OVERTURN") || upper.starts_with("DENY")
}

fn build_prompt(ctx: &ValidatorContext<'_>, original_reason: &str, slash_command: Option<SlashCommandHint<'_>>) -> String {
    let mut prompt = format!(
        "Tool: {}\nInput: {}\nWorking directory: {}\nOriginal denial reason: {original_reason}\n",
        ctx.tool_name,
        ctx.tool_input,
        ctx.cwd.display()
    );
    if let Some(hint) = slash_command {
        prompt.push_str(&format!("\nSlash command invoked: {}\n", hint.command_name));
        if let Some(tools) = hint.allowed_tools {
            prompt.push_str(&format!("Allowed tools for this command: {}\n", tools.join(", ")));
        }
    }
    prompt.push_str("\nRecent conversation:\n");
    prompt.push_str(&format_for_llm(ctx.collected));
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn well_formed_accepts_all_three_prefixes() {
        assert!(is_well_formed("UPHOLD"));
        assert!(is_well_formed("OVERTURN: APPROVE"));
        assert!(is_well_formed("DENY: still risky"));
        assert!(!is_well_formed("maybe"));
    }
}
