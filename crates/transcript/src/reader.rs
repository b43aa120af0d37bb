use std::collections::HashMap;
use std::path::Path;

use gatekeeper_patterns::{is_host_interruption, is_slash_command_prompt, is_system_reminder};

use crate::entry::{ContentBlock, ContentValue, Role, TranscriptEntry};
use crate::view::{CollectedMessage, CollectedRole, CollectedView, CollectSpec, SlashCommandContext, SYNTHETIC_INDEX};

struct ParsedLine {
    index: usize,
    entry: TranscriptEntry,
}

fn parse_lines(raw: &str) -> Vec<ParsedLine> {
    let mut out = Vec::new();
    for (index, line) in raw.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<TranscriptEntry>(line) {
            Ok(entry) => out.push(ParsedLine { index, entry }),
            Err(err) => {
                tracing::debug!(line = index, error = %err, "skipping malformed transcript line");
            }
        }
    }
    out
}

/// Read the whole transcript file and collect a role-bounded view per
/// `spec`. An unreadable file returns an empty view rather than an error —
/// transcript reads are deterministic-failure, not propagated (spec.md §7
/// taxonomy #3).
pub fn read(path: &Path, spec: &CollectSpec) -> CollectedView {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) => {
            tracing::debug!(path = %path.display(), error = %err, "transcript file unreadable");
            return CollectedView::default();
        }
    };
    read_str(&raw, spec)
}

fn read_str(raw: &str, spec: &CollectSpec) -> CollectedView {
    let lines = parse_lines(raw);
    if lines.is_empty() {
        return CollectedView::default();
    }

    // ── forward pass: tool_use_id -> tool_name, and slash-command metadata ──
    let mut tool_names: HashMap<String, String> = HashMap::new();
    let mut slash_command: Option<SlashCommandContext> = None;

    for parsed in &lines {
        if let ContentValue::Blocks(blocks) = &parsed.entry.message.content {
            for block in blocks {
                if let ContentBlock::ToolUse { id, name, .. } = block {
                    tool_names.insert(id.clone(), name.clone());
                }
            }
        }
        if spec.extract_slash_command && parsed.entry.message.role == Role::User {
            let text = parsed.entry.message.content.as_text();
            if let Some(ctx) = try_extract_slash_command(&text) {
                slash_command = Some(ctx);
            }
        }
    }

    // ── backward pass: fill role quotas ──
    let mut view = CollectedView {
        slash_command: slash_command.clone(),
        ..Default::default()
    };

    let mut user_remaining = spec.user.map(|q| q.count).unwrap_or(0);
    let mut assistant_remaining = spec.assistant.map(|q| q.count).unwrap_or(0);
    let mut tool_result_remaining = spec.tool_result.map(|q| q.count).unwrap_or(0);

    for (scan_distance, parsed) in lines.iter().rev().enumerate() {
        if user_remaining == 0 && assistant_remaining == 0 && tool_result_remaining == 0 {
            break;
        }

        match parsed.entry.message.role {
            Role::User => {
                if user_remaining > 0 {
                    if let Some(quota) = spec.user {
                        if quota.max_stale.is_none_or(|max| scan_distance <= max) {
                            if let Some(text) = collect_user_text(&parsed.entry.message.content, spec) {
                                view.user.push(CollectedMessage {
                                    role: CollectedRole::User,
                                    content: text,
                                    index: parsed.index as u64,
                                });
                                user_remaining -= 1;
                            }
                        }
                    }
                }
                if tool_result_remaining > 0 {
                    if let Some(quota) = spec.tool_result {
                        if quota.max_stale.is_none_or(|max| scan_distance <= max) {
                            for entry in collect_tool_results(&parsed.entry.message.content, &tool_names, spec, parsed.index) {
                                if tool_result_remaining == 0 {
                                    break;
                                }
                                view.tool_result.push(entry);
                                tool_result_remaining -= 1;
                            }
                        }
                    }
                }
            }
            Role::Assistant => {
                if assistant_remaining > 0 {
                    if let Some(quota) = spec.assistant {
                        if quota.max_stale.is_none_or(|max| scan_distance <= max) {
                            let text = concat_text_blocks(&parsed.entry.message.content);
                            if !text.is_empty() {
                                view.assistant.push(CollectedMessage {
                                    role: CollectedRole::Assistant,
                                    content: text,
                                    index: parsed.index as u64,
                                });
                                assistant_remaining -= 1;
                            }
                        }
                    }
                }
            }
        }
    }

    // ── forward-scan recovery of the first user message ──
    if spec.include_first_user_message {
        if let Some(first) = first_user_message(&lines, spec) {
            let already_present = view.user.iter().any(|m| m.index == first.index);
            let earliest_collected = view.user.iter().map(|m| m.index).min();
            let needs_prepend = match earliest_collected {
                Some(min) => first.index < min,
                None => true,
            };
            if needs_prepend && !already_present {
                view.user.insert(0, first);
            }
        }
    }

    // ── synthesize plan-approval message ──
    if spec.detect_plan_approval && view.tool_result.iter().any(is_plan_approval_result) {
        view.user.push(CollectedMessage {
            role: CollectedRole::User,
            content: "I approved the plan. Proceed with implementation.".to_string(),
            index: SYNTHETIC_INDEX,
        });
    }

    view
}

fn collect_user_text(content: &ContentValue, spec: &CollectSpec) -> Option<String> {
    let text = match content {
        ContentValue::Text(s) => s.clone(),
        ContentValue::Blocks(blocks) => concat_text_blocks(&ContentValue::Blocks(blocks.clone())),
    };
    if text.is_empty() {
        return None;
    }
    if spec.drop_system_reminders && is_system_reminder(&text) {
        return None;
    }
    if spec.drop_slash_command_prompts && is_slash_command_prompt(&text) {
        return None;
    }
    Some(text)
}

fn concat_text_blocks(content: &ContentValue) -> String {
    match content {
        ContentValue::Text(s) => s.clone(),
        ContentValue::Blocks(blocks) => blocks
            .iter()
            .filter_map(|b| match b {
                ContentBlock::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join(""),
    }
}

fn collect_tool_results(
    content: &ContentValue,
    tool_names: &HashMap<String, String>,
    spec: &CollectSpec,
    index: usize,
) -> Vec<CollectedMessage> {
    let ContentValue::Blocks(blocks) = content else {
        return Vec::new();
    };

    let mut out = Vec::new();
    for block in blocks {
        let ContentBlock::ToolResult { tool_use_id, content } = block else {
            continue;
        };
        let resolved_name = tool_names.get(tool_use_id).cloned().unwrap_or_default();
        if spec.exclude_tool_results_for.iter().any(|n| n == &resolved_name) {
            continue;
        }
        let text = content.as_ref().map(|c| concat_text_blocks(c)).unwrap_or_default();
        if is_host_interruption(&text) {
            continue;
        }
        let trimmed = spec
            .tool_result
            .filter(|q| q.trim)
            .map(|q| trim_tool_output(&text, q.max_lines))
            .unwrap_or(text);
        out.push(CollectedMessage {
            role: CollectedRole::ToolResult,
            content: trimmed,
            index: index as u64,
        });
    }
    out
}

/// Reduce a tool_result's text to error-like lines; if none match, truncate
/// to first-half / "[…truncated…]" / last-half.
fn trim_tool_output(text: &str, max_lines: usize) -> String {
    let error_markers = ["error", "Error", "failed", "FAILED", "denied", "DENIED"];
    let error_lines: Vec<&str> = text
        .lines()
        .filter(|line| error_markers.iter().any(|m| line.contains(m)))
        .collect();

    if !error_lines.is_empty() {
        return error_lines.join("\n");
    }

    let lines: Vec<&str> = text.lines().collect();
    let limit = if max_lines > 0 { max_lines } else { lines.len() };
    if lines.len() <= limit {
        return text.to_string();
    }

    let half = limit / 2;
    let head = &lines[..half.max(1)];
    let tail = &lines[lines.len().saturating_sub(half.max(1))..];
    format!("{}\n[…truncated…]\n{}", head.join("\n"), tail.join("\n"))
}

fn first_user_message(lines: &[ParsedLine], spec: &CollectSpec) -> Option<CollectedMessage> {
    for parsed in lines {
        if parsed.entry.message.role != Role::User {
            continue;
        }
        if let Some(text) = collect_user_text(&parsed.entry.message.content, spec) {
            return Some(CollectedMessage {
                role: CollectedRole::User,
                content: text,
                index: parsed.index as u64,
            });
        }
    }
    None
}

fn is_plan_approval_result(msg: &CollectedMessage) -> bool {
    let lower = msg.content.to_lowercase();
    lower.contains("exitplanmode") || lower.contains("approved the plan") || lower.contains("plan approved")
}

fn try_extract_slash_command(text: &str) -> Option<SlashCommandContext> {
    let trimmed = text.trim_start();
    if !trimmed.starts_with("---") {
        return None;
    }
    let rest = &trimmed[3..];
    let end = rest.find("---")?;
    let frontmatter = &rest[..end];

    let mut description = None;
    let mut allowed_tools = None;
    for line in frontmatter.lines() {
        let line = line.trim();
        if let Some(value) = line.strip_prefix("description:") {
            description = Some(value.trim().to_string());
        } else if let Some(value) = line.strip_prefix("allowed-tools:") {
            let tools = value
                .trim()
                .trim_start_matches('[')
                .trim_end_matches(']')
                .split(',')
                .map(|t| t.trim().trim_matches('"').to_string())
                .filter(|t| !t.is_empty())
                .collect::<Vec<_>>();
            if !tools.is_empty() {
                allowed_tools = Some(tools);
            }
        }
    }

    if description.is_none() && allowed_tools.is_none() {
        return None;
    }

    Some(SlashCommandContext {
        command_name: "slash-command".to_string(),
        description,
        allowed_tools,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view::{RoleQuota, ToolResultQuota};

    fn line(role: &str, text: &str) -> String {
        format!(r#"{{"message":{{"role":"{role}","content":"{text}"}}}}"#)
    }

    #[test]
    fn staleness_excludes_message_beyond_max_stale() {
        // [U1, A1, U2, A2, T_result] indices 0..4
        let raw = [
            line("user", "U1"),
            line("assistant", "A1"),
            line("user", "U2"),
            line("assistant", "A2"),
            r#"{"message":{"role":"user","content":[{"type":"tool_result","tool_use_id":"x","content":"done"}]}}"#.to_string(),
        ]
        .join("\n");

        let spec = CollectSpec::new().with_user(RoleQuota::with_max_stale(1, 1));
        let view = read_str(&raw, &spec);
        assert!(view.user.is_empty(), "U2 is 2 entries behind the tail, should be excluded at max_stale=1");

        let spec = CollectSpec::new().with_user(RoleQuota::with_max_stale(1, 3));
        let view = read_str(&raw, &spec);
        assert_eq!(view.user.len(), 1);
        assert_eq!(view.user[0].content, "U2");
    }

    #[test]
    fn interruption_filtered_from_tool_results() {
        let raw = r#"{"message":{"role":"user","content":[{"type":"tool_result","tool_use_id":"x","content":"The user doesn't want to take this action right now. STOP what you are doing and wait for the user."}]}}"#;
        let spec = CollectSpec::new().with_tool_result(ToolResultQuota::new(5));
        let view = read_str(raw, &spec);
        assert!(view.tool_result.is_empty());
    }

    #[test]
    fn unreadable_file_returns_empty_view() {
        let view = read(Path::new("/nonexistent/path.jsonl"), &CollectSpec::new());
        assert!(view.user.is_empty());
        assert!(view.assistant.is_empty());
        assert!(view.tool_result.is_empty());
    }

    #[test]
    fn malformed_lines_are_skipped() {
        let raw = format!("not json\n{}\n", line("user", "hello"));
        let spec = CollectSpec::new().with_user(RoleQuota::new(1));
        let view = read_str(&raw, &spec);
        assert_eq!(view.user.len(), 1);
        assert_eq!(view.user[0].content, "hello");
    }

    #[test]
    fn read_is_idempotent() {
        let raw = [line("user", "hi"), line("assistant", "hello")].join("\n");
        let spec = CollectSpec::new().with_user(RoleQuota::new(1)).with_assistant(RoleQuota::new(1));
        let view1 = read_str(&raw, &spec);
        let view2 = read_str(&raw, &spec);
        assert_eq!(view1.user, view2.user);
        assert_eq!(view1.assistant, view2.assistant);
    }

    #[test]
    fn linearized_view_is_monotonic_by_index() {
        let raw = [line("user", "hi"), line("assistant", "hello"), line("user", "bye")].join("\n");
        let spec = CollectSpec::new().with_user(RoleQuota::new(2)).with_assistant(RoleQuota::new(1));
        let view = read_str(&raw, &spec);
        let linear = view.linearized();
        for pair in linear.windows(2) {
            assert!(pair[0].index <= pair[1].index);
        }
    }

    #[test]
    fn forward_scan_recovers_first_user_message() {
        let raw = [
            line("user", "first message sets context"),
            line("assistant", "ack"),
            line("user", "second message"),
            line("assistant", "ack2"),
            line("user", "third message"),
        ]
        .join("\n");

        // Quota of 1 would normally only grab the last user message.
        let spec = CollectSpec::new()
            .with_user(RoleQuota::new(1))
            .with_assistant(RoleQuota::new(0));
        let mut spec = spec;
        spec.include_first_user_message = true;
        let view = read_str(&raw, &spec);

        assert_eq!(view.user.len(), 2);
        assert_eq!(view.user[0].content, "first message sets context");
    }

    #[test]
    fn plan_approval_synthesizes_trailing_user_message() {
        let raw = r#"{"message":{"role":"user","content":[{"type":"tool_result","tool_use_id":"x","content":"ExitPlanMode approved by user"}]}}"#;
        let mut spec = CollectSpec::new().with_tool_result(ToolResultQuota::new(5));
        spec.detect_plan_approval = true;
        let view = read_str(raw, &spec);
        assert!(view.user.iter().any(|m| m.index == SYNTHETIC_INDEX));
        let linear = view.linearized();
        assert_eq!(linear.last().unwrap().index, SYNTHETIC_INDEX);
    }

    #[test]
    fn slash_command_metadata_extracted() {
        let raw = format!(
            "{}\n{}",
            r#"{"message":{"role":"user","content":"---\nallowed-tools: [mcp__repo__commit]\ndescription: commit\n---\nDo the commit."}}"#,
            line("assistant", "ok")
        );
        let mut spec = CollectSpec::new().with_user(RoleQuota::new(1));
        spec.extract_slash_command = true;
        let view = read_str(&raw, &spec);
        let ctx = view.slash_command.expect("slash command should be extracted");
        assert_eq!(ctx.description.as_deref(), Some("commit"));
        assert_eq!(ctx.allowed_tools, Some(vec!["mcp__repo__commit".to_string()]));
    }
}
