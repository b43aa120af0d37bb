//! Tool classification the orchestrator needs before it can even build a
//! [`gatekeeper_validators::ValidatorContext`]: which tools touch files,
//! which paths are off-limits, and which tools are cheap enough to skip the
//! strict pipeline entirely.

use std::path::Path;

use serde_json::Value;

/// §4.6: `FILE_TOOLS = { read, write, edit, notebook-edit }`.
pub const FILE_TOOLS: &[&str] = &["Read", "Write", "Edit", "NotebookEdit"];

const SENSITIVE_PATH_MARKERS: &[&str] =
    &[".env", "credentials", ".ssh", ".aws", "secrets", ".key", ".pem", "password"];

/// §4.6 `LOW_RISK_TOOLS`. Deliberately excludes `AskUserQuestion` and
/// `ExitPlanMode` even though the prose glossing `LOW_RISK_TOOLS` mentions
/// "user-question tool" and "plan-mode controls" — both of those tools have
/// their own dedicated pipeline steps (4 and 9), and folding them into the
/// blanket allow-list here would make those steps unreachable. Treated as an
/// Open Question resolution; see DESIGN.md.
const LOW_RISK_TOOLS: &[&str] = &[
    "Glob",
    "Grep",
    "TodoWrite",
    "TodoRead",
    "BashOutput",
    "Skill",
    "SlashCommand",
];

const PLANS_DIR_MARKER: &str = "/plans/";
const RULES_FILENAME: &str = "CLAUDE.md";

pub fn is_file_tool(tool_name: &str) -> bool {
    FILE_TOOLS.contains(&tool_name)
}

pub fn is_low_risk_tool(tool_name: &str) -> bool {
    LOW_RISK_TOOLS.contains(&tool_name) || is_read_only_mcp_tool(tool_name)
}

fn is_read_only_mcp_tool(tool_name: &str) -> bool {
    tool_name.starts_with("mcp__")
        && ["list", "read", "get", "resource"].iter().any(|marker| tool_name.to_lowercase().contains(marker))
}

pub fn is_sensitive_path(path: &str) -> bool {
    let lower = path.to_lowercase();
    SENSITIVE_PATH_MARKERS.iter().any(|marker| lower.contains(marker))
}

pub fn is_plan_file(path: &str) -> bool {
    path.contains(PLANS_DIR_MARKER) && path.ends_with(".md")
}

pub fn is_rules_file(path: &str) -> bool {
    Path::new(path).file_name().and_then(|name| name.to_str()) == Some(RULES_FILENAME)
}

/// Pull the file path a tool call targets, whatever the argument is named
/// across the host's various file tools.
pub fn extract_file_path(tool_input: &Value) -> Option<&str> {
    tool_input
        .get("file_path")
        .or_else(|| tool_input.get("path"))
        .or_else(|| tool_input.get("notebook_path"))
        .and_then(|v| v.as_str())
}

pub fn extract_command(tool_input: &Value) -> Option<&str> {
    tool_input.get("command").and_then(|v| v.as_str())
}

/// A trusted-file edit is eligible for the lazy path only when it isn't
/// something a path-based agent (plan-validate / claude-md-validate) must
/// see synchronously.
pub fn is_trusted_file_edit(tool_name: &str, path: &str) -> bool {
    is_file_tool(tool_name) && !is_sensitive_path(path) && !is_plan_file(path) && !is_rules_file(path)
}

/// §4.6 step 1 scopes the lazy path to "a path inside the project or the
/// assistant's config directory" — a write outside both, even an
/// otherwise-unremarkable one, still goes through the strict pipeline
/// synchronously, since nothing guarantees it is project-owned code a
/// background validator is safe to rubber-stamp ahead of time.
pub fn is_within_trusted_root(path: &str, cwd: &Path) -> bool {
    let candidate = Path::new(path);
    let resolved = if candidate.is_absolute() { candidate.to_path_buf() } else { cwd.join(candidate) };
    let within_project = resolved.starts_with(cwd);
    let within_config_dir = dirs_home().map(|home| resolved.starts_with(home.join(".claude"))).unwrap_or(false);
    within_project || within_config_dir
}

fn dirs_home() -> Option<std::path::PathBuf> {
    std::env::var_os("HOME").map(std::path::PathBuf::from)
}
