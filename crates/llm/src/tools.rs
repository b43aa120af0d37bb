use std::path::{Path, PathBuf};

use regex::Regex;
use serde_json::{Value, json};

/// The fixed, closed set of tools `ExecutionMode::Sdk` may expose beyond
/// the mandatory read-only three. There is deliberately no `Shell`/`Write`
/// variant — adding one would have to be a conscious enum change, not a
/// runtime toggle, per spec.md §4.4's "shell and write tools are never
/// exposed" guarantee.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtraTool {
    SpawnSubagent,
}

impl ExtraTool {
    fn schema(self) -> Value {
        match self {
            ExtraTool::SpawnSubagent => json!({
                "name": "spawn_subagent",
                "description": "Delegate a narrowly-scoped read-only question to a fresh sub-agent.",
                "input_schema": {
                    "type": "object",
                    "properties": { "prompt": { "type": "string" } },
                    "required": ["prompt"],
                },
            }),
        }
    }
}

const MAX_READ_BYTES: usize = 32_000;
const MAX_GREP_MATCHES: usize = 200;
const MAX_GLOB_ENTRIES: usize = 500;
const MAX_WALK_DEPTH: usize = 12;

/// The three mandatory tool schemas plus whatever `extra_tools` the caller
/// opted into, in Anthropic tool-definition shape (OpenAI-compatible
/// proxies accept the same `input_schema`/`parameters` fields under either
/// name; callers normalize at the call site).
pub fn tool_schemas(extra: &[ExtraTool]) -> Value {
    let mut schemas = vec![
        json!({
            "name": "Read",
            "description": "Read a UTF-8 text file, relative to the working directory.",
            "input_schema": { "type": "object", "properties": { "path": { "type": "string" } }, "required": ["path"] },
        }),
        json!({
            "name": "Glob",
            "description": "List files under a directory whose name matches a glob-like pattern (supports a single trailing '*').",
            "input_schema": {
                "type": "object",
                "properties": { "pattern": { "type": "string" }, "root": { "type": "string" } },
                "required": ["pattern"],
            },
        }),
        json!({
            "name": "Grep",
            "description": "Search a file's lines for a regular expression.",
            "input_schema": {
                "type": "object",
                "properties": { "pattern": { "type": "string" }, "path": { "type": "string" } },
                "required": ["pattern", "path"],
            },
        }),
    ];
    schemas.extend(extra.iter().map(|tool| tool.schema()));
    json!(schemas)
}

/// Execute one of the read-only tools. Returns the text to feed back as a
/// tool result; never panics on a missing file or bad pattern, returning a
/// descriptive error string instead.
pub fn run_tool(name: &str, input: &Value, working_dir: &Path) -> String {
    match name {
        "Read" => read_tool(input, working_dir),
        "Glob" => glob_tool(input, working_dir),
        "Grep" => grep_tool(input, working_dir),
        other => format!("unknown tool: {other}"),
    }
}

fn resolve(working_dir: &Path, relative: &str) -> PathBuf {
    let candidate = Path::new(relative);
    if candidate.is_absolute() { candidate.to_path_buf() } else { working_dir.join(candidate) }
}

fn read_tool(input: &Value, working_dir: &Path) -> String {
    let Some(path) = input.get("path").and_then(Value::as_str) else {
        return "Read requires a 'path' argument".to_string();
    };
    let resolved = resolve(working_dir, path);
    match std::fs::read_to_string(&resolved) {
        Ok(text) if text.len() > MAX_READ_BYTES => {
            let mut truncated: String = text.chars().take(MAX_READ_BYTES).collect();
            truncated.push_str("\n[…truncated…]");
            truncated
        }
        Ok(text) => text,
        Err(error) => format!("could not read {}: {error}", resolved.display()),
    }
}

fn glob_tool(input: &Value, working_dir: &Path) -> String {
    let Some(pattern) = input.get("pattern").and_then(Value::as_str) else {
        return "Glob requires a 'pattern' argument".to_string();
    };
    let root = input
        .get("root")
        .and_then(Value::as_str)
        .map(|root| resolve(working_dir, root))
        .unwrap_or_else(|| working_dir.to_path_buf());

    let (prefix, suffix) = match pattern.split_once('*') {
        Some((prefix, suffix)) => (prefix, suffix),
        None => (pattern, ""),
    };

    let mut matches = Vec::new();
    walk(&root, 0, &mut |path| {
        if matches.len() >= MAX_GLOB_ENTRIES {
            return;
        }
        let name = path.file_name().and_then(|name| name.to_str()).unwrap_or_default();
        if name.starts_with(prefix) && name.ends_with(suffix) {
            matches.push(path.display().to_string());
        }
    });

    if matches.is_empty() { "no matches".to_string() } else { matches.join("\n") }
}

fn walk(dir: &Path, depth: usize, visit: &mut impl FnMut(&Path)) {
    if depth > MAX_WALK_DEPTH {
        return;
    }
    let Ok(entries) = std::fs::read_dir(dir) else { return };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            walk(&path, depth + 1, visit);
        } else {
            visit(&path);
        }
    }
}

fn grep_tool(input: &Value, working_dir: &Path) -> String {
    let (Some(pattern), Some(path)) =
        (input.get("pattern").and_then(Value::as_str), input.get("path").and_then(Value::as_str))
    else {
        return "Grep requires 'pattern' and 'path' arguments".to_string();
    };

    let regex = match Regex::new(pattern) {
        Ok(regex) => regex,
        Err(error) => return format!("invalid pattern: {error}"),
    };

    let resolved = resolve(working_dir, path);
    let text = match std::fs::read_to_string(&resolved) {
        Ok(text) => text,
        Err(error) => return format!("could not read {}: {error}", resolved.display()),
    };

    let matches: Vec<String> = text
        .lines()
        .enumerate()
        .filter(|(_, line)| regex.is_match(line))
        .take(MAX_GREP_MATCHES)
        .map(|(number, line)| format!("{}:{line}", number + 1))
        .collect();

    if matches.is_empty() { "no matches".to_string() } else { matches.join("\n") }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_tool_returns_file_contents() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "hello world").unwrap();
        let result = read_tool(&json!({ "path": "a.txt" }), dir.path());
        assert_eq!(result, "hello world");
    }

    #[test]
    fn read_tool_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = read_tool(&json!({ "path": "missing.txt" }), dir.path());
        assert!(result.starts_with("could not read"));
    }

    #[test]
    fn glob_tool_matches_suffix_pattern() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.rs"), "").unwrap();
        std::fs::write(dir.path().join("b.toml"), "").unwrap();
        let result = glob_tool(&json!({ "pattern": "*.rs" }), dir.path());
        assert!(result.ends_with("a.rs"));
    }

    #[test]
    fn grep_tool_finds_matching_lines() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "one\ntwo error\nthree").unwrap();
        let result = grep_tool(&json!({ "pattern": "error", "path": "a.txt" }), dir.path());
        assert_eq!(result, "2:two error");
    }

    #[test]
    fn grep_tool_reports_invalid_pattern() {
        let dir = tempfile::tempdir().unwrap();
        let result = grep_tool(&json!({ "pattern": "(", "path": "a.txt" }), dir.path());
        assert!(result.starts_with("invalid pattern"));
    }
}
