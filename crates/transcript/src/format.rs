//! Linearize a collected view into an LLM-ready transcript and run the
//! deterministic error-pattern pre-filter over it.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::view::{CollectedRole, CollectedView};

/// Render `view` as role-prefixed lines ordered by `index`, for use in
/// validator prompts and as input to [`error_prefilter`].
pub fn format_for_llm(view: &CollectedView) -> String {
    view.linearized()
        .into_iter()
        .map(|msg| {
            let prefix = match msg.role {
                CollectedRole::User => "USER",
                CollectedRole::Assistant => "ASSISTANT",
                CollectedRole::ToolResult => "TOOL_RESULT",
            };
            format!("{prefix}: {}", msg.content)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

static TOOL_RESULT_ERROR_PATTERNS: &[&str] = &[
    r"error TS\d+",
    r"Error:",
    r"(?i)failed",
    r"(?i)denied",
    r"make: \*\*\*",
];

static FRUSTRATION_PATTERNS: &[&str] = &[
    r"\bignore\b",
    r"\b[A-Z]{5,}\b",
    r"\bstop (doing|trying|that)\b",
    r"\bI (said|told|asked)\b",
    r"(?i)wrong[^.]*you",
];

static TOOL_RESULT_ERROR_RE: Lazy<Vec<Regex>> = Lazy::new(|| compile(TOOL_RESULT_ERROR_PATTERNS));
static FRUSTRATION_RE: Lazy<Vec<Regex>> = Lazy::new(|| compile(FRUSTRATION_PATTERNS));

fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns.iter().map(|p| Regex::new(p).expect("pattern must compile")).collect()
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorScan {
    pub needs_llm_check: bool,
    pub matched_patterns: Vec<String>,
}

/// Deterministic gate deciding whether the error-acknowledge validator
/// should invoke its LLM at all. Scans TOOL_RESULT-prefixed lines for
/// error-like substrings, and USER-prefixed lines for frustration markers.
pub fn error_prefilter(formatted: &str) -> ErrorScan {
    let mut matched = Vec::new();

    for line in formatted.lines() {
        if let Some(rest) = line.strip_prefix("TOOL_RESULT: ") {
            for (pattern, re) in TOOL_RESULT_ERROR_PATTERNS.iter().zip(TOOL_RESULT_ERROR_RE.iter()) {
                if re.is_match(rest) {
                    matched.push((*pattern).to_string());
                }
            }
        } else if let Some(rest) = line.strip_prefix("USER: ") {
            for (pattern, re) in FRUSTRATION_PATTERNS.iter().zip(FRUSTRATION_RE.iter()) {
                if re.is_match(rest) {
                    matched.push((*pattern).to_string());
                }
            }
        }
    }

    ErrorScan {
        needs_llm_check: !matched.is_empty(),
        matched_patterns: matched,
    }
}
