//! Question classification — distinguishes a question the assistant should
//! have routed through the structured `AskUserQuestion` tool from a
//! self-directed or rhetorical one, and detects plan-approval phrasing that
//! should have gone through the structured `ExitPlanMode` tool instead of
//! plain text.

use once_cell::sync::Lazy;
use regex::Regex;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuestionKind {
    /// Addressed at the user: "Should I…", "Would you like…", "Which … do you prefer?"
    UserDirected,
    /// Addressed at the assistant itself, e.g. reasoning out loud.
    SelfDirected,
    /// Not actually asking for a decision: "isn't that great?", embedded in a quote.
    Rhetorical,
}

static USER_DIRECTED: &[&str] = &[
    r"(?i)\bshould i\b",
    r"(?i)\bwould you like\b",
    r"(?i)\bdo you want\b",
    r"(?i)\bwhich .* do you prefer\b",
    r"(?i)\bcan you (confirm|clarify|tell me)\b",
    r"(?i)\bwhat would you like\b",
];

static SELF_DIRECTED: &[&str] = &[
    r"(?i)\blet me (check|see|think)\b",
    r"(?i)\bwhat (is|are) (being said|happening)\b",
    r"(?i)\bi wonder\b",
];

static PLAN_APPROVAL: &[&str] = &[
    r"(?i)here'?s my plan\b",
    r"(?i)ready to proceed\??",
    r"(?i)shall i proceed\??",
    r"(?i)let me know if (this|that) (plan )?(looks good|works)\b",
    r"(?i)does this (plan )?(look|sound) good\??",
];

static USER_DIRECTED_RE: Lazy<Vec<Regex>> = Lazy::new(|| compile(USER_DIRECTED));
static SELF_DIRECTED_RE: Lazy<Vec<Regex>> = Lazy::new(|| compile(SELF_DIRECTED));
static PLAN_APPROVAL_RE: Lazy<Vec<Regex>> = Lazy::new(|| compile(PLAN_APPROVAL));

fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .map(|p| Regex::new(p).expect("question pattern must compile"))
        .collect()
}

fn contains_question_mark_outside_quotes(text: &str) -> bool {
    let mut in_quotes = false;
    for c in text.chars() {
        match c {
            '"' | '`' => in_quotes = !in_quotes,
            '?' if !in_quotes => return true,
            _ => {}
        }
    }
    false
}

/// Classify the question-like nature of `text`. Returns `None` if the text
/// is not phrased as a question at all (no `?` outside a quoted span, and no
/// recognized question-word opener).
pub fn classify_question(text: &str) -> Option<QuestionKind> {
    if USER_DIRECTED_RE.iter().any(|re| re.is_match(text)) {
        return Some(QuestionKind::UserDirected);
    }
    if SELF_DIRECTED_RE.iter().any(|re| re.is_match(text)) {
        return Some(QuestionKind::SelfDirected);
    }
    if contains_question_mark_outside_quotes(text) {
        return Some(QuestionKind::Rhetorical);
    }
    None
}

/// Plain-text question pre-filter for the stop-hook: fires on a `?` outside
/// quotes, or a recognized user-directed opener, regardless of rhetorical
/// phrasing — the LLM classifier is the arbiter, this is just the
/// deterministic gate deciding whether to invoke it.
pub fn looks_like_plain_text_question(text: &str) -> bool {
    classify_question(text).is_some()
}

/// Detect phrasing that suggests the assistant presented a plan for
/// approval in plain text instead of calling the structured `ExitPlanMode`
/// tool.
pub fn detect_plan_approval_phrasing(text: &str) -> bool {
    PLAN_APPROVAL_RE.iter().any(|re| re.is_match(text))
}

/// Strip quoted spans (content inside matching `"…"` or `` `…` ``) and
/// extract the first real question from the remaining text — used by the
/// stop-hook's independent "short ack to a real question" check, which must
/// not fire on a question embedded in a quoted code snippet or error message.
pub fn extract_real_question(text: &str) -> Option<String> {
    let stripped = strip_quoted_spans(text);
    let mut best: Option<String> = None;
    for sentence in stripped.split(['.', '\n']) {
        let trimmed = sentence.trim();
        if trimmed.ends_with('?') && trimmed.len() > 3 {
            best = Some(trimmed.to_string());
        }
    }
    best
}

fn strip_quoted_spans(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_quotes = false;
    for c in text.chars() {
        match c {
            '"' | '`' => in_quotes = !in_quotes,
            _ if in_quotes => {}
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_directed_question_classified() {
        assert_eq!(
            classify_question("Should I use tabs or spaces?"),
            Some(QuestionKind::UserDirected)
        );
    }

    #[test]
    fn self_directed_question_classified() {
        assert_eq!(
            classify_question("Let me check what is happening here."),
            Some(QuestionKind::SelfDirected)
        );
    }

    #[test]
    fn plain_statement_is_not_a_question() {
        assert_eq!(classify_question("I fixed the bug."), None);
    }

    #[test]
    fn question_mark_inside_quote_is_ignored() {
        assert_eq!(
            classify_question("The error says \"why did this fail?\" in the log."),
            None
        );
    }

    #[test]
    fn plan_approval_phrasing_detected() {
        assert!(detect_plan_approval_phrasing(
            "Here's my plan: 1. Do X 2. Do Y. Ready to proceed?"
        ));
    }

    #[test]
    fn extract_real_question_ignores_quoted_text() {
        let text = "The build log has \"what is going on?\" in it. Why does the build fail?";
        assert_eq!(
            extract_real_question(text),
            Some("Why does the build fail?".to_string())
        );
    }

    #[test]
    fn extract_real_question_returns_none_without_question() {
        assert_eq!(extract_real_question("I'll look into it."), None);
    }
}
