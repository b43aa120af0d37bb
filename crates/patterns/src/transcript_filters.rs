//! Filters applied by the transcript reader to drop host-synthesized or
//! slash-command-prompt noise before it reaches a validator. Kept here,
//! rather than in `gatekeeper-transcript`, so the reader's filters and the
//! validators' prompt-construction code share one pattern-compilation
//! strategy.

use once_cell::sync::Lazy;
use regex::Regex;

/// Host-injected interruption phrasings. This is deliberately the
/// strictest superset of the two pattern families spec.md mentions across
/// revisions — filtering more aggressively is the documented contract.
static INTERRUPTION_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)the user doesn't want to take this action right now",
        r"(?i)stop what you are doing and wait for the user",
        r"\[Request interrupted by user[^\]]*\]",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("interruption pattern must compile"))
    .collect()
});

static SLASH_COMMAND_BODY_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)IMMEDIATELY call the mcp__",
        r"(?i)^allowed-tools:\s*",
    ]
    .iter()
    .map(|p| Regex::new(p).expect("slash-command pattern must compile"))
    .collect()
});

/// Drop user content beginning with `<system-reminder>` — these are
/// host-injected, not user speech.
pub fn is_system_reminder(content: &str) -> bool {
    content.trim_start().starts_with("<system-reminder>")
}

/// Recognize a slash-command system prompt either by opening YAML
/// frontmatter (`allowed-tools:` / `description:`) or by body patterns like
/// an explicit `IMMEDIATELY call the mcp__…` instruction. Slash-command
/// *metadata* is still extracted separately when requested — this only
/// decides whether the raw prompt text should be dropped from the
/// collected view.
pub fn is_slash_command_prompt(content: &str) -> bool {
    let trimmed = content.trim_start();
    if trimmed.starts_with("---") {
        let frontmatter_end = trimmed[3..].find("---").map(|i| i + 3 + 3).unwrap_or(trimmed.len());
        let frontmatter = &trimmed[..frontmatter_end];
        if frontmatter.contains("allowed-tools:") || frontmatter.contains("description:") {
            return true;
        }
    }
    SLASH_COMMAND_BODY_PATTERNS.iter().any(|re| re.is_match(content))
}

/// Recognize a host-synthesized interruption message inside a tool result.
/// Without this filter, downstream alignment agents misattribute
/// host-generated text to the user and incorrectly block the assistant.
pub fn is_host_interruption(content: &str) -> bool {
    INTERRUPTION_PATTERNS.iter().any(|re| re.is_match(content))
}
