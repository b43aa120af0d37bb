//! Command blacklist — shell-like tool inputs that have a structured-tool
//! alternative, plus the workaround-category groupings used only by the
//! denial counter.

use once_cell::sync::Lazy;
use regex::Regex;

/// One blacklist rule: a compiled pattern, its short name, and the
/// alternative text surfaced to the assistant.
struct Rule {
    pattern: Lazy<Regex>,
    name: &'static str,
    alternative: &'static str,
}

macro_rules! rule {
    ($re:expr, $name:expr, $alt:expr) => {
        Rule {
            pattern: Lazy::new(|| Regex::new($re).expect("blacklist pattern must compile")),
            name: $name,
            alternative: $alt,
        }
    };
}

static RULES: &[Rule] = &[
    rule!(
        r"\bcat\s+\S",
        "file-read-via-cat",
        "use the Read tool instead of `cat`"
    ),
    rule!(
        r"\b(grep|egrep|fgrep)\b",
        "search-via-grep",
        "use the Grep tool instead of shelling out to grep"
    ),
    rule!(
        r"\bfind\s+\S.*-name\b",
        "search-via-find",
        "use the Glob tool instead of `find -name`"
    ),
    rule!(
        r"\bls\s",
        "list-via-ls",
        "use a structured directory-listing tool instead of `ls`"
    ),
    rule!(
        r">>?\s*\S+\.\w+",
        "write-via-redirection",
        "use the Write or Edit tool instead of shell redirection"
    ),
    rule!(r"\bcd\s+\S+\s*&&", "cd-chain", "pass an absolute path instead of `cd && ...`"),
    rule!(r"^\s*cd\s+\S+\s*$", "bare-cd", "pass `cwd` explicitly instead of a bare `cd`"),
    rule!(
        r"\bgit\s+push\b",
        "git-push",
        "ask the user before pushing; this sidecar does not approve pushes implicitly"
    ),
    rule!(
        r"\bgit\s+(merge|rebase)\b",
        "git-merge-rebase",
        "confirm with the user before merging or rebasing"
    ),
    rule!(
        r"\bgit\s+reset\s+--hard\b",
        "git-reset-hard",
        "confirm with the user before discarding local changes"
    ),
    rule!(
        r"\b(npm|yarn|pnpm)\s+run\s+build\b|\bcargo\s+build\b|\bmake\s+build\b",
        "manual-build",
        "prefer the project's own build task runner over an ad hoc build command"
    ),
    rule!(
        r"\btsc\b|\bcargo\s+check\b",
        "manual-typecheck",
        "let the lazy validator's background check cover this instead of a manual type-check"
    ),
    rule!(
        r"\beslint\b|\bclippy\b",
        "manual-lint",
        "let the style-drift validator cover this instead of a manual lint pass"
    ),
    rule!(
        r"\b(npm|yarn|pnpm)\s+test\b|\bcargo\s+test\b|\bpytest\b",
        "manual-test",
        "run tests through the project's configured test task, not ad hoc"
    ),
    rule!(r"\bssh\s+\S", "ssh", "do not open remote shells from a tool call"),
    rule!(
        r"\bnohup\b|&\s*$|\btail\s+-f\b",
        "long-lived-process",
        "do not start a long-lived or backgrounded process from a tool call"
    ),
];

/// Workaround categories group related blacklist hits for the denial
/// counter. These are substring checks, not regexes — they only need to
/// bucket an already-denied command, not decide whether to deny it.
static WORKAROUND_SUBSTRINGS: &[(WorkaroundCategory, &[&str])] = &[
    (
        WorkaroundCategory::TypeCheck,
        &["tsc", "cargo check", "mypy", "pyright"],
    ),
    (
        WorkaroundCategory::Build,
        &["npm run build", "yarn build", "pnpm build", "cargo build", "make build"],
    ),
    (WorkaroundCategory::Lint, &["eslint", "clippy", "ruff", "flake8"]),
    (
        WorkaroundCategory::Test,
        &["npm test", "yarn test", "pnpm test", "cargo test", "pytest", "go test"],
    ),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkaroundCategory {
    TypeCheck,
    Build,
    Lint,
    Test,
}

impl WorkaroundCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            WorkaroundCategory::TypeCheck => "type-check",
            WorkaroundCategory::Build => "build",
            WorkaroundCategory::Lint => "lint",
            WorkaroundCategory::Test => "test",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlacklistHit {
    pub name: &'static str,
    pub alternative: &'static str,
}

impl BlacklistHit {
    /// Render as the `[BLACKLIST: name] alternative` highlight string
    /// injected into tool-approve prompts.
    pub fn highlight(&self) -> String {
        format!("[BLACKLIST: {}] {}", self.name, self.alternative)
    }
}

/// Scan a shell-like command string and return every matching blacklist
/// rule, most-specific matches (like `cd && chain`) alongside general ones
/// (`bare cd`) when both apply — callers decide what to do with duplicates.
pub fn blacklist_highlights(command: &str) -> Vec<BlacklistHit> {
    RULES
        .iter()
        .filter(|rule| rule.pattern.is_match(command))
        .map(|rule| BlacklistHit {
            name: rule.name,
            alternative: rule.alternative,
        })
        .collect()
}

/// Classify a denied command into a workaround category, if it matches one.
/// Used only by the denial counter, never by the tool-approve prompt.
pub fn workaround_category(command: &str) -> Option<WorkaroundCategory> {
    let lower = command.to_lowercase();
    WORKAROUND_SUBSTRINGS
        .iter()
        .find(|(_, substrings)| substrings.iter().any(|s| lower.contains(s)))
        .map(|(category, _)| *category)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cd_and_chain_matches_both_cd_and_chain_rules() {
        let hits = blacklist_highlights("cd /tmp && ls");
        let names: Vec<_> = hits.iter().map(|h| h.name).collect();
        assert!(names.contains(&"cd-chain"));
        assert!(names.contains(&"list-via-ls"));
    }

    #[test]
    fn safe_command_has_no_hits() {
        assert!(blacklist_highlights("echo hi").is_empty());
    }

    #[test]
    fn highlight_format() {
        let hit = BlacklistHit {
            name: "ssh",
            alternative: "do not open remote shells from a tool call",
        };
        assert_eq!(
            hit.highlight(),
            "[BLACKLIST: ssh] do not open remote shells from a tool call"
        );
    }

    #[test]
    fn workaround_category_groups_build_commands() {
        assert_eq!(workaround_category("npm run build"), Some(WorkaroundCategory::Build));
        assert_eq!(workaround_category("cargo test --all"), Some(WorkaroundCategory::Test));
        assert_eq!(workaround_category("echo hi"), None);
    }
}
