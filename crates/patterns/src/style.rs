//! Style-drift detection: quote direction, semicolon and trailing-comma
//! additions/removals between an edit's old and new text, plus emoji
//! insertion detection used by the style-drift validator's fast paths.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuotePreference {
    Single,
    Double,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StyleFindingKind {
    Quote,
    Semicolon,
    TrailingComma,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyleFinding {
    pub kind: StyleFindingKind,
    /// Human-readable detail, e.g. `"' → \""` or `"added"` / `"removed"`.
    pub detail: String,
    pub matches_preference: bool,
    pub violates_preference: bool,
}

/// Compare an edit's old and new fragments and report style findings. A
/// missing preference (e.g. for semicolon/trailing-comma, which have no
/// configured direction) always reports `matches_preference: false,
/// violates_preference: false`.
pub fn style_diff(old: &str, new: &str, quote_preference: QuotePreference) -> Vec<StyleFinding> {
    let mut findings = Vec::new();

    if let Some(finding) = quote_direction(old, new, quote_preference) {
        findings.push(finding);
    }
    if let Some(finding) = trailing_token_change(old, new, ';', StyleFindingKind::Semicolon) {
        findings.push(finding);
    }
    if let Some(finding) = trailing_token_change(old, new, ',', StyleFindingKind::TrailingComma) {
        findings.push(finding);
    }

    findings
}

fn quote_direction(old: &str, new: &str, preference: QuotePreference) -> Option<StyleFinding> {
    let old_single = old.matches('\'').count();
    let old_double = old.matches('"').count();
    let new_single = new.matches('\'').count();
    let new_double = new.matches('"').count();

    let direction = if new_double > old_double && new_single < old_single {
        "' → \""
    } else if new_single > old_single && new_double < old_double {
        "\" → '"
    } else {
        return None;
    };

    let went_to_double = direction == "' → \"";
    let matches_preference = match preference {
        QuotePreference::Double => went_to_double,
        QuotePreference::Single => !went_to_double,
    };

    Some(StyleFinding {
        kind: StyleFindingKind::Quote,
        detail: direction.to_string(),
        matches_preference,
        violates_preference: !matches_preference,
    })
}

fn trailing_token_change(old: &str, new: &str, token: char, kind: StyleFindingKind) -> Option<StyleFinding> {
    let old_trimmed = old.trim_end();
    let new_trimmed = new.trim_end();
    let old_has = old_trimmed.ends_with(token);
    let new_has = new_trimmed.ends_with(token);

    if old_has == new_has {
        return None;
    }

    // Ignore the case where the only difference is the trailing token itself
    // disappearing because the whole line was deleted — callers only invoke
    // this for genuine same-statement edits.
    let detail = if new_has { "added" } else { "removed" };
    Some(StyleFinding {
        kind,
        detail: detail.to_string(),
        matches_preference: false,
        violates_preference: false,
    })
}

/// Unicode ranges covering the common emoji blocks. Not exhaustive, but
/// covers every codepoint a model is realistically going to insert.
fn is_emoji(c: char) -> bool {
    matches!(c as u32,
        0x1F300..=0x1FAFF
        | 0x2600..=0x27BF
        | 0x2190..=0x21FF
        | 0x2B00..=0x2BFF
        | 0xFE00..=0xFE0F
        | 0x1F1E6..=0x1F1FF
    )
}

/// Return every emoji codepoint present in `new` but not in `old`, in the
/// order they appear.
pub fn detect_emoji_additions(old: &str, new: &str) -> Vec<char> {
    let old_emoji: std::collections::HashSet<char> = old.chars().filter(|c| is_emoji(*c)).collect();
    new.chars()
        .filter(|c| is_emoji(*c) && !old_emoji.contains(c))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quote_change_toward_double_preference_matches() {
        let findings = style_diff("const x = 'a';", "const x = \"a\";", QuotePreference::Double);
        let quote = findings.iter().find(|f| f.kind == StyleFindingKind::Quote).unwrap();
        assert!(quote.matches_preference);
        assert!(!quote.violates_preference);
        assert_eq!(quote.detail, "' → \"");
    }

    #[test]
    fn quote_change_away_from_double_preference_violates() {
        let findings = style_diff("const x = \"a\";", "const x = 'a';", QuotePreference::Double);
        let quote = findings.iter().find(|f| f.kind == StyleFindingKind::Quote).unwrap();
        assert!(!quote.matches_preference);
        assert!(quote.violates_preference);
    }

    #[test]
    fn no_quote_change_reports_nothing() {
        let findings = style_diff("const x = 1;", "const x = 2;", QuotePreference::Double);
        assert!(findings.iter().all(|f| f.kind != StyleFindingKind::Quote));
    }

    #[test]
    fn semicolon_addition_detected() {
        let findings = style_diff("let x = 1", "let x = 1;", QuotePreference::Double);
        let semi = findings.iter().find(|f| f.kind == StyleFindingKind::Semicolon).unwrap();
        assert_eq!(semi.detail, "added");
    }

    #[test]
    fn trailing_comma_removed_detected() {
        let findings = style_diff("[1, 2,]", "[1, 2]", QuotePreference::Double);
        let comma = findings
            .iter()
            .find(|f| f.kind == StyleFindingKind::TrailingComma)
            .unwrap();
        assert_eq!(comma.detail, "removed");
    }

    #[test]
    fn emoji_addition_detected() {
        let added = detect_emoji_additions("Done", "Done 🎉");
        assert_eq!(added, vec!['🎉']);
    }

    #[test]
    fn no_emoji_addition_when_unchanged() {
        assert!(detect_emoji_additions("Done 🎉", "Done 🎉 now").is_empty());
    }
}
