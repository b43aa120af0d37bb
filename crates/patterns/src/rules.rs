//! Content rule violations — planning over-engineering signals: time
//! estimates, "Est. time" style headers, and timeline markers. These are
//! injected as highlights into the plan-validate prompt.

use once_cell::sync::Lazy;
use regex::Regex;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleViolation {
    pub name: &'static str,
    pub line: String,
    pub message: &'static str,
}

impl RuleViolation {
    pub fn highlight(&self) -> String {
        format!("[VIOLATION: {}] \"{}\" → {}", self.name, self.line, self.message)
    }
}

struct Rule {
    pattern: Lazy<Regex>,
    name: &'static str,
    message: &'static str,
}

macro_rules! rule {
    ($re:expr, $name:expr, $msg:expr) => {
        Rule {
            pattern: Lazy::new(|| Regex::new($re).expect("rule pattern must compile")),
            name: $name,
            message: $msg,
        }
    };
}

static RULES: &[Rule] = &[
    rule!(
        r"\b\d+\s*[-–]\s*\d+\s*(h|hr|hrs|hours|d|days?)\b",
        "time-estimate",
        "plans should not contain time estimates"
    ),
    rule!(
        r"(?i)\best\.?\s*time\b|\btotal estimated time\b",
        "time-estimate-header",
        "remove estimated-time headers from the plan"
    ),
    rule!(
        r"(?i)^\s*(week|day)\s*\d+\s*:",
        "timeline-marker",
        "remove week/day timeline markers from the plan"
    ),
];

/// Scan plan/document text line by line and return every rule violation,
/// one per offending line.
pub fn content_rule_violations(text: &str) -> Vec<RuleViolation> {
    let mut hits = Vec::new();
    for line in text.lines() {
        for rule in RULES {
            if rule.pattern.is_match(line) {
                hits.push(RuleViolation {
                    name: rule.name,
                    line: line.trim().to_string(),
                    message: rule.message,
                });
            }
        }
    }
    hits
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_time_estimate_range() {
        let hits = content_rule_violations("Implement the feature (4-6h)");
        assert!(hits.iter().any(|h| h.name == "time-estimate"));
    }

    #[test]
    fn detects_estimated_time_header() {
        let hits = content_rule_violations("Est. time: 2 days\nDo the thing.");
        assert!(hits.iter().any(|h| h.name == "time-estimate-header"));
    }

    #[test]
    fn detects_timeline_marker() {
        let hits = content_rule_violations("Week 3: ship the feature");
        assert!(hits.iter().any(|h| h.name == "timeline-marker"));
    }

    #[test]
    fn clean_plan_has_no_violations() {
        assert!(content_rule_violations("1. Read the file\n2. Apply the fix").is_empty());
    }
}
