/// The one return type every validator shares — spec.md §9's "fixed
/// pipeline modeled as a tagged variant, not a trait object" design note
/// made concrete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Allow,
    Deny(String),
    /// Nothing to report — used by short-circuits (subagent, no user
    /// message) that simply pass the pipeline through.
    Continue,
    /// The validator denied but the caller must consult Tool-Appeal
    /// before turning this into a final `Deny`.
    NeedsAppeal(String),
    /// Stop-hook variants surface a corrective message the host re-injects
    /// to the assistant, always prefixed with the autogenerated marker.
    SynthesizeFeedback(SystemMessage),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemMessage {
    pub text: String,
}

const FEEDBACK_MARKER: &str = "[AUTOGENERATED STOP HOOK FEEDBACK]";

impl SystemMessage {
    pub fn autogenerated(text: impl Into<String>) -> Self {
        Self { text: format!("{FEEDBACK_MARKER} {}", text.into()) }
    }

    pub fn carries_marker(text: &str) -> bool {
        text.contains(FEEDBACK_MARKER)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn autogenerated_message_carries_marker() {
        let message = SystemMessage::autogenerated("User question not answered");
        assert!(SystemMessage::carries_marker(&message.text));
        assert!(message.text.ends_with("User question not answered"));
    }
}
