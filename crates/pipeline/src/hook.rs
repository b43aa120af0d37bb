//! Hook stdin/stdout wire shapes. §6: the host writes one JSON object to
//! stdin and reads exactly one back from stdout, whatever the outcome.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const PRE_TOOL_USE_EVENT: &str = "PreToolUse";
pub const STOP_EVENT: &str = "Stop";

#[derive(Debug, Clone, Deserialize)]
pub struct HookInput {
    #[serde(default)]
    pub tool_name: Option<String>,
    #[serde(default)]
    pub tool_input: Value,
    pub transcript_path: String,
    #[serde(default)]
    pub cwd: String,
    pub hook_event_name: String,
    #[serde(default)]
    pub permission_mode: Option<String>,
    /// Everything the host sends that this sidecar doesn't name explicitly.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl HookInput {
    pub fn tool_name(&self) -> &str {
        self.tool_name.as_deref().unwrap_or("")
    }

    pub fn is_plan_mode(&self) -> bool {
        self.permission_mode.as_deref() == Some("plan")
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HookSpecificOutput {
    #[serde(rename = "hookEventName")]
    pub hook_event_name: String,
    #[serde(rename = "permissionDecision")]
    pub permission_decision: String,
    #[serde(rename = "permissionDecisionReason", skip_serializing_if = "Option::is_none")]
    pub permission_decision_reason: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HookDecision {
    #[serde(rename = "hookSpecificOutput")]
    pub hook_specific_output: HookSpecificOutput,
    #[serde(rename = "systemMessage", skip_serializing_if = "Option::is_none")]
    pub system_message: Option<String>,
    /// Not serialized to the host. §6: exit codes are 0 for any decision a
    /// validator reached (allow or deny) and nonzero only when the sidecar
    /// itself could not produce one — this flag is how `main` tells the
    /// two apart after the JSON has already been written.
    #[serde(skip)]
    pub is_sidecar_error: bool,
}

impl HookDecision {
    pub fn allow(hook_event_name: impl Into<String>) -> Self {
        Self {
            hook_specific_output: HookSpecificOutput {
                hook_event_name: hook_event_name.into(),
                permission_decision: "allow".to_string(),
                permission_decision_reason: None,
            },
            system_message: None,
            is_sidecar_error: false,
        }
    }

    pub fn deny(hook_event_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            hook_specific_output: HookSpecificOutput {
                hook_event_name: hook_event_name.into(),
                permission_decision: "deny".to_string(),
                permission_decision_reason: Some(reason.into()),
            },
            system_message: None,
            is_sidecar_error: false,
        }
    }

    pub fn with_system_message(mut self, message: impl Into<String>) -> Self {
        self.system_message = Some(message.into());
        self
    }

    /// §4.6 final paragraph / §7 taxonomy #4: any uncaught error becomes a
    /// generic deny, never a hang — but unlike a validator's own denial,
    /// this one exits nonzero per §6.
    pub fn hook_error(hook_event_name: impl Into<String>, detail: impl std::fmt::Display) -> Self {
        let mut decision = Self::deny(hook_event_name, format!("Hook error: {detail}"));
        decision.is_sidecar_error = true;
        decision
    }

    pub fn is_deny(&self) -> bool {
        self.hook_specific_output.permission_decision == "deny"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allow_has_no_reason() {
        let decision = HookDecision::allow(PRE_TOOL_USE_EVENT);
        let rendered = serde_json::to_value(&decision).unwrap();
        assert!(rendered["hookSpecificOutput"].get("permissionDecisionReason").is_none());
        assert!(rendered.get("systemMessage").is_none());
    }

    #[test]
    fn deny_carries_reason() {
        let decision = HookDecision::deny(PRE_TOOL_USE_EVENT, "nope");
        assert_eq!(decision.hook_specific_output.permission_decision_reason.as_deref(), Some("nope"));
    }

    #[test]
    fn hook_error_prefixes_detail() {
        let decision = HookDecision::hook_error(PRE_TOOL_USE_EVENT, "stdin timed out");
        assert_eq!(
            decision.hook_specific_output.permission_decision_reason.as_deref(),
            Some("Hook error: stdin timed out")
        );
    }

    #[test]
    fn hook_error_is_flagged_distinct_from_a_validator_denial() {
        let error = HookDecision::hook_error(PRE_TOOL_USE_EVENT, "boom");
        let denial = HookDecision::deny(PRE_TOOL_USE_EVENT, "destructive command");
        assert!(error.is_sidecar_error);
        assert!(!denial.is_sidecar_error);
    }

    #[test]
    fn is_sidecar_error_is_not_serialized() {
        let decision = HookDecision::hook_error(PRE_TOOL_USE_EVENT, "boom");
        let rendered = serde_json::to_value(&decision).unwrap();
        assert!(rendered.get("is_sidecar_error").is_none());
        assert!(rendered.get("isSidecarError").is_none());
    }
}
