//! The collected transcript view and the spec that shapes it.

use serde::{Deserialize, Serialize};

/// A target quota for one role: how many messages to collect, and how far
/// back from the tail (in raw entry count) a message may be before it's
/// considered stale and excluded.
#[derive(Debug, Clone, Copy)]
pub struct RoleQuota {
    pub count: usize,
    pub max_stale: Option<usize>,
}

impl RoleQuota {
    pub fn new(count: usize) -> Self {
        Self { count, max_stale: None }
    }

    pub fn with_max_stale(count: usize, max_stale: usize) -> Self {
        Self { count, max_stale: Some(max_stale) }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ToolResultQuota {
    pub count: usize,
    pub max_stale: Option<usize>,
    pub trim: bool,
    pub max_lines: usize,
}

impl ToolResultQuota {
    pub fn new(count: usize) -> Self {
        Self { count, max_stale: None, trim: false, max_lines: 0 }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CollectSpec {
    pub user: Option<RoleQuota>,
    pub assistant: Option<RoleQuota>,
    pub tool_result: Option<ToolResultQuota>,
    /// Tool names excluded from `tool_result` collection (resolved via the
    /// forward `tool_use_id -> tool_name` map).
    pub exclude_tool_results_for: Vec<String>,
    pub drop_system_reminders: bool,
    pub drop_slash_command_prompts: bool,
    pub include_first_user_message: bool,
    pub detect_plan_approval: bool,
    pub extract_slash_command: bool,
}

impl CollectSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(mut self, quota: RoleQuota) -> Self {
        self.user = Some(quota);
        self
    }

    pub fn with_assistant(mut self, quota: RoleQuota) -> Self {
        self.assistant = Some(quota);
        self
    }

    pub fn with_tool_result(mut self, quota: ToolResultQuota) -> Self {
        self.tool_result = Some(quota);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollectedRole {
    User,
    Assistant,
    ToolResult,
}

/// Index `u64::MAX` marks the synthetic "plan approved" entry so a
/// sort-by-index always places it last without a special-cased `Option`.
pub const SYNTHETIC_INDEX: u64 = u64::MAX;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectedMessage {
    pub role: CollectedRole,
    pub content: String,
    pub index: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct SlashCommandContext {
    pub command_name: String,
    pub description: Option<String>,
    pub allowed_tools: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default)]
pub struct CollectedView {
    pub user: Vec<CollectedMessage>,
    pub assistant: Vec<CollectedMessage>,
    pub tool_result: Vec<CollectedMessage>,
    pub slash_command: Option<SlashCommandContext>,
}

impl CollectedView {
    /// Linearize every collected message by `index`, role-prefixed, for LLM
    /// prompt construction. Ties are broken user-before-assistant-before-tool
    /// for determinism; ordering by `index` alone is otherwise stable.
    pub fn linearized(&self) -> Vec<&CollectedMessage> {
        let mut all: Vec<&CollectedMessage> = self
            .user
            .iter()
            .chain(self.assistant.iter())
            .chain(self.tool_result.iter())
            .collect();
        all.sort_by_key(|m| m.index);
        all
    }

    pub fn is_subagent_view(&self) -> bool {
        self.user.is_empty() && self.assistant.is_empty() && self.tool_result.is_empty()
    }
}
