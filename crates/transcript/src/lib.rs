//! Backward-scanning JSONL transcript reader with per-role quotas,
//! staleness bounds, and host/slash-command noise filtering.

mod entry;
mod format;
mod reader;
mod view;

pub use entry::{ContentBlock, ContentValue, Message, Role, TranscriptEntry, is_subagent_transcript};
pub use format::{ErrorScan, error_prefilter, format_for_llm};
pub use reader::read;
pub use view::{
    CollectSpec, CollectedMessage, CollectedRole, CollectedView, RoleQuota, SlashCommandContext,
    SYNTHETIC_INDEX, ToolResultQuota,
};
