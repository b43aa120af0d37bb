//! Raw JSONL transcript line shapes, deserialized as loosely as possible —
//! unknown fields and unknown block types must never fail a whole line, per
//! spec.md's "malformed JSON lines are skipped silently" contract (which
//! only applies to lines that don't even parse as JSON; a line that parses
//! but has an unrecognized block type should still contribute what we can
//! read from it).

use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// `content` is either a raw string or an ordered list of typed blocks.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ContentValue {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
        #[serde(default)]
        input: serde_json::Value,
    },
    ToolResult {
        tool_use_id: String,
        #[serde(default)]
        content: Option<ContentValue>,
    },
    /// Catch-all for block types this reader doesn't interpret (e.g.
    /// `thinking`, `image`) — kept so an unfamiliar block never fails
    /// deserialization of the line it's part of.
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: ContentValue,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TranscriptEntry {
    pub message: Message,
    #[serde(default, rename = "isSidechain")]
    pub is_sidechain: bool,
    #[serde(default, rename = "agentId")]
    pub agent_id: Option<String>,
}

impl ContentValue {
    /// Flatten to a single string for the simple cases a reader cares
    /// about: a raw string stays as-is; a block list concatenates its
    /// `text` blocks (other block kinds contribute nothing here — callers
    /// that need `tool_use`/`tool_result` detail walk the blocks directly).
    pub fn as_text(&self) -> String {
        match self {
            ContentValue::Text(s) => s.clone(),
            ContentValue::Blocks(blocks) => blocks
                .iter()
                .filter_map(|b| match b {
                    ContentBlock::Text { text } => Some(text.as_str()),
                    _ => None,
                })
                .collect::<Vec<_>>()
                .join(""),
        }
    }
}

/// Is this transcript file a subagent ("sidechain") transcript? Checked two
/// ways, per spec.md's error taxonomy #5: a conventional `agent-*.jsonl`
/// filename, OR the first line's metadata carrying both `isSidechain: true`
/// and a non-empty `agentId`.
pub fn is_subagent_transcript(path: &std::path::Path, first_entry: Option<&TranscriptEntry>) -> bool {
    let filename_matches = path
        .file_name()
        .and_then(|f| f.to_str())
        .map(|f| f.starts_with("agent-") && f.ends_with(".jsonl"))
        .unwrap_or(false);

    let metadata_matches = first_entry
        .map(|e| e.is_sidechain && e.agent_id.as_deref().is_some_and(|a| !a.is_empty()))
        .unwrap_or(false);

    filename_matches || metadata_matches
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_raw_string_content() {
        let line = r#"{"message":{"role":"user","content":"hello"}}"#;
        let entry: TranscriptEntry = serde_json::from_str(line).unwrap();
        assert_eq!(entry.message.content.as_text(), "hello");
    }

    #[test]
    fn parses_block_list_content() {
        let line = r#"{"message":{"role":"assistant","content":[{"type":"text","text":"hi "},{"type":"text","text":"there"}]}}"#;
        let entry: TranscriptEntry = serde_json::from_str(line).unwrap();
        assert_eq!(entry.message.content.as_text(), "hi there");
    }

    #[test]
    fn unknown_block_type_does_not_fail_parsing() {
        let line = r#"{"message":{"role":"assistant","content":[{"type":"thinking","reasoning":"..."},{"type":"text","text":"done"}]}}"#;
        let entry: TranscriptEntry = serde_json::from_str(line).unwrap();
        assert_eq!(entry.message.content.as_text(), "done");
    }

    #[test]
    fn tool_result_block_parses() {
        let line = r#"{"message":{"role":"user","content":[{"type":"tool_result","tool_use_id":"abc","content":"output text"}]}}"#;
        let entry: TranscriptEntry = serde_json::from_str(line).unwrap();
        match &entry.message.content {
            ContentValue::Blocks(blocks) => {
                assert_eq!(blocks.len(), 1);
                assert!(matches!(&blocks[0], ContentBlock::ToolResult { tool_use_id, .. } if tool_use_id == "abc"));
            }
            _ => panic!("expected block list"),
        }
    }

    #[test]
    fn subagent_detected_by_filename() {
        let path = std::path::Path::new("/tmp/agent-123.jsonl");
        assert!(is_subagent_transcript(path, None));
    }

    #[test]
    fn subagent_detected_by_metadata() {
        let path = std::path::Path::new("/tmp/main.jsonl");
        let entry: TranscriptEntry = serde_json::from_str(
            r#"{"message":{"role":"user","content":"hi"},"isSidechain":true,"agentId":"sub-1"}"#,
        )
        .unwrap();
        assert!(is_subagent_transcript(path, Some(&entry)));
    }

    #[test]
    fn main_transcript_is_not_a_subagent() {
        let path = std::path::Path::new("/tmp/main.jsonl");
        assert!(!is_subagent_transcript(path, None));
    }
}
