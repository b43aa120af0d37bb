use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Token usage, normalized across provider-specific field names.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub cached_tokens: u32,
    pub reasoning_tokens: u32,
}

impl Usage {
    /// Accepts both the vendor-native shape (`input_tokens`/`output_tokens`,
    /// `cache_read_input_tokens`) and the OpenAI-compatible proxy shape
    /// (`prompt_tokens`/`completion_tokens`, nested
    /// `prompt_tokens_details.cached_tokens` and
    /// `completion_tokens_details.reasoning_tokens`).
    pub fn from_provider_json(value: &Value) -> Option<Self> {
        let as_u32 = |v: Option<&Value>| v.and_then(Value::as_u64).unwrap_or(0) as u32;

        let prompt_tokens = as_u32(value.get("input_tokens")).max(as_u32(value.get("prompt_tokens")));
        let completion_tokens = as_u32(value.get("output_tokens")).max(as_u32(value.get("completion_tokens")));
        if prompt_tokens == 0 && completion_tokens == 0 {
            return None;
        }

        let cached_tokens = as_u32(value.get("cache_read_input_tokens")).max(
            value
                .get("prompt_tokens_details")
                .and_then(|details| details.get("cached_tokens"))
                .and_then(Value::as_u64)
                .unwrap_or(0) as u32,
        );

        let reasoning_tokens = value
            .get("completion_tokens_details")
            .and_then(|details| details.get("reasoning_tokens"))
            .and_then(Value::as_u64)
            .unwrap_or(0) as u32;

        Some(Self { prompt_tokens, completion_tokens, cached_tokens, reasoning_tokens })
    }
}
