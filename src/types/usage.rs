//! Token usage accounting types.

use serde::{Deserialize, Serialize};

/// Token usage snapshot for a generation.
///
/// Providers report running totals, not deltas, so a later snapshot
/// supersedes an earlier one wholesale. See [`replace_usage`].
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning_tokens: Option<u32>,
    pub total_tokens: u32,
}

impl Usage {
    pub fn new(prompt_tokens: u32, completion_tokens: u32, total_tokens: u32) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            reasoning_tokens: None,
            total_tokens,
        }
    }
}

/// Accumulation rule for the usage channel: the latest non-null snapshot
/// wins. Shared by the relay-side transcript and the demultiplexer.
pub fn replace_usage(slot: &mut Option<Usage>, latest: &Usage) {
    *slot = Some(latest.clone());
}
