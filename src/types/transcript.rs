//! Storage handoff structure.

use serde::{Deserialize, Serialize};

use super::annotation::Annotation;
use super::usage::Usage;

/// The channel-pure record of one finished (or cut-short) stream, handed to
/// the storage collaborator exactly once per session.
///
/// `content` never contains encoded frame markers: the relay routes frames
/// by type before any encoding happens, so marker bytes cannot leak into
/// the persisted text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Transcript {
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub annotations: Vec<Annotation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
    /// False when the stream ended early: upstream error, cancellation, or
    /// truncation.
    pub complete: bool,
}
