//! Frames: the unit exchanged between relay and demultiplexer.

use serde::{Deserialize, Serialize};

use crate::error::ErrorKind;

use super::annotation::Annotation;
use super::usage::Usage;

/// One self-contained unit of channel data.
///
/// Frames travel the outbound stream encoded inline between spans of plain
/// answer text (see [`crate::wire`]); a frame is never partially meaningful
/// and is applied to channel state only once fully decoded.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Frame {
    /// A chunk of final answer text.
    Content { text: String },

    /// A chunk of the internal reasoning trace.
    Reasoning { text: String },

    /// A batch of annotations, merged into the accumulated set by
    /// `(kind, url)`.
    Annotations { annotations: Vec<Annotation> },

    /// A usage snapshot, replacing any earlier one.
    Usage { usage: Usage },

    /// The stream ended with an error.
    Error { kind: ErrorKind, message: String },

    /// The stream ended normally.
    Done,
}

impl Frame {
    pub fn content(text: impl Into<String>) -> Self {
        Self::Content { text: text.into() }
    }

    pub fn reasoning(text: impl Into<String>) -> Self {
        Self::Reasoning { text: text.into() }
    }

    /// Whether this frame ends the stream. Consumers stop reading after a
    /// terminal frame; nothing follows it on the wire.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Error { .. })
    }
}
