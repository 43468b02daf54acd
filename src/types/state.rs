//! Live accumulated channel state.

use serde::{Deserialize, Serialize};

use crate::error::ErrorKind;

use super::annotation::{merge_annotations, Annotation};
use super::frame::Frame;
use super::transcript::Transcript;
use super::usage::{replace_usage, Usage};

/// The accumulated value of every channel for one session.
///
/// Owned exclusively by one session (the demultiplexer on the consuming
/// side, the relay's transcript accumulator on the producing side), never
/// shared across requests. [`ChannelState::apply`] is the single place the
/// per-channel accumulation policies live: append for text channels,
/// set-merge for annotations, replace for usage.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ChannelState {
    /// Final answer text, append-only.
    pub content: String,
    /// Reasoning trace, append-only.
    pub reasoning: String,
    /// Ordered annotation set, merged by `(kind, url)`.
    pub annotations: Vec<Annotation>,
    /// Latest usage snapshot.
    pub usage: Option<Usage>,
    /// The stream is over (normally, with an error, or cut off).
    pub terminal: bool,
    /// Terminal error reported by the relay, if any.
    pub error: Option<StreamError>,
    /// The stream ended without a proper terminal frame, or a frame was
    /// lost mid-transfer.
    pub truncated: bool,
}

/// Terminal error as seen by the renderer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StreamError {
    pub kind: ErrorKind,
    pub message: String,
}

impl ChannelState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply one fully-decoded frame.
    pub fn apply(&mut self, frame: &Frame) {
        match frame {
            Frame::Content { text } => self.content.push_str(text),
            Frame::Reasoning { text } => self.reasoning.push_str(text),
            Frame::Annotations { annotations } => {
                merge_annotations(&mut self.annotations, annotations)
            }
            Frame::Usage { usage } => replace_usage(&mut self.usage, usage),
            Frame::Error { kind, message } => {
                self.terminal = true;
                self.error = Some(StreamError {
                    kind: *kind,
                    message: message.clone(),
                });
            }
            Frame::Done => self.terminal = true,
        }
    }

    /// Whether the stream ran to a clean `Done`.
    pub fn complete(&self) -> bool {
        self.terminal && self.error.is_none() && !self.truncated
    }

    /// Convert into the storage handoff structure.
    pub fn into_transcript(self) -> Transcript {
        let complete = self.complete();
        Transcript {
            content: self.content,
            reasoning: if self.reasoning.is_empty() {
                None
            } else {
                Some(self.reasoning)
            },
            annotations: self.annotations,
            usage: self.usage,
            complete,
        }
    }
}
