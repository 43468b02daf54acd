//! Channel extraction: one provider event in, zero or more frames out.

use tracing::warn;

use crate::types::{Annotation, Frame, ProviderEvent};

/// Maps canonical provider events onto channel frames.
///
/// The extractor never stores channel content; accumulation happens on the
/// consuming side, per channel: text appends, annotations set-merge by
/// `(kind, url)`, usage replaces. One event may yield several frames; they
/// are emitted in the order the channels appear in the event.
#[derive(Debug, Default)]
pub struct ChannelExtractor {}

impl ChannelExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn extract(&mut self, event: &ProviderEvent) -> Vec<Frame> {
        let mut frames = Vec::new();

        if let Some(text) = event.content_delta.as_deref() {
            if !text.is_empty() {
                frames.push(Frame::content(text));
            }
        }
        if let Some(text) = event.reasoning_delta.as_deref() {
            if !text.is_empty() {
                frames.push(Frame::reasoning(text));
            }
        }
        if let Some(annotations) = &event.annotations {
            let kept: Vec<Annotation> = annotations
                .iter()
                .filter(|ann| {
                    if ann.url.is_empty() {
                        warn!(kind = %ann.kind, "dropping annotation without a url");
                        false
                    } else {
                        true
                    }
                })
                .cloned()
                .collect();
            if !kept.is_empty() {
                frames.push(Frame::Annotations { annotations: kept });
            }
        }
        if let Some(usage) = &event.usage {
            frames.push(Frame::Usage {
                usage: usage.clone(),
            });
        }

        frames
    }
}
