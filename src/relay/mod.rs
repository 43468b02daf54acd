//! Producer side: pump one decoded provider stream into the multiplexed
//! outbound byte stream and a persisted transcript.

mod session;

pub use session::{SessionHandle, StreamSession};

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::BoxStream;
use futures::StreamExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::Result;
use crate::extract::ChannelExtractor;
use crate::types::{ChannelState, Frame, ProviderEvent, Transcript};
use crate::wire::encode_frame;

/// Durable sink for finished (or cut-short) transcripts.
#[async_trait]
pub trait TranscriptStore: Send + Sync {
    async fn persist(&self, transcript: Transcript) -> Result<()>;
}

/// Store that discards every transcript.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullStore;

#[async_trait]
impl TranscriptStore for NullStore {
    async fn persist(&self, _transcript: Transcript) -> Result<()> {
        Ok(())
    }
}

/// Pumps decoded provider events to a downstream byte channel while
/// accumulating the transcript.
///
/// Content deltas travel as plain UTF-8 bytes; every other channel rides in
/// an embedded frame, so a consumer that knows nothing about the frame
/// grammar still sees a readable answer. The relay owns the session's
/// transcript accumulation and hands the result to its [`TranscriptStore`]
/// exactly once, whatever way the stream ends.
pub struct MultiplexRelay {
    store: Arc<dyn TranscriptStore>,
    cancel: CancellationToken,
}

impl MultiplexRelay {
    pub fn new(store: Arc<dyn TranscriptStore>) -> Self {
        Self::with_cancellation(store, CancellationToken::new())
    }

    pub fn with_cancellation(store: Arc<dyn TranscriptStore>, cancel: CancellationToken) -> Self {
        Self { store, cancel }
    }

    /// Token that stops the pump when cancelled. Cancellation is abrupt:
    /// nothing more is written downstream, and the partial transcript is
    /// persisted with `complete: false`.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Drive `events` until it ends, fails, is cancelled, or the consumer
    /// goes away. Always returns the accumulated transcript; persistence
    /// failures are logged, not propagated.
    pub async fn run(
        &self,
        events: BoxStream<'static, Result<ProviderEvent>>,
        out: mpsc::Sender<Bytes>,
    ) -> Transcript {
        let mut events = events;
        let mut extractor = ChannelExtractor::new();
        let mut state = ChannelState::new();

        'pump: loop {
            let next = tokio::select! {
                _ = self.cancel.cancelled() => {
                    debug!("session cancelled, stopping relay");
                    break 'pump;
                }
                _ = out.closed() => {
                    debug!("outbound receiver dropped, stopping relay");
                    break 'pump;
                }
                next = events.next() => next,
            };

            match next {
                Some(Ok(event)) => {
                    let terminal = event.is_terminal;
                    for frame in extractor.extract(&event) {
                        state.apply(&frame);
                        if !self.send(&out, &frame).await {
                            break 'pump;
                        }
                    }
                    if terminal {
                        self.send_done(&out, &mut state).await;
                        break 'pump;
                    }
                }
                Some(Err(err)) => {
                    warn!(error = %err, "upstream failed mid-stream");
                    let frame = Frame::Error {
                        kind: err.wire_kind(),
                        message: err.to_string(),
                    };
                    state.apply(&frame);
                    self.send(&out, &frame).await;
                    break 'pump;
                }
                // Upstream exhausted without an explicit end marker; the
                // events delivered so far are the whole answer.
                None => {
                    self.send_done(&out, &mut state).await;
                    break 'pump;
                }
            }
        }

        if !state.terminal {
            state.truncated = true;
            state.terminal = true;
        }
        let transcript = state.into_transcript();
        if let Err(err) = self.store.persist(transcript.clone()).await {
            warn!(error = %err, "failed to persist transcript");
        }
        transcript
    }

    /// Returns false once the consumer is gone or the session is cancelled.
    /// A send waiting on a full channel must not outlive cancellation.
    async fn send(&self, out: &mpsc::Sender<Bytes>, frame: &Frame) -> bool {
        let bytes = match frame {
            Frame::Content { text } => Bytes::from(text.clone()),
            other => Bytes::from(encode_frame(other)),
        };
        tokio::select! {
            _ = self.cancel.cancelled() => {
                debug!("session cancelled mid-send");
                false
            }
            sent = out.send(bytes) => {
                if sent.is_err() {
                    debug!("outbound channel closed mid-send");
                }
                sent.is_ok()
            }
        }
    }

    async fn send_done(&self, out: &mpsc::Sender<Bytes>, state: &mut ChannelState) {
        let frame = Frame::Done;
        state.apply(&frame);
        self.send(out, &frame).await;
    }
}
