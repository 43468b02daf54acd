//! One streaming session wired end to end: decode, extract, relay, store.

use std::sync::Arc;

use bytes::Bytes;
use futures::stream::BoxStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::WeftConfig;
use crate::decode::{decode_events, ProviderShape};
use crate::error::{Result, WeftError};
use crate::types::Transcript;

use super::{MultiplexRelay, TranscriptStore};

/// Ties a provider byte stream to the relay pipeline for one request.
///
/// The session owns the configuration and cancellation token; [`run`]
/// drives everything on the caller's task, [`spawn`] moves the pump onto
/// the runtime and hands back the outbound byte stream.
///
/// [`run`]: Self::run
/// [`spawn`]: Self::spawn
pub struct StreamSession {
    shape: ProviderShape,
    store: Arc<dyn TranscriptStore>,
    config: WeftConfig,
    cancel: CancellationToken,
}

impl StreamSession {
    pub fn new(shape: ProviderShape, store: Arc<dyn TranscriptStore>) -> Self {
        Self::with_config(shape, store, WeftConfig::global().clone())
    }

    pub fn with_config(
        shape: ProviderShape,
        store: Arc<dyn TranscriptStore>,
        config: WeftConfig,
    ) -> Self {
        Self {
            shape,
            store,
            config,
            cancel: CancellationToken::new(),
        }
    }

    /// Token that aborts the session when cancelled.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Decode `upstream` and pump it into `out`, returning the transcript
    /// once the stream ends.
    pub async fn run(
        &self,
        upstream: BoxStream<'static, Result<Bytes>>,
        out: mpsc::Sender<Bytes>,
    ) -> Transcript {
        let events = decode_events(upstream, self.shape, self.config.idle_timeout_ms);
        let relay = MultiplexRelay::with_cancellation(self.store.clone(), self.cancel.clone());
        relay.run(events, out).await
    }

    /// Run the session on a background task. The receiver carries the
    /// multiplexed outbound bytes; the handle joins to the transcript.
    pub fn spawn(
        self,
        upstream: BoxStream<'static, Result<Bytes>>,
    ) -> (SessionHandle, mpsc::Receiver<Bytes>) {
        let (tx, rx) = mpsc::channel(self.config.outbound_capacity);
        let cancel = self.cancel.clone();
        let task = tokio::spawn(async move { self.run(upstream, tx).await });
        (SessionHandle { cancel, task }, rx)
    }
}

/// Control handle for a spawned session.
pub struct SessionHandle {
    cancel: CancellationToken,
    task: JoinHandle<Transcript>,
}

impl SessionHandle {
    /// Stop the session. The task keeps running just long enough to persist
    /// the partial transcript; [`join`](Self::join) returns it.
    pub fn abort(&self) {
        self.cancel.cancel();
    }

    pub async fn join(self) -> Result<Transcript> {
        self.task
            .await
            .map_err(|err| WeftError::Stream(format!("session task failed: {err}")))
    }
}
