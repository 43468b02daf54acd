//! Shared test helpers.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::mpsc;

use weft::error::Result;
use weft::relay::TranscriptStore;
use weft::types::Transcript;

/// A store that records every persisted transcript.
pub struct MemoryStore {
    transcripts: Mutex<Vec<Transcript>>,
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            transcripts: Mutex::new(Vec::new()),
        })
    }

    pub fn transcripts(&self) -> Vec<Transcript> {
        self.transcripts.lock().unwrap().clone()
    }
}

#[async_trait]
impl TranscriptStore for MemoryStore {
    async fn persist(&self, transcript: Transcript) -> Result<()> {
        self.transcripts.lock().unwrap().push(transcript);
        Ok(())
    }
}

/// Drain an outbound channel to a flat byte vector.
pub async fn drain_outbound(mut rx: mpsc::Receiver<Bytes>) -> Vec<u8> {
    let mut all = Vec::new();
    while let Some(chunk) = rx.recv().await {
        all.extend_from_slice(&chunk);
    }
    all
}
