//! Consumer side: rebuild frames and channel state from outbound bytes.

use bytes::Bytes;
use futures::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::config::WeftConfig;
use crate::error::{Result, WeftError};
use crate::types::{ChannelState, Frame};
use crate::wire::{FrameScanner, Scan};

/// Incremental demultiplexer for one session's outbound stream.
///
/// Input chunks may be fragmented at arbitrary byte boundaries. Each call
/// to [`feed`](Self::feed) returns the frames decodable so far (plain text
/// spans surface as `Frame::Content`), already applied to the session's
/// [`ChannelState`], so a renderer can draw incrementally and read the
/// accumulated view at any time.
#[derive(Debug)]
pub struct FrameDemultiplexer {
    scanner: FrameScanner,
    state: ChannelState,
    finished: bool,
}

impl Default for FrameDemultiplexer {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameDemultiplexer {
    pub fn new() -> Self {
        Self::with_config(WeftConfig::global())
    }

    pub fn with_config(config: &WeftConfig) -> Self {
        Self {
            scanner: FrameScanner::new(config.max_frame_len),
            state: ChannelState::new(),
            finished: false,
        }
    }

    /// Feed one transport chunk.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<Frame> {
        let mut out = Vec::new();
        for scan in self.scanner.push(bytes) {
            let frame = match scan {
                Scan::Text(text) => Frame::Content { text },
                Scan::Frame(frame) => frame,
            };
            self.state.apply(&frame);
            out.push(frame);
        }
        out
    }

    /// Signal end of stream. Returns any trailing plain text; afterwards
    /// the state is terminal, with `truncated` set when the stream was cut
    /// off (no terminal frame) or a partial frame had to be discarded.
    pub fn finish(&mut self) -> Vec<Frame> {
        let mut out = Vec::new();
        if self.finished {
            return out;
        }
        self.finished = true;

        let (scans, truncated) = self.scanner.finish();
        for scan in scans {
            if let Scan::Text(text) = scan {
                let frame = Frame::Content { text };
                self.state.apply(&frame);
                out.push(frame);
            }
        }
        if truncated {
            self.state.truncated = true;
        }
        if !self.state.terminal {
            tracing::warn!("stream ended without a terminal frame");
            self.state.truncated = true;
            self.state.terminal = true;
        }
        out
    }

    /// The live accumulated view.
    pub fn state(&self) -> &ChannelState {
        &self.state
    }

    pub fn into_state(self) -> ChannelState {
        self.state
    }
}

/// Drive a demultiplexer over a whole byte stream and return the final
/// channel state.
pub async fn collect<S>(bytes: S) -> Result<ChannelState>
where
    S: Stream<Item = std::result::Result<Bytes, WeftError>>,
{
    futures::pin_mut!(bytes);
    let mut demux = FrameDemultiplexer::new();
    while let Some(chunk) = bytes.next().await {
        demux.feed(&chunk?);
    }
    demux.finish();
    Ok(demux.into_state())
}

/// Collect an in-process outbound channel into the final channel state.
pub async fn collect_outbound(rx: mpsc::Receiver<Bytes>) -> ChannelState {
    let mut stream = ReceiverStream::new(rx);
    let mut demux = FrameDemultiplexer::new();
    while let Some(chunk) = stream.next().await {
        demux.feed(&chunk);
    }
    demux.finish();
    demux.into_state()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::encode_frame;

    #[test]
    fn feed_applies_text_and_frames() {
        let mut demux = FrameDemultiplexer::with_config(&WeftConfig::default());
        let mut bytes = String::from("Hello");
        bytes.push_str(&encode_frame(&Frame::reasoning("hmm")));
        bytes.push_str(&encode_frame(&Frame::Done));

        let frames = demux.feed(bytes.as_bytes());
        assert_eq!(
            frames,
            vec![
                Frame::content("Hello"),
                Frame::reasoning("hmm"),
                Frame::Done
            ]
        );
        assert_eq!(demux.state().content, "Hello");
        assert_eq!(demux.state().reasoning, "hmm");
        assert!(demux.state().complete());
    }

    #[test]
    fn finish_marks_cut_off_streams() {
        let mut demux = FrameDemultiplexer::with_config(&WeftConfig::default());
        demux.feed(b"partial answer");
        demux.finish();

        let state = demux.state();
        assert!(state.terminal);
        assert!(state.truncated);
        assert!(!state.complete());
        assert_eq!(state.content, "partial answer");
    }

    #[test]
    fn finish_is_idempotent() {
        let mut demux = FrameDemultiplexer::with_config(&WeftConfig::default());
        demux.feed(encode_frame(&Frame::Done).as_bytes());
        assert!(demux.finish().is_empty());
        assert!(demux.finish().is_empty());
        assert!(demux.state().complete());
    }

    #[tokio::test]
    async fn collect_outbound_drains_a_channel() {
        let (tx, rx) = mpsc::channel(4);
        tx.send(Bytes::from("Hi")).await.unwrap();
        tx.send(Bytes::from(encode_frame(&Frame::Done))).await.unwrap();
        drop(tx);

        let state = collect_outbound(rx).await;
        assert_eq!(state.content, "Hi");
        assert!(state.complete());
    }

    #[tokio::test]
    async fn collect_runs_a_whole_stream_to_a_final_state() {
        let chunks: Vec<Result<Bytes>> = vec![
            Ok(Bytes::from("Hello ")),
            Ok(Bytes::from("world")),
            Ok(Bytes::from(encode_frame(&Frame::Done))),
        ];
        let state = collect(futures::stream::iter(chunks)).await.unwrap();
        assert_eq!(state.content, "Hello world");
        assert!(state.complete());
    }

    #[tokio::test]
    async fn collect_surfaces_transport_errors() {
        let chunks: Vec<Result<Bytes>> = vec![
            Ok(Bytes::from("partial")),
            Err(WeftError::Io(std::io::ErrorKind::ConnectionReset.into())),
        ];
        let err = collect(futures::stream::iter(chunks)).await.unwrap_err();
        assert!(matches!(err, WeftError::Io(_)));
    }
}
