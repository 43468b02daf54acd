//! Weft: streaming response channels over one byte stream
//!
//! Takes the streaming output of an AI provider (OpenAI-style chat or
//! responses APIs, Anthropic-style messages API), splits it into canonical
//! channels (content, reasoning, annotations, usage), and relays them to a
//! consumer multiplexed over a single byte stream: content flows as plain
//! UTF-8, everything else rides in small self-delimiting frames. The
//! consumer side rebuilds per-channel state incrementally, and the finished
//! transcript is handed to a pluggable store.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use weft::prelude::*;
//!
//! # async fn example() -> weft::error::Result<()> {
//! let upstream = weft::upstream::open_stream(
//!     "https://api.openai.com/v1/chat/completions",
//!     weft::upstream::bearer_headers("sk-..."),
//!     &serde_json::json!({"model": "gpt-4o", "stream": true, "messages": []}),
//! )
//! .await?;
//!
//! let session = StreamSession::new(ProviderShape::Chat, Arc::new(NullStore));
//! let (handle, mut chunks) = session.spawn(upstream);
//!
//! let mut demux = FrameDemultiplexer::new();
//! while let Some(chunk) = chunks.recv().await {
//!     for frame in demux.feed(&chunk) {
//!         if let Frame::Content { text } = frame {
//!             print!("{text}");
//!         }
//!     }
//! }
//! demux.finish();
//!
//! let transcript = handle.join().await?;
//! println!("\ncomplete: {}", transcript.complete);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod decode;
pub mod demux;
pub mod error;
pub mod extract;
pub mod prelude;
pub mod relay;
pub mod types;
pub mod upstream;
pub mod util;
pub mod wire;
