//! Convenience re-exports for common use.

pub use crate::config::WeftConfig;
pub use crate::decode::{decode_events, ProviderShape};
pub use crate::demux::FrameDemultiplexer;
pub use crate::error::{ErrorKind, Result, WeftError};
pub use crate::extract::ChannelExtractor;
pub use crate::relay::{
    MultiplexRelay, NullStore, SessionHandle, StreamSession, TranscriptStore,
};
pub use crate::types::{
    Annotation, ChannelState, Frame, ProviderEvent, StreamError, Transcript, Usage,
};
pub use crate::wire::{encode_frame, FrameScanner, Scan};
