//! End-to-end relay tests: provider events in, multiplexed bytes out,
//! rebuilt channel state and stored transcript on the far side.

mod common;

use common::{drain_outbound, MemoryStore};
use futures::stream::BoxStream;
use futures::{stream, StreamExt};
use pretty_assertions::assert_eq;
use tokio::sync::mpsc;

use weft::demux::FrameDemultiplexer;
use weft::error::{Result, WeftError};
use weft::relay::MultiplexRelay;
use weft::types::{Annotation, ProviderEvent, Usage};
use weft::wire::MARKER;

fn events(items: Vec<Result<ProviderEvent>>) -> BoxStream<'static, Result<ProviderEvent>> {
    stream::iter(items).boxed()
}

fn citation(url: &str) -> Annotation {
    Annotation::new("citation", url)
}

/// The canonical happy path: two content deltas, citations announced along
/// the way, one usage snapshot, then a terminal marker.
fn hello_world_events() -> BoxStream<'static, Result<ProviderEvent>> {
    events(vec![
        Ok(ProviderEvent {
            content_delta: Some("Hello ".into()),
            ..Default::default()
        }),
        Ok(ProviderEvent {
            content_delta: Some("world".into()),
            annotations: Some(vec![citation("https://example.com/a")]),
            ..Default::default()
        }),
        Ok(ProviderEvent {
            annotations: Some(vec![citation("https://example.com/b")]),
            usage: Some(Usage::new(12, 4, 16)),
            ..Default::default()
        }),
        Ok(ProviderEvent::terminal()),
    ])
}

#[tokio::test]
async fn hello_world_reaches_the_renderer_intact() {
    let store = MemoryStore::new();
    let relay = MultiplexRelay::new(store.clone());
    let (tx, rx) = mpsc::channel(32);

    let transcript = relay.run(hello_world_events(), tx).await;
    let bytes = drain_outbound(rx).await;

    let mut demux = FrameDemultiplexer::new();
    demux.feed(&bytes);
    demux.finish();
    let state = demux.into_state();

    assert_eq!(state.content, "Hello world");
    assert_eq!(
        state.annotations,
        vec![
            citation("https://example.com/a"),
            citation("https://example.com/b"),
        ]
    );
    assert_eq!(state.usage, Some(Usage::new(12, 4, 16)));
    assert!(state.complete());

    // Producer-side accumulation and consumer-side rebuild agree.
    assert_eq!(state.into_transcript(), transcript);
    assert_eq!(store.transcripts(), vec![transcript]);
}

#[tokio::test]
async fn plain_bytes_between_frames_are_exactly_the_answer() {
    let relay = MultiplexRelay::new(MemoryStore::new());
    let (tx, rx) = mpsc::channel(32);

    relay.run(hello_world_events(), tx).await;
    let bytes = drain_outbound(rx).await;

    let mut plain = Vec::new();
    let mut in_frame = false;
    for &b in &bytes {
        if b == MARKER {
            in_frame = !in_frame;
        } else if !in_frame {
            plain.push(b);
        }
    }
    assert_eq!(String::from_utf8(plain).unwrap(), "Hello world");
}

#[tokio::test]
async fn reannounced_annotation_updates_instead_of_duplicating() {
    let store = MemoryStore::new();
    let relay = MultiplexRelay::new(store.clone());
    let (tx, rx) = mpsc::channel(32);

    let stream = events(vec![
        Ok(ProviderEvent {
            annotations: Some(vec![
                citation("https://example.com/a"),
                citation("https://example.com/b"),
            ]),
            ..Default::default()
        }),
        // Same citation again, now with a title.
        Ok(ProviderEvent {
            annotations: Some(vec![
                citation("https://example.com/a").with_extra("title", "Example A"),
            ]),
            ..Default::default()
        }),
        Ok(ProviderEvent::terminal()),
    ]);
    relay.run(stream, tx).await;

    let bytes = drain_outbound(rx).await;
    let mut demux = FrameDemultiplexer::new();
    demux.feed(&bytes);
    demux.finish();
    let state = demux.state();

    assert_eq!(state.annotations.len(), 2);
    assert_eq!(state.annotations[0].url, "https://example.com/a");
    assert_eq!(
        state.annotations[0].extra.get("title").map(String::as_str),
        Some("Example A")
    );
    assert_eq!(state.annotations[1].url, "https://example.com/b");
}

#[tokio::test]
async fn usage_snapshots_replace_rather_than_accumulate() {
    let relay = MultiplexRelay::new(MemoryStore::new());
    let (tx, rx) = mpsc::channel(32);

    let stream = events(vec![
        Ok(ProviderEvent {
            usage: Some(Usage::new(12, 1, 13)),
            ..Default::default()
        }),
        Ok(ProviderEvent {
            usage: Some(Usage::new(12, 9, 21)),
            ..Default::default()
        }),
        Ok(ProviderEvent::terminal()),
    ]);
    let transcript = relay.run(stream, tx).await;

    drain_outbound(rx).await;
    assert_eq!(transcript.usage, Some(Usage::new(12, 9, 21)));
}

#[tokio::test]
async fn upstream_failure_is_an_error_frame_and_incomplete_transcript() {
    let store = MemoryStore::new();
    let relay = MultiplexRelay::new(store.clone());
    let (tx, rx) = mpsc::channel(32);

    let stream = events(vec![
        Ok(ProviderEvent {
            content_delta: Some("partial".into()),
            ..Default::default()
        }),
        Err(WeftError::Stream("connection reset".into())),
    ]);
    let transcript = relay.run(stream, tx).await;

    let bytes = drain_outbound(rx).await;
    let mut demux = FrameDemultiplexer::new();
    demux.feed(&bytes);
    demux.finish();
    let state = demux.into_state();

    assert_eq!(state.content, "partial");
    assert!(state.terminal);
    assert!(!state.complete());
    let err = state.error.as_ref().unwrap();
    assert_eq!(err.kind.to_string(), "upstream-error");
    assert!(err.message.contains("connection reset"));

    assert!(!transcript.complete);
    assert_eq!(store.transcripts()[0].content, "partial");
}

#[tokio::test]
async fn exhausted_upstream_counts_as_a_clean_finish() {
    let relay = MultiplexRelay::new(MemoryStore::new());
    let (tx, rx) = mpsc::channel(32);

    let stream = events(vec![Ok(ProviderEvent {
        content_delta: Some("all of it".into()),
        ..Default::default()
    })]);
    let transcript = relay.run(stream, tx).await;

    let bytes = drain_outbound(rx).await;
    let mut demux = FrameDemultiplexer::new();
    demux.feed(&bytes);
    demux.finish();

    assert!(demux.state().complete());
    assert!(transcript.complete);
    assert_eq!(transcript.content, "all of it");
}

#[tokio::test]
async fn reasoning_never_mixes_into_content() {
    let relay = MultiplexRelay::new(MemoryStore::new());
    let (tx, rx) = mpsc::channel(32);

    let stream = events(vec![
        Ok(ProviderEvent {
            reasoning_delta: Some("let me think".into()),
            ..Default::default()
        }),
        Ok(ProviderEvent {
            content_delta: Some("42".into()),
            reasoning_delta: Some(" about this".into()),
            ..Default::default()
        }),
        Ok(ProviderEvent::terminal()),
    ]);
    let transcript = relay.run(stream, tx).await;

    let bytes = drain_outbound(rx).await;
    let mut demux = FrameDemultiplexer::new();
    demux.feed(&bytes);
    demux.finish();
    let state = demux.into_state();

    assert_eq!(state.content, "42");
    assert_eq!(state.reasoning, "let me think about this");
    assert_eq!(transcript.reasoning.as_deref(), Some("let me think about this"));
}
