//! Upstream event decoding: SSE byte framing plus vendor shape dispatch.

pub mod shape;

pub use shape::{adapt_event, ProviderShape, ShapeAdapter};

use std::time::Duration;

use bytes::Bytes;
use futures::stream::BoxStream;
use futures::StreamExt;
use tokio::time;
use tracing::warn;

use crate::error::WeftError;
use crate::types::ProviderEvent;

/// Turn a raw upstream byte stream into canonical provider events.
///
/// Framing is server-sent events: `data:` lines accumulate until a blank
/// line dispatches them; `event:`, `id:`, retry hints and comments are
/// ignored; the `[DONE]` sentinel yields a terminal event. Partial lines
/// split across reads are buffered as bytes until their newline arrives, so
/// a multibyte character cut by the transport survives intact. A payload
/// that fails to parse is skipped with a diagnostic, never fatal.
///
/// `idle_timeout_ms` bounds the gap between upstream reads; zero disables
/// the timeout.
pub fn decode_events(
    upstream: BoxStream<'static, Result<Bytes, WeftError>>,
    shape: ProviderShape,
    idle_timeout_ms: u64,
) -> BoxStream<'static, Result<ProviderEvent, WeftError>> {
    let stream = async_stream::stream! {
        let mut upstream = upstream;
        let mut adapter = ShapeAdapter::new(shape);
        let mut buf: Vec<u8> = Vec::new();
        let mut pending_data: Vec<String> = Vec::new();
        let mut clean_eof = false;
        let mut idle_sleep = (idle_timeout_ms > 0)
            .then(|| Box::pin(time::sleep(Duration::from_millis(idle_timeout_ms))));

        'read: loop {
            let next = if let Some(ref mut sleep) = idle_sleep {
                tokio::select! {
                    next = upstream.next() => next,
                    _ = sleep.as_mut() => {
                        warn!(idle_timeout_ms, "upstream idle timeout");
                        yield Err(WeftError::UpstreamTimeout(idle_timeout_ms));
                        break 'read;
                    }
                }
            } else {
                upstream.next().await
            };

            let chunk = match next {
                Some(Ok(chunk)) => chunk,
                Some(Err(err)) => {
                    yield Err(err);
                    break 'read;
                }
                None => {
                    clean_eof = true;
                    break 'read;
                }
            };

            if let Some(ref mut sleep) = idle_sleep {
                sleep.as_mut().reset(
                    time::Instant::now() + Duration::from_millis(idle_timeout_ms),
                );
            }

            buf.extend_from_slice(&chunk);

            while let Some(line_end) = buf.iter().position(|&b| b == b'\n') {
                let line_bytes: Vec<u8> = buf.drain(..=line_end).collect();
                let text = String::from_utf8_lossy(&line_bytes[..line_end]);
                let line = text.trim_end_matches('\r');

                if line.is_empty() {
                    if pending_data.is_empty() {
                        continue;
                    }
                    let data = pending_data.join("\n");
                    pending_data.clear();
                    if let Some(item) = parse_event_data(&data, &mut adapter) {
                        let stop = item.is_err()
                            || matches!(&item, Ok(event) if event.is_terminal);
                        yield item;
                        if stop {
                            break 'read;
                        }
                    }
                } else if let Some(value) = data_line(line) {
                    pending_data.push(value.to_string());
                }
            }
        }

        // Some providers close the connection right after the last data
        // line, skipping the final blank-line dispatch.
        if clean_eof && !pending_data.is_empty() {
            let data = pending_data.join("\n");
            if let Some(item) = parse_event_data(&data, &mut adapter) {
                yield item;
            }
        }
    };
    stream.boxed()
}

/// Extract the value of an SSE `data:` line; every other field and comment
/// returns `None`.
fn data_line(line: &str) -> Option<&str> {
    let rest = line.strip_prefix("data:")?;
    Some(rest.strip_prefix(' ').unwrap_or(rest))
}

/// Parse one dispatched data payload. `None` means nothing to emit: either
/// an event with no channel data, or a malformed payload that was skipped.
fn parse_event_data(
    data: &str,
    adapter: &mut ShapeAdapter,
) -> Option<Result<ProviderEvent, WeftError>> {
    if data == "[DONE]" {
        return Some(Ok(ProviderEvent::terminal()));
    }
    match serde_json::from_str::<serde_json::Value>(data) {
        Ok(raw) => match adapter.adapt(&raw) {
            Ok(event) if event.is_empty() => None,
            Ok(event) => Some(Ok(event)),
            Err(err) => Some(Err(err)),
        },
        Err(err) => {
            warn!(error = %err, "skipping malformed upstream event");
            None
        }
    }
}
