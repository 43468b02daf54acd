//! Per-vendor event shape adapters.
//!
//! Each adapter normalizes one raw upstream JSON event into the canonical
//! [`ProviderEvent`]. Vendors place the same logical field in different
//! structural positions (top-level, per-choice, per-delta) and at different
//! times; the adapter reads every position its shape uses, so nothing
//! downstream ever branches on vendor. New providers add an adapter here.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::{Display, EnumString};
use tracing::warn;

use crate::error::WeftError;
use crate::types::{Annotation, ProviderEvent, Usage};

/// Known upstream wire shapes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ProviderShape {
    /// OpenAI-style chat completion chunks (also Perplexity, Groq, and
    /// other compatible APIs).
    Chat,
    /// OpenAI Responses API typed events.
    Responses,
    /// Anthropic Messages events.
    Messages,
}

/// Per-session adapter for one shape.
///
/// Adapting is almost stateless, with one exception: Messages streams
/// report the prompt token count once, in `message_start`, and the
/// `message_delta` snapshots that follow carry only output counts. The
/// adapter remembers the prompt count so every snapshot it emits is whole
/// and a plain replace downstream stays correct.
#[derive(Debug)]
pub struct ShapeAdapter {
    shape: ProviderShape,
    prompt_tokens: Option<u32>,
}

impl ShapeAdapter {
    pub fn new(shape: ProviderShape) -> Self {
        Self {
            shape,
            prompt_tokens: None,
        }
    }

    pub fn adapt(&mut self, raw: &Value) -> Result<ProviderEvent, WeftError> {
        let mut event = adapt_event(self.shape, raw)?;
        if self.shape == ProviderShape::Messages {
            if let Some(usage) = event.usage.as_mut() {
                self.fill_prompt_count(raw, usage);
            }
        }
        Ok(event)
    }

    fn fill_prompt_count(&mut self, raw: &Value, usage: &mut Usage) {
        let reported = raw
            .get("usage")
            .or_else(|| raw.get("message").and_then(|m| m.get("usage")))
            .and_then(|u| u.get("input_tokens"))
            .is_some_and(|v| !v.is_null());
        if reported {
            self.prompt_tokens = Some(usage.prompt_tokens);
        } else if let Some(prompt) = self.prompt_tokens {
            usage.prompt_tokens = prompt;
            usage.total_tokens = prompt.saturating_add(usage.completion_tokens);
        }
    }
}

/// Normalize one raw upstream event.
///
/// Returns `Err` only when the vendor explicitly reports a failure event;
/// unknown event types produce an empty `ProviderEvent` the decoder drops.
pub fn adapt_event(shape: ProviderShape, raw: &Value) -> Result<ProviderEvent, WeftError> {
    match shape {
        ProviderShape::Chat => adapt_chat(raw),
        ProviderShape::Responses => adapt_responses(raw),
        ProviderShape::Messages => adapt_messages(raw),
    }
}

fn adapt_chat(raw: &Value) -> Result<ProviderEvent, WeftError> {
    if let Some(error) = raw.get("error") {
        let message = error
            .get("message")
            .and_then(|m| m.as_str())
            .unwrap_or("provider reported failure");
        return Err(WeftError::Stream(message.to_string()));
    }

    let mut event = ProviderEvent::default();
    let mut annotations = Vec::new();

    if let Some(choice) = raw
        .get("choices")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first())
    {
        let delta = choice.get("delta");
        if let Some(text) = delta.and_then(|d| d.get("content")).and_then(|v| v.as_str()) {
            if !text.is_empty() {
                event.content_delta = Some(text.to_string());
            }
        }
        let reasoning = delta
            .and_then(|d| d.get("reasoning_content"))
            .and_then(|v| v.as_str())
            .or_else(|| delta.and_then(|d| d.get("reasoning")).and_then(|v| v.as_str()));
        if let Some(text) = reasoning {
            if !text.is_empty() {
                event.reasoning_delta = Some(text.to_string());
            }
        }
        collect_annotations(delta.and_then(|d| d.get("annotations")), &mut annotations);
        collect_annotations(
            choice.get("message").and_then(|m| m.get("annotations")),
            &mut annotations,
        );
        // A finish_reason chunk does not end the sequence: with
        // `stream_options.include_usage` the usage snapshot arrives in a
        // later chunk, and the `[DONE]` sentinel closes the stream.
    }

    // Perplexity-style bare citation URL list.
    if let Some(urls) = raw.get("citations").and_then(|c| c.as_array()) {
        for url in urls.iter().filter_map(|u| u.as_str()) {
            if url.is_empty() {
                warn!("dropping annotation without a url");
            } else {
                annotations.push(Annotation::new("citation", url));
            }
        }
    }
    collect_annotations(raw.get("annotations"), &mut annotations);

    if !annotations.is_empty() {
        event.annotations = Some(annotations);
    }
    event.usage = parse_usage(raw.get("usage"), &CHAT_USAGE);
    Ok(event)
}

fn adapt_responses(raw: &Value) -> Result<ProviderEvent, WeftError> {
    let event_type = raw.get("type").and_then(|t| t.as_str()).unwrap_or("");
    let mut event = ProviderEvent::default();

    match event_type {
        "response.output_text.delta" => {
            if let Some(text) = raw.get("delta").and_then(|v| v.as_str()) {
                if !text.is_empty() {
                    event.content_delta = Some(text.to_string());
                }
            }
        }
        "response.reasoning_summary_text.delta" | "response.reasoning_text.delta" => {
            if let Some(text) = raw.get("delta").and_then(|v| v.as_str()) {
                if !text.is_empty() {
                    event.reasoning_delta = Some(text.to_string());
                }
            }
        }
        "response.output_text.annotation.added" => {
            if let Some(ann) = raw.get("annotation") {
                match parse_annotation(ann) {
                    Some(a) => event.annotations = Some(vec![a]),
                    None => warn!("dropping annotation without a url"),
                }
            }
        }
        "response.completed" | "response.incomplete" => {
            event.usage = parse_usage(
                raw.get("response").and_then(|r| r.get("usage")),
                &IO_USAGE,
            );
            event.is_terminal = true;
        }
        "response.failed" => {
            let message = raw
                .get("response")
                .and_then(|r| r.get("error"))
                .and_then(|e| e.get("message"))
                .and_then(|m| m.as_str())
                .unwrap_or("provider reported failure");
            return Err(WeftError::Stream(message.to_string()));
        }
        "error" => {
            let message = raw
                .get("message")
                .and_then(|m| m.as_str())
                .unwrap_or("provider reported failure");
            return Err(WeftError::Stream(message.to_string()));
        }
        _ => {}
    }
    Ok(event)
}

fn adapt_messages(raw: &Value) -> Result<ProviderEvent, WeftError> {
    let event_type = raw.get("type").and_then(|t| t.as_str()).unwrap_or("");
    let mut event = ProviderEvent::default();

    match event_type {
        "content_block_delta" => {
            if let Some(delta) = raw.get("delta") {
                match delta.get("type").and_then(|t| t.as_str()).unwrap_or("") {
                    "text_delta" => {
                        if let Some(text) = delta.get("text").and_then(|v| v.as_str()) {
                            if !text.is_empty() {
                                event.content_delta = Some(text.to_string());
                            }
                        }
                    }
                    "thinking_delta" => {
                        if let Some(text) = delta.get("thinking").and_then(|v| v.as_str()) {
                            if !text.is_empty() {
                                event.reasoning_delta = Some(text.to_string());
                            }
                        }
                    }
                    "citations_delta" => {
                        if let Some(citation) = delta.get("citation") {
                            match parse_annotation(citation) {
                                Some(a) => event.annotations = Some(vec![a]),
                                None => warn!("dropping annotation without a url"),
                            }
                        }
                    }
                    _ => {}
                }
            }
        }
        "message_start" => {
            event.usage = parse_usage(
                raw.get("message").and_then(|m| m.get("usage")),
                &IO_USAGE,
            );
        }
        "message_delta" => {
            event.usage = parse_usage(raw.get("usage"), &IO_USAGE);
        }
        "message_stop" => {
            event.is_terminal = true;
        }
        "error" => {
            let message = raw
                .get("error")
                .and_then(|e| e.get("message"))
                .and_then(|m| m.as_str())
                .unwrap_or("provider reported failure");
            return Err(WeftError::Stream(message.to_string()));
        }
        _ => {}
    }
    Ok(event)
}

fn collect_annotations(value: Option<&Value>, out: &mut Vec<Annotation>) {
    let Some(list) = value.and_then(|v| v.as_array()) else {
        return;
    };
    for item in list {
        match parse_annotation(item) {
            Some(ann) => out.push(ann),
            None => warn!("dropping annotation without a url"),
        }
    }
}

/// Parse one annotation object; `None` when it lacks a usable url.
///
/// Handles both the nested OpenAI form (`{"type":"url_citation",
/// "url_citation":{...}}`) and flat objects carrying `url` directly.
fn parse_annotation(item: &Value) -> Option<Annotation> {
    let kind = item
        .get("type")
        .and_then(|v| v.as_str())
        .unwrap_or("citation");
    let body = item.get(kind).unwrap_or(item);
    let url = body
        .get("url")
        .and_then(|v| v.as_str())
        .filter(|u| !u.is_empty())?;

    let mut ann = Annotation::new(kind, url);
    for key in ["title", "start_index", "end_index", "cited_text"] {
        match body.get(key) {
            Some(Value::String(s)) => {
                ann.extra.insert(key.to_string(), s.clone());
            }
            Some(Value::Number(n)) => {
                ann.extra.insert(key.to_string(), n.to_string());
            }
            _ => {}
        }
    }
    Some(ann)
}

struct UsageKeys {
    prompt: &'static str,
    completion: &'static str,
    details: &'static str,
}

const CHAT_USAGE: UsageKeys = UsageKeys {
    prompt: "prompt_tokens",
    completion: "completion_tokens",
    details: "completion_tokens_details",
};

const IO_USAGE: UsageKeys = UsageKeys {
    prompt: "input_tokens",
    completion: "output_tokens",
    details: "output_tokens_details",
};

/// Parse a usage snapshot leniently, then validate. A snapshot carrying a
/// negative or non-integer count is dropped whole.
fn parse_usage(value: Option<&Value>, keys: &UsageKeys) -> Option<Usage> {
    let v = value?;
    if !v.is_object() {
        return None;
    }
    let parsed = (|| -> Result<Usage, ()> {
        let prompt = count_field(v, keys.prompt)?.unwrap_or(0);
        let completion = count_field(v, keys.completion)?.unwrap_or(0);
        let total = match count_field(v, "total_tokens")? {
            Some(total) => total,
            None => prompt.checked_add(completion).ok_or(())?,
        };
        let reasoning = match v.get(keys.details) {
            Some(details) => count_field(details, "reasoning_tokens")?,
            None => None,
        };
        Ok(Usage {
            prompt_tokens: prompt,
            completion_tokens: completion,
            reasoning_tokens: reasoning,
            total_tokens: total,
        })
    })();
    match parsed {
        Ok(usage) => Some(usage),
        Err(()) => {
            warn!("dropping usage snapshot with invalid token counts");
            None
        }
    }
}

fn count_field(obj: &Value, key: &str) -> Result<Option<u32>, ()> {
    match obj.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => match v.as_i64() {
            Some(n) if n >= 0 => u32::try_from(n).map(Some).map_err(|_| ()),
            _ => Err(()),
        },
    }
}
