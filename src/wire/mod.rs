//! Frame wire grammar: encoding and incremental scanning.
//!
//! An encoded frame is `RS "wf1:" <compact JSON> RS`, where `RS` is the
//! ASCII record separator (0x1E). The JSON payload is the serde
//! representation of [`Frame`]; serde_json escapes every control character
//! inside strings, so the terminator byte can never occur raw inside a
//! payload and terminator scanning is exact. Decoding parses the isolated
//! payload with the same serde grammar that produced it, so the encoder
//! and scanner share one source of truth and nested quotes and braces in
//! annotation payloads need no special handling.

use crate::types::Frame;

/// Marker byte opening and closing an encoded frame (ASCII record
/// separator).
pub const MARKER: u8 = 0x1e;

/// Versioned prefix every encoded frame starts with.
pub const FRAME_PREFIX: &str = "\u{1e}wf1:";

/// Encode a frame into its self-delimiting wire form.
///
/// The returned string must be written to the outbound transport as one
/// atomic chunk: a frame is never split by the producer, only (possibly)
/// by the transport underneath.
pub fn encode_frame(frame: &Frame) -> String {
    let payload = serde_json::to_string(frame).expect("frame serialization cannot fail");
    let mut encoded = String::with_capacity(FRAME_PREFIX.len() + payload.len() + 1);
    encoded.push_str(FRAME_PREFIX);
    encoded.push_str(&payload);
    encoded.push(MARKER as char);
    encoded
}

/// One scanned item: a span of plain text or a fully-decoded frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Scan {
    Text(String),
    Frame(Frame),
}

/// Incremental scanner over the interleaved outbound byte stream.
///
/// Input may arrive fragmented at arbitrary byte boundaries. Plain bytes
/// before a marker are released immediately (up to the last complete UTF-8
/// character); marker candidates are buffered until terminated. A candidate
/// that turns out not to be a valid frame fails closed: its bytes are
/// re-emitted verbatim as plain text.
#[derive(Debug)]
pub struct FrameScanner {
    buf: Vec<u8>,
    max_frame_len: usize,
}

enum Candidate {
    NeedMore,
    Accept { frame: Frame, consumed: usize },
    Reject,
}

impl FrameScanner {
    pub fn new(max_frame_len: usize) -> Self {
        Self {
            buf: Vec::new(),
            max_frame_len,
        }
    }

    /// Feed one transport chunk; returns everything decodable so far.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<Scan> {
        self.buf.extend_from_slice(bytes);
        let mut out = Vec::new();
        loop {
            match self.buf.iter().position(|&b| b == MARKER) {
                None => {
                    let emit = self.buf.len() - utf8_hold_back(&self.buf);
                    if emit > 0 {
                        let span: Vec<u8> = self.buf.drain(..emit).collect();
                        push_text(&mut out, &span);
                    }
                    break;
                }
                Some(pos) => {
                    if pos > 0 {
                        let span: Vec<u8> = self.buf.drain(..pos).collect();
                        push_text(&mut out, &span);
                    }
                    match self.scan_candidate() {
                        Candidate::NeedMore => break,
                        Candidate::Accept { frame, consumed } => {
                            self.buf.drain(..consumed);
                            out.push(Scan::Frame(frame));
                        }
                        Candidate::Reject => {
                            // Fail closed: the marker byte is plain text;
                            // everything after it is rescanned.
                            self.buf.drain(..1);
                            push_text(&mut out, &[MARKER]);
                        }
                    }
                }
            }
        }
        out
    }

    /// End of stream. Returns any trailing plain text, plus whether an
    /// unterminated frame had to be discarded.
    pub fn finish(&mut self) -> (Vec<Scan>, bool) {
        let mut out = Vec::new();
        let mut truncated = false;
        if !self.buf.is_empty() {
            if self.buf[0] == MARKER {
                tracing::warn!(
                    buffered = self.buf.len(),
                    "discarding unterminated frame at stream end"
                );
                truncated = true;
            } else {
                let span = std::mem::take(&mut self.buf);
                push_text(&mut out, &span);
            }
            self.buf.clear();
        }
        (out, truncated)
    }

    /// Examine the buffer, which starts with a marker byte.
    fn scan_candidate(&self) -> Candidate {
        let buf = &self.buf;
        let prefix = FRAME_PREFIX.as_bytes();

        if buf.len() < prefix.len() {
            return if prefix.starts_with(buf) {
                Candidate::NeedMore
            } else {
                Candidate::Reject
            };
        }
        if !buf.starts_with(prefix) {
            return Candidate::Reject;
        }

        match buf[prefix.len()..].iter().position(|&b| b == MARKER) {
            None => {
                // The length bound depends only on stream content, never on
                // chunking, so fragmented and whole delivery agree on
                // whether a candidate is rejected.
                if buf.len() > self.max_frame_len {
                    tracing::warn!(
                        buffered = buf.len(),
                        max = self.max_frame_len,
                        "frame candidate over length bound; treating as text"
                    );
                    Candidate::Reject
                } else {
                    Candidate::NeedMore
                }
            }
            Some(rel) => {
                let consumed = prefix.len() + rel + 1;
                if consumed > self.max_frame_len {
                    tracing::warn!(
                        len = consumed,
                        max = self.max_frame_len,
                        "frame over length bound; treating as text"
                    );
                    return Candidate::Reject;
                }
                let payload = &buf[prefix.len()..prefix.len() + rel];
                match std::str::from_utf8(payload)
                    .ok()
                    .and_then(|s| serde_json::from_str::<Frame>(s).ok())
                {
                    Some(frame) => Candidate::Accept { frame, consumed },
                    None => {
                        tracing::warn!("invalid frame payload; treating marker as text");
                        Candidate::Reject
                    }
                }
            }
        }
    }
}

fn push_text(out: &mut Vec<Scan>, bytes: &[u8]) {
    if bytes.is_empty() {
        return;
    }
    out.push(Scan::Text(String::from_utf8_lossy(bytes).into_owned()));
}

/// Number of trailing bytes forming an incomplete UTF-8 sequence, which
/// must be held back until more input arrives.
fn utf8_hold_back(bytes: &[u8]) -> usize {
    let len = bytes.len();
    let mut cont = 0usize;
    for i in (0..len).rev() {
        let b = bytes[i];
        if b < 0x80 {
            return 0;
        }
        if b >= 0xc0 {
            let need = if b >= 0xf0 {
                4
            } else if b >= 0xe0 {
                3
            } else {
                2
            };
            let have = len - i;
            return if have < need { have } else { 0 };
        }
        cont += 1;
        if cont == 3 {
            // a sequence never has more than 3 continuation bytes
            return 0;
        }
    }
    0
}
