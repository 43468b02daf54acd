//! Citation/annotation channel types.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// One citation-like annotation attached to a response.
///
/// Identity is the `(kind, url)` pair: annotations accumulate as an ordered
/// set keyed on it, so re-sending the same citation refreshes its `extra`
/// fields without creating a second entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Annotation {
    pub kind: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub extra: HashMap<String, String>,
}

impl Annotation {
    pub fn new(kind: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            url: url.into(),
            extra: HashMap::new(),
        }
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }
}

/// Merge `incoming` into `existing`, preserving first-seen order.
///
/// A `(kind, url)` already present updates that entry's `extra` fields in
/// place; everything else is appended. This is the single accumulation rule
/// for the annotation channel, applied identically on the relay side and the
/// demultiplexer side.
pub fn merge_annotations(existing: &mut Vec<Annotation>, incoming: &[Annotation]) {
    for ann in incoming {
        match existing
            .iter_mut()
            .find(|e| e.kind == ann.kind && e.url == ann.url)
        {
            Some(slot) => {
                for (k, v) in &ann.extra {
                    slot.extra.insert(k.clone(), v.clone());
                }
            }
            None => existing.push(ann.clone()),
        }
    }
}
