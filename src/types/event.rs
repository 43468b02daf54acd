//! Canonical upstream event.

use serde::{Deserialize, Serialize};

use super::annotation::Annotation;
use super::usage::Usage;

/// One decoded upstream unit, normalized across provider wire shapes.
///
/// Any combination of fields may be present in a single event, and the same
/// field may repeat across events for one request; downstream accumulation
/// policies decide how repeats combine.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ProviderEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_delta: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning_delta: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotations: Option<Vec<Annotation>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
    #[serde(default)]
    pub is_terminal: bool,
}

impl ProviderEvent {
    /// True when the event carries nothing to forward downstream.
    pub fn is_empty(&self) -> bool {
        self.content_delta.is_none()
            && self.reasoning_delta.is_none()
            && self.annotations.is_none()
            && self.usage.is_none()
            && !self.is_terminal
    }

    pub fn terminal() -> Self {
        Self {
            is_terminal: true,
            ..Default::default()
        }
    }
}
