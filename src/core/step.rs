use serde::{Deserialize, Serialize};

use crate::core::payload::Payload;

/// One named unit of work queued for sequential dispatch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    #[serde(rename = "eventName", alias = "event")]
    pub event: String,
    #[serde(default)]
    pub payload: Payload,
}

impl Step {
    pub fn new(event: impl Into<String>, payload: Payload) -> Self {
        Self {
            event: event.into(),
            payload,
        }
    }
}

/// Input item for [`ChainEngine::batch`](crate::ChainEngine::batch)
///
/// Accepts both `{"eventName", "payload"}` and the shorter
/// `{"event", "props"}` spelling when deserialized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchItem {
    #[serde(rename = "eventName", alias = "event")]
    pub event: String,
    #[serde(default, alias = "props", skip_serializing_if = "Option::is_none")]
    pub payload: Option<Payload>,
}

impl BatchItem {
    pub fn new(event: impl Into<String>) -> Self {
        Self {
            event: event.into(),
            payload: None,
        }
    }

    pub fn with_payload(mut self, payload: Payload) -> Self {
        self.payload = Some(payload);
        self
    }

    /// A `sleep` item in the default marker spelling
    pub fn sleep(duration_ms: u64) -> Self {
        Self::new(crate::config::DEFAULT_BATCH_DELAY_MARKER)
            .with_payload(Payload::new().with("duration", duration_ms))
    }
}

impl From<Step> for BatchItem {
    fn from(step: Step) -> Self {
        Self {
            event: step.event,
            payload: Some(step.payload),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_items_accept_both_spellings() {
        let items: Vec<BatchItem> = serde_json::from_str(
            r#"[
                {"eventName": "todo:add", "payload": {"title": "a"}},
                {"event": "sleep", "props": {"duration": 10}},
                {"event": "todo:render"}
            ]"#,
        )
        .expect("parse");

        assert_eq!(items[0].event, "todo:add");
        assert_eq!(items[1].payload.as_ref().and_then(|p| p.get_u64("duration")), Some(10));
        assert!(items[2].payload.is_none());
    }
}
