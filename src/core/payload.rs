use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::core::chain_error::ChainError;

/// Key under which the previous step's result is threaded into a dispatch.
pub const PREV_KEY: &str = "prev";

/// Opaque, JSON-serializable key/value bag carried by every step
///
/// Payloads cross every boundary of the engine: they are what callers
/// enqueue, what handlers receive (augmented with [`PREV_KEY`]) and what
/// handlers hand back through their continuation.
///
/// # Example
///
/// ```ignore
/// use event_bridge::Payload;
///
/// let payload = Payload::new().with("title", "buy milk").with("done", false);
/// assert_eq!(payload.get_str("title"), Some("buy milk"));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Payload(Map<String, Value>);

impl Payload {
    /// Create an empty payload
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Add a field (fluent API - consumes self)
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Insert a field, returning the value it replaced
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.0.insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    pub fn get_u64(&self, key: &str) -> Option<u64> {
        self.0.get(key).and_then(Value::as_u64)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_inner(self) -> Map<String, Value> {
        self.0
    }

    /// The carried-forward result of the previous step
    ///
    /// Returns an empty payload when there is no `prev` field or it is not
    /// an object.
    pub fn prev(&self) -> Payload {
        match self.0.get(PREV_KEY) {
            Some(Value::Object(map)) => Payload(map.clone()),
            _ => Payload::new(),
        }
    }

    /// Build the payload handed to handlers: own fields plus `prev`
    ///
    /// A `prev` key already present in the step payload is overwritten.
    pub fn with_prev(&self, prev: Payload) -> Payload {
        let mut merged = self.0.clone();
        merged.insert(PREV_KEY.to_string(), Value::Object(prev.0));
        Payload(merged)
    }

    /// Encode any serializable value that renders as a JSON object
    pub fn from_serializable<T: Serialize + ?Sized>(value: &T) -> Result<Self, ChainError> {
        let value = serde_json::to_value(value).map_err(ChainError::Encode)?;
        Self::try_from(value)
    }

    /// Decode this payload into a typed value
    ///
    /// `event` only labels the error.
    pub fn decode<T: DeserializeOwned>(&self, event: &str) -> Result<T, ChainError> {
        serde_json::from_value(Value::Object(self.0.clone())).map_err(|source| {
            ChainError::Decode {
                event: event.to_string(),
                source,
            }
        })
    }
}

impl From<Map<String, Value>> for Payload {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl From<Payload> for Value {
    fn from(payload: Payload) -> Self {
        Value::Object(payload.0)
    }
}

impl TryFrom<Value> for Payload {
    type Error = ChainError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(map) => Ok(Self(map)),
            other => Err(ChainError::not_an_object(&other)),
        }
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Payload {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Todo {
        title: String,
        done: bool,
    }

    #[test]
    fn with_prev_overwrites_existing_prev_field() {
        let step = Payload::new().with("a", 1).with(PREV_KEY, "stale");
        let merged = step.with_prev(Payload::new().with("x", 1));

        assert_eq!(merged.get("a"), Some(&json!(1)));
        assert_eq!(merged.prev(), Payload::new().with("x", 1));
    }

    #[test]
    fn prev_is_empty_when_missing_or_not_an_object() {
        assert!(Payload::new().prev().is_empty());
        assert!(Payload::new().with(PREV_KEY, 5).prev().is_empty());
    }

    #[test]
    fn typed_payloads_decode() {
        let payload = Payload::from_serializable(&Todo {
            title: "write docs".into(),
            done: false,
        })
        .expect("encode");

        assert_eq!(payload.get_str("title"), Some("write docs"));
        let back: Todo = payload.decode("todo:add").expect("decode");
        assert!(!back.done);
    }

    #[test]
    fn decode_error_names_the_event() {
        let err = Payload::new().decode::<Todo>("todo:add").unwrap_err();
        assert!(err.to_string().contains("todo:add"));
    }

    #[test]
    fn non_objects_are_rejected() {
        let err = Payload::try_from(json!([1, 2])).unwrap_err();
        assert!(matches!(err, ChainError::NotAnObject { found: "array" }));
    }
}
