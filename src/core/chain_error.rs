use thiserror::Error;

/// Errors surfaced by the typed and serialized entry points of the engine.
///
/// The core chain surface (`register`, `enqueue`, `delay`, `clear`) never
/// fails; these only appear when caller data has to be converted.
#[derive(Debug, Error)]
pub enum ChainError {
    /// A JSON value that should have been an object was something else
    #[error("payload must be a JSON object, got {found}")]
    NotAnObject { found: &'static str },

    /// A payload could not be decoded into the requested type
    #[error("failed to decode payload for '{event}': {source}")]
    Decode {
        event: String,
        #[source]
        source: serde_json::Error,
    },

    /// A value could not be encoded into a payload
    #[error("failed to encode payload: {0}")]
    Encode(#[source] serde_json::Error),

    /// A serialized batch was malformed
    #[error("invalid batch: {0}")]
    InvalidBatch(#[source] serde_json::Error),

    /// The configuration file could not be parsed
    #[error("invalid configuration: {0}")]
    Config(#[from] toml::de::Error),

    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),
}

impl ChainError {
    pub(crate) fn not_an_object(value: &serde_json::Value) -> Self {
        let found = match value {
            serde_json::Value::Null => "null",
            serde_json::Value::Bool(_) => "boolean",
            serde_json::Value::Number(_) => "number",
            serde_json::Value::String(_) => "string",
            serde_json::Value::Array(_) => "array",
            serde_json::Value::Object(_) => "object",
        };
        Self::NotAnObject { found }
    }
}
