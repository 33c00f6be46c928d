use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Role marker for records meant for the system rather than a user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextRole {
    System,
}

/// A named, keyed blob broadcast on the [`ContextBus`](crate::ContextBus)
///
/// Records are grouped by `from`. An empty `id` asks the bus to assign one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextRecord {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub data: Value,
    pub from: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<ContextRole>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub once: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
}

impl ContextRecord {
    pub fn new(from: impl Into<String>, name: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            name: name.into(),
            data: Value::Null,
            from: from.into(),
            kind: kind.into(),
            role: None,
            once: None,
            title: None,
            content: None,
        }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_data(mut self, data: impl Into<Value>) -> Self {
        self.data = data.into();
        self
    }

    pub fn with_role(mut self, role: ContextRole) -> Self {
        self.role = Some(role);
        self
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn type_field_maps_to_kind() {
        let record: ContextRecord = serde_json::from_value(json!({
            "name": "selection",
            "from": "todo-list",
            "type": "selection",
            "role": "system",
            "data": {"ids": [1, 2]}
        }))
        .expect("parse");

        assert!(record.id.is_empty());
        assert_eq!(record.kind, "selection");
        assert_eq!(record.role, Some(ContextRole::System));

        let back = serde_json::to_value(&record).expect("encode");
        assert_eq!(back["type"], "selection");
        assert!(back.get("title").is_none());
    }
}
