//! Change events: the records this crate broadcasts.
//!
//! Events are produced elsewhere; dispatch only needs them to be cloneable and
//! serializable to their canonical JSON form.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Kind of entity mutation an event describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EventType {
    EntityCreated,
    EntityUpdated,
    EntityFieldsChanged,
    EntitySoftDeleted,
    EntityDeleted,
    EntityRestored,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::EntityCreated => "entityCreated",
            Self::EntityUpdated => "entityUpdated",
            Self::EntityFieldsChanged => "entityFieldsChanged",
            Self::EntitySoftDeleted => "entitySoftDeleted",
            Self::EntityDeleted => "entityDeleted",
            Self::EntityRestored => "entityRestored",
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EventType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "entityCreated" => Ok(Self::EntityCreated),
            "entityUpdated" => Ok(Self::EntityUpdated),
            "entityFieldsChanged" => Ok(Self::EntityFieldsChanged),
            "entitySoftDeleted" => Ok(Self::EntitySoftDeleted),
            "entityDeleted" => Ok(Self::EntityDeleted),
            "entityRestored" => Ok(Self::EntityRestored),
            _ => Err(format!("Unknown event type: {}", s)),
        }
    }
}

/// One entity mutation: who changed what, and when.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeEvent {
    pub id: Uuid,
    pub event_type: EventType,
    /// Entity kind, e.g. "table" or "dashboard"
    pub entity_type: String,
    pub entity_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_fully_qualified_name: Option<String>,
    /// Who made the change
    pub user_name: String,
    /// Epoch milliseconds
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_version: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_version: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub change_description: Option<Value>,
    /// Snapshot of the entity after the change
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity: Option<Value>,
}

impl ChangeEvent {
    /// Create an event stamped with a fresh id and the current time.
    pub fn new(event_type: EventType, entity_type: impl Into<String>, entity_id: Uuid, user_name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            event_type,
            entity_type: entity_type.into(),
            entity_id,
            entity_fully_qualified_name: None,
            user_name: user_name.into(),
            timestamp: Utc::now().timestamp_millis(),
            previous_version: None,
            current_version: None,
            change_description: None,
            entity: None,
        }
    }

    pub fn with_fully_qualified_name(mut self, fqn: impl Into<String>) -> Self {
        self.entity_fully_qualified_name = Some(fqn.into());
        self
    }

    pub fn with_entity(mut self, entity: Value) -> Self {
        self.entity = Some(entity);
        self
    }

    /// Entity references stored under `field` in the entity snapshot (e.g.
    /// `owners`, `followers`), as `(type, name)` pairs. References without a
    /// `type` are treated as users.
    pub fn entity_references(&self, field: &str) -> Vec<(&str, &str)> {
        let Some(refs) = self.entity.as_ref().and_then(|e| e.get(field)).and_then(Value::as_array) else {
            return Vec::new();
        };

        refs.iter()
            .filter_map(|r| {
                let name = r.get("name")?.as_str()?;
                let kind = r.get("type").and_then(Value::as_str).unwrap_or("user");
                Some((kind, name))
            })
            .collect()
    }

    /// Short human-readable description used in failure messages.
    pub fn describe(&self) -> String {
        let subject = self
            .entity_fully_qualified_name
            .clone()
            .unwrap_or_else(|| self.entity_id.to_string());
        format!("{} event {} for {} {}", self.event_type, self.id, self.entity_type, subject)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_event_type_from_str() {
        assert_eq!("entityUpdated".parse::<EventType>().unwrap(), EventType::EntityUpdated);
        assert!("entity_updated".parse::<EventType>().is_err());
    }

    #[test]
    fn test_event_serializes_camel_case_and_omits_empty_fields() {
        let event = ChangeEvent::new(EventType::EntityUpdated, "table", Uuid::nil(), "alice");
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["eventType"], "entityUpdated");
        assert_eq!(json["entityType"], "table");
        assert_eq!(json["userName"], "alice");
        assert!(json.get("entity").is_none());
        assert!(json.get("previousVersion").is_none());
    }

    #[test]
    fn test_entity_references() {
        let event = ChangeEvent::new(EventType::EntityUpdated, "table", Uuid::nil(), "alice").with_entity(json!({
            "owners": [
                {"type": "team", "name": "data-platform"},
                {"name": "bob"},
                {"type": "user"}
            ]
        }));

        assert_eq!(event.entity_references("owners"), vec![("team", "data-platform"), ("user", "bob")]);
        assert!(event.entity_references("followers").is_empty());
    }

    #[test]
    fn test_describe_prefers_fully_qualified_name() {
        let event = ChangeEvent::new(EventType::EntityDeleted, "table", Uuid::nil(), "alice")
            .with_fully_qualified_name("warehouse.sales.orders");

        let description = event.describe();
        assert!(description.starts_with("entityDeleted event"));
        assert!(description.ends_with("table warehouse.sales.orders"));
    }
}
