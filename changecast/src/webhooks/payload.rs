//! Request bodies for webhook deliveries.

use crate::events::ChangeEvent;

/// Body of test messages when no fixed payload is configured.
pub const TEST_MESSAGE: &str = "This is a test message to confirm your webhook destination is configured correctly.";

/// Canonical JSON form of an event.
pub fn canonical_json(event: &ChangeEvent) -> serde_json::Result<String> {
    serde_json::to_string(event)
}

/// Body for a real delivery: the fixed payload verbatim if one is set,
/// otherwise the event's canonical JSON.
pub fn build_event_payload(event: &ChangeEvent, fixed: Option<&str>) -> serde_json::Result<String> {
    match fixed.filter(|f| !f.is_empty()) {
        Some(fixed) => Ok(fixed.to_string()),
        None => canonical_json(event),
    }
}

/// Body for a test delivery.
pub fn build_test_payload(fixed: Option<&str>) -> String {
    fixed.filter(|f| !f.is_empty()).unwrap_or(TEST_MESSAGE).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventType;
    use uuid::Uuid;

    fn event() -> ChangeEvent {
        ChangeEvent::new(EventType::EntityCreated, "table", Uuid::new_v4(), "alice")
    }

    #[test]
    fn test_fixed_payload_ignores_event() {
        let fixed = r#"{"static":true}"#;
        assert_eq!(build_event_payload(&event(), Some(fixed)).unwrap(), fixed);
        assert_eq!(build_event_payload(&event(), Some(fixed)).unwrap(), fixed);
    }

    #[test]
    fn test_event_payload_is_canonical_json() {
        let event = event();
        let body = build_event_payload(&event, None).unwrap();
        assert_eq!(body, serde_json::to_string(&event).unwrap());

        // An empty override counts as unset
        assert_eq!(build_event_payload(&event, Some("")).unwrap(), body);
    }

    #[test]
    fn test_test_payload() {
        assert_eq!(build_test_payload(None), TEST_MESSAGE);
        assert_eq!(build_test_payload(Some("")), TEST_MESSAGE);
        assert_eq!(build_test_payload(Some("fixture")), "fixture");
    }
}
