use thiserror::Error as ThisError;
use uuid::Uuid;

use crate::events::ChangeEvent;

/// Status code reported when a destination's host cannot be resolved.
pub const UNKNOWN_HOST_STATUS: u16 = 400;

/// Reason reported when a destination's host cannot be resolved.
pub const UNKNOWN_HOST_REASON: &str = "UnknownHostException";

/// Errors raised while building publishers or loading configuration.
///
/// None of these are retryable: they describe wiring that has to be fixed
/// before any delivery can be attempted.
#[derive(ThisError, Debug)]
pub enum Error {
    /// Destination kind or settings cannot be served by the requested publisher
    #[error("Invalid destination configuration: {message}")]
    Configuration { message: String },

    /// Secret encryption key is missing, malformed, or a ciphertext is corrupt
    #[error("Secret handling failed: {message}")]
    Crypto { message: String },

    /// Unexpected error with full context chain
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// A classified delivery failure.
///
/// Carries the destination id and, for real (non-test) sends, the event that
/// could not be delivered so callers can correlate it for alerting or
/// dead-lettering.
#[derive(ThisError, Debug, Clone)]
pub enum DeliveryError {
    /// The endpoint host could not be resolved. The destination should be marked degraded.
    #[error("Unknown host for webhook destination {destination_id}, endpoint {endpoint}")]
    HostUnreachable {
        destination_id: Uuid,
        endpoint: String,
        event: Option<Box<ChangeEvent>>,
    },

    /// Any other failure while preparing or sending the request
    #[error("{message}")]
    DeliveryFailure {
        destination_id: Uuid,
        endpoint: String,
        event: Option<Box<ChangeEvent>>,
        status_code: Option<u16>,
        message: String,
    },
}

impl DeliveryError {
    pub fn destination_id(&self) -> Uuid {
        match self {
            Self::HostUnreachable { destination_id, .. } | Self::DeliveryFailure { destination_id, .. } => *destination_id,
        }
    }

    pub fn endpoint(&self) -> &str {
        match self {
            Self::HostUnreachable { endpoint, .. } | Self::DeliveryFailure { endpoint, .. } => endpoint,
        }
    }

    /// The event being delivered, absent for test messages.
    pub fn event(&self) -> Option<&ChangeEvent> {
        match self {
            Self::HostUnreachable { event, .. } | Self::DeliveryFailure { event, .. } => event.as_deref(),
        }
    }

    /// HTTP-style status code: 400 for unknown hosts, the response status for
    /// rejected requests, `None` when no response was received.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::HostUnreachable { .. } => Some(UNKNOWN_HOST_STATUS),
            Self::DeliveryFailure { status_code, .. } => *status_code,
        }
    }

    pub fn reason(&self) -> &str {
        match self {
            Self::HostUnreachable { .. } => UNKNOWN_HOST_REASON,
            Self::DeliveryFailure { message, .. } => message,
        }
    }

    pub fn is_host_unreachable(&self) -> bool {
        matches!(self, Self::HostUnreachable { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_unreachable_accessors() {
        let id = Uuid::new_v4();
        let err = DeliveryError::HostUnreachable {
            destination_id: id,
            endpoint: "https://nowhere.invalid/hook".to_string(),
            event: None,
        };

        assert!(err.is_host_unreachable());
        assert_eq!(err.destination_id(), id);
        assert_eq!(err.status_code(), Some(400));
        assert_eq!(err.reason(), "UnknownHostException");
        assert!(err.event().is_none());
        assert!(err.to_string().contains("https://nowhere.invalid/hook"));
    }

    #[test]
    fn test_delivery_failure_displays_message() {
        let err = DeliveryError::DeliveryFailure {
            destination_id: Uuid::nil(),
            endpoint: "http://localhost/hook".to_string(),
            event: None,
            status_code: Some(503),
            message: "upstream unavailable".to_string(),
        };

        assert!(!err.is_host_unreachable());
        assert_eq!(err.status_code(), Some(503));
        assert_eq!(err.to_string(), "upstream unavailable");
        assert_eq!(err.endpoint(), "http://localhost/hook");
    }
}
