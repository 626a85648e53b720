//! Classification of delivery failures.
//!
//! Every failure maps to exactly one [`DeliveryError`]:
//!
//! - host resolution failures anywhere in the source chain become
//!   [`DeliveryError::HostUnreachable`] (status 400, `UnknownHostException`)
//! - everything else becomes [`DeliveryError::DeliveryFailure`] with a message
//!   naming the destination, the endpoint and the underlying error

use std::error::Error as StdError;

use thiserror::Error as ThisError;
use tracing::{error, warn};
use uuid::Uuid;

use crate::errors::DeliveryError;
use crate::events::ChangeEvent;

/// Fragments of resolver error messages, lowercase.
const HOST_RESOLUTION_MARKERS: &[&str] = &[
    "dns error",
    "failed to lookup address",
    "name or service not known",
    "nodename nor servname",
    "no such host",
    "temporary failure in name resolution",
];

/// Why a single send attempt failed, before classification.
#[derive(ThisError, Debug)]
pub enum SendFailure {
    /// No response was received
    #[error(transparent)]
    Transport(#[from] reqwest::Error),

    /// The endpoint answered outside 2xx
    #[error("{url} responded with HTTP {code} {reason}")]
    Status { url: String, code: u16, reason: String },

    /// The request could not be built: payload, secret, auth or header errors
    #[error(transparent)]
    Prepare(#[from] anyhow::Error),

    #[error("webhook client has been closed")]
    ClientClosed,
}

impl SendFailure {
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Status { code, .. } => Some(*code),
            Self::Transport(e) => e.status().map(|s| s.as_u16()),
            Self::Prepare(_) | Self::ClientClosed => None,
        }
    }

    /// Whether the request itself failed because its host could not be resolved.
    ///
    /// Only transport errors count: collaborators failing on their own
    /// lookups say nothing about the webhook endpoint.
    pub fn is_host_resolution_failure(&self) -> bool {
        match self {
            Self::Transport(e) => is_host_resolution_failure(e),
            Self::Prepare(_) | Self::Status { .. } | Self::ClientClosed => false,
        }
    }
}

/// Walk an error's source chain looking for a resolver failure.
pub fn is_host_resolution_failure(err: &(dyn StdError + 'static)) -> bool {
    let mut current = Some(err);
    while let Some(e) = current {
        let text = e.to_string().to_ascii_lowercase();
        if HOST_RESOLUTION_MARKERS.iter().any(|m| text.contains(m)) {
            return true;
        }
        current = e.source();
    }
    false
}

/// What the failure is reported against.
#[derive(Debug, Clone, Copy)]
pub struct FailureContext<'a> {
    pub destination_id: Uuid,
    pub endpoint: &'a str,
    /// Absent for test messages
    pub event: Option<&'a ChangeEvent>,
}

/// Turn a send failure into the error surfaced to the caller.
pub fn classify(failure: &SendFailure, ctx: FailureContext<'_>) -> DeliveryError {
    let event = ctx.event.map(|e| Box::new(e.clone()));

    if failure.is_host_resolution_failure() {
        warn!(
            destination_id = %ctx.destination_id,
            endpoint = ctx.endpoint,
            error = %failure,
            "Unknown host for webhook destination"
        );
        return DeliveryError::HostUnreachable {
            destination_id: ctx.destination_id,
            endpoint: ctx.endpoint.to_string(),
            event,
        };
    }

    let subject = match ctx.event {
        Some(event) => event.describe(),
        None => "test message".to_string(),
    };
    let message = format!(
        "Failed to publish {} to webhook destination {} ({}): {}",
        subject,
        ctx.destination_id,
        ctx.endpoint,
        error_chain(failure)
    );
    error!(
        destination_id = %ctx.destination_id,
        endpoint = ctx.endpoint,
        status_code = ?failure.status_code(),
        "{message}"
    );

    DeliveryError::DeliveryFailure {
        destination_id: ctx.destination_id,
        endpoint: ctx.endpoint.to_string(),
        event,
        status_code: failure.status_code(),
        message,
    }
}

/// Render an error and its sources as `outer: inner: root`.
fn error_chain(err: &(dyn StdError + 'static)) -> String {
    let mut rendered = err.to_string();
    let mut current = err.source();
    while let Some(e) = current {
        let text = e.to_string();
        if !rendered.contains(&text) {
            rendered.push_str(": ");
            rendered.push_str(&text);
        }
        current = e.source();
    }
    rendered
}
