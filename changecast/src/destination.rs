//! Destinations: configured external delivery channels for change events.
//!
//! A [`SubscriptionDestination`] is supplied by the subscription system and
//! tagged with its transport kind. [`create_destination`] validates the tag
//! once and returns the publisher that serves it behind the [`Destination`]
//! capability set.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::errors::{DeliveryError, Error};
use crate::events::ChangeEvent;
use crate::webhooks::dispatcher::{PublisherServices, WebhookPublisher};
use crate::webhooks::models::Webhook;

/// Transport kind of a destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SubscriptionType {
    Webhook,
    Slack,
    MsTeams,
    GChat,
    Email,
    ActivityFeed,
}

/// Who a destination notifies. Drives action-target resolution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SubscriptionCategory {
    Users,
    Teams,
    Admins,
    Assignees,
    Owners,
    Mentions,
    Followers,
    External,
}

/// Destination health, as reported to the subscription system.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubscriptionStatus {
    #[default]
    Active,
    /// Delivery is broken until the configuration changes (unknown host, redirects)
    Failed,
    /// The endpoint rejected the last delivery; the caller should retry later
    AwaitingRetry,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusDetails {
    pub status: SubscriptionStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_successful_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_failed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_failed_status_code: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_failed_reason: Option<String>,
}

fn default_enabled() -> bool {
    true
}

fn default_timeout() -> u64 {
    10
}

fn default_read_timeout() -> u64 {
    12
}

/// One configured destination of an event subscription.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionDestination {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub kind: SubscriptionType,
    pub category: SubscriptionCategory,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Connect timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout: u64,
    /// Read timeout in seconds
    #[serde(default = "default_read_timeout")]
    pub read_timeout: u64,
    /// Transport-specific settings; a [`Webhook`] for webhook destinations
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_details: Option<StatusDetails>,
}

impl SubscriptionDestination {
    /// An enabled external webhook destination with default timeouts.
    pub fn webhook(webhook: &Webhook) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind: SubscriptionType::Webhook,
            category: SubscriptionCategory::External,
            enabled: true,
            timeout: default_timeout(),
            read_timeout: default_read_timeout(),
            config: Some(serde_json::to_value(webhook).unwrap_or_default()),
            status_details: None,
        }
    }

    pub fn with_category(mut self, category: SubscriptionCategory) -> Self {
        self.category = category;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventSubscription {
    pub id: Uuid,
    pub name: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[serde(default)]
    pub destinations: Vec<SubscriptionDestination>,
}

impl EventSubscription {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            enabled: true,
            destinations: Vec::new(),
        }
    }
}

/// Capabilities every destination transport offers the subscription system.
#[async_trait]
pub trait Destination: Send + Sync {
    /// Deliver one change event. Success produces no value.
    async fn send_message(&self, event: &ChangeEvent) -> Result<(), DeliveryError>;

    /// Deliver a canned message to verify the destination is wired correctly.
    async fn send_test_message(&self) -> Result<(), DeliveryError>;

    fn event_subscription(&self) -> &EventSubscription;

    fn subscription_destination(&self) -> &SubscriptionDestination;

    fn enabled(&self) -> bool;

    /// Release transport resources. Idempotent.
    fn close(&self);
}

/// Create the publisher for a destination's transport kind.
///
/// This is the single point where destination tags are mapped to
/// implementations; kinds without a publisher are rejected here.
pub fn create_destination(
    subscription: EventSubscription,
    destination: SubscriptionDestination,
    services: PublisherServices,
) -> Result<Box<dyn Destination>, Error> {
    match destination.kind {
        SubscriptionType::Webhook => Ok(Box::new(WebhookPublisher::new(subscription, destination, services)?)),
        other => Err(Error::Configuration {
            message: format!("no publisher available for {other:?} destination {}", destination.id),
        }),
    }
}
