//! # changecast: webhook delivery for metadata change events
//!
//! `changecast` pushes change events (an entity was created, updated, deleted
//! and so on) to HTTP webhook endpoints registered by event subscriptions.
//!
//! ## Delivery
//!
//! A subscription owns destinations. Each webhook destination gets a
//! [`WebhookPublisher`](webhooks::WebhookPublisher) holding its own HTTP
//! client with the destination's connect and read timeouts. One call to
//! [`Destination::send_message`](destination::Destination::send_message):
//!
//! 1. builds the body: the webhook's fixed `json` override if set, otherwise
//!    the event serialized as JSON
//! 2. signs it with HMAC-SHA256 into `X-Hub-Signature: sha256=<hex>` when the
//!    webhook has a secret, decrypting the secret first if an encryption key
//!    is configured
//! 3. adds auth headers for the configured principal and the webhook's custom
//!    headers, then sends it with the configured method
//! 4. posts the plain event JSON to any action targets (owner, follower,
//!    user or team webhooks) derived from the destination category
//!
//! Failures are classified: unresolvable hosts become
//! [`DeliveryError::HostUnreachable`](errors::DeliveryError::HostUnreachable)
//! and the destination is marked failed with status 400; everything else is a
//! [`DeliveryError::DeliveryFailure`](errors::DeliveryError::DeliveryFailure)
//! naming the destination, the endpoint and the cause. Nothing is retried
//! here.
//!
//! ## Modules
//!
//! - [`config`]: figment configuration from YAML plus `CHANGECAST_` env vars
//! - [`destination`]: subscription data model and the publisher factory
//! - [`webhooks`]: payloads, signing, targets and the publisher
//! - [`crypto`]: AES-256-GCM secret decryption
//! - [`auth`]: outbound auth headers
//! - [`verify`]: startup test messages to every destination

pub mod auth;
pub mod config;
pub mod crypto;
pub mod destination;
pub mod errors;
pub mod events;
pub mod telemetry;
pub mod verify;
pub mod webhooks;

pub use config::Config;
pub use destination::{Destination, EventSubscription, SubscriptionDestination, create_destination};
pub use errors::{DeliveryError, Error};
pub use events::{ChangeEvent, EventType};
pub use webhooks::{DeliveryOutcome, PublisherServices, WebhookPublisher};
