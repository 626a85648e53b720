//! Webhook delivery of change events.
//!
//! - [`models`]: the webhook configuration read from a subscription destination
//! - [`payload`]: request bodies for events and the test message
//! - [`signing`]: HMAC-SHA256 `X-Hub-Signature` generation
//! - [`targets`]: the primary endpoint plus category-derived action targets
//! - [`client`]: the per-publisher HTTP client
//! - [`classify`]: mapping send failures to [`DeliveryError`](crate::errors::DeliveryError)
//! - [`dispatcher`]: the publisher tying it all together

pub mod classify;
pub mod client;
pub mod dispatcher;
pub mod models;
pub mod payload;
pub mod signing;
pub mod targets;

pub use dispatcher::{DeliveryOutcome, DispatchState, PublisherServices, WebhookPublisher};
pub use models::{HttpMethod, Webhook};
pub use signing::{sign_payload, verify_signature};
pub use targets::{ActionTargetLookup, DeliveryTarget, NoActionTargets, ReceiverDirectory};
