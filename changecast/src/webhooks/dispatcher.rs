//! Webhook publisher: build, sign, resolve, send, classify.
//!
//! ```text
//! publisher.send_message(event)
//!   ├─ endpoint empty? ── yes ──► Skipped (no requests)
//!   ├─ payload::build_event_payload()      // fixed template or event JSON
//!   ├─ signing::signature_header()         // decrypts the secret once
//!   ├─ auth.auth_headers(principal)
//!   ├─ HTTP send to target 0 (primary)     // failure short-circuits
//!   ├─ action_targets.resolve_action_targets()
//!   └─ for each action target:             // sequential, unsigned event JSON
//!        └─ HTTP send ── failure ──► ActionFailurePolicy (log | fail)
//!
//! any failure ──► classify() ──► HostUnreachable | DeliveryFailure
//! ```
//!
//! No retries happen here. The caller owns retry policy and observes the
//! classified error plus [`WebhookPublisher::status_details`].

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::Duration;

use arc_swap::{ArcSwap, ArcSwapOption};
use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, info, warn};

use crate::auth::{self, AuthHeaderProvider, NoAuthHeaders};
use crate::config::{AuthConfig, Config};
use crate::crypto::{self, PlaintextSecrets, SecretDecryptor};
use crate::destination::{Destination, EventSubscription, StatusDetails, SubscriptionDestination, SubscriptionStatus, SubscriptionType};
use crate::errors::{DeliveryError, Error, UNKNOWN_HOST_REASON, UNKNOWN_HOST_STATUS};
use crate::events::ChangeEvent;
use crate::webhooks::classify::{FailureContext, SendFailure, classify};
use crate::webhooks::models::Webhook;
use crate::webhooks::targets::{ActionTargetLookup, DeliveryTarget, NoActionTargets, ReceiverDirectory};
use crate::webhooks::{client, payload, signing};

pub use crate::config::ActionFailurePolicy;

/// Collaborators a publisher is constructed with.
#[derive(Clone)]
pub struct PublisherServices {
    pub secrets: Arc<dyn SecretDecryptor>,
    pub auth: Arc<dyn AuthHeaderProvider>,
    pub action_targets: Arc<dyn ActionTargetLookup>,
    /// Principal the auth headers are requested for
    pub principal: String,
    pub action_failure_policy: ActionFailurePolicy,
}

impl Default for PublisherServices {
    fn default() -> Self {
        Self {
            secrets: Arc::new(PlaintextSecrets),
            auth: Arc::new(NoAuthHeaders),
            action_targets: Arc::new(NoActionTargets),
            principal: AuthConfig::default().principal,
            action_failure_policy: ActionFailurePolicy::default(),
        }
    }
}

impl PublisherServices {
    pub fn from_config(config: &Config) -> Result<Self, Error> {
        Ok(Self {
            secrets: crypto::secrets_from_key(config.encryption_key.as_deref())?,
            auth: auth::provider_from_config(&config.auth),
            action_targets: Arc::new(ReceiverDirectory::from(&config.dispatch.receivers)),
            principal: config.auth.principal.clone(),
            action_failure_policy: config.dispatch.action_failure_policy,
        })
    }
}

/// Where a publisher is in its current (or last) dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum DispatchState {
    Idle = 0,
    Sending = 1,
    Succeeded = 2,
    Failed = 3,
}

impl DispatchState {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Sending,
            2 => Self::Succeeded,
            3 => Self::Failed,
            _ => Self::Idle,
        }
    }
}

/// Result of one dispatch call.
#[derive(Debug, Clone)]
pub enum DeliveryOutcome {
    /// Every attempted request was accepted (or its failure was only logged)
    Delivered,
    /// The destination has no endpoint; nothing was sent
    Skipped,
    HostUnreachable(DeliveryError),
    Failed(DeliveryError),
}

impl DeliveryOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Delivered | Self::Skipped)
    }

    pub fn into_result(self) -> Result<(), DeliveryError> {
        match self {
            Self::Delivered | Self::Skipped => Ok(()),
            Self::HostUnreachable(e) | Self::Failed(e) => Err(e),
        }
    }
}

/// A failed request and the target it was sent to.
struct TargetFailure {
    url: String,
    /// Whether the target is the destination's own endpoint
    primary: bool,
    failure: SendFailure,
}

pub struct WebhookPublisher {
    client: ArcSwapOption<reqwest::Client>,
    webhook: Webhook,
    destination: SubscriptionDestination,
    subscription: EventSubscription,
    services: PublisherServices,
    state: AtomicU8,
    status: ArcSwap<StatusDetails>,
}

impl WebhookPublisher {
    /// Create a publisher for a webhook destination.
    ///
    /// Fails with [`Error::Configuration`] if the destination is not a webhook
    /// or its config cannot be read.
    pub fn new(
        subscription: EventSubscription,
        destination: SubscriptionDestination,
        services: PublisherServices,
    ) -> Result<Self, Error> {
        if destination.kind != SubscriptionType::Webhook {
            return Err(Error::Configuration {
                message: format!(
                    "webhook publisher invoked with {:?} destination {}",
                    destination.kind, destination.id
                ),
            });
        }

        let webhook = Webhook::from_destination(&destination)?;
        let client = client::build_client(
            Duration::from_secs(destination.timeout),
            Duration::from_secs(destination.read_timeout),
        )?;
        let status = destination.status_details.clone().unwrap_or_default();

        debug!(
            destination_id = %destination.id,
            subscription = %subscription.name,
            endpoint = %webhook.endpoint,
            "Created webhook publisher"
        );

        Ok(Self {
            client: ArcSwapOption::from_pointee(client),
            webhook,
            destination,
            subscription,
            services,
            state: AtomicU8::new(DispatchState::Idle as u8),
            status: ArcSwap::from_pointee(status),
        })
    }

    pub fn webhook(&self) -> &Webhook {
        &self.webhook
    }

    pub fn state(&self) -> DispatchState {
        DispatchState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Latest health record for this destination.
    pub fn status_details(&self) -> StatusDetails {
        StatusDetails::clone(&self.status.load())
    }

    /// Deliver an event and report the classified outcome.
    pub async fn dispatch(&self, event: &ChangeEvent) -> DeliveryOutcome {
        self.set_state(DispatchState::Sending);
        let result = self.deliver_event(event).await;
        self.finish(result, Some(event))
    }

    /// Deliver the test message and report the classified outcome.
    pub async fn dispatch_test(&self) -> DeliveryOutcome {
        self.set_state(DispatchState::Sending);
        let result = self.deliver_test().await;
        self.finish(result, None)
    }

    /// Release the HTTP client. Safe to call repeatedly.
    pub fn close(&self) {
        if self.client.swap(None).is_some() {
            debug!(destination_id = %self.destination.id, "Closed webhook publisher client");
        }
    }

    async fn deliver_event(&self, event: &ChangeEvent) -> Result<bool, TargetFailure> {
        if !self.webhook.has_endpoint() {
            debug!(destination_id = %self.destination.id, "Webhook endpoint is empty, skipping delivery");
            return Ok(false);
        }

        let client = async {
            let client = self.client()?;
            let body = payload::build_event_payload(event, self.webhook.fixed_payload()).map_err(anyhow::Error::from)?;
            self.send_primary(&client, body).await?;
            Ok::<_, SendFailure>(client)
        }
        .await
        .map_err(|failure| self.primary_failure(failure))?;

        self.send_action_targets(&client, event).await?;
        Ok(true)
    }

    async fn deliver_test(&self) -> Result<bool, TargetFailure> {
        if !self.webhook.has_endpoint() {
            debug!(destination_id = %self.destination.id, "Webhook endpoint is empty, skipping test message");
            return Ok(false);
        }

        async {
            let client = self.client()?;
            let body = payload::build_test_payload(self.webhook.fixed_payload());
            self.send_primary(&client, body).await
        }
        .await
        .map_err(|failure| self.primary_failure(failure))?;
        Ok(true)
    }

    fn client(&self) -> Result<Arc<reqwest::Client>, SendFailure> {
        self.client.load_full().ok_or(SendFailure::ClientClosed)
    }

    fn primary_failure(&self, failure: SendFailure) -> TargetFailure {
        TargetFailure {
            url: self.webhook.endpoint.clone(),
            primary: true,
            failure,
        }
    }

    /// Send to the destination's own endpoint. Only this request updates the
    /// destination's status details.
    async fn send_primary(&self, client: &reqwest::Client, body: String) -> Result<(), SendFailure> {
        let signature = signing::signature_header(&body, self.webhook.secret(), self.services.secrets.as_ref()).await?;
        let auth_headers = self.services.auth.auth_headers(&self.services.principal)?;

        let Some(target) = DeliveryTarget::primary(&self.webhook, auth_headers, signature) else {
            return Ok(());
        };

        match self.send(client, &target, body).await {
            Ok(()) => {
                self.record_success();
                Ok(())
            }
            Err(failure) => {
                if let SendFailure::Status { code, reason, .. } = &failure {
                    // Redirects are never followed, so the destination is misconfigured
                    let health = if (300..400).contains(code) {
                        SubscriptionStatus::Failed
                    } else {
                        SubscriptionStatus::AwaitingRetry
                    };
                    self.record_failure(health, *code, reason);
                }
                Err(failure)
            }
        }
    }

    async fn send_action_targets(&self, client: &reqwest::Client, event: &ChangeEvent) -> Result<(), TargetFailure> {
        let targets = self
            .services
            .action_targets
            .resolve_action_targets(&self.webhook, self.destination.category, self.destination.kind, event)
            .await
            .map_err(|e| self.primary_failure(e.into()))?;
        if targets.is_empty() {
            return Ok(());
        }

        let event_json = payload::canonical_json(event).map_err(|e| self.primary_failure(anyhow::Error::from(e).into()))?;
        for target in &targets {
            let Err(failure) = self.send(client, target, event_json.clone()).await else {
                continue;
            };
            match self.services.action_failure_policy {
                ActionFailurePolicy::Log => {
                    warn!(
                        destination_id = %self.destination.id,
                        url = %target.url,
                        error = %failure,
                        "Action target delivery failed"
                    );
                }
                ActionFailurePolicy::Fail => {
                    return Err(TargetFailure {
                        url: target.url.clone(),
                        primary: false,
                        failure,
                    });
                }
            }
        }

        Ok(())
    }

    async fn send(&self, client: &reqwest::Client, target: &DeliveryTarget, body: String) -> Result<(), SendFailure> {
        let request = target.build_request(client, body)?;

        debug!(
            destination_id = %self.destination.id,
            url = %target.url,
            method = ?target.method,
            "Sending webhook HTTP request"
        );

        let response = request.send().await?;
        let status = response.status();

        if status.is_success() {
            debug!(
                destination_id = %self.destination.id,
                url = %target.url,
                status = status.as_u16(),
                "Webhook delivered successfully"
            );
            return Ok(());
        }

        Err(SendFailure::Status {
            url: target.url.clone(),
            code: status.as_u16(),
            reason: status.canonical_reason().unwrap_or("Unknown").to_string(),
        })
    }

    fn finish(&self, result: Result<bool, TargetFailure>, event: Option<&ChangeEvent>) -> DeliveryOutcome {
        match result {
            Ok(true) => {
                self.set_state(DispatchState::Succeeded);
                DeliveryOutcome::Delivered
            }
            Ok(false) => {
                self.set_state(DispatchState::Idle);
                DeliveryOutcome::Skipped
            }
            Err(TargetFailure { url, primary, failure }) => {
                self.set_state(DispatchState::Failed);
                let error = classify(
                    &failure,
                    FailureContext {
                        destination_id: self.destination.id,
                        endpoint: &url,
                        event,
                    },
                );
                if !error.is_host_unreachable() {
                    return DeliveryOutcome::Failed(error);
                }
                if primary {
                    self.record_failure(SubscriptionStatus::Failed, UNKNOWN_HOST_STATUS, UNKNOWN_HOST_REASON);
                }
                DeliveryOutcome::HostUnreachable(error)
            }
        }
    }

    fn set_state(&self, state: DispatchState) {
        self.state.store(state as u8, Ordering::Release);
    }

    fn record_success(&self) {
        let now = Utc::now();
        self.status.rcu(|current| StatusDetails {
            status: SubscriptionStatus::Active,
            last_successful_at: Some(now),
            ..current.as_ref().clone()
        });
    }

    fn record_failure(&self, status: SubscriptionStatus, code: u16, reason: &str) {
        let now = Utc::now();
        self.status.rcu(|current| StatusDetails {
            status,
            last_failed_at: Some(now),
            last_failed_status_code: Some(code),
            last_failed_reason: Some(reason.to_string()),
            ..current.as_ref().clone()
        });
        info!(
            destination_id = %self.destination.id,
            status = ?status,
            status_code = code,
            reason,
            "Webhook destination status updated"
        );
    }
}

#[async_trait]
impl Destination for WebhookPublisher {
    async fn send_message(&self, event: &ChangeEvent) -> Result<(), DeliveryError> {
        self.dispatch(event).await.into_result()
    }

    async fn send_test_message(&self) -> Result<(), DeliveryError> {
        self.dispatch_test().await.into_result()
    }

    fn event_subscription(&self) -> &EventSubscription {
        &self.subscription
    }

    fn subscription_destination(&self) -> &SubscriptionDestination {
        &self.destination
    }

    fn enabled(&self) -> bool {
        self.destination.enabled
    }

    fn close(&self) {
        WebhookPublisher::close(self)
    }
}
