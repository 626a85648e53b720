//! Delivery targets: where one dispatch call sends its requests.
//!
//! Target 0 is the destination's own endpoint. Action targets are auxiliary
//! endpoints derived from the destination category and the event, supplied by
//! an [`ActionTargetLookup`].

use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use std::collections::HashMap;
use tracing::debug;

use crate::config::ReceiversConfig;
use crate::destination::{SubscriptionCategory, SubscriptionType};
use crate::events::ChangeEvent;
use crate::webhooks::models::{HttpMethod, Webhook};
use crate::webhooks::signing::SIGNATURE_HEADER;

/// A resolved request destination, scoped to a single dispatch call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryTarget {
    pub url: String,
    pub method: HttpMethod,
    /// Applied in order; later entries replace earlier ones with the same name
    pub headers: Vec<(String, String)>,
}

impl DeliveryTarget {
    /// The destination's own endpoint, or `None` when the endpoint is empty.
    ///
    /// Headers are layered as auth headers, then the signature, then the
    /// webhook's custom headers.
    pub fn primary(webhook: &Webhook, auth_headers: Vec<(String, String)>, signature: Option<String>) -> Option<Self> {
        if !webhook.has_endpoint() {
            return None;
        }

        let mut headers = auth_headers;
        if let Some(signature) = signature {
            headers.push((SIGNATURE_HEADER.to_string(), signature));
        }
        if let Some(custom) = &webhook.headers {
            headers.extend(custom.iter().map(|(k, v)| (k.clone(), v.clone())));
        }

        Some(Self {
            url: webhook.endpoint.clone(),
            method: webhook.http_method,
            headers,
        })
    }

    /// An auxiliary endpoint receiving the plain event JSON by POST.
    pub fn action(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: HttpMethod::Post,
            headers: Vec::new(),
        }
    }

    /// Last value set for a header, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .rev()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub(crate) fn build_request(&self, client: &reqwest::Client, body: String) -> anyhow::Result<reqwest::RequestBuilder> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        for (name, value) in &self.headers {
            let name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| anyhow::anyhow!("invalid header name {name:?}: {e}"))?;
            let value = HeaderValue::from_str(value).map_err(|e| anyhow::anyhow!("invalid value for header {name}: {e}"))?;
            headers.insert(name, value);
        }

        Ok(client.request(self.method.as_reqwest(), &self.url).headers(headers).body(body))
    }
}

/// Supplies category-specific auxiliary targets for an event.
#[async_trait]
pub trait ActionTargetLookup: Send + Sync {
    async fn resolve_action_targets(
        &self,
        webhook: &Webhook,
        category: SubscriptionCategory,
        kind: SubscriptionType,
        event: &ChangeEvent,
    ) -> anyhow::Result<Vec<DeliveryTarget>>;
}

/// Resolves no action targets.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoActionTargets;

#[async_trait]
impl ActionTargetLookup for NoActionTargets {
    async fn resolve_action_targets(
        &self,
        _webhook: &Webhook,
        _category: SubscriptionCategory,
        _kind: SubscriptionType,
        _event: &ChangeEvent,
    ) -> anyhow::Result<Vec<DeliveryTarget>> {
        Ok(Vec::new())
    }
}

/// In-memory directory of the webhooks users and teams registered for
/// themselves.
///
/// - `Users` / `Teams`: the webhook's `receivers` looked up by name
/// - `Owners`: the entity's `owners` references, user or team
/// - `Followers`: the entity's `followers` references
///
/// Other categories and non-webhook kinds resolve nothing. Unknown names are
/// skipped and duplicate URLs are sent once.
#[derive(Debug, Default, Clone)]
pub struct ReceiverDirectory {
    users: HashMap<String, String>,
    teams: HashMap<String, String>,
}

impl ReceiverDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(mut self, name: impl Into<String>, endpoint: impl Into<String>) -> Self {
        self.users.insert(name.into(), endpoint.into());
        self
    }

    pub fn with_team(mut self, name: impl Into<String>, endpoint: impl Into<String>) -> Self {
        self.teams.insert(name.into(), endpoint.into());
        self
    }

    fn lookup(&self, kind: &str, name: &str) -> Option<&String> {
        match kind {
            "team" => self.teams.get(name),
            _ => self.users.get(name),
        }
    }
}

impl From<&ReceiversConfig> for ReceiverDirectory {
    fn from(config: &ReceiversConfig) -> Self {
        Self {
            users: config.users.clone().into_iter().collect(),
            teams: config.teams.clone().into_iter().collect(),
        }
    }
}

#[async_trait]
impl ActionTargetLookup for ReceiverDirectory {
    async fn resolve_action_targets(
        &self,
        webhook: &Webhook,
        category: SubscriptionCategory,
        kind: SubscriptionType,
        event: &ChangeEvent,
    ) -> anyhow::Result<Vec<DeliveryTarget>> {
        if kind != SubscriptionType::Webhook {
            return Ok(Vec::new());
        }

        let receivers: Vec<(&str, &str)> = match category {
            SubscriptionCategory::Users => webhook.receivers.iter().map(|r| ("user", r.as_str())).collect(),
            SubscriptionCategory::Teams => webhook.receivers.iter().map(|r| ("team", r.as_str())).collect(),
            SubscriptionCategory::Owners => event.entity_references("owners"),
            SubscriptionCategory::Followers => event.entity_references("followers"),
            _ => Vec::new(),
        };

        let mut targets: Vec<DeliveryTarget> = Vec::new();
        for (receiver_kind, name) in receivers {
            let Some(url) = self.lookup(receiver_kind, name) else {
                debug!(receiver = name, kind = receiver_kind, "No webhook registered for receiver, skipping");
                continue;
            };
            if targets.iter().all(|t| &t.url != url) {
                targets.push(DeliveryTarget::action(url.clone()));
            }
        }

        Ok(targets)
    }
}
