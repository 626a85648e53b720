//! Webhook destination settings.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::destination::SubscriptionDestination;
use crate::errors::Error;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum HttpMethod {
    #[default]
    Post,
    Put,
}

impl HttpMethod {
    pub fn as_reqwest(&self) -> reqwest::Method {
        match self {
            Self::Post => reqwest::Method::POST,
            Self::Put => reqwest::Method::PUT,
        }
    }
}

/// Settings of a webhook destination, carried in its free-form `config`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Webhook {
    /// Target URL. An empty endpoint disables delivery without being an error.
    pub endpoint: String,
    /// Fixed payload sent verbatim instead of the serialized event
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub json: Option<String>,
    /// HMAC secret, possibly encrypted at rest
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<BTreeMap<String, String>>,
    #[serde(default)]
    pub http_method: HttpMethod,
    /// User or team names notified through their own webhooks
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub receivers: Vec<String>,
}

impl Webhook {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            ..Default::default()
        }
    }

    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        self.secret_key = Some(secret.into());
        self
    }

    pub fn with_json(mut self, json: impl Into<String>) -> Self {
        self.json = Some(json.into());
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.get_or_insert_with(BTreeMap::new).insert(name.into(), value.into());
        self
    }

    pub fn with_method(mut self, method: HttpMethod) -> Self {
        self.http_method = method;
        self
    }

    pub fn with_receivers(mut self, receivers: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.receivers = receivers.into_iter().map(Into::into).collect();
        self
    }

    /// Read the webhook settings out of a destination's `config`.
    pub fn from_destination(destination: &SubscriptionDestination) -> Result<Self, Error> {
        let config = destination.config.clone().ok_or_else(|| Error::Configuration {
            message: format!("webhook destination {} has no config", destination.id),
        })?;

        serde_json::from_value(config).map_err(|e| Error::Configuration {
            message: format!("webhook destination {} has invalid config: {e}", destination.id),
        })
    }

    /// The secret key, if one is set and non-empty.
    pub fn secret(&self) -> Option<&str> {
        self.secret_key.as_deref().filter(|s| !s.is_empty())
    }

    /// The fixed payload, if one is set and non-empty.
    pub fn fixed_payload(&self) -> Option<&str> {
        self.json.as_deref().filter(|s| !s.is_empty())
    }

    pub fn has_endpoint(&self) -> bool {
        !self.endpoint.trim().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_webhook_from_camel_case_config() {
        let mut destination = SubscriptionDestination::webhook(&Webhook::default());
        destination.config = Some(json!({
            "endpoint": "https://example.test/hook",
            "secretKey": "s3cr3t",
            "httpMethod": "PUT",
            "headers": {"X-Env": "prod"}
        }));

        let webhook = Webhook::from_destination(&destination).unwrap();
        assert_eq!(webhook.endpoint, "https://example.test/hook");
        assert_eq!(webhook.secret(), Some("s3cr3t"));
        assert_eq!(webhook.http_method, HttpMethod::Put);
        assert_eq!(webhook.headers.unwrap()["X-Env"], "prod");
    }

    #[test]
    fn test_endpoint_is_required() {
        let mut destination = SubscriptionDestination::webhook(&Webhook::default());
        destination.config = Some(json!({"secretKey": "s3cr3t"}));
        assert!(matches!(
            Webhook::from_destination(&destination),
            Err(Error::Configuration { .. })
        ));

        destination.config = None;
        assert!(Webhook::from_destination(&destination).is_err());
    }

    #[test]
    fn test_empty_optionals_are_treated_as_unset() {
        let webhook = Webhook::new("  ").with_secret("").with_json("");
        assert!(!webhook.has_endpoint());
        assert!(webhook.secret().is_none());
        assert!(webhook.fixed_payload().is_none());
    }
}
