//! Configuration management.
//!
//! Configuration is loaded from a YAML file and can be overridden with
//! environment variables prefixed with `CHANGECAST_`. Nested values use
//! double underscores:
//!
//! ```bash
//! CHANGECAST_ENCRYPTION_KEY="base64-32-byte-key"
//! CHANGECAST_AUTH__PRINCIPAL=alerts-bot
//! CHANGECAST_DISPATCH__ACTION_FAILURE_POLICY=fail
//! ```
//!
//! Example `config.yaml`:
//!
//! ```yaml
//! log_format: json
//! auth:
//!   principal: admin
//!   jwt:
//!     secret: change-me
//!     expiry: 1h
//! dispatch:
//!   action_failure_policy: log
//!   receivers:
//!     users:
//!       alice: https://hooks.example.com/alice
//! subscriptions:
//!   - id: 1b4e28ba-2fa1-11d2-883f-0016d3cca427
//!     name: table-changes
//!     destinations:
//!       - id: 6fa459ea-ee8a-3ca4-894e-db77e160355e
//!         type: Webhook
//!         category: External
//!         config:
//!           endpoint: https://hooks.example.com/changes
//!           secretKey: s3cr3t
//! ```

use clap::Parser;
use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, time::Duration};
use url::Url;

use crate::crypto::AesGcmSecrets;
use crate::destination::{EventSubscription, SubscriptionType};
use crate::errors::Error;
use crate::webhooks::models::Webhook;

/// Simple CLI args - just for specifying config file
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to configuration file
    #[arg(short = 'f', long, env = "CHANGECAST_CONFIG", default_value = "config.yaml")]
    pub config: String,

    /// Validate configuration and exit without sending anything.
    #[arg(long)]
    pub validate: bool,
}

/// Root configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Console log format (default: pretty)
    pub log_format: LogFormat,
    /// Base64-encoded 32-byte key for `enc:` secrets. When unset, secrets are used as-is.
    pub encryption_key: Option<String>,
    pub auth: AuthConfig,
    pub dispatch: DispatchConfig,
    /// Subscriptions whose destinations are verified by the `changecast` binary
    pub subscriptions: Vec<EventSubscription>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Auth headers attached to every primary webhook request.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct AuthConfig {
    /// Principal the requests are made on behalf of (default: admin)
    pub principal: String,
    /// Mint a bearer JWT for the principal. No auth headers are sent when unset.
    pub jwt: Option<JwtConfig>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            principal: "admin".to_string(),
            jwt: None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct JwtConfig {
    /// HS256 signing secret
    pub secret: String,
    /// `iss` claim (default: changecast)
    pub issuer: String,
    /// Token lifetime (default: 1h)
    #[serde(with = "humantime_serde")]
    pub expiry: Duration,
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            secret: String::new(),
            issuer: "changecast".to_string(),
            expiry: Duration::from_secs(3600),
        }
    }
}

/// What to do when an action target fails after the primary send succeeded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionFailurePolicy {
    /// Log the failure and keep sending to the remaining targets
    #[default]
    Log,
    /// Stop and fail the whole call with the classified error
    Fail,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct DispatchConfig {
    pub action_failure_policy: ActionFailurePolicy,
    /// Per-user and per-team webhook endpoints used to resolve action targets
    pub receivers: ReceiversConfig,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReceiversConfig {
    pub users: BTreeMap<String, String>,
    pub teams: BTreeMap<String, String>,
}

impl Config {
    #[allow(clippy::result_large_err)]
    pub fn load(args: &Args) -> Result<Self, figment::Error> {
        let config: Self = Self::figment(args).extract()?;
        config.validate().map_err(|e| figment::Error::from(e.to_string()))?;
        Ok(config)
    }

    pub fn figment(args: &Args) -> Figment {
        Figment::new()
            .merge(Yaml::file(&args.config))
            // CHANGECAST_CONFIG names the file itself and is read by clap
            .merge(Env::prefixed("CHANGECAST_").ignore(&["config"]).split("__"))
    }

    /// Validate the configuration for consistency and required fields
    pub fn validate(&self) -> Result<(), Error> {
        if let Some(key) = &self.encryption_key {
            AesGcmSecrets::from_base64_key(key)?;
        }

        if self.auth.principal.trim().is_empty() {
            return Err(config_error("auth.principal must not be empty"));
        }

        if let Some(jwt) = &self.auth.jwt
            && jwt.secret.is_empty()
        {
            return Err(config_error("auth.jwt is configured but auth.jwt.secret is empty"));
        }

        for (name, url) in self.dispatch.receivers.users.iter().chain(&self.dispatch.receivers.teams) {
            Url::parse(url).map_err(|e| config_error(format!("receiver {name} has invalid endpoint {url}: {e}")))?;
        }

        for subscription in &self.subscriptions {
            for destination in &subscription.destinations {
                if destination.kind != SubscriptionType::Webhook {
                    continue;
                }
                let webhook = Webhook::from_destination(destination)?;
                if !webhook.endpoint.is_empty() {
                    Url::parse(&webhook.endpoint).map_err(|e| {
                        config_error(format!(
                            "destination {} of subscription {} has invalid endpoint {}: {e}",
                            destination.id, subscription.name, webhook.endpoint
                        ))
                    })?;
                }
            }
        }

        Ok(())
    }
}

fn config_error(message: impl Into<String>) -> Error {
    Error::Configuration {
        message: message.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    fn args(path: &str) -> Args {
        Args {
            config: path.to_string(),
            validate: false,
        }
    }

    #[test]
    fn test_defaults_without_file() {
        Jail::expect_with(|_jail| {
            let config = Config::load(&args("missing.yaml"))?;

            assert_eq!(config.log_format, LogFormat::Pretty);
            assert_eq!(config.auth.principal, "admin");
            assert!(config.auth.jwt.is_none());
            assert_eq!(config.dispatch.action_failure_policy, ActionFailurePolicy::Log);
            assert!(config.subscriptions.is_empty());
            Ok(())
        });
    }

    #[test]
    fn test_full_config_file() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "test.yaml",
                r#"
log_format: json
auth:
  principal: alerts-bot
  jwt:
    secret: hello
    expiry: 30m
dispatch:
  action_failure_policy: fail
  receivers:
    users:
      alice: https://hooks.example.com/alice
    teams:
      data: https://hooks.example.com/data
subscriptions:
  - id: 1b4e28ba-2fa1-11d2-883f-0016d3cca427
    name: table-changes
    destinations:
      - id: 6fa459ea-ee8a-3ca4-894e-db77e160355e
        type: Webhook
        category: External
        timeout: 5
        config:
          endpoint: https://hooks.example.com/changes
          secretKey: s3cr3t
          headers:
            X-Env: prod
"#,
            )?;

            let config = Config::load(&args("test.yaml"))?;

            assert_eq!(config.log_format, LogFormat::Json);
            assert_eq!(config.auth.principal, "alerts-bot");
            let jwt = config.auth.jwt.as_ref().expect("jwt configured");
            assert_eq!(jwt.expiry, Duration::from_secs(1800));
            assert_eq!(jwt.issuer, "changecast");
            assert_eq!(config.dispatch.action_failure_policy, ActionFailurePolicy::Fail);
            assert_eq!(config.dispatch.receivers.users["alice"], "https://hooks.example.com/alice");

            let destination = &config.subscriptions[0].destinations[0];
            assert_eq!(destination.timeout, 5);
            assert_eq!(destination.read_timeout, 12);
            let webhook = Webhook::from_destination(destination).unwrap();
            assert_eq!(webhook.secret_key.as_deref(), Some("s3cr3t"));
            Ok(())
        });
    }

    #[test]
    fn test_env_overrides() {
        Jail::expect_with(|jail| {
            jail.create_file("test.yaml", "auth:\n  principal: from-file\n")?;
            jail.set_env("CHANGECAST_AUTH__PRINCIPAL", "from-env");
            jail.set_env("CHANGECAST_DISPATCH__ACTION_FAILURE_POLICY", "fail");

            let config = Config::load(&args("test.yaml"))?;

            assert_eq!(config.auth.principal, "from-env");
            assert_eq!(config.dispatch.action_failure_policy, ActionFailurePolicy::Fail);
            Ok(())
        });
    }

    #[test]
    fn test_rejects_short_encryption_key() {
        Jail::expect_with(|jail| {
            jail.create_file("test.yaml", "encryption_key: c2hvcnQ=\n")?;

            let err = Config::load(&args("test.yaml")).unwrap_err();
            assert!(err.to_string().contains("32 bytes"));
            Ok(())
        });
    }

    #[test]
    fn test_rejects_invalid_webhook_endpoint() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "test.yaml",
                r#"
subscriptions:
  - id: 1b4e28ba-2fa1-11d2-883f-0016d3cca427
    name: broken
    destinations:
      - id: 6fa459ea-ee8a-3ca4-894e-db77e160355e
        type: Webhook
        category: External
        config:
          endpoint: not a url
"#,
            )?;

            let err = Config::load(&args("test.yaml")).unwrap_err();
            assert!(err.to_string().contains("invalid endpoint"));
            Ok(())
        });
    }

    #[test]
    fn test_rejects_unknown_fields() {
        Jail::expect_with(|jail| {
            jail.create_file("test.yaml", "retries: 3\n")?;
            assert!(Config::load(&args("test.yaml")).is_err());
            Ok(())
        });
    }

    #[test]
    fn test_rejects_empty_jwt_secret() {
        let mut config = Config::default();
        config.auth.jwt = Some(JwtConfig::default());
        assert!(matches!(config.validate(), Err(Error::Configuration { .. })));
    }
}
