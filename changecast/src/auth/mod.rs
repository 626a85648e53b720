//! Auth headers for outbound webhook requests.
//!
//! Every request to a destination's primary endpoint carries the headers
//! returned by an [`AuthHeaderProvider`] for the configured principal.
//!
//! - [`session`]: HS256 bearer tokens minted per request

use std::sync::Arc;

use crate::config::AuthConfig;

pub mod session;

pub use session::JwtAuthHeaders;

/// Supplies auth headers for requests made on behalf of `principal`.
pub trait AuthHeaderProvider: Send + Sync {
    fn auth_headers(&self, principal: &str) -> anyhow::Result<Vec<(String, String)>>;
}

/// Sends no auth headers.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoAuthHeaders;

impl AuthHeaderProvider for NoAuthHeaders {
    fn auth_headers(&self, _principal: &str) -> anyhow::Result<Vec<(String, String)>> {
        Ok(Vec::new())
    }
}

/// Create the auth header provider described by configuration.
pub fn provider_from_config(config: &AuthConfig) -> Arc<dyn AuthHeaderProvider> {
    match &config.jwt {
        Some(jwt) => Arc::new(JwtAuthHeaders::new(jwt)),
        None => Arc::new(NoAuthHeaders),
    }
}
