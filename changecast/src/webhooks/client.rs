//! HTTP client factory for webhook publishers.

use std::time::Duration;

use crate::errors::Error;

/// Build the client a publisher owns for its lifetime.
///
/// A zero timeout means no timeout. Redirects are not followed: a 3xx answer
/// from a webhook endpoint is a delivery failure, not something to chase.
pub fn build_client(timeout: Duration, read_timeout: Duration) -> Result<reqwest::Client, Error> {
    // reqwest is built without a default provider; a binary that installed one first keeps it
    let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();

    let mut builder = reqwest::Client::builder().redirect(reqwest::redirect::Policy::none());
    if !timeout.is_zero() {
        builder = builder.connect_timeout(timeout);
    }
    if !read_timeout.is_zero() {
        builder = builder.read_timeout(read_timeout);
    }

    builder.build().map_err(|e| Error::Configuration {
        message: format!("failed to create webhook HTTP client: {e}"),
    })
}
