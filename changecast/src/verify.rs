//! Startup verification of configured destinations.
//!
//! Each enabled webhook destination of each enabled subscription receives the
//! test message once. Disabled entries and transports without a publisher are
//! counted as skipped.

use tracing::{info, warn};
use uuid::Uuid;

use crate::destination::{EventSubscription, SubscriptionType, create_destination};
use crate::errors::DeliveryError;
use crate::webhooks::PublisherServices;

/// A destination that could not be verified.
#[derive(Debug)]
pub struct VerificationFailure {
    pub subscription: String,
    pub destination_id: Uuid,
    pub error: String,
}

#[derive(Debug, Default)]
pub struct VerificationReport {
    pub delivered: usize,
    pub skipped: usize,
    pub failed: Vec<VerificationFailure>,
}

impl VerificationReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Send the test message to every enabled webhook destination.
pub async fn verify_destinations(subscriptions: &[EventSubscription], services: &PublisherServices) -> VerificationReport {
    let mut report = VerificationReport::default();

    for subscription in subscriptions {
        for destination in &subscription.destinations {
            if !subscription.enabled || !destination.enabled || destination.kind != SubscriptionType::Webhook {
                report.skipped += 1;
                continue;
            }

            let destination_id = destination.id;
            let result = match create_destination(subscription.clone(), destination.clone(), services.clone()) {
                Ok(publisher) => {
                    let result = publisher.send_test_message().await.map_err(|e: DeliveryError| e.to_string());
                    publisher.close();
                    result
                }
                Err(e) => Err(e.to_string()),
            };

            match result {
                Ok(()) => {
                    info!(subscription = %subscription.name, %destination_id, "Destination verified");
                    report.delivered += 1;
                }
                Err(error) => {
                    warn!(subscription = %subscription.name, %destination_id, error = %error, "Destination verification failed");
                    report.failed.push(VerificationFailure {
                        subscription: subscription.name.clone(),
                        destination_id,
                        error,
                    });
                }
            }
        }
    }

    report
}
