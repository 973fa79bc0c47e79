use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;
use tracing::{info, warn};
use uuid::Uuid;

use railbook_domain::booking::Actor;
use railbook_domain::error::BookingError;
use railbook_domain::payment::{
    LineItem, PaymentIntentResponse, PaymentProvider, PaymentRecord, PaymentStatus,
};
use railbook_store::PaymentStore;

use crate::notification::PaymentNotification;
use crate::orchestrator::BookingOrchestrator;

/// How a validated notification was handled. Every variant is acknowledged
/// successfully to the provider so it stops re-delivering.
#[derive(Debug, PartialEq, Eq)]
pub enum NotificationOutcome {
    /// Success-class status: payment recorded paid, booking finalized.
    Finalized,
    /// Failure/expiry-class status: payment failed, hold released.
    HoldReleased,
    /// The record was already paid; repeat delivery, nothing to do.
    AlreadyProcessed,
    /// Intermediate provider status with no actionable transition.
    Ignored,
}

/// Translates external payment outcomes into booking state changes,
/// exactly once per provider payment id despite at-least-once delivery.
pub struct PaymentReconciler {
    payments: Arc<PaymentStore>,
    orchestrator: Arc<BookingOrchestrator>,
    provider: Arc<dyn PaymentProvider>,
    provider_name: String,
    server_key: String,
}

impl PaymentReconciler {
    pub fn new(
        payments: Arc<PaymentStore>,
        orchestrator: Arc<BookingOrchestrator>,
        provider: Arc<dyn PaymentProvider>,
        provider_name: &str,
        server_key: &str,
    ) -> Self {
        Self {
            payments,
            orchestrator,
            provider,
            provider_name: provider_name.to_string(),
            server_key: server_key.to_string(),
        }
    }

    /// Create a payment record and request a client-facing checkout handle.
    /// The record is persisted before the provider call: if the provider
    /// fails, the stale `created` record is deliberately inert and a later
    /// intent simply uses a fresh order id.
    pub async fn create_payment_intent(
        &self,
        booking_id: Uuid,
        amount: i64,
        requested_by: Actor,
    ) -> Result<PaymentIntentResponse, BookingError> {
        let booking = self
            .orchestrator
            .get_booking(booking_id, requested_by)
            .await?;

        // Millisecond granularity keeps back-to-back retries from colliding
        let order_id = format!(
            "booking-{}-{}",
            booking.id.simple(),
            Utc::now().timestamp_millis()
        );
        let record = PaymentRecord::new(booking_id, amount, &self.provider_name, &order_id);
        if !self.payments.insert(record).await {
            return Err(BookingError::internal("payment order id collision"));
        }

        let items = vec![LineItem {
            id: format!("booking-{}", booking.id.simple()),
            price: amount,
            qty: 1,
            name: "Trip booking".to_string(),
        }];
        let session = self
            .provider
            .create_transaction(&order_id, amount, &items)
            .await
            .map_err(|e| BookingError::Internal(e.to_string()))?;

        info!(%booking_id, %order_id, "payment intent created");
        Ok(PaymentIntentResponse {
            booking_id,
            order_id,
            token: session.token,
            redirect_url: session.redirect_url,
        })
    }

    /// Process one provider notification. Signature or payload failures are
    /// errors (the provider will retry); every handled outcome, including
    /// no-ops, is a success acknowledgement.
    pub async fn handle_notification(
        &self,
        payload: &Value,
    ) -> Result<NotificationOutcome, BookingError> {
        let notification = PaymentNotification::from_payload(payload)?;

        if !notification.verify_signature(&self.server_key) {
            warn!(order_id = %notification.order_id, "notification signature mismatch");
            return Err(BookingError::InvalidSignature);
        }

        let record = self
            .payments
            .find_by_provider_id(&notification.order_id)
            .await
            .ok_or_else(|| BookingError::NotFound(format!("payment {}", notification.order_id)))?;

        // Idempotency under repeated delivery
        if record.status == PaymentStatus::Paid {
            return Ok(NotificationOutcome::AlreadyProcessed);
        }

        match notification.transaction_status.as_str() {
            "settlement" | "capture" => {
                self.payments
                    .set_status(&notification.order_id, PaymentStatus::Paid)
                    .await;
                self.orchestrator.finalize(record.booking_id).await?;
                info!(order_id = %notification.order_id, booking_id = %record.booking_id, "payment settled");
                Ok(NotificationOutcome::Finalized)
            }
            "expire" | "cancel" | "deny" | "failed" => {
                self.payments
                    .set_status(&notification.order_id, PaymentStatus::Failed)
                    .await;
                // Internal caller: releases the hold without an ownership check
                if let Err(e) = self
                    .orchestrator
                    .cancel(record.booking_id, Actor::System)
                    .await
                {
                    warn!(booking_id = %record.booking_id, error = %e, "release after failed payment did not apply");
                }
                info!(order_id = %notification.order_id, status = %notification.transaction_status, "payment failed, hold released");
                Ok(NotificationOutcome::HoldReleased)
            }
            other => {
                info!(order_id = %notification.order_id, status = other, "notification ignored");
                Ok(NotificationOutcome::Ignored)
            }
        }
    }
}
