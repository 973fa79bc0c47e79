use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Created,
    Paid,
    Failed,
}

/// One external payment attempt for a booking. `provider_payment_id` is the
/// idempotency key: unique, stable for the life of the attempt, and the
/// lookup handle for inbound provider notifications.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub booking_id: Uuid,
    pub amount: i64,
    pub status: PaymentStatus,
    pub provider: String,
    pub provider_payment_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PaymentRecord {
    pub fn new(booking_id: Uuid, amount: i64, provider: &str, provider_payment_id: &str) -> Self {
        let now = Utc::now();
        Self {
            booking_id,
            amount,
            status: PaymentStatus::Created,
            provider: provider.to_string(),
            provider_payment_id: provider_payment_id.to_string(),
            created_at: now,
            updated_at: now,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LineItem {
    pub id: String,
    pub price: i64,
    pub qty: u32,
    pub name: String,
}

/// Client-facing checkout handle returned by the provider.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutSession {
    pub token: String,
    pub redirect_url: String,
}

#[derive(Debug, Serialize)]
pub struct PaymentIntentResponse {
    pub booking_id: Uuid,
    pub order_id: String,
    pub token: String,
    pub redirect_url: String,
}

/// External payment provider (Snap-style hosted checkout).
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    /// Register a transaction with the provider and obtain a client token
    /// plus redirect URL.
    async fn create_transaction(
        &self,
        order_id: &str,
        gross_amount: i64,
        items: &[LineItem],
    ) -> Result<CheckoutSession, Box<dyn std::error::Error + Send + Sync>>;
}
