use std::collections::HashMap;

use chrono::Utc;
use tokio::sync::RwLock;

use railbook_domain::payment::{PaymentRecord, PaymentStatus};

/// Payment attempts keyed by provider payment id (the idempotency key).
#[derive(Default)]
pub struct PaymentStore {
    records: RwLock<HashMap<String, PaymentRecord>>,
}

impl PaymentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a new record. Returns false if the provider payment id is
    /// already taken; the key is unique for the life of one attempt.
    pub async fn insert(&self, record: PaymentRecord) -> bool {
        let mut map = self.records.write().await;
        if map.contains_key(&record.provider_payment_id) {
            return false;
        }
        map.insert(record.provider_payment_id.clone(), record);
        true
    }

    pub async fn find_by_provider_id(&self, provider_payment_id: &str) -> Option<PaymentRecord> {
        self.records.read().await.get(provider_payment_id).cloned()
    }

    /// Monotonic status move: created -> paid or created -> failed, never
    /// backward. Returns false when the record is unknown or the move would
    /// reverse a settled status.
    pub async fn set_status(&self, provider_payment_id: &str, status: PaymentStatus) -> bool {
        let mut map = self.records.write().await;
        match map.get_mut(provider_payment_id) {
            Some(r) if r.status == PaymentStatus::Created || r.status == status => {
                r.status = status;
                r.updated_at = Utc::now();
                true
            }
            _ => false,
        }
    }
}
