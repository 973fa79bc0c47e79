use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::inventory::SeatId;

/// Issued once per passenger when a booking is finalized. `ticket_no` is
/// derived from the booking id and passenger sequence, so re-running
/// finalize can never mint a second number for the same passenger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ticket {
    pub booking_id: Uuid,
    pub passenger_id: Uuid,
    pub seat_id: SeatId,
    pub ticket_no: String,
    pub qr_ref: String,
    pub issued_at: DateTime<Utc>,
}

/// External collaborator that renders and stores a scannable code image for
/// a ticket number. The engine only records the returned reference.
#[async_trait]
pub trait TicketArtifacts: Send + Sync {
    async fn generate(
        &self,
        ticket_no: &str,
    ) -> Result<String, Box<dyn std::error::Error + Send + Sync>>;
}
