use std::collections::HashMap;

use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use railbook_domain::booking::{Booking, BookingStatus};

/// Booking table. Rows are inserted once and only ever updated through the
/// orchestrator or sweeper; terminal bookings stay around as history.
#[derive(Default)]
pub struct BookingStore {
    bookings: RwLock<HashMap<Uuid, Booking>>,
}

impl BookingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn insert(&self, booking: Booking) {
        self.bookings.write().await.insert(booking.id, booking);
    }

    pub async fn get(&self, id: Uuid) -> Option<Booking> {
        self.bookings.read().await.get(&id).cloned()
    }

    /// Compare-and-set out of `Pending`, under the table's write lock.
    /// Returns false when the booking is unknown or another writer already
    /// moved it to a terminal state. This is the only status mutation, so
    /// paid/cancelled/expired bookings can never change again no matter how
    /// finalize, cancel and the sweeper interleave.
    pub async fn finish_pending(&self, id: Uuid, to: BookingStatus) -> bool {
        let mut map = self.bookings.write().await;
        match map.get_mut(&id) {
            Some(b) if b.status == BookingStatus::Pending && to != BookingStatus::Pending => {
                b.status = to;
                b.updated_at = Utc::now();
                true
            }
            _ => false,
        }
    }

    /// Annotate passengers with their issued ticket numbers, in passenger
    /// order. Lengths must match; finalize derives one ticket per passenger.
    pub async fn set_passenger_tickets(&self, id: Uuid, ticket_nos: &[String]) -> bool {
        let mut map = self.bookings.write().await;
        match map.get_mut(&id) {
            Some(b) if b.passengers.len() == ticket_nos.len() => {
                for (p, no) in b.passengers.iter_mut().zip(ticket_nos) {
                    p.ticket_no = Some(no.clone());
                }
                b.updated_at = Utc::now();
                true
            }
            _ => false,
        }
    }

    /// Ids of every booking still pending, for the sweeper's second phase.
    pub async fn pending_ids(&self) -> Vec<Uuid> {
        self.bookings
            .read()
            .await
            .values()
            .filter(|b| b.status == BookingStatus::Pending)
            .map(|b| b.id)
            .collect()
    }

    pub async fn list_for_user(&self, user_id: Uuid) -> Vec<Booking> {
        let mut out: Vec<Booking> = self
            .bookings
            .read()
            .await
            .values()
            .filter(|b| b.user_id == Some(user_id))
            .cloned()
            .collect();
        out.sort_by_key(|b| b.created_at);
        out
    }
}
