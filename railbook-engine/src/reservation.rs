use std::collections::HashSet;
use std::sync::Arc;

use chrono::Duration;
use uuid::Uuid;

use railbook_domain::error::BookingError;
use railbook_domain::inventory::{ScheduleId, SeatId};
use railbook_store::{InventoryStore, LockedSlot};

/// Atomic claim/release of seat sets against the inventory store.
///
/// A claim is all-or-nothing: every requested slot is locked before any
/// status is read, and a single unavailable seat fails the whole call with
/// nothing mutated. The returned guards keep the rows locked, so the caller
/// can persist its booking before any competing claim re-reads them.
pub struct ReservationManager {
    inventory: Arc<InventoryStore>,
    hold: Duration,
}

impl ReservationManager {
    pub fn new(inventory: Arc<InventoryStore>, hold_seconds: u64) -> Self {
        Self {
            inventory,
            hold: Duration::seconds(hold_seconds as i64),
        }
    }

    pub async fn claim(
        &self,
        schedule_id: ScheduleId,
        seat_ids: &[SeatId],
        booking_id: Uuid,
    ) -> Result<Vec<LockedSlot>, BookingError> {
        if seat_ids.is_empty() {
            return Err(BookingError::validation("no seats requested"));
        }
        // Duplicate seat ids are a caller error, caught before locking.
        let mut seen = HashSet::with_capacity(seat_ids.len());
        for &seat_id in seat_ids {
            if !seen.insert(seat_id) {
                return Err(BookingError::Validation(format!(
                    "seat {} requested more than once",
                    seat_id
                )));
            }
        }

        let mut locked = self.inventory.lock_and_fetch(schedule_id, seat_ids).await;

        for slot in &locked {
            if !slot.slot().is_available() {
                return Err(BookingError::SeatUnavailable {
                    seat_id: slot.seat_id(),
                });
            }
        }

        self.inventory.mark_reserved(&mut locked, booking_id, self.hold);
        Ok(locked)
    }

    pub async fn release_for_booking(&self, booking_id: Uuid) -> usize {
        self.inventory.release(booking_id).await
    }
}
