use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::debug;
use uuid::Uuid;

use railbook_domain::inventory::{ScheduleId, SeatId, Slot, SlotStatus};

type SlotKey = (ScheduleId, SeatId);
type SlotCell = Arc<Mutex<Slot>>;

/// Exclusive row lock on one slot, held until dropped. The guard is the
/// transaction scope: a competing `lock_and_fetch` on the same slot blocks
/// until every guard from the earlier call is gone, then re-reads status.
#[derive(Debug)]
pub struct LockedSlot {
    guard: OwnedMutexGuard<Slot>,
}

impl LockedSlot {
    pub fn slot(&self) -> &Slot {
        &self.guard
    }

    pub fn seat_id(&self) -> SeatId {
        self.guard.seat_id
    }
}

/// In-memory inventory table: one mutex per (schedule, seat) row, mirroring
/// row-level `SELECT ... FOR UPDATE` semantics in a single process.
///
/// All multi-slot acquisitions go through [`sorted_cells`] so every caller
/// locks in the same global key order; that rules out lock-order deadlocks
/// between overlapping multi-seat claims.
#[derive(Default)]
pub struct InventoryStore {
    slots: Mutex<HashMap<SlotKey, SlotCell>>,
}

impl InventoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bulk-create available slots when a schedule is published. Existing
    /// rows are left untouched.
    pub async fn publish_schedule(&self, schedule_id: ScheduleId, seat_ids: &[SeatId]) {
        let mut map = self.slots.lock().await;
        for &seat_id in seat_ids {
            map.entry((schedule_id, seat_id))
                .or_insert_with(|| Arc::new(Mutex::new(Slot::available(schedule_id, seat_id))));
        }
        debug!(schedule_id, seats = seat_ids.len(), "schedule inventory published");
    }

    /// Take exclusive locks on exactly the requested rows, lazily creating
    /// missing rows as available. Guards come back in ascending seat order
    /// regardless of the order requested.
    pub async fn lock_and_fetch(
        &self,
        schedule_id: ScheduleId,
        seat_ids: &[SeatId],
    ) -> Vec<LockedSlot> {
        let mut keys: Vec<SlotKey> = seat_ids.iter().map(|&s| (schedule_id, s)).collect();
        keys.sort_unstable();

        let cells: Vec<SlotCell> = {
            let mut map = self.slots.lock().await;
            keys.iter()
                .map(|&(sched, seat)| {
                    map.entry((sched, seat))
                        .or_insert_with(|| Arc::new(Mutex::new(Slot::available(sched, seat))))
                        .clone()
                })
                .collect()
        };

        let mut locked = Vec::with_capacity(cells.len());
        for cell in cells {
            locked.push(LockedSlot {
                guard: cell.lock_owned().await,
            });
        }
        locked
    }

    /// Reserve every locked slot for `booking_id` with a hold that expires
    /// `hold` from now. Callers must have verified availability first.
    pub fn mark_reserved(&self, slots: &mut [LockedSlot], booking_id: Uuid, hold: Duration) {
        let now = Utc::now();
        let expires = now + hold;
        for s in slots.iter_mut() {
            s.guard.status = SlotStatus::Reserved;
            s.guard.held_by = Some(booking_id);
            s.guard.hold_expires_at = Some(expires);
            s.guard.updated_at = now;
        }
    }

    /// Reset every slot currently held by `booking_id` back to available,
    /// whether reserved or booked. Returns the number of slots released.
    pub async fn release(&self, booking_id: Uuid) -> usize {
        let mut guards = Vec::new();
        for cell in self.sorted_cells().await {
            let g = cell.lock_owned().await;
            if g.held_by == Some(booking_id) {
                guards.push(g);
            }
        }

        let now = Utc::now();
        let released = guards.len();
        for mut g in guards {
            g.status = SlotStatus::Available;
            g.held_by = None;
            g.hold_expires_at = None;
            g.updated_at = now;
        }
        released
    }

    /// Transition the locked slots to booked. `held_by` is kept for audit;
    /// the hold deadline no longer applies. Callers must have verified the
    /// slots are still reserved by their booking while holding the guards.
    pub fn mark_booked(&self, slots: &mut [LockedSlot]) {
        let now = Utc::now();
        for s in slots.iter_mut() {
            s.guard.status = SlotStatus::Booked;
            s.guard.hold_expires_at = None;
            s.guard.updated_at = now;
        }
    }

    /// Reclaim every reserved slot whose hold deadline has passed. Returns
    /// the number of slots reset. Slots are reset one at a time; booking
    /// expiry is re-derived afterwards from remaining counts, so a partial
    /// pass is safe to repeat.
    pub async fn reclaim_expired(&self, now: DateTime<Utc>) -> usize {
        let mut reclaimed = 0;
        for cell in self.sorted_cells().await {
            let mut g = cell.lock().await;
            let expired = g.status == SlotStatus::Reserved
                && g.hold_expires_at.map(|t| t < now).unwrap_or(false);
            if expired {
                g.status = SlotStatus::Available;
                g.held_by = None;
                g.hold_expires_at = None;
                g.updated_at = now;
                reclaimed += 1;
            }
        }
        reclaimed
    }

    /// Number of slots still reserved for a booking.
    pub async fn reserved_count(&self, booking_id: Uuid) -> usize {
        let mut count = 0;
        for cell in self.sorted_cells().await {
            let g = cell.lock().await;
            if g.held_by == Some(booking_id) && g.status == SlotStatus::Reserved {
                count += 1;
            }
        }
        count
    }

    /// Point read of a single slot.
    pub async fn get_slot(&self, schedule_id: ScheduleId, seat_id: SeatId) -> Option<Slot> {
        let cell = {
            let map = self.slots.lock().await;
            map.get(&(schedule_id, seat_id)).cloned()
        };
        match cell {
            Some(cell) => Some(cell.lock().await.clone()),
            None => None,
        }
    }

    /// All slot cells in global key order, the one order every multi-slot
    /// locker must use.
    async fn sorted_cells(&self) -> Vec<SlotCell> {
        let map = self.slots.lock().await;
        let mut entries: Vec<(SlotKey, SlotCell)> =
            map.iter().map(|(k, v)| (*k, v.clone())).collect();
        entries.sort_unstable_by_key(|(k, _)| *k);
        entries.into_iter().map(|(_, c)| c).collect()
    }
}
