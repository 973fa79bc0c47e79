use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type ScheduleId = u32;
pub type SeatId = u32;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SlotStatus {
    Available,
    Reserved,
    Booked,
}

/// One inventory row: a single seat on a single scheduled trip.
///
/// Invariant: `Reserved` or `Booked` implies `held_by` is set;
/// `Available` implies `held_by` and `hold_expires_at` are both cleared.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Slot {
    pub schedule_id: ScheduleId,
    pub seat_id: SeatId,
    pub status: SlotStatus,
    pub held_by: Option<Uuid>,
    pub hold_expires_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl Slot {
    pub fn available(schedule_id: ScheduleId, seat_id: SeatId) -> Self {
        Self {
            schedule_id,
            seat_id,
            status: SlotStatus::Available,
            held_by: None,
            hold_expires_at: None,
            updated_at: Utc::now(),
        }
    }

    pub fn is_available(&self) -> bool {
        self.status == SlotStatus::Available
    }
}
