use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::inventory::{ScheduleId, SeatId};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Pending,
    Paid,
    Cancelled,
    Expired,
}

impl std::fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Paid => "paid",
            BookingStatus::Cancelled => "cancelled",
            BookingStatus::Expired => "expired",
        };
        write!(f, "{}", s)
    }
}

/// Aggregate root for one purchase attempt. Never physically deleted;
/// terminal bookings are kept as history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Booking {
    pub id: Uuid,
    pub user_id: Option<Uuid>,
    pub schedule_id: ScheduleId,
    pub status: BookingStatus,
    pub total_price: i64,
    pub passengers: Vec<Passenger>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Passenger {
    pub id: Uuid,
    pub booking_id: Uuid,
    pub name: String,
    pub identity_number: String,
    pub seat_id: SeatId,
    pub ticket_no: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Who is asking. Internal processes (reconciler, sweeper) bypass the
/// ownership check; anonymous callers only pass it on ownerless bookings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Actor {
    User(Uuid),
    Anonymous,
    System,
}

impl Actor {
    pub fn may_access(&self, booking: &Booking) -> bool {
        match (self, booking.user_id) {
            (Actor::System, _) => true,
            (_, None) => true,
            (Actor::User(uid), Some(owner)) => *uid == owner,
            (Actor::Anonymous, Some(_)) => false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct PassengerDetails {
    pub name: String,
    pub identity_number: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateBookingRequest {
    pub schedule_id: ScheduleId,
    pub seat_ids: Vec<SeatId>,
    pub passengers: Vec<PassengerDetails>,
    pub total_price: i64,
}

#[derive(Debug, Serialize)]
pub struct ReservedSeat {
    pub seat_id: SeatId,
    pub hold_expires_at: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct BookingResponse {
    pub booking_id: Uuid,
    pub status: BookingStatus,
    pub reserved_seats: Vec<ReservedSeat>,
}
