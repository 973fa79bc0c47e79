use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use railbook_domain::booking::{
    Actor, Booking, BookingResponse, BookingStatus, CreateBookingRequest, Passenger, ReservedSeat,
};
use railbook_domain::error::BookingError;
use railbook_domain::inventory::{SeatId, SlotStatus};
use railbook_domain::ticket::{Ticket, TicketArtifacts};
use railbook_store::{BookingStore, InventoryStore, TicketStore};

use crate::reservation::ReservationManager;

/// Drives the booking state machine:
/// pending -> paid (finalize), pending -> cancelled (cancel),
/// pending -> expired (sweeper). Terminal states accept no transition and
/// repeat calls are idempotent no-ops.
pub struct BookingOrchestrator {
    inventory: Arc<InventoryStore>,
    reservations: Arc<ReservationManager>,
    bookings: Arc<BookingStore>,
    tickets: Arc<TicketStore>,
    artifacts: Arc<dyn TicketArtifacts>,
}

impl BookingOrchestrator {
    pub fn new(
        inventory: Arc<InventoryStore>,
        reservations: Arc<ReservationManager>,
        bookings: Arc<BookingStore>,
        tickets: Arc<TicketStore>,
        artifacts: Arc<dyn TicketArtifacts>,
    ) -> Self {
        Self {
            inventory,
            reservations,
            bookings,
            tickets,
            artifacts,
        }
    }

    /// Create a pending booking and claim its seats as one atomic unit.
    /// The slot locks are held until the booking row is in place, so no
    /// competing claim can observe the seats mid-flight, and a failed claim
    /// leaves no orphan booking behind.
    pub async fn create_booking(
        &self,
        req: CreateBookingRequest,
        actor: Actor,
    ) -> Result<BookingResponse, BookingError> {
        if req.seat_ids.is_empty() || req.seat_ids.len() != req.passengers.len() {
            return Err(BookingError::validation(
                "seat and passenger counts must match and be non-zero",
            ));
        }

        let booking_id = Uuid::new_v4();
        let user_id = match actor {
            Actor::User(uid) => Some(uid),
            _ => None,
        };

        // 1. Lock and reserve every requested seat (all-or-nothing)
        let locked = self
            .reservations
            .claim(req.schedule_id, &req.seat_ids, booking_id)
            .await?;

        // 2. Persist booking + passengers while the row locks are still held
        let now = Utc::now();
        let passengers = req
            .seat_ids
            .iter()
            .zip(&req.passengers)
            .map(|(&seat_id, details)| Passenger {
                id: Uuid::new_v4(),
                booking_id,
                name: details.name.clone(),
                identity_number: details.identity_number.clone(),
                seat_id,
                ticket_no: None,
                created_at: now,
            })
            .collect();

        self.bookings
            .insert(Booking {
                id: booking_id,
                user_id,
                schedule_id: req.schedule_id,
                status: BookingStatus::Pending,
                total_price: req.total_price,
                passengers,
                created_at: now,
                updated_at: now,
            })
            .await;

        let reserved_seats: Vec<ReservedSeat> = locked
            .iter()
            .filter_map(|s| {
                s.slot().hold_expires_at.map(|t| ReservedSeat {
                    seat_id: s.seat_id(),
                    hold_expires_at: t,
                })
            })
            .collect();
        drop(locked);

        info!(%booking_id, schedule_id = req.schedule_id, seats = req.seat_ids.len(), "booking created");

        Ok(BookingResponse {
            booking_id,
            status: BookingStatus::Pending,
            reserved_seats,
        })
    }

    /// Release the booking's seats and mark it cancelled. Only the owning
    /// user may cancel, unless the call comes from an internal process.
    /// Idempotent when the booking is already cancelled or expired.
    pub async fn cancel(&self, booking_id: Uuid, requested_by: Actor) -> Result<(), BookingError> {
        let booking = self
            .bookings
            .get(booking_id)
            .await
            .ok_or_else(|| BookingError::NotFound(format!("booking {}", booking_id)))?;

        if !requested_by.may_access(&booking) {
            return Err(BookingError::Unauthorized(
                "booking belongs to another user".into(),
            ));
        }

        // Claim the pending -> cancelled transition before touching any
        // slot; if finalize or the sweeper got there first, the seats are
        // theirs and nothing may be released.
        if !self
            .bookings
            .finish_pending(booking_id, BookingStatus::Cancelled)
            .await
        {
            return match booking_status(&self.bookings, booking_id).await? {
                BookingStatus::Cancelled | BookingStatus::Expired => Ok(()),
                _ => Err(BookingError::validation("booking is already paid")),
            };
        }

        let released = self.reservations.release_for_booking(booking_id).await;
        info!(%booking_id, released, "booking cancelled");
        Ok(())
    }

    /// Transition a pending booking to paid and issue one ticket per
    /// passenger. Invoked only by the payment reconciler. Idempotent: a
    /// booking that is already paid returns success without side effects.
    /// The commit happens under the booking's own slot locks, after checking
    /// that every seat is still reserved for it; a hold the sweeper already
    /// reclaimed fails the whole call and mutates nothing.
    pub async fn finalize(&self, booking_id: Uuid) -> Result<(), BookingError> {
        let booking = self
            .bookings
            .get(booking_id)
            .await
            .ok_or_else(|| BookingError::NotFound(format!("booking {}", booking_id)))?;

        match booking.status {
            BookingStatus::Paid => return Ok(()),
            BookingStatus::Cancelled | BookingStatus::Expired => {
                warn!(%booking_id, status = %booking.status, "payment settled for a dead booking");
                return Err(BookingError::Internal(format!(
                    "booking {} is {} and cannot be finalized",
                    booking_id, booking.status
                )));
            }
            BookingStatus::Pending => {}
        }

        // 1. Lock the booking's seats, then re-check status: a concurrent
        //    cancel or sweep may have landed between the read and the locks
        let seat_ids: Vec<SeatId> = booking.passengers.iter().map(|p| p.seat_id).collect();
        let mut locked = self
            .inventory
            .lock_and_fetch(booking.schedule_id, &seat_ids)
            .await;

        match booking_status(&self.bookings, booking_id).await? {
            BookingStatus::Paid => return Ok(()),
            BookingStatus::Cancelled | BookingStatus::Expired => {
                return Err(BookingError::Internal(format!(
                    "booking {} went terminal before finalize could commit",
                    booking_id
                )));
            }
            BookingStatus::Pending => {}
        }

        // 2. Every seat must still be reserved for this booking
        for s in &locked {
            let slot = s.slot();
            if slot.status != SlotStatus::Reserved || slot.held_by != Some(booking_id) {
                warn!(
                    %booking_id,
                    seat_id = s.seat_id(),
                    status = ?slot.status,
                    "hold no longer intact, refusing to finalize"
                );
                return Err(BookingError::Internal(format!(
                    "booking {} lost its hold on seat {}",
                    booking_id,
                    s.seat_id()
                )));
            }
        }

        // 3. Derive ticket numbers and fetch their artifacts before mutating
        let mut issued = Vec::with_capacity(booking.passengers.len());
        for (seq, passenger) in booking.passengers.iter().enumerate() {
            let ticket_no = format!("T-{}-{}", booking_id.simple(), seq + 1);
            let qr_ref = self
                .artifacts
                .generate(&ticket_no)
                .await
                .map_err(|e| BookingError::Internal(e.to_string()))?;
            issued.push((passenger.clone(), ticket_no, qr_ref));
        }

        // 4. Claim pending -> paid; losing the race to cancel means the
        //    seats belong to whoever won, so back out without touching them
        if !self
            .bookings
            .finish_pending(booking_id, BookingStatus::Paid)
            .await
        {
            return match booking_status(&self.bookings, booking_id).await? {
                BookingStatus::Paid => Ok(()),
                status => Err(BookingError::Internal(format!(
                    "booking {} is {} and cannot be finalized",
                    booking_id, status
                ))),
            };
        }

        // 5. Commit: book the slots, record tickets
        self.inventory.mark_booked(&mut locked);

        let now = Utc::now();
        let mut ticket_nos = Vec::with_capacity(issued.len());
        for (passenger, ticket_no, qr_ref) in issued {
            let fresh = self
                .tickets
                .insert(Ticket {
                    booking_id,
                    passenger_id: passenger.id,
                    seat_id: passenger.seat_id,
                    ticket_no: ticket_no.clone(),
                    qr_ref,
                    issued_at: now,
                })
                .await;
            if !fresh {
                warn!(%booking_id, ticket_no, "ticket number already issued, keeping the original");
            }
            ticket_nos.push(ticket_no);
        }
        self.bookings
            .set_passenger_tickets(booking_id, &ticket_nos)
            .await;
        drop(locked);

        info!(%booking_id, tickets = ticket_nos.len(), "booking finalized");
        Ok(())
    }

    pub async fn get_booking(
        &self,
        booking_id: Uuid,
        requested_by: Actor,
    ) -> Result<Booking, BookingError> {
        let booking = self
            .bookings
            .get(booking_id)
            .await
            .ok_or_else(|| BookingError::NotFound(format!("booking {}", booking_id)))?;
        if !requested_by.may_access(&booking) {
            return Err(BookingError::Unauthorized(
                "booking belongs to another user".into(),
            ));
        }
        Ok(booking)
    }

    pub async fn list_bookings_for_user(&self, user_id: Uuid) -> Vec<Booking> {
        self.bookings.list_for_user(user_id).await
    }
}

/// Re-read a booking's status after losing a compare-and-set race; the row
/// was present moments ago, so a miss is a genuine inconsistency.
async fn booking_status(
    bookings: &BookingStore,
    booking_id: Uuid,
) -> Result<BookingStatus, BookingError> {
    bookings
        .get(booking_id)
        .await
        .map(|b| b.status)
        .ok_or_else(|| BookingError::Internal(format!("booking {} disappeared", booking_id)))
}
