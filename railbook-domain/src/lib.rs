pub mod booking;
pub mod error;
pub mod inventory;
pub mod payment;
pub mod ticket;

pub use booking::{Actor, Booking, BookingStatus, Passenger};
pub use error::BookingError;
pub use inventory::{Slot, SlotStatus};
pub use payment::{PaymentRecord, PaymentStatus};
pub use ticket::Ticket;
