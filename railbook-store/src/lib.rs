pub mod app_config;
pub mod bookings;
pub mod inventory;
pub mod payments;
pub mod tickets;

pub use bookings::BookingStore;
pub use inventory::{InventoryStore, LockedSlot};
pub use payments::PaymentStore;
pub use tickets::TicketStore;
