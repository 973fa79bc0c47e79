pub mod notification;
pub mod orchestrator;
pub mod provider;
pub mod reconciler;
pub mod reservation;
pub mod sweeper;

pub use orchestrator::BookingOrchestrator;
pub use reconciler::{NotificationOutcome, PaymentReconciler};
pub use reservation::ReservationManager;
pub use sweeper::{ExpirySweeper, SweepStats};
