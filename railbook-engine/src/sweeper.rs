use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::info;

use railbook_domain::booking::BookingStatus;
use railbook_store::{BookingStore, InventoryStore};

#[derive(Debug, Default, PartialEq, Eq)]
pub struct SweepStats {
    pub slots_reclaimed: usize,
    pub bookings_expired: usize,
}

/// Periodic reclaim of expired holds. Each tick runs one sweep in two
/// phases: reset every reserved slot whose deadline has passed, then expire
/// every pending booking with no reserved slots left. Booking expiry is
/// re-derived from slot counts, not tracked per booking, so a sweep that
/// dies mid-pass is repaired by the next one.
pub struct ExpirySweeper {
    inventory: Arc<InventoryStore>,
    bookings: Arc<BookingStore>,
    interval: Duration,
}

impl ExpirySweeper {
    pub fn new(
        inventory: Arc<InventoryStore>,
        bookings: Arc<BookingStore>,
        interval_seconds: u64,
    ) -> Self {
        Self {
            inventory,
            bookings,
            interval: Duration::from_secs(interval_seconds),
        }
    }

    /// Spawn the ticker task. Only one sweep is ever in flight; a sweep that
    /// overruns the interval delays the next tick. Cancel the token to stop,
    /// then await the handle: the in-flight sweep finishes first.
    pub fn spawn(self, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            info!(interval = ?self.interval, "expiry sweeper started");
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        info!("expiry sweeper stopped");
                        return;
                    }
                    _ = ticker.tick() => {
                        self.sweep_once().await;
                    }
                }
            }
        })
    }

    /// One full sweep pass. Public so tests and operational tooling can
    /// trigger it without the ticker.
    pub async fn sweep_once(&self) -> SweepStats {
        let mut stats = SweepStats::default();

        // Phase 1: reclaim expired holds
        stats.slots_reclaimed = self.inventory.reclaim_expired(Utc::now()).await;

        // Phase 2: expire pending bookings that hold nothing anymore
        for booking_id in self.bookings.pending_ids().await {
            if self.inventory.reserved_count(booking_id).await == 0 {
                if self
                    .bookings
                    .finish_pending(booking_id, BookingStatus::Expired)
                    .await
                {
                    stats.bookings_expired += 1;
                }
            }
        }

        if stats.slots_reclaimed > 0 || stats.bookings_expired > 0 {
            info!(
                reclaimed = stats.slots_reclaimed,
                expired = stats.bookings_expired,
                "sweep reclaimed expired holds"
            );
        }
        stats
    }
}
