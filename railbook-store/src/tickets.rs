use std::collections::HashMap;

use tokio::sync::RwLock;
use uuid::Uuid;

use railbook_domain::ticket::Ticket;

/// Issued tickets keyed by ticket number.
#[derive(Default)]
pub struct TicketStore {
    tickets: RwLock<HashMap<String, Ticket>>,
}

impl TicketStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a ticket; false if the number was already issued. Ticket
    /// numbers are deterministic, so a repeated finalize hits this guard
    /// instead of minting duplicates.
    pub async fn insert(&self, ticket: Ticket) -> bool {
        let mut map = self.tickets.write().await;
        if map.contains_key(&ticket.ticket_no) {
            return false;
        }
        map.insert(ticket.ticket_no.clone(), ticket);
        true
    }

    pub async fn for_booking(&self, booking_id: Uuid) -> Vec<Ticket> {
        let mut out: Vec<Ticket> = self
            .tickets
            .read()
            .await
            .values()
            .filter(|t| t.booking_id == booking_id)
            .cloned()
            .collect();
        out.sort_by(|a, b| a.ticket_no.cmp(&b.ticket_no));
        out
    }
}
