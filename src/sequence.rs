//! Request sequencing.
//!
//! Requests are not cancelled when a newer one supersedes them. Instead every request takes a
//! ticket, and a response is only applied if its ticket is still the latest one issued.

use std::sync::atomic::{AtomicU64, Ordering};

/// Identifies one issued request.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct Ticket(u64);

/// Monotonic source of [Ticket]s for one logical query.
#[derive(Debug, Default)]
pub struct RequestSequence {
    latest: AtomicU64,
}

impl RequestSequence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a ticket, superseding every ticket issued before.
    pub fn issue(&self) -> Ticket {
        Ticket(self.latest.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// Is this the latest ticket?
    pub fn is_current(&self, ticket: Ticket) -> bool {
        self.latest.load(Ordering::SeqCst) == ticket.0
    }

    /// Returns the response if its ticket is still current, `None` if it is stale.
    pub fn accept<T>(&self, ticket: Ticket, response: T) -> Option<T> {
        if self.is_current(ticket) {
            Some(response)
        } else {
            tracing::debug!(ticket = ticket.0, "discarding stale response");
            None
        }
    }
}
