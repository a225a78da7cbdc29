use tracing::debug;

use crate::model::ticket::{StatusCounts, Ticket, TicketSource, FILTER_ALL};
use crate::sync::merge::Reconciliation;

/// Identifies one refresh so late results from superseded ones can be
/// dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshToken(u64);

/// What the ticket list shows: the last reconciliation and the active
/// status filter.
#[derive(Debug)]
pub struct TicketBoard {
    current: Reconciliation,
    filter: String,
    generation: u64,
    pub loading: bool,
}

impl Default for TicketBoard {
    fn default() -> Self {
        Self {
            current: Reconciliation::default(),
            filter: FILTER_ALL.to_string(),
            generation: 0,
            loading: false,
        }
    }
}

impl TicketBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn begin_refresh(&mut self) -> RefreshToken {
        self.generation += 1;
        self.loading = true;
        RefreshToken(self.generation)
    }

    /// Applies `result` unless a newer refresh has started since `token`
    /// was issued. Returns whether it was applied.
    pub fn finish_refresh(&mut self, token: RefreshToken, result: Reconciliation) -> bool {
        if token.0 != self.generation {
            debug!(stale = token.0, current = self.generation, "dropping stale ticket refresh");
            return false;
        }
        self.current = result;
        self.loading = false;
        true
    }

    pub fn tickets(&self) -> &[Ticket] {
        &self.current.tickets
    }

    pub fn counts(&self) -> StatusCounts {
        self.current.counts
    }

    pub fn filter(&self) -> &str {
        &self.filter
    }

    /// Switches the status filter and returns the tickets it selects. No
    /// refetch happens.
    pub fn apply_status_filter(&mut self, token: &str) -> Vec<&Ticket> {
        let token = token.trim();
        self.filter = if token.is_empty() {
            FILTER_ALL.to_string()
        } else {
            token.to_lowercase()
        };
        self.visible()
    }

    pub fn visible(&self) -> Vec<&Ticket> {
        self.current.apply_status_filter(&self.filter)
    }

    pub fn is_empty(&self) -> bool {
        self.current.is_empty()
    }

    /// Forgets cached tickets after the cache was cleared. Service tickets
    /// stay.
    pub fn drop_local(&mut self) -> usize {
        let before = self.current.tickets.len();
        let remaining: Vec<Ticket> = std::mem::take(&mut self.current.tickets)
            .into_iter()
            .filter(|t| t.source != TicketSource::Local)
            .collect();
        self.current = Reconciliation::from_tickets(remaining);
        before - self.current.tickets.len()
    }
}
