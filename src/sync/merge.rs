use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use super::normalize::Normalizer;
use crate::model::ticket::{StatusCounts, Ticket, TicketSource, FILTER_ALL};

/// One reconciled ticket list and its status summary.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Reconciliation {
    pub tickets: Vec<Ticket>,
    pub counts: StatusCounts,
}

impl Reconciliation {
    pub fn from_tickets(tickets: Vec<Ticket>) -> Self {
        let counts = StatusCounts::tally(&tickets);
        Self { tickets, counts }
    }

    pub fn is_empty(&self) -> bool {
        self.tickets.is_empty()
    }

    pub fn apply_status_filter(&self, token: &str) -> Vec<&Ticket> {
        filter_by_status(&self.tickets, token)
    }
}

/// Tickets whose status equals `token` ignoring case, or all of them for
/// the `all` sentinel.
pub fn filter_by_status<'a>(tickets: &'a [Ticket], token: &str) -> Vec<&'a Ticket> {
    let token = token.trim();
    if token.eq_ignore_ascii_case(FILTER_ALL) {
        return tickets.iter().collect();
    }
    tickets.iter().filter(|t| t.has_status(token)).collect()
}

/// Normalizes both sources and merges them newest first.
///
/// API records come first and win any `ticketNumber` collision; a cached
/// record is kept only when its number is not already taken. Within a
/// single source the first occurrence of a number is kept. The final sort
/// is stable, so tickets with equal `created_at` keep input order.
pub fn reconcile(
    normalizer: &Normalizer,
    api: &[Value],
    local: &[Value],
    now: DateTime<Utc>,
) -> Reconciliation {
    let api_tickets = normalize_all(normalizer, api, TicketSource::Api, now);
    let local_tickets = normalize_all(normalizer, local, TicketSource::Local, now);

    let mut seen: HashSet<String> = HashSet::with_capacity(api_tickets.len());
    let mut merged = Vec::with_capacity(api_tickets.len() + local_tickets.len());

    for ticket in api_tickets {
        if seen.insert(ticket.ticket_number.clone()) {
            merged.push(ticket);
        }
    }
    let from_api = merged.len();

    for ticket in local_tickets {
        if seen.insert(ticket.ticket_number.clone()) {
            merged.push(ticket);
        }
    }
    debug!(
        api = from_api,
        local = merged.len() - from_api,
        "merged ticket sources"
    );

    merged.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Reconciliation::from_tickets(merged)
}

fn normalize_all(
    normalizer: &Normalizer,
    records: &[Value],
    source: TicketSource,
    now: DateTime<Utc>,
) -> Vec<Ticket> {
    records
        .iter()
        .filter(|raw| {
            let keep = raw.is_object();
            if !keep {
                debug!(%source, "skipping non-object ticket record");
            }
            keep
        })
        .map(|raw| normalizer.normalize(raw, source, now))
        .collect()
}
