//! Ticket reconciliation: fetch from the ticket service and the on-device
//! cache, normalize, merge, and summarize.

pub mod merge;
pub mod normalize;
pub mod payload;

use chrono::Utc;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::error::CacheError;
use crate::model::ticket::{Ticket, TicketSource, PRIORITY_MEDIUM, STATUS_SUBMITTED};
use crate::sources::{LocalCache, RemoteSource};
use merge::Reconciliation;
use normalize::Normalizer;

/// Outcome of a single-ticket refresh.
#[derive(Debug, Clone, PartialEq)]
pub enum TicketLookup {
    Found(Ticket),
    NotFound,
}

/// Fields collected by the local ticket-creation flow.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TicketDraft {
    pub subject: String,
    pub description: Option<String>,
    pub priority: Option<String>,
    pub category: Option<String>,
}

pub struct TicketSync {
    remote: Option<Box<dyn RemoteSource>>,
    cache: Box<dyn LocalCache>,
    normalizer: Normalizer,
}

impl TicketSync {
    pub fn new(
        remote: Option<Box<dyn RemoteSource>>,
        cache: Box<dyn LocalCache>,
        normalizer: Normalizer,
    ) -> Self {
        Self {
            remote,
            cache,
            normalizer,
        }
    }

    /// Reconciled ticket list for `user_id`.
    ///
    /// Never fails: an unreachable service or unreadable cache each count
    /// as zero records. Without a user nothing is fetched.
    pub async fn load(&self, user_id: Option<&str>) -> Reconciliation {
        let Some(user_id) = user_id else {
            debug!("no authenticated user, skipping ticket fetch");
            return Reconciliation::default();
        };

        // Fetch both sources concurrently; either may come back empty
        let now = Utc::now();
        let (remote, local) =
            futures::future::join(self.fetch_remote(), self.read_cache(user_id)).await;

        // Merge, API first
        let reconciliation = merge::reconcile(
            &self.normalizer,
            payload::ticket_records(&remote),
            &local,
            now,
        );
        info!(
            tickets = reconciliation.tickets.len(),
            resolved = reconciliation.counts.resolved,
            closed = reconciliation.counts.closed,
            in_progress = reconciliation.counts.in_progress,
            submitted = reconciliation.counts.submitted,
            "tickets reconciled"
        );
        reconciliation
    }

    /// Current state of one ticket. Any remote failure, including a miss,
    /// falls back once to the user's cached records, matched by id or
    /// ticket number.
    pub async fn refresh_ticket(&self, user_id: Option<&str>, id: &str) -> TicketLookup {
        let now = Utc::now();

        if let Some(remote) = &self.remote {
            match remote.fetch_ticket_by_id(id).await {
                Ok(payload) => match payload::single_record(&payload)
                    .map(|record| self.normalizer.normalize(record, TicketSource::Api, now))
                {
                    Some(ticket) if ticket.matches_key(id) => return TicketLookup::Found(ticket),
                    Some(ticket) => {
                        warn!(id, got = %ticket.id, "service returned a different ticket, trying cache")
                    }
                    None => warn!(id, "ticket payload held no record, trying cache"),
                },
                Err(e) if e.is_not_found() => debug!(id, "ticket not on service, trying cache"),
                Err(e) => warn!(id, error = %e, "ticket fetch failed, trying cache"),
            }
        }

        let Some(user_id) = user_id else {
            return TicketLookup::NotFound;
        };
        self.read_cache(user_id)
            .await
            .iter()
            .filter(|raw| raw.is_object())
            .map(|raw| self.normalizer.normalize(raw, TicketSource::Local, now))
            .find(|ticket| ticket.matches_key(id))
            .map_or(TicketLookup::NotFound, TicketLookup::Found)
    }

    /// Empties the user's cache. Failures are returned to the caller.
    pub async fn clear_cache(&self, user_id: &str) -> Result<(), CacheError> {
        self.cache.clear_all(user_id).await?;
        info!(user_id, "ticket cache cleared");
        Ok(())
    }

    /// Stores a new ticket in the user's cache and returns it normalized.
    pub async fn create_local_ticket(
        &self,
        user_id: &str,
        draft: TicketDraft,
    ) -> Result<Ticket, CacheError> {
        let now = Utc::now();
        let id = self.normalizer.generate_id(TicketSource::Local, now);
        let record = json!({
            "id": id,
            "ticketNumber": id,
            "subject": draft.subject,
            "description": draft.description,
            "status": STATUS_SUBMITTED,
            "priority": draft.priority.unwrap_or_else(|| PRIORITY_MEDIUM.into()),
            "category": draft.category,
            "created_at": now.to_rfc3339(),
        });
        let ticket = self
            .normalizer
            .normalize(&record, TicketSource::Local, now);
        self.cache.append(user_id, record).await?;
        info!(id = %ticket.id, "ticket cached locally");
        Ok(ticket)
    }

    async fn fetch_remote(&self) -> Value {
        let Some(remote) = &self.remote else {
            debug!("no ticket service configured");
            return Value::Null;
        };
        match remote.fetch_tickets().await {
            Ok(payload) => payload,
            Err(e) => {
                warn!(source = remote.name(), error = %e, "ticket fetch failed, using cache only");
                Value::Null
            }
        }
    }

    async fn read_cache(&self, user_id: &str) -> Vec<Value> {
        match self.cache.read_all(user_id).await {
            Ok(records) => records,
            Err(e) => {
                warn!(error = %e, "ticket cache unreadable, ignoring");
                Vec::new()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ticket::StatusCounts;
    use crate::sources::tests::{MockCache, MockRemote};
    use super::normalize::{DisplayFormat, RandomIdGenerator};
    use std::sync::Arc;

    fn sync_with(remote: Option<MockRemote>, cache: MockCache) -> TicketSync {
        TicketSync::new(
            remote.map(|r| Box::new(r) as Box<dyn RemoteSource>),
            Box::new(cache),
            Normalizer::new(Arc::new(RandomIdGenerator::default()), DisplayFormat::utc()),
        )
    }

    #[tokio::test]
    async fn merges_remote_and_cached_tickets() {
        let remote = MockRemote::with_tickets(json!({
            "data": [{"id": 1, "ticket_number": "A1", "status": "Resolved", "created_at": "2024-01-01"}]
        }));
        let cache = MockCache::with_records(
            "u1",
            vec![
                json!({"id": "L1", "ticketNumber": "A1", "status": "submitted"}),
                json!({"id": "L2", "ticketNumber": "A2", "status": "closed", "created_at": "2023-12-01"}),
            ],
        );
        let r = sync_with(Some(remote), cache).load(Some("u1")).await;

        assert_eq!(r.tickets.len(), 2);
        assert_eq!(r.tickets[0].ticket_number, "A1");
        assert_eq!(r.tickets[0].source, TicketSource::Api);
        assert_eq!(r.tickets[0].status, "resolved");
        assert_eq!(r.tickets[1].ticket_number, "A2");
        assert_eq!(
            r.counts,
            StatusCounts { resolved: 1, closed: 1, in_progress: 0, submitted: 0 }
        );
    }

    #[tokio::test]
    async fn offline_service_falls_back_to_cache() {
        let cache = MockCache::with_records(
            "u1",
            vec![
                json!({"id": "L1", "ticketNumber": "A1", "status": "submitted"}),
                json!({"id": "L2", "ticketNumber": "A2", "status": "closed"}),
            ],
        );
        let r = sync_with(Some(MockRemote::offline()), cache)
            .load(Some("u1"))
            .await;

        let numbers: Vec<_> = r.tickets.iter().map(|t| t.ticket_number.as_str()).collect();
        assert_eq!(numbers, vec!["A1", "A2"]);
        assert!(r.tickets.iter().all(|t| t.source == TicketSource::Local));
    }

    #[tokio::test]
    async fn unreadable_cache_still_shows_remote_tickets() {
        let remote = MockRemote::with_tickets(json!([{"id": 1}]));
        let cache = MockCache::default().with_read_failure();
        let r = sync_with(Some(remote), cache).load(Some("u1")).await;
        assert_eq!(r.tickets.len(), 1);
    }

    #[tokio::test]
    async fn both_sources_failing_gives_empty_state() {
        let cache = MockCache::default().with_read_failure();
        let r = sync_with(Some(MockRemote::offline()), cache)
            .load(Some("u1"))
            .await;
        assert!(r.is_empty());
        assert_eq!(r.counts, StatusCounts::default());
    }

    #[tokio::test]
    async fn malformed_payload_counts_as_no_remote_tickets() {
        let remote = MockRemote::with_tickets(json!({"result": "ok"}));
        let cache = MockCache::with_records("u1", vec![json!({"id": "L1"})]);
        let r = sync_with(Some(remote), cache).load(Some("u1")).await;
        assert_eq!(r.tickets.len(), 1);
        assert_eq!(r.tickets[0].source, TicketSource::Local);
    }

    #[tokio::test]
    async fn no_user_short_circuits_without_io() {
        let remote = MockRemote::with_tickets(json!([{"id": 1}]));
        let calls = remote.calls.clone();
        let cache = MockCache::with_records("u1", vec![json!({"id": 2})]);
        let reads = cache.reads.clone();

        let r = sync_with(Some(remote), cache).load(None).await;

        assert!(r.is_empty());
        assert_eq!(r.counts, StatusCounts::default());
        assert!(calls.lock().unwrap().is_empty());
        assert!(reads.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_service_config_uses_cache_alone() {
        let cache = MockCache::with_records("u1", vec![json!({"id": "L1", "status": "closed"})]);
        let r = sync_with(None, cache).load(Some("u1")).await;
        assert_eq!(r.counts.closed, 1);
    }

    #[tokio::test]
    async fn cache_is_read_for_the_requested_user_only() {
        let cache = MockCache::with_records("alice", vec![json!({"id": "A"})]);
        let r = sync_with(None, cache).load(Some("bob")).await;
        assert!(r.is_empty());
    }

    #[tokio::test]
    async fn refresh_prefers_the_service() {
        let remote = MockRemote::with_tickets(json!([]))
            .with_single("7", json!({"data": {"id": 7, "status": "In_Progress"}}));
        let cache = MockCache::with_records("u1", vec![json!({"id": "7", "status": "submitted"})]);

        let found = sync_with(Some(remote), cache)
            .refresh_ticket(Some("u1"), "7")
            .await;
        match found {
            TicketLookup::Found(t) => {
                assert_eq!(t.status, "in_progress");
                assert_eq!(t.source, TicketSource::Api);
            }
            TicketLookup::NotFound => panic!("expected ticket"),
        }
    }

    #[tokio::test]
    async fn refresh_ignores_empty_service_reply() {
        let remote = MockRemote::with_tickets(json!([])).with_single("7", json!({"data": null}));
        let cache = MockCache::with_records("u1", vec![json!({"id": "7", "subject": "cached"})]);

        let found = sync_with(Some(remote), cache)
            .refresh_ticket(Some("u1"), "7")
            .await;
        match found {
            TicketLookup::Found(t) => {
                assert_eq!(t.subject, "cached");
                assert_eq!(t.source, TicketSource::Local);
            }
            TicketLookup::NotFound => panic!("expected cached ticket"),
        }
    }

    #[tokio::test]
    async fn refresh_rejects_a_different_ticket_from_the_service() {
        let remote = MockRemote::with_tickets(json!([]))
            .with_single("7", json!({"ticket": {"id": 8, "subject": "someone else's"}}));

        let found = sync_with(Some(remote), MockCache::default())
            .refresh_ticket(Some("u1"), "7")
            .await;
        assert_eq!(found, TicketLookup::NotFound);
    }

    #[tokio::test]
    async fn refresh_without_ticket_in_message_reply_is_not_found() {
        let remote = MockRemote::with_tickets(json!([]))
            .with_single("7", json!({"success": false, "message": "not found"}));

        let found = sync_with(Some(remote), MockCache::default())
            .refresh_ticket(None, "7")
            .await;
        assert_eq!(found, TicketLookup::NotFound);
    }

    #[tokio::test]
    async fn out_of_range_timestamp_does_not_break_load() {
        let cache = MockCache::with_records(
            "u1",
            vec![
                json!({"id": "L1", "created_at": i64::MIN}),
                json!({"id": "L2", "created_at": i64::MAX, "status": "closed"}),
            ],
        );
        let r = sync_with(Some(MockRemote::offline()), cache)
            .load(Some("u1"))
            .await;
        assert_eq!(r.tickets.len(), 2);
        assert_eq!(r.counts.closed, 1);
    }

    #[tokio::test]
    async fn refresh_falls_back_to_cache_by_ticket_number() {
        let cache = MockCache::with_records(
            "u1",
            vec![json!({"id": "L1", "ticketNumber": "TKT-9", "status": "pending"})],
        );
        let found = sync_with(Some(MockRemote::offline()), cache)
            .refresh_ticket(Some("u1"), "TKT-9")
            .await;
        match found {
            TicketLookup::Found(t) => {
                assert_eq!(t.id, "L1");
                assert_eq!(t.source, TicketSource::Local);
            }
            TicketLookup::NotFound => panic!("expected cached ticket"),
        }
    }

    #[tokio::test]
    async fn refresh_miss_on_service_checks_cache_by_id() {
        let remote = MockRemote::with_tickets(json!([]));
        let calls = remote.calls.clone();
        let cache = MockCache::with_records("u1", vec![json!({"id": "L5"})]);

        let found = sync_with(Some(remote), cache)
            .refresh_ticket(Some("u1"), "L5")
            .await;

        assert!(matches!(found, TicketLookup::Found(ref t) if t.id == "L5"));
        assert_eq!(calls.lock().unwrap().as_slice(), &["get:L5"]);
    }

    #[tokio::test]
    async fn refresh_reports_not_found_without_error() {
        let cache = MockCache::with_records("u1", vec![json!({"id": "L1"})]);
        let found = sync_with(Some(MockRemote::offline()), cache)
            .refresh_ticket(Some("u1"), "nope")
            .await;
        assert_eq!(found, TicketLookup::NotFound);

        let found = sync_with(None, MockCache::default())
            .refresh_ticket(None, "nope")
            .await;
        assert_eq!(found, TicketLookup::NotFound);
    }

    #[tokio::test]
    async fn clear_empties_only_that_users_cache() {
        let cache = MockCache::with_records("u1", vec![json!({"id": 1})]);
        let sync = sync_with(None, cache);
        sync.create_local_ticket("u2", TicketDraft { subject: "Other".into(), ..Default::default() })
            .await
            .unwrap();

        sync.clear_cache("u1").await.unwrap();

        assert!(sync.load(Some("u1")).await.is_empty());
        assert_eq!(sync.load(Some("u2")).await.tickets.len(), 1);
    }

    #[tokio::test]
    async fn clear_failure_is_surfaced() {
        let cache = MockCache::with_records("u1", vec![json!({"id": 1})]).with_write_failure();
        let sync = sync_with(None, cache);
        let err = sync.clear_cache("u1").await.unwrap_err();
        assert!(err.to_string().contains("mock read-only"));
        assert_eq!(sync.load(Some("u1")).await.tickets.len(), 1);
    }

    #[tokio::test]
    async fn created_ticket_round_trips_through_cache() {
        let sync = sync_with(None, MockCache::default());
        let draft = TicketDraft {
            subject: "Router keeps rebooting".into(),
            description: Some("Every ten minutes".into()),
            priority: Some("High".into()),
            category: None,
        };
        let created = sync.create_local_ticket("u1", draft).await.unwrap();
        assert!(created.id.starts_with("local-"));
        assert_eq!(created.priority, "high");
        assert_eq!(created.category, normalize::DEFAULT_CATEGORY);
        assert_eq!(created.status, STATUS_SUBMITTED);

        let loaded = sync.load(Some("u1")).await;
        assert_eq!(loaded.tickets, vec![created]);
    }
}
