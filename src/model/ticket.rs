use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

pub const STATUS_SUBMITTED: &str = "submitted";
pub const STATUS_PENDING: &str = "pending";
pub const STATUS_IN_PROGRESS: &str = "in_progress";
pub const STATUS_RESOLVED: &str = "resolved";
pub const STATUS_CLOSED: &str = "closed";
pub const STATUS_COMPLETED: &str = "completed";

/// Statuses the service is known to use. Others pass through as-is.
pub const KNOWN_STATUSES: &[&str] = &[
    STATUS_SUBMITTED,
    STATUS_PENDING,
    STATUS_IN_PROGRESS,
    STATUS_RESOLVED,
    STATUS_CLOSED,
    STATUS_COMPLETED,
];

pub const PRIORITY_MEDIUM: &str = "medium";

/// Sentinel accepted by the status filter to mean "every ticket".
pub const FILTER_ALL: &str = "all";

/// Which input sequence a ticket was normalized from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TicketSource {
    Api,
    Local,
}

impl TicketSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketSource::Api => "api",
            TicketSource::Local => "local",
        }
    }
}

impl fmt::Display for TicketSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub uri: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ticket {
    pub id: String,
    pub ticket_number: String,
    pub subject: String,
    pub description: String,
    pub status: String,
    pub priority: String,
    pub category: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    pub assigned_to: Option<Value>,
    pub last_response: Option<Value>,
    #[serde(default)]
    pub response_count: u64,
    pub source: TicketSource,
    #[serde(rename = "subscription_id", skip_serializing_if = "Option::is_none")]
    pub subscription_id: Option<Value>,
    #[serde(rename = "subscription_name", skip_serializing_if = "Option::is_none")]
    pub subscription_name: Option<Value>,
    pub formatted_date: String,
    pub formatted_time: String,
}

impl Ticket {
    pub fn has_status(&self, token: &str) -> bool {
        self.status == token.trim().to_lowercase()
    }

    /// True when `key` names this ticket by either its id or its ticket number.
    pub fn matches_key(&self, key: &str) -> bool {
        self.id == key || self.ticket_number == key
    }
}

/// Ticket counts for the four tracked lifecycle buckets. Other statuses
/// are not counted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub resolved: usize,
    pub closed: usize,
    pub in_progress: usize,
    pub submitted: usize,
}

impl StatusCounts {
    pub fn tally<'a>(tickets: impl IntoIterator<Item = &'a Ticket>) -> Self {
        let mut counts = Self::default();
        for ticket in tickets {
            match ticket.status.as_str() {
                STATUS_RESOLVED => counts.resolved += 1,
                STATUS_CLOSED => counts.closed += 1,
                STATUS_IN_PROGRESS => counts.in_progress += 1,
                STATUS_SUBMITTED => counts.submitted += 1,
                _ => {}
            }
        }
        counts
    }
}

impl fmt::Display for StatusCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "resolved {} · closed {} · in progress {} · submitted {}",
            self.resolved, self.closed, self.in_progress, self.submitted
        )
    }
}
