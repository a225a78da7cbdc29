use std::fmt::Write as _;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, FixedOffset, Local, Utc};
use serde_json::Value;
use tracing::warn;

use crate::config::{DisplayConfig, DEFAULT_DATE_FORMAT, DEFAULT_TIME_FORMAT};
use crate::model::ticket::{
    Attachment, Ticket, TicketSource, PRIORITY_MEDIUM, STATUS_SUBMITTED,
};
use crate::util::fields::{
    as_text, first_count, first_present, first_text, first_timestamp,
};

pub const DEFAULT_SUBJECT: &str = "No Subject";
pub const DEFAULT_DESCRIPTION: &str = "No description provided";
pub const DEFAULT_CATEGORY: &str = "General";

// Key precedence per attribute. Earlier keys win.
pub const ID_KEYS: &[&str] = &["id"];
pub const TICKET_NUMBER_KEYS: &[&str] = &["ticket_number", "ticketNumber"];
pub const SUBJECT_KEYS: &[&str] = &["subject", "title"];
pub const DESCRIPTION_KEYS: &[&str] = &["description", "message"];
pub const STATUS_KEYS: &[&str] = &["status"];
pub const PRIORITY_KEYS: &[&str] = &["priority"];
pub const CATEGORY_KEYS: &[&str] = &["category", "type"];
pub const CREATED_AT_KEYS: &[&str] = &["created_at", "createdAt", "date_created"];
pub const UPDATED_AT_KEYS: &[&str] = &["updated_at", "updatedAt"];
pub const ATTACHMENT_KEYS: &[&str] = &["attachments", "images"];
pub const ATTACHMENT_URI_KEYS: &[&str] = &["uri", "url"];
pub const ASSIGNED_TO_KEYS: &[&str] = &["assigned_to", "assignedTo", "assigned_agent"];
pub const LAST_RESPONSE_KEYS: &[&str] = &["last_response", "lastResponse"];
pub const RESPONSE_COUNT_KEYS: &[&str] = &["response_count", "responseCount", "replies"];
pub const SUBSCRIPTION_ID_KEYS: &[&str] = &["subscription_id"];
pub const SUBSCRIPTION_NAME_KEYS: &[&str] = &["subscription_name"];

/// Supplies identifiers for records that arrive without one.
pub trait IdGenerator: Send + Sync {
    fn generate(&self, source: TicketSource, now: DateTime<Utc>) -> String;
}

/// `api-<millis>-<seq>` for remote records, `local-<millis>-<random>` for
/// cached ones.
#[derive(Debug, Default)]
pub struct RandomIdGenerator {
    seq: AtomicU64,
}

impl IdGenerator for RandomIdGenerator {
    fn generate(&self, source: TicketSource, now: DateTime<Utc>) -> String {
        let millis = now.timestamp_millis();
        match source {
            TicketSource::Api => {
                let seq = self.seq.fetch_add(1, Ordering::Relaxed);
                format!("api-{millis}-{seq}")
            }
            TicketSource::Local => {
                let suffix = uuid::Uuid::new_v4().simple().to_string();
                format!("local-{millis}-{}", &suffix[..9])
            }
        }
    }
}

/// Renders the short date and time strings shown next to each ticket.
#[derive(Debug, Clone)]
pub struct DisplayFormat {
    date: String,
    time: String,
    offset: FixedOffset,
}

impl DisplayFormat {
    pub fn new(date: &str, time: &str, offset: FixedOffset) -> Self {
        Self {
            date: date.to_string(),
            time: time.to_string(),
            offset,
        }
    }

    /// Formats from config, rendered in the machine's current UTC offset.
    pub fn from_config(display: &DisplayConfig) -> Self {
        Self::new(
            display.date_format.as_deref().unwrap_or(DEFAULT_DATE_FORMAT),
            display.time_format.as_deref().unwrap_or(DEFAULT_TIME_FORMAT),
            *Local::now().offset(),
        )
    }

    #[cfg(test)]
    pub fn utc() -> Self {
        Self::new(DEFAULT_DATE_FORMAT, DEFAULT_TIME_FORMAT, chrono::Offset::fix(&Utc))
    }

    pub fn render(&self, at: DateTime<Utc>) -> (String, String) {
        let local = at.with_timezone(&self.offset);
        (
            render_with(&local, &self.date, DEFAULT_DATE_FORMAT),
            render_with(&local, &self.time, DEFAULT_TIME_FORMAT),
        )
    }
}

fn render_with(at: &DateTime<FixedOffset>, fmt: &str, fallback: &str) -> String {
    let mut out = String::new();
    if write!(out, "{}", at.format(fmt)).is_ok() {
        return out;
    }
    warn!(fmt, "invalid display format, using default");
    at.format(fallback).to_string()
}

/// Turns one raw ticket record into a [`Ticket`].
#[derive(Clone)]
pub struct Normalizer {
    ids: Arc<dyn IdGenerator>,
    display: DisplayFormat,
}

impl Normalizer {
    pub fn new(ids: Arc<dyn IdGenerator>, display: DisplayFormat) -> Self {
        Self { ids, display }
    }

    pub fn generate_id(&self, source: TicketSource, now: DateTime<Utc>) -> String {
        self.ids.generate(source, now)
    }

    /// `now` stands in for a missing creation time, so every record in one
    /// run defaulted this way ties on `created_at`.
    pub fn normalize(&self, raw: &Value, source: TicketSource, now: DateTime<Utc>) -> Ticket {
        let id = first_text(raw, ID_KEYS).unwrap_or_else(|| self.ids.generate(source, now));
        let ticket_number = first_text(raw, TICKET_NUMBER_KEYS).unwrap_or_else(|| id.clone());

        let status = first_text(raw, STATUS_KEYS)
            .map(|s| s.to_lowercase())
            .unwrap_or_else(|| STATUS_SUBMITTED.to_string());
        let priority = first_text(raw, PRIORITY_KEYS)
            .map(|p| p.to_lowercase())
            .unwrap_or_else(|| PRIORITY_MEDIUM.to_string());

        let created_at = first_timestamp(raw, CREATED_AT_KEYS).unwrap_or(now);
        let updated_at = first_timestamp(raw, UPDATED_AT_KEYS).unwrap_or(created_at);
        let (formatted_date, formatted_time) = self.display.render(created_at);

        Ticket {
            id,
            ticket_number,
            subject: first_text(raw, SUBJECT_KEYS).unwrap_or_else(|| DEFAULT_SUBJECT.into()),
            description: first_text(raw, DESCRIPTION_KEYS)
                .unwrap_or_else(|| DEFAULT_DESCRIPTION.into()),
            status,
            priority,
            category: first_text(raw, CATEGORY_KEYS).unwrap_or_else(|| DEFAULT_CATEGORY.into()),
            created_at,
            updated_at,
            attachments: first_present(raw, ATTACHMENT_KEYS)
                .map(parse_attachments)
                .unwrap_or_default(),
            assigned_to: first_present(raw, ASSIGNED_TO_KEYS).cloned(),
            last_response: first_present(raw, LAST_RESPONSE_KEYS).cloned(),
            response_count: first_count(raw, RESPONSE_COUNT_KEYS).unwrap_or(0),
            source,
            subscription_id: first_present(raw, SUBSCRIPTION_ID_KEYS).cloned(),
            subscription_name: first_present(raw, SUBSCRIPTION_NAME_KEYS).cloned(),
            formatted_date,
            formatted_time,
        }
    }
}

fn parse_attachments(value: &Value) -> Vec<Attachment> {
    match value {
        Value::Array(items) => items.iter().filter_map(parse_attachment).collect(),
        other => parse_attachment(other).into_iter().collect(),
    }
}

fn parse_attachment(value: &Value) -> Option<Attachment> {
    let uri = match value {
        Value::String(_) => as_text(value),
        Value::Object(_) => first_text(value, ATTACHMENT_URI_KEYS),
        _ => None,
    }?;
    Some(Attachment { uri })
}
