//! Shapes the ticket service is known to wrap its records in.

use serde_json::Value;

use super::normalize::{ID_KEYS, TICKET_NUMBER_KEYS};
use crate::util::fields::first_present;

/// The ticket array inside a list payload: a bare array, or one under
/// `data`, `data.tickets` or `tickets`. Anything else holds no tickets.
pub fn ticket_records(payload: &Value) -> &[Value] {
    [
        Some(payload),
        payload.get("data"),
        payload.pointer("/data/tickets"),
        payload.get("tickets"),
    ]
    .into_iter()
    .flatten()
    .find_map(Value::as_array)
    .map(Vec::as_slice)
    .unwrap_or(&[])
}

/// The single ticket inside a detail payload: under `data.ticket`,
/// `ticket` or `data`, or the object itself. Only objects carrying an id
/// or ticket number count; status envelopes like `{"success": false}` do not.
pub fn single_record(payload: &Value) -> Option<&Value> {
    [
        payload.pointer("/data/ticket"),
        payload.get("ticket"),
        payload.get("data"),
        Some(payload),
    ]
    .into_iter()
    .flatten()
    .find(|value| is_ticket_record(value))
}

fn is_ticket_record(value: &Value) -> bool {
    value.is_object()
        && (first_present(value, ID_KEYS).is_some()
            || first_present(value, TICKET_NUMBER_KEYS).is_some())
}
