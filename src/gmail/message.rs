//! Parse raw Gmail `format=full` message JSON into [`EmailRecord`]s.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::model::EmailRecord;

/// Width used when flattening HTML-only bodies to text.
const HTML_TEXT_WIDTH: usize = 80;

/// Parse a raw provider message into an [`EmailRecord`].
///
/// Returns `None` when the payload is too malformed to use (no id, or no
/// usable date); the fetch orchestrator drops such messages and continues.
pub fn parse_message(raw: &Value) -> Option<EmailRecord> {
    let id = raw.get("id")?.as_str()?.to_string();
    let thread_id = raw
        .get("threadId")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    let snippet = raw
        .get("snippet")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();

    let payload = raw.get("payload");

    let subject = header_value(payload, "Subject").unwrap_or_default();
    let from = header_value(payload, "From").unwrap_or_default();
    let to = header_value(payload, "To").unwrap_or_default();

    let date = internal_date(raw)
        .or_else(|| header_value(payload, "Date").and_then(|d| parse_date_header(&d)))?;

    let body = payload
        .and_then(extract_body)
        .unwrap_or_else(|| snippet.clone());

    Some(EmailRecord {
        id,
        thread_id,
        subject,
        from,
        to,
        date,
        snippet,
        body,
        unique_id: String::new(),
        assigned_index: None,
        enrichment: Default::default(),
    })
}

/// Epoch-millis `internalDate` (Gmail serializes it as a string).
fn internal_date(raw: &Value) -> Option<DateTime<Utc>> {
    let millis = match raw.get("internalDate")? {
        Value::String(s) => s.parse::<i64>().ok()?,
        Value::Number(n) => n.as_i64()?,
        _ => return None,
    };
    DateTime::from_timestamp_millis(millis)
}

fn parse_date_header(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(value)
        .ok()
        .map(|d| d.with_timezone(&Utc))
}

/// Case-insensitive header lookup in `payload.headers`.
fn header_value(payload: Option<&Value>, name: &str) -> Option<String> {
    payload?
        .get("headers")?
        .as_array()?
        .iter()
        .find(|h| {
            h.get("name")
                .and_then(Value::as_str)
                .is_some_and(|n| n.eq_ignore_ascii_case(name))
        })
        .and_then(|h| h.get("value"))
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// Extract a plain-text body from a message payload.
///
/// Prefers the first `text/plain` part anywhere in the part tree, then
/// falls back to flattened `text/html`.
fn extract_body(payload: &Value) -> Option<String> {
    if let Some(text) = find_part_data(payload, "text/plain") {
        return decode_body(&text);
    }
    if let Some(html) = find_part_data(payload, "text/html") {
        let decoded = decode_body(&html)?;
        return Some(html2text::from_read(decoded.as_bytes(), HTML_TEXT_WIDTH));
    }
    None
}

/// Depth-first search of the part tree for the first part of `mime_type`
/// that carries body data.
fn find_part_data(part: &Value, mime_type: &str) -> Option<String> {
    let part_type = part.get("mimeType").and_then(Value::as_str).unwrap_or("");
    if part_type.eq_ignore_ascii_case(mime_type) {
        if let Some(data) = part
            .get("body")
            .and_then(|b| b.get("data"))
            .and_then(Value::as_str)
        {
            return Some(data.to_string());
        }
    }
    part.get("parts")?
        .as_array()?
        .iter()
        .find_map(|p| find_part_data(p, mime_type))
}

/// Decode Gmail's URL-safe base64 (padding is inconsistent, so strip it).
fn decode_body(data: &str) -> Option<String> {
    let trimmed = data.trim_end_matches('=');
    let bytes = URL_SAFE_NO_PAD.decode(trimmed).ok()?;
    Some(String::from_utf8_lossy(&bytes).into_owned())
}
