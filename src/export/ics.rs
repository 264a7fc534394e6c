//! Render extracted calendar events as an iCalendar (RFC 5545) file.

use std::path::Path;

use chrono::{NaiveDate, NaiveDateTime, NaiveTime};

use crate::ai::events::ExtractedEvent;
use crate::error::{MailsenseError, Result};

/// Default event length when the model gave no duration.
const DEFAULT_DURATION_MINUTES: u32 = 60;

/// Write `events` to `output_path` as a VCALENDAR.
pub fn export_ics(events: &[ExtractedEvent], output_path: &Path) -> Result<()> {
    if let Some(parent) = output_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| MailsenseError::io(parent, e))?;
        }
    }
    let contents = render_ics(events)?;
    std::fs::write(output_path, contents).map_err(|e| MailsenseError::io(output_path, e))
}

/// Render the VCALENDAR text.
pub fn render_ics(events: &[ExtractedEvent]) -> Result<String> {
    let mut out = String::new();
    out.push_str("BEGIN:VCALENDAR\r\n");
    out.push_str("VERSION:2.0\r\n");
    out.push_str("PRODID:-//mailsense//EN\r\n");

    for (n, event) in events.iter().enumerate() {
        let start = event_start(event)?;
        let duration = event.duration_minutes.unwrap_or(DEFAULT_DURATION_MINUTES);
        let end = start + chrono::Duration::minutes(i64::from(duration));

        out.push_str("BEGIN:VEVENT\r\n");
        out.push_str(&format!("UID:mailsense-{n}-{}\r\n", start.format("%Y%m%dT%H%M%S")));
        out.push_str(&format!("DTSTART:{}\r\n", start.format("%Y%m%dT%H%M%S")));
        out.push_str(&format!("DTEND:{}\r\n", end.format("%Y%m%dT%H%M%S")));
        out.push_str(&format!("SUMMARY:{}\r\n", ics_escape(&event.title)));
        if let Some(location) = event.location.as_deref() {
            out.push_str(&format!("LOCATION:{}\r\n", ics_escape(location)));
        }
        if let Some(description) = event.description.as_deref() {
            out.push_str(&format!("DESCRIPTION:{}\r\n", ics_escape(description)));
        }
        out.push_str("END:VEVENT\r\n");
    }

    out.push_str("END:VCALENDAR\r\n");
    Ok(out)
}

fn event_start(event: &ExtractedEvent) -> Result<NaiveDateTime> {
    let date = NaiveDate::parse_from_str(&event.date, "%Y-%m-%d")
        .map_err(|e| MailsenseError::Export(format!("bad event date '{}': {e}", event.date)))?;
    let time = match event.time.as_deref() {
        Some(t) => NaiveTime::parse_from_str(t, "%H:%M")
            .map_err(|e| MailsenseError::Export(format!("bad event time '{t}': {e}")))?,
        None => NaiveTime::from_hms_opt(9, 0, 0).expect("valid default time"),
    };
    Ok(date.and_time(time))
}

/// Escape text per RFC 5545 (backslash, semicolon, comma, newline).
fn ics_escape(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace(';', "\\;")
        .replace(',', "\\,")
        .replace('\n', "\\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event() -> ExtractedEvent {
        ExtractedEvent {
            title: "Planning, part 1; kickoff".into(),
            date: "2025-06-12".into(),
            time: Some("10:30".into()),
            duration_minutes: Some(90),
            location: Some("Room 4".into()),
            description: None,
        }
    }

    #[test]
    fn test_render_ics_structure() {
        let ics = render_ics(&[event()]).unwrap();
        assert!(ics.starts_with("BEGIN:VCALENDAR\r\n"));
        assert!(ics.ends_with("END:VCALENDAR\r\n"));
        assert!(ics.contains("DTSTART:20250612T103000\r\n"));
        assert!(ics.contains("DTEND:20250612T120000\r\n"));
        assert!(ics.contains("LOCATION:Room 4\r\n"));
    }

    #[test]
    fn test_render_ics_escapes_text() {
        let ics = render_ics(&[event()]).unwrap();
        assert!(ics.contains("SUMMARY:Planning\\, part 1\\; kickoff\r\n"));
    }

    #[test]
    fn test_render_ics_defaults_time_and_duration() {
        let mut e = event();
        e.time = None;
        e.duration_minutes = None;
        let ics = render_ics(&[e]).unwrap();
        assert!(ics.contains("DTSTART:20250612T090000\r\n"));
        assert!(ics.contains("DTEND:20250612T100000\r\n"));
    }

    #[test]
    fn test_render_ics_rejects_bad_date() {
        let mut e = event();
        e.date = "June 12".into();
        assert!(render_ics(&[e]).is_err());
    }
}
