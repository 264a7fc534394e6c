//! Calendar-event extraction from a single email.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::ai::enrich::extract_json_array;
use crate::ai::TextGenerator;
use crate::error::Result;
use crate::model::EmailRecord;

/// A calendar event extracted from an email body.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedEvent {
    pub title: String,
    /// Event date, `YYYY-MM-DD`.
    pub date: String,
    /// Start time, `HH:MM` 24h, when stated.
    #[serde(default)]
    pub time: Option<String>,
    #[serde(default)]
    pub duration_minutes: Option<u32>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Ask the model for events mentioned in `email`. Unusable responses yield
/// an empty list, never an error; event extraction is strictly additive.
pub async fn extract_events(
    generator: &dyn TextGenerator,
    email: &EmailRecord,
) -> Result<Vec<ExtractedEvent>> {
    let prompt = format!(
        "Extract any calendar events from the email below. Respond with a JSON \
         array only; each element has the keys: title, date (YYYY-MM-DD), \
         time (HH:MM, 24h, optional), durationMinutes (integer, optional), \
         location (optional), description (optional). \
         Respond with [] if there are no events.\n\n\
         Subject: {}\nFrom: {}\nDate: {}\n\n{}",
        email.subject,
        email.from,
        email.date.to_rfc3339(),
        email.body
    );

    let raw = generator.generate(&prompt).await?;
    let Some(value) = extract_json_array(&raw) else {
        warn!(id = %email.id, "Event extraction response had no recoverable JSON array");
        return Ok(Vec::new());
    };

    // Tolerate individually malformed entries rather than dropping the lot.
    let events = value
        .as_array()
        .map(|entries| {
            entries
                .iter()
                .filter_map(|e| serde_json::from_value(e.clone()).ok())
                .collect()
        })
        .unwrap_or_default();
    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn email() -> EmailRecord {
        EmailRecord {
            id: "m1".into(),
            thread_id: String::new(),
            subject: "Team offsite".into(),
            from: "organizer@example.com".into(),
            to: String::new(),
            date: Utc.with_ymd_and_hms(2025, 6, 1, 9, 0, 0).unwrap(),
            snippet: String::new(),
            body: "Offsite on June 12 at 10am in the Boston office.".into(),
            unique_id: "m1".into(),
            assigned_index: Some(1),
            enrichment: Default::default(),
        }
    }

    struct CannedGenerator(String);

    #[async_trait::async_trait]
    impl TextGenerator for CannedGenerator {
        async fn generate(&self, _prompt: &str) -> Result<String> {
            Ok(self.0.clone())
        }
    }

    #[tokio::test]
    async fn test_extract_events_parses_array() {
        let response = r#"```json
[{"title": "Team offsite", "date": "2025-06-12", "time": "10:00",
  "durationMinutes": 480, "location": "Boston office"}]
```"#;
        let events = extract_events(&CannedGenerator(response.into()), &email())
            .await
            .unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].title, "Team offsite");
        assert_eq!(events[0].date, "2025-06-12");
        assert_eq!(events[0].duration_minutes, Some(480));
    }

    #[tokio::test]
    async fn test_extract_events_empty_on_no_events() {
        let events = extract_events(&CannedGenerator("[]".into()), &email())
            .await
            .unwrap();
        assert!(events.is_empty());
    }

    #[tokio::test]
    async fn test_extract_events_skips_malformed_entries() {
        let response = r#"[{"title": "ok", "date": "2025-06-12"}, {"nonsense": true}]"#;
        let events = extract_events(&CannedGenerator(response.into()), &email())
            .await
            .unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].title, "ok");
    }

    #[tokio::test]
    async fn test_extract_events_empty_on_garbage() {
        let events = extract_events(&CannedGenerator("no events I'm afraid".into()), &email())
            .await
            .unwrap();
        assert!(events.is_empty());
    }
}
