//! Core email record type.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single fetched email, persisted as part of the `emails.json` snapshot.
///
/// Serialized field names are camelCase to match the on-disk state format
/// (`id`, `threadId`, `uniqueId`, `assignedIndex`, ...).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmailRecord {
    /// Provider-native message identifier (Gmail message id).
    pub id: String,

    /// Provider-native thread identifier.
    #[serde(default)]
    pub thread_id: String,

    /// Decoded subject line.
    #[serde(default)]
    pub subject: String,

    /// Sender, as given by the `From` header.
    #[serde(default)]
    pub from: String,

    /// Primary recipients, as given by the `To` header.
    #[serde(default)]
    pub to: String,

    /// Message date. Taken from the provider's internal timestamp, falling
    /// back to the `Date` header.
    pub date: DateTime<Utc>,

    /// Provider-supplied snippet of the body.
    #[serde(default)]
    pub snippet: String,

    /// Plain-text body (decoded from the provider payload).
    #[serde(default)]
    pub body: String,

    /// Stable reference identifier: the provider id verbatim, or a
    /// content-derived hash when no provider id exists.
    #[serde(default)]
    pub unique_id: String,

    /// Stable positive index assigned by the identity store.
    /// `None` only before the record has passed through index assignment.
    #[serde(default)]
    pub assigned_index: Option<u64>,

    /// AI-derived enrichment. Entirely optional: every consumer of this
    /// record must work when all enrichment fields are absent.
    #[serde(default)]
    pub enrichment: Enrichment,
}

/// Optional AI-derived fields, accumulated by `analyze`/`reply` passes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Enrichment {
    /// Category label (e.g. "Work", "Newsletter").
    pub classification: Option<String>,
    /// One-or-two sentence summary.
    pub summary: Option<String>,
    /// Drafted reply text.
    pub suggested_response: Option<String>,
    /// Overall sentiment ("positive", "neutral", "negative").
    pub sentiment: Option<String>,
    /// When the enrichment pass ran.
    pub analyzed_at: Option<DateTime<Utc>>,
}

impl Enrichment {
    /// True when no enrichment pass has touched this record.
    pub fn is_empty(&self) -> bool {
        self.classification.is_none()
            && self.summary.is_none()
            && self.suggested_response.is_none()
            && self.sentiment.is_none()
    }
}

impl EmailRecord {
    /// Classification label, or the neutral default when unanalyzed.
    pub fn classification_or_default(&self) -> &str {
        self.enrichment
            .classification
            .as_deref()
            .unwrap_or("Unclassified")
    }

    /// Short display form of the unique ID (first 12 characters).
    pub fn short_unique_id(&self) -> &str {
        let end = self
            .unique_id
            .char_indices()
            .nth(12)
            .map(|(i, _)| i)
            .unwrap_or(self.unique_id.len());
        &self.unique_id[..end]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record() -> EmailRecord {
        EmailRecord {
            id: "m1".into(),
            thread_id: "t1".into(),
            subject: "Hello".into(),
            from: "a@example.com".into(),
            to: "b@example.com".into(),
            date: Utc.with_ymd_and_hms(2025, 1, 15, 12, 0, 0).unwrap(),
            snippet: "Hello there".into(),
            body: "Hello there, world".into(),
            unique_id: "m1".into(),
            assigned_index: Some(1),
            enrichment: Enrichment::default(),
        }
    }

    #[test]
    fn test_enrichment_defaults_are_neutral() {
        let r = record();
        assert!(r.enrichment.is_empty());
        assert_eq!(r.classification_or_default(), "Unclassified");
    }

    #[test]
    fn test_deserialize_without_enrichment() {
        // Records written before an analyze pass carry no enrichment object.
        let json = r#"{
            "id": "m9",
            "threadId": "t9",
            "subject": "s",
            "from": "x@example.com",
            "to": "y@example.com",
            "date": "2025-01-15T12:00:00Z",
            "snippet": "",
            "body": "",
            "uniqueId": "m9",
            "assignedIndex": 4
        }"#;
        let r: EmailRecord = serde_json::from_str(json).expect("parse");
        assert_eq!(r.assigned_index, Some(4));
        assert!(r.enrichment.is_empty());
    }

    #[test]
    fn test_short_unique_id_truncates() {
        let mut r = record();
        r.unique_id = "abcdef0123456789".into();
        assert_eq!(r.short_unique_id(), "abcdef012345");
        r.unique_id = "short".into();
        assert_eq!(r.short_unique_id(), "short");
    }
}
