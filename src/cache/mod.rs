//! Persisted email snapshot and fetch watermark.
//!
//! The cache is a point-in-time, full-replace snapshot: every fetch cycle
//! computes the complete merged set and overwrites `emails.json` wholesale.
//! A fetch that fails partway never calls `save`, so the previous snapshot
//! stays authoritative.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::{MailsenseError, Result};
use crate::model::EmailRecord;

/// File name of the email snapshot inside the state directory.
pub const CACHE_FILE: &str = "emails.json";

/// File name of the watermark metadata inside the state directory.
pub const METADATA_FILE: &str = "cache_metadata.json";

/// The newest email seen by the last successful fetch, used to scope the
/// next provider query to strictly newer messages.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FetchWatermark {
    pub last_fetched_id: Option<String>,
    pub last_fetched_timestamp: Option<DateTime<Utc>>,
}

/// Snapshot store for fetched, enriched emails.
pub struct EmailCache {
    cache_path: PathBuf,
    metadata_path: PathBuf,
}

impl EmailCache {
    /// Create a cache backed by `emails.json` and `cache_metadata.json`
    /// in `state_dir`.
    pub fn new(state_dir: &Path) -> Self {
        Self {
            cache_path: state_dir.join(CACHE_FILE),
            metadata_path: state_dir.join(METADATA_FILE),
        }
    }

    /// Load the last-persisted snapshot, or an empty list if none exists.
    ///
    /// A present-but-malformed snapshot is surfaced as corruption rather
    /// than silently discarded.
    pub fn load(&self) -> Result<Vec<EmailRecord>> {
        if !self.cache_path.exists() {
            return Ok(Vec::new());
        }
        let contents = std::fs::read_to_string(&self.cache_path)
            .map_err(|e| MailsenseError::io(&self.cache_path, e))?;
        serde_json::from_str(&contents)
            .map_err(|e| MailsenseError::corrupt(&self.cache_path, e.to_string()))
    }

    /// Persist the full snapshot (overwrite).
    pub fn save(&self, emails: &[EmailRecord]) -> Result<()> {
        if let Some(parent) = self.cache_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| MailsenseError::persist(parent, e))?;
        }
        let contents = serde_json::to_string_pretty(emails)
            .map_err(|e| MailsenseError::corrupt(&self.cache_path, e.to_string()))?;
        std::fs::write(&self.cache_path, contents)
            .map_err(|e| MailsenseError::persist(&self.cache_path, e))
    }

    /// Load the fetch watermark.
    ///
    /// The watermark only scopes incremental queries; a missing or
    /// unparseable file degrades to "no watermark" (worst case: a full
    /// re-fetch, which the merge step absorbs without duplicates).
    pub fn load_watermark(&self) -> FetchWatermark {
        if !self.metadata_path.exists() {
            return FetchWatermark::default();
        }
        match std::fs::read_to_string(&self.metadata_path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(wm) => wm,
                Err(e) => {
                    warn!(path = %self.metadata_path.display(), error = %e,
                        "Watermark unparseable, refetching from scratch");
                    FetchWatermark::default()
                }
            },
            Err(e) => {
                warn!(path = %self.metadata_path.display(), error = %e,
                    "Watermark unreadable, refetching from scratch");
                FetchWatermark::default()
            }
        }
    }

    /// Persist the fetch watermark.
    pub fn save_watermark(&self, watermark: &FetchWatermark) -> Result<()> {
        if let Some(parent) = self.metadata_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| MailsenseError::persist(parent, e))?;
        }
        let contents = serde_json::to_string_pretty(watermark)
            .map_err(|e| MailsenseError::corrupt(&self.metadata_path, e.to_string()))?;
        std::fs::write(&self.metadata_path, contents)
            .map_err(|e| MailsenseError::persist(&self.metadata_path, e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn email(id: &str) -> EmailRecord {
        EmailRecord {
            id: id.into(),
            thread_id: "t".into(),
            subject: "s".into(),
            from: "a@example.com".into(),
            to: "b@example.com".into(),
            date: Utc.with_ymd_and_hms(2025, 4, 1, 10, 0, 0).unwrap(),
            snippet: String::new(),
            body: "body".into(),
            unique_id: id.into(),
            assigned_index: Some(1),
            enrichment: Default::default(),
        }
    }

    #[test]
    fn test_missing_cache_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let cache = EmailCache::new(dir.path());
        assert!(cache.load().unwrap().is_empty());
    }

    #[test]
    fn test_save_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let cache = EmailCache::new(dir.path());
        cache.save(&[email("m1"), email("m2")]).unwrap();
        let loaded = cache.load().unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].id, "m1");
        assert_eq!(loaded[1].unique_id, "m2");
    }

    #[test]
    fn test_malformed_cache_is_corrupt_state() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CACHE_FILE), "[{broken").unwrap();
        let cache = EmailCache::new(dir.path());
        assert!(matches!(
            cache.load().unwrap_err(),
            MailsenseError::CorruptState { .. }
        ));
    }

    #[test]
    fn test_watermark_degrades_to_default() {
        let dir = tempfile::tempdir().unwrap();
        let cache = EmailCache::new(dir.path());
        // Missing file
        assert!(cache.load_watermark().last_fetched_id.is_none());
        // Malformed file
        std::fs::write(dir.path().join(METADATA_FILE), "oops").unwrap();
        assert!(cache.load_watermark().last_fetched_timestamp.is_none());
    }

    #[test]
    fn test_watermark_roundtrip_camel_case() {
        let dir = tempfile::tempdir().unwrap();
        let cache = EmailCache::new(dir.path());
        let wm = FetchWatermark {
            last_fetched_id: Some("m7".into()),
            last_fetched_timestamp: Some(Utc.with_ymd_and_hms(2025, 4, 2, 0, 0, 0).unwrap()),
        };
        cache.save_watermark(&wm).unwrap();

        let raw = std::fs::read_to_string(dir.path().join(METADATA_FILE)).unwrap();
        assert!(raw.contains("lastFetchedId"));
        assert!(raw.contains("lastFetchedTimestamp"));

        let loaded = cache.load_watermark();
        assert_eq!(loaded.last_fetched_id.as_deref(), Some("m7"));
    }
}
