//! Identity store: unique-ID generation and the persisted index mapping.
//!
//! Every fetched email gets a stable small integer (`assignedIndex`) and a
//! stable string identifier (`uniqueId`) so that user-facing references
//! (`view 3`, `view --id abcd1234`) survive repeated fetches. Indices are
//! allocated once per unique ID, monotonically, and never reused.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::error::{MailsenseError, Result};
use crate::model::EmailRecord;

/// File name of the persisted mapping inside the state directory.
pub const MAPPING_FILE: &str = "email_id_mapping.json";

/// Hex characters kept from the fallback SHA-256 digest. 48 bits is ample
/// for caches of thousands of emails; this is a size tradeoff, not a
/// security boundary.
const FALLBACK_ID_LEN: usize = 12;

/// Bidirectional index <-> unique-ID mapping, persisted as
/// `email_id_mapping.json`.
///
/// Invariant: `index_to_id` and `id_to_index` are exact inverses, and
/// `next_index` is strictly greater than every allocated index.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdMapping {
    pub index_to_id: BTreeMap<u64, String>,
    pub id_to_index: HashMap<String, u64>,
    pub next_index: u64,
}

impl Default for IdMapping {
    fn default() -> Self {
        Self {
            index_to_id: BTreeMap::new(),
            id_to_index: HashMap::new(),
            next_index: 1,
        }
    }
}

impl IdMapping {
    /// Check the bidirectional-consistency invariant.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.index_to_id.len() != self.id_to_index.len() {
            return Err(format!(
                "map size mismatch: {} indices vs {} ids",
                self.index_to_id.len(),
                self.id_to_index.len()
            ));
        }
        for (id, index) in &self.id_to_index {
            match self.index_to_id.get(index) {
                Some(mapped) if mapped == id => {}
                _ => return Err(format!("index {index} does not map back to id '{id}'")),
            }
        }
        if let Some((&max, _)) = self.index_to_id.iter().next_back() {
            if self.next_index <= max {
                return Err(format!(
                    "nextIndex {} not above highest allocated index {max}",
                    self.next_index
                ));
            }
        }
        Ok(())
    }
}

/// Compute the stable unique ID for an email.
///
/// The provider id is used verbatim when present. Records without one get a
/// deterministic digest of sender, subject and date, so the same input
/// always yields the same ID across process restarts.
pub fn unique_id_for(email: &EmailRecord) -> String {
    if !email.id.is_empty() {
        return email.id.clone();
    }
    let mut hasher = Sha256::new();
    hasher.update(email.from.as_bytes());
    hasher.update(b"|");
    hasher.update(email.subject.as_bytes());
    hasher.update(b"|");
    hasher.update(email.date.to_rfc3339().as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    digest[..FALLBACK_ID_LEN].to_string()
}

/// Persisted identity store.
pub struct IdentityStore {
    path: PathBuf,
}

impl IdentityStore {
    /// Create a store backed by `email_id_mapping.json` in `state_dir`.
    pub fn new(state_dir: &Path) -> Self {
        Self {
            path: state_dir.join(MAPPING_FILE),
        }
    }

    /// Load the persisted mapping.
    ///
    /// A missing or unreadable file is an empty mapping (`next_index = 1`);
    /// reference stability is best-effort across lost state, and the tool
    /// must never fail just because it has not run before. A file that
    /// reads fine but contains malformed JSON is surfaced as corruption.
    pub fn load(&self) -> Result<IdMapping> {
        if !self.path.exists() {
            return Ok(IdMapping::default());
        }
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Mapping unreadable, starting empty");
                return Ok(IdMapping::default());
            }
        };
        let mapping: IdMapping = serde_json::from_str(&contents)
            .map_err(|e| MailsenseError::corrupt(&self.path, e.to_string()))?;
        if let Err(reason) = mapping.validate() {
            return Err(MailsenseError::corrupt(&self.path, reason));
        }
        Ok(mapping)
    }

    /// Persist the mapping (full overwrite).
    pub fn save(&self, mapping: &IdMapping) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| MailsenseError::persist(parent, e))?;
        }
        let contents = serde_json::to_string_pretty(mapping)
            .map_err(|e| MailsenseError::corrupt(&self.path, e.to_string()))?;
        std::fs::write(&self.path, contents).map_err(|e| MailsenseError::persist(&self.path, e))
    }

    /// Annotate every email with its unique ID and stable index.
    ///
    /// Already-known IDs reuse their existing index; new ones get
    /// `next_index`. The updated mapping is persisted before returning, so
    /// repeated calls with overlapping sets are idempotent.
    pub fn assign_indices(
        &self,
        emails: Vec<EmailRecord>,
    ) -> Result<(Vec<EmailRecord>, IdMapping)> {
        let mut mapping = self.load()?;
        let mut allocated = 0usize;

        let mut annotated = Vec::with_capacity(emails.len());
        for mut email in emails {
            let uid = unique_id_for(&email);
            let index = match mapping.id_to_index.get(&uid) {
                Some(&existing) => existing,
                None => {
                    let index = mapping.next_index;
                    mapping.next_index += 1;
                    mapping.id_to_index.insert(uid.clone(), index);
                    mapping.index_to_id.insert(index, uid.clone());
                    allocated += 1;
                    index
                }
            };
            email.unique_id = uid;
            email.assigned_index = Some(index);
            annotated.push(email);
        }

        self.save(&mapping)?;
        debug!(
            total = annotated.len(),
            new = allocated,
            next_index = mapping.next_index,
            "Assigned indices"
        );
        Ok((annotated, mapping))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn email(id: &str, from: &str, subject: &str) -> EmailRecord {
        EmailRecord {
            id: id.into(),
            thread_id: String::new(),
            subject: subject.into(),
            from: from.into(),
            to: String::new(),
            date: Utc.with_ymd_and_hms(2025, 3, 1, 9, 30, 0).unwrap(),
            snippet: String::new(),
            body: String::new(),
            unique_id: String::new(),
            assigned_index: None,
            enrichment: Default::default(),
        }
    }

    #[test]
    fn test_unique_id_uses_provider_id_verbatim() {
        let e = email("gmail-abc123", "a@example.com", "Hi");
        assert_eq!(unique_id_for(&e), "gmail-abc123");
    }

    #[test]
    fn test_fallback_id_deterministic() {
        let a = email("", "a@example.com", "Quarterly report");
        let b = email("", "a@example.com", "Quarterly report");
        let id_a = unique_id_for(&a);
        assert_eq!(id_a, unique_id_for(&b));
        assert_eq!(id_a.len(), FALLBACK_ID_LEN);
        assert!(id_a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_fallback_id_differs_on_any_field() {
        let base = email("", "a@example.com", "Quarterly report");
        let other_from = email("", "b@example.com", "Quarterly report");
        let other_subject = email("", "a@example.com", "Quarterly report v2");
        let mut other_date = email("", "a@example.com", "Quarterly report");
        other_date.date = Utc.with_ymd_and_hms(2025, 3, 2, 9, 30, 0).unwrap();

        let id = unique_id_for(&base);
        assert_ne!(id, unique_id_for(&other_from));
        assert_ne!(id, unique_id_for(&other_subject));
        assert_ne!(id, unique_id_for(&other_date));
    }

    #[test]
    fn test_assign_reuses_known_index() {
        let dir = tempfile::tempdir().unwrap();
        let store = IdentityStore::new(dir.path());

        let (first, mapping) = store
            .assign_indices(vec![email("m1", "a@x.com", "one"), email("m2", "b@x.com", "two")])
            .unwrap();
        assert_eq!(first[0].assigned_index, Some(1));
        assert_eq!(first[1].assigned_index, Some(2));
        assert_eq!(mapping.next_index, 3);

        // Overlapping second batch: m2 keeps its index, m3 gets a new one.
        let (second, mapping) = store
            .assign_indices(vec![email("m3", "c@x.com", "three"), email("m2", "b@x.com", "two")])
            .unwrap();
        assert_eq!(second[0].assigned_index, Some(3));
        assert_eq!(second[1].assigned_index, Some(2));
        assert_eq!(mapping.next_index, 4);
        mapping.validate().unwrap();
    }

    #[test]
    fn test_missing_mapping_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = IdentityStore::new(dir.path());
        let mapping = store.load().unwrap();
        assert_eq!(mapping.next_index, 1);
        assert!(mapping.id_to_index.is_empty());
    }

    #[test]
    fn test_malformed_mapping_is_corrupt_state() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(MAPPING_FILE), "{not json").unwrap();
        let store = IdentityStore::new(dir.path());
        let err = store.load().unwrap_err();
        assert!(matches!(err, MailsenseError::CorruptState { .. }));
    }

    #[test]
    fn test_mapping_wire_format_is_camel_case() {
        let dir = tempfile::tempdir().unwrap();
        let store = IdentityStore::new(dir.path());
        store.assign_indices(vec![email("m1", "a@x.com", "one")]).unwrap();

        let raw = std::fs::read_to_string(dir.path().join(MAPPING_FILE)).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["nextIndex"], 2);
        assert_eq!(value["indexToId"]["1"], "m1");
        assert_eq!(value["idToIndex"]["m1"], 1);
    }

    #[test]
    fn test_validate_rejects_inconsistent_mapping() {
        let mut mapping = IdMapping::default();
        mapping.id_to_index.insert("a".into(), 1);
        // index_to_id left empty: inverse broken
        assert!(mapping.validate().is_err());
    }
}
