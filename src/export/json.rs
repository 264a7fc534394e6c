//! Export the email snapshot as pretty-printed JSON.

use std::path::Path;

use crate::error::{MailsenseError, Result};
use crate::model::EmailRecord;

/// Write `emails` to `output_path` as a JSON array (same record shape as
/// the on-disk cache).
pub fn export_json(emails: &[EmailRecord], output_path: &Path) -> Result<()> {
    if let Some(parent) = output_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| MailsenseError::io(parent, e))?;
        }
    }
    let contents = serde_json::to_string_pretty(emails)
        .map_err(|e| MailsenseError::Export(e.to_string()))?;
    std::fs::write(output_path, contents).map_err(|e| MailsenseError::io(output_path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_export_json_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.json");
        let emails = vec![EmailRecord {
            id: "m1".into(),
            thread_id: "t1".into(),
            subject: "s".into(),
            from: "a@x.com".into(),
            to: "b@x.com".into(),
            date: Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
            snippet: String::new(),
            body: "b".into(),
            unique_id: "m1".into(),
            assigned_index: Some(1),
            enrichment: Default::default(),
        }];
        export_json(&emails, &path).unwrap();
        let loaded: Vec<EmailRecord> =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].assigned_index, Some(1));
    }
}
