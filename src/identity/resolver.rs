//! Resolve user-supplied tokens to cached emails.
//!
//! A token is tried as, in order: a numeric assigned index, an exact unique
//! ID, then a unique-ID prefix. Prefix matching only engages at 8 or more
//! characters so that short typos do not silently hit unrelated IDs, and a
//! prefix shared by several IDs is reported as ambiguous rather than
//! resolved to an arbitrary one.

use crate::identity::store::IdMapping;
use crate::model::EmailRecord;

/// Minimum token length for prefix matching against unique IDs.
pub const MIN_PREFIX_LEN: usize = 8;

/// Outcome of a resolution attempt. A miss is an expected result, not an
/// error; users mistype identifiers all the time.
#[derive(Debug)]
pub enum ResolveOutcome<'a> {
    /// Exactly one email matched.
    Found(&'a EmailRecord),
    /// Nothing matched the token.
    NotFound,
    /// The token is a prefix of several unique IDs (sorted candidates).
    Ambiguous(Vec<String>),
}

impl<'a> ResolveOutcome<'a> {
    /// Convenience accessor for tests and callers that only care about hits.
    pub fn found(&self) -> Option<&'a EmailRecord> {
        match self {
            ResolveOutcome::Found(email) => Some(email),
            _ => None,
        }
    }
}

/// Resolve `token` against the cached email set and identity mapping.
pub fn resolve<'a>(
    token: &str,
    emails: &'a [EmailRecord],
    mapping: &IdMapping,
) -> ResolveOutcome<'a> {
    let token = token.trim();
    if token.is_empty() {
        return ResolveOutcome::NotFound;
    }

    // 1. Numeric token: direct index lookup.
    if let Ok(index) = token.parse::<u64>() {
        return email_at_index(index, emails);
    }

    // 2. Exact unique-ID match.
    if let Some(&index) = mapping.id_to_index.get(token) {
        return email_at_index(index, emails);
    }

    // 3. Prefix match, only for tokens long enough to be unambiguous typos.
    if token.len() >= MIN_PREFIX_LEN {
        let mut candidates: Vec<&String> = mapping
            .id_to_index
            .keys()
            .filter(|id| id.starts_with(token))
            .collect();
        candidates.sort();

        match candidates.as_slice() {
            [] => ResolveOutcome::NotFound,
            [only] => {
                let index = mapping.id_to_index[*only];
                email_at_index(index, emails)
            }
            many => ResolveOutcome::Ambiguous(many.iter().map(|s| (*s).clone()).collect()),
        }
    } else {
        ResolveOutcome::NotFound
    }
}

fn email_at_index(index: u64, emails: &[EmailRecord]) -> ResolveOutcome<'_> {
    match emails.iter().find(|e| e.assigned_index == Some(index)) {
        Some(email) => ResolveOutcome::Found(email),
        None => ResolveOutcome::NotFound,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn email(uid: &str, index: u64) -> EmailRecord {
        EmailRecord {
            id: uid.into(),
            thread_id: String::new(),
            subject: format!("subject {index}"),
            from: "sender@example.com".into(),
            to: String::new(),
            date: Utc.with_ymd_and_hms(2025, 2, 1, 8, 0, 0).unwrap(),
            snippet: String::new(),
            body: String::new(),
            unique_id: uid.into(),
            assigned_index: Some(index),
            enrichment: Default::default(),
        }
    }

    fn fixture() -> (Vec<EmailRecord>, IdMapping) {
        let emails = vec![
            email("aaaa1111bbbb", 1),
            email("ccc2222", 2),
            email("ddd3333", 3),
        ];
        let mut mapping = IdMapping::default();
        for e in &emails {
            let index = e.assigned_index.unwrap();
            mapping.id_to_index.insert(e.unique_id.clone(), index);
            mapping.index_to_id.insert(index, e.unique_id.clone());
        }
        mapping.next_index = 4;
        (emails, mapping)
    }

    #[test]
    fn test_resolve_by_index() {
        let (emails, mapping) = fixture();
        let hit = resolve("2", &emails, &mapping).found().expect("found");
        assert_eq!(hit.unique_id, "ccc2222");
    }

    #[test]
    fn test_resolve_by_exact_id() {
        let (emails, mapping) = fixture();
        let hit = resolve("aaaa1111bbbb", &emails, &mapping).found().expect("found");
        assert_eq!(hit.assigned_index, Some(1));
    }

    #[test]
    fn test_resolve_by_eight_char_prefix() {
        let (emails, mapping) = fixture();
        let hit = resolve("aaaa1111", &emails, &mapping).found().expect("found");
        assert_eq!(hit.assigned_index, Some(1));
    }

    #[test]
    fn test_short_prefix_is_not_found() {
        // "aaaa" is a real prefix but below the 8-char minimum.
        let (emails, mapping) = fixture();
        assert!(matches!(
            resolve("aaaa", &emails, &mapping),
            ResolveOutcome::NotFound
        ));
    }

    #[test]
    fn test_unknown_token_is_not_found() {
        let (emails, mapping) = fixture();
        assert!(matches!(
            resolve("zzzz", &emails, &mapping),
            ResolveOutcome::NotFound
        ));
        assert!(matches!(
            resolve("99", &emails, &mapping),
            ResolveOutcome::NotFound
        ));
    }

    #[test]
    fn test_ambiguous_prefix_lists_candidates() {
        let (mut emails, mut mapping) = fixture();
        emails.push(email("aaaa1111cccc", 4));
        mapping.id_to_index.insert("aaaa1111cccc".into(), 4);
        mapping.index_to_id.insert(4, "aaaa1111cccc".into());
        mapping.next_index = 5;

        match resolve("aaaa1111", &emails, &mapping) {
            ResolveOutcome::Ambiguous(candidates) => {
                assert_eq!(candidates, vec!["aaaa1111bbbb", "aaaa1111cccc"]);
            }
            other => panic!("expected Ambiguous, got {other:?}"),
        }
    }

    #[test]
    fn test_index_in_mapping_but_missing_from_cache() {
        // Mapping knows the id, but the email dropped out of the snapshot.
        let (mut emails, mapping) = fixture();
        emails.retain(|e| e.assigned_index != Some(3));
        assert!(matches!(
            resolve("3", &emails, &mapping),
            ResolveOutcome::NotFound
        ));
        assert!(matches!(
            resolve("ddd3333", &emails, &mapping),
            ResolveOutcome::NotFound
        ));
    }
}
