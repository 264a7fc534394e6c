//! Fetch orchestrator: incremental retrieval, merge, index assignment.
//!
//! One fetch cycle: scope a provider query by the stored watermark, pull the
//! new messages, merge them over the cached set (new wins, by provider id),
//! run the whole merged set through index assignment, then persist the
//! snapshot. Persistence only happens after the full merge succeeds, so a
//! failed cycle leaves the previous snapshot authoritative.

use std::collections::HashSet;

use futures::future::join_all;
use tracing::{debug, info, warn};

use crate::cache::{EmailCache, FetchWatermark};
use crate::error::Result;
use crate::gmail::{message, MailProvider};
use crate::identity::IdentityStore;
use crate::model::EmailRecord;

/// Result of one fetch cycle.
pub struct FetchOutcome {
    /// The merged, index-annotated, persisted email set (new-first).
    pub emails: Vec<EmailRecord>,
    /// How many genuinely new messages this cycle retrieved.
    pub new_count: usize,
}

/// Coordinates the mail provider, identity store and email cache.
pub struct Fetcher<'a> {
    provider: &'a dyn MailProvider,
    identity: &'a IdentityStore,
    cache: &'a EmailCache,
    base_query: &'a str,
}

impl<'a> Fetcher<'a> {
    pub fn new(
        provider: &'a dyn MailProvider,
        identity: &'a IdentityStore,
        cache: &'a EmailCache,
        base_query: &'a str,
    ) -> Self {
        Self {
            provider,
            identity,
            cache,
            base_query,
        }
    }

    /// Fetch up to `max_results` messages newer than the watermark, merge
    /// with the cache, and persist the annotated result.
    pub async fn fetch_new(&self, max_results: u32) -> Result<FetchOutcome> {
        let watermark = self.cache.load_watermark();
        let query = self.scoped_query(&watermark);
        debug!(query = %query, "Fetch query");

        let listed = self.provider.list_messages(&query, max_results).await?;
        let cached = self.cache.load()?;

        if listed.is_empty() {
            // Nothing new. Still run the cached set through assignment so a
            // reset mapping file gets rebuilt consistently with the cache.
            info!(cached = cached.len(), "No new messages");
            let (annotated, _) = self.identity.assign_indices(cached)?;
            self.cache.save(&annotated)?;
            return Ok(FetchOutcome {
                emails: annotated,
                new_count: 0,
            });
        }

        // Bounded fan-out: full-content fetches for one listing page run
        // concurrently; completion order is irrelevant because the batch is
        // sorted by date below.
        let fetches = listed.iter().map(|m| self.provider.get_message(&m.id));
        let mut new_emails: Vec<EmailRecord> = Vec::with_capacity(listed.len());
        for (msg_ref, fetched) in listed.iter().zip(join_all(fetches).await) {
            match fetched {
                Ok(raw) => match message::parse_message(&raw) {
                    Some(record) => new_emails.push(record),
                    None => {
                        warn!(id = %msg_ref.id, "Dropping unparseable message");
                    }
                },
                Err(e) => {
                    warn!(id = %msg_ref.id, error = %e, "Dropping message that failed to fetch");
                }
            }
        }

        new_emails.sort_by(|a, b| b.date.cmp(&a.date));

        let next_watermark = new_emails.first().map(|newest| FetchWatermark {
            last_fetched_id: Some(newest.id.clone()),
            last_fetched_timestamp: Some(newest.date),
        });

        // Merge by provider id, the rawest identity available: new records
        // replace stale cached duplicates, merged order is new-first.
        let new_ids: HashSet<String> = new_emails.iter().map(|e| e.id.clone()).collect();
        let new_count = new_emails.len();
        let mut merged = new_emails;
        merged.extend(cached.into_iter().filter(|e| !new_ids.contains(e.id.as_str())));

        let (annotated, _) = self.identity.assign_indices(merged)?;
        self.cache.save(&annotated)?;
        if let Some(wm) = next_watermark {
            self.cache.save_watermark(&wm)?;
        }

        info!(new = new_count, total = annotated.len(), "Fetch complete");
        Ok(FetchOutcome {
            emails: annotated,
            new_count,
        })
    }

    /// Scope the base query to strictly newer messages when a watermark
    /// exists. Gmail's `after:` takes Unix seconds.
    fn scoped_query(&self, watermark: &FetchWatermark) -> String {
        match watermark.last_fetched_timestamp {
            Some(ts) => format!("{} after:{}", self.base_query, ts.timestamp()),
            None => self.base_query.to_string(),
        }
    }
}
