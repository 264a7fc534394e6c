//! Batch AI enrichment: classification, summary, reply draft, sentiment.
//!
//! The model is asked for a JSON array keyed by email id. Responses are
//! recovered best-effort (code fences stripped, outermost array located);
//! any email the response misses, and the whole batch on a parse failure,
//! gets neutral defaults. Enrichment failing must never take the fetch or
//! identity path down with it.

use chrono::Utc;
use serde_json::Value;
use tracing::warn;

use crate::ai::TextGenerator;
use crate::config::AiConfig;
use crate::error::Result;
use crate::model::{EmailRecord, Enrichment};

/// Neutral classification applied when the model gives nothing usable.
pub const NEUTRAL_CLASSIFICATION: &str = "Unclassified";

/// Neutral sentiment applied when the model gives nothing usable.
pub const NEUTRAL_SENTIMENT: &str = "neutral";

/// Enrich `emails` in place. Returns how many records were filled from the
/// model (as opposed to defaulted).
pub async fn enrich_batch(
    generator: &dyn TextGenerator,
    emails: &mut [EmailRecord],
    config: &AiConfig,
) -> Result<usize> {
    if emails.is_empty() {
        return Ok(0);
    }

    let prompt = batch_prompt(emails, config.max_body_chars);
    let raw = match generator.generate(&prompt).await {
        Ok(text) => text,
        Err(e) => {
            warn!(error = %e, "Enrichment request failed, applying neutral defaults");
            fill_defaults(emails);
            return Ok(0);
        }
    };

    let entries = match extract_json_array(&raw) {
        Some(Value::Array(entries)) => entries,
        _ => {
            warn!("Enrichment response had no recoverable JSON array, applying neutral defaults");
            fill_defaults(emails);
            return Ok(0);
        }
    };

    let now = Utc::now();
    let mut filled = 0usize;
    for email in emails.iter_mut() {
        let entry = entries
            .iter()
            .find(|e| e.get("id").and_then(Value::as_str) == Some(email.id.as_str()));
        email.enrichment = match entry {
            Some(entry) => {
                filled += 1;
                Enrichment {
                    classification: Some(
                        field(entry, "classification").unwrap_or_else(|| NEUTRAL_CLASSIFICATION.into()),
                    ),
                    summary: Some(field(entry, "summary").unwrap_or_default()),
                    suggested_response: Some(field(entry, "suggestedResponse").unwrap_or_default()),
                    sentiment: Some(
                        field(entry, "sentiment").unwrap_or_else(|| NEUTRAL_SENTIMENT.into()),
                    ),
                    analyzed_at: Some(now),
                }
            }
            None => neutral_enrichment(),
        };
    }
    Ok(filled)
}

/// Draft a reply for a single email.
pub async fn draft_reply(generator: &dyn TextGenerator, email: &EmailRecord) -> Result<String> {
    let prompt = format!(
        "Draft a concise, polite reply to the following email. \
         Respond with the reply text only, no preamble.\n\n\
         From: {}\nSubject: {}\nDate: {}\n\n{}",
        email.from,
        email.subject,
        email.date.to_rfc3339(),
        email.body
    );
    let reply = generator.generate(&prompt).await?;
    Ok(reply.trim().to_string())
}

/// Build the batch prompt embedding each email's id, subject, from, date
/// and truncated content.
fn batch_prompt(emails: &[EmailRecord], max_body_chars: usize) -> String {
    let mut prompt = String::from(
        "You are an email assistant. For each email below, produce a JSON array \
         where each element has the keys: id, classification (one of Work, Personal, \
         Finance, Newsletter, Promotion, Notification, Other), summary (1-2 sentences), \
         suggestedResponse (a short reply draft, empty string if none makes sense), \
         sentiment (positive, neutral or negative). \
         Respond with the JSON array only.\n",
    );
    for email in emails {
        let content: String = email.body.chars().take(max_body_chars).collect();
        prompt.push_str(&format!(
            "\n---\nid: {}\nsubject: {}\nfrom: {}\ndate: {}\ncontent: {}\n",
            email.id,
            email.subject,
            email.from,
            email.date.to_rfc3339(),
            content
        ));
    }
    prompt
}

fn field(entry: &Value, key: &str) -> Option<String> {
    entry
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

fn neutral_enrichment() -> Enrichment {
    Enrichment {
        classification: Some(NEUTRAL_CLASSIFICATION.into()),
        summary: Some(String::new()),
        suggested_response: Some(String::new()),
        sentiment: Some(NEUTRAL_SENTIMENT.into()),
        analyzed_at: Some(Utc::now()),
    }
}

fn fill_defaults(emails: &mut [EmailRecord]) {
    for email in emails.iter_mut() {
        email.enrichment = neutral_enrichment();
    }
}

/// Best-effort recovery of a JSON array from free-form model output.
///
/// Strips Markdown code fences, then parses the slice between the first
/// `[` and the last `]`.
pub fn extract_json_array(text: &str) -> Option<Value> {
    let defenced: String = text
        .lines()
        .filter(|line| !line.trim_start().starts_with("```"))
        .collect::<Vec<_>>()
        .join("\n");

    let start = defenced.find('[')?;
    let end = defenced.rfind(']')?;
    if end < start {
        return None;
    }
    serde_json::from_str(&defenced[start..=end]).ok()
}
