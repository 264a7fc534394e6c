//! Mail provider interface and the Gmail REST implementation.

pub mod auth;
pub mod message;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::error::{MailsenseError, Result};

const GMAIL_API_BASE: &str = "https://gmail.googleapis.com/gmail/v1/users/me";

/// A message listing entry: just enough identity to fetch the full content.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageRef {
    pub id: String,
    #[serde(default)]
    pub thread_id: String,
}

/// The mail provider collaborator.
///
/// Implementations return raw provider JSON from `get_message`; parsing into
/// an [`EmailRecord`](crate::model::EmailRecord) happens in
/// [`message::parse_message`], so a scripted test provider only has to
/// produce the same JSON shape.
#[async_trait]
pub trait MailProvider {
    /// List up to `max_results` messages matching `query` (newest first,
    /// provider-ordered).
    async fn list_messages(&self, query: &str, max_results: u32) -> Result<Vec<MessageRef>>;

    /// Fetch the full raw message for `id`.
    async fn get_message(&self, id: &str) -> Result<serde_json::Value>;
}

#[derive(Debug, Deserialize)]
struct ListResponse {
    #[serde(default)]
    messages: Vec<MessageRef>,
}

/// Gmail REST API client.
pub struct GmailClient {
    http: reqwest::Client,
    auth: auth::TokenManager,
}

impl GmailClient {
    pub fn new(auth: auth::TokenManager) -> Self {
        Self {
            http: reqwest::Client::new(),
            auth,
        }
    }
}

#[async_trait]
impl MailProvider for GmailClient {
    async fn list_messages(&self, query: &str, max_results: u32) -> Result<Vec<MessageRef>> {
        let token = self.auth.access_token().await?;
        debug!(query, max_results, "Listing Gmail messages");

        let max_results = max_results.to_string();
        let resp = self
            .http
            .get(format!("{GMAIL_API_BASE}/messages"))
            .bearer_auth(&token)
            .query(&[("q", query), ("maxResults", max_results.as_str())])
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(MailsenseError::Provider(format!(
                "list failed with {status}: {body}"
            )));
        }

        let list: ListResponse = resp.json().await?;
        Ok(list.messages)
    }

    async fn get_message(&self, id: &str) -> Result<serde_json::Value> {
        let token = self.auth.access_token().await?;

        let resp = self
            .http
            .get(format!("{GMAIL_API_BASE}/messages/{id}"))
            .bearer_auth(&token)
            .query(&[("format", "full")])
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            return Err(MailsenseError::Provider(format!(
                "get message '{id}' failed with {status}"
            )));
        }

        Ok(resp.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_response_tolerates_missing_messages_key() {
        // Gmail omits `messages` entirely when the query matches nothing.
        let resp: ListResponse = serde_json::from_str(r#"{"resultSizeEstimate": 0}"#).unwrap();
        assert!(resp.messages.is_empty());
    }

    #[test]
    fn test_message_ref_parses_thread_id() {
        let refs: Vec<MessageRef> = serde_json::from_str(
            r#"[{"id": "m1", "threadId": "t1"}, {"id": "m2"}]"#,
        )
        .unwrap();
        assert_eq!(refs[0].thread_id, "t1");
        assert_eq!(refs[1].thread_id, "");
    }
}
