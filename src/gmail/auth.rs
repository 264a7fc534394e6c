//! OAuth2 token storage and refresh for the Gmail API.
//!
//! The interactive consent flow is out of scope: the token file must be
//! provisioned once (any standard OAuth helper produces the same JSON
//! shape). From then on, expired access tokens are renewed with the
//! refresh grant and the file is rewritten.
//!
//! The client secret is read from an environment variable named in config,
//! never from config or state files.

use std::path::PathBuf;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::Config;
use crate::error::{MailsenseError, Result};

/// Google OAuth2 token endpoint.
const TOKEN_ENDPOINT: &str = "https://oauth2.googleapis.com/token";

/// An OAuth2 token pair with expiry tracking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthToken {
    /// Short-lived access token for API calls.
    pub access_token: String,
    /// Long-lived refresh token.
    pub refresh_token: String,
    /// Access token expiry. `None` means unknown, treated as expired.
    pub expires_at: Option<DateTime<Utc>>,
}

impl OAuthToken {
    /// Whether the access token has expired (with a 60-second margin).
    pub fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(exp) => Utc::now() >= exp - Duration::seconds(60),
            None => true,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    access_token: String,
    expires_in: i64,
}

/// Loads the token file, refreshes when expired, saves renewals.
pub struct TokenManager {
    path: PathBuf,
    client_id: String,
    client_secret_env: String,
    http: reqwest::Client,
}

impl TokenManager {
    pub fn from_config(config: &Config) -> Self {
        Self {
            path: crate::config::token_path(config),
            client_id: config.gmail.client_id.clone(),
            client_secret_env: config.gmail.client_secret_env.clone(),
            http: reqwest::Client::new(),
        }
    }

    /// Return a valid access token, refreshing and re-saving if needed.
    pub async fn access_token(&self) -> Result<String> {
        let token = self.load()?;
        if !token.is_expired() {
            return Ok(token.access_token);
        }
        debug!("Access token expired, refreshing");
        let renewed = self.refresh(&token).await?;
        self.save(&renewed)?;
        Ok(renewed.access_token)
    }

    fn load(&self) -> Result<OAuthToken> {
        if !self.path.exists() {
            return Err(MailsenseError::Auth(format!(
                "no OAuth token file at '{}'; provision one with your OAuth helper first",
                self.path.display()
            )));
        }
        let contents = std::fs::read_to_string(&self.path)
            .map_err(|e| MailsenseError::Auth(format!("cannot read token file: {e}")))?;
        serde_json::from_str(&contents)
            .map_err(|e| MailsenseError::Auth(format!("cannot parse token file: {e}")))
    }

    fn save(&self, token: &OAuthToken) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| MailsenseError::persist(parent, e))?;
        }
        let contents = serde_json::to_string_pretty(token)
            .map_err(|e| MailsenseError::Auth(e.to_string()))?;
        std::fs::write(&self.path, &contents)
            .map_err(|e| MailsenseError::persist(&self.path, e))?;

        // Tokens are credentials: owner read/write only.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let _ = std::fs::set_permissions(&self.path, std::fs::Permissions::from_mode(0o600));
        }

        info!(path = %self.path.display(), "Saved refreshed OAuth token");
        Ok(())
    }

    async fn refresh(&self, token: &OAuthToken) -> Result<OAuthToken> {
        let secret = std::env::var(&self.client_secret_env).map_err(|_| {
            MailsenseError::Auth(format!(
                "environment variable '{}' not set (OAuth2 client secret)",
                self.client_secret_env
            ))
        })?;

        let resp = self
            .http
            .post(TOKEN_ENDPOINT)
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", secret.as_str()),
                ("refresh_token", token.refresh_token.as_str()),
                ("grant_type", "refresh_token"),
            ])
            .send()
            .await?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(MailsenseError::Auth(format!(
                "token refresh failed with {status}: {body}"
            )));
        }

        let refreshed: RefreshResponse = resp.json().await?;
        Ok(OAuthToken {
            access_token: refreshed.access_token,
            refresh_token: token.refresh_token.clone(),
            expires_at: Some(Utc::now() + Duration::seconds(refreshed.expires_in)),
        })
    }
}
