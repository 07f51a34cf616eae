//! Spotify client-credentials token exchange.
//!
//! A node configured with Spotify credentials fetches a token once when it is
//! registered; the pool refuses to register the node if that exchange fails.

use serde::Deserialize;
use std::sync::RwLock;
use tracing::{debug, info};

use crate::config::SpotifyCredentials;
use crate::error::{LavaError, Result};

/// Public token endpoint
pub const TOKEN_URL: &str = "https://accounts.spotify.com/api/token";

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

/// Holds the client credentials and the latest bearer token
pub struct SpotifyClient {
    credentials: SpotifyCredentials,
    http: reqwest::Client,
    token: RwLock<Option<String>>,
}

impl SpotifyClient {
    pub fn new(credentials: SpotifyCredentials, http: reqwest::Client) -> Self {
        Self {
            credentials,
            http,
            token: RwLock::new(None),
        }
    }

    pub fn client_id(&self) -> &str {
        &self.credentials.client_id
    }

    /// Last token obtained, if any
    pub fn access_token(&self) -> Option<String> {
        self.token.read().unwrap().clone()
    }

    /// `Authorization` header value for Spotify Web API calls
    pub fn bearer(&self) -> Option<String> {
        self.access_token().map(|token| format!("Bearer {token}"))
    }

    /// Exchange the credentials for a fresh token and store it
    pub async fn refresh_token(&self) -> Result<String> {
        debug!(url = %self.credentials.token_url, "Requesting Spotify token");
        let response = self
            .http
            .post(&self.credentials.token_url)
            .basic_auth(&self.credentials.client_id, Some(&self.credentials.client_secret))
            .form(&[("grant_type", "client_credentials")])
            .send()
            .await?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(LavaError::SpotifyAuth(format!("{status}: {body}")));
        }

        let token: TokenResponse = response.json().await?;
        info!(expires_in = ?token.expires_in, "Spotify token acquired");
        *self.token.write().unwrap() = Some(token.access_token.clone());
        Ok(token.access_token)
    }
}

impl std::fmt::Debug for SpotifyClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpotifyClient")
            .field("client_id", &self.credentials.client_id)
            .finish_non_exhaustive()
    }
}
