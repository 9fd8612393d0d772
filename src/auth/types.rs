// Authentication types

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use std::fmt;

use crate::error::GrantError;

/// OAuth2 grant used against the token endpoint
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GrantType {
    /// Resource-owner password grant, used once by `initialize`
    Password,

    /// Refresh-token grant, used whenever the access token has expired
    RefreshToken,
}

impl GrantType {
    pub fn as_str(&self) -> &'static str {
        match self {
            GrantType::Password => "password",
            GrantType::RefreshToken => "refresh_token",
        }
    }
}

/// Client identity plus the user account the client acts on behalf of
#[derive(Clone, PartialEq)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
    pub username: String,
    pub password: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"<redacted>")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Cached token pair with absolute expiry
#[derive(Debug, Clone, PartialEq)]
pub struct TokenState {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
}

impl TokenState {
    /// Build the state from a token response received at `issued_at`
    pub fn from_response(response: TokenResponse, issued_at: DateTime<Utc>) -> Result<Self, GrantError> {
        if response.access_token.is_empty() {
            return Err(GrantError::InvalidResponse(
                "response does not contain access_token".to_string(),
            ));
        }
        if !response.access_token.bytes().all(|b| b.is_ascii_graphic()) {
            return Err(GrantError::InvalidResponse(
                "access_token is not a valid bearer token".to_string(),
            ));
        }

        let seconds = response.expires_in.seconds()?;
        let expires_at = issued_at
            .checked_add_signed(Duration::milliseconds(seconds * 1000))
            .ok_or_else(|| {
                GrantError::InvalidResponse(format!("expires_in is out of range: {}", seconds))
            })?;

        Ok(Self {
            access_token: response.access_token,
            refresh_token: response.refresh_token,
            expires_at,
        })
    }

    /// Strictly later than expiry; the expiry instant itself is still valid
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    pub fn expires_at_epoch_ms(&self) -> i64 {
        self.expires_at.timestamp_millis()
    }

    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.access_token)
    }
}

/// Token endpoint response, shared by both grants
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: ExpiresIn,
}

/// Token lifetime in seconds; Elation sends it as a numeric string
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum ExpiresIn {
    Text(String),
    Seconds(i64),
}

impl ExpiresIn {
    /// Lifetime as base-10 integer seconds
    pub fn seconds(&self) -> Result<i64, GrantError> {
        let seconds = match self {
            ExpiresIn::Seconds(s) => *s,
            ExpiresIn::Text(s) => s.trim().parse::<i64>().map_err(|_| {
                GrantError::InvalidResponse(format!("expires_in is not an integer: {:?}", s))
            })?,
        };

        if seconds < 0 {
            return Err(GrantError::InvalidResponse(format!(
                "expires_in is negative: {}",
                seconds
            )));
        }

        // Keep seconds * 1000 inside chrono's millisecond range
        if seconds > i64::MAX / 1000 / 2 {
            return Err(GrantError::InvalidResponse(format!(
                "expires_in is out of range: {}",
                seconds
            )));
        }

        Ok(seconds)
    }
}
