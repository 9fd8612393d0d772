// Client credentials and the Basic header derived from them

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::header::HeaderValue;

use super::types::Credentials;
use crate::error::ApiError;

impl Credentials {
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            username: username.into(),
            password: password.into(),
        }
    }

    /// `Basic base64(client_id:client_secret)`, used for both grants
    pub fn basic_auth(&self) -> String {
        let pair = format!("{}:{}", self.client_id, self.client_secret);
        format!("Basic {}", STANDARD.encode(pair))
    }

    /// Password-grant form body; values are sent as-is, without URL escaping
    pub fn password_grant_body(&self) -> String {
        format!(
            "grant_type=password&username={}&password={}",
            self.username, self.password
        )
    }
}

/// Build the Basic header value, marked sensitive so it never shows up in logs
pub fn basic_auth_header(creds: &Credentials) -> Result<HeaderValue, ApiError> {
    let mut value = HeaderValue::from_str(&creds.basic_auth())
        .map_err(|e| ApiError::ConfigError(format!("client credentials: {}", e)))?;
    value.set_sensitive(true);
    Ok(value)
}
