// OAuth2 token exchanges against the Elation token endpoint

use chrono::Utc;
use reqwest::header::{HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Method;

use super::types::{Credentials, GrantType, TokenResponse, TokenState};
use crate::error::GrantError;
use crate::http_client::{RequestConfig, Transport};

/// Token endpoint, relative to the API base URL
pub const TOKEN_PATH: &str = "/oauth2/token/";

/// Refresh-grant form body; the refresh token is URL-escaped
pub fn refresh_grant_body(refresh_token: &str) -> String {
    format!(
        "grant_type={}&refresh_token={}",
        GrantType::RefreshToken.as_str(),
        urlencoding::encode(refresh_token)
    )
}

/// Exchange the user's password for a token pair
pub async fn request_password_grant(
    transport: &Transport,
    creds: &Credentials,
    basic_auth: &HeaderValue,
) -> Result<TokenState, GrantError> {
    // The username identifies a clinician; keep it out of the logs
    tracing::info!(
        client_id = %creds.client_id,
        "Requesting Elation token via password grant..."
    );

    exchange(
        transport,
        GrantType::Password,
        creds.password_grant_body(),
        basic_auth,
    )
    .await
}

/// Exchange the current refresh token for a new token pair
pub async fn request_refresh_grant(
    transport: &Transport,
    basic_auth: &HeaderValue,
    refresh_token: &str,
) -> Result<TokenState, GrantError> {
    tracing::info!("Refreshing Elation token via refresh grant...");

    exchange(
        transport,
        GrantType::RefreshToken,
        refresh_grant_body(refresh_token),
        basic_auth,
    )
    .await
}

async fn exchange(
    transport: &Transport,
    grant: GrantType,
    body: String,
    basic_auth: &HeaderValue,
) -> Result<TokenState, GrantError> {
    let mut config = RequestConfig::default();
    config.headers.insert(AUTHORIZATION, basic_auth.clone());
    config.headers.insert(
        CONTENT_TYPE,
        HeaderValue::from_static("application/x-www-form-urlencoded"),
    );

    let response = match transport.send(Method::POST, TOKEN_PATH, Some(body), config).await {
        Ok(response) => response,
        Err(e) => {
            tracing::error!(
                grant_type = grant.as_str(),
                status = ?e.status(),
                error = %e,
                "Token exchange failed"
            );
            return Err(GrantError::Transport(e));
        }
    };

    let data: TokenResponse = response.json().await.map_err(|e| {
        GrantError::InvalidResponse(format!("failed to parse token response: {}", e))
    })?;

    let state = TokenState::from_response(data, Utc::now())?;

    tracing::info!(
        grant_type = grant.as_str(),
        "Elation token acquired, expires: {}",
        state.expires_at.to_rfc3339()
    );

    Ok(state)
}
