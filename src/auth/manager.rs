use chrono::Utc;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

use super::credentials;
use super::grant;
use super::types::{Credentials, TokenState};
use crate::error::{ApiError, GrantError};
use crate::http_client::Transport;

/// Outcome of the most recent refresh, read by callers that waited on it
#[derive(Default)]
struct RefreshSlot {
    last_failure: Option<Arc<GrantError>>,
}

/// Token manager
/// Owns the token state and keeps it fresh with single-flight refreshes
pub struct TokenManager {
    /// Client identity, never mutated
    credentials: Credentials,

    /// Precomputed `Basic` header for both grants
    basic_auth: HeaderValue,

    /// Transport shared with the request facade
    transport: Arc<Transport>,

    /// Current token pair; `None` until `initialize` succeeds
    state: RwLock<Option<TokenState>>,

    /// Serializes every write to `state`
    refresh_slot: Mutex<RefreshSlot>,

    /// Number of completed refresh attempts, successful or not
    refresh_attempts: AtomicU64,
}

impl TokenManager {
    /// Create a token manager; no network call happens until `initialize`
    pub fn new(transport: Arc<Transport>, credentials: Credentials) -> Result<Self, ApiError> {
        let basic_auth = credentials::basic_auth_header(&credentials)?;

        Ok(Self {
            credentials,
            basic_auth,
            transport,
            state: RwLock::new(None),
            refresh_slot: Mutex::new(RefreshSlot::default()),
            refresh_attempts: AtomicU64::new(0),
        })
    }

    /// Perform the password grant and replace the token state
    ///
    /// Not retried. Calling it again after a failure (or a success) runs a
    /// fresh password grant.
    pub async fn initialize(&self) -> Result<(), ApiError> {
        let mut slot = self.refresh_slot.lock().await;
        self.initialize_locked(&mut slot).await
    }

    async fn initialize_locked(&self, slot: &mut RefreshSlot) -> Result<(), ApiError> {
        let state = grant::request_password_grant(&self.transport, &self.credentials, &self.basic_auth)
            .await
            .map_err(|e| {
                tracing::error!("Elation password grant failed: {}", e);
                ApiError::InitializationFailed(e)
            })?;

        *self.state.write().await = Some(state);
        // Waiters queued behind an earlier failed refresh must see the new state
        slot.last_failure = None;
        Ok(())
    }

    /// Snapshot of the current token state
    pub async fn token_state(&self) -> Option<TokenState> {
        self.state.read().await.clone()
    }

    pub async fn is_initialized(&self) -> bool {
        self.state.read().await.is_some()
    }

    /// Return an `Authorization: Bearer` header that is fresh right now
    ///
    /// Refreshes first when the access token has expired. Callers arriving
    /// while a refresh is running wait for it and share its outcome instead
    /// of starting their own.
    pub async fn ensure_valid_token(&self) -> Result<HeaderMap, ApiError> {
        let seen = self.refresh_attempts.load(Ordering::Acquire);

        if let Some(header) = self.fresh_header().await? {
            return Ok(header);
        }

        let mut slot = self.refresh_slot.lock().await;

        if self.refresh_attempts.load(Ordering::Acquire) != seen {
            tracing::debug!("Token refresh completed while waiting, reusing its outcome");
            if let Some(failure) = &slot.last_failure {
                return Err(ApiError::RefreshFailed(failure.clone()));
            }
            return self.current_header().await;
        }

        // Another caller may have refreshed between the check and the lock
        if let Some(header) = self.fresh_header().await? {
            return Ok(header);
        }

        tracing::debug!("Access token expired, refreshing...");
        self.refresh_locked(&mut slot).await?;
        self.current_header().await
    }

    /// Perform a refresh grant now, regardless of expiry
    pub async fn refresh(&self) -> Result<(), ApiError> {
        let mut slot = self.refresh_slot.lock().await;
        self.refresh_locked(&mut slot).await
    }

    async fn refresh_locked(&self, slot: &mut RefreshSlot) -> Result<(), ApiError> {
        let refresh_token = match self.state.read().await.as_ref() {
            Some(state) => state.refresh_token.clone(),
            None => return Err(ApiError::Uninitialized),
        };

        let result =
            grant::request_refresh_grant(&self.transport, &self.basic_auth, &refresh_token).await;

        let outcome = match result {
            Ok(state) => {
                *self.state.write().await = Some(state);
                slot.last_failure = None;
                Ok(())
            }
            Err(e) => {
                // Stale state is kept so the next call retries the refresh
                tracing::error!("Token refresh failed: {}", e);
                let failure = Arc::new(e);
                slot.last_failure = Some(failure.clone());
                Err(ApiError::RefreshFailed(failure))
            }
        };

        self.refresh_attempts.fetch_add(1, Ordering::AcqRel);
        outcome
    }

    /// Bearer header if the token is still valid, `None` if it has expired
    async fn fresh_header(&self) -> Result<Option<HeaderMap>, ApiError> {
        let state = self.state.read().await;
        let state = state.as_ref().ok_or(ApiError::Uninitialized)?;

        if state.is_expired_at(Utc::now()) {
            return Ok(None);
        }
        bearer_header(state).map(Some)
    }

    async fn current_header(&self) -> Result<HeaderMap, ApiError> {
        let state = self.state.read().await;
        let state = state.as_ref().ok_or(ApiError::Uninitialized)?;
        bearer_header(state)
    }

    /// Move the expiry into the past so the next call refreshes
    #[cfg(any(test, feature = "test-utils"))]
    pub async fn expire_now(&self) {
        if let Some(state) = self.state.write().await.as_mut() {
            state.expires_at = Utc::now() - chrono::Duration::seconds(1);
        }
    }
}

fn bearer_header(state: &TokenState) -> Result<HeaderMap, ApiError> {
    let mut value = HeaderValue::from_str(&state.bearer())
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("Invalid bearer header: {}", e)))?;
    value.set_sensitive(true);

    let mut header = HeaderMap::new();
    header.insert(AUTHORIZATION, value);
    Ok(header)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Mock, Server};

    const PASSWORD_BODY: &str = "grant_type=password&username=u&password=p";

    fn manager(server: &Server) -> TokenManager {
        let transport =
            Arc::new(Transport::new(format!("{}/api/2.0/", server.url()), 1, 5, 5).unwrap());
        TokenManager::new(transport, Credentials::new("c", "s", "u", "p")).unwrap()
    }

    async fn password_mock(server: &mut Server, expect: usize) -> Mock {
        server
            .mock("POST", "/api/2.0/oauth2/token/")
            .match_body(PASSWORD_BODY)
            .with_status(200)
            .with_body(r#"{"access_token":"at1","refresh_token":"rt1","expires_in":"3600"}"#)
            .expect(expect)
            .create_async()
            .await
    }

    async fn refresh_mock(server: &mut Server, status: usize, expect: usize) -> Mock {
        server
            .mock("POST", "/api/2.0/oauth2/token/")
            .match_header("authorization", "Basic Yzpz")
            .match_body(Matcher::Exact(
                "grant_type=refresh_token&refresh_token=rt1".to_string(),
            ))
            .with_status(status)
            .with_body(r#"{"access_token":"at2","refresh_token":"rt2","expires_in":"7200"}"#)
            .expect(expect)
            .create_async()
            .await
    }

    fn authorization(header: &HeaderMap) -> &str {
        header.get(AUTHORIZATION).unwrap().to_str().unwrap()
    }

    #[tokio::test]
    async fn test_uninitialized_manager_fails() {
        let server = Server::new_async().await;
        let manager = manager(&server);

        assert!(!manager.is_initialized().await);
        assert!(matches!(
            manager.ensure_valid_token().await,
            Err(ApiError::Uninitialized)
        ));
        assert!(matches!(manager.refresh().await, Err(ApiError::Uninitialized)));
    }

    #[tokio::test]
    async fn test_fresh_token_is_served_from_cache() {
        let mut server = Server::new_async().await;
        let password = password_mock(&mut server, 1).await;
        let refresh = refresh_mock(&mut server, 200, 0).await;
        let manager = manager(&server);

        manager.initialize().await.unwrap();
        for _ in 0..3 {
            let header = manager.ensure_valid_token().await.unwrap();
            assert_eq!(authorization(&header), "Bearer at1");
        }

        password.assert_async().await;
        refresh.assert_async().await;
    }

    #[tokio::test]
    async fn test_expired_token_refreshes_once_and_replaces_state() {
        let mut server = Server::new_async().await;
        let _password = password_mock(&mut server, 1).await;
        let refresh = refresh_mock(&mut server, 200, 1).await;
        let manager = manager(&server);

        manager.initialize().await.unwrap();
        manager.expire_now().await;

        let header = manager.ensure_valid_token().await.unwrap();
        assert_eq!(authorization(&header), "Bearer at2");

        let state = manager.token_state().await.unwrap();
        assert_eq!(state.access_token, "at2");
        assert_eq!(state.refresh_token, "rt2");
        assert!(!state.is_expired_at(Utc::now()));

        // Fresh again, no further refresh
        manager.ensure_valid_token().await.unwrap();
        refresh.assert_async().await;
    }

    #[tokio::test]
    async fn test_refresh_failure_keeps_previous_state() {
        let mut server = Server::new_async().await;
        let _password = password_mock(&mut server, 1).await;
        let refresh = refresh_mock(&mut server, 400, 2).await;
        let manager = manager(&server);

        manager.initialize().await.unwrap();
        manager.expire_now().await;
        let stale = manager.token_state().await.unwrap();

        let err = manager.ensure_valid_token().await.unwrap_err();
        match err {
            ApiError::RefreshFailed(e) => match e.as_ref() {
                GrantError::Transport(t) => assert_eq!(t.status(), Some(400)),
                other => panic!("unexpected grant error: {:?}", other),
            },
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(manager.token_state().await.unwrap(), stale);

        // Still expired, so the next call tries again
        assert!(manager.ensure_valid_token().await.is_err());
        refresh.assert_async().await;
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_refresh() {
        let mut server = Server::new_async().await;
        let _password = password_mock(&mut server, 1).await;
        let refresh = refresh_mock(&mut server, 200, 1).await;
        let manager = manager(&server);

        manager.initialize().await.unwrap();
        manager.expire_now().await;

        let (a, b, c) = tokio::join!(
            manager.ensure_valid_token(),
            manager.ensure_valid_token(),
            manager.ensure_valid_token()
        );

        for header in [a.unwrap(), b.unwrap(), c.unwrap()] {
            assert_eq!(authorization(&header), "Bearer at2");
        }
        refresh.assert_async().await;
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_refresh_failure() {
        let mut server = Server::new_async().await;
        let _password = password_mock(&mut server, 1).await;
        let refresh = refresh_mock(&mut server, 401, 1).await;
        let manager = manager(&server);

        manager.initialize().await.unwrap();
        manager.expire_now().await;

        let (a, b) = tokio::join!(manager.ensure_valid_token(), manager.ensure_valid_token());

        assert!(matches!(a, Err(ApiError::RefreshFailed(_))));
        assert!(matches!(b, Err(ApiError::RefreshFailed(_))));
        refresh.assert_async().await;
    }

    #[tokio::test]
    async fn test_initialize_failure_leaves_manager_uninitialized() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/api/2.0/oauth2/token/")
            .with_status(401)
            .with_body(r#"{"error":"invalid_grant"}"#)
            .create_async()
            .await;
        let manager = manager(&server);

        let err = manager.initialize().await.unwrap_err();
        assert!(matches!(err, ApiError::InitializationFailed(_)));
        assert!(!manager.is_initialized().await);
    }

    #[tokio::test]
    async fn test_explicit_refresh_replaces_state() {
        let mut server = Server::new_async().await;
        let _password = password_mock(&mut server, 1).await;
        let refresh = refresh_mock(&mut server, 200, 1).await;
        let manager = manager(&server);

        manager.initialize().await.unwrap();
        manager.refresh().await.unwrap();

        let state = manager.token_state().await.unwrap();
        assert_eq!(state.refresh_token, "rt2");
        refresh.assert_async().await;
    }

    #[tokio::test]
    async fn test_reinitialize_clears_earlier_refresh_failure() {
        let mut server = Server::new_async().await;
        let password = password_mock(&mut server, 2).await;
        let refresh = refresh_mock(&mut server, 401, 1).await;
        let manager = Arc::new(manager(&server));

        manager.initialize().await.unwrap();
        manager.expire_now().await;

        // Queue a caller on the slot before the failing refresh runs
        let mut slot = manager.refresh_slot.lock().await;
        let waiter = tokio::spawn({
            let manager = manager.clone();
            async move { manager.ensure_valid_token().await }
        });
        for _ in 0..3 {
            tokio::task::yield_now().await;
        }

        let err = manager.refresh_locked(&mut slot).await.unwrap_err();
        assert!(matches!(err, ApiError::RefreshFailed(_)));
        manager.initialize_locked(&mut slot).await.unwrap();
        assert!(slot.last_failure.is_none());
        drop(slot);

        let header = waiter.await.unwrap().unwrap();
        assert_eq!(authorization(&header), "Bearer at1");

        password.assert_async().await;
        refresh.assert_async().await;
    }
}
