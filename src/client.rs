// Authenticated request facade
// Every verb obtains a fresh bearer header before the transport call

use reqwest::{Method, Response};
use std::sync::Arc;

use crate::auth::{Credentials, TokenManager};
use crate::config::{Config, Environment};
use crate::error::Result;
use crate::http_client::{merge_config, RequestConfig, Transport};

const DEFAULT_MAX_CONNECTIONS: usize = 20;
const DEFAULT_CONNECT_TIMEOUT: u64 = 30;
const DEFAULT_REQUEST_TIMEOUT: u64 = 300;

/// Elation API client with transparent token management
pub struct ApiClient {
    /// Transport bound to the environment chosen at construction
    transport: Arc<Transport>,

    /// Token lifecycle; the facade only reads headers from it
    tokens: TokenManager,
}

impl ApiClient {
    /// Create a client for the sandbox or production environment
    pub fn new(credentials: Credentials, sandbox: bool) -> Result<Self> {
        let environment = Environment::from_sandbox_flag(sandbox);
        let transport = Transport::new(
            environment.base_url(),
            DEFAULT_MAX_CONNECTIONS,
            DEFAULT_CONNECT_TIMEOUT,
            DEFAULT_REQUEST_TIMEOUT,
        )?;
        Self::with_transport(Arc::new(transport), credentials)
    }

    /// Create a client from loaded configuration
    pub fn from_config(config: &Config) -> Result<Self> {
        let transport = Transport::new(
            config.environment.base_url(),
            config.http_max_connections,
            config.http_connect_timeout,
            config.http_request_timeout,
        )?;
        Self::with_transport(Arc::new(transport), config.credentials.clone())
    }

    /// Create a client around an existing transport
    pub fn with_transport(transport: Arc<Transport>, credentials: Credentials) -> Result<Self> {
        let tokens = TokenManager::new(transport.clone(), credentials)?;
        Ok(Self { transport, tokens })
    }

    /// Acquire the first token pair; must succeed before any verb is used
    pub async fn initialize(&self) -> Result<()> {
        self.tokens.initialize().await
    }

    pub fn tokens(&self) -> &TokenManager {
        &self.tokens
    }

    pub fn base_url(&self) -> &str {
        self.transport.base_url()
    }

    pub async fn get(&self, path: &str, config: Option<RequestConfig>) -> Result<Response> {
        self.dispatch(Method::GET, path, None, config).await
    }

    /// `data` is an already-serialized request body
    pub async fn post(
        &self,
        path: &str,
        data: String,
        config: Option<RequestConfig>,
    ) -> Result<Response> {
        self.dispatch(Method::POST, path, Some(data), config).await
    }

    /// `data` is an already-serialized request body
    pub async fn put(
        &self,
        path: &str,
        data: String,
        config: Option<RequestConfig>,
    ) -> Result<Response> {
        self.dispatch(Method::PUT, path, Some(data), config).await
    }

    pub async fn delete(&self, path: &str, config: Option<RequestConfig>) -> Result<Response> {
        self.dispatch(Method::DELETE, path, None, config).await
    }

    async fn dispatch(
        &self,
        method: Method,
        path: &str,
        body: Option<String>,
        config: Option<RequestConfig>,
    ) -> Result<Response> {
        let header = self.tokens.ensure_valid_token().await?;
        let config = merge_config(config.as_ref(), &header);

        Ok(self.transport.send(method, path, body, config).await?)
    }
}
