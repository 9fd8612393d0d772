// Entry point tying the authenticated client to the resource modules

use std::sync::Arc;

use crate::auth::Credentials;
use crate::client::ApiClient;
use crate::config::Config;
use crate::error::ApiError;
use crate::resources::{Notes, Patients};

/// Elation API handle
pub struct Elation {
    client: Arc<ApiClient>,
}

impl Elation {
    /// Create a handle; `sandbox` selects the sandbox deployment
    pub fn new(credentials: Credentials, sandbox: bool) -> Result<Self, ApiError> {
        Ok(Self::from_client(ApiClient::new(credentials, sandbox)?))
    }

    /// Shorthand for a sandbox handle
    pub fn sandbox(credentials: Credentials) -> Result<Self, ApiError> {
        Self::new(credentials, true)
    }

    pub fn from_config(config: &Config) -> Result<Self, ApiError> {
        Ok(Self::from_client(ApiClient::from_config(config)?))
    }

    pub fn from_client(client: ApiClient) -> Self {
        Self {
            client: Arc::new(client),
        }
    }

    /// Acquire the first token pair; must complete before any resource call
    pub async fn initialize(&self) -> Result<(), ApiError> {
        self.client.initialize().await
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    pub fn patients(&self) -> Patients {
        Patients::new(self.client.clone())
    }

    pub fn notes(&self) -> Notes {
        Notes::new(self.client.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PRODUCTION_BASE_URL, SANDBOX_BASE_URL};

    #[test]
    fn test_sandbox_shorthand_targets_sandbox() {
        let creds = Credentials::new("c", "s", "u", "p");

        let elation = Elation::sandbox(creds.clone()).unwrap();
        assert_eq!(elation.client().base_url(), SANDBOX_BASE_URL);

        let elation = Elation::new(creds, false).unwrap();
        assert_eq!(elation.client().base_url(), PRODUCTION_BASE_URL);
    }
}
