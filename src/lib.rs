// Elation Client - Library root

pub mod auth;
pub mod client;
pub mod config;
pub mod elation;
pub mod error;
pub mod http_client;
pub mod resources;

pub use auth::{Credentials, TokenManager, TokenState};
pub use client::ApiClient;
pub use elation::Elation;
pub use error::{ApiError, GrantError, TransportError};
pub use http_client::{merge_config, RequestConfig, Transport};
