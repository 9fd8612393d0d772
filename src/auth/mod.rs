// Authentication module
// Manages the OAuth2 token lifecycle against the Elation token endpoint

mod types;
mod credentials;
mod grant;
mod manager;

pub use credentials::basic_auth_header;
pub use grant::{refresh_grant_body, TOKEN_PATH};
pub use manager::TokenManager;
pub use types::{Credentials, ExpiresIn, GrantType, TokenResponse, TokenState};
