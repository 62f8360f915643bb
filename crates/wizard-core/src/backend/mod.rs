//! Account backend of the premium app.
//!
//! The backend creates the customer account before anything is
//! provisioned, receives the OAuth client credentials afterwards and relays
//! notification emails.

pub mod http;
pub mod memory;

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub use http::HttpBackend;
pub use memory::MemoryBackend;

/// Platform credentials of the acting user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub base_path: String,
    pub access_token: String,
}

/// Account creation request. Authentication properties are sent inline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountRequest {
    pub base_path: String,
    pub access_token: String,
    #[serde(flatten)]
    pub authentication: Map<String, Value>,
}

/// What the backend hands back for a new account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountProvisioning {
    /// Host name of the customer portal, without scheme.
    pub portal_address: String,
    /// Session key identifying the account in later calls.
    pub key: String,
}

/// OAuth client credentials for the backend. Data-source properties from
/// custom setup are sent inline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientCredentialsUpdate {
    pub client_id: String,
    pub secret: String,
    pub base_path: String,
    pub key: String,
    pub is_social_app_update: bool,
    #[serde(flatten)]
    pub data_source: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailRequest {
    pub base_path: String,
    pub access_token: String,
    pub body: String,
    pub subject: String,
}

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("backend request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("backend rejected the request (HTTP {status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("invalid backend URL: {0}")]
    Url(#[from] url::ParseError),
}

#[async_trait]
pub trait AccountBackend: Send + Sync {
    async fn create_account(
        &self,
        request: &AccountRequest,
    ) -> Result<AccountProvisioning, BackendError>;

    async fn update_client_credentials(
        &self,
        update: &ClientCredentialsUpdate,
    ) -> Result<(), BackendError>;

    async fn send_email(&self, email: &EmailRequest) -> Result<(), BackendError>;
}

/// Fire-and-forget notifications.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Never fails; delivery problems are only logged.
    async fn notify(&self, subject: &str, body: &str);
}

/// Sends notifications as emails through the account backend.
#[derive(Clone)]
pub struct EmailNotifier {
    backend: Arc<dyn AccountBackend>,
    credentials: Credentials,
}

impl EmailNotifier {
    pub fn new(backend: Arc<dyn AccountBackend>, credentials: Credentials) -> Self {
        Self {
            backend,
            credentials,
        }
    }
}

#[async_trait]
impl Notifier for EmailNotifier {
    async fn notify(&self, subject: &str, body: &str) {
        let email = EmailRequest {
            base_path: self.credentials.base_path.clone(),
            access_token: self.credentials.access_token.clone(),
            body: body.to_string(),
            subject: subject.to_string(),
        };
        match self.backend.send_email(&email).await {
            Ok(()) => tracing::debug!(%subject, "notification sent"),
            Err(err) => tracing::warn!(%subject, error = %err, "failed to send notification"),
        }
    }
}
