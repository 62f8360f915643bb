//! JSON-over-HTTP account backend.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{RequestBuilder, Response};
use serde::Serialize;
use url::Url;

use super::{
    AccountBackend, AccountProvisioning, AccountRequest, BackendError, ClientCredentialsUpdate,
    EmailRequest,
};

const CREATE_ACCOUNT_PATH: &str = "/api/customers/genesys-create/";
const CLIENT_UPDATE_PATH: &str = "/api/customers/genesys-client-update/";
const SEND_EMAIL_PATH: &str = "/api/customers/genesys-send-email/";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpBackend {
    pub fn new(base_url: Url) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self { client, base_url })
    }

    fn post<T: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<RequestBuilder, BackendError> {
        let url = self.base_url.join(path)?;
        Ok(self
            .client
            .post(url)
            .header(reqwest::header::ACCEPT, "application/json")
            .json(body))
    }

    async fn send(request: RequestBuilder) -> Result<Response, BackendError> {
        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl AccountBackend for HttpBackend {
    async fn create_account(
        &self,
        request: &AccountRequest,
    ) -> Result<AccountProvisioning, BackendError> {
        tracing::debug!(base_path = %request.base_path, "creating backend account");
        let response = Self::send(self.post(CREATE_ACCOUNT_PATH, request)?).await?;
        Ok(response.json().await?)
    }

    async fn update_client_credentials(
        &self,
        update: &ClientCredentialsUpdate,
    ) -> Result<(), BackendError> {
        tracing::debug!(
            client_id = %update.client_id,
            social = update.is_social_app_update,
            "sending client credentials to backend"
        );
        Self::send(self.post(CLIENT_UPDATE_PATH, update)?).await?;
        Ok(())
    }

    async fn send_email(&self, email: &EmailRequest) -> Result<(), BackendError> {
        Self::send(self.post(SEND_EMAIL_PATH, email)?).await?;
        Ok(())
    }
}
