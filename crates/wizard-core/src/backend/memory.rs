//! In-process account backend used by tests and dry runs.

use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use super::{
    AccountBackend, AccountProvisioning, AccountRequest, BackendError, ClientCredentialsUpdate,
    EmailRequest,
};

#[derive(Debug, Default)]
struct Recorded {
    accounts: Vec<AccountRequest>,
    client_updates: Vec<ClientCredentialsUpdate>,
    emails: Vec<EmailRequest>,
    fail_accounts: bool,
    fail_client_updates: bool,
    fail_emails: bool,
}

/// Records every call. Every created account gets the configured portal
/// address and the key `memory-key`.
#[derive(Debug)]
pub struct MemoryBackend {
    portal_address: String,
    recorded: Mutex<Recorded>,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::with_portal("portal.example.com")
    }
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_portal(portal_address: impl Into<String>) -> Self {
        Self {
            portal_address: portal_address.into(),
            recorded: Mutex::new(Recorded::default()),
        }
    }

    fn recorded(&self) -> MutexGuard<'_, Recorded> {
        self.recorded.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn fail_accounts(&self) {
        self.recorded().fail_accounts = true;
    }

    pub fn fail_client_updates(&self) {
        self.recorded().fail_client_updates = true;
    }

    pub fn fail_emails(&self) {
        self.recorded().fail_emails = true;
    }

    pub fn accounts(&self) -> Vec<AccountRequest> {
        self.recorded().accounts.clone()
    }

    pub fn client_updates(&self) -> Vec<ClientCredentialsUpdate> {
        self.recorded().client_updates.clone()
    }

    pub fn emails(&self) -> Vec<EmailRequest> {
        self.recorded().emails.clone()
    }

    pub fn email_subjects(&self) -> Vec<String> {
        self.recorded()
            .emails
            .iter()
            .map(|email| email.subject.clone())
            .collect()
    }
}

fn rejected(body: &str) -> BackendError {
    BackendError::Rejected {
        status: 500,
        body: body.to_string(),
    }
}

#[async_trait]
impl AccountBackend for MemoryBackend {
    async fn create_account(
        &self,
        request: &AccountRequest,
    ) -> Result<AccountProvisioning, BackendError> {
        let mut recorded = self.recorded();
        if recorded.fail_accounts {
            return Err(rejected("account creation failed"));
        }
        recorded.accounts.push(request.clone());
        Ok(AccountProvisioning {
            portal_address: self.portal_address.clone(),
            key: "memory-key".to_string(),
        })
    }

    async fn update_client_credentials(
        &self,
        update: &ClientCredentialsUpdate,
    ) -> Result<(), BackendError> {
        let mut recorded = self.recorded();
        if recorded.fail_client_updates {
            return Err(rejected("client update failed"));
        }
        recorded.client_updates.push(update.clone());
        Ok(())
    }

    async fn send_email(&self, email: &EmailRequest) -> Result<(), BackendError> {
        let mut recorded = self.recorded();
        if recorded.fail_emails {
            return Err(rejected("email failed"));
        }
        recorded.emails.push(email.clone());
        Ok(())
    }
}
