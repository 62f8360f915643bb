//! The wizard's user-facing steps.
//!
//! A session runs the same sequence the hosted wizard pages do: landing
//! status, custom setup with the account backend, install, finish. It also
//! offers uninstall. Emails go out through the account backend along the
//! way, and state shared between steps lives in the session store.

use std::sync::Arc;

use anyhow::Context;
use chrono::{Local, Months, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::backend::{
    AccountBackend, AccountProvisioning, AccountRequest, Credentials, EmailNotifier, Notifier,
};
use crate::config::{Locale, WizardConfig};
use crate::error::ProvisionError;
use crate::index::SimplifiedIndex;
use crate::manifest::Manifest;
use crate::modules::{ModuleContext, ModuleRegistry};
use crate::orchestrator::{FinalizeEnv, Orchestrator, RunContext, UninstallReport};
use crate::platform::{InstalledObject, ObjectType, PlatformApi, PlatformUser, list_all};
use crate::progress::ProgressReporter;
use crate::storage::{SessionStore, StorageKey};

pub const STARTED_SUBJECT: &str = "PureCloud signup process started";
pub const FINISHED_SUBJECT: &str = "PureCloud signup process finished.";
pub const FAILED_SUBJECT: &str = "PureCloud signup process failed";

/// Role a user needs to install the premium app.
pub const REQUIRED_ROLE: &str = "employee";

/// What the landing step found.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "kebab-case")]
pub enum EntryState {
    /// Objects with the naming prefix exist; the user goes to the app.
    AlreadyInstalled { url: String },
    ReadyToInstall { previous_attempt_failed: bool },
    ProductUnavailable { reason: UnavailableReason },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum UnavailableReason {
    /// The org has no integration type for the app.
    NotEnabled,
    /// The acting user lacks the required role.
    MissingRole,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntryStatus {
    pub user: PlatformUser,
    pub state: EntryState,
}

/// Granularity unit of the data-source sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GranularityUnit {
    #[serde(rename = "H")]
    Hours,
    #[serde(rename = "M")]
    Minutes,
}

impl GranularityUnit {
    pub fn designator(&self) -> char {
        match self {
            GranularityUnit::Hours => 'H',
            GranularityUnit::Minutes => 'M',
        }
    }

    pub fn from_designator(value: &str) -> Option<Self> {
        match value.trim().to_ascii_uppercase().as_str() {
            "H" => Some(GranularityUnit::Hours),
            "M" => Some(GranularityUnit::Minutes),
            _ => None,
        }
    }
}

/// Values collected on the custom setup step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SetupForm {
    pub primary_auth_method: String,
    pub secondary_auth_methods: Vec<String>,
    /// Start of the first sync.
    pub sync_time: NaiveDateTime,
    /// Minutes between fetches.
    pub fetch_interval: u32,
    pub granularity_value: u32,
    pub granularity_unit: GranularityUnit,
}

impl Default for SetupForm {
    fn default() -> Self {
        let now = Local::now().naive_local();
        Self {
            primary_auth_method: "pure_cloud".to_string(),
            secondary_auth_methods: Vec::new(),
            sync_time: now.checked_sub_months(Months::new(12)).unwrap_or(now),
            fetch_interval: 30,
            granularity_value: 12,
            granularity_unit: GranularityUnit::Hours,
        }
    }
}

impl SetupForm {
    /// ISO 8601 duration such as `PT12H`.
    pub fn granularity(&self) -> String {
        format!(
            "PT{}{}",
            self.granularity_value,
            self.granularity_unit.designator()
        )
    }

    pub fn authentication_properties(&self) -> Map<String, Value> {
        let secondary = self
            .secondary_auth_methods
            .iter()
            .map(|method| method.to_lowercase())
            .collect::<Vec<_>>()
            .join("-");

        let mut properties = Map::new();
        properties.insert(
            "primary_auth_method".to_string(),
            json!(self.primary_auth_method),
        );
        properties.insert("secondary_auth_method".to_string(), json!(secondary));
        properties
    }

    pub fn data_source_properties(&self) -> Map<String, Value> {
        let mut properties = Map::new();
        properties.insert(
            "sync_time".to_string(),
            json!(self.sync_time.format("%Y-%m-%dT%H:%M").to_string()),
        );
        properties.insert(
            "fetch_interval".to_string(),
            json!(self.fetch_interval.to_string()),
        );
        properties.insert("granularity".to_string(), json!(self.granularity()));
        properties
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InstallOutcome {
    pub installed: SimplifiedIndex,
    pub finalized: usize,
    pub portal_address: Option<String>,
    /// Whether the premium app integration now points at the portal.
    pub integration_updated: bool,
}

/// One user's pass through the wizard.
pub struct WizardSession {
    config: WizardConfig,
    locale: Locale,
    manifest: Arc<Manifest>,
    platform: Arc<dyn PlatformApi>,
    backend: Arc<dyn AccountBackend>,
    store: SessionStore,
    access_token: String,
    notifier: Arc<dyn Notifier>,
}

impl WizardSession {
    pub fn new(
        config: WizardConfig,
        locale: Locale,
        manifest: Arc<Manifest>,
        platform: Arc<dyn PlatformApi>,
        backend: Arc<dyn AccountBackend>,
        store: SessionStore,
        access_token: impl Into<String>,
    ) -> Self {
        let access_token = access_token.into();
        let notifier = Arc::new(EmailNotifier::new(
            backend.clone(),
            Credentials {
                base_path: platform.base_path().to_string(),
                access_token: access_token.clone(),
            },
        ));
        Self {
            config,
            locale,
            manifest,
            platform,
            backend,
            store,
            access_token,
            notifier,
        }
    }

    pub fn config(&self) -> &WizardConfig {
        &self.config
    }

    pub fn locale(&self) -> &Locale {
        &self.locale
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    /// Orchestrator over the platform modules for this session's manifest.
    pub fn orchestrator(&self) -> Orchestrator {
        let context = ModuleContext::new(
            self.platform.clone(),
            self.manifest.clone(),
            &self.config.prefix,
        )
        .with_page_size(self.config.page_size)
        .with_locale(&self.locale.language, &self.locale.environment);
        Orchestrator::new(
            self.manifest.clone(),
            ModuleRegistry::with_platform_modules(Arc::new(context)),
        )
    }

    /// Landing step.
    pub async fn status(&self) -> anyhow::Result<EntryStatus> {
        let user = self
            .platform
            .current_user()
            .await
            .context("Failed to fetch the current user")?;
        self.notifier
            .notify(
                STARTED_SUBJECT,
                &format!(
                    "User with email {} just started signup process on PureCloud.",
                    user_email(&user)
                ),
            )
            .await;

        let state = if !self.product_available().await? {
            EntryState::ProductUnavailable {
                reason: UnavailableReason::NotEnabled,
            }
        } else if !self.has_required_role(&user).await? {
            EntryState::ProductUnavailable {
                reason: UnavailableReason::MissingRole,
            }
        } else if self.orchestrator().check_existing().await {
            let url = self
                .store
                .get(StorageKey::PortalAddress)?
                .unwrap_or_else(|| self.config.premium_app_url.clone());
            EntryState::AlreadyInstalled { url }
        } else {
            EntryState::ReadyToInstall {
                previous_attempt_failed: self.store.flag(StorageKey::LastAttemptFailed)?,
            }
        };

        tracing::info!(?state, "landing status");
        Ok(EntryStatus { user, state })
    }

    /// The org has an integration type named after the app.
    pub async fn product_available(&self) -> anyhow::Result<bool> {
        let types = list_all(
            self.platform.as_ref(),
            ObjectType::IntegrationType,
            None,
            self.config.page_size,
        )
        .await
        .context("Failed to list integration types")?;
        Ok(types.iter().any(|kind| kind.id == self.config.app_name))
    }

    /// When the org defines no such role the check passes.
    async fn has_required_role(&self, user: &PlatformUser) -> anyhow::Result<bool> {
        let roles = list_all(
            self.platform.as_ref(),
            ObjectType::Role,
            Some(REQUIRED_ROLE),
            self.config.page_size,
        )
        .await
        .context("Failed to look up roles")?;

        let Some(role) = roles.iter().find(|role| role.name == REQUIRED_ROLE) else {
            tracing::debug!(role = REQUIRED_ROLE, "role not defined in org, skipping check");
            return Ok(true);
        };
        Ok(user.roles.iter().any(|granted| granted.id == role.id))
    }

    /// Custom setup step: create the backend account.
    pub async fn custom_setup(&self, form: &SetupForm) -> anyhow::Result<AccountProvisioning> {
        let authentication = form.authentication_properties();
        self.store
            .set_json(StorageKey::DataSourceProperties, &form.data_source_properties())?;
        self.store
            .set_json(StorageKey::AuthenticationProperties, &authentication)?;
        self.store
            .set(StorageKey::PlatformBasePath, self.platform.base_path())?;

        let request = AccountRequest {
            base_path: self.platform.base_path().to_string(),
            access_token: self.access_token.clone(),
            authentication,
        };

        match self.backend.create_account(&request).await {
            Ok(provisioning) => {
                let portal = format!("https://{}", provisioning.portal_address);
                self.store.set(StorageKey::PortalAddress, &portal)?;
                self.store.set(StorageKey::SessionKey, &provisioning.key)?;
                self.store.set_flag(StorageKey::LastAttemptFailed, false)?;
                tracing::info!(portal = %portal, "backend account created");
                Ok(provisioning)
            }
            Err(err) => {
                self.notify_failure("custom setup", &err.to_string()).await;
                self.store.set_flag(StorageKey::LastAttemptFailed, true)?;
                Err(anyhow::Error::new(err).context("Failed to create the backend account"))
            }
        }
    }

    /// Install step.
    pub async fn install(&self, progress: &dyn ProgressReporter) -> anyhow::Result<InstallOutcome> {
        let user = self
            .platform
            .current_user()
            .await
            .context("Failed to fetch the current user")?;

        let finalize = FinalizeEnv::new(
            self.backend.clone(),
            self.store.clone(),
            self.platform.clone(),
        );
        let run = RunContext {
            progress,
            notifier: self.notifier.as_ref(),
            acting_user_id: &user.id,
            finalize: &finalize,
        };

        let mut orchestrator = self.orchestrator();
        let report = match orchestrator.install(&run).await {
            Ok(report) => report,
            Err(err) => return Err(self.handle_install_failure(progress, err).await),
        };

        let portal_address = self.store.get(StorageKey::PortalAddress)?;
        let integration_updated = match &portal_address {
            Some(portal) => self.point_app_integration(portal).await?,
            None => {
                tracing::warn!("no portal address stored, premium app integration left as is");
                false
            }
        };

        self.store.set_flag(StorageKey::LastAttemptFailed, false)?;
        self.notifier
            .notify(
                FINISHED_SUBJECT,
                &format!(
                    "User with email {} just finished signup process on PureCloud.",
                    user_email(&user)
                ),
            )
            .await;

        Ok(InstallOutcome {
            installed: report.simplified(),
            finalized: report.finalized,
            portal_address,
            integration_updated,
        })
    }

    async fn handle_install_failure(
        &self,
        progress: &dyn ProgressReporter,
        err: ProvisionError,
    ) -> anyhow::Error {
        // Finalize steps send their own failure email.
        if !matches!(err, ProvisionError::Finalize { .. }) {
            let step = err.phase().map(|phase| phase.to_string()).unwrap_or_default();
            self.notify_failure(&step, &err.to_string()).await;
        }

        if let Err(flag_err) = self.store.set_flag(StorageKey::LastAttemptFailed, true) {
            tracing::warn!(error = %flag_err, "failed to remember the failed attempt");
        }

        if self.config.uninstall_on_failure {
            progress.report("Install failed, removing what was created...");
            match self.uninstall(progress).await {
                Ok(report) if !report.is_clean() => {
                    tracing::warn!(failures = report.failures.len(), "rollback left objects behind");
                }
                Ok(_) => {}
                Err(rollback_err) => {
                    tracing::warn!(error = %rollback_err, "rollback failed");
                }
            }
        }

        anyhow::Error::new(err).context("Install failed")
    }

    /// Remove everything the wizard created and point the premium app
    /// integration back at the app's landing page.
    pub async fn uninstall(&self, progress: &dyn ProgressReporter) -> anyhow::Result<UninstallReport> {
        let report = self.orchestrator().uninstall(progress).await;
        self.point_app_integration(&self.config.premium_app_url)
            .await?;
        Ok(report)
    }

    /// Where the user goes once installation is complete.
    pub fn finish(&self) -> anyhow::Result<String> {
        self.store.require(StorageKey::PortalAddress)
    }

    /// Set the URL of the premium app integration. Returns false when the
    /// org has no such integration.
    async fn point_app_integration(&self, url: &str) -> anyhow::Result<bool> {
        let Some(integration) = self.find_app_integration().await? else {
            tracing::warn!(app = %self.config.app_name, "premium app integration not found");
            return Ok(false);
        };

        self.platform
            .update(
                ObjectType::Integration,
                &integration.id,
                json!({ "properties": { "url": url } }),
            )
            .await
            .with_context(|| format!("Failed to update integration {}", integration.id))?;
        tracing::info!(integration = %integration.id, %url, "premium app integration updated");
        Ok(true)
    }

    async fn find_app_integration(&self) -> anyhow::Result<Option<InstalledObject>> {
        let integrations = list_all(
            self.platform.as_ref(),
            ObjectType::Integration,
            None,
            self.config.page_size,
        )
        .await
        .context("Failed to list integrations")?;

        Ok(integrations.into_iter().find(|integration| {
            integration
                .field("integrationType")
                .and_then(|kind| kind.get("id"))
                .and_then(Value::as_str)
                == Some(self.config.app_name.as_str())
        }))
    }

    async fn notify_failure(&self, step: &str, error: &str) {
        self.notifier
            .notify(
                FAILED_SUBJECT,
                &format!("PureCloud signup process failed at step '{step}' with error:\n{error}"),
            )
            .await;
    }
}

fn user_email(user: &PlatformUser) -> &str {
    user.email.as_deref().unwrap_or(&user.name)
}
