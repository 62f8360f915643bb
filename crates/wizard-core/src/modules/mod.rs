//! Provisioning modules, one per object kind.
//!
//! Every module exposes the same four operations:
//! - existence check against the naming prefix
//! - create every manifest item of its kind
//! - configure cross-object wiring once everything exists
//! - remove everything carrying the naming prefix
//!
//! Modules keep no state between calls. Objects are found on the platform
//! by name prefix, never through the index of a previous run.

pub mod app_instance;
pub mod data_table;
pub mod group;
pub mod oauth_client;
pub mod registry;
pub mod role;

use std::sync::Arc;

use async_trait::async_trait;
use futures::future::try_join_all;
use serde_json::Value;

use crate::index::{InstalledIndex, InstalledItems};
use crate::manifest::{ItemSpec, Manifest};
use crate::platform::{ObjectSummary, ObjectType, PlatformApi, PlatformError, list_all};
use crate::progress::ProgressReporter;
use crate::types::ObjectKind;

pub use app_instance::AppInstanceModule;
pub use data_table::DataTableModule;
pub use group::GroupModule;
pub use oauth_client::OAuthClientModule;
pub use registry::{ActiveModules, ModuleRegistry, filter_modules};
pub use role::RoleModule;

#[derive(Debug, thiserror::Error)]
pub enum ModuleError {
    #[error(transparent)]
    Platform(#[from] PlatformError),

    #[error("{kind} '{name}' is referenced but was not installed")]
    MissingReference { kind: ObjectKind, name: String },
}

/// Result of an existence check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExistenceReport {
    /// Search-style result carrying only a count.
    Search { total: u64 },
    /// Plain listing of matching objects.
    Listing(Vec<ObjectSummary>),
}

impl ExistenceReport {
    pub fn is_present(&self) -> bool {
        match self {
            ExistenceReport::Search { total } => *total > 0,
            ExistenceReport::Listing(objects) => !objects.is_empty(),
        }
    }
}

/// Uniform contract over object kinds.
#[async_trait]
pub trait ProvisioningModule: Send + Sync {
    /// Provisioning key this module serves.
    fn kind(&self) -> ObjectKind;

    /// Objects of this kind carrying the naming prefix. None found is an
    /// empty report, not an error.
    async fn check_existing(&self) -> Result<ExistenceReport, ModuleError>;

    /// Create every item, returning item name to installed object. Items
    /// created before a failure stay on the platform.
    async fn create(
        &self,
        progress: &dyn ProgressReporter,
        items: &[ItemSpec],
    ) -> Result<InstalledItems, ModuleError>;

    /// Wire objects together once every create settled.
    async fn configure(
        &self,
        progress: &dyn ProgressReporter,
        index: &InstalledIndex,
        acting_user_id: &str,
    ) -> Result<(), ModuleError>;

    /// Delete every object of this kind carrying the naming prefix. Objects
    /// that are already gone count as removed.
    async fn remove(&self, progress: &dyn ProgressReporter) -> Result<(), ModuleError>;
}

/// Read-only inputs shared by every module.
#[derive(Clone)]
pub struct ModuleContext {
    pub platform: Arc<dyn PlatformApi>,
    pub manifest: Arc<Manifest>,
    /// Prepended to every created object name.
    pub prefix: String,
    pub page_size: u32,
    /// Substituted for `{{pcLangTag}}` in app URLs.
    pub language: String,
    /// Substituted for `{{pcEnvironment}}` in app URLs.
    pub environment: String,
}

impl std::fmt::Debug for ModuleContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModuleContext")
            .field("prefix", &self.prefix)
            .field("page_size", &self.page_size)
            .field("language", &self.language)
            .field("environment", &self.environment)
            .finish_non_exhaustive()
    }
}

impl ModuleContext {
    pub fn new(platform: Arc<dyn PlatformApi>, manifest: Arc<Manifest>, prefix: &str) -> Self {
        Self {
            platform,
            manifest,
            prefix: prefix.to_string(),
            page_size: 100,
            language: "en-us".to_string(),
            environment: "mypurecloud.com".to_string(),
        }
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_locale(mut self, language: &str, environment: &str) -> Self {
        self.language = language.to_string();
        self.environment = environment.to_string();
        self
    }

    /// Name of the platform object for a manifest item.
    pub fn platform_name(&self, item_name: &str) -> String {
        format!("{}{}", self.prefix, item_name)
    }

    /// Objects of `object_type` carrying the naming prefix.
    pub async fn owned_objects(
        &self,
        object_type: ObjectType,
    ) -> Result<Vec<crate::platform::InstalledObject>, PlatformError> {
        list_all(
            self.platform.as_ref(),
            object_type,
            Some(&self.prefix),
            self.page_size,
        )
        .await
    }

    pub async fn search_report(&self, kind: ObjectKind) -> Result<ExistenceReport, ModuleError> {
        let objects = self.owned_objects(kind.into()).await?;
        Ok(ExistenceReport::Search {
            total: objects.len() as u64,
        })
    }

    pub async fn listing_report(&self, kind: ObjectKind) -> Result<ExistenceReport, ModuleError> {
        let objects = self.owned_objects(kind.into()).await?;
        Ok(ExistenceReport::Listing(
            objects.iter().map(|object| object.summary()).collect(),
        ))
    }

    /// Create every item concurrently with the body `build` returns.
    pub async fn create_items<F>(
        &self,
        progress: &dyn ProgressReporter,
        kind: ObjectKind,
        items: &[ItemSpec],
        build: F,
    ) -> Result<InstalledItems, ModuleError>
    where
        F: Fn(&ItemSpec, String) -> Value + Send + Sync,
    {
        let creates = items.iter().map(|item| {
            let name = self.platform_name(&item.name);
            let body = build(item, name.clone());
            async move {
                progress.report(&format!("Creating {} {}", kind.label(), name));
                let object = self.platform.create(kind.into(), body).await?;
                tracing::debug!(kind = %kind, item = %item.name, id = %object.id, "created");
                Ok::<_, ModuleError>((item.name.clone(), object))
            }
        });

        Ok(try_join_all(creates).await?.into_iter().collect())
    }

    /// Delete every owned object of `kind`.
    pub async fn remove_owned(
        &self,
        progress: &dyn ProgressReporter,
        kind: ObjectKind,
    ) -> Result<(), ModuleError> {
        let object_type: ObjectType = kind.into();
        let objects = self.owned_objects(object_type).await?;

        for object in objects {
            progress.report(&format!("Removing {} {}", kind.label(), object.name));
            match self.platform.delete(object_type, &object.id).await {
                Ok(()) => {}
                Err(err) if err.is_not_found() => {
                    tracing::debug!(kind = %kind, id = %object.id, "already removed");
                }
                Err(err) => return Err(err.into()),
            }
        }
        Ok(())
    }

    /// Manifest items this module configures.
    pub fn items(&self, kind: ObjectKind) -> &[ItemSpec] {
        self.manifest.items_for(kind)
    }

    /// Id of an object installed in this run.
    pub fn resolve(
        &self,
        index: &InstalledIndex,
        kind: ObjectKind,
        name: &str,
    ) -> Result<String, ModuleError> {
        index
            .id_of(kind, name)
            .map(str::to_string)
            .ok_or_else(|| ModuleError::MissingReference {
                kind,
                name: name.to_string(),
            })
    }
}

/// Closed set of modules the wizard ships.
#[derive(Debug)]
pub enum PlatformModule {
    Role(RoleModule),
    Group(GroupModule),
    AppInstance(AppInstanceModule),
    OAuthClient(OAuthClientModule),
    DataTable(DataTableModule),
}

impl PlatformModule {
    pub fn for_kind(kind: ObjectKind, context: Arc<ModuleContext>) -> Self {
        match kind {
            ObjectKind::Role => PlatformModule::Role(RoleModule::new(context)),
            ObjectKind::Group => PlatformModule::Group(GroupModule::new(context)),
            ObjectKind::AppInstance => {
                PlatformModule::AppInstance(AppInstanceModule::new(context))
            }
            ObjectKind::OAuthClient => {
                PlatformModule::OAuthClient(OAuthClientModule::new(context))
            }
            ObjectKind::DataTable => PlatformModule::DataTable(DataTableModule::new(context)),
        }
    }

    fn inner(&self) -> &dyn ProvisioningModule {
        match self {
            PlatformModule::Role(module) => module,
            PlatformModule::Group(module) => module,
            PlatformModule::AppInstance(module) => module,
            PlatformModule::OAuthClient(module) => module,
            PlatformModule::DataTable(module) => module,
        }
    }
}

#[async_trait]
impl ProvisioningModule for PlatformModule {
    fn kind(&self) -> ObjectKind {
        self.inner().kind()
    }

    async fn check_existing(&self) -> Result<ExistenceReport, ModuleError> {
        self.inner().check_existing().await
    }

    async fn create(
        &self,
        progress: &dyn ProgressReporter,
        items: &[ItemSpec],
    ) -> Result<InstalledItems, ModuleError> {
        self.inner().create(progress, items).await
    }

    async fn configure(
        &self,
        progress: &dyn ProgressReporter,
        index: &InstalledIndex,
        acting_user_id: &str,
    ) -> Result<(), ModuleError> {
        self.inner().configure(progress, index, acting_user_id).await
    }

    async fn remove(&self, progress: &dyn ProgressReporter) -> Result<(), ModuleError> {
        self.inner().remove(progress).await
    }
}

/// Text for a string property, or empty.
pub(crate) fn description(item: &ItemSpec) -> Value {
    Value::String(item.property_str("description").unwrap_or_default().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::{InstalledObject, MemoryPlatform};

    fn context(platform: Arc<MemoryPlatform>) -> ModuleContext {
        ModuleContext::new(platform, Arc::new(Manifest::new()), "APP_").with_page_size(2)
    }

    #[test]
    fn test_existence_report_presence() {
        assert!(ExistenceReport::Search { total: 3 }.is_present());
        assert!(!ExistenceReport::Search { total: 0 }.is_present());
        assert!(!ExistenceReport::Listing(Vec::new()).is_present());
    }

    #[tokio::test]
    async fn test_owned_objects_match_prefix_across_pages() {
        let platform = Arc::new(MemoryPlatform::default());
        for (id, name) in [("g1", "APP_Users"), ("g2", "Other"), ("g3", "APP_Supervisors")] {
            platform.seed(ObjectType::Group, InstalledObject::new(id, name));
        }

        let report = context(platform).search_report(ObjectKind::Group).await.unwrap();
        assert_eq!(report, ExistenceReport::Search { total: 2 });
    }

    #[tokio::test]
    async fn test_remove_owned_leaves_foreign_objects() {
        let platform = Arc::new(MemoryPlatform::default());
        platform.seed(ObjectType::Role, InstalledObject::new("r1", "APP_Role"));
        platform.seed(ObjectType::Role, InstalledObject::new("r2", "Admin"));

        let progress = |_: &str| {};
        context(platform.clone())
            .remove_owned(&progress, ObjectKind::Role)
            .await
            .unwrap();

        let names: Vec<_> = platform
            .objects(ObjectType::Role)
            .into_iter()
            .map(|object| object.name)
            .collect();
        assert_eq!(names, vec!["Admin"]);
    }

    #[test]
    fn test_resolve_missing_reference() {
        let ctx = context(Arc::new(MemoryPlatform::default()));
        let err = ctx
            .resolve(&InstalledIndex::new(), ObjectKind::Role, "Role")
            .unwrap_err();
        assert!(matches!(err, ModuleError::MissingReference { .. }));
    }
}
