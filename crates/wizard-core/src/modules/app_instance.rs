//! Embedded client app integrations.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};

use super::{ExistenceReport, ModuleContext, ModuleError, ProvisioningModule};
use crate::index::{InstalledIndex, InstalledItems};
use crate::manifest::ItemSpec;
use crate::platform::ObjectType;
use crate::progress::ProgressReporter;
use crate::types::ObjectKind;

pub const INTEGRATION_TYPE: &str = "embedded-client-app";

const LANGUAGE_PLACEHOLDER: &str = "{{pcLangTag}}";
const ENVIRONMENT_PLACEHOLDER: &str = "{{pcEnvironment}}";
const SANDBOX: &str =
    "allow-forms,allow-modals,allow-popups,allow-presentation,allow-same-origin,allow-scripts";

/// Creates app integrations and points them at the rendered app URL.
#[derive(Debug, Clone)]
pub struct AppInstanceModule {
    context: Arc<ModuleContext>,
}

impl AppInstanceModule {
    pub fn new(context: Arc<ModuleContext>) -> Self {
        Self { context }
    }

    /// Substitute the locale placeholders in an app URL.
    pub fn render_url(&self, template: &str) -> String {
        template
            .replace(LANGUAGE_PLACEHOLDER, &self.context.language)
            .replace(ENVIRONMENT_PLACEHOLDER, &self.context.environment)
    }

    fn config_body(&self, item: &ItemSpec, group_ids: Vec<String>) -> Value {
        json!({
            "name": self.context.platform_name(&item.name),
            "properties": {
                "url": self.render_url(item.property_str("url").unwrap_or_default()),
                "displayType": item.property_str("type").unwrap_or("standalone"),
                "featureCategory": "",
                "sandbox": SANDBOX,
                "groups": group_ids,
            },
            "intendedState": "ENABLED",
        })
    }
}

fn integration_body(_item: &ItemSpec, name: String) -> Value {
    json!({
        "name": name,
        "integrationType": { "id": INTEGRATION_TYPE },
    })
}

#[async_trait]
impl ProvisioningModule for AppInstanceModule {
    fn kind(&self) -> ObjectKind {
        ObjectKind::AppInstance
    }

    async fn check_existing(&self) -> Result<ExistenceReport, ModuleError> {
        self.context.listing_report(ObjectKind::AppInstance).await
    }

    async fn create(
        &self,
        progress: &dyn ProgressReporter,
        items: &[ItemSpec],
    ) -> Result<InstalledItems, ModuleError> {
        self.context
            .create_items(progress, ObjectKind::AppInstance, items, integration_body)
            .await
    }

    async fn configure(
        &self,
        progress: &dyn ProgressReporter,
        index: &InstalledIndex,
        _acting_user_id: &str,
    ) -> Result<(), ModuleError> {
        for item in self.context.items(ObjectKind::AppInstance) {
            let instance_id = self
                .context
                .resolve(index, ObjectKind::AppInstance, &item.name)?;
            let group_ids = item
                .string_list("groups")
                .iter()
                .map(|group| self.context.resolve(index, ObjectKind::Group, group))
                .collect::<Result<Vec<_>, _>>()?;

            progress.report(&format!("Configuring app instance {}", item.name));
            self.context
                .platform
                .update(
                    ObjectType::Integration,
                    &instance_id,
                    self.config_body(item, group_ids),
                )
                .await?;
        }
        Ok(())
    }

    async fn remove(&self, progress: &dyn ProgressReporter) -> Result<(), ModuleError> {
        self.context
            .remove_owned(progress, ObjectKind::AppInstance)
            .await
    }
}
