//! Official groups.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};

use super::{ExistenceReport, ModuleContext, ModuleError, ProvisioningModule, description};
use crate::index::{InstalledIndex, InstalledItems};
use crate::manifest::ItemSpec;
use crate::platform::Assignment;
use crate::progress::ProgressReporter;
use crate::types::ObjectKind;

/// Manifest flag adding the acting user to the group.
pub const ASSIGN_TO_SELF: &str = "assignToSelf";

#[derive(Debug, Clone)]
pub struct GroupModule {
    context: Arc<ModuleContext>,
}

impl GroupModule {
    pub fn new(context: Arc<ModuleContext>) -> Self {
        Self { context }
    }
}

fn group_body(item: &ItemSpec, name: String) -> Value {
    json!({
        "name": name,
        "description": description(item),
        "type": "official",
        "visibility": "public",
        "rulesVisible": true,
    })
}

#[async_trait]
impl ProvisioningModule for GroupModule {
    fn kind(&self) -> ObjectKind {
        ObjectKind::Group
    }

    async fn check_existing(&self) -> Result<ExistenceReport, ModuleError> {
        self.context.search_report(ObjectKind::Group).await
    }

    async fn create(
        &self,
        progress: &dyn ProgressReporter,
        items: &[ItemSpec],
    ) -> Result<InstalledItems, ModuleError> {
        self.context
            .create_items(progress, ObjectKind::Group, items, group_body)
            .await
    }

    async fn configure(
        &self,
        progress: &dyn ProgressReporter,
        index: &InstalledIndex,
        acting_user_id: &str,
    ) -> Result<(), ModuleError> {
        let joined = self
            .context
            .items(ObjectKind::Group)
            .iter()
            .filter(|item| item.property_bool(ASSIGN_TO_SELF));

        for item in joined {
            let group_id = self.context.resolve(index, ObjectKind::Group, &item.name)?;
            progress.report(&format!("Adding you to group {}", item.name));
            self.context
                .platform
                .assign(&Assignment::UsersToGroup {
                    group_id,
                    user_ids: vec![acting_user_id.to_string()],
                })
                .await?;
        }
        Ok(())
    }

    async fn remove(&self, progress: &dyn ProgressReporter) -> Result<(), ModuleError> {
        self.context.remove_owned(progress, ObjectKind::Group).await
    }
}
