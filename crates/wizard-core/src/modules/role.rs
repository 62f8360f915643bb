//! Authorization roles.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};

use super::{ExistenceReport, ModuleContext, ModuleError, ProvisioningModule, description};
use crate::index::{InstalledIndex, InstalledItems};
use crate::manifest::ItemSpec;
use crate::platform::Assignment;
use crate::progress::ProgressReporter;
use crate::types::ObjectKind;

/// Creates roles with their permission policies and grants every created
/// role to the acting user.
#[derive(Debug, Clone)]
pub struct RoleModule {
    context: Arc<ModuleContext>,
}

impl RoleModule {
    pub fn new(context: Arc<ModuleContext>) -> Self {
        Self { context }
    }
}

fn role_body(item: &ItemSpec, name: String) -> Value {
    json!({
        "name": name,
        "description": description(item),
        "permissionPolicies": item
            .property("permissionPolicies")
            .cloned()
            .unwrap_or_else(|| json!([])),
    })
}

#[async_trait]
impl ProvisioningModule for RoleModule {
    fn kind(&self) -> ObjectKind {
        ObjectKind::Role
    }

    async fn check_existing(&self) -> Result<ExistenceReport, ModuleError> {
        self.context.search_report(ObjectKind::Role).await
    }

    async fn create(
        &self,
        progress: &dyn ProgressReporter,
        items: &[ItemSpec],
    ) -> Result<InstalledItems, ModuleError> {
        self.context
            .create_items(progress, ObjectKind::Role, items, role_body)
            .await
    }

    async fn configure(
        &self,
        progress: &dyn ProgressReporter,
        index: &InstalledIndex,
        acting_user_id: &str,
    ) -> Result<(), ModuleError> {
        let Some(roles) = index.get(ObjectKind::Role) else {
            return Ok(());
        };

        for role in roles.values() {
            progress.report(&format!("Assigning role {} to you", role.name));
            self.context
                .platform
                .assign(&Assignment::RoleToUsers {
                    role_id: role.id.clone(),
                    user_ids: vec![acting_user_id.to_string()],
                })
                .await?;
        }
        Ok(())
    }

    async fn remove(&self, progress: &dyn ProgressReporter) -> Result<(), ModuleError> {
        self.context.remove_owned(progress, ObjectKind::Role).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::Manifest;
    use crate::platform::{MemoryPlatform, ObjectType};

    #[tokio::test]
    async fn test_create_and_assign_roles() {
        let platform = Arc::new(MemoryPlatform::default());
        let context = Arc::new(ModuleContext::new(
            platform.clone(),
            Arc::new(Manifest::new()),
            "APP_",
        ));
        let module = RoleModule::new(context);
        let progress = |_: &str| {};

        let item = ItemSpec::new("Role")
            .with_property("description", json!("Generated role"))
            .with_property(
                "permissionPolicies",
                json!([{ "domain": "integration", "entityName": "examplePremiumApp" }]),
            );
        let created = module.create(&progress, &[item]).await.unwrap();
        let role = &created["Role"];
        assert_eq!(role.name, "APP_Role");
        assert_eq!(
            role.field("permissionPolicies").unwrap()[0]["domain"],
            "integration"
        );

        let mut index = InstalledIndex::new();
        index.insert(ObjectKind::Role, created.clone());
        module.configure(&progress, &index, "user-1").await.unwrap();

        assert_eq!(
            platform.assignments(),
            vec![Assignment::RoleToUsers {
                role_id: role.id.clone(),
                user_ids: vec!["user-1".to_string()],
            }]
        );
        assert_eq!(
            module.check_existing().await.unwrap(),
            ExistenceReport::Search { total: 1 }
        );

        module.remove(&progress).await.unwrap();
        assert!(platform.objects(ObjectType::Role).is_empty());
    }
}
