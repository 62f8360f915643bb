//! Architect data tables.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};

use super::{ExistenceReport, ModuleContext, ModuleError, ProvisioningModule, description};
use crate::index::{InstalledIndex, InstalledItems};
use crate::manifest::ItemSpec;
use crate::progress::ProgressReporter;
use crate::types::ObjectKind;

#[derive(Debug, Clone)]
pub struct DataTableModule {
    context: Arc<ModuleContext>,
}

impl DataTableModule {
    pub fn new(context: Arc<ModuleContext>) -> Self {
        Self { context }
    }
}

fn table_body(item: &ItemSpec, name: String) -> Value {
    let schema = item.property("schema").cloned().unwrap_or_else(|| {
        json!({
            "$schema": "http://json-schema.org/draft-04/schema#",
            "type": "object",
            "additionalProperties": false,
            "properties": { "key": { "title": "Key", "type": "string", "$id": "/properties/key" } },
            "required": ["key"],
        })
    });
    json!({
        "name": name,
        "description": description(item),
        "schema": schema,
    })
}

#[async_trait]
impl ProvisioningModule for DataTableModule {
    fn kind(&self) -> ObjectKind {
        ObjectKind::DataTable
    }

    async fn check_existing(&self) -> Result<ExistenceReport, ModuleError> {
        self.context.listing_report(ObjectKind::DataTable).await
    }

    async fn create(
        &self,
        progress: &dyn ProgressReporter,
        items: &[ItemSpec],
    ) -> Result<InstalledItems, ModuleError> {
        self.context
            .create_items(progress, ObjectKind::DataTable, items, table_body)
            .await
    }

    // Tables reference nothing else.
    async fn configure(
        &self,
        _progress: &dyn ProgressReporter,
        _index: &InstalledIndex,
        _acting_user_id: &str,
    ) -> Result<(), ModuleError> {
        Ok(())
    }

    async fn remove(&self, progress: &dyn ProgressReporter) -> Result<(), ModuleError> {
        self.context
            .remove_owned(progress, ObjectKind::DataTable)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::Manifest;
    use crate::platform::MemoryPlatform;

    #[tokio::test]
    async fn test_default_schema_has_key_column() {
        let platform = Arc::new(MemoryPlatform::default());
        let module = DataTableModule::new(Arc::new(ModuleContext::new(
            platform,
            Arc::new(Manifest::new()),
            "APP_",
        )));
        let progress = |_: &str| {};

        let created = module
            .create(&progress, &[ItemSpec::new("Lookup")])
            .await
            .unwrap();
        let table = &created["Lookup"];
        assert_eq!(table.name, "APP_Lookup");
        assert_eq!(table.field("schema").unwrap()["required"], json!(["key"]));
    }
}
