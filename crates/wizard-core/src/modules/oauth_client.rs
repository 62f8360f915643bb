//! OAuth clients.
//!
//! Clients are created first and receive their roles during configure,
//! once the roles they reference exist.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value, json};

use super::{ExistenceReport, ModuleContext, ModuleError, ProvisioningModule, description};
use crate::index::{InstalledIndex, InstalledItems};
use crate::manifest::{ItemSpec, REDIRECT_URIS_PROPERTY};
use crate::platform::ObjectType;
use crate::progress::ProgressReporter;
use crate::types::ObjectKind;

/// Every role is granted in all divisions.
const HOME_DIVISION: &str = "*";

#[derive(Debug, Clone)]
pub struct OAuthClientModule {
    context: Arc<ModuleContext>,
}

impl OAuthClientModule {
    pub fn new(context: Arc<ModuleContext>) -> Self {
        Self { context }
    }
}

fn client_body(item: &ItemSpec, name: String) -> Value {
    let mut body = Map::new();
    body.insert("name".to_string(), Value::String(name));
    body.insert("description".to_string(), description(item));
    body.insert(
        "authorizedGrantType".to_string(),
        json!(item.property_str("authorizedGrantType").unwrap_or("CLIENT_CREDENTIALS")),
    );
    for key in [REDIRECT_URIS_PROPERTY, "scope", "accessTokenValiditySeconds"] {
        if let Some(value) = item.property(key) {
            body.insert(key.to_string(), value.clone());
        }
    }
    Value::Object(body)
}

#[async_trait]
impl ProvisioningModule for OAuthClientModule {
    fn kind(&self) -> ObjectKind {
        ObjectKind::OAuthClient
    }

    async fn check_existing(&self) -> Result<ExistenceReport, ModuleError> {
        self.context.listing_report(ObjectKind::OAuthClient).await
    }

    async fn create(
        &self,
        progress: &dyn ProgressReporter,
        items: &[ItemSpec],
    ) -> Result<InstalledItems, ModuleError> {
        self.context
            .create_items(progress, ObjectKind::OAuthClient, items, client_body)
            .await
    }

    async fn configure(
        &self,
        progress: &dyn ProgressReporter,
        index: &InstalledIndex,
        _acting_user_id: &str,
    ) -> Result<(), ModuleError> {
        for item in self.context.items(ObjectKind::OAuthClient) {
            let roles = item.string_list("roles");
            if roles.is_empty() {
                continue;
            }

            let client_id = self
                .context
                .resolve(index, ObjectKind::OAuthClient, &item.name)?;
            let role_divisions = roles
                .iter()
                .map(|role| {
                    self.context
                        .resolve(index, ObjectKind::Role, role)
                        .map(|role_id| json!({ "roleId": role_id, "divisionId": HOME_DIVISION }))
                })
                .collect::<Result<Vec<_>, _>>()?;

            progress.report(&format!("Granting roles to OAuth client {}", item.name));
            self.context
                .platform
                .update(
                    ObjectType::OAuthClient,
                    &client_id,
                    json!({ "roleDivisions": role_divisions }),
                )
                .await?;
        }
        Ok(())
    }

    async fn remove(&self, progress: &dyn ProgressReporter) -> Result<(), ModuleError> {
        self.context
            .remove_owned(progress, ObjectKind::OAuthClient)
            .await
    }
}
