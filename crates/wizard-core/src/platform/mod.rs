//! Vendor platform object API.
//!
//! The wizard only needs a small CRUD surface over a handful of object
//! types. `HttpPlatformClient` talks to the real REST API; `MemoryPlatform`
//! keeps everything in process for tests and dry runs.

pub mod http;
pub mod memory;

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::types::ObjectKind;

pub use http::HttpPlatformClient;
pub use memory::MemoryPlatform;

/// Object collections exposed by the platform API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ObjectType {
    Role,
    Group,
    Integration,
    IntegrationType,
    OAuthClient,
    DataTable,
}

impl ObjectType {
    pub fn name(&self) -> &'static str {
        match self {
            ObjectType::Role => "role",
            ObjectType::Group => "group",
            ObjectType::Integration => "integration",
            ObjectType::IntegrationType => "integration type",
            ObjectType::OAuthClient => "OAuth client",
            ObjectType::DataTable => "data table",
        }
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl From<ObjectKind> for ObjectType {
    fn from(kind: ObjectKind) -> Self {
        match kind {
            ObjectKind::Role => ObjectType::Role,
            ObjectKind::Group => ObjectType::Group,
            ObjectKind::AppInstance => ObjectType::Integration,
            ObjectKind::OAuthClient => ObjectType::OAuthClient,
            ObjectKind::DataTable => ObjectType::DataTable,
        }
    }
}

/// Vendor-assigned representation of a created object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstalledObject {
    pub id: String,
    #[serde(default)]
    pub name: String,
    /// Every other field the platform returned.
    #[serde(flatten)]
    pub fields: Map<String, Value>,
}

impl InstalledObject {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            fields: Map::new(),
        }
    }

    pub fn with_field(mut self, key: &str, value: Value) -> Self {
        self.fields.insert(key.to_string(), value);
        self
    }

    pub fn field(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    pub fn field_str(&self, key: &str) -> Option<&str> {
        self.fields.get(key).and_then(Value::as_str)
    }

    pub fn summary(&self) -> ObjectSummary {
        ObjectSummary {
            id: self.id.clone(),
            name: self.name.clone(),
        }
    }
}

/// The `{id, name}` pair used for cross references.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectSummary {
    pub id: String,
    pub name: String,
}

/// A single page request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListQuery {
    pub page_size: u32,
    pub page_number: u32,
}

impl ListQuery {
    pub fn first(page_size: u32) -> Self {
        Self {
            page_size: page_size.max(1),
            page_number: 1,
        }
    }

    pub fn next(&self) -> Self {
        Self {
            page_size: self.page_size,
            page_number: self.page_number + 1,
        }
    }
}

/// One page of a listing.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub entities: Vec<InstalledObject>,
    pub page_number: u32,
    pub page_size: u32,
    pub total: u64,
    pub page_count: u32,
}

impl Page {
    pub fn has_more(&self) -> bool {
        self.page_number < self.page_count
    }
}

/// Membership changes that are not plain object updates.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Assignment {
    /// Grant a role to users.
    RoleToUsers {
        role_id: String,
        user_ids: Vec<String>,
    },
    /// Add users to a group.
    UsersToGroup {
        group_id: String,
        user_ids: Vec<String>,
    },
}

/// The authenticated user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlatformUser {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: Option<String>,
    /// Roles granted to the user.
    #[serde(default)]
    pub roles: Vec<ObjectSummary>,
}

#[derive(Debug, thiserror::Error)]
pub enum PlatformError {
    #[error("{object_type} '{id}' not found")]
    NotFound { object_type: ObjectType, id: String },

    #[error("platform rejected the request (HTTP {status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("platform request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("failed to decode platform response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("invalid platform URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("{0} does not support this operation")]
    Unsupported(ObjectType),
}

impl PlatformError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, PlatformError::NotFound { .. })
    }
}

/// Object CRUD surface of the vendor platform.
#[async_trait]
pub trait PlatformApi: Send + Sync {
    /// API base path, e.g. `https://api.mypurecloud.com.au`.
    fn base_path(&self) -> &str;

    /// Fetch one page of a collection.
    async fn list(&self, object_type: ObjectType, query: &ListQuery)
    -> Result<Page, PlatformError>;

    async fn create(
        &self,
        object_type: ObjectType,
        properties: Value,
    ) -> Result<InstalledObject, PlatformError>;

    /// Merge `properties` into the existing object.
    async fn update(
        &self,
        object_type: ObjectType,
        id: &str,
        properties: Value,
    ) -> Result<InstalledObject, PlatformError>;

    async fn delete(&self, object_type: ObjectType, id: &str) -> Result<(), PlatformError>;

    async fn assign(&self, assignment: &Assignment) -> Result<(), PlatformError>;

    async fn current_user(&self) -> Result<PlatformUser, PlatformError>;
}

/// Walk every page of a collection, keeping objects whose name starts with
/// `name_prefix` when one is given.
pub async fn list_all(
    api: &dyn PlatformApi,
    object_type: ObjectType,
    name_prefix: Option<&str>,
    page_size: u32,
) -> Result<Vec<InstalledObject>, PlatformError> {
    let mut query = ListQuery::first(page_size);
    let mut objects = Vec::new();

    loop {
        let page = api.list(object_type, &query).await?;
        let more = page.has_more();
        objects.extend(
            page.entities
                .into_iter()
                .filter(|object| name_prefix.is_none_or(|prefix| object.name.starts_with(prefix))),
        );
        if !more {
            break;
        }
        query = query.next();
    }

    tracing::debug!(
        object_type = %object_type,
        count = objects.len(),
        "listed platform objects"
    );
    Ok(objects)
}

/// Deep-merge `patch` into `target`. Objects merge key by key; every other
/// value (arrays included) replaces what was there.
pub fn merge_json(target: &mut Value, patch: Value) {
    match (target, patch) {
        (Value::Object(target), Value::Object(patch)) => {
            for (key, value) in patch {
                match target.get_mut(&key) {
                    Some(existing) => merge_json(existing, value),
                    None => {
                        target.insert(key, value);
                    }
                }
            }
        }
        (target, patch) => *target = patch,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_merge_json_nested_objects() {
        let mut target = json!({
            "name": "App",
            "properties": { "url": "https://old", "sandbox": "allow-scripts" }
        });
        merge_json(
            &mut target,
            json!({ "properties": { "url": "https://new" }, "enabled": true }),
        );

        assert_eq!(
            target,
            json!({
                "name": "App",
                "properties": { "url": "https://new", "sandbox": "allow-scripts" },
                "enabled": true
            })
        );
    }

    #[test]
    fn test_merge_json_replaces_arrays() {
        let mut target = json!({ "scope": ["a", "b"] });
        merge_json(&mut target, json!({ "scope": ["c"] }));
        assert_eq!(target, json!({ "scope": ["c"] }));
    }

    #[test]
    fn test_installed_object_flattens_vendor_fields() {
        let object: InstalledObject = serde_json::from_value(json!({
            "id": "abc",
            "name": "PREFIX_Client",
            "secret": "s3cret",
            "authorizedGrantType": "CLIENT_CREDENTIALS"
        }))
        .unwrap();

        assert_eq!(object.id, "abc");
        assert_eq!(object.field_str("secret"), Some("s3cret"));
        assert_eq!(object.summary().name, "PREFIX_Client");
    }

    #[test]
    fn test_object_type_from_kind() {
        assert_eq!(ObjectType::from(ObjectKind::AppInstance), ObjectType::Integration);
        assert_eq!(ObjectType::from(ObjectKind::DataTable), ObjectType::DataTable);
    }
}
