//! REST client for the vendor platform API.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use serde_json::{Value, json};
use url::Url;

use super::{
    Assignment, InstalledObject, ListQuery, ObjectSummary, ObjectType, Page, PlatformApi,
    PlatformError, PlatformUser, merge_json,
};

const USER_AGENT: &str = concat!("premium-wizard/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Platform client authenticated with a bearer token.
#[derive(Debug, Clone)]
pub struct HttpPlatformClient {
    client: reqwest::Client,
    base: Url,
    base_path: String,
    access_token: String,
}

impl HttpPlatformClient {
    pub fn new(base_path: &str, access_token: impl Into<String>) -> Result<Self, PlatformError> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        let base = Url::parse(base_path)?;

        Ok(Self {
            client,
            base,
            base_path: base_path.trim_end_matches('/').to_string(),
            access_token: access_token.into(),
        })
    }

    /// Base path for a platform environment such as `mypurecloud.com.au`.
    pub fn base_path_for_environment(environment: &str) -> String {
        format!("https://api.{}", environment.trim_matches('/'))
    }

    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, PlatformError> {
        let url = self.base.join(path)?;
        Ok(self
            .client
            .request(method, url)
            .bearer_auth(&self.access_token)
            .header(reqwest::header::ACCEPT, "application/json"))
    }

    async fn send(
        &self,
        request: RequestBuilder,
        object_type: ObjectType,
        id: Option<&str>,
    ) -> Result<Response, PlatformError> {
        let response = request.send().await?;
        let status = response.status();

        if status == StatusCode::NOT_FOUND {
            return Err(PlatformError::NotFound {
                object_type,
                id: id.unwrap_or_default().to_string(),
            });
        }
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(PlatformError::Rejected {
                status: status.as_u16(),
                message,
            });
        }
        Ok(response)
    }

    async fn get_json(
        &self,
        path: &str,
        object_type: ObjectType,
        id: Option<&str>,
    ) -> Result<Value, PlatformError> {
        let request = self.request(Method::GET, path)?;
        let response = self.send(request, object_type, id).await?;
        Ok(response.json().await?)
    }

    async fn put_json(
        &self,
        path: &str,
        object_type: ObjectType,
        id: &str,
        body: &Value,
    ) -> Result<Value, PlatformError> {
        let request = self.request(Method::PUT, path)?.json(body);
        let response = self.send(request, object_type, Some(id)).await?;
        Ok(response.json().await?)
    }

    /// Integrations keep their state on the integration itself and their
    /// configuration on a separate versioned document.
    async fn update_integration(
        &self,
        id: &str,
        mut properties: Value,
    ) -> Result<InstalledObject, PlatformError> {
        let object_path = object_path(ObjectType::Integration, id);

        let intended_state = properties
            .as_object_mut()
            .and_then(|map| map.remove("intendedState"));
        if let Some(state) = intended_state {
            let request = self
                .request(Method::PATCH, &object_path)?
                .json(&json!({ "intendedState": state }));
            self.send(request, ObjectType::Integration, Some(id)).await?;
        }

        let has_config = properties.as_object().is_some_and(|map| !map.is_empty());
        if has_config {
            let config_path = format!("{object_path}/config/current");
            let mut current = self
                .get_json(&config_path, ObjectType::Integration, Some(id))
                .await?;
            merge_json(&mut current, properties);
            self.put_json(&config_path, ObjectType::Integration, id, &current)
                .await?;
        }

        let integration = self
            .get_json(&object_path, ObjectType::Integration, Some(id))
            .await?;
        Ok(serde_json::from_value(integration)?)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageEnvelope {
    #[serde(default)]
    entities: Vec<InstalledObject>,
    #[serde(default)]
    page_number: Option<u32>,
    #[serde(default)]
    page_size: Option<u32>,
    #[serde(default)]
    total: Option<u64>,
    #[serde(default)]
    page_count: Option<u32>,
}

impl PageEnvelope {
    fn into_page(self, query: &ListQuery) -> Page {
        let total = self.total.unwrap_or(self.entities.len() as u64);
        Page {
            page_number: self.page_number.unwrap_or(query.page_number),
            page_size: self.page_size.unwrap_or(query.page_size),
            page_count: self.page_count.unwrap_or(1),
            total,
            entities: self.entities,
        }
    }
}

#[derive(Debug, Deserialize)]
struct UserEnvelope {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    authorization: Option<UserAuthorization>,
}

#[derive(Debug, Default, Deserialize)]
struct UserAuthorization {
    #[serde(default)]
    roles: Vec<ObjectSummary>,
}

fn collection_path(object_type: ObjectType) -> &'static str {
    match object_type {
        ObjectType::Role => "/api/v2/authorization/roles",
        ObjectType::Group => "/api/v2/groups",
        ObjectType::Integration => "/api/v2/integrations",
        ObjectType::IntegrationType => "/api/v2/integrations/types",
        ObjectType::OAuthClient => "/api/v2/oauth/clients",
        ObjectType::DataTable => "/api/v2/flows/datatables",
    }
}

fn object_path(object_type: ObjectType, id: &str) -> String {
    format!("{}/{}", collection_path(object_type), id)
}

#[async_trait]
impl PlatformApi for HttpPlatformClient {
    fn base_path(&self) -> &str {
        &self.base_path
    }

    async fn list(
        &self,
        object_type: ObjectType,
        query: &ListQuery,
    ) -> Result<Page, PlatformError> {
        let request = self
            .request(Method::GET, collection_path(object_type))?
            .query(&[
                ("pageSize", query.page_size.to_string()),
                ("pageNumber", query.page_number.to_string()),
            ]);
        let response = self.send(request, object_type, None).await?;
        let envelope: PageEnvelope = response.json().await?;
        Ok(envelope.into_page(query))
    }

    async fn create(
        &self,
        object_type: ObjectType,
        properties: Value,
    ) -> Result<InstalledObject, PlatformError> {
        if object_type == ObjectType::IntegrationType {
            return Err(PlatformError::Unsupported(object_type));
        }
        let request = self
            .request(Method::POST, collection_path(object_type))?
            .json(&properties);
        let response = self.send(request, object_type, None).await?;
        Ok(response.json().await?)
    }

    async fn update(
        &self,
        object_type: ObjectType,
        id: &str,
        properties: Value,
    ) -> Result<InstalledObject, PlatformError> {
        match object_type {
            ObjectType::IntegrationType => Err(PlatformError::Unsupported(object_type)),
            ObjectType::Integration => self.update_integration(id, properties).await,
            _ => {
                let path = object_path(object_type, id);
                let mut current = self.get_json(&path, object_type, Some(id)).await?;
                merge_json(&mut current, properties);
                let updated = self.put_json(&path, object_type, id, &current).await?;
                Ok(serde_json::from_value(updated)?)
            }
        }
    }

    async fn delete(&self, object_type: ObjectType, id: &str) -> Result<(), PlatformError> {
        if object_type == ObjectType::IntegrationType {
            return Err(PlatformError::Unsupported(object_type));
        }
        let request = self.request(Method::DELETE, &object_path(object_type, id))?;
        self.send(request, object_type, Some(id)).await?;
        Ok(())
    }

    async fn assign(&self, assignment: &Assignment) -> Result<(), PlatformError> {
        match assignment {
            Assignment::RoleToUsers { role_id, user_ids } => {
                let path = format!("{}/users/add", object_path(ObjectType::Role, role_id));
                let request = self.request(Method::PUT, &path)?.json(user_ids);
                self.send(request, ObjectType::Role, Some(role_id)).await?;
            }
            Assignment::UsersToGroup { group_id, user_ids } => {
                let group_path = object_path(ObjectType::Group, group_id);
                let group = self
                    .get_json(&group_path, ObjectType::Group, Some(group_id))
                    .await?;
                let version = group.get("version").cloned().unwrap_or(json!(1));
                let request = self
                    .request(Method::POST, &format!("{group_path}/members"))?
                    .json(&json!({ "memberIds": user_ids, "version": version }));
                self.send(request, ObjectType::Group, Some(group_id)).await?;
            }
        }
        Ok(())
    }

    async fn current_user(&self) -> Result<PlatformUser, PlatformError> {
        let request = self
            .request(Method::GET, "/api/v2/users/me")?
            .query(&[("expand", "authorization")]);
        let response = self.send(request, ObjectType::Role, None).await?;
        let user: UserEnvelope = response.json().await?;

        Ok(PlatformUser {
            id: user.id,
            name: user.name,
            email: user.email,
            roles: user.authorization.unwrap_or_default().roles,
        })
    }
}
