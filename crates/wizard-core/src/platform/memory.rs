//! In-process platform used by tests and dry runs.

use std::collections::{BTreeMap, HashSet};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use serde_json::{Value, json};

use super::{
    Assignment, InstalledObject, ListQuery, ObjectType, Page, PlatformApi, PlatformError,
    PlatformUser, merge_json,
};

#[derive(Debug, Default)]
struct MemoryState {
    objects: BTreeMap<ObjectType, BTreeMap<String, InstalledObject>>,
    assignments: Vec<Assignment>,
    next_id: u64,
    failing_creates: HashSet<ObjectType>,
    failing_lists: HashSet<ObjectType>,
    failing_deletes: HashSet<ObjectType>,
}

/// Platform double holding objects in memory.
///
/// Ids are assigned sequentially (`role-1`, `group-2`, ...). OAuth clients
/// get a generated `secret` like the real API returns on creation.
#[derive(Debug)]
pub struct MemoryPlatform {
    user: PlatformUser,
    state: Mutex<MemoryState>,
}

impl Default for MemoryPlatform {
    fn default() -> Self {
        Self::new(PlatformUser {
            id: "memory-user".to_string(),
            name: "Memory User".to_string(),
            email: Some("user@example.com".to_string()),
            roles: Vec::new(),
        })
    }
}

impl MemoryPlatform {
    pub fn new(user: PlatformUser) -> Self {
        Self {
            user,
            state: Mutex::new(MemoryState::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert an object as if it already existed on the platform.
    pub fn seed(&self, object_type: ObjectType, object: InstalledObject) {
        self.state()
            .objects
            .entry(object_type)
            .or_default()
            .insert(object.id.clone(), object);
    }

    /// Make every create of `object_type` fail.
    pub fn fail_creates(&self, object_type: ObjectType) {
        self.state().failing_creates.insert(object_type);
    }

    /// Make every listing of `object_type` fail.
    pub fn fail_lists(&self, object_type: ObjectType) {
        self.state().failing_lists.insert(object_type);
    }

    /// Make every delete of `object_type` fail.
    pub fn fail_deletes(&self, object_type: ObjectType) {
        self.state().failing_deletes.insert(object_type);
    }

    pub fn objects(&self, object_type: ObjectType) -> Vec<InstalledObject> {
        self.state()
            .objects
            .get(&object_type)
            .map(|objects| objects.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn object_named(&self, object_type: ObjectType, name: &str) -> Option<InstalledObject> {
        self.objects(object_type)
            .into_iter()
            .find(|object| object.name == name)
    }

    pub fn assignments(&self) -> Vec<Assignment> {
        self.state().assignments.clone()
    }
}

fn id_prefix(object_type: ObjectType) -> &'static str {
    match object_type {
        ObjectType::Role => "role",
        ObjectType::Group => "group",
        ObjectType::Integration => "integration",
        ObjectType::IntegrationType => "integration-type",
        ObjectType::OAuthClient => "oauth-client",
        ObjectType::DataTable => "data-table",
    }
}

fn rejected(message: String) -> PlatformError {
    PlatformError::Rejected {
        status: 500,
        message,
    }
}

#[async_trait]
impl PlatformApi for MemoryPlatform {
    fn base_path(&self) -> &str {
        "memory://platform"
    }

    async fn list(
        &self,
        object_type: ObjectType,
        query: &ListQuery,
    ) -> Result<Page, PlatformError> {
        let state = self.state();
        if state.failing_lists.contains(&object_type) {
            return Err(rejected(format!("listing {object_type} failed")));
        }

        let all: Vec<InstalledObject> = state
            .objects
            .get(&object_type)
            .map(|objects| objects.values().cloned().collect())
            .unwrap_or_default();
        let page_size = query.page_size.max(1) as usize;
        let total = all.len();
        let page_count = total.div_ceil(page_size).max(1);
        let start = (query.page_number.saturating_sub(1) as usize) * page_size;

        Ok(Page {
            entities: all.into_iter().skip(start).take(page_size).collect(),
            page_number: query.page_number,
            page_size: query.page_size,
            total: total as u64,
            page_count: page_count as u32,
        })
    }

    async fn create(
        &self,
        object_type: ObjectType,
        properties: Value,
    ) -> Result<InstalledObject, PlatformError> {
        let mut state = self.state();
        if state.failing_creates.contains(&object_type) {
            return Err(rejected(format!("creating {object_type} failed")));
        }

        state.next_id += 1;
        let id = format!("{}-{}", id_prefix(object_type), state.next_id);

        let mut body = properties;
        merge_json(&mut body, json!({ "id": id }));
        if object_type == ObjectType::OAuthClient {
            merge_json(&mut body, json!({ "secret": format!("secret-{id}") }));
        }
        let object: InstalledObject = serde_json::from_value(body)?;

        state
            .objects
            .entry(object_type)
            .or_default()
            .insert(id, object.clone());
        Ok(object)
    }

    async fn update(
        &self,
        object_type: ObjectType,
        id: &str,
        properties: Value,
    ) -> Result<InstalledObject, PlatformError> {
        let mut state = self.state();
        let existing = state
            .objects
            .get_mut(&object_type)
            .and_then(|objects| objects.get_mut(id))
            .ok_or_else(|| PlatformError::NotFound {
                object_type,
                id: id.to_string(),
            })?;

        let mut current = serde_json::to_value(&*existing)?;
        merge_json(&mut current, properties);
        *existing = serde_json::from_value(current)?;
        Ok(existing.clone())
    }

    async fn delete(&self, object_type: ObjectType, id: &str) -> Result<(), PlatformError> {
        let mut state = self.state();
        if state.failing_deletes.contains(&object_type) {
            return Err(rejected(format!("deleting {object_type} failed")));
        }

        state
            .objects
            .get_mut(&object_type)
            .and_then(|objects| objects.remove(id))
            .map(|_| ())
            .ok_or_else(|| PlatformError::NotFound {
                object_type,
                id: id.to_string(),
            })
    }

    async fn assign(&self, assignment: &Assignment) -> Result<(), PlatformError> {
        let mut state = self.state();
        let (object_type, id) = match assignment {
            Assignment::RoleToUsers { role_id, .. } => (ObjectType::Role, role_id),
            Assignment::UsersToGroup { group_id, .. } => (ObjectType::Group, group_id),
        };
        let exists = state
            .objects
            .get(&object_type)
            .is_some_and(|objects| objects.contains_key(id));
        if !exists {
            return Err(PlatformError::NotFound {
                object_type,
                id: id.clone(),
            });
        }

        state.assignments.push(assignment.clone());
        Ok(())
    }

    async fn current_user(&self) -> Result<PlatformUser, PlatformError> {
        Ok(self.user.clone())
    }
}
