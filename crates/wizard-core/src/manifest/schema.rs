//! Provisioning manifest schema.
//!
//! The manifest maps provisioning keys (`role`, `group`, ...) to the items
//! the wizard creates for that object type:
//!
//! ```toml
//! [[group]]
//! name = "Supervisors"
//! description = "Supervisors have the ability to watch a queue."
//! assignToSelf = true
//!
//! [[oauth-client]]
//! name = "OAuth Client"
//! authorizedGrantType = "CLIENT_CREDENTIALS"
//! roles = ["Role"]
//! finally = { strategy = "notify-client-credentials" }
//! ```
//!
//! Every key other than `name` and `finally` is a free-form property that
//! the module for that object type interprets.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::types::ObjectKind;

/// Property holding the OAuth redirect URI list.
pub const REDIRECT_URIS_PROPERTY: &str = "registeredRedirectUri";

/// Declarative description of everything to provision.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Manifest {
    entries: BTreeMap<String, Vec<ItemSpec>>,
}

/// One object to provision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemSpec {
    /// Unique within its provisioning key. The platform name is the
    /// configured prefix followed by this name.
    pub name: String,

    /// Post-install step for this item.
    #[serde(default, rename = "finally", skip_serializing_if = "Option::is_none")]
    pub finalize: Option<FinalizeStrategy>,

    /// Object-type specific properties.
    #[serde(flatten)]
    pub properties: Map<String, Value>,
}

/// Closed set of post-install steps.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "strategy", rename_all = "kebab-case")]
pub enum FinalizeStrategy {
    /// Hand the created OAuth client's credentials to the account backend.
    #[serde(rename_all = "kebab-case")]
    NotifyClientCredentials {
        #[serde(default)]
        social_app_update: bool,
    },
    /// Nothing to do.
    Noop,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ManifestError {
    #[error("item in '{key}' has an empty name")]
    EmptyName { key: String },

    #[error("item '{name}' appears more than once in '{key}'")]
    DuplicateItem { key: String, name: String },
}

impl Manifest {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder used mostly by tests.
    pub fn with_items(mut self, key: &str, items: Vec<ItemSpec>) -> Self {
        self.entries.insert(key.to_string(), items);
        self
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn items(&self, key: &str) -> &[ItemSpec] {
        self.entries.get(key).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn items_for(&self, kind: ObjectKind) -> &[ItemSpec] {
        self.items(kind.key())
    }

    /// Entries whose key maps to a known object kind.
    pub fn known_entries(&self) -> impl Iterator<Item = (ObjectKind, &[ItemSpec])> {
        self.entries.iter().filter_map(|(key, items)| {
            ObjectKind::from_key(key).map(|kind| (kind, items.as_slice()))
        })
    }

    /// Keys no module understands.
    pub fn unknown_keys(&self) -> Vec<&str> {
        self.keys()
            .filter(|key| ObjectKind::from_key(key).is_none())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.values().all(Vec::is_empty)
    }

    pub fn validate(&self) -> Result<(), ManifestError> {
        for (key, items) in &self.entries {
            let mut seen = HashSet::new();
            for item in items {
                if item.name.trim().is_empty() {
                    return Err(ManifestError::EmptyName { key: key.clone() });
                }
                if !seen.insert(item.name.as_str()) {
                    return Err(ManifestError::DuplicateItem {
                        key: key.clone(),
                        name: item.name.clone(),
                    });
                }
            }
        }
        Ok(())
    }
}

impl ItemSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            finalize: None,
            properties: Map::new(),
        }
    }

    pub fn with_property(mut self, key: &str, value: Value) -> Self {
        self.properties.insert(key.to_string(), value);
        self
    }

    pub fn with_finalize(mut self, strategy: FinalizeStrategy) -> Self {
        self.finalize = Some(strategy);
        self
    }

    pub fn property(&self, key: &str) -> Option<&Value> {
        self.properties.get(key)
    }

    pub fn property_str(&self, key: &str) -> Option<&str> {
        self.property(key).and_then(Value::as_str)
    }

    pub fn property_bool(&self, key: &str) -> bool {
        self.property(key).and_then(Value::as_bool).unwrap_or(false)
    }

    /// String entries of an array property; missing or non-array is empty.
    pub fn string_list(&self, key: &str) -> Vec<String> {
        self.property(key)
            .and_then(Value::as_array)
            .map(|values| {
                values
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Redirect URIs if the item declares the property at all.
    pub fn redirect_uris(&self) -> Option<Vec<String>> {
        self.property(REDIRECT_URIS_PROPERTY)
            .filter(|value| value.is_array())
            .map(|_| self.string_list(REDIRECT_URIS_PROPERTY))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_item_properties_are_flattened() {
        let item: ItemSpec = serde_json::from_value(json!({
            "name": "Supervisors",
            "description": "Watch queues",
            "assignToSelf": true
        }))
        .unwrap();

        assert_eq!(item.name, "Supervisors");
        assert!(item.finalize.is_none());
        assert_eq!(item.property_str("description"), Some("Watch queues"));
        assert!(item.property_bool("assignToSelf"));
        assert!(!item.property_bool("missing"));
    }

    #[test]
    fn test_finalize_strategy_tagged_form() {
        let item: ItemSpec = serde_json::from_value(json!({
            "name": "OAuth Client",
            "finally": { "strategy": "notify-client-credentials", "social-app-update": true }
        }))
        .unwrap();

        assert_eq!(
            item.finalize,
            Some(FinalizeStrategy::NotifyClientCredentials {
                social_app_update: true
            })
        );
        assert!(!item.properties.contains_key("finally"));
    }

    #[test]
    fn test_redirect_uris_only_when_declared() {
        let plain = ItemSpec::new("Client");
        assert_eq!(plain.redirect_uris(), None);

        let declared = ItemSpec::new("Client")
            .with_property(REDIRECT_URIS_PROPERTY, json!(["https://a", "https://b"]));
        assert_eq!(
            declared.redirect_uris(),
            Some(vec!["https://a".to_string(), "https://b".to_string()])
        );
    }

    #[test]
    fn test_unknown_keys_are_reported() {
        let manifest = Manifest::new()
            .with_items("group", vec![ItemSpec::new("Users")])
            .with_items("queue", vec![ItemSpec::new("Inbound")]);

        assert_eq!(manifest.unknown_keys(), vec!["queue"]);
        let known: Vec<_> = manifest.known_entries().map(|(kind, _)| kind).collect();
        assert_eq!(known, vec![ObjectKind::Group]);
    }

    #[test]
    fn test_validate_rejects_duplicates() {
        let manifest = Manifest::new().with_items(
            "group",
            vec![ItemSpec::new("Users"), ItemSpec::new("Users")],
        );

        assert_eq!(
            manifest.validate(),
            Err(ManifestError::DuplicateItem {
                key: "group".to_string(),
                name: "Users".to_string()
            })
        );
    }

    #[test]
    fn test_validate_rejects_empty_name() {
        let manifest = Manifest::new().with_items("role", vec![ItemSpec::new("  ")]);
        assert!(matches!(
            manifest.validate(),
            Err(ManifestError::EmptyName { .. })
        ));
    }
}
