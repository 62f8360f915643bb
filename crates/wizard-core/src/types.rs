//! Shared core types used across the manifest, modules and orchestrator.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Object categories the wizard knows how to provision.
///
/// The serialized form is the provisioning key used in the manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ObjectKind {
    /// Authorization role with permission policies.
    #[serde(rename = "role")]
    Role,
    /// Official group.
    #[serde(rename = "group")]
    Group,
    /// Embedded client app integration.
    #[serde(rename = "app-instance")]
    AppInstance,
    /// OAuth client.
    #[serde(rename = "oauth-client")]
    OAuthClient,
    /// Architect data table.
    #[serde(rename = "data-table")]
    DataTable,
}

impl ObjectKind {
    pub const ALL: [ObjectKind; 5] = [
        ObjectKind::Role,
        ObjectKind::Group,
        ObjectKind::AppInstance,
        ObjectKind::OAuthClient,
        ObjectKind::DataTable,
    ];

    /// Provisioning key as it appears in the manifest.
    pub fn key(&self) -> &'static str {
        match self {
            ObjectKind::Role => "role",
            ObjectKind::Group => "group",
            ObjectKind::AppInstance => "app-instance",
            ObjectKind::OAuthClient => "oauth-client",
            ObjectKind::DataTable => "data-table",
        }
    }

    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.key() == key)
    }

    /// Human-readable label used in progress messages.
    pub fn label(&self) -> &'static str {
        match self {
            ObjectKind::Role => "role",
            ObjectKind::Group => "group",
            ObjectKind::AppInstance => "app instance",
            ObjectKind::OAuthClient => "OAuth client",
            ObjectKind::DataTable => "data table",
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Strictly ordered stages of an install run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Create,
    Configure,
    Finalize,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Create => "create",
            Phase::Configure => "configure",
            Phase::Finalize => "finalize",
        };
        f.write_str(name)
    }
}

/// State of one install run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    Idle,
    Creating,
    Configuring,
    Finalizing,
    Done,
    Failed,
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Done | RunState::Failed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_keys_round_trip() {
        for kind in ObjectKind::ALL {
            assert_eq!(ObjectKind::from_key(kind.key()), Some(kind));
        }
        assert_eq!(ObjectKind::from_key("queue"), None);
    }

    #[test]
    fn test_kind_serializes_as_provisioning_key() {
        let json = serde_json::to_string(&ObjectKind::OAuthClient).unwrap();
        assert_eq!(json, "\"oauth-client\"");

        let kind: ObjectKind = serde_json::from_str("\"app-instance\"").unwrap();
        assert_eq!(kind, ObjectKind::AppInstance);
    }
}
