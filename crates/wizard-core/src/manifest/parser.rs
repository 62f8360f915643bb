//! Manifest loading with helpful error messages.

use std::path::Path;

use anyhow::{Context, Result};

use super::schema::Manifest;
use crate::config::parser::enhance_toml_error;

const BUILTIN_MANIFEST: &str = include_str!("../../assets/manifest.toml");

/// Load a manifest file. `.json` files are read as JSON, everything else
/// as TOML.
pub fn parse_manifest(path: &Path) -> Result<Manifest> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read manifest: {}", path.display()))?;

    let is_json = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

    let manifest = if is_json {
        parse_manifest_json(&content)
    } else {
        parse_manifest_str(&content)
    };
    manifest.with_context(|| format!("Failed to parse manifest: {}", path.display()))
}

pub fn parse_manifest_str(content: &str) -> Result<Manifest> {
    let manifest: Manifest =
        toml::from_str(content).map_err(|e| enhance_toml_error(e, content))?;
    manifest.validate()?;
    Ok(manifest)
}

pub fn parse_manifest_json(content: &str) -> Result<Manifest> {
    let manifest: Manifest =
        serde_json::from_str(content).context("Manifest is not valid JSON")?;
    manifest.validate()?;
    Ok(manifest)
}

/// The manifest shipped with the wizard.
pub fn builtin_manifest() -> Result<Manifest> {
    parse_manifest_str(BUILTIN_MANIFEST).context("Built-in manifest is invalid")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::FinalizeStrategy;
    use crate::types::ObjectKind;

    #[test]
    fn test_builtin_manifest_parses() {
        let manifest = builtin_manifest().unwrap();

        let groups: Vec<_> = manifest
            .items_for(ObjectKind::Group)
            .iter()
            .map(|item| item.name.as_str())
            .collect();
        assert_eq!(groups, vec!["Users", "Supervisors"]);

        let clients = manifest.items_for(ObjectKind::OAuthClient);
        assert_eq!(clients.len(), 2);
        assert!(clients.iter().all(|item| matches!(
            item.finalize,
            Some(FinalizeStrategy::NotifyClientCredentials { .. })
        )));
        assert!(clients[1].redirect_uris().is_some());
    }

    #[test]
    fn test_parse_manifest_toml() {
        let manifest = parse_manifest_str(
            r#"
[[role]]
name = "Role"
description = "Generated role"

[[role.permissionPolicies]]
domain = "integration"
entityName = "examplePremiumApp"
actionSet = ["*"]
allowConditions = false
"#,
        )
        .unwrap();

        let role = &manifest.items_for(ObjectKind::Role)[0];
        let policies = role.property("permissionPolicies").unwrap();
        assert_eq!(policies[0]["domain"], "integration");
    }

    #[test]
    fn test_parse_manifest_json() {
        let manifest = parse_manifest_json(
            r#"{ "group": [ { "name": "Users" }, { "name": "Supervisors", "assignToSelf": true } ] }"#,
        )
        .unwrap();
        assert_eq!(manifest.items_for(ObjectKind::Group).len(), 2);
    }

    #[test]
    fn test_parse_error_has_line_context() {
        let err = parse_manifest_str("[[group]]\nname = \n").unwrap_err();
        let message = format!("{err:#}");
        assert!(message.contains("TOML parsing error"), "{message}");
    }

    #[test]
    fn test_duplicate_items_rejected() {
        let result = parse_manifest_str(
            r#"
[[group]]
name = "Users"

[[group]]
name = "Users"
"#,
        );
        assert!(result.is_err());
    }
}
