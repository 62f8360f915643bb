//! Wizard configuration
//!
//! `wizard.toml` is looked up in this order:
//! - the path passed on the command line
//! - `./wizard.toml`
//! - `<config_dir>/premium-wizard/wizard.toml`
//!
//! When none exists the built-in defaults are used.

pub mod parser;
pub mod paths;
pub mod schema;

use std::path::{Path, PathBuf};

use anyhow::Context;

use crate::manifest::{Manifest, builtin_manifest, parse_manifest};
use crate::platform::HttpPlatformClient;
use crate::storage::{SessionStore, StorageKey};

pub use parser::{parse_wizard_toml, parse_wizard_toml_str, to_toml};
pub use paths::{CONFIG_FILE_NAME, discover_config_path};
pub use schema::WizardConfig;

/// Loads and saves wizard.toml.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    config_path: Option<PathBuf>,
}

impl ConfigStore {
    /// Discover the config file from the current directory and the user
    /// config dir.
    pub fn discover(explicit: Option<&Path>) -> anyhow::Result<Self> {
        let project_root = std::env::current_dir()?;
        let global_dir = paths::global_config_dir();
        Ok(Self::from_paths(explicit, &project_root, global_dir.as_deref()))
    }

    pub fn from_paths(
        explicit: Option<&Path>,
        project_root: &Path,
        global_dir: Option<&Path>,
    ) -> Self {
        Self {
            config_path: discover_config_path(explicit, project_root, global_dir),
        }
    }

    /// The file in use, if any.
    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    pub fn load(&self) -> anyhow::Result<WizardConfig> {
        match &self.config_path {
            Some(path) => {
                tracing::debug!(path = %path.display(), "loading wizard config");
                let mut config = parser::parse_wizard_toml(path)?;
                // Relative manifest paths are relative to the config file.
                if let (Some(manifest), Some(dir)) = (&config.manifest, path.parent())
                    && manifest.is_relative()
                {
                    config.manifest = Some(dir.join(manifest));
                }
                Ok(config)
            }
            None => {
                tracing::debug!("no wizard.toml found, using defaults");
                Ok(WizardConfig::default())
            }
        }
    }

    pub fn save(&self, config: &WizardConfig) -> anyhow::Result<()> {
        let path = self
            .config_path
            .as_ref()
            .ok_or_else(|| anyhow::anyhow!("No config file path to save to"))?;
        let content = parser::to_toml(config).context("Failed to serialize config to TOML")?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {}", path.display()))?;
        Ok(())
    }
}

impl WizardConfig {
    /// The configured manifest, or the built-in one.
    pub fn load_manifest(&self) -> anyhow::Result<Manifest> {
        match &self.manifest {
            Some(path) => parse_manifest(path),
            None => builtin_manifest(),
        }
    }

    /// Configured state dir, else `<data_dir>/premium-wizard`.
    pub fn resolve_state_dir(&self) -> anyhow::Result<PathBuf> {
        self.state_dir
            .clone()
            .or_else(paths::default_state_dir)
            .ok_or_else(|| anyhow::anyhow!("Could not determine state directory"))
    }
}

/// Language and platform environment for this session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Locale {
    pub language: String,
    pub environment: String,
}

impl Locale {
    /// Explicit values win over stored ones, stored ones over configured
    /// defaults. Explicit values are remembered for later steps.
    pub fn resolve(
        config: &WizardConfig,
        store: &SessionStore,
        language: Option<&str>,
        environment: Option<&str>,
    ) -> anyhow::Result<Self> {
        let language = resolve_value(
            store,
            StorageKey::Language,
            language,
            &config.default_language,
        )?;
        let environment = resolve_value(
            store,
            StorageKey::Environment,
            environment,
            &config.default_environment,
        )?;

        tracing::debug!(%language, %environment, "resolved locale");
        Ok(Self {
            language,
            environment,
        })
    }

    /// `https://api.<environment>`
    pub fn base_path(&self) -> String {
        HttpPlatformClient::base_path_for_environment(&self.environment)
    }
}

fn resolve_value(
    store: &SessionStore,
    key: StorageKey,
    explicit: Option<&str>,
    default: &str,
) -> anyhow::Result<String> {
    if let Some(value) = explicit.map(str::trim).filter(|value| !value.is_empty()) {
        store.set(key, value)?;
        return Ok(value.to_string());
    }
    Ok(store.get(key)?.unwrap_or_else(|| default.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_load_defaults_without_file() {
        let project = TempDir::new().unwrap();
        let store = ConfigStore::from_paths(None, project.path(), None);
        assert!(store.config_path().is_none());
        assert_eq!(store.load().unwrap(), WizardConfig::default());
    }

    #[test]
    fn test_manifest_path_relative_to_config() {
        let project = TempDir::new().unwrap();
        std::fs::write(
            project.path().join(CONFIG_FILE_NAME),
            "manifest = \"provisioning.toml\"\n",
        )
        .unwrap();

        let config = ConfigStore::from_paths(None, project.path(), None)
            .load()
            .unwrap();
        assert_eq!(
            config.manifest,
            Some(project.path().join("provisioning.toml"))
        );
    }

    #[test]
    fn test_save_then_load() {
        let project = TempDir::new().unwrap();
        let path = project.path().join("custom.toml");
        let store = ConfigStore::from_paths(Some(&path), project.path(), None);

        let config = WizardConfig {
            prefix: "ACME_".to_string(),
            ..WizardConfig::default()
        };
        store.save(&config).unwrap();

        assert_eq!(store.load().unwrap().prefix, "ACME_");
    }

    #[test]
    fn test_locale_resolution_order() {
        let config = WizardConfig::default();
        let store = SessionStore::in_memory("app");

        let locale = Locale::resolve(&config, &store, None, None).unwrap();
        assert_eq!(locale.language, "en-us");
        assert_eq!(locale.environment, "mypurecloud.com.au");

        let locale = Locale::resolve(&config, &store, Some("de-de"), Some("mypurecloud.de")).unwrap();
        assert_eq!(locale.environment, "mypurecloud.de");

        // Remembered from the previous call.
        let locale = Locale::resolve(&config, &store, None, None).unwrap();
        assert_eq!(locale.language, "de-de");
        assert_eq!(locale.base_path(), "https://api.mypurecloud.de");
    }

    #[test]
    fn test_builtin_manifest_when_unset() {
        let manifest = WizardConfig::default().load_manifest().unwrap();
        assert!(manifest.contains_key("oauth-client"));
    }
}
