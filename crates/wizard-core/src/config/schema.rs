//! Configuration schema for wizard.toml
//!
//! Every key is optional; missing keys fall back to the values the
//! premium app ships with.

use std::path::PathBuf;

use anyhow::{Context, bail};
use serde::{Deserialize, Serialize};
use url::Url;

/// Root configuration structure for wizard.toml
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct WizardConfig {
    /// Platform name of the premium app. Must match the id of the app's
    /// integration type.
    pub app_name: String,

    /// Prepended to the name of every object the wizard creates.
    pub prefix: String,

    /// OAuth client id of the wizard itself.
    pub client_id: String,

    /// Environment used when none is given or stored, e.g. `mypurecloud.com`.
    pub default_environment: String,

    /// Language tag used when none is given or stored.
    pub default_language: String,

    /// Landing page of the premium app. The integration points here when
    /// the app is not installed.
    pub premium_app_url: String,

    pub wizard_uri_base: String,

    /// Account backend root.
    pub backend_url: String,

    /// Page size for platform listings.
    pub page_size: u32,

    /// Remove everything that was provisioned when an install fails.
    pub uninstall_on_failure: bool,

    /// Manifest file. The built-in manifest is used when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manifest: Option<PathBuf>,

    /// Where session state is kept. Defaults to the platform data dir.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state_dir: Option<PathBuf>,
}

impl Default for WizardConfig {
    fn default() -> Self {
        Self {
            app_name: "premium-app-example".to_string(),
            prefix: "Arkis ".to_string(),
            client_id: "a25d93b0-7a4e-485a-bdf3-dcf27fb2b3b3".to_string(),
            default_environment: "mypurecloud.com.au".to_string(),
            default_language: "en-us".to_string(),
            premium_app_url:
                "https://inprod.github.io/premium-app-example/premium-app-sample/index.html"
                    .to_string(),
            wizard_uri_base: "https://inprod.github.io/premium-app-example/wizard/".to_string(),
            backend_url: "https://app.test.inprod.io".to_string(),
            page_size: 100,
            uninstall_on_failure: true,
            manifest: None,
            state_dir: None,
        }
    }
}

impl WizardConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check values serde cannot check on its own.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.app_name.trim().is_empty() {
            bail!("app-name must not be empty");
        }
        if self.prefix.trim().is_empty() {
            bail!("prefix must not be empty");
        }
        if self.page_size == 0 {
            bail!("page-size must be at least 1");
        }
        if self.default_environment.trim().is_empty() {
            bail!("default-environment must not be empty");
        }

        for (key, value) in [
            ("premium-app-url", &self.premium_app_url),
            ("wizard-uri-base", &self.wizard_uri_base),
            ("backend-url", &self.backend_url),
        ] {
            Url::parse(value).with_context(|| format!("{key} is not a valid URL: '{value}'"))?;
        }

        Ok(())
    }

    pub fn backend_url(&self) -> anyhow::Result<Url> {
        Url::parse(&self.backend_url)
            .with_context(|| format!("backend-url is not a valid URL: '{}'", self.backend_url))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = WizardConfig::default();
        config.validate().unwrap();
        assert_eq!(config.page_size, 100);
        assert_eq!(config.default_language, "en-us");
    }

    #[test]
    fn test_validate_rejects_empty_prefix() {
        let config = WizardConfig {
            prefix: " ".to_string(),
            ..WizardConfig::default()
        };
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("prefix"));
    }

    #[test]
    fn test_validate_rejects_bad_url() {
        let config = WizardConfig {
            backend_url: "not a url".to_string(),
            ..WizardConfig::default()
        };
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("backend-url"));
    }

    #[test]
    fn test_kebab_case_keys() {
        let config: WizardConfig = toml::from_str(
            r#"
default-environment = "mypurecloud.com"
uninstall-on-failure = false
manifest = "provisioning.toml"
"#,
        )
        .unwrap();

        assert_eq!(config.default_environment, "mypurecloud.com");
        assert!(!config.uninstall_on_failure);
        assert_eq!(config.manifest, Some(PathBuf::from("provisioning.toml")));
        assert_eq!(config.app_name, "premium-app-example");
    }
}
