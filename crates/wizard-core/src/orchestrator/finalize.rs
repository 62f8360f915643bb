//! Post-install steps declared per manifest item.

use std::sync::Arc;

use serde_json::{Map, Value, json};

use crate::backend::{AccountBackend, ClientCredentialsUpdate, Notifier};
use crate::error::FinalizeError;
use crate::manifest::{FinalizeStrategy, ItemSpec, REDIRECT_URIS_PROPERTY};
use crate::platform::{InstalledObject, ObjectType, PlatformApi};
use crate::storage::{SessionStore, StorageKey};
use crate::types::ObjectKind;

pub const OAUTH_CALLBACK_PATH: &str = "/oauth-callback/purecloud";
pub const OAUTH_CONNECT_CALLBACK_PATH: &str = "/oauth-connect-callback/purecloud";

pub const FAILURE_SUBJECT: &str = "PureCloud signup process failed";

/// Copy of `item` with both portal callbacks appended to its redirect URIs.
///
/// Items without redirect URIs come back unchanged, as does everything
/// when no portal address is known yet.
pub fn augment_redirect_uris(item: &ItemSpec, portal_address: Option<&str>) -> ItemSpec {
    let Some(mut uris) = item.redirect_uris() else {
        return item.clone();
    };
    let Some(portal) = portal_address else {
        tracing::warn!(item = %item.name, "no portal address stored, redirect URIs left as declared");
        return item.clone();
    };

    uris.extend(
        [OAUTH_CALLBACK_PATH, OAUTH_CONNECT_CALLBACK_PATH].map(|path| format!("{portal}{path}")),
    );

    item.clone()
        .with_property(REDIRECT_URIS_PROPERTY, json!(uris))
}

/// Collaborators finalize steps may use.
#[derive(Clone)]
pub struct FinalizeEnv {
    pub backend: Arc<dyn AccountBackend>,
    pub store: SessionStore,
    pub platform: Arc<dyn PlatformApi>,
}

impl std::fmt::Debug for FinalizeEnv {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FinalizeEnv")
            .field("store", &self.store)
            .field("platform", &self.platform.base_path())
            .finish_non_exhaustive()
    }
}

impl FinalizeEnv {
    pub fn new(
        backend: Arc<dyn AccountBackend>,
        store: SessionStore,
        platform: Arc<dyn PlatformApi>,
    ) -> Self {
        Self {
            backend,
            store,
            platform,
        }
    }

    pub fn portal_address(&self) -> anyhow::Result<Option<String>> {
        self.store.get(StorageKey::PortalAddress)
    }

    /// Run the finalize step of one item against its installed object.
    pub async fn run(
        &self,
        kind: ObjectKind,
        item: &ItemSpec,
        installed: &InstalledObject,
        notifier: &dyn Notifier,
    ) -> Result<(), FinalizeError> {
        self.sync_redirect_uris(kind, item, installed).await?;

        match &item.finalize {
            Some(FinalizeStrategy::NotifyClientCredentials { social_app_update }) => {
                let result = self.notify_client_credentials(installed, *social_app_update).await;
                if let Err(err) = &result {
                    let body = format!(
                        "PureCloud signup process failed at step 'oauth client' with error:\n{err}"
                    );
                    notifier.notify(FAILURE_SUBJECT, &body).await;
                }
                result
            }
            Some(FinalizeStrategy::Noop) | None => Ok(()),
        }
    }

    /// Push augmented redirect URIs to an OAuth client created with the
    /// declared list. Repeated URIs are sent once.
    async fn sync_redirect_uris(
        &self,
        kind: ObjectKind,
        item: &ItemSpec,
        installed: &InstalledObject,
    ) -> Result<(), FinalizeError> {
        if kind != ObjectKind::OAuthClient {
            return Ok(());
        }
        let Some(uris) = item.redirect_uris() else {
            return Ok(());
        };
        let uris = unique_uris(uris);
        let declared = json!(uris);
        if installed.field(REDIRECT_URIS_PROPERTY) == Some(&declared) {
            return Ok(());
        }

        tracing::debug!(item = %item.name, count = uris.len(), "updating redirect URIs");
        self.platform
            .update(
                ObjectType::OAuthClient,
                &installed.id,
                json!({ REDIRECT_URIS_PROPERTY: declared }),
            )
            .await?;
        Ok(())
    }

    async fn notify_client_credentials(
        &self,
        installed: &InstalledObject,
        social_app_update: bool,
    ) -> Result<(), FinalizeError> {
        let secret = installed
            .field_str("secret")
            .ok_or(FinalizeError::MissingField("secret"))?;
        let base_path = self
            .store
            .get(StorageKey::PlatformBasePath)?
            .unwrap_or_else(|| self.platform.base_path().to_string());
        let key = self.store.require(StorageKey::SessionKey)?;
        let data_source = self
            .store
            .get_json::<Map<String, Value>>(StorageKey::DataSourceProperties)?
            .unwrap_or_default();

        let update = ClientCredentialsUpdate {
            client_id: installed.id.clone(),
            secret: secret.to_string(),
            base_path,
            key,
            is_social_app_update: social_app_update,
            data_source,
        };
        self.backend.update_client_credentials(&update).await?;
        tracing::info!(client_id = %installed.id, "client credentials handed to backend");
        Ok(())
    }
}

/// First occurrence of each URI, in order.
fn unique_uris(uris: Vec<String>) -> Vec<String> {
    let mut unique: Vec<String> = Vec::with_capacity(uris.len());
    for uri in uris {
        if !unique.contains(&uri) {
            unique.push(uri);
        }
    }
    unique
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use crate::platform::MemoryPlatform;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingNotifier {
        sent: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl Notifier for RecordingNotifier {
        async fn notify(&self, subject: &str, body: &str) {
            self.sent
                .lock()
                .unwrap()
                .push((subject.to_string(), body.to_string()));
        }
    }

    fn env(backend: Arc<MemoryBackend>) -> FinalizeEnv {
        let store = SessionStore::in_memory("app");
        store.set(StorageKey::SessionKey, "k-1").unwrap();
        store
            .set(StorageKey::PlatformBasePath, "https://api.mypurecloud.com")
            .unwrap();
        store
            .set_json(StorageKey::DataSourceProperties, &json!({ "fetch_interval": 30 }))
            .unwrap();
        FinalizeEnv::new(backend, store, Arc::new(MemoryPlatform::default()))
    }

    fn notify_item() -> ItemSpec {
        ItemSpec::new("OAuth Client").with_finalize(FinalizeStrategy::NotifyClientCredentials {
            social_app_update: true,
        })
    }

    #[test]
    fn test_augment_appends_portal_callbacks() {
        let item = ItemSpec::new("Client")
            .with_property(REDIRECT_URIS_PROPERTY, json!(["https://a", "https://b"]));

        let augmented = augment_redirect_uris(&item, Some("https://acme.example.com"));

        assert_eq!(
            augmented.redirect_uris().unwrap(),
            vec![
                "https://a",
                "https://b",
                "https://acme.example.com/oauth-callback/purecloud",
                "https://acme.example.com/oauth-connect-callback/purecloud",
            ]
        );
        // The manifest item itself is untouched.
        assert_eq!(item.redirect_uris().unwrap().len(), 2);
    }

    #[test]
    fn test_augment_always_appends_both_callbacks() {
        let portal = "https://acme.example.com/";
        let item = ItemSpec::new("Client").with_property(
            REDIRECT_URIS_PROPERTY,
            json!([format!("{portal}{OAUTH_CALLBACK_PATH}"), "https://b"]),
        );

        let augmented = augment_redirect_uris(&item, Some(portal));

        assert_eq!(
            augmented.redirect_uris().unwrap(),
            vec![
                format!("{portal}{OAUTH_CALLBACK_PATH}"),
                "https://b".to_string(),
                format!("{portal}{OAUTH_CALLBACK_PATH}"),
                format!("{portal}{OAUTH_CONNECT_CALLBACK_PATH}"),
            ]
        );
    }

    #[tokio::test]
    async fn test_sync_sends_each_redirect_uri_once() {
        let platform = Arc::new(MemoryPlatform::default());
        let installed = platform
            .create(
                ObjectType::OAuthClient,
                json!({
                    "name": "APP_Login",
                    REDIRECT_URIS_PROPERTY: ["https://p/oauth-callback/purecloud"],
                }),
            )
            .await
            .unwrap();
        let item = augment_redirect_uris(
            &ItemSpec::new("Login").with_property(
                REDIRECT_URIS_PROPERTY,
                json!(["https://p/oauth-callback/purecloud"]),
            ),
            Some("https://p"),
        );
        let env = FinalizeEnv::new(
            Arc::new(MemoryBackend::new()),
            SessionStore::in_memory("app"),
            platform.clone(),
        );

        env.run(
            ObjectKind::OAuthClient,
            &item,
            &installed,
            &RecordingNotifier::default(),
        )
        .await
        .unwrap();

        let synced = platform
            .object_named(ObjectType::OAuthClient, "APP_Login")
            .unwrap();
        assert_eq!(
            synced.field(REDIRECT_URIS_PROPERTY),
            Some(&json!([
                "https://p/oauth-callback/purecloud",
                "https://p/oauth-connect-callback/purecloud",
            ]))
        );
    }

    #[test]
    fn test_augment_skips_without_portal_or_uris() {
        let plain = ItemSpec::new("Client");
        assert_eq!(augment_redirect_uris(&plain, Some("https://p")), plain);

        let declared =
            ItemSpec::new("Client").with_property(REDIRECT_URIS_PROPERTY, json!(["https://a"]));
        assert_eq!(augment_redirect_uris(&declared, None), declared);
    }

    #[tokio::test]
    async fn test_notify_client_credentials_posts_update() {
        let backend = Arc::new(MemoryBackend::new());
        let installed = InstalledObject::new("client-1", "APP_OAuth Client")
            .with_field("secret", json!("s3cret"));
        let notifier = RecordingNotifier::default();

        env(backend.clone())
            .run(ObjectKind::OAuthClient, &notify_item(), &installed, &notifier)
            .await
            .unwrap();

        let updates = backend.client_updates();
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].client_id, "client-1");
        assert_eq!(updates[0].secret, "s3cret");
        assert_eq!(updates[0].key, "k-1");
        assert!(updates[0].is_social_app_update);
        assert_eq!(updates[0].data_source["fetch_interval"], 30);
        assert!(notifier.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_backend_failure_notifies_and_fails() {
        let backend = Arc::new(MemoryBackend::new());
        backend.fail_client_updates();
        let installed =
            InstalledObject::new("client-1", "APP_OAuth Client").with_field("secret", json!("s"));
        let notifier = RecordingNotifier::default();

        let result = env(backend)
            .run(ObjectKind::OAuthClient, &notify_item(), &installed, &notifier)
            .await;

        assert!(matches!(result, Err(FinalizeError::Backend(_))));
        let sent = notifier.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, FAILURE_SUBJECT);
        assert!(sent[0].1.contains("step 'oauth client'"));
    }

    #[tokio::test]
    async fn test_missing_secret_is_an_error() {
        let installed = InstalledObject::new("client-1", "APP_OAuth Client");
        let notifier = RecordingNotifier::default();

        let result = env(Arc::new(MemoryBackend::new()))
            .run(ObjectKind::OAuthClient, &notify_item(), &installed, &notifier)
            .await;
        assert!(matches!(result, Err(FinalizeError::MissingField("secret"))));
    }
}
