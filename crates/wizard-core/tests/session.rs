use std::sync::Arc;

use serde_json::{Value, json};
use tempfile::TempDir;

use wizard_core::backend::MemoryBackend;
use wizard_core::config::{Locale, WizardConfig};
use wizard_core::manifest::builtin_manifest;
use wizard_core::platform::{Assignment, InstalledObject, MemoryPlatform, ObjectType};
use wizard_core::session::{
    EntryState, FAILED_SUBJECT, FINISHED_SUBJECT, STARTED_SUBJECT, SetupForm, UnavailableReason,
    WizardSession,
};
use wizard_core::storage::{FileStore, SessionStore, StorageKey};

const APP_INTEGRATION_ID: &str = "premium-app";

struct Harness {
    platform: Arc<MemoryPlatform>,
    backend: Arc<MemoryBackend>,
    session: WizardSession,
}

fn enabled_platform(config: &WizardConfig) -> MemoryPlatform {
    let platform = MemoryPlatform::default();
    platform.seed(
        ObjectType::IntegrationType,
        InstalledObject::new(config.app_name.clone(), config.app_name.clone()),
    );
    platform.seed(
        ObjectType::Integration,
        InstalledObject::new(APP_INTEGRATION_ID, "Premium App")
            .with_field("integrationType", json!({ "id": config.app_name })),
    );
    platform
}

fn harness_with(config: WizardConfig, platform: MemoryPlatform, store: SessionStore) -> Harness {
    let platform = Arc::new(platform);
    let backend = Arc::new(MemoryBackend::new());
    let locale = Locale::resolve(&config, &store, Some("en-us"), Some("mypurecloud.ie")).unwrap();
    let session = WizardSession::new(
        config,
        locale,
        Arc::new(builtin_manifest().unwrap()),
        platform.clone(),
        backend.clone(),
        store,
        "token-1",
    );
    Harness {
        platform,
        backend,
        session,
    }
}

fn harness() -> Harness {
    let config = WizardConfig::default();
    let platform = enabled_platform(&config);
    let store = SessionStore::in_memory(&config.app_name);
    harness_with(config, platform, store)
}

fn quiet(_: &str) {}

fn app_integration_url(platform: &MemoryPlatform) -> Option<String> {
    platform
        .objects(ObjectType::Integration)
        .into_iter()
        .find(|object| object.id == APP_INTEGRATION_ID)
        .and_then(|object| object.field("properties").cloned())
        .and_then(|properties| properties.get("url").and_then(Value::as_str).map(str::to_string))
}

#[tokio::test]
async fn status_on_fresh_org_is_ready_to_install() {
    let h = harness();

    let status = h.session.status().await.unwrap();

    assert_eq!(status.user.id, "memory-user");
    assert_eq!(
        status.state,
        EntryState::ReadyToInstall {
            previous_attempt_failed: false
        }
    );
    assert_eq!(h.backend.email_subjects(), vec![STARTED_SUBJECT.to_string()]);
}

#[tokio::test]
async fn status_without_integration_type_is_unavailable() {
    let config = WizardConfig::default();
    let store = SessionStore::in_memory(&config.app_name);
    let h = harness_with(config, MemoryPlatform::default(), store);

    let status = h.session.status().await.unwrap();
    assert_eq!(
        status.state,
        EntryState::ProductUnavailable {
            reason: UnavailableReason::NotEnabled
        }
    );
}

#[tokio::test]
async fn status_requires_employee_role_when_org_defines_it() {
    let config = WizardConfig::default();
    let platform = enabled_platform(&config);
    platform.seed(ObjectType::Role, InstalledObject::new("role-emp", "employee"));
    let store = SessionStore::in_memory(&config.app_name);
    let h = harness_with(config, platform, store);

    let status = h.session.status().await.unwrap();
    assert_eq!(
        status.state,
        EntryState::ProductUnavailable {
            reason: UnavailableReason::MissingRole
        }
    );
}

#[tokio::test]
async fn custom_setup_stores_portal_and_key() {
    let h = harness();

    let provisioning = h.session.custom_setup(&SetupForm::default()).await.unwrap();

    assert_eq!(provisioning.portal_address, "portal.example.com");
    let store = h.session.store();
    assert_eq!(
        store.get(StorageKey::PortalAddress).unwrap().as_deref(),
        Some("https://portal.example.com")
    );
    assert_eq!(store.get(StorageKey::SessionKey).unwrap().as_deref(), Some("memory-key"));
    assert_eq!(
        store.get(StorageKey::PlatformBasePath).unwrap().as_deref(),
        Some("memory://platform")
    );
    assert_eq!(h.session.finish().unwrap(), "https://portal.example.com");

    let accounts = h.backend.accounts();
    assert_eq!(accounts.len(), 1);
    assert_eq!(accounts[0].access_token, "token-1");
    assert_eq!(accounts[0].authentication["primary_auth_method"], "pure_cloud");
}

#[tokio::test]
async fn custom_setup_failure_marks_attempt_failed() {
    let h = harness();
    h.backend.fail_accounts();

    assert!(h.session.custom_setup(&SetupForm::default()).await.is_err());

    assert!(h.session.store().flag(StorageKey::LastAttemptFailed).unwrap());
    assert_eq!(h.backend.email_subjects(), vec![FAILED_SUBJECT.to_string()]);
    assert!(h.session.finish().is_err());
}

#[tokio::test]
async fn install_provisions_builtin_manifest() {
    let h = harness();
    h.session.custom_setup(&SetupForm::default()).await.unwrap();

    let outcome = h.session.install(&quiet).await.unwrap();

    // Both OAuth clients hand their credentials to the backend.
    let updates = h.backend.client_updates();
    assert_eq!(updates.len(), 2);
    assert!(updates.iter().any(|update| update.is_social_app_update));
    assert!(updates.iter().all(|update| update.key == "memory-key"));
    assert_eq!(outcome.finalized, 2);

    let groups = outcome.installed.get(wizard_core::types::ObjectKind::Group).unwrap();
    assert!(groups.contains_key("Users"));
    assert!(groups.contains_key("Supervisors"));
    assert_eq!(groups["Supervisors"].name, "Arkis Supervisors");

    // Only the flagged group gets the acting user.
    let supervisors_id = &groups["Supervisors"].id;
    let assignments = h.platform.assignments();
    assert!(assignments.contains(&Assignment::UsersToGroup {
        group_id: supervisors_id.clone(),
        user_ids: vec!["memory-user".to_string()],
    }));
    assert_eq!(
        assignments
            .iter()
            .filter(|assignment| matches!(assignment, Assignment::UsersToGroup { .. }))
            .count(),
        1
    );

    // Portal callbacks are added to the login client.
    let login_client = h
        .platform
        .object_named(ObjectType::OAuthClient, "Arkis GC OAuth - Arkis")
        .unwrap();
    let uris = login_client.field("registeredRedirectUri").unwrap();
    assert!(
        uris.as_array()
            .unwrap()
            .contains(&json!("https://portal.example.com/oauth-callback/purecloud"))
    );

    // The widget URL is rendered for this session's locale.
    let widget = h
        .platform
        .object_named(ObjectType::Integration, "Arkis Supervisor Widget")
        .unwrap();
    let url = widget.field("properties").unwrap()["url"].as_str().unwrap();
    assert!(url.contains("lang=en-us"));
    assert!(url.contains("environment=mypurecloud.ie"));

    assert!(outcome.integration_updated);
    assert_eq!(
        app_integration_url(&h.platform).as_deref(),
        Some("https://portal.example.com")
    );
    assert!(h.backend.email_subjects().contains(&FINISHED_SUBJECT.to_string()));
    assert!(!h.session.store().flag(StorageKey::LastAttemptFailed).unwrap());

    let status = h.session.status().await.unwrap();
    assert_eq!(
        status.state,
        EntryState::AlreadyInstalled {
            url: "https://portal.example.com".to_string()
        }
    );
}

#[tokio::test]
async fn failed_install_rolls_back_and_remembers_failure() {
    let h = harness();
    h.session.custom_setup(&SetupForm::default()).await.unwrap();
    h.platform.fail_creates(ObjectType::Group);

    let err = h.session.install(&quiet).await.unwrap_err();
    assert!(err.to_string().contains("Install failed"));

    for object_type in [ObjectType::Role, ObjectType::Group, ObjectType::OAuthClient] {
        assert!(
            h.platform
                .objects(object_type)
                .iter()
                .all(|object| !object.name.starts_with("Arkis ")),
            "{object_type} left behind"
        );
    }
    assert!(h.backend.client_updates().is_empty());
    assert!(h.session.store().flag(StorageKey::LastAttemptFailed).unwrap());
    assert_eq!(
        h.backend
            .email_subjects()
            .iter()
            .filter(|subject| *subject == FAILED_SUBJECT)
            .count(),
        1
    );

    let status = h.session.status().await.unwrap();
    assert_eq!(
        status.state,
        EntryState::ReadyToInstall {
            previous_attempt_failed: true
        }
    );
}

#[tokio::test]
async fn install_without_setup_fails_in_finalize_with_one_email() {
    let config = WizardConfig {
        uninstall_on_failure: false,
        ..WizardConfig::default()
    };
    let platform = enabled_platform(&config);
    let store = SessionStore::in_memory(&config.app_name);
    let h = harness_with(config, platform, store);

    assert!(h.session.install(&quiet).await.is_err());

    let failures = h
        .backend
        .email_subjects()
        .into_iter()
        .filter(|subject| subject == FAILED_SUBJECT)
        .count();
    assert!(failures >= 1);
    // Objects stay when rollback is disabled.
    assert!(
        h.platform
            .object_named(ObjectType::Role, "Arkis Role")
            .is_some()
    );
}

#[tokio::test]
async fn uninstall_removes_owned_objects_and_resets_integration() {
    let h = harness();
    h.session.custom_setup(&SetupForm::default()).await.unwrap();
    h.session.install(&quiet).await.unwrap();

    let report = h.session.uninstall(&quiet).await.unwrap();

    assert!(report.is_clean());
    assert!(h.platform.object_named(ObjectType::Role, "Arkis Role").is_none());
    assert!(
        h.platform
            .object_named(ObjectType::Integration, "Arkis Supervisor Widget")
            .is_none()
    );
    assert_eq!(
        app_integration_url(&h.platform).as_deref(),
        Some(h.session.config().premium_app_url.as_str())
    );
}

#[tokio::test]
async fn file_store_carries_state_between_sessions() {
    let temp = TempDir::new().unwrap();
    let config = WizardConfig::default();

    {
        let store = SessionStore::new(Arc::new(FileStore::in_dir(temp.path())), &config.app_name);
        let h = harness_with(config.clone(), enabled_platform(&config), store);
        h.session.custom_setup(&SetupForm::default()).await.unwrap();
    }

    let store = SessionStore::new(Arc::new(FileStore::in_dir(temp.path())), &config.app_name);
    assert_eq!(
        store.get(StorageKey::PortalAddress).unwrap().as_deref(),
        Some("https://portal.example.com")
    );
    // The environment chosen in the first session is remembered.
    let locale = Locale::resolve(&config, &store, None, None).unwrap();
    assert_eq!(locale.environment, "mypurecloud.ie");
}
