//! Premium App Wizard Core Library
//!
//! Provisions the platform objects a premium app needs (roles, groups,
//! app instances, OAuth clients, data tables) from a declarative manifest,
//! detects existing installations and removes them again.

pub mod backend;
pub mod config;
pub mod error;
pub mod index;
pub mod manifest;
pub mod modules;
pub mod orchestrator;
pub mod platform;
pub mod progress;
pub mod session;
pub mod storage;
pub mod types;

/// Re-exports of commonly used types
pub mod prelude {
    // Configuration
    pub use crate::config::{ConfigStore, Locale, WizardConfig};

    // Manifest
    pub use crate::manifest::{FinalizeStrategy, ItemSpec, Manifest};

    // Modules
    pub use crate::modules::{
        ExistenceReport, ModuleContext, ModuleError, ModuleRegistry, PlatformModule,
        ProvisioningModule,
    };

    // Orchestration
    pub use crate::error::{FinalizeError, ProvisionError};
    pub use crate::index::{InstalledIndex, InstalledItems, SimplifiedIndex};
    pub use crate::orchestrator::{FinalizeEnv, InstallReport, Orchestrator, RunContext};

    // Collaborators
    pub use crate::backend::{AccountBackend, EmailNotifier, HttpBackend, MemoryBackend, Notifier};
    pub use crate::platform::{HttpPlatformClient, MemoryPlatform, PlatformApi, PlatformError};
    pub use crate::storage::{FileStore, KeyValueStore, MemoryStore, SessionStore, StorageKey};

    // Session
    pub use crate::progress::{ProgressReporter, TracingProgress};
    pub use crate::session::{EntryState, EntryStatus, SetupForm, WizardSession};
    pub use crate::types::{ObjectKind, Phase, RunState};
}
