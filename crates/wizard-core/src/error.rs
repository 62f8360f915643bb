//! Errors surfaced by an install or uninstall run.

use crate::backend::BackendError;
use crate::modules::ModuleError;
use crate::platform::PlatformError;
use crate::types::{ObjectKind, Phase};

#[derive(Debug, thiserror::Error)]
pub enum ProvisionError {
    /// Create or configure failed. Fatal to the run.
    #[error("{phase} failed for {kind}: {source}")]
    Provisioning {
        kind: ObjectKind,
        phase: Phase,
        #[source]
        source: ModuleError,
    },

    /// A finalize step failed. Fatal to the run.
    #[error("finalize failed for {kind} '{item}': {source}")]
    Finalize {
        kind: ObjectKind,
        item: String,
        #[source]
        source: FinalizeError,
    },

    /// Logged and left out of the existence result.
    #[error("existence check failed for {kind}: {source}")]
    ExistenceCheck {
        kind: ObjectKind,
        #[source]
        source: ModuleError,
    },

    /// Logged; uninstall carries on with the other modules.
    #[error("removal failed for {kind}: {source}")]
    Removal {
        kind: ObjectKind,
        #[source]
        source: ModuleError,
    },
}

impl ProvisionError {
    pub fn kind(&self) -> ObjectKind {
        match self {
            ProvisionError::Provisioning { kind, .. }
            | ProvisionError::Finalize { kind, .. }
            | ProvisionError::ExistenceCheck { kind, .. }
            | ProvisionError::Removal { kind, .. } => *kind,
        }
    }

    /// Phase of the install run that failed, if this is an install error.
    pub fn phase(&self) -> Option<Phase> {
        match self {
            ProvisionError::Provisioning { phase, .. } => Some(*phase),
            ProvisionError::Finalize { .. } => Some(Phase::Finalize),
            _ => None,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum FinalizeError {
    #[error("item was not installed")]
    NotInstalled,

    #[error("installed object has no '{0}'")]
    MissingField(&'static str),

    #[error(transparent)]
    Platform(#[from] PlatformError),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}
