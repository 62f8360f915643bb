//! Install pipeline over the active modules.
//!
//! An install run moves through three phases that never overlap:
//! 1. create: every module creates its manifest items
//! 2. configure: every module wires its objects using the full index
//! 3. finalize: every declared `finally` step runs
//!
//! Modules run concurrently within a phase and the first failure aborts
//! the run. Nothing is rolled back here; callers decide whether to
//! uninstall. Existence checks and uninstall tolerate module failures.

pub mod finalize;

use std::collections::BTreeMap;
use std::sync::Arc;

use futures::future::{join_all, try_join_all};

use crate::backend::Notifier;
use crate::error::{FinalizeError, ProvisionError};
use crate::index::{InstalledIndex, SimplifiedIndex};
use crate::manifest::Manifest;
use crate::modules::{
    ActiveModules, ExistenceReport, ModuleRegistry, PlatformModule, ProvisioningModule,
    filter_modules,
};
use crate::progress::ProgressReporter;
use crate::types::{ObjectKind, Phase, RunState};

pub use finalize::{FinalizeEnv, augment_redirect_uris};

/// Inputs of one install run.
pub struct RunContext<'a> {
    pub progress: &'a dyn ProgressReporter,
    pub notifier: &'a dyn Notifier,
    /// User who receives roles and group memberships.
    pub acting_user_id: &'a str,
    pub finalize: &'a FinalizeEnv,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InstallReport {
    pub index: InstalledIndex,
    /// Number of finalize steps that ran.
    pub finalized: usize,
}

impl InstallReport {
    pub fn simplified(&self) -> SimplifiedIndex {
        self.index.simplified()
    }
}

/// Per-module existence results. Failed checks are kept separately.
#[derive(Debug, Default)]
pub struct ExistenceSummary {
    pub reports: BTreeMap<ObjectKind, ExistenceReport>,
    pub failures: Vec<ProvisionError>,
}

impl ExistenceSummary {
    pub fn any_present(&self) -> bool {
        self.reports.values().any(ExistenceReport::is_present)
    }
}

#[derive(Debug, Default)]
pub struct UninstallReport {
    pub removed: Vec<ObjectKind>,
    pub failures: Vec<ProvisionError>,
}

impl UninstallReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Drives install, existence checks and uninstall for one manifest.
#[derive(Debug)]
pub struct Orchestrator<M = PlatformModule> {
    modules: ActiveModules<M>,
    manifest: Arc<Manifest>,
    state: RunState,
}

impl<M: ProvisioningModule> Orchestrator<M> {
    /// Restrict `registry` to the manifest's keys. The active set does not
    /// change afterwards.
    pub fn new(manifest: Arc<Manifest>, registry: ModuleRegistry<M>) -> Self {
        let modules = filter_modules(&manifest, registry);
        Self {
            modules,
            manifest,
            state: RunState::Idle,
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn active_kinds(&self) -> Vec<ObjectKind> {
        self.modules.kinds()
    }

    pub fn ignored_keys(&self) -> &[String] {
        self.modules.ignored_keys()
    }

    pub fn manifest(&self) -> &Manifest {
        &self.manifest
    }

    /// Existence check on every active module.
    pub async fn existence(&self) -> ExistenceSummary {
        let checks = self
            .modules
            .modules()
            .iter()
            .map(|module| async move { (module.kind(), module.check_existing().await) });

        let mut summary = ExistenceSummary::default();
        for (kind, result) in join_all(checks).await {
            match result {
                Ok(report) => {
                    tracing::debug!(kind = %kind, present = report.is_present(), "existence checked");
                    summary.reports.insert(kind, report);
                }
                Err(source) => {
                    let err = ProvisionError::ExistenceCheck { kind, source };
                    tracing::warn!(error = %err, "existence check failed, ignoring");
                    summary.failures.push(err);
                }
            }
        }
        summary
    }

    /// True when any active module finds objects of its kind.
    pub async fn check_existing(&self) -> bool {
        self.existence().await.any_present()
    }

    pub async fn install(&mut self, run: &RunContext<'_>) -> Result<InstallReport, ProvisionError> {
        let result = self.run_phases(run).await;
        self.state = match &result {
            Ok(_) => RunState::Done,
            Err(err) => {
                tracing::warn!(error = %err, state = ?self.state, "install failed");
                RunState::Failed
            }
        };
        result
    }

    async fn run_phases(&mut self, run: &RunContext<'_>) -> Result<InstallReport, ProvisionError> {
        self.enter(RunState::Creating);
        let index = self.create_all(run).await?;

        self.enter(RunState::Configuring);
        self.configure_all(run, &index).await?;

        self.enter(RunState::Finalizing);
        run.progress.report("Executing final steps...");
        let finalized = self.finalize_all(run, &index).await?;

        Ok(InstallReport { index, finalized })
    }

    fn enter(&mut self, state: RunState) {
        tracing::info!(from = ?self.state, to = ?state, "install phase");
        self.state = state;
    }

    async fn create_all(&self, run: &RunContext<'_>) -> Result<InstalledIndex, ProvisionError> {
        let creates = self.modules.modules().iter().map(|module| {
            let kind = module.kind();
            let items = self.manifest.items_for(kind);
            async move {
                module
                    .create(run.progress, items)
                    .await
                    .map(|installed| (kind, installed))
                    .map_err(|source| ProvisionError::Provisioning {
                        kind,
                        phase: Phase::Create,
                        source,
                    })
            }
        });

        let mut index = InstalledIndex::new();
        for (kind, installed) in try_join_all(creates).await? {
            index.insert(kind, installed);
        }
        Ok(index)
    }

    async fn configure_all(
        &self,
        run: &RunContext<'_>,
        index: &InstalledIndex,
    ) -> Result<(), ProvisionError> {
        let configures = self.modules.modules().iter().map(|module| async move {
            let kind = module.kind();
            module
                .configure(run.progress, index, run.acting_user_id)
                .await
                .map_err(|source| ProvisionError::Provisioning {
                    kind,
                    phase: Phase::Configure,
                    source,
                })
        });

        try_join_all(configures).await?;
        Ok(())
    }

    async fn finalize_all(
        &self,
        run: &RunContext<'_>,
        index: &InstalledIndex,
    ) -> Result<usize, ProvisionError> {
        let portal = run.finalize.portal_address().unwrap_or_else(|err| {
            tracing::warn!(error = %err, "failed to read portal address");
            None
        });

        let mut steps = Vec::new();
        for (kind, items) in self.manifest.known_entries() {
            let Some(installed) = index.get(kind) else {
                continue;
            };
            for item in items {
                if item.finalize.is_none() && item.redirect_uris().is_none() {
                    continue;
                }
                let item = augment_redirect_uris(item, portal.as_deref());
                let object = installed.get(&item.name);
                steps.push(async move {
                    let result = match object {
                        Some(object) => run.finalize.run(kind, &item, object, run.notifier).await,
                        None => Err(FinalizeError::NotInstalled),
                    };
                    result.map_err(|source| ProvisionError::Finalize {
                        kind,
                        item: item.name.clone(),
                        source,
                    })
                });
            }
        }

        let finalized = steps.len();
        try_join_all(steps).await?;
        Ok(finalized)
    }

    /// Remove on every active module. Failures are collected, never raised.
    pub async fn uninstall(&self, progress: &dyn ProgressReporter) -> UninstallReport {
        let removals = self
            .modules
            .modules()
            .iter()
            .map(|module| async move { (module.kind(), module.remove(progress).await) });

        let mut report = UninstallReport::default();
        for (kind, result) in join_all(removals).await {
            match result {
                Ok(()) => report.removed.push(kind),
                Err(source) => {
                    let err = ProvisionError::Removal { kind, source };
                    tracing::warn!(error = %err, "removal failed, continuing");
                    report.failures.push(err);
                }
            }
        }
        report
    }
}
