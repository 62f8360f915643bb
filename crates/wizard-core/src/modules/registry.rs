//! Module registry and manifest filtering.
//!
//! The registry holds one module per object kind. Filtering it against a
//! manifest yields the active set an orchestrator works with.

use std::sync::Arc;

use super::{ModuleContext, PlatformModule, ProvisioningModule};
use crate::manifest::Manifest;
use crate::types::ObjectKind;

/// Registry of available provisioning modules.
#[derive(Debug)]
pub struct ModuleRegistry<M = PlatformModule> {
    modules: Vec<M>,
}

impl<M> Default for ModuleRegistry<M> {
    fn default() -> Self {
        Self {
            modules: Vec::new(),
        }
    }
}

impl ModuleRegistry<PlatformModule> {
    /// Registry with a module for every object kind.
    pub fn with_platform_modules(context: Arc<ModuleContext>) -> Self {
        let modules = ObjectKind::ALL
            .into_iter()
            .map(|kind| PlatformModule::for_kind(kind, context.clone()))
            .collect();
        Self { modules }
    }
}

impl<M: ProvisioningModule> ModuleRegistry<M> {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a module, replacing any module of the same kind.
    pub fn register(&mut self, module: M) {
        self.modules.retain(|existing| existing.kind() != module.kind());
        self.modules.push(module);
    }

    pub fn all(&self) -> &[M] {
        &self.modules
    }

    pub fn get(&self, kind: ObjectKind) -> Option<&M> {
        self.modules.iter().find(|module| module.kind() == kind)
    }

    pub fn kinds(&self) -> Vec<ObjectKind> {
        self.modules.iter().map(ProvisioningModule::kind).collect()
    }
}

/// Modules selected for a run. Fixed once built.
#[derive(Debug)]
pub struct ActiveModules<M = PlatformModule> {
    modules: Vec<M>,
    ignored_keys: Vec<String>,
}

impl<M: ProvisioningModule> ActiveModules<M> {
    pub fn modules(&self) -> &[M] {
        &self.modules
    }

    pub fn kinds(&self) -> Vec<ObjectKind> {
        self.modules.iter().map(ProvisioningModule::kind).collect()
    }

    /// Manifest keys without a registered module.
    pub fn ignored_keys(&self) -> &[String] {
        &self.ignored_keys
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }
}

/// Keep the modules whose key appears in the manifest.
pub fn filter_modules<M: ProvisioningModule>(
    manifest: &Manifest,
    registry: ModuleRegistry<M>,
) -> ActiveModules<M> {
    let modules: Vec<M> = registry
        .modules
        .into_iter()
        .filter(|module| manifest.contains_key(module.kind().key()))
        .collect();

    let ignored_keys: Vec<String> = manifest
        .keys()
        .filter(|key| !modules.iter().any(|module| module.kind().key() == *key))
        .map(str::to_string)
        .collect();
    for key in &ignored_keys {
        tracing::debug!(key = %key, "manifest key has no module, ignoring");
    }

    ActiveModules {
        modules,
        ignored_keys,
    }
}
