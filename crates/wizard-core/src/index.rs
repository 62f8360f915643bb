//! Objects created by one install run.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::platform::{InstalledObject, ObjectSummary};
use crate::types::ObjectKind;

/// Item name to installed object, for one object kind.
pub type InstalledItems = BTreeMap<String, InstalledObject>;

/// Everything the create phase produced, keyed by object kind and item name.
///
/// Filled once after every create settled, then only read.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InstalledIndex {
    entries: BTreeMap<ObjectKind, InstalledItems>,
}

/// `{id, name}` projection of an [`InstalledIndex`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct SimplifiedIndex {
    entries: BTreeMap<ObjectKind, BTreeMap<String, ObjectSummary>>,
}

impl InstalledIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, kind: ObjectKind, items: InstalledItems) {
        self.entries.insert(kind, items);
    }

    pub fn get(&self, kind: ObjectKind) -> Option<&InstalledItems> {
        self.entries.get(&kind)
    }

    pub fn object(&self, kind: ObjectKind, name: &str) -> Option<&InstalledObject> {
        self.get(kind).and_then(|items| items.get(name))
    }

    pub fn id_of(&self, kind: ObjectKind, name: &str) -> Option<&str> {
        self.object(kind, name).map(|object| object.id.as_str())
    }

    pub fn kinds(&self) -> impl Iterator<Item = ObjectKind> + '_ {
        self.entries.keys().copied()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.values().all(BTreeMap::is_empty)
    }

    pub fn simplified(&self) -> SimplifiedIndex {
        SimplifiedIndex {
            entries: self
                .entries
                .iter()
                .map(|(kind, items)| {
                    let summaries = items
                        .iter()
                        .map(|(name, object)| (name.clone(), object.summary()))
                        .collect();
                    (*kind, summaries)
                })
                .collect(),
        }
    }
}

impl SimplifiedIndex {
    pub fn get(&self, kind: ObjectKind) -> Option<&BTreeMap<String, ObjectSummary>> {
        self.entries.get(&kind)
    }
}
