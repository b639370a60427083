//! Container bookkeeping: memoized definitions, memoized type
//! descriptors and the alias table.
//!
//! Every lookup result is remembered, including "this identifier has no
//! type" and "this type failed to reflect", so introspection runs at most
//! once per identifier.

use std::sync::Arc;

use dashmap::DashMap;
use once_cell::sync::OnceCell;
use tracing::{debug, trace};

use crate::definition::ObjectDefinition;
use crate::error::DefinitionError;
use crate::reflect::TypeInfo;

/// Memoized outcome of a definition lookup.
#[derive(Clone, Debug)]
pub(crate) enum DefinitionSlot {
    Defined(Arc<ObjectDefinition>),
    /// Known not to be constructible.
    Absent,
    /// Reflection failed; replayed on every lookup.
    Invalid(DefinitionError),
}

#[derive(Debug, Default)]
pub(crate) struct Registry {
    definitions: DashMap<String, DefinitionSlot>,
    /// One cell per class, so concurrent lookups introspect once.
    types: DashMap<String, Arc<OnceCell<Option<Arc<TypeInfo>>>>>,
    aliases: DashMap<String, String>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Follows one alias hop.
    pub fn canonical(&self, identifier: &str) -> String {
        match self.aliases.get(identifier).map(|target| target.value().clone()) {
            Some(target) => {
                trace!(from = identifier, to = %target, "Following alias");
                target
            }
            None => identifier.to_string(),
        }
    }

    pub fn register_alias(&self, canonical: &str, alias: &str) {
        debug!(alias, canonical, "Registered alias");
        self.aliases.insert(alias.to_string(), canonical.to_string());
    }

    pub fn definition(&self, identifier: &str) -> Option<DefinitionSlot> {
        self.definitions.get(identifier).map(|slot| slot.clone())
    }

    pub fn store(&self, identifier: &str, slot: DefinitionSlot) {
        self.definitions.insert(identifier.to_string(), slot);
    }

    /// Stores `slot` unless another lookup got there first, and returns
    /// whichever slot is now in place.
    pub fn store_if_vacant(&self, identifier: &str, slot: DefinitionSlot) -> DefinitionSlot {
        self.definitions
            .entry(identifier.to_string())
            .or_insert(slot)
            .value()
            .clone()
    }

    /// The memoized descriptor of `class`, running `inspect` on first use.
    ///
    /// Racing callers block on the same cell until `inspect` returns.
    pub fn type_info_or_inspect<F>(&self, class: &str, inspect: F) -> Option<Arc<TypeInfo>>
    where
        F: FnOnce() -> Option<Arc<TypeInfo>>,
    {
        // the shard lock is released before `inspect` runs
        let cell = Arc::clone(self.types.entry(class.to_string()).or_default().value());
        cell.get_or_init(inspect).clone()
    }

    /// Identifiers with a usable definition, plus aliases.
    pub fn known_identifiers(&self) -> Vec<String> {
        let mut known: Vec<String> = self
            .definitions
            .iter()
            .filter(|entry| matches!(entry.value(), DefinitionSlot::Defined(_)))
            .map(|entry| entry.key().clone())
            .collect();
        known.extend(self.aliases.iter().map(|entry| entry.key().clone()));
        known.sort();
        known
    }

    /// Number of usable definitions.
    pub fn len(&self) -> usize {
        self.definitions
            .iter()
            .filter(|entry| matches!(entry.value(), DefinitionSlot::Defined(_)))
            .count()
    }
}
