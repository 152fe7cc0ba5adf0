use std::collections::HashMap;
use std::sync::Arc;

use crate::container::descriptor::{Instance, ProviderId};
use crate::errors::CompositionError;

/// Lookup tier that satisfied an injection slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    /// Provider assembled for the current module (own or imported)
    Local,
    /// Provider published process-wide by a global module or the root
    Global,
    /// Author-supplied value copied from the declaration
    PassThrough,
}

impl Tier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Local => "local",
            Tier::Global => "global",
            Tier::PassThrough => "pass-through",
        }
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Entry of a module's local scope
#[derive(Debug, Clone)]
pub enum LocalEntry {
    /// Declared by the module, not resolved yet
    Pending,
    /// Resolved singleton
    Resolved(Instance),
}

/// Providers visible to one module while it initializes: its own
/// declarations plus everything its imports export
#[derive(Debug, Clone, Default)]
pub struct LocalScope {
    entries: HashMap<ProviderId, LocalEntry>,
}

impl LocalScope {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a resolved instance, replacing a pending declaration
    pub fn insert_resolved(&mut self, id: ProviderId, instance: Instance) {
        self.entries.insert(id, LocalEntry::Resolved(instance));
    }

    /// Record a declaration that will be resolved later
    ///
    /// An identity that is already resolved (typically because an import
    /// exports it) stays resolved.
    pub fn declare(&mut self, id: ProviderId) {
        self.entries.entry(id).or_insert(LocalEntry::Pending);
    }

    /// Drop an entry, used when its declaration failed to resolve
    pub fn forget(&mut self, id: &ProviderId) {
        if let Some(LocalEntry::Pending) = self.entries.get(id) {
            self.entries.remove(id);
        }
    }

    pub fn get(&self, id: &ProviderId) -> Option<&LocalEntry> {
        self.entries.get(id)
    }

    /// Resolved instance for `id`, if any
    pub fn resolved(&self, id: &ProviderId) -> Option<Instance> {
        match self.entries.get(id) {
            Some(LocalEntry::Resolved(instance)) => Some(instance.clone()),
            _ => None,
        }
    }

    /// Typed access to a resolved instance
    pub fn get_typed<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.resolved(&ProviderId::of::<T>())
            .and_then(|instance| instance.downcast::<T>().ok())
    }

    pub fn contains(&self, id: &ProviderId) -> bool {
        self.entries.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Keep only resolved entries
    pub fn into_resolved(self) -> HashMap<ProviderId, Instance> {
        self.entries
            .into_iter()
            .filter_map(|(id, entry)| match entry {
                LocalEntry::Resolved(instance) => Some((id, instance)),
                LocalEntry::Pending => None,
            })
            .collect()
    }
}

/// Read access to the process-wide global tier
pub trait GlobalScope {
    fn lookup_global(&self, id: &ProviderId) -> Result<Option<Instance>, CompositionError>;
}

impl GlobalScope for HashMap<ProviderId, Instance> {
    fn lookup_global(&self, id: &ProviderId) -> Result<Option<Instance>, CompositionError> {
        Ok(self.get(id).cloned())
    }
}
