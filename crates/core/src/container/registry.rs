use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::container::descriptor::{Instance, ProviderId};
use crate::container::inject::Injector;
use crate::container::provider::ProviderDecl;
use crate::errors::CompositionError;

/// Memo slot holding the singleton of one provider identity
pub type MemoSlot = Arc<Mutex<Option<Instance>>>;

/// Process-wide provider tables owned by a composition context
///
/// Lives behind the context's shared lock. Resolution itself never runs while
/// that lock is held: callers take a [`MemoSlot`] out and resolve under the
/// slot's own mutex, see [`resolve_memoized`].
#[derive(Debug, Default)]
pub struct ProviderRegistry {
    memo: HashMap<ProviderId, MemoSlot>,
    globals: HashMap<ProviderId, Instance>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Memo slot for an identity, created on first request
    pub fn memo_slot(&mut self, id: ProviderId) -> MemoSlot {
        self.memo.entry(id).or_default().clone()
    }

    /// Number of identities that have a memo slot
    pub fn memoized_count(&self) -> usize {
        self.memo.len()
    }

    /// Publish an instance to the global tier
    ///
    /// First writer wins; returns false if the identity was already global.
    pub fn publish_global(&mut self, id: ProviderId, instance: Instance) -> bool {
        if self.globals.contains_key(&id) {
            return false;
        }
        self.globals.insert(id, instance);
        true
    }

    pub fn global(&self, id: &ProviderId) -> Option<Instance> {
        self.globals.get(id).cloned()
    }

    pub fn is_global(&self, id: &ProviderId) -> bool {
        self.globals.contains_key(id)
    }

    pub fn global_count(&self) -> usize {
        self.globals.len()
    }
}

/// Outcome of a memoized resolution
#[derive(Debug, Clone)]
pub struct Memoized {
    pub instance: Instance,
    /// True if this call constructed the instance
    pub constructed: bool,
}

/// Resolve a declaration at most once per identity
///
/// The slot mutex is held while user resolve code runs, so concurrent modules
/// sharing an identity wait for the first construction instead of building
/// their own copy. A failed resolution leaves the slot empty.
pub fn resolve_memoized(
    slot: &Mutex<Option<Instance>>,
    decl: &ProviderDecl,
    injector: &mut Injector<'_>,
) -> Result<Memoized, CompositionError> {
    let mut guard = slot
        .lock()
        .map_err(|_| CompositionError::lock_poisoned(format!("provider memo '{}'", decl.name())))?;

    if let Some(instance) = guard.as_ref() {
        return Ok(Memoized {
            instance: instance.clone(),
            constructed: false,
        });
    }

    let instance = decl.resolve(injector)?;
    *guard = Some(instance.clone());
    Ok(Memoized {
        instance,
        constructed: true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::inject::Resolvable;
    use crate::container::scope::LocalScope;
    use std::sync::atomic::{AtomicUsize, Ordering};

    static BUILT: AtomicUsize = AtomicUsize::new(0);

    struct Counter;

    impl Resolvable for Counter {
        fn resolve(&self, _injector: &mut Injector<'_>) -> Result<Self, CompositionError> {
            BUILT.fetch_add(1, Ordering::SeqCst);
            Ok(Counter)
        }
    }

    #[test]
    fn test_memo_slot_constructs_once() {
        let mut registry = ProviderRegistry::new();
        let decl = ProviderDecl::new(Counter);
        let slot = registry.memo_slot(decl.id());
        let local = LocalScope::new();
        let globals: HashMap<ProviderId, Instance> = HashMap::new();

        let mut injector = Injector::new(decl.name(), "m", &local, &globals);
        let first = resolve_memoized(&slot, &decl, &mut injector).unwrap();
        let again = registry.memo_slot(decl.id());
        let mut injector = Injector::new(decl.name(), "other", &local, &globals);
        let second = resolve_memoized(&again, &decl, &mut injector).unwrap();

        assert!(first.constructed);
        assert!(!second.constructed);
        assert!(Arc::ptr_eq(&first.instance, &second.instance));
        assert_eq!(BUILT.load(Ordering::SeqCst), 1);
        assert_eq!(registry.memoized_count(), 1);
    }

    #[test]
    fn test_publish_global_first_writer_wins() {
        let mut registry = ProviderRegistry::new();
        let id = ProviderId::of::<String>();
        let first: Instance = Arc::new(String::from("first"));
        let second: Instance = Arc::new(String::from("second"));

        assert!(registry.publish_global(id, first.clone()));
        assert!(!registry.publish_global(id, second));
        assert!(Arc::ptr_eq(&registry.global(&id).unwrap(), &first));
        assert_eq!(registry.global_count(), 1);
    }
}
