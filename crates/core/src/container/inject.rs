//! Explicit injection contract
//!
//! A provider, controller or pipeline capability declares the capabilities it
//! needs as [`Inject<T>`] fields and implements [`Resolvable`] to build its
//! resolved form. Every field goes through the [`Injector`], in declaration
//! order, so the injector can report the slot index of whatever fails:
//!
//! ```rust
//! use modgraph_core::container::{Inject, Injector, Resolvable};
//! use modgraph_core::errors::CompositionError;
//!
//! #[derive(Default)]
//! struct Clock;
//!
//! impl Resolvable for Clock {
//!     fn resolve(&self, _injector: &mut Injector<'_>) -> Result<Self, CompositionError> {
//!         Ok(Clock)
//!     }
//! }
//!
//! #[derive(Default)]
//! struct Greeter {
//!     clock: Inject<Clock>,
//!     greeting: String,
//! }
//!
//! impl Resolvable for Greeter {
//!     fn resolve(&self, injector: &mut Injector<'_>) -> Result<Self, CompositionError> {
//!         Ok(Self {
//!             clock: injector.inject(&self.clock)?,
//!             greeting: injector.pass(&self.greeting),
//!         })
//!     }
//! }
//! ```

use std::fmt;
use std::ops::Deref;
use std::sync::Arc;

use crate::container::descriptor::ProviderId;
use crate::container::scope::{GlobalScope, LocalEntry, LocalScope, Tier};
use crate::errors::CompositionError;

/// Injection slot for a provider of type `T`
///
/// Declarations carry empty slots; the engine fills them while resolving.
/// Dereferencing an empty slot is a programming error and panics.
pub struct Inject<T> {
    instance: Option<Arc<T>>,
}

impl<T> Inject<T> {
    /// Create an empty slot
    pub fn new() -> Self {
        Self { instance: None }
    }

    /// Create a filled slot
    pub fn from_arc(instance: Arc<T>) -> Self {
        Self {
            instance: Some(instance),
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.instance.is_some()
    }

    pub fn get(&self) -> Option<&Arc<T>> {
        self.instance.as_ref()
    }

    /// Shared handle to the injected instance
    pub fn arc(&self) -> Option<Arc<T>> {
        self.instance.clone()
    }
}

impl<T> Default for Inject<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for Inject<T> {
    fn clone(&self) -> Self {
        Self {
            instance: self.instance.clone(),
        }
    }
}

impl<T> fmt::Debug for Inject<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Inject")
            .field("type", &std::any::type_name::<T>())
            .field("resolved", &self.is_resolved())
            .finish()
    }
}

impl<T> Deref for Inject<T> {
    type Target = T;

    fn deref(&self) -> &T {
        match &self.instance {
            Some(instance) => instance,
            None => panic!(
                "'{}' was accessed before it was injected",
                std::any::type_name::<T>()
            ),
        }
    }
}

/// Contract implemented by everything the engine injects into: providers,
/// controllers, guards, interceptors and exception filters
///
/// `resolve` builds the resolved value from the inert declaration. It must
/// route every field through the injector, in declaration order, and must not
/// use injected values while resolving: dependency listing runs it against
/// empty slots.
pub trait Resolvable: Send + Sync + Sized + 'static {
    fn resolve(&self, injector: &mut Injector<'_>) -> Result<Self, CompositionError>;
}

/// A slot that required injection, as reported by a dependency listing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dependency {
    pub index: usize,
    pub provider: ProviderId,
}

/// How one slot was satisfied during resolution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Binding {
    pub index: usize,
    pub type_name: &'static str,
    pub tier: Tier,
}

enum Mode<'a> {
    Resolve {
        local: &'a LocalScope,
        global: &'a dyn GlobalScope,
    },
    Collect(Vec<Dependency>),
}

/// Resolves the slots of one declaration against a module's scopes
pub struct Injector<'a> {
    owner: &'a str,
    module: &'a str,
    mode: Mode<'a>,
    next_index: usize,
    bindings: Vec<Binding>,
}

impl<'a> Injector<'a> {
    /// Create an injector resolving against `local` first, then `global`
    pub fn new(
        owner: &'a str,
        module: &'a str,
        local: &'a LocalScope,
        global: &'a dyn GlobalScope,
    ) -> Self {
        Self {
            owner,
            module,
            mode: Mode::Resolve { local, global },
            next_index: 0,
            bindings: Vec::new(),
        }
    }

    /// Create an injector that only records which slots need injection
    pub fn collecting(owner: &'a str) -> Self {
        Self {
            owner,
            module: "",
            mode: Mode::Collect(Vec::new()),
            next_index: 0,
            bindings: Vec::new(),
        }
    }

    /// Name of the declaration being resolved
    pub fn owner(&self) -> &str {
        self.owner
    }

    /// Name of the module whose scope is used
    pub fn module(&self) -> &str {
        self.module
    }

    fn claim_index(&mut self) -> usize {
        let index = self.next_index;
        self.next_index += 1;
        index
    }

    /// Fill an injection slot: local scope first, then the global tier
    pub fn inject<T: Send + Sync + 'static>(
        &mut self,
        _declared: &Inject<T>,
    ) -> Result<Inject<T>, CompositionError> {
        let index = self.claim_index();
        let id = ProviderId::of::<T>();

        let (instance, tier) = match &mut self.mode {
            Mode::Collect(dependencies) => {
                dependencies.push(Dependency {
                    index,
                    provider: id,
                });
                return Ok(Inject::new());
            }
            Mode::Resolve { local, global } => match local.get(&id) {
                Some(LocalEntry::Resolved(instance)) => (instance.clone(), Tier::Local),
                Some(LocalEntry::Pending) => {
                    return Err(CompositionError::DeclarationOrder {
                        dependency: id.type_name().to_string(),
                        index,
                        owner: self.owner.to_string(),
                        module: self.module.to_string(),
                    });
                }
                None => match global.lookup_global(&id)? {
                    Some(instance) => (instance, Tier::Global),
                    None => {
                        return Err(CompositionError::unresolved(
                            id.type_name(),
                            index,
                            self.owner,
                            self.module,
                        ));
                    }
                },
            },
        };

        let typed = instance.downcast::<T>().map_err(|_| {
            CompositionError::unresolved(id.type_name(), index, self.owner, self.module)
        })?;

        tracing::trace!(
            owner = self.owner,
            module = self.module,
            dependency = id.type_name(),
            index,
            tier = tier.as_str(),
            "injected dependency"
        );
        self.bindings.push(Binding {
            index,
            type_name: id.type_name(),
            tier,
        });

        Ok(Inject::from_arc(typed))
    }

    /// Copy a field that needs no injection
    pub fn pass<V: Clone>(&mut self, value: &V) -> V {
        let index = self.claim_index();
        if let Mode::Resolve { .. } = self.mode {
            self.bindings.push(Binding {
                index,
                type_name: std::any::type_name::<V>(),
                tier: Tier::PassThrough,
            });
        }
        value.clone()
    }

    /// Slots resolved so far
    pub fn bindings(&self) -> &[Binding] {
        &self.bindings
    }

    /// Slots that required injection, when running in collecting mode
    pub fn into_dependencies(self) -> Vec<Dependency> {
        match self.mode {
            Mode::Collect(dependencies) => dependencies,
            Mode::Resolve { .. } => Vec::new(),
        }
    }
}
