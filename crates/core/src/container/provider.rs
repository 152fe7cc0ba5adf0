use std::fmt;
use std::sync::Arc;

use crate::container::descriptor::{Instance, ProviderId};
use crate::container::inject::{Dependency, Injector, Resolvable};
use crate::errors::CompositionError;

type ResolveFn = Arc<dyn Fn(&mut Injector<'_>) -> Result<Instance, CompositionError> + Send + Sync>;

/// Type-erased provider declaration held by a module
///
/// The declared value stays inert; resolving it produces a fresh instance
/// with every slot filled. Singleton semantics are enforced by the registry,
/// not here.
#[derive(Clone)]
pub struct ProviderDecl {
    id: ProviderId,
    resolve: ResolveFn,
}

impl ProviderDecl {
    pub fn new<P: Resolvable>(declared: P) -> Self {
        let declared = Arc::new(declared);
        Self {
            id: ProviderId::of::<P>(),
            resolve: Arc::new(move |injector: &mut Injector<'_>| {
                let resolved = declared.resolve(injector)?;
                Ok(Arc::new(resolved) as Instance)
            }),
        }
    }

    pub fn id(&self) -> ProviderId {
        self.id
    }

    /// Fully qualified name, used as the owner in resolution errors
    pub fn name(&self) -> &'static str {
        self.id.type_name()
    }

    /// Build the resolved instance against the injector's scopes
    pub fn resolve(&self, injector: &mut Injector<'_>) -> Result<Instance, CompositionError> {
        (self.resolve)(injector)
    }

    /// Slots that need injection, in declaration order
    pub fn dependencies(&self) -> Vec<Dependency> {
        let mut injector = Injector::collecting(self.name());
        if let Err(error) = (self.resolve)(&mut injector) {
            tracing::debug!(provider = self.name(), %error, "dependency listing stopped early");
        }
        injector.into_dependencies()
    }
}

impl fmt::Debug for ProviderDecl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderDecl").field("id", &self.id).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::inject::Inject;

    #[derive(Default)]
    struct Clock;

    impl Resolvable for Clock {
        fn resolve(&self, _injector: &mut Injector<'_>) -> Result<Self, CompositionError> {
            Ok(Clock)
        }
    }

    #[derive(Default)]
    struct Audit {
        prefix: String,
        clock: Inject<Clock>,
        backup: Inject<Clock>,
    }

    impl Resolvable for Audit {
        fn resolve(&self, injector: &mut Injector<'_>) -> Result<Self, CompositionError> {
            Ok(Self {
                prefix: injector.pass(&self.prefix),
                clock: injector.inject(&self.clock)?,
                backup: injector.inject(&self.backup)?,
            })
        }
    }

    #[test]
    fn test_dependencies_lists_slots_with_indices() {
        let decl = ProviderDecl::new(Audit::default());
        let deps = decl.dependencies();

        assert_eq!(deps.len(), 2);
        assert_eq!(deps[0].index, 1);
        assert_eq!(deps[1].index, 2);
        assert!(deps.iter().all(|d| d.provider == ProviderId::of::<Clock>()));
        assert!(decl.id().is::<Audit>());
    }

    #[test]
    fn test_leaf_provider_has_no_dependencies() {
        assert!(ProviderDecl::new(Clock).dependencies().is_empty());
    }
}
