//! Guards, interceptors and exception filters
//!
//! Capabilities are declared on a controller as inert values and resolved by
//! the binder once per route key, with the same lookup rules as providers.

use std::fmt;
use std::sync::Arc;

use crate::container::inject::{Dependency, Injector, Resolvable};
use crate::errors::{CompositionError, HandlerError, HandlerResult};
use crate::pipeline::context::Context;

/// Decides whether a request may reach the handler
pub trait Guard: Send + Sync {
    fn can_activate(&self, ctx: &Context) -> bool;
}

/// Runs around the handler
///
/// `after` only runs when the handler succeeded.
pub trait Interceptor: Send + Sync {
    fn before(&self, _ctx: &mut Context) -> HandlerResult {
        Ok(())
    }

    fn after(&self, _ctx: &mut Context) -> HandlerResult {
        Ok(())
    }
}

/// Handles a failure raised by any earlier stage
///
/// Returning `Ok` marks the failure as handled.
pub trait ExceptionFilter: Send + Sync {
    fn catch(&self, error: HandlerError, ctx: &mut Context) -> HandlerResult;
}

type ResolveCapability<C> =
    Arc<dyn Fn(&mut Injector<'_>) -> Result<Arc<C>, CompositionError> + Send + Sync>;

/// Type-erased capability declaration
pub struct CapabilityDecl<C: ?Sized> {
    name: &'static str,
    resolve: ResolveCapability<C>,
}

pub type GuardDecl = CapabilityDecl<dyn Guard>;
pub type InterceptorDecl = CapabilityDecl<dyn Interceptor>;
pub type ExceptionFilterDecl = CapabilityDecl<dyn ExceptionFilter>;

impl CapabilityDecl<dyn Guard> {
    pub fn new<G: Guard + Resolvable>(declared: G) -> Self {
        let declared = Arc::new(declared);
        Self {
            name: std::any::type_name::<G>(),
            resolve: Arc::new(move |injector: &mut Injector<'_>| {
                Ok(Arc::new(declared.resolve(injector)?) as Arc<dyn Guard>)
            }),
        }
    }
}

impl CapabilityDecl<dyn Interceptor> {
    pub fn new<I: Interceptor + Resolvable>(declared: I) -> Self {
        let declared = Arc::new(declared);
        Self {
            name: std::any::type_name::<I>(),
            resolve: Arc::new(move |injector: &mut Injector<'_>| {
                Ok(Arc::new(declared.resolve(injector)?) as Arc<dyn Interceptor>)
            }),
        }
    }
}

impl CapabilityDecl<dyn ExceptionFilter> {
    pub fn new<F: ExceptionFilter + Resolvable>(declared: F) -> Self {
        let declared = Arc::new(declared);
        Self {
            name: std::any::type_name::<F>(),
            resolve: Arc::new(move |injector: &mut Injector<'_>| {
                Ok(Arc::new(declared.resolve(injector)?) as Arc<dyn ExceptionFilter>)
            }),
        }
    }
}

impl<C: ?Sized> CapabilityDecl<C> {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn resolve(&self, injector: &mut Injector<'_>) -> Result<Arc<C>, CompositionError> {
        (self.resolve)(injector)
    }

    pub fn dependencies(&self) -> Vec<Dependency> {
        let mut injector = Injector::collecting(self.name);
        if let Err(error) = (self.resolve)(&mut injector) {
            tracing::debug!(capability = self.name, %error, "dependency listing stopped early");
        }
        injector.into_dependencies()
    }
}

impl<C: ?Sized> Clone for CapabilityDecl<C> {
    fn clone(&self) -> Self {
        Self {
            name: self.name,
            resolve: self.resolve.clone(),
        }
    }
}

impl<C: ?Sized> fmt::Debug for CapabilityDecl<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapabilityDecl").field("name", &self.name).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::descriptor::{Instance, ProviderId};
    use crate::container::inject::Inject;
    use crate::container::scope::LocalScope;
    use std::collections::HashMap;

    struct Roles(Vec<&'static str>);

    #[derive(Default)]
    struct RoleGuard {
        roles: Inject<Roles>,
    }

    impl Resolvable for RoleGuard {
        fn resolve(&self, injector: &mut Injector<'_>) -> Result<Self, CompositionError> {
            Ok(Self {
                roles: injector.inject(&self.roles)?,
            })
        }
    }

    impl Guard for RoleGuard {
        fn can_activate(&self, ctx: &Context) -> bool {
            ctx.attribute("role")
                .map(|role| self.roles.0.iter().any(|r| *r == role))
                .unwrap_or(false)
        }
    }

    #[test]
    fn test_guard_decl_resolves_against_scope() {
        let decl = GuardDecl::new(RoleGuard::default());
        assert_eq!(decl.dependencies().len(), 1);

        let mut local = LocalScope::new();
        local.insert_resolved(ProviderId::of::<Roles>(), Arc::new(Roles(vec!["admin"])));
        let globals: HashMap<ProviderId, Instance> = HashMap::new();
        let mut injector = Injector::new(decl.name(), "m", &local, &globals);
        let guard = decl.resolve(&mut injector).unwrap();

        assert!(guard.can_activate(&Context::new().with_attribute("role", "admin")));
        assert!(!guard.can_activate(&Context::new().with_attribute("role", "guest")));
        assert!(!guard.can_activate(&Context::new()));
    }

    #[derive(Default)]
    struct StrictGuard {
        roles: Inject<Roles>,
    }

    impl Resolvable for StrictGuard {
        fn resolve(&self, injector: &mut Injector<'_>) -> Result<Self, CompositionError> {
            let roles = injector.inject(&self.roles)?;
            if !roles.is_resolved() {
                return Err(CompositionError::unresolved(
                    "Roles",
                    0,
                    injector.owner(),
                    injector.module(),
                ));
            }
            Ok(Self { roles })
        }
    }

    impl Guard for StrictGuard {
        fn can_activate(&self, _ctx: &Context) -> bool {
            !self.roles.0.is_empty()
        }
    }

    #[test]
    fn test_dependencies_survive_failed_dry_run() {
        let decl = GuardDecl::new(StrictGuard::default());
        let dependencies = decl.dependencies();
        assert_eq!(dependencies.len(), 1);
        assert_eq!(dependencies[0].provider, ProviderId::of::<Roles>());
    }
}
