use std::collections::HashMap;

use crate::container::descriptor::{short_type_name, Instance, ProviderId};
use crate::container::inject::Injector;
use crate::container::scope::{GlobalScope, LocalScope};
use crate::errors::CompositionError;
use crate::pipeline::capability::CapabilityDecl;
use crate::pipeline::context::HandlerScope;
use crate::pipeline::controller::{ControllerDecl, Method, ResolvedController};
use crate::pipeline::entry::{Attached, PipelineEntry};
use crate::pipeline::middleware::ModuleMiddleware;
use crate::pipeline::naming::RouteNaming;
use crate::pipeline::route::RouteKey;

/// Result of binding one controller
#[derive(Debug, Default)]
pub struct BoundController {
    pub entries: Vec<PipelineEntry>,
    /// Every method the controller exposes, routable or not
    pub methods: Vec<String>,
}

/// Binds the controllers of one module against its completed scope
pub struct ControllerBinder<'a> {
    module: &'a str,
    naming: &'a dyn RouteNaming,
    middleware: &'a ModuleMiddleware,
    local: &'a LocalScope,
    global: &'a dyn GlobalScope,
}

impl<'a> ControllerBinder<'a> {
    pub fn new(
        module: &'a str,
        naming: &'a dyn RouteNaming,
        middleware: &'a ModuleMiddleware,
        local: &'a LocalScope,
        global: &'a dyn GlobalScope,
    ) -> Self {
        Self {
            module,
            naming,
            middleware,
            local,
            global,
        }
    }

    /// Resolve the controller's fields without producing pipelines
    pub fn resolve_only(&self, decl: &ControllerDecl) -> Result<(), CompositionError> {
        let mut injector = Injector::new(decl.name(), self.module, self.local, self.global);
        decl.resolve(&mut injector).map(|_| ())
    }

    /// Resolve the controller and emit one entry per route key of each method
    pub fn bind(&self, decl: &ControllerDecl) -> Result<BoundController, CompositionError> {
        let mut injector = Injector::new(decl.name(), self.module, self.local, self.global);
        let controller = decl.resolve(&mut injector)?;

        let mut bound = BoundController::default();
        let mut errors = Vec::new();

        for method in &controller.methods {
            bound.methods.push(method.name().to_string());

            let keys = controller.transport.route_keys(method.name(), self.naming);
            if keys.is_empty() {
                tracing::debug!(
                    module = self.module,
                    controller = controller.name,
                    method = method.name(),
                    "skipping non-routable method"
                );
                continue;
            }

            let scope = match self.handler_scope(&controller, method) {
                Ok(scope) => scope,
                Err(mut missing) => {
                    errors.append(&mut missing);
                    continue;
                }
            };

            for key in keys {
                match self.entry(&controller, method, key, scope.clone()) {
                    Ok(entry) => {
                        tracing::debug!(
                            module = self.module,
                            route = %entry.key,
                            owner = %entry.label(),
                            "bound route"
                        );
                        bound.entries.push(entry);
                    }
                    Err(error) => {
                        errors.push(error);
                        break;
                    }
                }
            }
        }

        match CompositionError::collect(self.module, errors) {
            Some(error) => Err(error),
            None => Ok(bound),
        }
    }

    /// Providers the handler declared, looked up locally then globally
    fn handler_scope(
        &self,
        controller: &ResolvedController,
        method: &Method,
    ) -> Result<HandlerScope, Vec<CompositionError>> {
        let mut providers: HashMap<ProviderId, Instance> = HashMap::new();
        let mut missing = Vec::new();

        for id in method.required() {
            let found = match self.local.resolved(id) {
                Some(instance) => Some(instance),
                None => self.global.lookup_global(id).map_err(|e| vec![e])?,
            };
            match found {
                Some(instance) => {
                    providers.insert(*id, instance);
                }
                None => missing.push(CompositionError::UnresolvedHandlerDependency {
                    dependency: id.type_name().to_string(),
                    handler: method.name().to_string(),
                    controller: controller.name.to_string(),
                    module: self.module.to_string(),
                }),
            }
        }

        if missing.is_empty() {
            Ok(HandlerScope::new(providers))
        } else {
            Err(missing)
        }
    }

    fn capability<C: ?Sized>(
        &self,
        decl: &CapabilityDecl<C>,
    ) -> Result<Attached<C>, CompositionError> {
        let mut injector = Injector::new(decl.name(), self.module, self.local, self.global);
        let stage = decl.resolve(&mut injector)?;
        Ok(Attached::new(short_type_name(decl.name()), stage))
    }

    fn entry(
        &self,
        controller: &ResolvedController,
        method: &Method,
        key: RouteKey,
        scope: HandlerScope,
    ) -> Result<PipelineEntry, CompositionError> {
        let middleware = self
            .middleware
            .matching(method.name(), &key)
            .into_iter()
            .map(|rule| Attached::new(rule.name(), rule.handler().clone()))
            .collect();

        // Capabilities resolve once per route key.
        let guard = controller
            .guard
            .as_ref()
            .map(|decl| self.capability(decl))
            .transpose()?;
        let interceptor = controller
            .interceptor
            .as_ref()
            .map(|decl| self.capability(decl))
            .transpose()?;
        let exception_filter = controller
            .exception_filter
            .as_ref()
            .map(|decl| self.capability(decl))
            .transpose()?;

        Ok(PipelineEntry {
            key,
            module: self.module.to_string(),
            controller: controller.name.to_string(),
            method: method.name().to_string(),
            middleware,
            guard,
            interceptor,
            handler: method.handler().clone(),
            exception_filter,
            scope,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::container::inject::{Inject, Resolvable};
    use crate::errors::HandlerResult;
    use crate::pipeline::capability::{Guard, GuardDecl};
    use crate::pipeline::context::Context;
    use crate::pipeline::controller::{Controller, RestDescriptor, Transport};
    use crate::pipeline::middleware::MiddlewareRule;
    use crate::pipeline::naming::ConventionNaming;
    use crate::pipeline::route::HttpMethod;

    struct Clock(u64);

    #[derive(Default)]
    struct OpenGuard;

    impl Resolvable for OpenGuard {
        fn resolve(&self, _injector: &mut Injector<'_>) -> Result<Self, CompositionError> {
            Ok(OpenGuard)
        }
    }

    impl Guard for OpenGuard {
        fn can_activate(&self, _ctx: &Context) -> bool {
            true
        }
    }

    #[derive(Default)]
    struct TimeController {
        clock: Inject<Clock>,
    }

    impl Resolvable for TimeController {
        fn resolve(&self, injector: &mut Injector<'_>) -> Result<Self, CompositionError> {
            Ok(Self {
                clock: injector.inject(&self.clock)?,
            })
        }
    }

    impl TimeController {
        fn now(&self, ctx: &mut Context) -> HandlerResult {
            ctx.set_attribute("now", self.clock.0.to_string());
            Ok(())
        }
    }

    impl Controller for TimeController {
        fn transport(&self) -> Transport {
            Transport::Rest(RestDescriptor::new().version("v1"))
        }

        fn methods(self: Arc<Self>) -> Vec<Method> {
            vec![
                Method::bind(&self, "READ_time", Self::now),
                Method::bind(&self, "helper", Self::now),
                Method::bind(&self, "READ_ticks", Self::now).requires::<Clock>(),
            ]
        }

        fn guard(&self) -> Option<GuardDecl> {
            Some(GuardDecl::new(OpenGuard))
        }
    }

    fn scope_with_clock() -> LocalScope {
        let mut local = LocalScope::new();
        local.insert_resolved(ProviderId::of::<Clock>(), Arc::new(Clock(99)));
        local
    }

    fn noop(_ctx: &mut Context) -> HandlerResult {
        Ok(())
    }

    #[test]
    fn test_bind_emits_routable_methods_only() {
        let local = scope_with_clock();
        let globals: HashMap<ProviderId, Instance> = HashMap::new();
        let middleware = ModuleMiddleware::new()
            .rule(MiddlewareRule::new("audit", noop).only(["READ_ticks"]));
        let binder = ControllerBinder::new("time", &ConventionNaming, &middleware, &local, &globals);

        let bound = binder.bind(&ControllerDecl::new(TimeController::default())).unwrap();

        assert_eq!(bound.methods, vec!["READ_time", "helper", "READ_ticks"]);
        let keys: Vec<RouteKey> = bound.entries.iter().map(|e| e.key.clone()).collect();
        assert_eq!(
            keys,
            vec![
                RouteKey::rest(HttpMethod::Get, "/v1/time"),
                RouteKey::rest(HttpMethod::Get, "/v1/ticks"),
            ]
        );
        assert!(bound.entries[0].middleware.is_empty());
        assert_eq!(bound.entries[1].middleware[0].name, "audit");
        assert_eq!(bound.entries[0].guard.as_ref().unwrap().name, "OpenGuard");
        assert!(bound.entries[1].scope.contains(&ProviderId::of::<Clock>()));

        let mut ctx = Context::new();
        bound.entries[0].dispatch(&mut ctx).unwrap();
        assert_eq!(ctx.attribute("now"), Some("99"));
    }

    #[test]
    fn test_missing_field_dependency_fails_binding() {
        let local = LocalScope::new();
        let globals: HashMap<ProviderId, Instance> = HashMap::new();
        let middleware = ModuleMiddleware::new();
        let binder = ControllerBinder::new("time", &ConventionNaming, &middleware, &local, &globals);

        let error = binder.bind(&ControllerDecl::new(TimeController::default())).unwrap_err();
        assert!(matches!(error, CompositionError::UnresolvedDependency { index: 0, .. }));
        assert!(binder.resolve_only(&ControllerDecl::new(TimeController::default())).is_err());
    }

    #[derive(Default)]
    struct NeedyController;

    impl Resolvable for NeedyController {
        fn resolve(&self, _injector: &mut Injector<'_>) -> Result<Self, CompositionError> {
            Ok(NeedyController)
        }
    }

    impl Controller for NeedyController {
        fn transport(&self) -> Transport {
            Transport::Rest(RestDescriptor::new())
        }

        fn methods(self: Arc<Self>) -> Vec<Method> {
            vec![Method::new("READ_needs", noop).requires::<Clock>()]
        }
    }

    #[test]
    fn test_missing_handler_dependency() {
        let local = LocalScope::new();
        let globals: HashMap<ProviderId, Instance> = HashMap::new();
        let middleware = ModuleMiddleware::new();
        let binder = ControllerBinder::new("needy", &ConventionNaming, &middleware, &local, &globals);

        let error = binder.bind(&ControllerDecl::new(NeedyController)).unwrap_err();
        match error {
            CompositionError::UnresolvedHandlerDependency { handler, module, .. } => {
                assert_eq!(handler, "READ_needs");
                assert_eq!(module, "needy");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[derive(Default)]
    struct HealthController;

    impl Resolvable for HealthController {
        fn resolve(&self, _injector: &mut Injector<'_>) -> Result<Self, CompositionError> {
            Ok(HealthController)
        }
    }

    impl Controller for HealthController {
        fn transport(&self) -> Transport {
            Transport::Rest(RestDescriptor::new())
        }

        fn methods(self: Arc<Self>) -> Vec<Method> {
            vec![Method::new("DO_ping", noop)]
        }
    }

    #[test]
    fn test_do_method_binds_one_entry_per_verb() {
        let local = LocalScope::new();
        let globals: HashMap<ProviderId, Instance> = HashMap::new();
        let middleware = ModuleMiddleware::new()
            .rule(MiddlewareRule::new("reads", noop).on_verbs([HttpMethod::Get]));
        let binder = ControllerBinder::new("health", &ConventionNaming, &middleware, &local, &globals);

        let bound = binder.bind(&ControllerDecl::new(HealthController)).unwrap();

        assert_eq!(bound.methods, vec!["DO_ping"]);
        let verbs: Vec<Option<HttpMethod>> =
            bound.entries.iter().map(|e| e.key.http_method()).collect();
        assert_eq!(
            verbs,
            vec![
                Some(HttpMethod::Get),
                Some(HttpMethod::Post),
                Some(HttpMethod::Put),
                Some(HttpMethod::Patch),
                Some(HttpMethod::Delete),
            ]
        );
        assert!(bound.entries.iter().all(|e| e.key.to_string().ends_with(" /ping")));
        assert_eq!(bound.entries[0].middleware.len(), 1);
        assert!(bound.entries[1].middleware.is_empty());
    }
}
