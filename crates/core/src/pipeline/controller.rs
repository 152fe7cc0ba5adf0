use std::fmt;
use std::sync::Arc;

use crate::container::descriptor::ProviderId;
use crate::container::inject::{Dependency, Injector, Resolvable};
use crate::errors::{CompositionError, HandlerResult};
use crate::pipeline::capability::{ExceptionFilterDecl, GuardDecl, InterceptorDecl};
use crate::pipeline::context::Context;
use crate::pipeline::naming::RouteNaming;
use crate::pipeline::route::{HttpMethod, RouteKey};

/// Signature shared by handlers and module middleware
pub type StageFn = dyn Fn(&mut Context) -> HandlerResult + Send + Sync;

/// Final stage of a pipeline
pub type HandlerFn = Arc<StageFn>;

/// A method a controller exposes for routing
#[derive(Clone)]
pub struct Method {
    name: String,
    handler: HandlerFn,
    requires: Vec<ProviderId>,
}

impl Method {
    pub fn new<F>(name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&mut Context) -> HandlerResult + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            handler: Arc::new(handler),
            requires: Vec::new(),
        }
    }

    /// Bind a method of the resolved controller
    pub fn bind<C: Send + Sync + 'static>(
        controller: &Arc<C>,
        name: impl Into<String>,
        handler: fn(&C, &mut Context) -> HandlerResult,
    ) -> Self {
        let controller = controller.clone();
        Self::new(name, move |ctx| handler(&controller, ctx))
    }

    /// Declare a provider the handler reads through `Context::provider`
    pub fn requires<T: Send + Sync + 'static>(mut self) -> Self {
        self.requires.push(ProviderId::of::<T>());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn handler(&self) -> &HandlerFn {
        &self.handler
    }

    pub fn required(&self) -> &[ProviderId] {
        &self.requires
    }
}

impl fmt::Debug for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Method")
            .field("name", &self.name)
            .field("requires", &self.requires)
            .finish()
    }
}

/// REST descriptor: optional version prefix and explicit routes
///
/// Methods without an explicit route fall back to the context's naming
/// convention.
#[derive(Debug, Clone, Default)]
pub struct RestDescriptor {
    version: Option<String>,
    routes: Vec<(String, HttpMethod, String)>,
}

impl RestDescriptor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Prefix every route with `/{version}`
    pub fn version(mut self, version: impl Into<String>) -> Self {
        let version = version.into();
        let trimmed = version.trim_matches('/');
        self.version = if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        };
        self
    }

    /// Map a method to a route; may be repeated to bind several routes
    pub fn route(
        mut self,
        method_name: impl Into<String>,
        http_method: HttpMethod,
        path: impl Into<String>,
    ) -> Self {
        self.routes.push((method_name.into(), http_method, path.into()));
        self
    }

    pub fn version_prefix(&self) -> Option<&str> {
        self.version.as_deref()
    }

    /// Route keys for a method, empty if the method is not routable
    pub fn route_keys(&self, method_name: &str, naming: &dyn RouteNaming) -> Vec<RouteKey> {
        let explicit: Vec<(HttpMethod, String)> = self
            .routes
            .iter()
            .filter(|(name, _, _)| name == method_name)
            .map(|(_, method, path)| (*method, path.clone()))
            .collect();

        let routes = if explicit.is_empty() {
            match naming.parse(method_name) {
                Some((verbs, path)) => verbs
                    .methods()
                    .into_iter()
                    .map(|method| (method, path.clone()))
                    .collect(),
                None => Vec::new(),
            }
        } else {
            explicit
        };

        routes
            .into_iter()
            .map(|(method, path)| match &self.version {
                Some(version) => RouteKey::rest(method, &format!("{}/{}", version, path)),
                None => RouteKey::rest(method, &path),
            })
            .collect()
    }
}

/// Event-based descriptor: subprotocol plus event name overrides
///
/// A method's event name is the method name unless overridden.
#[derive(Debug, Clone)]
pub struct WsDescriptor {
    subprotocol: String,
    events: Vec<(String, String)>,
}

impl WsDescriptor {
    pub fn new(subprotocol: impl Into<String>) -> Self {
        Self {
            subprotocol: subprotocol.into(),
            events: Vec::new(),
        }
    }

    pub fn event(mut self, method_name: impl Into<String>, event: impl Into<String>) -> Self {
        self.events.push((method_name.into(), event.into()));
        self
    }

    pub fn subprotocol(&self) -> &str {
        &self.subprotocol
    }

    pub fn route_key(&self, method_name: &str) -> RouteKey {
        let event = self
            .events
            .iter()
            .find(|(name, _)| name == method_name)
            .map(|(_, event)| event.as_str())
            .unwrap_or(method_name);
        RouteKey::ws(self.subprotocol.clone(), event)
    }
}

/// Transport a controller's methods are bound to
#[derive(Debug, Clone)]
pub enum Transport {
    Rest(RestDescriptor),
    Ws(WsDescriptor),
}

impl Transport {
    pub fn route_keys(&self, method_name: &str, naming: &dyn RouteNaming) -> Vec<RouteKey> {
        match self {
            Transport::Rest(rest) => rest.route_keys(method_name, naming),
            Transport::Ws(ws) => vec![ws.route_key(method_name)],
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Transport::Rest(_) => "rest",
            Transport::Ws(_) => "ws",
        }
    }
}

/// A bundle of route-producing methods
///
/// Fields are injected like a provider's. `methods` is called on the resolved
/// controller, so handlers can capture it.
pub trait Controller: Resolvable {
    fn transport(&self) -> Transport;

    fn methods(self: Arc<Self>) -> Vec<Method>;

    fn guard(&self) -> Option<GuardDecl> {
        None
    }

    fn interceptor(&self) -> Option<InterceptorDecl> {
        None
    }

    fn exception_filter(&self) -> Option<ExceptionFilterDecl> {
        None
    }
}

/// A controller after its fields were injected
#[derive(Debug, Clone)]
pub struct ResolvedController {
    pub name: &'static str,
    pub transport: Transport,
    pub methods: Vec<Method>,
    pub guard: Option<GuardDecl>,
    pub interceptor: Option<InterceptorDecl>,
    pub exception_filter: Option<ExceptionFilterDecl>,
}

type ResolveController =
    Arc<dyn Fn(&mut Injector<'_>) -> Result<ResolvedController, CompositionError> + Send + Sync>;

/// Type-erased controller declaration held by a module
#[derive(Clone)]
pub struct ControllerDecl {
    name: &'static str,
    resolve: ResolveController,
}

impl ControllerDecl {
    pub fn new<C: Controller>(declared: C) -> Self {
        let declared = Arc::new(declared);
        let name = std::any::type_name::<C>();
        Self {
            name,
            resolve: Arc::new(move |injector: &mut Injector<'_>| {
                let resolved = Arc::new(declared.resolve(injector)?);
                Ok(ResolvedController {
                    name,
                    transport: resolved.transport(),
                    guard: resolved.guard(),
                    interceptor: resolved.interceptor(),
                    exception_filter: resolved.exception_filter(),
                    methods: resolved.methods(),
                })
            }),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn resolve(&self, injector: &mut Injector<'_>) -> Result<ResolvedController, CompositionError> {
        (self.resolve)(injector)
    }

    /// Slots of the controller's own fields
    pub fn dependencies(&self) -> Vec<Dependency> {
        let mut injector = Injector::collecting(self.name);
        if let Err(error) = (self.resolve)(&mut injector) {
            tracing::debug!(controller = self.name, %error, "dependency listing stopped early");
        }
        injector.into_dependencies()
    }
}

impl fmt::Debug for ControllerDecl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControllerDecl").field("name", &self.name).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::inject::Inject;
    use crate::pipeline::naming::ConventionNaming;

    #[test]
    fn test_rest_route_keys_use_naming_fallback_and_version() {
        let rest = RestDescriptor::new()
            .version("/v1/")
            .route("list", HttpMethod::Get, "/users/");

        assert_eq!(
            rest.route_keys("list", &ConventionNaming),
            vec![RouteKey::rest(HttpMethod::Get, "/v1/users")]
        );
        assert_eq!(
            rest.route_keys("READ_users_BY_id", &ConventionNaming),
            vec![RouteKey::rest(HttpMethod::Get, "/v1/users/{id}")]
        );
        assert!(rest.route_keys("helper", &ConventionNaming).is_empty());
    }

    #[test]
    fn test_do_method_expands_to_every_verb() {
        let rest = RestDescriptor::new().version("v2");
        let keys = rest.route_keys("DO_health", &ConventionNaming);
        assert_eq!(
            keys,
            vec![
                RouteKey::rest(HttpMethod::Get, "/v2/health"),
                RouteKey::rest(HttpMethod::Post, "/v2/health"),
                RouteKey::rest(HttpMethod::Put, "/v2/health"),
                RouteKey::rest(HttpMethod::Patch, "/v2/health"),
                RouteKey::rest(HttpMethod::Delete, "/v2/health"),
            ]
        );
    }

    #[test]
    fn test_rest_method_may_bind_several_routes() {
        let rest = RestDescriptor::new()
            .route("upsert", HttpMethod::Put, "/items")
            .route("upsert", HttpMethod::Patch, "/items");
        assert_eq!(rest.route_keys("upsert", &ConventionNaming).len(), 2);
    }

    #[test]
    fn test_ws_event_defaults_to_method_name() {
        let ws = WsDescriptor::new("chat").event("on_join", "join");
        assert_eq!(ws.route_key("on_join"), RouteKey::ws("chat", "join"));
        assert_eq!(ws.route_key("leave"), RouteKey::ws("chat", "leave"));
    }

    #[test]
    fn test_method_requires() {
        struct Clock;
        let method = Method::new("READ_time", |_ctx| Ok(())).requires::<Clock>();
        assert_eq!(method.name(), "READ_time");
        assert_eq!(method.required(), &[ProviderId::of::<Clock>()]);
    }

    struct Clock;

    #[derive(Default)]
    struct StrictController {
        clock: Inject<Clock>,
    }

    impl Resolvable for StrictController {
        fn resolve(&self, injector: &mut Injector<'_>) -> Result<Self, CompositionError> {
            let clock = injector.inject(&self.clock)?;
            if !clock.is_resolved() {
                return Err(CompositionError::unresolved(
                    "Clock",
                    0,
                    injector.owner(),
                    injector.module(),
                ));
            }
            Ok(Self { clock })
        }
    }

    impl Controller for StrictController {
        fn transport(&self) -> Transport {
            Transport::Rest(RestDescriptor::new())
        }

        fn methods(self: Arc<Self>) -> Vec<Method> {
            Vec::new()
        }
    }

    #[test]
    fn test_controller_dependencies_survive_failed_dry_run() {
        let decl = ControllerDecl::new(StrictController::default());
        let dependencies = decl.dependencies();
        assert_eq!(dependencies.len(), 1);
        assert_eq!(dependencies[0].provider, ProviderId::of::<Clock>());
    }
}
