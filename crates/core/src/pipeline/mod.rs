pub mod binder;
pub mod capability;
pub mod context;
pub mod controller;
pub mod entry;
pub mod middleware;
pub mod naming;
pub mod route;
pub mod set;

pub use binder::{BoundController, ControllerBinder};
pub use capability::{
    CapabilityDecl, ExceptionFilter, ExceptionFilterDecl, Guard, GuardDecl, Interceptor,
    InterceptorDecl,
};
pub use context::{Context, HandlerScope};
pub use controller::{
    Controller, ControllerDecl, HandlerFn, Method, ResolvedController, RestDescriptor, StageFn,
    Transport, WsDescriptor,
};
pub use entry::{Attached, PipelineEntry, Stage};
pub use middleware::{MethodSelector, MiddlewareFn, MiddlewareRule, ModuleMiddleware};
pub use naming::{ConventionNaming, RouteNaming, Verbs};
pub use route::{to_endpoint, HttpMethod, RouteKey};
pub use set::{
    Collision, PipelineManifest, PipelineSet, RouteManifest, RouteSink, StageManifest,
    TransportView,
};
