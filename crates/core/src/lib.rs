pub mod app;
pub mod config;
pub mod container;
pub mod errors;
pub mod logging;
pub mod modules;
pub mod pipeline;

// Re-export key types for convenience
pub use app::{initialize, Application, BootstrapError};
pub use config::{ComposerConfig, ConfigError, ConfigSource, EnvConfig, RouteCollisions};
pub use container::{Inject, Injector, ProviderId, Resolvable, Tier};
pub use errors::{CompositionError, HandlerError, HandlerResult};
pub use logging::{init_logging, LogFormat, LoggingConfig, LoggingError};
pub use modules::{
    CompositionContext, DynamicModule, Module, ModuleBuilder, ModuleId, ModuleState,
    ResolvedModule,
};
pub use pipeline::{
    Context, Controller, ConventionNaming, ExceptionFilter, ExceptionFilterDecl, Guard,
    GuardDecl, HttpMethod, Interceptor, InterceptorDecl, Method, MiddlewareRule, PipelineEntry,
    PipelineSet, RestDescriptor, RouteKey, RouteNaming, RouteSink, Transport, Verbs, WsDescriptor,
};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get crate version
pub fn version() -> &'static str {
    VERSION
}
