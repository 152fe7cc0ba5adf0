pub mod definition;
pub mod dynamic;
pub mod resolved;
pub mod runtime;

pub use definition::{InitHook, Module, ModuleBuilder, ModuleId};
pub use dynamic::{DynamicModule, DynamicModuleCache, FactoryId, ModuleFactory};
pub use resolved::ResolvedModule;
pub use runtime::{CompositionContext, CompositionContextBuilder, ModuleState};
