use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use uuid::Uuid;

use crate::container::descriptor::ProviderId;
use crate::container::inject::Resolvable;
use crate::container::provider::ProviderDecl;
use crate::modules::dynamic::DynamicModule;
use crate::pipeline::controller::{Controller, ControllerDecl};
use crate::pipeline::middleware::{MiddlewareRule, ModuleMiddleware};

/// Opaque identity of a module declaration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct ModuleId(Uuid);

impl ModuleId {
    fn generate() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Hook run once, when the module starts initializing
pub type InitHook = Arc<dyn Fn() + Send + Sync>;

/// A node of the composition graph
///
/// Modules are immutable once built and shared by `Arc`; importing the same
/// `Arc` from several places refers to one module with one initialization.
pub struct Module {
    id: ModuleId,
    name: String,
    global: bool,
    on_init: Option<InitHook>,
    imports: Vec<Arc<Module>>,
    dynamic_imports: Vec<DynamicModule>,
    providers: Vec<ProviderDecl>,
    exports: Vec<ProviderId>,
    controllers: Vec<ControllerDecl>,
    middleware: ModuleMiddleware,
}

impl Module {
    pub fn builder(name: impl Into<String>) -> ModuleBuilder {
        ModuleBuilder::new(name)
    }

    pub fn id(&self) -> ModuleId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Global modules publish their exports to every module of the context
    pub fn is_global(&self) -> bool {
        self.global
    }

    pub fn on_init(&self) -> Option<&InitHook> {
        self.on_init.as_ref()
    }

    pub fn imports(&self) -> &[Arc<Module>] {
        &self.imports
    }

    pub fn dynamic_imports(&self) -> &[DynamicModule] {
        &self.dynamic_imports
    }

    pub fn providers(&self) -> &[ProviderDecl] {
        &self.providers
    }

    pub fn exports(&self) -> &[ProviderId] {
        &self.exports
    }

    pub fn controllers(&self) -> &[ControllerDecl] {
        &self.controllers
    }

    pub fn middleware(&self) -> &ModuleMiddleware {
        &self.middleware
    }

    /// Check if the module itself declares a provider for `id`
    pub fn declares(&self, id: &ProviderId) -> bool {
        self.providers.iter().any(|p| &p.id() == id)
    }
}

impl fmt::Debug for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Module")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("global", &self.global)
            .field(
                "imports",
                &self.imports.iter().map(|m| m.name()).collect::<Vec<_>>(),
            )
            .field(
                "dynamic_imports",
                &self.dynamic_imports.iter().map(|d| d.name()).collect::<Vec<_>>(),
            )
            .field("providers", &self.providers)
            .field("exports", &self.exports)
            .field("controllers", &self.controllers)
            .finish()
    }
}

/// Builder for module declarations
pub struct ModuleBuilder {
    name: String,
    global: bool,
    on_init: Option<InitHook>,
    imports: Vec<Arc<Module>>,
    dynamic_imports: Vec<DynamicModule>,
    providers: Vec<ProviderDecl>,
    exports: Vec<ProviderId>,
    controllers: Vec<ControllerDecl>,
    middleware: ModuleMiddleware,
}

impl ModuleBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            global: false,
            on_init: None,
            imports: Vec::new(),
            dynamic_imports: Vec::new(),
            providers: Vec::new(),
            exports: Vec::new(),
            controllers: Vec::new(),
            middleware: ModuleMiddleware::new(),
        }
    }

    pub fn global(mut self) -> Self {
        self.global = true;
        self
    }

    pub fn on_init<F>(mut self, hook: F) -> Self
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.on_init = Some(Arc::new(hook));
        self
    }

    pub fn import(mut self, module: &Arc<Module>) -> Self {
        self.imports.push(module.clone());
        self
    }

    pub fn import_dynamic(mut self, module: &DynamicModule) -> Self {
        self.dynamic_imports.push(module.clone());
        self
    }

    /// Declare a provider; providers resolve in declaration order
    pub fn provider<P: Resolvable>(mut self, provider: P) -> Self {
        self.providers.push(ProviderDecl::new(provider));
        self
    }

    /// Export a provider, own or imported, to importing modules
    pub fn export<T: Send + Sync + 'static>(mut self) -> Self {
        self.exports.push(ProviderId::of::<T>());
        self
    }

    pub fn controller<C: Controller>(mut self, controller: C) -> Self {
        self.controllers.push(ControllerDecl::new(controller));
        self
    }

    pub fn middleware(mut self, rule: MiddlewareRule) -> Self {
        self.middleware.push(rule);
        self
    }

    pub fn build(self) -> Arc<Module> {
        Arc::new(Module {
            id: ModuleId::generate(),
            name: self.name,
            global: self.global,
            on_init: self.on_init,
            imports: self.imports,
            dynamic_imports: self.dynamic_imports,
            providers: self.providers,
            exports: self.exports,
            controllers: self.controllers,
            middleware: self.middleware,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::inject::Injector;
    use crate::errors::CompositionError;

    struct Clock;

    impl Resolvable for Clock {
        fn resolve(&self, _injector: &mut Injector<'_>) -> Result<Self, CompositionError> {
            Ok(Clock)
        }
    }

    #[test]
    fn test_builder_collects_declarations() {
        let time = Module::builder("time").provider(Clock).export::<Clock>().build();
        let app = Module::builder("app").global().import(&time).build();

        assert_eq!(app.name(), "app");
        assert!(app.is_global());
        assert_eq!(app.imports().len(), 1);
        assert!(Arc::ptr_eq(&app.imports()[0], &time));
        assert!(time.declares(&ProviderId::of::<Clock>()));
        assert_eq!(time.exports(), &[ProviderId::of::<Clock>()]);
        assert!(!time.is_global());
    }

    #[test]
    fn test_each_build_gets_a_new_identity() {
        let a = Module::builder("same").build();
        let b = Module::builder("same").build();
        assert_ne!(a.id(), b.id());
    }
}
