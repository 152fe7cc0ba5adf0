//! Module initialization
//!
//! [`CompositionContext`] owns every table the engine shares between modules
//! and initializes the graph from its root:
//!
//! - the first module initialized in a context becomes the root, and the
//!   modules it reaches (statically or through dynamic factories) become
//!   activatable, so their controllers get bound into pipelines
//! - each module initializes at most once, whatever the number of importers
//!   or calling threads; callers block while another thread initializes it
//! - providers resolve against the module's local scope, then the global tier
//! - any configuration error fails the whole call with a `CompositionError`

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, ThreadId};

use crate::config::{ComposerConfig, RouteCollisions};
use crate::container::descriptor::{Instance, ProviderId};
use crate::container::inject::Injector;
use crate::container::registry::{resolve_memoized, ProviderRegistry};
use crate::container::scope::{GlobalScope, LocalScope};
use crate::errors::CompositionError;
use crate::modules::definition::{Module, ModuleId};
use crate::modules::dynamic::DynamicModuleCache;
use crate::modules::resolved::ResolvedModule;
use crate::pipeline::binder::ControllerBinder;
use crate::pipeline::naming::{ConventionNaming, RouteNaming};
use crate::pipeline::set::PipelineSet;

/// Observable state of a module within a context
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModuleState {
    /// Not reached yet
    Uninitialized,
    /// A thread is initializing the module
    Initializing,
    /// Initialized successfully
    Ready,
    /// Initialization failed; every later call observes this error
    Failed(CompositionError),
}

enum SlotState {
    Uninitialized,
    Initializing(ThreadId),
    Ready(Arc<ResolvedModule>),
    Failed(CompositionError),
}

#[derive(Default)]
struct ModuleSlot {
    state: Mutex<SlotState>,
    settled: Condvar,
}

impl Default for SlotState {
    fn default() -> Self {
        SlotState::Uninitialized
    }
}

/// Marks a claimed slot; settles it as failed if initialization unwinds
struct InFlight<'a> {
    slot: &'a ModuleSlot,
    module: &'a str,
    settled: bool,
}

impl InFlight<'_> {
    fn settle(
        mut self,
        result: Result<Arc<ResolvedModule>, CompositionError>,
    ) -> Result<Arc<ResolvedModule>, CompositionError> {
        let next = match &result {
            Ok(resolved) => SlotState::Ready(resolved.clone()),
            Err(error) => SlotState::Failed(error.clone()),
        };
        self.store(next);
        self.settled = true;
        result
    }

    fn store(&self, next: SlotState) {
        let mut state = self.slot.state.lock().unwrap_or_else(PoisonError::into_inner);
        *state = next;
        drop(state);
        self.slot.settled.notify_all();
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if !self.settled {
            tracing::error!("Initialization of module '{}' panicked", self.module);
            self.store(SlotState::Failed(CompositionError::InitializationPanicked {
                module: self.module.to_string(),
            }));
        }
    }
}

/// Tables shared by every module of a context
#[derive(Default)]
struct Registries {
    root: Option<ModuleId>,
    activatable: HashSet<ModuleId>,
    slots: HashMap<ModuleId, Arc<ModuleSlot>>,
    providers: ProviderRegistry,
}

/// Owner of all composition state
///
/// Independent contexts never share singletons, global providers or
/// dynamic modules.
pub struct CompositionContext {
    config: ComposerConfig,
    naming: Arc<dyn RouteNaming>,
    registries: Mutex<Registries>,
    dynamic: DynamicModuleCache,
}

impl fmt::Debug for CompositionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositionContext")
            .field("config", &self.config)
            .field("dynamic", &self.dynamic)
            .finish()
    }
}

impl Default for CompositionContext {
    fn default() -> Self {
        Self::new()
    }
}

impl CompositionContext {
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub fn builder() -> CompositionContextBuilder {
        CompositionContextBuilder::default()
    }

    pub fn config(&self) -> &ComposerConfig {
        &self.config
    }

    pub fn naming(&self) -> &dyn RouteNaming {
        self.naming.as_ref()
    }

    fn registries(&self) -> Result<MutexGuard<'_, Registries>, CompositionError> {
        self.registries
            .lock()
            .map_err(|_| CompositionError::lock_poisoned("composition registries"))
    }

    /// Identity of the root module, once one was initialized
    pub fn root(&self) -> Option<ModuleId> {
        self.registries().ok().and_then(|r| r.root)
    }

    pub fn is_activatable(&self, id: ModuleId) -> bool {
        self.registries()
            .map(|r| r.activatable.contains(&id))
            .unwrap_or(false)
    }

    /// A provider published to the global tier
    pub fn global<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.lookup_global(&ProviderId::of::<T>())
            .ok()
            .flatten()
            .and_then(|instance| instance.downcast::<T>().ok())
    }

    pub fn state(&self, module: &Module) -> Result<ModuleState, CompositionError> {
        let slot = match self.registries()?.slots.get(&module.id()) {
            Some(slot) => slot.clone(),
            None => return Ok(ModuleState::Uninitialized),
        };
        let state = slot
            .state
            .lock()
            .map_err(|_| CompositionError::lock_poisoned(format!("module slot '{}'", module.name())))?;
        Ok(match &*state {
            SlotState::Uninitialized => ModuleState::Uninitialized,
            SlotState::Initializing(_) => ModuleState::Initializing,
            SlotState::Ready(_) => ModuleState::Ready,
            SlotState::Failed(error) => ModuleState::Failed(error.clone()),
        })
    }

    /// Initialize a module and everything it imports
    ///
    /// Idempotent per module: every call after the first returns the same
    /// `ResolvedModule`, or the same error.
    pub fn initialize(&self, module: &Arc<Module>) -> Result<Arc<ResolvedModule>, CompositionError> {
        let mut ancestry = Vec::new();
        self.initialize_in(module, &mut ancestry)
    }

    fn slot(&self, id: ModuleId) -> Result<Arc<ModuleSlot>, CompositionError> {
        Ok(self.registries()?.slots.entry(id).or_default().clone())
    }

    fn initialize_in(
        &self,
        module: &Arc<Module>,
        ancestry: &mut Vec<String>,
    ) -> Result<Arc<ResolvedModule>, CompositionError> {
        let slot = self.slot(module.id())?;
        let current = thread::current().id();

        {
            let mut state = slot.state.lock().map_err(|_| {
                CompositionError::lock_poisoned(format!("module slot '{}'", module.name()))
            })?;
            loop {
                let busy = match &*state {
                    SlotState::Ready(resolved) => return Ok(resolved.clone()),
                    SlotState::Failed(error) => return Err(error.clone()),
                    SlotState::Initializing(owner) if *owner == current => {
                        let start = ancestry
                            .iter()
                            .position(|name| name == module.name())
                            .unwrap_or(0);
                        let mut path = ancestry[start..].to_vec();
                        path.push(module.name().to_string());
                        return Err(CompositionError::CircularImport { path });
                    }
                    SlotState::Initializing(_) => true,
                    SlotState::Uninitialized => false,
                };

                if !busy {
                    *state = SlotState::Initializing(current);
                    break;
                }

                tracing::debug!(
                    "Waiting for module '{}' initialized by another thread",
                    module.name()
                );
                state = slot.settled.wait(state).map_err(|_| {
                    CompositionError::lock_poisoned(format!("module slot '{}'", module.name()))
                })?;
            }
        }

        let in_flight = InFlight {
            slot: &slot,
            module: module.name(),
            settled: false,
        };

        ancestry.push(module.name().to_string());
        let result = self.run(module, ancestry);
        ancestry.pop();

        if let Err(error) = &result {
            tracing::error!("Module '{}' failed to initialize: {}", module.name(), error);
        }
        in_flight.settle(result)
    }

    /// Modules reachable from `module`, itself included, each once
    fn closure(&self, module: &Arc<Module>) -> Result<Vec<Arc<Module>>, CompositionError> {
        let mut seen = HashSet::new();
        let mut reached = Vec::new();
        let mut pending = vec![module.clone()];

        while let Some(next) = pending.pop() {
            if !seen.insert(next.id()) {
                continue;
            }
            for import in next.imports().iter().rev() {
                pending.push(import.clone());
            }
            for dynamic in next.dynamic_imports().iter().rev() {
                pending.push(self.dynamic.get_or_create(dynamic)?);
            }
            reached.push(next);
        }

        Ok(reached)
    }

    /// Record `module` as root if the context has none yet
    ///
    /// Returns the global modules of the root's closure, which must be
    /// initialized before anything else.
    fn claim_root(&self, module: &Arc<Module>) -> Result<Option<Vec<Arc<Module>>>, CompositionError> {
        if self.registries()?.root.is_some() {
            return Ok(None);
        }

        let closure = self.closure(module)?;
        let mut registries = self.registries()?;
        if registries.root.is_some() {
            return Ok(None);
        }

        registries.root = Some(module.id());
        registries
            .activatable
            .extend(closure.iter().map(|m| m.id()));
        drop(registries);

        tracing::info!(
            "Module '{}' is the root; {} modules are activatable",
            module.name(),
            closure.len()
        );

        Ok(Some(
            closure
                .into_iter()
                .filter(|m| m.is_global() && m.id() != module.id())
                .collect(),
        ))
    }

    fn mark_activatable(&self, module: &Arc<Module>) -> Result<(), CompositionError> {
        let closure = self.closure(module)?;
        self.registries()?
            .activatable
            .extend(closure.iter().map(|m| m.id()));
        Ok(())
    }

    fn run(
        &self,
        module: &Arc<Module>,
        ancestry: &mut Vec<String>,
    ) -> Result<Arc<ResolvedModule>, CompositionError> {
        let name = module.name();
        tracing::info!("Initializing module '{}'", name);

        let globals = self.claim_root(module)?;
        let is_root = globals.is_some();
        if is_root && module.is_global() {
            self.publish_root_exports(module)?;
        }
        for global in globals.iter().flatten() {
            self.initialize_in(global, ancestry)
                .map_err(|e| e.imported_by(name, global.name()))?;
        }
        let activatable = self.registries()?.activatable.contains(&module.id());

        if let Some(hook) = module.on_init() {
            hook();
        }

        let mut assembly = Assembly::default();

        for import in module.imports() {
            let child = self
                .initialize_in(import, ancestry)
                .map_err(|e| e.imported_by(name, import.name()))?;
            assembly.merge(&child);
        }

        for dynamic in module.dynamic_imports() {
            let created = self.dynamic.get_or_create(dynamic)?;
            self.mark_activatable(&created)?;
            let child = self
                .initialize_in(&created, ancestry)
                .map_err(|e| e.imported_by(name, dynamic.name()))?;
            assembly.merge(&child);
        }

        self.resolve_providers(module, &mut assembly)?;
        self.collect_exports(module, &mut assembly)?;

        if module.is_global() || is_root {
            // A non-global root only publishes what it exports itself.
            let published: &[ProviderId] = if module.is_global() {
                assembly.exports.as_slice()
            } else {
                module.exports()
            };
            let mut registries = self.registries()?;
            for id in published {
                if let Some(instance) = assembly.local.resolved(id) {
                    if registries.providers.publish_global(*id, instance) {
                        tracing::debug!("Module '{}' published '{}' globally", name, id);
                    }
                }
            }
        }

        let own = self.bind_controllers(module, activatable, &assembly.local)?;
        let resolved = assembly.finish(module, activatable, own);

        if is_root {
            self.check_collisions(resolved.pipelines())?;
        }

        tracing::info!(
            "Module '{}' ready ({} providers, {} exports, {} routes)",
            name,
            resolved.provider_count(),
            resolved.exports().len(),
            resolved.pipelines().len()
        );
        Ok(Arc::new(resolved))
    }

    /// Resolve and publish a global root's own exports ahead of its imports
    ///
    /// These providers can only use the global tier and pass-through fields;
    /// an own declaration they inject is reported as out of order.
    fn publish_root_exports(&self, module: &Module) -> Result<(), CompositionError> {
        let name = module.name();
        let mut pending = LocalScope::new();
        for decl in module.providers() {
            pending.declare(decl.id());
        }

        let mut errors = Vec::new();
        for decl in module.providers() {
            if !module.exports().contains(&decl.id()) || !pending.contains(&decl.id()) {
                continue;
            }

            let slot = self.registries()?.providers.memo_slot(decl.id());
            let outcome = {
                let mut injector = Injector::new(decl.name(), name, &pending, self);
                resolve_memoized(&slot, decl, &mut injector)
            };

            match outcome {
                Ok(memoized) => {
                    pending.forget(&decl.id());
                    if self
                        .registries()?
                        .providers
                        .publish_global(decl.id(), memoized.instance)
                    {
                        tracing::debug!("Root '{}' published '{}' globally", name, decl.id());
                    }
                }
                Err(error) => errors.push(error),
            }
        }

        match CompositionError::collect(name, errors) {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn resolve_providers(
        &self,
        module: &Module,
        assembly: &mut Assembly,
    ) -> Result<(), CompositionError> {
        let name = module.name();
        let mut errors = Vec::new();
        let mut declared = HashSet::new();

        let own: Vec<_> = module
            .providers()
            .iter()
            .filter(|decl| {
                if declared.insert(decl.id()) {
                    true
                } else {
                    errors.push(CompositionError::DuplicateProvider {
                        provider: decl.name().to_string(),
                        module: name.to_string(),
                    });
                    false
                }
            })
            .collect();

        for decl in &own {
            assembly.local.declare(decl.id());
        }

        for decl in own {
            let slot = self.registries()?.providers.memo_slot(decl.id());
            let outcome = {
                let mut injector = Injector::new(decl.name(), name, &assembly.local, self);
                let outcome = resolve_memoized(&slot, decl, &mut injector);
                if let Ok(memoized) = &outcome {
                    if memoized.constructed {
                        for binding in injector.bindings() {
                            tracing::trace!(
                                "'{}' slot [{}] '{}' resolved from {} tier",
                                decl.name(),
                                binding.index,
                                binding.type_name,
                                binding.tier
                            );
                        }
                    }
                }
                outcome
            };

            match outcome {
                Ok(memoized) => {
                    tracing::debug!(
                        "Resolved provider '{}' in module '{}'{}",
                        decl.name(),
                        name,
                        if memoized.constructed { "" } else { " (shared)" }
                    );
                    assembly.local.insert_resolved(decl.id(), memoized.instance);
                }
                Err(error) => {
                    assembly.local.forget(&decl.id());
                    errors.push(error);
                }
            }
        }

        match CompositionError::collect(name, errors) {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn collect_exports(&self, module: &Module, assembly: &mut Assembly) -> Result<(), CompositionError> {
        let mut errors = Vec::new();

        for id in module.exports() {
            if assembly.local.resolved(id).is_some() {
                assembly.export(*id);
            } else if self.config.strict_exports {
                errors.push(CompositionError::UnknownExport {
                    provider: id.type_name().to_string(),
                    module: module.name().to_string(),
                });
            } else {
                tracing::warn!(
                    "Module '{}' exports '{}', which it neither declares nor imports; skipping",
                    module.name(),
                    id
                );
            }
        }

        match CompositionError::collect(module.name(), errors) {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }

    fn bind_controllers(
        &self,
        module: &Module,
        activatable: bool,
        local: &LocalScope,
    ) -> Result<PipelineSet, CompositionError> {
        let binder = ControllerBinder::new(
            module.name(),
            self.naming.as_ref(),
            module.middleware(),
            local,
            self,
        );
        let mut own = PipelineSet::new();
        let mut errors = Vec::new();

        if !activatable {
            if !module.controllers().is_empty() {
                tracing::debug!(
                    "Module '{}' is not reachable from the root; its {} controllers are not bound",
                    module.name(),
                    module.controllers().len()
                );
            }
            for decl in module.controllers() {
                if let Err(error) = binder.resolve_only(decl) {
                    errors.push(error);
                }
            }
        } else {
            let mut methods = HashSet::new();
            for decl in module.controllers() {
                match binder.bind(decl) {
                    Ok(bound) => {
                        methods.extend(bound.methods);
                        for entry in bound.entries {
                            own.push(entry);
                        }
                    }
                    Err(error) => errors.push(error),
                }
            }
            for (rule, method) in module.middleware().unknown_targets(&methods) {
                tracing::warn!(
                    "Middleware '{}' of module '{}' names method '{}', which no controller exposes",
                    rule,
                    module.name(),
                    method
                );
            }
        }

        match CompositionError::collect(module.name(), errors) {
            Some(error) => Err(error),
            None => Ok(own),
        }
    }

    fn check_collisions(&self, pipelines: &PipelineSet) -> Result<(), CompositionError> {
        let collisions = pipelines.collisions();
        match self.config.route_collisions {
            RouteCollisions::Allow => {
                for collision in &collisions {
                    tracing::debug!(
                        "Route {} bound by both '{}' and '{}'",
                        collision.key,
                        collision.first,
                        collision.second
                    );
                }
                Ok(())
            }
            RouteCollisions::Warn => {
                for collision in &collisions {
                    tracing::warn!(
                        "Route {} bound by both '{}' and '{}'",
                        collision.key,
                        collision.first,
                        collision.second
                    );
                }
                Ok(())
            }
            RouteCollisions::Reject => match collisions.into_iter().next() {
                Some(collision) => Err(CompositionError::RouteCollision {
                    route: collision.key.to_string(),
                    first: collision.first,
                    second: collision.second,
                }),
                None => Ok(()),
            },
        }
    }
}

impl GlobalScope for CompositionContext {
    fn lookup_global(&self, id: &ProviderId) -> Result<Option<Instance>, CompositionError> {
        Ok(self.registries()?.providers.global(id))
    }
}

/// State a module accumulates while it initializes
#[derive(Default)]
struct Assembly {
    local: LocalScope,
    exports: Vec<ProviderId>,
    contributions: Vec<(ModuleId, Arc<PipelineSet>)>,
}

impl Assembly {
    fn export(&mut self, id: ProviderId) {
        if !self.exports.contains(&id) {
            self.exports.push(id);
        }
    }

    /// Take a child's exports and pipelines
    fn merge(&mut self, child: &ResolvedModule) {
        for id in child.exports() {
            if let Some(instance) = child.exported(id) {
                self.local.insert_resolved(*id, instance);
                self.export(*id);
            }
        }
        for (id, set) in &child.contributions {
            if !self.contributions.iter().any(|(seen, _)| seen == id) {
                self.contributions.push((*id, set.clone()));
            }
        }
    }

    fn finish(mut self, module: &Module, activatable: bool, own: PipelineSet) -> ResolvedModule {
        self.contributions.push((module.id(), Arc::new(own)));

        let mut pipelines = PipelineSet::new();
        for (_, set) in &self.contributions {
            pipelines.merge(set);
        }

        ResolvedModule {
            id: module.id(),
            name: module.name().to_string(),
            global: module.is_global(),
            activatable,
            providers: self.local.into_resolved(),
            exports: self.exports,
            contributions: self.contributions,
            pipelines,
        }
    }
}

/// Builder for [`CompositionContext`]
pub struct CompositionContextBuilder {
    config: ComposerConfig,
    naming: Arc<dyn RouteNaming>,
    globals: Vec<(ProviderId, Instance)>,
}

impl Default for CompositionContextBuilder {
    fn default() -> Self {
        Self {
            config: ComposerConfig::default(),
            naming: Arc::new(ConventionNaming),
            globals: Vec::new(),
        }
    }
}

impl CompositionContextBuilder {
    pub fn config(mut self, config: ComposerConfig) -> Self {
        self.config = config;
        self
    }

    /// Naming convention for REST methods without an explicit route
    pub fn naming<N: RouteNaming + 'static>(mut self, naming: N) -> Self {
        self.naming = Arc::new(naming);
        self
    }

    /// Seed the global tier with a framework-supplied value
    pub fn global_value<T: Send + Sync + 'static>(mut self, value: Arc<T>) -> Self {
        self.globals.push((ProviderId::of::<T>(), value));
        self
    }

    pub fn build(self) -> CompositionContext {
        let mut registries = Registries::default();
        for (id, instance) in self.globals {
            registries.providers.publish_global(id, instance);
        }

        CompositionContext {
            config: self.config,
            naming: self.naming,
            registries: Mutex::new(registries),
            dynamic: DynamicModuleCache::new(),
        }
    }
}
