use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, OnceLock};

use uuid::Uuid;

use crate::errors::CompositionError;
use crate::modules::definition::Module;

/// Identity of a dynamic module factory
///
/// Assigned when the [`DynamicModule`] is created and shared by its clones.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FactoryId(Uuid);

impl fmt::Display for FactoryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub type ModuleFactory = Arc<dyn Fn() -> Arc<Module> + Send + Sync>;

/// A module built at runtime by a factory
///
/// However many modules import it, a context runs the factory once and every
/// importer shares the module it produced.
#[derive(Clone)]
pub struct DynamicModule {
    id: FactoryId,
    name: String,
    factory: ModuleFactory,
}

impl DynamicModule {
    pub fn new<F>(name: impl Into<String>, factory: F) -> Self
    where
        F: Fn() -> Arc<Module> + Send + Sync + 'static,
    {
        Self {
            id: FactoryId(Uuid::new_v4()),
            name: name.into(),
            factory: Arc::new(factory),
        }
    }

    pub fn id(&self) -> FactoryId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Debug for DynamicModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DynamicModule")
            .field("id", &self.id)
            .field("name", &self.name)
            .finish()
    }
}

/// Factory results memoized by factory identity
///
/// The map lock is only held to find the factory's cell; the factory itself
/// runs under that cell's `OnceLock`.
#[derive(Default)]
pub struct DynamicModuleCache {
    modules: Mutex<HashMap<FactoryId, Arc<OnceLock<Arc<Module>>>>>,
}

impl DynamicModuleCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// The module built by `dynamic`'s factory, running it on first use
    pub fn get_or_create(&self, dynamic: &DynamicModule) -> Result<Arc<Module>, CompositionError> {
        let cell = {
            let mut modules = self
                .modules
                .lock()
                .map_err(|_| CompositionError::lock_poisoned("dynamic module cache"))?;
            modules.entry(dynamic.id).or_default().clone()
        };

        let module = cell.get_or_init(|| {
            tracing::debug!("Building dynamic module '{}'", dynamic.name);
            (dynamic.factory)()
        });
        Ok(module.clone())
    }

    /// The cached module, if the factory already ran
    pub fn get(&self, id: &FactoryId) -> Option<Arc<Module>> {
        let modules = self.modules.lock().ok()?;
        modules.get(id).and_then(|cell| cell.get().cloned())
    }

    pub fn len(&self) -> usize {
        self.modules.lock().map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for DynamicModuleCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DynamicModuleCache")
            .field("len", &self.len())
            .finish()
    }
}
