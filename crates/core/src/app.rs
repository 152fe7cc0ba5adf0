//! Application bootstrap
//!
//! [`initialize`] builds a context from the environment and composes the
//! graph under a root module. Hosting the resulting pipelines is left to the
//! caller through [`RouteSink`].

use std::sync::Arc;

use thiserror::Error;

use crate::config::{ComposerConfig, ConfigError, EnvConfig};
use crate::errors::CompositionError;
use crate::modules::{CompositionContext, Module, ResolvedModule};
use crate::pipeline::{PipelineManifest, PipelineSet, RouteSink};

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("composition error: {0}")]
    Composition(#[from] CompositionError),
}

/// A composed module graph, ready to be served
#[derive(Debug)]
pub struct Application {
    context: Arc<CompositionContext>,
    root: Arc<ResolvedModule>,
}

impl Application {
    /// Compose `root` in an existing context
    pub fn compose(
        context: Arc<CompositionContext>,
        root: &Arc<Module>,
    ) -> Result<Self, CompositionError> {
        let resolved = context.initialize(root)?;
        Ok(Self {
            context,
            root: resolved,
        })
    }

    pub fn context(&self) -> &CompositionContext {
        &self.context
    }

    pub fn root(&self) -> &ResolvedModule {
        &self.root
    }

    /// Every pipeline of the graph, in binding order
    pub fn pipelines(&self) -> &PipelineSet {
        self.root.pipelines()
    }

    pub fn manifest(&self) -> PipelineManifest {
        self.pipelines().manifest()
    }

    /// A provider visible to the root: its local scope first, then the
    /// global tier
    pub fn provider<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.root
            .provider::<T>()
            .or_else(|| self.context.global::<T>())
    }

    /// Hand every pipeline to the host's router
    pub fn register_routes(&self, sink: &mut dyn RouteSink) {
        tracing::info!(
            "Registering {} routes of module '{}'",
            self.pipelines().len(),
            self.root.name()
        );
        self.pipelines().register(sink);
    }

    /// Initialize a module outside the root's graph in the same context
    ///
    /// Its controllers are not bound, but it sees the global tier.
    pub fn initialize_module(&self, module: &Arc<Module>) -> Result<Arc<ResolvedModule>, CompositionError> {
        self.context.initialize(module)
    }
}

/// Compose `root` with configuration read from the environment
pub fn initialize(root: &Arc<Module>) -> Result<Application, BootstrapError> {
    let config = ComposerConfig::from_env()?;
    tracing::debug!(
        "Composing '{}' (route collisions: {}, strict exports: {})",
        root.name(),
        config.route_collisions,
        config.strict_exports
    );
    for (field, source) in config.config_sources() {
        tracing::trace!(field = %field, source = %source, "composer setting");
    }

    let context = Arc::new(CompositionContext::builder().config(config).build());
    Ok(Application::compose(context, root)?)
}
