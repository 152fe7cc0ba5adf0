use thiserror::Error;

/// Configuration error raised while composing the module graph
///
/// Every variant is fatal to startup. The type is `Clone` so that a module
/// slot which failed to initialize can hand the same error to every caller
/// that was waiting on it.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CompositionError {
    #[error("can't resolve dependency '{dependency}' at index [{index}] of '{owner}' in module '{module}'")]
    UnresolvedDependency {
        dependency: String,
        index: usize,
        owner: String,
        module: String,
    },

    #[error("'{owner}' in module '{module}' requires '{dependency}' at index [{index}], which is declared after it")]
    DeclarationOrder {
        dependency: String,
        index: usize,
        owner: String,
        module: String,
    },

    #[error("provider '{provider}' is declared more than once in module '{module}'")]
    DuplicateProvider { provider: String, module: String },

    #[error("module '{module}' exports '{provider}', which it neither declares nor imports")]
    UnknownExport { provider: String, module: String },

    #[error("circular import: {}", .path.join(" -> "))]
    CircularImport { path: Vec<String> },

    #[error("handler '{handler}' of '{controller}' in module '{module}' requires '{dependency}', which is not available")]
    UnresolvedHandlerDependency {
        dependency: String,
        handler: String,
        controller: String,
        module: String,
    },

    #[error("route {route} is bound by both '{first}' and '{second}'")]
    RouteCollision {
        route: String,
        first: String,
        second: String,
    },

    #[error("module '{module}' has {} configuration errors: {}", .errors.len(), join_errors(.errors))]
    InvalidModule {
        module: String,
        errors: Vec<CompositionError>,
    },

    #[error("module '{module}' failed to import '{import}': {source}")]
    ImportFailed {
        module: String,
        import: String,
        source: Box<CompositionError>,
    },

    #[error("initialization of module '{module}' panicked")]
    InitializationPanicked { module: String },

    #[error("Lock error on resource: {resource}")]
    LockPoisoned { resource: String },
}

fn join_errors(errors: &[CompositionError]) -> String {
    errors
        .iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

impl CompositionError {
    /// Create an unresolved dependency error
    pub fn unresolved(
        dependency: impl Into<String>,
        index: usize,
        owner: impl Into<String>,
        module: impl Into<String>,
    ) -> Self {
        Self::UnresolvedDependency {
            dependency: dependency.into(),
            index,
            owner: owner.into(),
            module: module.into(),
        }
    }

    /// Create a lock poisoning error for the named resource
    pub fn lock_poisoned(resource: impl Into<String>) -> Self {
        Self::LockPoisoned {
            resource: resource.into(),
        }
    }

    /// Wrap this error with the import edge it surfaced through
    pub fn imported_by(self, module: impl Into<String>, import: impl Into<String>) -> Self {
        Self::ImportFailed {
            module: module.into(),
            import: import.into(),
            source: Box::new(self),
        }
    }

    /// Collapse the errors collected for one module into a single error
    ///
    /// Returns `None` when nothing went wrong.
    pub fn collect(module: impl Into<String>, mut errors: Vec<CompositionError>) -> Option<Self> {
        match errors.len() {
            0 => None,
            1 => errors.pop(),
            _ => Some(Self::InvalidModule {
                module: module.into(),
                errors,
            }),
        }
    }

    /// Import chain from the module where initialization started down to the
    /// module that actually failed
    pub fn module_path(&self) -> Vec<String> {
        let mut path = Vec::new();
        let mut current = self;
        while let Self::ImportFailed {
            module,
            import,
            source,
        } = current
        {
            if path.is_empty() {
                path.push(module.clone());
            }
            path.push(import.clone());
            current = source;
        }
        path
    }

    /// The innermost error, with every `ImportFailed` layer peeled off
    pub fn root_cause(&self) -> &CompositionError {
        match self {
            Self::ImportFailed { source, .. } => source.root_cause(),
            other => other,
        }
    }

    /// Every leaf error, flattening import layers and per-module aggregates
    pub fn leaves(&self) -> Vec<&CompositionError> {
        match self {
            Self::ImportFailed { source, .. } => source.leaves(),
            Self::InvalidModule { errors, .. } => errors.iter().flat_map(|e| e.leaves()).collect(),
            other => vec![other],
        }
    }

    /// Check if any leaf is an unresolved provider or handler dependency
    pub fn is_unresolved_dependency(&self) -> bool {
        self.leaves().iter().any(|e| {
            matches!(
                e,
                Self::UnresolvedDependency { .. } | Self::UnresolvedHandlerDependency { .. }
            )
        })
    }
}
