use std::collections::HashMap;
use std::sync::Arc;

use crate::container::descriptor::{Instance, ProviderId};
use crate::modules::definition::ModuleId;
use crate::pipeline::set::PipelineSet;

/// A module after initialization
///
/// Holds the module's complete local scope, the exports importers receive and
/// the pipelines of the module and everything it imports.
#[derive(Debug)]
pub struct ResolvedModule {
    pub(crate) id: ModuleId,
    pub(crate) name: String,
    pub(crate) global: bool,
    pub(crate) activatable: bool,
    pub(crate) providers: HashMap<ProviderId, Instance>,
    pub(crate) exports: Vec<ProviderId>,
    /// Own pipelines of every module in this subtree, each module once
    pub(crate) contributions: Vec<(ModuleId, Arc<PipelineSet>)>,
    pub(crate) pipelines: PipelineSet,
}

impl ResolvedModule {
    pub fn id(&self) -> ModuleId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_global(&self) -> bool {
        self.global
    }

    /// Check if the module's controllers were bound into pipelines
    pub fn is_activatable(&self) -> bool {
        self.activatable
    }

    /// Exported identities, own and re-exported, in merge order
    pub fn exports(&self) -> &[ProviderId] {
        &self.exports
    }

    pub fn exports_provider(&self, id: &ProviderId) -> bool {
        self.exports.contains(id)
    }

    /// Instance of an exported identity
    pub fn exported(&self, id: &ProviderId) -> Option<Instance> {
        if self.exports_provider(id) {
            self.providers.get(id).cloned()
        } else {
            None
        }
    }

    /// A provider from the module's local scope
    pub fn provider<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.providers
            .get(&ProviderId::of::<T>())
            .cloned()
            .and_then(|instance| instance.downcast::<T>().ok())
    }

    pub fn provider_count(&self) -> usize {
        self.providers.len()
    }

    /// Pipelines of this module and every module it imports
    pub fn pipelines(&self) -> &PipelineSet {
        &self.pipelines
    }

    /// Pipelines bound for this module's own controllers
    pub fn own_pipelines(&self) -> Option<&PipelineSet> {
        self.contributions
            .iter()
            .find(|(id, _)| *id == self.id)
            .map(|(_, set)| set.as_ref())
    }
}
