use std::collections::HashMap;

use serde::Serialize;

use crate::pipeline::capability::{ExceptionFilter, Guard, Interceptor};
use crate::pipeline::controller::{HandlerFn, StageFn};
use crate::pipeline::entry::{Attached, PipelineEntry, Stage};
use crate::pipeline::route::RouteKey;

/// Consumer of bound pipelines, typically a router
pub trait RouteSink {
    fn add_route(&mut self, entry: &PipelineEntry);
}

impl RouteSink for Vec<PipelineEntry> {
    fn add_route(&mut self, entry: &PipelineEntry) {
        self.push(entry.clone());
    }
}

/// Two pipelines bound to the same route key
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Collision {
    pub key: RouteKey,
    pub first: String,
    pub second: String,
}

/// Pipelines accumulated by a module and everything it imports
///
/// Entries keep the order they were bound in. Duplicate keys are kept.
#[derive(Debug, Clone, Default)]
pub struct PipelineSet {
    entries: Vec<PipelineEntry>,
}

impl PipelineSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: PipelineEntry) {
        self.entries.push(entry);
    }

    /// Append every entry of `other`
    pub fn merge(&mut self, other: &PipelineSet) {
        self.entries.extend(other.entries.iter().cloned());
    }

    pub fn entries(&self) -> &[PipelineEntry] {
        &self.entries
    }

    pub fn iter(&self) -> impl Iterator<Item = &PipelineEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn rest(&self) -> TransportView<'_> {
        TransportView {
            entries: self.entries.iter().filter(|e| e.key.is_rest()).collect(),
        }
    }

    pub fn ws(&self) -> TransportView<'_> {
        TransportView {
            entries: self.entries.iter().filter(|e| e.key.is_ws()).collect(),
        }
    }

    /// Every entry bound to `key`, in binding order
    pub fn find(&self, key: &RouteKey) -> Vec<&PipelineEntry> {
        self.entries.iter().filter(|e| &e.key == key).collect()
    }

    /// Keys bound more than once, paired with the first binding
    pub fn collisions(&self) -> Vec<Collision> {
        let mut first_seen: HashMap<&RouteKey, &PipelineEntry> = HashMap::new();
        let mut collisions = Vec::new();

        for entry in &self.entries {
            match first_seen.get(&entry.key) {
                Some(first) => collisions.push(Collision {
                    key: entry.key.clone(),
                    first: first.label(),
                    second: entry.label(),
                }),
                None => {
                    first_seen.insert(&entry.key, entry);
                }
            }
        }

        collisions
    }

    /// Hand every entry to a router
    pub fn register(&self, sink: &mut dyn RouteSink) {
        for entry in &self.entries {
            sink.add_route(entry);
        }
    }

    /// Serializable description of every route and its chain
    pub fn manifest(&self) -> PipelineManifest {
        PipelineManifest {
            routes: self
                .entries
                .iter()
                .map(|entry| RouteManifest {
                    key: entry.key.clone(),
                    owner: entry.label(),
                    stages: entry
                        .stages()
                        .into_iter()
                        .map(|(stage, name)| StageManifest { stage, name })
                        .collect(),
                    requires: entry.scope.names().into_iter().map(String::from).collect(),
                })
                .collect(),
            collisions: self.collisions(),
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(&self.manifest())
    }
}

impl<'a> IntoIterator for &'a PipelineSet {
    type Item = &'a PipelineEntry;
    type IntoIter = std::slice::Iter<'a, PipelineEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// Entries of one transport, exposed as (key, item) collections
pub struct TransportView<'a> {
    entries: Vec<&'a PipelineEntry>,
}

impl<'a> TransportView<'a> {
    pub fn entries(&self) -> &[&'a PipelineEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn main_handlers(&self) -> Vec<(&'a RouteKey, &'a HandlerFn)> {
        self.entries.iter().copied().map(|e| (&e.key, &e.handler)).collect()
    }

    pub fn middleware(&self) -> Vec<(&'a RouteKey, &'a Attached<StageFn>)> {
        self.entries
            .iter()
            .copied()
            .flat_map(|e| e.middleware.iter().map(move |m| (&e.key, m)))
            .collect()
    }

    pub fn guards(&self) -> Vec<(&'a RouteKey, &'a Attached<dyn Guard>)> {
        self.entries
            .iter()
            .copied()
            .filter_map(|e| e.guard.as_ref().map(|g| (&e.key, g)))
            .collect()
    }

    pub fn interceptors(&self) -> Vec<(&'a RouteKey, &'a Attached<dyn Interceptor>)> {
        self.entries
            .iter()
            .copied()
            .filter_map(|e| e.interceptor.as_ref().map(|i| (&e.key, i)))
            .collect()
    }

    pub fn exception_filters(&self) -> Vec<(&'a RouteKey, &'a Attached<dyn ExceptionFilter>)> {
        self.entries
            .iter()
            .copied()
            .filter_map(|e| e.exception_filter.as_ref().map(|f| (&e.key, f)))
            .collect()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct PipelineManifest {
    pub routes: Vec<RouteManifest>,
    pub collisions: Vec<Collision>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RouteManifest {
    pub key: RouteKey,
    pub owner: String,
    pub stages: Vec<StageManifest>,
    pub requires: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StageManifest {
    pub stage: Stage,
    pub name: String,
}
