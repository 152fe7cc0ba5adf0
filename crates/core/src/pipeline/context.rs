use std::collections::HashMap;
use std::sync::Arc;

use crate::container::descriptor::{Instance, ProviderId};
use crate::errors::HandlerError;
use crate::pipeline::route::RouteKey;

/// Providers a handler declared it needs, captured when the route was bound
#[derive(Debug, Clone, Default)]
pub struct HandlerScope {
    providers: Arc<HashMap<ProviderId, Instance>>,
}

impl HandlerScope {
    pub fn new(providers: HashMap<ProviderId, Instance>) -> Self {
        Self {
            providers: Arc::new(providers),
        }
    }

    pub fn get<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.providers
            .get(&ProviderId::of::<T>())
            .cloned()
            .and_then(|instance| instance.downcast::<T>().ok())
    }

    pub fn contains(&self, id: &ProviderId) -> bool {
        self.providers.contains_key(id)
    }

    /// Provider names, sorted
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self.providers.keys().map(|id| id.type_name()).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

/// Per-invocation state threaded through every pipeline stage
///
/// The transport fills in path parameters and attributes; dispatch attaches
/// the route key and the handler's provider scope.
#[derive(Debug, Clone, Default)]
pub struct Context {
    route: Option<RouteKey>,
    params: HashMap<String, String>,
    attributes: HashMap<String, String>,
    scope: HandlerScope,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(name.into(), value.into());
        self
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    pub(crate) fn attach(&mut self, route: RouteKey, scope: HandlerScope) {
        self.route = Some(route);
        self.scope = scope;
    }

    /// Route key of the pipeline currently dispatching
    pub fn route(&self) -> Option<&RouteKey> {
        self.route.as_ref()
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes.get(name).map(String::as_str)
    }

    pub fn set_attribute(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.attributes.insert(name.into(), value.into());
    }

    pub fn remove_attribute(&mut self, name: &str) -> Option<String> {
        self.attributes.remove(name)
    }

    /// A provider the handler declared with `Method::requires`
    pub fn provider<T: Send + Sync + 'static>(&self) -> Result<Arc<T>, HandlerError> {
        self.scope
            .get::<T>()
            .ok_or_else(|| HandlerError::MissingProvider {
                dependency: std::any::type_name::<T>().to_string(),
            })
    }

    pub fn scope(&self) -> &HandlerScope {
        &self.scope
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Clock(u64);

    #[test]
    fn test_provider_lookup() {
        let mut providers: HashMap<ProviderId, Instance> = HashMap::new();
        providers.insert(ProviderId::of::<Clock>(), Arc::new(Clock(7)));

        let mut ctx = Context::new().with_param("id", "42");
        ctx.attach(RouteKey::ws("chat", "join"), HandlerScope::new(providers));

        assert_eq!(ctx.provider::<Clock>().unwrap().0, 7);
        assert_eq!(ctx.param("id"), Some("42"));
        assert!(matches!(
            ctx.provider::<String>(),
            Err(HandlerError::MissingProvider { .. })
        ));
        assert_eq!(ctx.route(), Some(&RouteKey::ws("chat", "join")));
    }

    #[test]
    fn test_attributes() {
        let mut ctx = Context::new().with_attribute("user", "ana");
        ctx.set_attribute("role", "admin");
        assert_eq!(ctx.attribute("user"), Some("ana"));
        assert_eq!(ctx.remove_attribute("role").as_deref(), Some("admin"));
        assert_eq!(ctx.attribute("role"), None);
    }
}
