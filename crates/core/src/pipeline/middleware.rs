use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use crate::errors::HandlerResult;
use crate::pipeline::context::Context;
use crate::pipeline::controller::HandlerFn;
use crate::pipeline::route::{HttpMethod, RouteKey};

/// Module-scoped middleware function
pub type MiddlewareFn = HandlerFn;

/// Controller methods a middleware rule applies to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MethodSelector {
    All,
    Only(Vec<String>),
    Except(Vec<String>),
}

impl MethodSelector {
    pub fn matches(&self, method_name: &str) -> bool {
        match self {
            MethodSelector::All => true,
            MethodSelector::Only(names) => names.iter().any(|n| n == method_name),
            MethodSelector::Except(names) => !names.iter().any(|n| n == method_name),
        }
    }

    fn targets(&self) -> &[String] {
        match self {
            MethodSelector::All => &[],
            MethodSelector::Only(names) | MethodSelector::Except(names) => names,
        }
    }
}

/// One middleware with the methods it applies to
#[derive(Clone)]
pub struct MiddlewareRule {
    name: String,
    handler: MiddlewareFn,
    selector: MethodSelector,
    verbs: Option<Vec<HttpMethod>>,
}

impl MiddlewareRule {
    /// A rule applying to every method of the module
    pub fn new<F>(name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&mut Context) -> HandlerResult + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            handler: Arc::new(handler),
            selector: MethodSelector::All,
            verbs: None,
        }
    }

    pub fn only<I, S>(mut self, methods: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.selector = MethodSelector::Only(methods.into_iter().map(Into::into).collect());
        self
    }

    pub fn except<I, S>(mut self, methods: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.selector = MethodSelector::Except(methods.into_iter().map(Into::into).collect());
        self
    }

    /// Restrict a REST rule to some HTTP methods; event routes never match
    pub fn on_verbs(mut self, verbs: impl IntoIterator<Item = HttpMethod>) -> Self {
        self.verbs = Some(verbs.into_iter().collect());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn handler(&self) -> &MiddlewareFn {
        &self.handler
    }

    pub fn selector(&self) -> &MethodSelector {
        &self.selector
    }

    pub fn applies_to(&self, method_name: &str, key: &RouteKey) -> bool {
        if !self.selector.matches(method_name) {
            return false;
        }
        match (&self.verbs, key.http_method()) {
            (None, _) => true,
            (Some(verbs), Some(method)) => verbs.contains(&method),
            (Some(_), None) => false,
        }
    }
}

impl fmt::Debug for MiddlewareRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MiddlewareRule")
            .field("name", &self.name)
            .field("selector", &self.selector)
            .field("verbs", &self.verbs)
            .finish()
    }
}

/// Ordered middleware rules declared on a module
#[derive(Debug, Clone, Default)]
pub struct ModuleMiddleware {
    rules: Vec<MiddlewareRule>,
}

impl ModuleMiddleware {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rule(mut self, rule: MiddlewareRule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn push(&mut self, rule: MiddlewareRule) {
        self.rules.push(rule);
    }

    pub fn rules(&self) -> &[MiddlewareRule] {
        &self.rules
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Rules applying to a method bound at `key`, in declaration order
    pub fn matching(&self, method_name: &str, key: &RouteKey) -> Vec<&MiddlewareRule> {
        self.rules
            .iter()
            .filter(|rule| rule.applies_to(method_name, key))
            .collect()
    }

    /// (rule, method) pairs naming methods no controller of the module exposes
    pub fn unknown_targets<'a>(&'a self, known: &HashSet<String>) -> Vec<(&'a str, &'a str)> {
        self.rules
            .iter()
            .flat_map(|rule| {
                rule.selector
                    .targets()
                    .iter()
                    .filter(|target| !known.contains(target.as_str()))
                    .map(move |target| (rule.name.as_str(), target.as_str()))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn noop(_ctx: &mut Context) -> HandlerResult {
        Ok(())
    }

    #[test]
    fn test_selectors() {
        let get = RouteKey::rest(HttpMethod::Get, "/users");
        let post = RouteKey::rest(HttpMethod::Post, "/users");
        let middleware = ModuleMiddleware::new()
            .rule(MiddlewareRule::new("log", noop))
            .rule(MiddlewareRule::new("auth", noop).except(["READ_users"]))
            .rule(MiddlewareRule::new("audit", noop).only(["CREATE_users"]))
            .rule(MiddlewareRule::new("cache", noop).on_verbs([HttpMethod::Get]));

        let names = |method: &str, key: &RouteKey| -> Vec<String> {
            middleware
                .matching(method, key)
                .iter()
                .map(|rule| rule.name().to_string())
                .collect()
        };

        assert_eq!(names("READ_users", &get), vec!["log", "cache"]);
        assert_eq!(names("CREATE_users", &post), vec!["log", "auth", "audit"]);
    }

    #[test]
    fn test_verb_filter_never_matches_events() {
        let rule = MiddlewareRule::new("cache", noop).on_verbs([HttpMethod::Get]);
        assert!(!rule.applies_to("join", &RouteKey::ws("chat", "join")));
    }

    #[test]
    fn test_unknown_targets() {
        let middleware = ModuleMiddleware::new()
            .rule(MiddlewareRule::new("audit", noop).only(["CREATE_users", "CREATE_userz"]));
        let known: HashSet<String> = ["CREATE_users".to_string()].into_iter().collect();
        assert_eq!(middleware.unknown_targets(&known), vec![("audit", "CREATE_userz")]);
    }
}
