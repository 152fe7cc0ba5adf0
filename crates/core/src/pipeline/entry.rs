use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::errors::{HandlerError, HandlerResult};
use crate::pipeline::capability::{ExceptionFilter, Guard, Interceptor};
use crate::pipeline::context::{Context, HandlerScope};
use crate::pipeline::controller::{HandlerFn, StageFn};
use crate::pipeline::route::RouteKey;

/// A named stage attached to a pipeline
pub struct Attached<T: ?Sized> {
    pub name: String,
    pub stage: Arc<T>,
}

impl<T: ?Sized> Attached<T> {
    pub fn new(name: impl Into<String>, stage: Arc<T>) -> Self {
        Self {
            name: name.into(),
            stage,
        }
    }
}

impl<T: ?Sized> Clone for Attached<T> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            stage: self.stage.clone(),
        }
    }
}

impl<T: ?Sized> fmt::Debug for Attached<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Attached").field(&self.name).finish()
    }
}

/// Pipeline stages in evaluation order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Middleware,
    Guard,
    InterceptorBefore,
    Handler,
    InterceptorAfter,
    /// Only runs when an earlier stage failed
    ExceptionFilter,
}

/// One routable pipeline: a route key and its ordered chain
#[derive(Clone)]
pub struct PipelineEntry {
    pub key: RouteKey,
    pub module: String,
    pub controller: String,
    pub method: String,
    pub middleware: Vec<Attached<StageFn>>,
    pub guard: Option<Attached<dyn Guard>>,
    pub interceptor: Option<Attached<dyn Interceptor>>,
    pub handler: HandlerFn,
    pub exception_filter: Option<Attached<dyn ExceptionFilter>>,
    pub scope: HandlerScope,
}

impl PipelineEntry {
    /// Owner label used in diagnostics: `module::Controller.method`
    pub fn label(&self) -> String {
        let controller = self
            .controller
            .rsplit("::")
            .next()
            .unwrap_or(&self.controller);
        format!("{}::{}.{}", self.module, controller, self.method)
    }

    /// Stages with their names, in evaluation order
    pub fn stages(&self) -> Vec<(Stage, String)> {
        let mut stages: Vec<(Stage, String)> = self
            .middleware
            .iter()
            .map(|m| (Stage::Middleware, m.name.clone()))
            .collect();
        if let Some(guard) = &self.guard {
            stages.push((Stage::Guard, guard.name.clone()));
        }
        if let Some(interceptor) = &self.interceptor {
            stages.push((Stage::InterceptorBefore, interceptor.name.clone()));
        }
        stages.push((Stage::Handler, self.method.clone()));
        if let Some(interceptor) = &self.interceptor {
            stages.push((Stage::InterceptorAfter, interceptor.name.clone()));
        }
        if let Some(filter) = &self.exception_filter {
            stages.push((Stage::ExceptionFilter, filter.name.clone()));
        }
        stages
    }

    /// Run the chain for one request or event
    ///
    /// Middleware, guard, interceptor before, handler, interceptor after. The
    /// first failing stage stops the chain and its error goes to the
    /// exception filter; without a filter the error is returned.
    pub fn dispatch(&self, ctx: &mut Context) -> HandlerResult {
        ctx.attach(self.key.clone(), self.scope.clone());

        match self.run_chain(ctx) {
            Ok(()) => Ok(()),
            Err(error) => match &self.exception_filter {
                Some(filter) => {
                    tracing::debug!(
                        route = %self.key,
                        filter = %filter.name,
                        %error,
                        "exception filter invoked"
                    );
                    filter.stage.catch(error, ctx)
                }
                None => Err(error),
            },
        }
    }

    fn run_chain(&self, ctx: &mut Context) -> HandlerResult {
        for middleware in &self.middleware {
            (middleware.stage)(ctx)?;
        }

        if let Some(guard) = &self.guard {
            if !guard.stage.can_activate(ctx) {
                return Err(HandlerError::Forbidden {
                    guard: guard.name.clone(),
                });
            }
        }

        if let Some(interceptor) = &self.interceptor {
            interceptor.stage.before(ctx)?;
        }

        (self.handler)(ctx)?;

        if let Some(interceptor) = &self.interceptor {
            interceptor.stage.after(ctx)?;
        }

        Ok(())
    }
}

impl fmt::Debug for PipelineEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineEntry")
            .field("key", &self.key)
            .field("owner", &self.label())
            .field("stages", &self.stages())
            .finish()
    }
}
