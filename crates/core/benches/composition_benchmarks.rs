//! Composition benchmarks
//!
//! Measures initialization of module graphs of increasing size and the
//! dispatch cost of a bound pipeline.

use std::sync::Arc;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use modgraph_core::container::{Inject, Injector, Resolvable};
use modgraph_core::errors::{CompositionError, HandlerResult};
use modgraph_core::modules::{CompositionContext, Module};
use modgraph_core::pipeline::{
    Context, Controller, Method, MiddlewareRule, RestDescriptor, RouteKey, Transport,
};
use modgraph_core::HttpMethod;

struct Config;

impl Resolvable for Config {
    fn resolve(&self, _injector: &mut Injector<'_>) -> Result<Self, CompositionError> {
        Ok(Config)
    }
}

#[derive(Default)]
struct PingController {
    config: Inject<Config>,
}

impl Resolvable for PingController {
    fn resolve(&self, injector: &mut Injector<'_>) -> Result<Self, CompositionError> {
        Ok(Self {
            config: injector.inject(&self.config)?,
        })
    }
}

impl Controller for PingController {
    fn transport(&self) -> Transport {
        Transport::Rest(RestDescriptor::new())
    }

    fn methods(self: Arc<Self>) -> Vec<Method> {
        vec![Method::new("READ_ping", |ctx: &mut Context| -> HandlerResult {
            ctx.set_attribute("pong", "1");
            Ok(())
        })]
    }
}

/// Linear chain: root -> m(n-1) -> ... -> m0, each importing the next
fn linear_chain(size: usize) -> Arc<Module> {
    let mut current = Module::builder("m0")
        .global()
        .provider(Config)
        .export::<Config>()
        .build();
    for i in 1..size {
        current = Module::builder(format!("m{}", i))
            .import(&current)
            .controller(PingController::default())
            .build();
    }
    Module::builder("root").import(&current).build()
}

/// Wide fan-out: root imports `size` leaves sharing one global module
fn fan_out(size: usize) -> Arc<Module> {
    let config = Module::builder("config")
        .global()
        .provider(Config)
        .export::<Config>()
        .build();
    let mut root = Module::builder("root").import(&config);
    for i in 0..size {
        let leaf = Module::builder(format!("leaf{}", i))
            .controller(PingController::default())
            .build();
        root = root.import(&leaf);
    }
    root.build()
}

fn benchmark_initialization(c: &mut Criterion) {
    let mut group = c.benchmark_group("initialization");

    for size in [10, 50, 200].iter() {
        group.bench_with_input(BenchmarkId::new("linear_chain", size), size, |b, &size| {
            b.iter(|| {
                let root = linear_chain(size);
                let context = CompositionContext::new();
                black_box(context.initialize(&root).map(|r| r.pipelines().len()))
            });
        });

        group.bench_with_input(BenchmarkId::new("fan_out", size), size, |b, &size| {
            b.iter(|| {
                let root = fan_out(size);
                let context = CompositionContext::new();
                black_box(context.initialize(&root).map(|r| r.pipelines().len()))
            });
        });
    }

    group.finish();
}

fn benchmark_dispatch(c: &mut Criterion) {
    let config = Module::builder("config")
        .global()
        .provider(Config)
        .export::<Config>()
        .build();
    let root = Module::builder("root")
        .import(&config)
        .controller(PingController::default())
        .middleware(MiddlewareRule::new("noop", |_ctx: &mut Context| -> HandlerResult {
            Ok(())
        }))
        .build();

    let context = CompositionContext::new();
    let resolved = match context.initialize(&root) {
        Ok(resolved) => resolved,
        Err(error) => panic!("benchmark graph failed to initialize: {}", error),
    };
    let key = RouteKey::rest(HttpMethod::Get, "/ping");
    let entry = resolved.pipelines().find(&key)[0].clone();

    c.bench_function("dispatch_with_middleware", |b| {
        b.iter(|| {
            let mut ctx = Context::new();
            black_box(entry.dispatch(&mut ctx))
        });
    });
}

criterion_group!(benches, benchmark_initialization, benchmark_dispatch);
criterion_main!(benches);
