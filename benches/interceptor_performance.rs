// benches/interceptor_performance.rs
//! Benchmarks for the interceptor's hot paths: filter matching, message
//! interpolation and the full capture path.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use intercept_errors::{
    core_errors, define_exception_types, exceptions, format::interpolate,
    ErrorInterceptor, Exception, HookRegistry, LogContext, RingBufferLogger,
};
use std::sync::Arc;

define_exception_types! {
    static LEVEL_1 = "Level1Exception": exceptions::RUNTIME;
    static LEVEL_2 = "Level2Exception": LEVEL_1;
    static LEVEL_3 = "Level3Exception": LEVEL_2;
}

fn interceptor() -> Arc<ErrorInterceptor> {
    let registry: &'static HookRegistry = Box::leak(Box::new(HookRegistry::new()));
    ErrorInterceptor::builder()
        .registry(registry)
        .build()
        .expect("valid environment")
}

// ============================================================================
// Matching
// ============================================================================

fn bench_core_error_matching(c: &mut Criterion) {
    let mut group = c.benchmark_group("core_error_matching");
    let defaults = interceptor();

    group.bench_function("watched", |b| {
        b.iter(|| defaults.is_handling_core_error(black_box(core_errors::RECOVERABLE)))
    });
    group.bench_function("unwatched", |b| {
        b.iter(|| defaults.is_handling_core_error(black_box(core_errors::NOTICE)))
    });
    group.bench_function("by_name", |b| {
        b.iter(|| defaults.is_handling_core_error(black_box("USER_WARNING")))
    });

    let all = interceptor();
    all.set_core_errors([core_errors::ALL]).expect("registered code");
    group.bench_function("all", |b| {
        b.iter(|| all.is_handling_core_error(black_box(core_errors::DEPRECATED)))
    });
    group.finish();
}

fn bench_exception_matching(c: &mut Criterion) {
    let mut group = c.benchmark_group("exception_matching");
    let interceptor = interceptor();
    interceptor.set_uncaught_exceptions([&exceptions::RUNTIME]);

    for (depth, ty) in [(0, &exceptions::RUNTIME), (3, &LEVEL_3)] {
        group.bench_with_input(BenchmarkId::new("subclass_depth", depth), &ty, |b, ty| {
            b.iter(|| interceptor.is_handling_uncaught_exception(black_box(*ty)))
        });
    }
    group.bench_function("miss", |b| {
        b.iter(|| interceptor.is_handling_uncaught_exception(black_box(&exceptions::LOGIC)))
    });
    group.finish();
}

// ============================================================================
// Formatting
// ============================================================================

fn bench_interpolation(c: &mut Criterion) {
    let mut group = c.benchmark_group("interpolation");
    const TEMPLATE: &str = "{label} {type}: \"{message}\" in file {file}[{line}].";

    for size in [16usize, 1024, 8192] {
        group.bench_with_input(BenchmarkId::new("message_bytes", size), &size, |b, &size| {
            let message = "x".repeat(size);
            b.iter(|| {
                let context = LogContext::new()
                    .with("label", "Core Error")
                    .with("type", "FATAL")
                    .with("message", message.clone())
                    .with("file", "src/main.rs")
                    .with("line", 42u32);
                interpolate(black_box(TEMPLATE), &context)
            })
        });
    }
    group.finish();
}

// ============================================================================
// Capture
// ============================================================================

fn bench_capture(c: &mut Criterion) {
    let mut group = c.benchmark_group("capture");

    group.bench_function("core_error", |b| {
        b.iter_with_setup(
            || {
                let interceptor = interceptor();
                interceptor.set_logger(Arc::new(RingBufferLogger::new(4, 1024)));
                interceptor.set_callback(Arc::new(|_: &ErrorInterceptor| {}));
                interceptor.handle();
                interceptor
            },
            |interceptor| interceptor.handle_core_error(core_errors::FATAL.bits(), "boom", "f.rs", 10),
        )
    });

    group.bench_function("uncaught_exception", |b| {
        let exception = Exception::new(&LEVEL_3, "deep").with_code(7);
        b.iter_with_setup(
            || {
                let interceptor = interceptor();
                interceptor.set_callback(Arc::new(|_: &ErrorInterceptor| {}));
                interceptor.handle();
                interceptor
            },
            |interceptor| interceptor.handle_uncaught_exception(&exception),
        )
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_core_error_matching,
    bench_exception_matching,
    bench_interpolation,
    bench_capture,
);
criterion_main!(benches);
