//! Dispatch overhead benchmark using criterion.
//!
//! Measures a cheap elementwise kernel across worker counts, thread backends
//! and lock strategies, against a plain sequential loop.

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use parvec::{
    BackendKind, DispatchConfig, Dispatcher, LockStrategy, Operand, OutputOperand, Vectorize,
};
use std::sync::Arc;

const ELEMENTS: usize = 1 << 20;

fn axpy(x: f64, y: f64) -> f64 {
    2.5 * x + y
}

fn bench_worker_counts(c: &mut Criterion) {
    let x: Vec<f64> = (0..ELEMENTS).map(|i| i as f64).collect();
    let y: Vec<f64> = (0..ELEMENTS).map(|i| (i % 7) as f64).collect();
    let mut out = vec![0.0f64; ELEMENTS];

    let mut group = c.benchmark_group("dispatch");
    group.throughput(Throughput::Elements(ELEMENTS as u64));
    group.sample_size(20);

    group.bench_function("sequential", |b| {
        b.iter(|| {
            for ((o, &a), &v) in out.iter_mut().zip(&x).zip(&y) {
                *o = axpy(a, v);
            }
            std::hint::black_box(&out);
        });
    });

    let max = num_cpus::get();
    let mut workers = 1;
    while workers <= max {
        let dispatcher =
            Arc::new(Dispatcher::new(DispatchConfig::default().with_workers(workers)).unwrap());
        let ufunc = Vectorize::new().add(axpy).build(dispatcher).unwrap();
        group.bench_function(BenchmarkId::new("workers", workers), |b| {
            b.iter(|| {
                ufunc
                    .call(
                        &[Operand::from(&x), Operand::from(&y)],
                        OutputOperand::from(&mut out),
                    )
                    .unwrap()
            });
        });
        workers *= 2;
    }

    group.finish();
}

fn bench_backends(c: &mut Criterion) {
    let x: Vec<f32> = (0..ELEMENTS).map(|i| i as f32).collect();
    let mut out = vec![0.0f32; ELEMENTS];
    let workers = num_cpus::get();

    let mut group = c.benchmark_group("backend");
    group.throughput(Throughput::Elements(ELEMENTS as u64));
    group.sample_size(20);

    let variants = [
        ("std_spin", BackendKind::Std, LockStrategy::Spin),
        ("std_backoff", BackendKind::Std, LockStrategy::Backoff),
        ("crossbeam_spin", BackendKind::Crossbeam, LockStrategy::Spin),
    ];
    for (name, backend, lock) in variants {
        let config = DispatchConfig::default()
            .with_workers(workers)
            .with_backend(backend)
            .with_lock(lock);
        let dispatcher = Arc::new(Dispatcher::new(config).unwrap());
        let ufunc = Vectorize::new()
            .add(|v: f32| v.sqrt())
            .build(dispatcher)
            .unwrap();
        group.bench_function(name, |b| {
            b.iter(|| {
                ufunc
                    .call(&[Operand::from(&x)], OutputOperand::from(&mut out))
                    .unwrap()
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_worker_counts, bench_backends);
criterion_main!(benches);
