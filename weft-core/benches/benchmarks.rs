use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use std::hint::black_box;

use weft_core::Scope;

fn signal_creation_benchmark(c: &mut Criterion) {
    let scope = Scope::new();

    c.bench_function("signal_creation", |b| {
        b.iter(|| {
            let signal = scope.create_signal(black_box(42));
            signal.dispose();
        });
    });
}

fn signal_read_benchmark(c: &mut Criterion) {
    let scope = Scope::new();
    let signal = scope.create_signal(42);

    c.bench_function("signal_read", |b| {
        b.iter(|| {
            black_box(signal.get());
        });
    });
}

fn signal_write_benchmark(c: &mut Criterion) {
    let scope = Scope::new();
    let signal = scope.create_signal(0);

    c.bench_function("signal_write", |b| {
        let mut i = 0;
        b.iter(|| {
            signal.set(black_box(i));
            i += 1;
        });
    });
}

fn memo_read_benchmark(c: &mut Criterion) {
    let scope = Scope::new();
    let a = scope.create_signal(5);
    let b_sig = scope.create_signal(10);

    let sum = scope.create_memo({
        let a = a.clone();
        let b_sig = b_sig.clone();
        move || a.get() + b_sig.get()
    });

    c.bench_function("memo_read", |b| {
        b.iter(|| {
            black_box(sum.get());
        });
    });
}

fn propagation_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("propagation");

    for subscriber_count in [1usize, 10, 100].iter() {
        let scope = Scope::new();
        let signal = scope.create_signal(0);

        let mut effects = Vec::new();
        for _ in 0..*subscriber_count {
            effects.push(scope.create_effect({
                let signal = signal.clone();
                move || {
                    black_box(signal.get());
                }
            }));
        }

        group.bench_with_input(
            BenchmarkId::from_parameter(subscriber_count),
            subscriber_count,
            |b, _| {
                let mut i = 0;
                b.iter(|| {
                    signal.set(black_box(i));
                    i += 1;
                });
            },
        );
    }
    group.finish();
}

fn batched_writes_benchmark(c: &mut Criterion) {
    let scope = Scope::new();
    let signal = scope.create_signal(0);

    let _effect = scope.create_effect({
        let signal = signal.clone();
        move || {
            black_box(signal.get());
        }
    });

    c.bench_function("batched_writes", |b| {
        let mut i = 0;
        b.iter(|| {
            scope.batch(|| {
                for _ in 0..10 {
                    signal.set(black_box(i));
                    i += 1;
                }
            });
        });
    });
}

criterion_group!(
    benches,
    signal_creation_benchmark,
    signal_read_benchmark,
    signal_write_benchmark,
    memo_read_benchmark,
    propagation_benchmark,
    batched_writes_benchmark,
);
criterion_main!(benches);
