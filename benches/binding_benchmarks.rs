//! 绑定层性能基准测试
//!
//! 测试动态调用开销、值转换和调度器往返的性能

use std::collections::HashMap;
use std::hint::black_box;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use host_bridge::binding::{Bindable, BindingBuilder, CallContext, HostObject, Hybrid};
use host_bridge::convert::Convertible;
use host_bridge::core::BindingResult;
use host_bridge::dispatch::{Dispatcher, DispatcherExt, DispatcherKind, LoopDispatcher, ThreadDispatcher};
use host_bridge::runtime::ScriptRuntime;
use host_bridge::Value;

#[derive(Default)]
struct Accumulator {
    total: AtomicI64,
}

impl Bindable for Accumulator {
    const TYPE_NAME: &'static str = "Accumulator";

    fn load_bindings(builder: &mut BindingBuilder<Self>) -> BindingResult<()> {
        builder
            .method("add", |this: &Accumulator, n: i32| {
                this.total.fetch_add(i64::from(n), Ordering::Relaxed);
            })?
            .method(
                "mix",
                |_: &Accumulator, a: i32, b: f64, c: String, d: bool| {
                    if d {
                        f64::from(a) + b + c.len() as f64
                    } else {
                        b
                    }
                },
            )?
            .getter("total", |this: &Accumulator| this.total.load(Ordering::Relaxed))?;
        Ok(())
    }
}

fn context(runtime: &Arc<ScriptRuntime>) -> CallContext {
    CallContext::new(
        Arc::clone(runtime),
        LoopDispatcher::new(DispatcherKind::Script) as Arc<dyn Dispatcher>,
        LoopDispatcher::new(DispatcherKind::Background) as Arc<dyn Dispatcher>,
    )
}

fn bench_dynamic_call(c: &mut Criterion) {
    let runtime = ScriptRuntime::new();
    let _scope = runtime.attach();
    let cx = context(&runtime);
    let object = Hybrid::new(Accumulator::default()).unwrap();

    let mut group = c.benchmark_group("dynamic_call");

    group.bench_function("one_arg", |b| {
        b.iter(|| object.call(&cx, "add", vec![Value::from(black_box(1))]).unwrap())
    });

    group.bench_function("four_args", |b| {
        b.iter(|| {
            let args = vec![
                Value::from(black_box(1)),
                Value::from(2.5),
                Value::from("hi"),
                Value::from(true),
            ];
            object.call(&cx, "mix", args).unwrap()
        })
    });

    group.bench_function("getter", |b| b.iter(|| object.get(&cx, "total").unwrap()));

    group.bench_function("unknown_member", |b| {
        b.iter(|| object.call(&cx, black_box("missing"), Vec::new()).is_err())
    });

    group.finish();
}

fn bench_conversion(c: &mut Criterion) {
    let mut group = c.benchmark_group("conversion");

    for len in [16usize, 256, 4096] {
        let numbers: Vec<f64> = (0..len).map(|i| i as f64 * 0.5).collect();
        group.bench_with_input(BenchmarkId::new("vec_f64", len), &numbers, |b, numbers| {
            b.iter(|| Vec::<f64>::from_value(numbers.clone().into_value()).unwrap())
        });

        let record: HashMap<String, i32> = (0..len as i32).map(|i| (format!("key{i}"), i)).collect();
        group.bench_with_input(BenchmarkId::new("record_i32", len), &record, |b, record| {
            b.iter(|| HashMap::<String, i32>::from_value(record.clone().into_value()).unwrap())
        });
    }

    group.finish();
}

fn bench_dispatch_round_trip(c: &mut Criterion) {
    let render = ThreadDispatcher::spawn(DispatcherKind::Render, "bench-render").unwrap();
    let pending = LoopDispatcher::new(DispatcherKind::Ui);

    let mut group = c.benchmark_group("dispatch");

    group.bench_function("thread_run_sync", |b| {
        b.iter(|| render.run_sync(|| black_box(7) * 6).unwrap())
    });

    group.bench_function("loop_queue_and_drain", |b| {
        b.iter(|| {
            for _ in 0..64 {
                pending.run_async(|| {}).unwrap();
            }
            pending.run_pending()
        })
    });

    group.finish();
    render.shutdown();
}

criterion_group!(benches, bench_dynamic_call, bench_conversion, bench_dispatch_round_trip);
criterion_main!(benches);
