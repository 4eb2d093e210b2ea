//! Benchmarks for pipeline execution
//!
//! Run with: cargo bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use preproc_rs::config::EngineConfig;
use preproc_rs::pipeline::{ExecutionContext, ItemPipeline, StepKind, StepSpec};
use preproc_rs::types::{ItemValueType, Timestamp, Value};

fn payload(fields: usize) -> String {
    let body: Vec<String> = (0..fields).map(|i| format!("\"f{}\":{}", i, i * 3)).collect();
    format!("{{{}}}", body.join(","))
}

fn json_items(count: usize) -> Vec<ItemPipeline> {
    (0..count)
        .map(|i| {
            ItemPipeline::new(
                i as u64,
                ItemValueType::Unsigned,
                vec![StepSpec::new(StepKind::JsonPath, format!("$.f{}", i))],
            )
        })
        .collect()
}

fn bench_json_path_sharing(c: &mut Criterion) {
    let mut group = c.benchmark_group("json_path_dependent_items");
    let raw = Value::string(payload(200));
    let now = Timestamp::from_secs(1);

    for items in [1, 10, 50].iter() {
        group.throughput(Throughput::Elements(*items as u64));

        group.bench_with_input(BenchmarkId::new("uncached", items), items, |b, &items| {
            let mut ctx = ExecutionContext::new(EngineConfig::default());
            let mut pipelines = json_items(items);
            b.iter(|| {
                for pipeline in pipelines.iter_mut() {
                    black_box(ctx.run(pipeline, None, &raw, now));
                }
            });
        });

        group.bench_with_input(BenchmarkId::new("shared_cache", items), items, |b, &items| {
            let mut ctx = ExecutionContext::new(EngineConfig::default());
            let mut pipelines = json_items(items);
            b.iter(|| {
                let cache = pipelines[0].parse_cache(&raw);
                for pipeline in pipelines.iter_mut() {
                    black_box(ctx.run(pipeline, cache.as_ref(), &raw, now));
                }
                if let Some(cache) = cache {
                    cache.release();
                }
            });
        });
    }

    group.finish();
}

fn bench_numeric_pipeline(c: &mut Criterion) {
    let mut ctx = ExecutionContext::new(EngineConfig::default());
    let mut pipeline = ItemPipeline::new(
        1,
        ItemValueType::Float,
        vec![
            StepSpec::new(StepKind::Trim, " \""),
            StepSpec::new(StepKind::RegexSubstitute, "value=([0-9.]+)\n\\1"),
            StepSpec::new(StepKind::Scale, "0.001"),
            StepSpec::new(StepKind::DeltaSpeed, ""),
        ],
    );

    let mut sec = 1;
    c.bench_function("numeric_pipeline", |b| {
        b.iter(|| {
            sec += 1;
            let input = Value::string(format!(" \"value={}\" ", sec * 1500));
            black_box(ctx.run(&mut pipeline, None, &input, Timestamp::from_secs(sec)))
        });
    });
}

criterion_group!(benches, bench_json_path_sharing, bench_numeric_pipeline);
criterion_main!(benches);
