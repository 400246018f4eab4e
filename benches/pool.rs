//! Replay pool benchmarks
use criterion::{
    criterion_group, criterion_main, AxisScale, BenchmarkId, Criterion, PlotConfiguration,
    Throughput,
};
use flexpool::{AllFields, DType, FieldArray, FieldSpec, FlexibleReplayPool, Prng};
use ndarray::Array2;
use rand::SeedableRng;

const CAPACITY: usize = 100_000;
const OBS_DIM: usize = 16;

fn new_pool() -> FlexibleReplayPool {
    FlexibleReplayPool::new(
        CAPACITY,
        [
            ("observation", FieldSpec::new(DType::F32, [OBS_DIM])),
            ("action", FieldSpec::scalar(DType::I64)),
            ("reward", FieldSpec::scalar(DType::F32)),
            ("done", FieldSpec::scalar(DType::Bool)),
        ],
    )
    .unwrap()
}

fn full_pool() -> FlexibleReplayPool {
    let mut pool = new_pool();
    pool.add_samples(
        CAPACITY,
        [
            ("observation", FieldArray::from(Array2::<f32>::ones((CAPACITY, OBS_DIM)))),
            ("action", FieldArray::from(1_i64)),
        ],
    )
    .unwrap();
    pool
}

fn bench_add_samples(c: &mut Criterion) {
    let mut group = c.benchmark_group("add_samples");
    let plot_config = PlotConfiguration::default().summary_scale(AxisScale::Logarithmic);
    group.plot_config(plot_config);

    for num_samples in [1_u64, 100, 10_000] {
        group.throughput(Throughput::Elements(num_samples));
        #[allow(clippy::cast_possible_truncation)]
        let n = num_samples as usize;
        let observations = FieldArray::from(Array2::<f32>::zeros((n, OBS_DIM)));
        let mut pool = new_pool();
        group.bench_with_input(
            BenchmarkId::from_parameter(num_samples),
            &observations,
            |b, observations| {
                b.iter(|| {
                    pool.add_samples(n, [("observation", observations.clone())])
                        .unwrap()
                })
            },
        );
    }
}

fn bench_sample(c: &mut Criterion) {
    let pool = full_pool();
    let mut rng = Prng::seed_from_u64(0);

    let mut group = c.benchmark_group("sample");
    for batch_size in [32_u64, 256, 4096] {
        group.throughput(Throughput::Elements(batch_size));
        #[allow(clippy::cast_possible_truncation)]
        let n = batch_size as usize;
        group.bench_function(BenchmarkId::new("random", batch_size), |b| {
            b.iter_with_large_drop(|| pool.random_batch(n, AllFields, &mut rng))
        });
        group.bench_function(BenchmarkId::new("last_n", batch_size), |b| {
            b.iter_with_large_drop(|| pool.last_n_batch(n, AllFields))
        });
    }
}

fn bench_snapshot(c: &mut Criterion) {
    let pool = full_pool();
    c.bench_function("export_import", |b| {
        b.iter(|| FlexibleReplayPool::import(pool.export()).unwrap())
    });
}

criterion_group!(benches, bench_add_samples, bench_sample, bench_snapshot);
criterion_main!(benches);
