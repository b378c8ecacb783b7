use cartcast::export::{MemoryStateStore, StateStore};
use cartcast::preprocessing::{frame_to_array, FeatureUnion, FitPersistence, ScalerType};
use cartcast::schema::Schema;
use cartcast::training::RandomForest;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use polars::prelude::*;
use rand::prelude::*;
use rand_chacha::ChaCha8Rng;
use std::sync::Arc;

fn create_records(n_rows: usize) -> DataFrame {
    let mut rng = ChaCha8Rng::seed_from_u64(42);
    let schema = Schema::default();
    let categories = ["Beauty", "Books", "Clothing", "Sports"];

    let mut columns: Vec<Column> = schema
        .quantitative
        .iter()
        .map(|name| {
            let values: Vec<f64> = (0..n_rows).map(|_| rng.gen::<f64>() * 10.0).collect();
            Column::new(name.as_str().into(), values)
        })
        .collect();

    let top: Vec<&str> = (0..n_rows)
        .map(|_| categories[rng.gen_range(0..categories.len())])
        .collect();
    columns.push(Column::new("TopCategory".into(), top));

    DataFrame::new(columns).unwrap()
}

fn fitted_union(df: &DataFrame) -> FeatureUnion {
    let store: Arc<dyn StateStore> = Arc::new(MemoryStateStore::new());
    let mut union = FeatureUnion::from_schema(
        &Schema::default(),
        ScalerType::Standard,
        FitPersistence::Always,
        store,
    )
    .unwrap();
    union.fit(df).unwrap();
    union
}

fn bench_union_transform(c: &mut Criterion) {
    let mut group = c.benchmark_group("feature_union");

    for n_rows in [1_000, 10_000, 100_000].iter() {
        let df = create_records(*n_rows);
        let union = fitted_union(&df);

        group.bench_with_input(BenchmarkId::new("transform", n_rows), &df, |b, df| {
            b.iter(|| union.transform(black_box(df)).unwrap())
        });
    }

    group.finish();
}

fn bench_forest_fit(c: &mut Criterion) {
    let mut group = c.benchmark_group("random_forest");
    group.sample_size(10);

    for n_rows in [1_000, 5_000].iter() {
        let df = create_records(*n_rows);
        let x = frame_to_array(&fitted_union(&df).transform(&df).unwrap()).unwrap();
        let y = x.column(0).mapv(|v| 3.0 * v) + x.column(8).mapv(|v| 10.0 * v);

        group.bench_with_input(BenchmarkId::new("fit", n_rows), &(x, y), |b, (x, y)| {
            b.iter(|| {
                let mut forest = RandomForest::new(25).with_max_depth(12);
                forest.fit(black_box(x), black_box(y)).unwrap();
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_union_transform, bench_forest_fit);
criterion_main!(benches);
