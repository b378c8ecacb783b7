//! Integration test: model selector over encoded features

use cartcast::export::{MemoryStateStore, StateStore};
use cartcast::optimizer::{default_random_forest_grid, GridSearchCV, ParamGrid, SearchConfig};
use cartcast::preprocessing::{FitPersistence, FeatureUnion, Pipeline, ScalerType};
use cartcast::schema::Schema;
use cartcast::training::{Estimator, RandomForest};
use polars::prelude::*;
use std::sync::Arc;

fn records(n: usize) -> DataFrame {
    let categories = ["Beauty", "Books", "Clothing", "Sports"];
    let age: Vec<f64> = (0..n).map(|i| 18.0 + ((i * 13) % 47) as f64).collect();
    let items: Vec<f64> = (0..n).map(|i| ((i * 7) % 19) as f64).collect();
    let top: Vec<&str> = (0..n).map(|i| categories[(i * 5) % 4]).collect();
    let total: Vec<f64> = (0..n)
        .map(|i| 15.0 * items[i] + 0.5 * age[i] + if (i * 5) % 4 == 0 { 40.0 } else { 0.0 })
        .collect();

    df!(
        "Age" => age,
        "Items" => items,
        "TopCategory" => top,
        "TotalCart" => total,
    )
    .unwrap()
}

fn schema() -> Schema {
    Schema::new(
        vec!["Age".to_string(), "Items".to_string()],
        vec!["TopCategory".to_string()],
        "TotalCart",
    )
}

fn grid() -> ParamGrid {
    ParamGrid::new()
        .with_param("n_estimators", [4i64, 8])
        .with_param("max_depth", [2i64, 1000])
        .with_param("max_features", ["auto", "sqrt"])
}

fn fit_pipeline(df: &DataFrame, n_jobs: usize) -> Pipeline<GridSearchCV<RandomForest>> {
    let store: Arc<dyn StateStore> = Arc::new(MemoryStateStore::new());
    let union =
        FeatureUnion::from_schema(&schema(), ScalerType::Standard, FitPersistence::Always, store)
            .unwrap();
    let search = GridSearchCV::new(
        grid(),
        SearchConfig::default().with_cv_folds(4).with_n_jobs(Some(n_jobs)),
    );
    let y = schema().target_values(df).unwrap();

    let mut pipeline = Pipeline::build(union, Some(search));
    pipeline.fit(df, &y).unwrap();
    pipeline
}

#[test]
fn test_default_grid_matches_reference_space() {
    let grid = default_random_forest_grid();
    assert_eq!(grid.len(), 160);
    assert_eq!(
        grid.names(),
        vec!["max_depth", "max_features", "min_samples_leaf", "min_samples_split", "n_estimators"]
    );
}

#[test]
fn test_deep_trees_beat_stumps() {
    let df = records(200);
    let pipeline = fit_pipeline(&df, 4);
    let search = pipeline.model().unwrap();

    assert_eq!(search.cv_results().len(), 8);
    let best = search.best_params().unwrap();
    assert_eq!(best.get_usize("max_depth").unwrap(), Some(1000));
}

#[test]
fn test_selection_is_deterministic_across_worker_counts() {
    let df = records(160);
    let a = fit_pipeline(&df, 1);
    let b = fit_pipeline(&df, 8);

    let (sa, sb) = (a.model().unwrap(), b.model().unwrap());
    assert_eq!(sa.best_params(), sb.best_params());
    assert_eq!(sa.best_score(), sb.best_score());
    assert_eq!(a.predict(&df).unwrap(), b.predict(&df).unwrap());
}

#[test]
fn test_winner_predicts_training_rows_closely() {
    let df = records(200);
    let pipeline = fit_pipeline(&df, 4);
    let y = schema().target_values(&df).unwrap();
    let predictions = pipeline.predict(&df).unwrap();

    let rmse = ((&predictions - &y).mapv(|d| d * d).sum() / y.len() as f64).sqrt();
    assert!(rmse < pipeline.model().unwrap().best_score().unwrap());
    assert_eq!(
        Estimator::predict(pipeline.model().unwrap(), &pipeline.feature_matrix(&df).unwrap())
            .unwrap(),
        predictions
    );
}
