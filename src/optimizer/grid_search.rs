//! Exhaustive grid search with k-fold cross-validation.
//!
//! Scoring convention: the validation RMSE of each fold, averaged over folds.
//! Lower is better. Ties go to the candidate enumerated first.

use super::config::SearchConfig;
use super::grid::{GridPoint, ParamGrid};
use crate::error::{CartcastError, Result};
use crate::training::{root_mean_squared_error, CVResults, CVSplit, Estimator, KFold, Tunable};
use ndarray::{Array1, Array2, Axis};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Cross-validation outcome of one grid point
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateResult {
    /// Position in grid enumeration order
    pub index: usize,
    pub params: GridPoint,
    /// Validation RMSE per fold; empty when a fold failed
    pub fold_scores: Vec<f64>,
    /// Mean validation RMSE; infinite when a fold failed
    pub mean_score: f64,
    pub std_score: f64,
    /// 1 for the best candidate
    pub rank: usize,
    /// First fold failure, if any
    pub error: Option<String>,
}

/// Model selector over a hyperparameter grid
pub struct GridSearchCV<M: Tunable> {
    grid: ParamGrid,
    config: SearchConfig,
    best_estimator: Option<M>,
    best_index: Option<usize>,
    cv_results: Vec<CandidateResult>,
}

impl<M: Tunable> GridSearchCV<M> {
    pub fn new(grid: ParamGrid, config: SearchConfig) -> Self {
        Self {
            grid,
            config,
            best_estimator: None,
            best_index: None,
            cv_results: Vec::new(),
        }
    }

    pub fn grid(&self) -> &ParamGrid {
        &self.grid
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    /// Evaluate every grid point, then refit the winner on all of `x`
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        if x.nrows() != y.len() {
            return Err(CartcastError::ShapeError {
                expected: format!("y length = {}", x.nrows()),
                actual: format!("y length = {}", y.len()),
            });
        }
        self.grid.validate()?;

        let start = Instant::now();
        let mut kfold = KFold::new(self.config.cv_folds);
        if self.config.shuffle {
            kfold = kfold.with_shuffle(self.config.random_state);
        }
        let splits = kfold.split(x.nrows())?;
        let points = self.grid.points();

        info!(
            candidates = points.len(),
            folds = splits.len(),
            rows = x.nrows(),
            "Starting grid search"
        );

        let tasks: Vec<(usize, usize)> = (0..points.len())
            .flat_map(|p| (0..splits.len()).map(move |f| (p, f)))
            .collect();

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.n_jobs.unwrap_or(0))
            .build()
            .map_err(|e| CartcastError::OptimizationError(e.to_string()))?;

        let random_state = self.config.random_state;
        let scores: Vec<Result<f64>> = pool.install(|| {
            tasks
                .par_iter()
                .map(|&(p, f)| Self::evaluate(&points[p], &splits[f], x, y, random_state))
                .collect()
        });

        let results = Self::reduce(points, splits.len(), scores);
        let best = results
            .iter()
            .find(|r| r.rank == 1 && r.error.is_none())
            .ok_or_else(|| {
                CartcastError::OptimizationError(format!(
                    "all {} candidates failed to fit",
                    results.len()
                ))
            })?;

        info!(
            best_index = best.index,
            best_score = best.mean_score,
            params = %best.params,
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Grid search finished"
        );

        let mut estimator = M::from_params(&best.params, random_state)?;
        estimator.fit(x, y)?;

        self.best_index = Some(best.index);
        self.best_estimator = Some(estimator);
        self.cv_results = results;
        Ok(self)
    }

    fn evaluate(
        params: &GridPoint,
        split: &CVSplit,
        x: &Array2<f64>,
        y: &Array1<f64>,
        random_state: u64,
    ) -> Result<f64> {
        let mut model = M::from_params(params, random_state)?;

        let x_train = x.select(Axis(0), &split.train_indices);
        let y_train = y.select(Axis(0), &split.train_indices);
        model.fit(&x_train, &y_train)?;

        let x_valid = x.select(Axis(0), &split.test_indices);
        let y_valid = y.select(Axis(0), &split.test_indices);
        let score = root_mean_squared_error(&y_valid, &model.predict(&x_valid)?)?;

        debug!(params = %params, fold = split.fold_idx, rmse = score, "Fold evaluated");
        Ok(score)
    }

    /// Fold scores arrive in task order (point-major). Group them per point
    /// and rank by mean score.
    fn reduce(
        points: Vec<GridPoint>,
        n_folds: usize,
        scores: Vec<Result<f64>>,
    ) -> Vec<CandidateResult> {
        let mut scores = scores.into_iter();
        let mut results: Vec<CandidateResult> = points
            .into_iter()
            .enumerate()
            .map(|(index, params)| {
                let folds: Vec<Result<f64>> = scores.by_ref().take(n_folds).collect();
                let failure = folds.iter().find_map(|r| r.as_ref().err().map(|e| e.to_string()));

                match failure {
                    Some(error) => {
                        warn!(candidate = index, params = %params, error = %error, "Candidate failed");
                        CandidateResult {
                            index,
                            params,
                            fold_scores: Vec::new(),
                            mean_score: f64::INFINITY,
                            std_score: f64::NAN,
                            rank: 0,
                            error: Some(error),
                        }
                    }
                    None => {
                        let cv = CVResults::from_scores(folds.into_iter().flatten().collect());
                        CandidateResult {
                            index,
                            params,
                            fold_scores: cv.scores,
                            mean_score: cv.mean_score,
                            std_score: cv.std_score,
                            rank: 0,
                            error: None,
                        }
                    }
                }
            })
            .collect();

        let mut order: Vec<usize> = (0..results.len()).collect();
        // stable sort keeps enumeration order among equal scores
        order.sort_by(|&a, &b| {
            let (ra, rb) = (&results[a], &results[b]);
            ra.error
                .is_some()
                .cmp(&rb.error.is_some())
                .then(ra.mean_score.total_cmp(&rb.mean_score))
        });
        for (position, &idx) in order.iter().enumerate() {
            results[idx].rank = position + 1;
        }
        results
    }

    /// Winner refit on the full training set
    pub fn best_estimator(&self) -> Option<&M> {
        self.best_estimator.as_ref()
    }

    pub fn into_best_estimator(self) -> Option<M> {
        self.best_estimator
    }

    /// Winning hyperparameters
    pub fn best_params(&self) -> Option<&GridPoint> {
        self.best_index.map(|i| &self.cv_results[i].params)
    }

    /// Mean validation RMSE of the winner
    pub fn best_score(&self) -> Option<f64> {
        self.best_index.map(|i| self.cv_results[i].mean_score)
    }

    pub fn best_index(&self) -> Option<usize> {
        self.best_index
    }

    /// Per-candidate results, in grid enumeration order
    pub fn cv_results(&self) -> &[CandidateResult] {
        &self.cv_results
    }
}

impl<M: Tunable> Estimator for GridSearchCV<M> {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        GridSearchCV::fit(self, x, y).map(|_| ())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        self.best_estimator
            .as_ref()
            .ok_or_else(|| CartcastError::NotFitted {
                transformer: "GridSearchCV".to_string(),
            })?
            .predict(x)
    }
}
