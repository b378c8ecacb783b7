//! Impurity and permutation feature importance

use super::{ExplainabilityReporter, ExplanationReport, FeatureImportance, PermutationScore};
use crate::config::ExplainConfig;
use crate::error::{CartcastError, Result};
use crate::training::{root_mean_squared_error, Model};
use ndarray::{Array1, Array2};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;

/// Reports impurity importances and seeded permutation importances
#[derive(Debug, Clone)]
pub struct ImportanceReporter {
    n_repeats: usize,
    seed: u64,
}

impl Default for ImportanceReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl ImportanceReporter {
    pub fn new() -> Self {
        Self {
            n_repeats: 5,
            seed: 42,
        }
    }

    pub fn from_config(config: &ExplainConfig) -> Self {
        Self::new()
            .with_n_repeats(config.n_repeats)
            .with_seed(config.seed)
    }

    /// Set number of permutation repeats
    pub fn with_n_repeats(mut self, n_repeats: usize) -> Self {
        self.n_repeats = n_repeats.max(1);
        self
    }

    /// Set random seed
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    fn impurity(model: &dyn Model, feature_names: &[String]) -> Vec<FeatureImportance> {
        let mut importances: Vec<FeatureImportance> = match model.feature_importances() {
            Some(values) => feature_names
                .iter()
                .zip(values.iter())
                .map(|(name, &importance)| FeatureImportance {
                    feature: name.clone(),
                    importance,
                })
                .collect(),
            None => Vec::new(),
        };
        importances.sort_by(|a, b| b.importance.total_cmp(&a.importance));
        importances
    }

    /// Shuffle each column `n_repeats` times; feature `j` uses its own stream
    /// seeded from `seed + j`, so results do not depend on scheduling.
    fn permutation(
        &self,
        model: &dyn Model,
        x: &Array2<f64>,
        y: &Array1<f64>,
        baseline: f64,
    ) -> Result<Vec<(f64, f64)>> {
        (0..x.ncols())
            .into_par_iter()
            .map(|feature_idx| -> Result<(f64, f64)> {
                let mut rng = ChaCha8Rng::seed_from_u64(self.seed.wrapping_add(feature_idx as u64));
                let mut x_permuted = x.clone();
                let mut increases = Vec::with_capacity(self.n_repeats);

                for _ in 0..self.n_repeats {
                    let mut col: Vec<f64> = x.column(feature_idx).to_vec();
                    col.shuffle(&mut rng);
                    x_permuted.column_mut(feature_idx).assign(&Array1::from_vec(col));

                    let score = root_mean_squared_error(y, &model.predict(&x_permuted)?)?;
                    increases.push(score - baseline);
                }

                let n = increases.len() as f64;
                let mean = increases.iter().sum::<f64>() / n;
                let var = increases.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / n;
                Ok((mean, var.sqrt()))
            })
            .collect()
    }
}

impl ExplainabilityReporter for ImportanceReporter {
    fn explain(
        &self,
        model: &dyn Model,
        x: &Array2<f64>,
        y: &Array1<f64>,
        feature_names: &[String],
    ) -> Result<ExplanationReport> {
        if feature_names.len() != x.ncols() {
            return Err(CartcastError::ShapeError {
                expected: format!("{} feature names", x.ncols()),
                actual: format!("{} feature names", feature_names.len()),
            });
        }

        let baseline_rmse = root_mean_squared_error(y, &model.predict(x)?)?;

        let mut permutation: Vec<PermutationScore> = self
            .permutation(model, x, y, baseline_rmse)?
            .into_iter()
            .zip(feature_names.iter())
            .map(|((mean, std), name)| PermutationScore {
                feature: name.clone(),
                mean,
                std,
            })
            .collect();
        permutation.sort_by(|a, b| b.mean.total_cmp(&a.mean));

        Ok(ExplanationReport {
            impurity: Self::impurity(model, feature_names),
            permutation,
            baseline_rmse,
        })
    }
}
