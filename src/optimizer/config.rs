//! Model selector configuration

use serde::{Deserialize, Serialize};

/// Configuration of the cross-validated grid search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Cross-validation folds for evaluation
    pub cv_folds: usize,

    /// Number of parallel workers; `None` uses every core
    pub n_jobs: Option<usize>,

    /// Seed handed to every candidate model and to fold shuffling
    pub random_state: u64,

    /// Whether to shuffle rows before cutting folds
    pub shuffle: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            cv_folds: 4,
            n_jobs: Some(10),
            random_state: 42,
            shuffle: false,
        }
    }
}

impl SearchConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to set the fold count
    pub fn with_cv_folds(mut self, folds: usize) -> Self {
        self.cv_folds = folds;
        self
    }

    /// Builder method to bound the worker pool
    pub fn with_n_jobs(mut self, n: Option<usize>) -> Self {
        self.n_jobs = n;
        self
    }

    /// Builder method to set the random seed
    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    /// Builder method to enable fold shuffling
    pub fn with_shuffle(mut self, shuffle: bool) -> Self {
        self.shuffle = shuffle;
        self
    }
}
