//! Model explainability
//!
//! Reporters receive the fitted model with the feature matrix it was trained
//! on and return global per-feature attributions:
//! - impurity (mean decrease in impurity) importances from tree ensembles
//! - permutation importance measured as RMSE increase

mod importance;

pub use importance::ImportanceReporter;

use crate::error::Result;
use crate::training::Model;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

/// Importance of one named feature
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureImportance {
    pub feature: String,
    pub importance: f64,
}

/// Permutation importance of one named feature
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PermutationScore {
    pub feature: String,
    /// Mean RMSE increase when the feature is shuffled
    pub mean: f64,
    pub std: f64,
}

/// Global explanation of a fitted model
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExplanationReport {
    /// Impurity importances, most important first; empty when the model has none
    pub impurity: Vec<FeatureImportance>,
    /// Permutation importances, most important first
    pub permutation: Vec<PermutationScore>,
    /// RMSE of the unshuffled matrix
    pub baseline_rmse: f64,
}

impl ExplanationReport {
    /// Names of the `k` features with the highest impurity importance
    pub fn top_features(&self, k: usize) -> Vec<&str> {
        self.impurity
            .iter()
            .take(k)
            .map(|f| f.feature.as_str())
            .collect()
    }
}

/// Produces an explanation of a fitted model
pub trait ExplainabilityReporter: Send + Sync {
    fn explain(
        &self,
        model: &dyn Model,
        x: &Array2<f64>,
        y: &Array1<f64>,
        feature_names: &[String],
    ) -> Result<ExplanationReport>;
}
