//! Pipeline configuration

use crate::error::{CartcastError, Result};
use crate::optimizer::{default_random_forest_grid, ParamGrid};
use crate::preprocessing::{FitPersistence, ScalerType};
use crate::schema::Schema;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub use crate::optimizer::SearchConfig;

/// Explainability reporting after a training run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExplainConfig {
    /// Whether to compute the report at all
    pub enabled: bool,
    /// Permutation repeats per feature
    pub n_repeats: usize,
    /// Seed of the permutations
    pub seed: u64,
}

impl Default for ExplainConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            n_repeats: 5,
            seed: 42,
        }
    }
}

/// Configuration for the training/evaluation pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Input columns
    pub schema: Schema,

    /// Directory of the encoder state slots
    pub artifacts_dir: PathBuf,

    /// Directory of the model slot
    pub outputs_dir: PathBuf,

    /// Slot of the trained model
    pub model_slot: String,

    /// Scaling applied by the quantitative encoder
    pub scaler: ScalerType,

    /// Whether a failed encoder fit still writes its state back
    pub persistence: FitPersistence,

    /// Model selector settings
    pub search: SearchConfig,

    /// Hyperparameter grid searched during training
    pub param_grid: ParamGrid,

    /// Explainability report settings
    pub explain: ExplainConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            schema: Schema::default(),
            artifacts_dir: PathBuf::from("./model/artifacts"),
            outputs_dir: PathBuf::from("./model/outputs"),
            model_slot: crate::export::DEFAULT_MODEL_SLOT.to_string(),
            scaler: ScalerType::Standard,
            persistence: FitPersistence::Always,
            search: SearchConfig::default(),
            param_grid: default_random_forest_grid(),
            explain: ExplainConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Load from a JSON file. Missing fields keep their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations no run could succeed with
    pub fn validate(&self) -> Result<()> {
        if self.schema.feature_columns().is_empty() {
            return Err(CartcastError::ConfigError(
                "schema has no feature columns".to_string(),
            ));
        }
        if self.schema.target.is_empty() {
            return Err(CartcastError::ConfigError(
                "schema has no target column".to_string(),
            ));
        }
        if self.search.cv_folds < 2 {
            return Err(CartcastError::ConfigError(format!(
                "cv_folds must be at least 2, got {}",
                self.search.cv_folds
            )));
        }
        if self.model_slot.is_empty() {
            return Err(CartcastError::ConfigError("model_slot is empty".to_string()));
        }
        self.param_grid.validate()
    }

    /// Builder method to set the schema
    pub fn with_schema(mut self, schema: Schema) -> Self {
        self.schema = schema;
        self
    }

    /// Builder method to set the encoder state directory
    pub fn with_artifacts_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.artifacts_dir = dir.into();
        self
    }

    /// Builder method to set the model directory
    pub fn with_outputs_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.outputs_dir = dir.into();
        self
    }

    /// Builder method to set the model slot
    pub fn with_model_slot(mut self, slot: impl Into<String>) -> Self {
        self.model_slot = slot.into();
        self
    }

    /// Builder method to set scaler type
    pub fn with_scaler(mut self, scaler: ScalerType) -> Self {
        self.scaler = scaler;
        self
    }

    /// Builder method to set the persistence policy of encoder fits
    pub fn with_persistence(mut self, persistence: FitPersistence) -> Self {
        self.persistence = persistence;
        self
    }

    /// Builder method to set search settings
    pub fn with_search(mut self, search: SearchConfig) -> Self {
        self.search = search;
        self
    }

    /// Builder method to set the hyperparameter grid
    pub fn with_param_grid(mut self, grid: ParamGrid) -> Self {
        self.param_grid = grid;
        self
    }

    /// Builder method to set explainability settings
    pub fn with_explain(mut self, explain: ExplainConfig) -> Self {
        self.explain = explain;
        self
    }
}
