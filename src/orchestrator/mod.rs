//! Training/evaluation entry point
//!
//! Two modes, each reading persisted state fresh:
//! - `save_cv`: fit the feature union and a cross-validated forest, persist the
//!   winner, report its hyperparameters and feature importances
//! - `evaluation`: load the persisted forest and encoders, report RMSE
//!
//! Any other mode string is reported back as [`RunOutcome::InvalidMode`]
//! without touching data or stores.

use crate::config::PipelineConfig;
use crate::error::{CartcastError, Result};
use crate::explainability::{ExplainabilityReporter, ExplanationReport, ImportanceReporter};
use crate::export::{FileStateStore, ModelArtifact, ModelMetadata, StateStore};
use crate::optimizer::{CandidateResult, GridPoint, GridSearchCV};
use crate::preprocessing::PipelineComposer;
use crate::training::{Model, ModelMetrics, RandomForest};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;
use tracing::{error, info, warn};

/// Run mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mode {
    /// Fit and persist a new model
    SaveCv,
    /// Score a persisted model
    Evaluation,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Mode::SaveCv => "save_cv",
            Mode::Evaluation => "evaluation",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = CartcastError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "save_cv" => Ok(Mode::SaveCv),
            "evaluation" => Ok(Mode::Evaluation),
            other => Err(CartcastError::ConfigError(format!("unknown mode '{}'", other))),
        }
    }
}

/// Result of a `save_cv` run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingReport {
    pub best_params: GridPoint,
    /// Mean cross-validated RMSE of the winner
    pub best_score: f64,
    pub cv_results: Vec<CandidateResult>,
    /// Feature matrix columns, in order
    pub feature_names: Vec<String>,
    /// Absent when disabled or when the reporter failed
    pub explanation: Option<ExplanationReport>,
    pub n_samples: usize,
}

/// Result of an `evaluation` run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    /// Root mean squared error, rounded to 3 decimals
    pub rmse: f64,
    pub n_samples: usize,
}

/// Outcome of one orchestrator invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RunOutcome {
    Trained(TrainingReport),
    Evaluated(EvaluationReport),
    /// Unknown mode string; nothing was computed
    InvalidMode { mode: String, message: String },
}

/// Drives one mode invocation against the configured stores
pub struct Orchestrator {
    config: PipelineConfig,
    encoder_store: Arc<dyn StateStore>,
    model_store: Arc<dyn StateStore>,
}

impl Orchestrator {
    pub fn new(
        config: PipelineConfig,
        encoder_store: Arc<dyn StateStore>,
        model_store: Arc<dyn StateStore>,
    ) -> Self {
        Self {
            config,
            encoder_store,
            model_store,
        }
    }

    /// File-backed stores under the configured artifact and output directories
    pub fn from_config(config: PipelineConfig) -> Self {
        let encoder_store = Arc::new(FileStateStore::new(config.artifacts_dir.clone()));
        let model_store = Arc::new(FileStateStore::new(config.outputs_dir.clone()));
        Self::new(config, encoder_store, model_store)
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Run `mode` on `df`
    pub fn run(&self, df: &DataFrame, mode: &str) -> Result<RunOutcome> {
        let mode = match mode.parse::<Mode>() {
            Ok(mode) => mode,
            Err(_) => {
                error!(mode = %mode, "Invalid mode");
                return Ok(RunOutcome::InvalidMode {
                    mode: mode.to_string(),
                    message: format!(
                        "Invalid mode '{}': expected '{}' or '{}'",
                        mode,
                        Mode::SaveCv,
                        Mode::Evaluation
                    ),
                });
            }
        };

        let start = Instant::now();
        let outcome = match mode {
            Mode::SaveCv => self.save_cv(df).map(RunOutcome::Trained),
            Mode::Evaluation => self.evaluate(df).map(RunOutcome::Evaluated),
        };
        info!(
            mode = %mode,
            ok = outcome.is_ok(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Run finished"
        );
        outcome
    }

    /// Fit the encoders and the model selector, then persist the winning forest
    pub fn save_cv(&self, df: &DataFrame) -> Result<TrainingReport> {
        let schema = &self.config.schema;
        schema.validate(df)?;
        let y = schema.target_values(df)?;

        let composer = PipelineComposer::new(self.config.clone(), self.encoder_store.clone());
        let search = GridSearchCV::<RandomForest>::new(
            self.config.param_grid.clone(),
            self.config.search.clone(),
        );
        let mut pipeline = composer.build(Some(search))?;
        pipeline.fit(df, &y)?;

        let feature_names = pipeline.features().output_columns();
        let x = pipeline.feature_matrix(df)?;
        let search = pipeline.into_model().ok_or_else(|| {
            CartcastError::TrainingError("pipeline lost its model stage".to_string())
        })?;

        let best_params = search.best_params().cloned().ok_or_else(|| {
            CartcastError::TrainingError("model selector produced no winner".to_string())
        })?;
        let best_score = search.best_score().unwrap_or(f64::NAN);
        let cv_results = search.cv_results().to_vec();
        let model = search.into_best_estimator().ok_or_else(|| CartcastError::NotFitted {
            transformer: "GridSearchCV".to_string(),
        })?;

        let metadata = ModelMetadata::new(&self.config.model_slot)
            .with_model_type(model.model_type())
            .with_features(feature_names.clone())
            .with_target(&schema.target)
            .add_metric("cv_rmse", best_score);
        let metadata = model
            .hyperparameters()
            .into_iter()
            .fold(metadata, |m, (k, v)| m.add_hyperparameter(k, v));

        let explanation = if self.config.explain.enabled {
            let reporter = ImportanceReporter::from_config(&self.config.explain);
            match reporter.explain(&model, &x, &y, &feature_names) {
                Ok(report) => {
                    for fi in &report.impurity {
                        info!(feature = %fi.feature, importance = fi.importance, "Feature importance");
                    }
                    Some(report)
                }
                Err(e) => {
                    warn!(error = %e, "Explainability report failed");
                    None
                }
            }
        } else {
            None
        };

        let n_trees = model.n_trees();
        ModelArtifact::new(model, metadata).save(self.model_store.as_ref(), &self.config.model_slot)?;
        info!(params = %best_params, cv_rmse = best_score, trees = n_trees, "Model saved with params");

        Ok(TrainingReport {
            best_params,
            best_score,
            cv_results,
            feature_names,
            explanation,
            n_samples: df.height(),
        })
    }

    /// Score the persisted forest on `df`
    pub fn evaluate(&self, df: &DataFrame) -> Result<EvaluationReport> {
        let schema = &self.config.schema;
        schema.validate(df)?;

        let artifact =
            ModelArtifact::<RandomForest>::load(self.model_store.as_ref(), &self.config.model_slot)?;
        let composer = PipelineComposer::new(self.config.clone(), self.encoder_store.clone());
        let pipeline = composer.build(Some(artifact.model))?;

        let expected = &artifact.metadata.feature_names;
        let actual = pipeline.features().output_columns();
        if !expected.is_empty() && *expected != actual {
            return Err(CartcastError::ValidationError(format!(
                "model was trained on features {:?}, pipeline produces {:?}",
                expected, actual
            )));
        }

        let y = schema.target_values(df)?;
        let predictions = pipeline.predict(df)?;
        let metrics = ModelMetrics::compute_regression(&y, &predictions)?;
        let rmse = (metrics.rmse * 1000.0).round() / 1000.0;

        info!(rmse = rmse, mae = metrics.mae, r2 = metrics.r2, rows = df.height(), "Evaluation mean error");
        Ok(EvaluationReport {
            rmse,
            n_samples: df.height(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::{MemoryStateStore, DEFAULT_MODEL_SLOT};
    use crate::optimizer::{ParamGrid, SearchConfig};
    use crate::schema::Schema;

    fn config() -> PipelineConfig {
        PipelineConfig::default()
            .with_schema(Schema::new(
                vec!["Age".to_string(), "Orders".to_string()],
                vec!["TopCategory".to_string()],
                "TotalCart",
            ))
            .with_search(SearchConfig::default().with_cv_folds(3).with_n_jobs(Some(2)))
            .with_param_grid(
                ParamGrid::new()
                    .with_param("n_estimators", [5i64])
                    .with_param("max_depth", [2i64, 1000]),
            )
    }

    fn frame(n: usize) -> DataFrame {
        let categories = ["Beauty", "Clothing", "Sports"];
        let age: Vec<f64> = (0..n).map(|i| 18.0 + (i * 7 % 50) as f64).collect();
        let orders: Vec<i64> = (0..n).map(|i| (i * 3 % 11) as i64).collect();
        let top: Vec<&str> = (0..n).map(|i| categories[i % 3]).collect();
        let total: Vec<f64> = (0..n)
            .map(|i| 2.0 * age[i] + 10.0 * orders[i] as f64 + (i % 3) as f64 * 5.0)
            .collect();
        df![
            "Age" => age,
            "Orders" => orders,
            "TopCategory" => top,
            "TotalCart" => total,
        ]
        .unwrap()
    }

    fn orchestrator() -> (Orchestrator, Arc<MemoryStateStore>, Arc<MemoryStateStore>) {
        let encoders = Arc::new(MemoryStateStore::new());
        let models = Arc::new(MemoryStateStore::new());
        (
            Orchestrator::new(config(), encoders.clone(), models.clone()),
            encoders,
            models,
        )
    }

    #[test]
    fn test_mode_parsing() {
        assert_eq!("save_cv".parse::<Mode>().unwrap(), Mode::SaveCv);
        assert_eq!("evaluation".parse::<Mode>().unwrap(), Mode::Evaluation);
        assert!("Save_CV".parse::<Mode>().is_err());
    }

    #[test]
    fn test_invalid_mode_is_a_no_op() {
        let (orch, encoders, models) = orchestrator();
        let outcome = orch.run(&frame(30), "predict").unwrap();

        match outcome {
            RunOutcome::InvalidMode { mode, message } => {
                assert_eq!(mode, "predict");
                assert!(message.contains("save_cv"));
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert!(encoders.is_empty());
        assert!(models.is_empty());
    }

    #[test]
    fn test_evaluation_without_model() {
        let (orch, _, _) = orchestrator();
        assert!(matches!(
            orch.run(&frame(30), "evaluation"),
            Err(CartcastError::ArtifactNotFound { .. })
        ));
    }

    #[test]
    fn test_save_then_evaluate() {
        let (orch, encoders, models) = orchestrator();
        let df = frame(120);

        let report = match orch.run(&df.slice(0, 90), "save_cv").unwrap() {
            RunOutcome::Trained(report) => report,
            other => panic!("unexpected outcome: {:?}", other),
        };
        assert_eq!(report.cv_results.len(), 2);
        assert_eq!(report.feature_names, vec!["Age", "Orders", "TopCategory"]);
        assert_eq!(report.n_samples, 90);
        assert!(report.best_score.is_finite());
        let explanation = report.explanation.unwrap();
        assert_eq!(explanation.permutation.len(), 3);

        assert_eq!(encoders.len(), 2);
        assert_eq!(models.len(), 1);

        let artifact = ModelArtifact::<RandomForest>::load(&*models, DEFAULT_MODEL_SLOT).unwrap();
        assert_eq!(artifact.model.n_trees(), 5);
        let hyperparameters = &artifact.metadata.hyperparameters;
        assert_eq!(hyperparameters.get("n_estimators"), Some(&"5".to_string()));
        assert!(hyperparameters.contains_key("min_samples_leaf"));
        assert!(hyperparameters.contains_key("random_state"));

        let evaluated = match orch.run(&df.slice(90, 30), "evaluation").unwrap() {
            RunOutcome::Evaluated(report) => report,
            other => panic!("unexpected outcome: {:?}", other),
        };
        assert_eq!(evaluated.n_samples, 30);
        assert!(evaluated.rmse >= 0.0);
        assert_eq!(evaluated.rmse, (evaluated.rmse * 1000.0).round() / 1000.0);
    }

    #[test]
    fn test_missing_column_is_rejected() {
        let (orch, _, _) = orchestrator();
        let df = frame(30).drop("Orders").unwrap();
        assert!(matches!(
            orch.run(&df, "save_cv"),
            Err(CartcastError::FeatureNotFound(name)) if name == "Orders"
        ));
    }
}
