//! cartcast - basket-value regression on customer records
//!
//! A persisted feature pipeline feeding a grid-searched random forest, driven
//! in two modes: fit-and-save or load-and-evaluate.
//!
//! # Modules
//!
//! ## Core
//! - [`preprocessing`] - column encoders, feature union, pipeline composer
//! - [`optimizer`] - hyperparameter grid and cross-validated grid search
//! - [`training`] - regression trees, random forest, k-fold splitting
//! - [`export`] - encoder state store and model artifacts
//! - [`orchestrator`] - `save_cv` / `evaluation` entry point
//!
//! ## Reporting
//! - [`explainability`] - impurity and permutation importances
//! - [`explore`] - descriptive statistics of raw tables
//!
//! ## Utilities
//! - [`config`] - pipeline configuration
//! - [`schema`] - input columns and target
//! - [`utils`] - CSV loading
//! - [`cli`] - command-line interface

// Core error handling
pub mod error;
pub mod config;
pub mod schema;

// Core
pub mod preprocessing;
pub mod training;
pub mod optimizer;
pub mod export;
pub mod orchestrator;

// Reporting
pub mod explainability;
pub mod explore;

// Utilities
pub mod utils;
pub mod cli;

pub use error::{CartcastError, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::error::{CartcastError, Result};
    pub use crate::config::{ExplainConfig, PipelineConfig};
    pub use crate::schema::Schema;

    // Preprocessing
    pub use crate::preprocessing::{
        ColumnTransformer, FeatureUnion, FitPersistence, Pipeline, PipelineComposer,
        QualitativeEncoder, QuantitativeEncoder, ScalerType,
    };

    // Training and search
    pub use crate::training::{Estimator, Model, RandomForest, Tunable};
    pub use crate::optimizer::{GridPoint, GridSearchCV, ParamGrid, SearchConfig};

    // Persistence
    pub use crate::export::{FileStateStore, MemoryStateStore, ModelArtifact, StateStore};

    // Entry point
    pub use crate::orchestrator::{Mode, Orchestrator, RunOutcome};
}
