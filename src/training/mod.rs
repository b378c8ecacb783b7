//! Model training module
//!
//! Provides the regression estimator searched by the model selector:
//! - Decision trees and Random Forests
//! - K-fold cross-validation
//! - Model traits and regression metrics

pub mod cross_validation;
pub mod decision_tree;
mod models;
pub mod random_forest;

pub use cross_validation::{CVResults, CVSplit, KFold};
pub use decision_tree::{DecisionTree, TreeNode};
pub use models::{root_mean_squared_error, Estimator, Model, ModelMetrics, Tunable};
pub use random_forest::{MaxFeatures, RandomForest};
