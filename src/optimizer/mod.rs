//! Model selection
//!
//! - [`grid`] - hyperparameter grid and grid points
//! - [`grid_search`] - cross-validated exhaustive search over a grid

mod config;
pub mod grid;
pub mod grid_search;

pub use config::SearchConfig;
pub use grid::{default_random_forest_grid, linspace_int, GridPoint, ParamGrid, ParameterValue};
pub use grid_search::{CandidateResult, GridSearchCV};
