//! Random forest regressor

use super::decision_tree::DecisionTree;
use super::models::{Estimator, Model, Tunable};
use crate::error::{CartcastError, Result};
use crate::optimizer::{GridPoint, ParameterValue};
use ndarray::{Array1, Array2, Axis};
use rand::{Rng, RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Random forest of regression trees
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RandomForest {
    trees: Vec<DecisionTree>,
    /// Number of trees
    pub n_estimators: usize,
    /// Maximum depth per tree
    pub max_depth: Option<usize>,
    /// Minimum samples to split
    pub min_samples_split: usize,
    /// Minimum samples in leaf
    pub min_samples_leaf: usize,
    /// Features considered at each split
    pub max_features: MaxFeatures,
    /// Bootstrap sampling
    pub bootstrap: bool,
    /// Base seed; tree `i` is grown from `random_state + i`
    pub random_state: u64,
    feature_importances: Option<Array1<f64>>,
    n_features: usize,
}

/// Strategy for max features
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum MaxFeatures {
    /// Square root of n_features
    Sqrt,
    /// Log2 of n_features
    Log2,
    /// Fraction of n_features
    Fraction(f64),
    /// Fixed number
    Fixed(usize),
    /// All features
    All,
}

impl MaxFeatures {
    /// Number of features drawn out of `n_features`
    pub fn resolve(&self, n_features: usize) -> usize {
        match *self {
            MaxFeatures::Sqrt => (n_features as f64).sqrt() as usize,
            MaxFeatures::Log2 => (n_features as f64).log2() as usize,
            MaxFeatures::Fraction(f) => (n_features as f64 * f) as usize,
            MaxFeatures::Fixed(n) => n.min(n_features),
            MaxFeatures::All => n_features,
        }
        .max(1)
    }

    /// Parse a grid value: `"auto"` (all features for a regressor), `"sqrt"`,
    /// `"log2"`, an integer count or a float fraction.
    pub fn from_value(value: &ParameterValue) -> Result<Self> {
        match value {
            ParameterValue::String(s) => match s.as_str() {
                "auto" | "all" => Ok(MaxFeatures::All),
                "sqrt" => Ok(MaxFeatures::Sqrt),
                "log2" => Ok(MaxFeatures::Log2),
                other => Err(CartcastError::ConfigError(format!(
                    "unknown max_features '{}'",
                    other
                ))),
            },
            ParameterValue::Int(n) if *n > 0 => Ok(MaxFeatures::Fixed(*n as usize)),
            ParameterValue::Float(f) if *f > 0.0 && *f <= 1.0 => Ok(MaxFeatures::Fraction(*f)),
            other => Err(CartcastError::ConfigError(format!(
                "invalid max_features {}",
                other
            ))),
        }
    }
}

impl Default for RandomForest {
    fn default() -> Self {
        Self::new(100)
    }
}

impl RandomForest {
    /// Create a new forest of `n_estimators` trees
    pub fn new(n_estimators: usize) -> Self {
        Self {
            trees: Vec::new(),
            n_estimators,
            max_depth: None,
            min_samples_split: 2,
            min_samples_leaf: 1,
            max_features: MaxFeatures::All,
            bootstrap: true,
            random_state: 42,
            feature_importances: None,
            n_features: 0,
        }
    }

    /// Set maximum depth
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    /// Set minimum samples to split
    pub fn with_min_samples_split(mut self, min_samples: usize) -> Self {
        self.min_samples_split = min_samples;
        self
    }

    /// Set minimum samples in leaf
    pub fn with_min_samples_leaf(mut self, min_samples: usize) -> Self {
        self.min_samples_leaf = min_samples;
        self
    }

    /// Set max features strategy
    pub fn with_max_features(mut self, max_features: MaxFeatures) -> Self {
        self.max_features = max_features;
        self
    }

    /// Enable or disable bootstrap sampling
    pub fn with_bootstrap(mut self, bootstrap: bool) -> Self {
        self.bootstrap = bootstrap;
        self
    }

    /// Set random state
    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = seed;
        self
    }

    /// Fit the forest to training data
    pub fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<&mut Self> {
        let n_samples = x.nrows();
        let n_features = x.ncols();

        if n_samples != y.len() {
            return Err(CartcastError::ShapeError {
                expected: format!("y length = {}", n_samples),
                actual: format!("y length = {}", y.len()),
            });
        }
        if n_samples == 0 {
            return Err(CartcastError::TrainingError(
                "cannot fit a forest on zero samples".to_string(),
            ));
        }
        if self.n_estimators == 0 {
            return Err(CartcastError::ConfigError(
                "n_estimators must be at least 1".to_string(),
            ));
        }

        let max_features = self.max_features.resolve(n_features);

        let trees = (0..self.n_estimators)
            .into_par_iter()
            .map(|tree_idx| -> Result<DecisionTree> {
                let seed = self.random_state.wrapping_add(tree_idx as u64);
                let mut rng = ChaCha8Rng::seed_from_u64(seed);

                let mut tree = DecisionTree::new()
                    .with_min_samples_split(self.min_samples_split)
                    .with_min_samples_leaf(self.min_samples_leaf)
                    .with_max_features(max_features)
                    .with_random_state(rng.next_u64());
                if let Some(d) = self.max_depth {
                    tree = tree.with_max_depth(d);
                }

                if self.bootstrap {
                    let sample_indices: Vec<usize> =
                        (0..n_samples).map(|_| rng.gen_range(0..n_samples)).collect();
                    let x_boot = x.select(Axis(0), &sample_indices);
                    let y_boot = y.select(Axis(0), &sample_indices);
                    tree.fit(&x_boot, &y_boot)?;
                } else {
                    tree.fit(x, y)?;
                }
                Ok(tree)
            })
            .collect::<Result<Vec<DecisionTree>>>()?;

        self.trees = trees;
        self.n_features = n_features;
        self.compute_feature_importances();

        Ok(self)
    }

    fn compute_feature_importances(&mut self) {
        let mut total = vec![0.0; self.n_features];

        for tree in &self.trees {
            if let Some(imp) = tree.feature_importances() {
                for (acc, &val) in total.iter_mut().zip(imp.iter()) {
                    *acc += val;
                }
            }
        }

        let sum: f64 = total.iter().sum();
        if sum > 0.0 {
            for imp in &mut total {
                *imp /= sum;
            }
        }

        self.feature_importances = Some(Array1::from_vec(total));
    }

    /// Mean prediction over the trees
    pub fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        if self.trees.is_empty() {
            return Err(CartcastError::NotFitted {
                transformer: "RandomForest".to_string(),
            });
        }

        let all_predictions = self
            .trees
            .par_iter()
            .map(|tree| tree.predict(x))
            .collect::<Result<Vec<Array1<f64>>>>()?;

        let mut sum = Array1::<f64>::zeros(x.nrows());
        for preds in &all_predictions {
            sum += preds;
        }
        Ok(sum / all_predictions.len() as f64)
    }

    /// Mean-decrease-in-impurity importances, summing to one
    pub fn feature_importances(&self) -> Option<&Array1<f64>> {
        self.feature_importances.as_ref()
    }

    /// Get number of trees
    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Hyperparameters rendered as strings
    pub fn hyperparameters(&self) -> BTreeMap<String, String> {
        let mut params = BTreeMap::new();
        params.insert("n_estimators".to_string(), self.n_estimators.to_string());
        params.insert(
            "max_depth".to_string(),
            self.max_depth.map_or("none".to_string(), |d| d.to_string()),
        );
        params.insert("min_samples_split".to_string(), self.min_samples_split.to_string());
        params.insert("min_samples_leaf".to_string(), self.min_samples_leaf.to_string());
        params.insert("max_features".to_string(), format!("{:?}", self.max_features));
        params.insert("random_state".to_string(), self.random_state.to_string());
        params
    }
}

impl Estimator for RandomForest {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        RandomForest::fit(self, x, y).map(|_| ())
    }

    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        RandomForest::predict(self, x)
    }
}

impl Model for RandomForest {
    fn model_type(&self) -> &'static str {
        "RandomForestRegressor"
    }

    fn is_fitted(&self) -> bool {
        !self.trees.is_empty()
    }

    fn feature_importances(&self) -> Option<Array1<f64>> {
        self.feature_importances.clone()
    }
}

impl Tunable for RandomForest {
    fn from_params(params: &GridPoint, random_state: u64) -> Result<Self> {
        let mut forest = RandomForest::default().with_random_state(random_state);

        for (name, value) in params.iter() {
            match name.as_str() {
                "n_estimators" | "max_depth" | "min_samples_split" | "min_samples_leaf" => {}
                "max_features" => forest.max_features = MaxFeatures::from_value(value)?,
                "bootstrap" => match value {
                    ParameterValue::Bool(b) => forest.bootstrap = *b,
                    other => {
                        return Err(CartcastError::ConfigError(format!(
                            "bootstrap must be a boolean, got {}",
                            other
                        )))
                    }
                },
                other => {
                    return Err(CartcastError::ConfigError(format!(
                        "unknown random forest parameter '{}'",
                        other
                    )))
                }
            }
        }

        if let Some(n) = params.get_usize("n_estimators")? {
            forest.n_estimators = n;
        }
        if let Some(d) = params.get_usize("max_depth")? {
            forest.max_depth = Some(d);
        }
        if let Some(s) = params.get_usize("min_samples_split")? {
            forest.min_samples_split = s;
        }
        if let Some(l) = params.get_usize("min_samples_leaf")? {
            forest.min_samples_leaf = l;
        }

        Ok(forest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn linear_data() -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_fn((40, 2), |(i, j)| if j == 0 { i as f64 } else { (i % 3) as f64 });
        let y = Array1::from_shape_fn(40, |i| 2.0 * i as f64);
        (x, y)
    }

    #[test]
    fn test_regressor() {
        let (x, y) = linear_data();
        let mut rf = RandomForest::new(10).with_random_state(42);
        rf.fit(&x, &y).unwrap();

        let predictions = rf.predict(&x).unwrap();
        let mse: f64 = predictions
            .iter()
            .zip(y.iter())
            .map(|(p, a)| (p - a).powi(2))
            .sum::<f64>()
            / y.len() as f64;

        assert!(mse < 25.0, "MSE too high: {}", mse);
    }

    #[test]
    fn test_same_seed_same_predictions() {
        let (x, y) = linear_data();
        let mut a = RandomForest::new(8).with_max_features(MaxFeatures::Sqrt).with_random_state(7);
        let mut b = RandomForest::new(8).with_max_features(MaxFeatures::Sqrt).with_random_state(7);
        a.fit(&x, &y).unwrap();
        b.fit(&x, &y).unwrap();
        assert_eq!(a.predict(&x).unwrap(), b.predict(&x).unwrap());
    }

    #[test]
    fn test_feature_importances() {
        let x = array![[1.0, 0.0], [2.0, 0.0], [3.0, 0.0], [4.0, 0.0]];
        let y = array![1.0, 2.0, 3.0, 4.0];

        let mut rf = RandomForest::new(10).with_random_state(42);
        rf.fit(&x, &y).unwrap();

        let importances = rf.feature_importances().unwrap();
        assert_eq!(importances.len(), 2);
        assert!(importances[0] >= importances[1]);
    }

    #[test]
    fn test_from_params() {
        let point = GridPoint::new()
            .with("n_estimators", 17i64)
            .with("max_depth", 2i64)
            .with("min_samples_split", 5i64)
            .with("min_samples_leaf", 200i64)
            .with("max_features", "auto");

        let forest = RandomForest::from_params(&point, 42).unwrap();
        assert_eq!(forest.n_estimators, 17);
        assert_eq!(forest.max_depth, Some(2));
        assert_eq!(forest.min_samples_split, 5);
        assert_eq!(forest.min_samples_leaf, 200);
        assert_eq!(forest.max_features, MaxFeatures::All);
        assert_eq!(forest.random_state, 42);
    }

    #[test]
    fn test_from_params_rejects_unknown() {
        let point = GridPoint::new().with("learning_rate", 0.1);
        assert!(RandomForest::from_params(&point, 0).is_err());
    }

    #[test]
    fn test_max_features_resolution() {
        assert_eq!(MaxFeatures::All.resolve(9), 9);
        assert_eq!(MaxFeatures::Sqrt.resolve(9), 3);
        assert_eq!(MaxFeatures::Sqrt.resolve(1), 1);
        assert_eq!(MaxFeatures::Fixed(20).resolve(9), 9);
    }

    #[test]
    fn test_predict_before_fit() {
        let rf = RandomForest::new(3);
        assert!(matches!(
            rf.predict(&array![[1.0]]),
            Err(CartcastError::NotFitted { .. })
        ));
    }
}
