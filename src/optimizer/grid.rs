//! Hyperparameter grid and grid points

use crate::error::{CartcastError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// A single hyperparameter value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParameterValue {
    Int(i64),
    Float(f64),
    Bool(bool),
    String(String),
}

impl ParameterValue {
    /// Get as float
    pub fn as_float(&self) -> Option<f64> {
        match self {
            ParameterValue::Float(v) => Some(*v),
            ParameterValue::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    /// Get as int
    pub fn as_int(&self) -> Option<i64> {
        match self {
            ParameterValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Get as string
    pub fn as_string(&self) -> Option<&str> {
        match self {
            ParameterValue::String(v) => Some(v),
            _ => None,
        }
    }
}

impl fmt::Display for ParameterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParameterValue::Int(v) => write!(f, "{}", v),
            ParameterValue::Float(v) => write!(f, "{}", v),
            ParameterValue::Bool(v) => write!(f, "{}", v),
            ParameterValue::String(v) => write!(f, "{}", v),
        }
    }
}

impl From<i64> for ParameterValue {
    fn from(v: i64) -> Self {
        ParameterValue::Int(v)
    }
}

impl From<f64> for ParameterValue {
    fn from(v: f64) -> Self {
        ParameterValue::Float(v)
    }
}

impl From<&str> for ParameterValue {
    fn from(v: &str) -> Self {
        ParameterValue::String(v.to_string())
    }
}

/// One concrete combination of hyperparameter values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GridPoint(BTreeMap<String, ParameterValue>);

impl GridPoint {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a value, returning the point
    pub fn with(mut self, name: impl Into<String>, value: impl Into<ParameterValue>) -> Self {
        self.0.insert(name.into(), value.into());
        self
    }

    pub fn get(&self, name: &str) -> Option<&ParameterValue> {
        self.0.get(name)
    }

    /// Non-negative integer parameter; `None` when absent
    pub fn get_usize(&self, name: &str) -> Result<Option<usize>> {
        match self.0.get(name) {
            None => Ok(None),
            Some(value) => value
                .as_int()
                .and_then(|v| usize::try_from(v).ok())
                .map(Some)
                .ok_or_else(|| {
                    CartcastError::ConfigError(format!(
                        "parameter '{}' must be a non-negative integer, got {}",
                        name, value
                    ))
                }),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ParameterValue)> {
        self.0.iter()
    }
}

impl fmt::Display for GridPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.0.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
        write!(f, "{{{}}}", parts.join(", "))
    }
}

/// Hyperparameter grid: candidate values per parameter name.
///
/// Points are enumerated with parameter names in sorted order, the last name
/// varying fastest. Candidate indices refer to this order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParamGrid(BTreeMap<String, Vec<ParameterValue>>);

impl ParamGrid {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add (or replace) the candidate values of one parameter
    pub fn with_param<V: Into<ParameterValue>>(
        mut self,
        name: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        self.0
            .insert(name.into(), values.into_iter().map(Into::into).collect());
        self
    }

    /// Parameter names, sorted
    pub fn names(&self) -> Vec<&str> {
        self.0.keys().map(|k| k.as_str()).collect()
    }

    /// Candidate values of `name`
    pub fn values(&self, name: &str) -> Option<&[ParameterValue]> {
        self.0.get(name).map(|v| v.as_slice())
    }

    /// Number of grid points
    pub fn len(&self) -> usize {
        if self.0.is_empty() {
            return 0;
        }
        self.0.values().map(|v| v.len()).product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Reject grids without any parameter, or with a parameter without values
    pub fn validate(&self) -> Result<()> {
        if self.0.is_empty() {
            return Err(CartcastError::ConfigError(
                "hyperparameter grid is empty".to_string(),
            ));
        }
        if let Some((name, _)) = self.0.iter().find(|(_, values)| values.is_empty()) {
            return Err(CartcastError::ConfigError(format!(
                "hyperparameter '{}' has no candidate values",
                name
            )));
        }
        Ok(())
    }

    /// Every grid point, in enumeration order
    pub fn points(&self) -> Vec<GridPoint> {
        let total = self.len();
        let entries: Vec<(&String, &Vec<ParameterValue>)> = self.0.iter().collect();

        (0..total)
            .map(|mut index| {
                let mut point = BTreeMap::new();
                for (name, values) in entries.iter().rev() {
                    point.insert((*name).clone(), values[index % values.len()].clone());
                    index /= values.len();
                }
                GridPoint(point)
            })
            .collect()
    }
}

/// `num` integers evenly spaced over `[start, stop]`, truncated toward zero
pub fn linspace_int(start: f64, stop: f64, num: usize) -> Vec<i64> {
    match num {
        0 => Vec::new(),
        1 => vec![start as i64],
        _ => {
            let step = (stop - start) / (num - 1) as f64;
            (0..num)
                .map(|i| {
                    if i == num - 1 {
                        stop as i64
                    } else {
                        (start + step * i as f64) as i64
                    }
                })
                .collect()
        }
    }
}

/// Random forest grid searched by default
pub fn default_random_forest_grid() -> ParamGrid {
    ParamGrid::new()
        .with_param("n_estimators", linspace_int(10.0, 80.0, 10))
        .with_param("max_depth", [2i64, 1000])
        .with_param("min_samples_split", [5i64, 10])
        .with_param("min_samples_leaf", [1i64, 200])
        .with_param("max_features", ["auto", "sqrt"])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linspace_matches_default_estimator_counts() {
        assert_eq!(
            linspace_int(10.0, 80.0, 10),
            vec![10, 17, 25, 33, 41, 48, 56, 64, 72, 80]
        );
    }

    #[test]
    fn test_default_grid_size() {
        let grid = default_random_forest_grid();
        assert_eq!(grid.len(), 10 * 2 * 2 * 2 * 2);
        assert_eq!(grid.points().len(), grid.len());
        assert!(grid.validate().is_ok());
    }

    #[test]
    fn test_points_enumerate_last_name_fastest() {
        let grid = ParamGrid::new()
            .with_param("b", [1i64, 2])
            .with_param("a", ["x", "y"]);

        let points = grid.points();
        assert_eq!(points.len(), 4);
        assert_eq!(points[0], GridPoint::new().with("a", "x").with("b", 1i64));
        assert_eq!(points[1], GridPoint::new().with("a", "x").with("b", 2i64));
        assert_eq!(points[2], GridPoint::new().with("a", "y").with("b", 1i64));
    }

    #[test]
    fn test_empty_values_rejected() {
        let grid = ParamGrid::new().with_param("a", Vec::<i64>::new());
        assert_eq!(grid.len(), 0);
        assert!(grid.validate().is_err());
        assert!(ParamGrid::new().validate().is_err());
    }

    #[test]
    fn test_grid_from_json() {
        let grid: ParamGrid =
            serde_json::from_str(r#"{"max_depth": [2, 1000], "max_features": ["sqrt"]}"#).unwrap();
        assert_eq!(grid.len(), 2);
        assert_eq!(grid.values("max_depth").unwrap()[1], ParameterValue::Int(1000));
    }

    #[test]
    fn test_get_usize() {
        let point = GridPoint::new().with("n", 5i64).with("s", "sqrt").with("neg", -1i64);
        assert_eq!(point.get_usize("n").unwrap(), Some(5));
        assert_eq!(point.get_usize("missing").unwrap(), None);
        assert!(point.get_usize("s").is_err());
        assert!(point.get_usize("neg").is_err());
    }
}
