//! Fitted state of the quantitative encoder

use super::column::EncoderState;
use crate::error::{CartcastError, Result};
use crate::export::STANDARD_ENCODER_SLOT;
use crate::schema::float_column;
use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// Type of scaler to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ScalerType {
    /// Standard scaling (z-score normalization): (x - mean) / std
    #[default]
    Standard,
    /// Min-Max scaling: (x - min) / (max - min)
    MinMax,
}

/// Parameters for one fitted column
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScalerParams {
    pub center: f64, // mean or min
    pub scale: f64,  // std or range
}

/// Per-column numeric scaler. Statistics are captured at fit time and never
/// recomputed from the batch being transformed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scaler {
    scaler_type: ScalerType,
    columns: Vec<String>,
    params: Vec<ScalerParams>,
    is_fitted: bool,
}

impl Default for Scaler {
    fn default() -> Self {
        Self::new(ScalerType::Standard)
    }
}

impl Scaler {
    /// Create a new, unfitted scaler
    pub fn new(scaler_type: ScalerType) -> Self {
        Self {
            scaler_type,
            columns: Vec::new(),
            params: Vec::new(),
            is_fitted: false,
        }
    }

    /// Scaler type
    pub fn scaler_type(&self) -> ScalerType {
        self.scaler_type
    }

    /// Fitted parameters for `column`, if it was part of the fit
    pub fn params(&self, column: &str) -> Option<ScalerParams> {
        self.columns
            .iter()
            .position(|c| c == column)
            .map(|i| self.params[i])
    }

    /// Fit the scaler to `columns` of the data
    pub fn fit(&mut self, df: &DataFrame, columns: &[&str]) -> Result<&mut Self> {
        let mut fitted_columns = Vec::with_capacity(columns.len());
        let mut fitted_params = Vec::with_capacity(columns.len());

        for col_name in columns {
            let column = df
                .column(col_name)
                .map_err(|_| CartcastError::FeatureNotFound(col_name.to_string()))?;
            let ca = float_column(col_name, column.as_materialized_series())?;
            fitted_params.push(self.compute_params(col_name, &ca)?);
            fitted_columns.push(col_name.to_string());
        }

        self.columns = fitted_columns;
        self.params = fitted_params;
        self.is_fitted = true;
        Ok(self)
    }

    /// Scale `columns` of the data with the fitted parameters
    pub fn transform(&self, df: &DataFrame, columns: &[&str]) -> Result<DataFrame> {
        if !self.is_fitted {
            return Err(CartcastError::NotFitted {
                transformer: "Scaler".to_string(),
            });
        }

        let scaled = columns
            .iter()
            .map(|col_name| {
                let params = self.params(col_name).ok_or_else(|| {
                    CartcastError::DataError(format!(
                        "column '{}' was not part of the scaler fit",
                        col_name
                    ))
                })?;
                let column = df
                    .column(col_name)
                    .map_err(|_| CartcastError::FeatureNotFound(col_name.to_string()))?;
                let ca = float_column(col_name, column.as_materialized_series())?;
                let out = ((&ca - params.center) / params.scale).with_name((*col_name).into());
                Ok(Column::from(out.into_series()))
            })
            .collect::<Result<Vec<Column>>>()?;

        Ok(DataFrame::new(scaled)?)
    }

    fn compute_params(&self, name: &str, ca: &Float64Chunked) -> Result<ScalerParams> {
        let empty = || {
            CartcastError::DataError(format!("cannot fit scaler on empty column '{}'", name))
        };

        match self.scaler_type {
            ScalerType::Standard => {
                let mean = ca.mean().ok_or_else(empty)?;
                // Population standard deviation
                let std = ca.std(0).ok_or_else(empty)?;
                Ok(ScalerParams {
                    center: mean,
                    scale: if std == 0.0 { 1.0 } else { std },
                })
            }
            ScalerType::MinMax => {
                let min = ca.min().ok_or_else(empty)?;
                let max = ca.max().ok_or_else(empty)?;
                let range = max - min;
                Ok(ScalerParams {
                    center: min,
                    scale: if range == 0.0 { 1.0 } else { range },
                })
            }
        }
    }
}

impl EncoderState for Scaler {
    const SLOT: &'static str = STANDARD_ENCODER_SLOT;
    const KIND: &'static str = "QuantitativeEncoder";

    fn fit_columns(&mut self, df: &DataFrame, columns: &[&str]) -> Result<()> {
        self.fit(df, columns).map(|_| ())
    }

    fn transform_columns(&self, df: &DataFrame, columns: &[&str]) -> Result<DataFrame> {
        self.transform(df, columns)
    }

    fn is_fitted(&self) -> bool {
        self.is_fitted
    }

    fn fitted_columns(&self) -> &[String] {
        &self.columns
    }
}
