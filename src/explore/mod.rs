//! Descriptive statistics over a raw record table
//!
//! Reporting only: nothing in the training path depends on these numbers.

use crate::error::{CartcastError, Result};
use crate::schema::is_numeric_dtype;
use polars::prelude::cov::pearson_corr;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Summary statistics of one numeric column, nulls excluded
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnSummary {
    pub column: String,
    pub count: usize,
    pub mean: f64,
    /// Sample standard deviation (n - 1)
    pub std: f64,
    pub min: f64,
    pub median: f64,
    pub max: f64,
}

/// Share of each category of a string column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryDistribution {
    pub column: String,
    pub n_distinct: usize,
    /// `(category, percent)`, most frequent first
    pub shares: Vec<(String, f64)>,
}

/// Jarque-Bera test of one numeric column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalityTest {
    pub column: String,
    pub skewness: f64,
    /// Excess kurtosis
    pub kurtosis: f64,
    pub statistic: f64,
    pub p_value: f64,
}

impl NormalityTest {
    /// Normality is not rejected at the 5% level
    pub fn is_normal(&self) -> bool {
        self.p_value > 0.05
    }
}

/// Pearson correlation of a column with the target
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Correlation {
    pub column: String,
    pub r: f64,
}

/// Read-only profiler of a DataFrame
pub struct Explorer<'a> {
    df: &'a DataFrame,
    target: Option<String>,
}

impl<'a> Explorer<'a> {
    pub fn new(df: &'a DataFrame) -> Self {
        Self { df, target: None }
    }

    /// Set the column correlations are measured against
    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    fn numeric_columns(&self) -> Vec<&Column> {
        self.df
            .get_columns()
            .iter()
            .filter(|c| is_numeric_dtype(c.dtype()))
            .collect()
    }

    /// count/mean/std/min/median/max of every numeric column
    pub fn global_description(&self) -> Result<Vec<ColumnSummary>> {
        self.numeric_columns()
            .into_iter()
            .map(|column| {
                let ca = non_null_values(column)?;
                Ok(ColumnSummary {
                    column: column.name().to_string(),
                    count: ca.len(),
                    mean: ca.mean().unwrap_or(f64::NAN),
                    std: ca.std(1).unwrap_or(f64::NAN),
                    min: ca.min().unwrap_or(f64::NAN),
                    median: ca.median().unwrap_or(f64::NAN),
                    max: ca.max().unwrap_or(f64::NAN),
                })
            })
            .collect()
    }

    /// Null count of every column, in frame order
    pub fn null_counts(&self) -> Vec<(String, usize)> {
        self.df
            .get_columns()
            .iter()
            .map(|c| (c.name().to_string(), c.null_count()))
            .collect()
    }

    /// Category shares of one string column
    pub fn category_distribution(&self, column: &str) -> Result<CategoryDistribution> {
        let col = self
            .df
            .column(column)
            .map_err(|_| CartcastError::FeatureNotFound(column.to_string()))?;
        let series = col.as_materialized_series();
        let values = series.str().map_err(|_| {
            CartcastError::DataError(format!("column '{}' is not a string column", column))
        })?;

        let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
        let mut total = 0usize;
        for value in values.into_iter().flatten() {
            *counts.entry(value).or_insert(0) += 1;
            total += 1;
        }

        let mut shares: Vec<(String, f64)> = counts
            .into_iter()
            .map(|(k, n)| (k.to_string(), 100.0 * n as f64 / total as f64))
            .collect();
        // BTreeMap order breaks ties alphabetically
        shares.sort_by(|a, b| b.1.total_cmp(&a.1));

        Ok(CategoryDistribution {
            column: column.to_string(),
            n_distinct: shares.len(),
            shares,
        })
    }

    /// Category shares of every string column
    pub fn category_distributions(&self) -> Result<Vec<CategoryDistribution>> {
        self.df
            .get_columns()
            .iter()
            .filter(|c| c.dtype() == &DataType::String)
            .map(|c| self.category_distribution(c.name().as_str()))
            .collect()
    }

    /// Jarque-Bera statistic of every numeric column. The p-value is the
    /// chi-squared (2 dof) survival function, `exp(-JB / 2)`.
    pub fn normality(&self) -> Result<Vec<NormalityTest>> {
        self.numeric_columns()
            .into_iter()
            .map(|column| {
                let series = non_null_values(column)?.into_series();
                let n = series.len() as f64;
                // population moments; a constant column has neither
                let skewness = series.skew(true)?.filter(|v| v.is_finite()).unwrap_or(0.0);
                let kurtosis = series
                    .kurtosis(true, true)?
                    .filter(|v| v.is_finite())
                    .unwrap_or(0.0);
                let statistic = n / 6.0 * (skewness.powi(2) + kurtosis.powi(2) / 4.0);

                Ok(NormalityTest {
                    column: column.name().to_string(),
                    skewness,
                    kurtosis,
                    statistic,
                    p_value: (-statistic / 2.0).exp(),
                })
            })
            .collect()
    }

    /// Pearson r of every other numeric column against the target, strongest
    /// first. Constant columns get NaN and sort last.
    pub fn correlation(&self) -> Result<Vec<Correlation>> {
        let target = self.target.as_deref().ok_or_else(|| {
            CartcastError::ConfigError("correlation needs a target column".to_string())
        })?;
        let target_col = self
            .df
            .column(target)
            .map_err(|_| CartcastError::FeatureNotFound(target.to_string()))?;
        if !is_numeric_dtype(target_col.dtype()) {
            return Err(CartcastError::DataError(format!(
                "target '{}' has non-numeric dtype {}",
                target,
                target_col.dtype()
            )));
        }
        let y = as_float(target_col.as_materialized_series())?;

        let mut correlations = Vec::new();
        for column in self.numeric_columns() {
            if column.name().as_str() == target {
                continue;
            }
            // rows where either side is null are skipped pairwise
            let x = as_float(column.as_materialized_series())?;
            correlations.push(Correlation {
                column: column.name().to_string(),
                r: pearson_corr(&x, &y).unwrap_or(f64::NAN),
            });
        }

        let strength = |c: &Correlation| if c.r.is_nan() { -1.0 } else { c.r.abs() };
        correlations.sort_by(|a, b| strength(b).total_cmp(&strength(a)));
        Ok(correlations)
    }
}

fn as_float(series: &Series) -> Result<Float64Chunked> {
    let cast = series.cast(&DataType::Float64)?;
    Ok(cast.f64()?.clone())
}

fn non_null_values(column: &Column) -> Result<Float64Chunked> {
    as_float(&column.as_materialized_series().drop_nulls())
}
