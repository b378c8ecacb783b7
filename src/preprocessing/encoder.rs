//! Fitted state of the qualitative encoder

use super::column::EncoderState;
use crate::error::{CartcastError, Result};
use crate::export::LABEL_ENCODER_SLOT;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Label encoder: each distinct category of a column gets an integer code.
///
/// Codes follow the lexicographic order of the categories seen at fit time,
/// so the same vocabulary always produces the same mapping.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LabelEncoder {
    columns: Vec<String>,
    // column -> (category -> code)
    mappings: Vec<BTreeMap<String, usize>>,
    is_fitted: bool,
}

impl LabelEncoder {
    /// Create a new, unfitted encoder
    pub fn new() -> Self {
        Self::default()
    }

    /// Category-to-code mapping learned for `column`
    pub fn mapping(&self, column: &str) -> Option<&BTreeMap<String, usize>> {
        self.columns
            .iter()
            .position(|c| c == column)
            .map(|i| &self.mappings[i])
    }

    /// Categories of `column` ordered by code
    pub fn classes(&self, column: &str) -> Option<Vec<&str>> {
        self.mapping(column)
            .map(|m| m.keys().map(|k| k.as_str()).collect())
    }

    /// Fit the encoder to `columns` of the data
    pub fn fit(&mut self, df: &DataFrame, columns: &[&str]) -> Result<&mut Self> {
        let mut fitted_columns = Vec::with_capacity(columns.len());
        let mut fitted_mappings = Vec::with_capacity(columns.len());

        for col_name in columns {
            let column = df
                .column(col_name)
                .map_err(|_| CartcastError::FeatureNotFound(col_name.to_string()))?;
            fitted_mappings.push(Self::build_mapping(
                col_name,
                column.as_materialized_series(),
            )?);
            fitted_columns.push(col_name.to_string());
        }

        self.columns = fitted_columns;
        self.mappings = fitted_mappings;
        self.is_fitted = true;
        Ok(self)
    }

    /// Encode `columns` of the data. An unseen category is an error, never a default code.
    pub fn transform(&self, df: &DataFrame, columns: &[&str]) -> Result<DataFrame> {
        if !self.is_fitted {
            return Err(CartcastError::NotFitted {
                transformer: "LabelEncoder".to_string(),
            });
        }

        let encoded = columns
            .iter()
            .map(|col_name| {
                let mapping = self.mapping(col_name).ok_or_else(|| {
                    CartcastError::DataError(format!(
                        "column '{}' was not part of the label encoder fit",
                        col_name
                    ))
                })?;
                let column = df
                    .column(col_name)
                    .map_err(|_| CartcastError::FeatureNotFound(col_name.to_string()))?;
                let ca = column.as_materialized_series().str()?;

                let codes = ca
                    .into_iter()
                    .map(|v| {
                        let value = v.ok_or_else(|| {
                            CartcastError::DataError(format!(
                                "column '{}' contains nulls",
                                col_name
                            ))
                        })?;
                        mapping
                            .get(value)
                            .map(|&code| code as f64)
                            .ok_or_else(|| CartcastError::UnseenCategory {
                                column: col_name.to_string(),
                                value: value.to_string(),
                            })
                    })
                    .collect::<Result<Vec<f64>>>()?;

                Ok(Column::new((*col_name).into(), codes))
            })
            .collect::<Result<Vec<Column>>>()?;

        Ok(DataFrame::new(encoded)?)
    }

    fn build_mapping(name: &str, series: &Series) -> Result<BTreeMap<String, usize>> {
        let ca = series.str().map_err(|_| {
            CartcastError::DataError(format!(
                "column '{}' has dtype {}, expected strings",
                name,
                series.dtype()
            ))
        })?;

        let categories: BTreeSet<&str> = ca.into_iter().flatten().collect();
        Ok(categories
            .into_iter()
            .enumerate()
            .map(|(code, category)| (category.to_string(), code))
            .collect())
    }
}

impl EncoderState for LabelEncoder {
    const SLOT: &'static str = LABEL_ENCODER_SLOT;
    const KIND: &'static str = "QualitativeEncoder";

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
