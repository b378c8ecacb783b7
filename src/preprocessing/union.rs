//! Feature union: horizontal concatenation of column transformers

use super::column::{ColumnTransformer, FitPersistence, QualitativeEncoder, QuantitativeEncoder};
use super::scaler::{Scaler, ScalerType};
use crate::error::{CartcastError, Result};
use crate::export::StateStore;
use crate::schema::Schema;
use polars::prelude::*;
use rayon::prelude::*;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

/// Name of the quantitative child in the standard union
pub const QUANTITATIVE_STEP: &str = "QuantitativesEncoding";
/// Name of the qualitative child in the standard union
pub const QUALITATIVE_STEP: &str = "TopCategoryEncoding";

/// Owns N column transformers over disjoint column subsets and joins their
/// outputs, in configuration order, into a single feature table.
pub struct FeatureUnion {
    transformers: Vec<(String, Box<dyn ColumnTransformer>)>,
}

impl FeatureUnion {
    pub fn new() -> Self {
        Self {
            transformers: Vec::new(),
        }
    }

    /// Append a named child transformer
    pub fn with_transformer(
        mut self,
        name: impl Into<String>,
        transformer: Box<dyn ColumnTransformer>,
    ) -> Self {
        self.transformers.push((name.into(), transformer));
        self
    }

    /// Standard two-child union for `schema`: standardized quantitatives
    /// followed by label-encoded qualitatives.
    pub fn from_schema(
        schema: &Schema,
        scaler: ScalerType,
        persistence: FitPersistence,
        store: Arc<dyn StateStore>,
    ) -> Result<Self> {
        let quantitative = QuantitativeEncoder::with_template(
            Some(schema.quantitative.clone()),
            store.clone(),
            Scaler::new(scaler),
        )?
        .with_persistence(persistence);

        let qualitative = QualitativeEncoder::new(Some(schema.qualitative.clone()), store)?
            .with_persistence(persistence);

        Ok(Self::new()
            .with_transformer(QUANTITATIVE_STEP, Box::new(quantitative))
            .with_transformer(QUALITATIVE_STEP, Box::new(qualitative)))
    }

    /// Number of children
    pub fn len(&self) -> usize {
        self.transformers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transformers.is_empty()
    }

    /// Child names, in configuration order
    pub fn step_names(&self) -> Vec<&str> {
        self.transformers.iter().map(|(name, _)| name.as_str()).collect()
    }

    /// Whether every child holds a fitted (or loaded) state
    pub fn is_fitted(&self) -> bool {
        !self.transformers.is_empty() && self.transformers.iter().all(|(_, t)| t.is_fitted())
    }

    /// Output column names, in output order
    pub fn output_columns(&self) -> Vec<String> {
        self.transformers
            .iter()
            .flat_map(|(_, t)| t.output_columns())
            .collect()
    }

    /// Fit every child on the same input table
    pub fn fit(&mut self, df: &DataFrame) -> Result<&mut Self> {
        self.ensure_not_empty()?;
        let start = Instant::now();

        for (name, transformer) in self.transformers.iter_mut() {
            debug!(step = %name, "Fitting union child");
            transformer.fit(df)?;
        }

        info!(
            steps = self.transformers.len(),
            rows = df.height(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Feature union fitted"
        );
        Ok(self)
    }

    /// Transform with every child and concatenate the outputs column-wise
    pub fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        self.ensure_not_empty()?;
        let expected = df.height();

        let outputs = self
            .transformers
            .par_iter()
            .map(|(name, transformer)| {
                let out = transformer.transform(df)?;
                let columnless = out.width() == 0 && transformer.output_columns().is_empty();
                if !columnless && out.height() != expected {
                    return Err(CartcastError::ShapeMismatch {
                        transformer: name.clone(),
                        expected,
                        actual: out.height(),
                    });
                }
                Ok(out)
            })
            .collect::<Result<Vec<DataFrame>>>()?;

        let columns: Vec<Column> = outputs
            .into_iter()
            .flat_map(|out| out.get_columns().to_vec())
            .collect();

        Ok(DataFrame::new(columns)?)
    }

    /// Fit, then transform the same table. Entry point for callers that only
    /// need the numeric feature table.
    pub fn fit_transform(&mut self, df: &DataFrame) -> Result<DataFrame> {
        self.fit(df)?;
        self.transform(df)
    }

    fn ensure_not_empty(&self) -> Result<()> {
        if self.transformers.is_empty() {
            return Err(CartcastError::ConfigError(
                "feature union has no transformers".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for FeatureUnion {
    fn default() -> Self {
        Self::new()
    }
}
