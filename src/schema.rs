//! Input schema: which columns feed the feature stage and which one is the target.

use crate::error::{CartcastError, Result};
use ndarray::Array1;
use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// Named columns of a customer record table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    /// Numeric feature columns, standardized by the quantitative encoder
    pub quantitative: Vec<String>,
    /// Categorical feature columns, label-encoded by the qualitative encoder
    pub qualitative: Vec<String>,
    /// Numeric target column
    pub target: String,
}

impl Default for Schema {
    fn default() -> Self {
        Self {
            quantitative: [
                "Age",
                "Seniority",
                "Orders",
                "Items",
                "AverageDiscount",
                "BrowsingTime",
                "EmailsOpened",
                "SupportInteractions",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            qualitative: vec!["TopCategory".to_string()],
            target: "TotalCart".to_string(),
        }
    }
}

impl Schema {
    /// Create a schema from explicit column lists
    pub fn new(
        quantitative: Vec<String>,
        qualitative: Vec<String>,
        target: impl Into<String>,
    ) -> Self {
        Self {
            quantitative,
            qualitative,
            target: target.into(),
        }
    }

    /// Feature columns in feature-stage order: quantitative first, then qualitative
    pub fn feature_columns(&self) -> Vec<String> {
        self.quantitative
            .iter()
            .chain(self.qualitative.iter())
            .cloned()
            .collect()
    }

    /// Check that every feature column is present. Extra columns are ignored.
    pub fn validate_features(&self, df: &DataFrame) -> Result<()> {
        for name in self.feature_columns() {
            if df.column(&name).is_err() {
                return Err(CartcastError::FeatureNotFound(name));
            }
        }
        Ok(())
    }

    /// Check that every feature column and the target are present.
    pub fn validate(&self, df: &DataFrame) -> Result<()> {
        self.validate_features(df)?;
        if df.column(&self.target).is_err() {
            return Err(CartcastError::FeatureNotFound(self.target.clone()));
        }
        Ok(())
    }

    /// Restrict a table to the feature columns, in schema order
    pub fn features(&self, df: &DataFrame) -> Result<DataFrame> {
        select_columns(df, &self.feature_columns())
    }

    /// Extract the target column as a dense vector
    pub fn target_values(&self, df: &DataFrame) -> Result<Array1<f64>> {
        let column = df
            .column(&self.target)
            .map_err(|_| CartcastError::FeatureNotFound(self.target.clone()))?;
        let values = numeric_values(&self.target, column.as_materialized_series())?;
        Ok(Array1::from_vec(values))
    }
}

/// Build a new frame holding only `columns`, in the given order.
pub fn select_columns(df: &DataFrame, columns: &[String]) -> Result<DataFrame> {
    let selected = columns
        .iter()
        .map(|name| {
            df.column(name)
                .cloned()
                .map_err(|_| CartcastError::FeatureNotFound(name.clone()))
        })
        .collect::<Result<Vec<Column>>>()?;
    Ok(DataFrame::new(selected)?)
}

/// Integer and float dtypes
pub fn is_numeric_dtype(dtype: &DataType) -> bool {
    matches!(
        dtype,
        DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float32
            | DataType::Float64
    )
}

/// Cast a numeric column to `Float64`, rejecting non-numeric dtypes and nulls.
pub fn float_column(name: &str, series: &Series) -> Result<Float64Chunked> {
    if !is_numeric_dtype(series.dtype()) {
        return Err(CartcastError::DataError(format!(
            "column '{}' has non-numeric dtype {}",
            name,
            series.dtype()
        )));
    }
    if series.null_count() > 0 {
        return Err(CartcastError::DataError(format!(
            "column '{}' contains nulls",
            name
        )));
    }

    let casted = series.cast(&DataType::Float64)?;
    Ok(casted.f64()?.clone())
}

/// Read a numeric column as `f64` values, rejecting non-numeric dtypes and nulls.
pub fn numeric_values(name: &str, series: &Series) -> Result<Vec<f64>> {
    Ok(float_column(name, series)?.into_no_null_iter().collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_schema_shape() {
        let schema = Schema::default();
        assert_eq!(schema.quantitative.len(), 8);
        assert_eq!(schema.qualitative, vec!["TopCategory".to_string()]);
        assert_eq!(schema.feature_columns().len(), 9);
        assert_eq!(schema.feature_columns()[8], "TopCategory");
    }

    #[test]
    fn test_validate_reports_missing_column() {
        let schema = Schema::new(vec!["Age".into()], vec!["TopCategory".into()], "TotalCart");
        let df = df!(
            "Age" => &[20.0, 40.0],
            "TotalCart" => &[10.0, 12.0],
        )
        .unwrap();

        match schema.validate(&df) {
            Err(CartcastError::FeatureNotFound(name)) => assert_eq!(name, "TopCategory"),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn test_target_values_casts_integers() {
        let schema = Schema::new(vec![], vec![], "TotalCart");
        let df = df!("TotalCart" => &[1i64, 2, 3]).unwrap();
        let y = schema.target_values(&df).unwrap();
        assert_eq!(y.to_vec(), vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_numeric_values_rejects_strings() {
        let s = Series::new("TopCategory".into(), &["Beauty", "Clothing"]);
        assert!(matches!(
            numeric_values("TopCategory", &s),
            Err(CartcastError::DataError(_))
        ));
    }

    #[test]
    fn test_select_columns_keeps_order() {
        let df = df!(
            "a" => &[1.0],
            "b" => &[2.0],
            "c" => &[3.0],
        )
        .unwrap();
        let out = select_columns(&df, &["c".to_string(), "a".to_string()]).unwrap();
        let names: Vec<String> = out.get_column_names().iter().map(|s| s.to_string()).collect();
        assert_eq!(names, vec!["c", "a"]);
    }
}
