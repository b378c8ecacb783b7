//! Feature stage: column transformers, their union and the pipeline composer
//!
//! - [`scaler`] / [`encoder`] - fitted state of the quantitative and qualitative encoders
//! - [`column`] - column transformers backed by a state store
//! - [`union`] - feature union over disjoint column subsets
//! - [`pipeline`] - feature union with an optional model stage

pub mod column;
pub mod encoder;
pub mod pipeline;
pub mod scaler;
pub mod union;

pub use column::{
    ColumnEncoder, ColumnTransformer, EncoderState, FitPersistence, QualitativeEncoder,
    QuantitativeEncoder,
};
pub use encoder::LabelEncoder;
pub use pipeline::{NoModel, Pipeline, PipelineComposer, PreprocessingPipeline};
pub use scaler::{Scaler, ScalerParams, ScalerType};
pub use union::{FeatureUnion, QUALITATIVE_STEP, QUANTITATIVE_STEP};

use crate::error::Result;
use crate::schema::numeric_values;
use ndarray::Array2;
use polars::prelude::*;

/// Convert a numeric feature table to a row-major matrix, columns in table order.
pub fn frame_to_array(df: &DataFrame) -> Result<Array2<f64>> {
    let columns = df
        .get_columns()
        .iter()
        .map(|c| numeric_values(c.name().as_str(), c.as_materialized_series()))
        .collect::<Result<Vec<Vec<f64>>>>()?;

    Ok(Array2::from_shape_fn((df.height(), columns.len()), |(i, j)| {
        columns[j][i]
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_to_array_keeps_column_order() {
        let df = df!(
            "b" => &[1.0, 2.0],
            "a" => &[10i32, 20],
        )
        .unwrap();

        let x = frame_to_array(&df).unwrap();
        assert_eq!(x.shape(), &[2, 2]);
        assert_eq!(x[[0, 0]], 1.0);
        assert_eq!(x[[1, 1]], 20.0);
    }

    #[test]
    fn test_frame_to_array_rejects_strings() {
        let df = df!("c" => &["x"]).unwrap();
        assert!(frame_to_array(&df).is_err());
    }
}
