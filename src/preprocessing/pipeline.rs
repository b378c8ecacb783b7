//! Pipeline composition: the feature union, optionally followed by a model stage.

use super::frame_to_array;
use super::union::FeatureUnion;
use crate::config::PipelineConfig;
use crate::error::{CartcastError, Result};
use crate::export::StateStore;
use crate::training::Estimator;
use ndarray::{Array1, Array2};
use polars::prelude::*;
use std::sync::Arc;
use tracing::info;

/// Placeholder model type for a pipeline without a model stage. It has no values.
#[derive(Debug, Clone, Copy)]
pub enum NoModel {}

impl Estimator for NoModel {
    fn fit(&mut self, _x: &Array2<f64>, _y: &Array1<f64>) -> Result<()> {
        match *self {}
    }

    fn predict(&self, _x: &Array2<f64>) -> Result<Array1<f64>> {
        match *self {}
    }
}

/// A pipeline that only produces the feature table
pub type PreprocessingPipeline = Pipeline<NoModel>;

/// The two pipeline shapes. The feature union is always the first stage.
pub enum Pipeline<E> {
    PreprocessingOnly(FeatureUnion),
    PreprocessingWithModel { features: FeatureUnion, model: E },
}

impl<E: Estimator> Pipeline<E> {
    /// One-stage pipeline when `model` is `None`, two-stage otherwise
    pub fn build(features: FeatureUnion, model: Option<E>) -> Self {
        match model {
            Some(model) => Pipeline::PreprocessingWithModel { features, model },
            None => Pipeline::PreprocessingOnly(features),
        }
    }

    pub fn has_model(&self) -> bool {
        matches!(self, Pipeline::PreprocessingWithModel { .. })
    }

    /// Feature stage
    pub fn features(&self) -> &FeatureUnion {
        match self {
            Pipeline::PreprocessingOnly(features) => features,
            Pipeline::PreprocessingWithModel { features, .. } => features,
        }
    }

    /// Model stage, if present
    pub fn model(&self) -> Option<&E> {
        match self {
            Pipeline::PreprocessingOnly(_) => None,
            Pipeline::PreprocessingWithModel { model, .. } => Some(model),
        }
    }

    /// Consume the pipeline, returning the model stage
    pub fn into_model(self) -> Option<E> {
        match self {
            Pipeline::PreprocessingOnly(_) => None,
            Pipeline::PreprocessingWithModel { model, .. } => Some(model),
        }
    }

    /// Fit the feature stage, then the model stage on its output
    pub fn fit(&mut self, df: &DataFrame, y: &Array1<f64>) -> Result<&mut Self> {
        match self {
            Pipeline::PreprocessingOnly(features) => {
                features.fit(df)?;
            }
            Pipeline::PreprocessingWithModel { features, model } => {
                if y.len() != df.height() {
                    return Err(CartcastError::ShapeError {
                        expected: format!("{} targets", df.height()),
                        actual: format!("{} targets", y.len()),
                    });
                }
                let encoded = features.fit_transform(df)?;
                let x = frame_to_array(&encoded)?;
                model.fit(&x, y)?;
                info!(rows = x.nrows(), features = x.ncols(), "Pipeline fitted");
            }
        }
        Ok(self)
    }

    /// Run the feature stage only
    pub fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        self.features().transform(df)
    }

    /// Run the feature stage and return a dense matrix
    pub fn feature_matrix(&self, df: &DataFrame) -> Result<Array2<f64>> {
        frame_to_array(&self.transform(df)?)
    }

    /// Fit and transform the feature stage. Only valid without a model stage.
    pub fn fit_transform(&mut self, df: &DataFrame) -> Result<DataFrame> {
        match self {
            Pipeline::PreprocessingOnly(features) => features.fit_transform(df),
            Pipeline::PreprocessingWithModel { .. } => Err(CartcastError::ConfigError(
                "fit_transform needs a pipeline without a model stage; use fit and predict"
                    .to_string(),
            )),
        }
    }

    /// Thread `df` through the feature stage and the model
    pub fn predict(&self, df: &DataFrame) -> Result<Array1<f64>> {
        match self {
            Pipeline::PreprocessingOnly(_) => Err(CartcastError::ConfigError(
                "pipeline has no model stage to predict with".to_string(),
            )),
            Pipeline::PreprocessingWithModel { features, model } => {
                let x = frame_to_array(&features.transform(df)?)?;
                model.predict(&x)
            }
        }
    }
}

/// Builds pipelines from a configuration and an encoder state store.
pub struct PipelineComposer {
    config: PipelineConfig,
    store: Arc<dyn StateStore>,
}

impl PipelineComposer {
    pub fn new(config: PipelineConfig, store: Arc<dyn StateStore>) -> Self {
        Self { config, store }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Standard feature union, with encoder state loaded from the store
    pub fn feature_union(&self) -> Result<FeatureUnion> {
        FeatureUnion::from_schema(
            &self.config.schema,
            self.config.scaler,
            self.config.persistence,
            self.store.clone(),
        )
    }

    /// Feature union followed by `model`, or the feature union alone
    pub fn build<E: Estimator>(&self, model: Option<E>) -> Result<Pipeline<E>> {
        Ok(Pipeline::build(self.feature_union()?, model))
    }

    /// Preprocessing-only pipeline
    pub fn preprocessing(&self) -> Result<PreprocessingPipeline> {
        self.build(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::MemoryStateStore;
    use crate::schema::Schema;

    /// Predicts the training mean
    #[derive(Default)]
    struct MeanModel {
        mean: Option<f64>,
        seen_features: usize,
    }

    impl Estimator for MeanModel {
        fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
            self.mean = y.mean();
            self.seen_features = x.ncols();
            Ok(())
        }

        fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
            let mean = self.mean.ok_or_else(|| CartcastError::NotFitted {
                transformer: "MeanModel".to_string(),
            })?;
            Ok(Array1::from_elem(x.nrows(), mean))
        }
    }

    fn composer() -> PipelineComposer {
        let config = PipelineConfig::default().with_schema(Schema::new(
            vec!["Age".to_string()],
            vec!["TopCategory".to_string()],
            "TotalCart",
        ));
        PipelineComposer::new(config, Arc::new(MemoryStateStore::new()))
    }

    fn frame() -> DataFrame {
        df!(
            "Age" => &[20.0, 30.0, 40.0],
            "TopCategory" => &["Beauty", "Books", "Beauty"],
            "TotalCart" => &[10.0, 20.0, 30.0],
        )
        .unwrap()
    }

    #[test]
    fn test_single_fit_threads_both_stages() {
        let mut pipeline = composer().build(Some(MeanModel::default())).unwrap();
        let y = Array1::from_vec(vec![10.0, 20.0, 30.0]);
        pipeline.fit(&frame(), &y).unwrap();

        assert!(pipeline.features().is_fitted());
        assert_eq!(pipeline.model().unwrap().seen_features, 2);

        let predictions = pipeline.predict(&frame()).unwrap();
        assert_eq!(predictions.to_vec(), vec![20.0, 20.0, 20.0]);
    }

    #[test]
    fn test_preprocessing_only_shape() {
        let mut pipeline = composer().preprocessing().unwrap();
        assert!(!pipeline.has_model());

        let out = pipeline.fit_transform(&frame()).unwrap();
        assert_eq!(out.width(), 2);
        assert!(matches!(
            pipeline.predict(&frame()),
            Err(CartcastError::ConfigError(_))
        ));
    }

    #[test]
    fn test_target_length_must_match() {
        let mut pipeline = composer().build(Some(MeanModel::default())).unwrap();
        let y = Array1::from_vec(vec![1.0]);
        assert!(pipeline.fit(&frame(), &y).is_err());
    }
}
