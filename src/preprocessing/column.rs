//! Column transformers: a stateful encoding applied to a designated subset of columns.
//!
//! A [`ColumnEncoder`] receives its [`StateStore`] at construction, loads the
//! previously fitted state from its slot when one exists and otherwise starts
//! from an unfitted state. Every `fit` ends by writing the state back.

use crate::error::{CartcastError, Result};
use crate::export::StateStore;
use polars::prelude::*;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

use super::encoder::LabelEncoder;
use super::scaler::Scaler;

/// Standardizes numeric columns with statistics captured at fit time
pub type QuantitativeEncoder = ColumnEncoder<Scaler>;
/// Maps category strings to stable integer codes
pub type QualitativeEncoder = ColumnEncoder<LabelEncoder>;

/// When a fit writes its state back to the store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum FitPersistence {
    /// Persist after every fit, including one that failed. The store then
    /// holds the state the encoder kept, never a half-fitted one.
    #[default]
    Always,
    /// Persist only after a successful fit; a failed fit leaves the store untouched.
    OnSuccess,
}

/// Fitted parameters of one encoder variant, persisted under a fixed slot.
pub trait EncoderState: Clone + Default + Serialize + DeserializeOwned + Send + Sync {
    /// Store slot of this variant
    const SLOT: &'static str;
    /// Display name of the owning transformer
    const KIND: &'static str;

    /// Learn parameters from `columns`. Must leave `self` untouched on error.
    fn fit_columns(&mut self, df: &DataFrame, columns: &[&str]) -> Result<()>;

    /// Apply the learned parameters to `columns`
    fn transform_columns(&self, df: &DataFrame, columns: &[&str]) -> Result<DataFrame>;

    fn is_fitted(&self) -> bool;

    /// Columns seen by the last successful fit
    fn fitted_columns(&self) -> &[String];
}

/// Object-safe view of a column transformer, so a union can own mixed variants.
pub trait ColumnTransformer: Send + Sync {
    /// Transformer kind, for diagnostics
    fn name(&self) -> &str;

    /// Fit on the input table. Contained fit failures still return `Ok`.
    fn fit(&mut self, df: &DataFrame) -> Result<()>;

    /// Encode the input table; one output column per selected input column
    fn transform(&self, df: &DataFrame) -> Result<DataFrame>;

    /// Names of the output columns, in output order
    fn output_columns(&self) -> Vec<String>;

    fn is_fitted(&self) -> bool;
}

/// A column transformer backed by a persisted [`EncoderState`].
pub struct ColumnEncoder<S: EncoderState> {
    columns: Option<Vec<String>>,
    state: S,
    template: S,
    store: Arc<dyn StateStore>,
    persistence: FitPersistence,
    last_failure: Option<String>,
}

impl<S: EncoderState> ColumnEncoder<S> {
    /// Create an encoder over `columns`, loading any state stored under `S::SLOT`.
    pub fn new(columns: Option<Vec<String>>, store: Arc<dyn StateStore>) -> Result<Self> {
        Self::with_template(columns, store, S::default())
    }

    /// Like [`ColumnEncoder::new`], with `template` as the unfitted starting
    /// state (e.g. a non-default scaler type). Refits always start from it.
    pub fn with_template(
        columns: Option<Vec<String>>,
        store: Arc<dyn StateStore>,
        template: S,
    ) -> Result<Self> {
        let state = match store.load(S::SLOT)? {
            Some(bytes) => {
                let state: S = serde_json::from_slice(&bytes)?;
                info!(
                    encoder = S::KIND,
                    slot = S::SLOT,
                    fitted = state.is_fitted(),
                    "Loaded persisted encoder state"
                );
                state
            }
            None => {
                debug!(encoder = S::KIND, slot = S::SLOT, "No persisted state, starting fresh");
                template.clone()
            }
        };

        Ok(Self {
            columns,
            state,
            template,
            store,
            persistence: FitPersistence::default(),
            last_failure: None,
        })
    }

    /// Select the persistence policy
    pub fn with_persistence(mut self, persistence: FitPersistence) -> Self {
        self.persistence = persistence;
        self
    }

    /// Configured columns, if any
    pub fn columns(&self) -> Option<&[String]> {
        self.columns.as_deref()
    }

    /// Current fitted (or loaded) state
    pub fn state(&self) -> &S {
        &self.state
    }

    /// Message of the failure recorded by the last `fit`, if it failed
    pub fn last_failure(&self) -> Option<&str> {
        self.last_failure.as_deref()
    }

    /// Fit on `df`, then persist the resulting state.
    ///
    /// A failure of the underlying encoder is logged and recorded, the
    /// previous state is kept, and the call still succeeds. Only store
    /// errors are returned.
    pub fn fit(&mut self, df: &DataFrame) -> Result<&mut Self> {
        let columns: Vec<String> = match &self.columns {
            Some(columns) => columns.clone(),
            None => {
                let err = CartcastError::ConfigError(format!(
                    "{} has no column list, fitting on every column of the table",
                    S::KIND
                ));
                warn!(encoder = S::KIND, "{}", err);
                df.get_column_names().iter().map(|s| s.to_string()).collect()
            }
        };
        let refs: Vec<&str> = columns.iter().map(String::as_str).collect();

        let mut candidate = self.template.clone();
        let succeeded = match candidate.fit_columns(df, &refs) {
            Ok(()) => {
                self.state = candidate;
                self.last_failure = None;
                info!(encoder = S::KIND, columns = refs.len(), rows = df.height(), "Encoder fitted");
                true
            }
            Err(e) => {
                let failure = CartcastError::FitFailure {
                    slot: S::SLOT.to_string(),
                    reason: e.to_string(),
                };
                error!(encoder = S::KIND, "{}", failure);
                self.last_failure = Some(failure.to_string());
                false
            }
        };

        if succeeded || self.persistence == FitPersistence::Always {
            self.persist()?;
        }
        Ok(self)
    }

    /// Encode `df` with the fitted state
    pub fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        if !self.state.is_fitted() {
            return Err(CartcastError::NotFitted {
                transformer: S::KIND.to_string(),
            });
        }
        let columns = self.active_columns();
        let refs: Vec<&str> = columns.iter().map(String::as_str).collect();
        self.state.transform_columns(df, &refs)
    }

    /// Fit, then transform the same table
    pub fn fit_transform(&mut self, df: &DataFrame) -> Result<DataFrame> {
        self.fit(df)?;
        self.transform(df)
    }

    /// Write the current state to the store
    pub fn persist(&self) -> Result<()> {
        let bytes = serde_json::to_vec(&self.state)?;
        self.store.store(S::SLOT, &bytes)?;
        debug!(encoder = S::KIND, location = %self.store.location(S::SLOT), "Encoder state persisted");
        Ok(())
    }

    fn active_columns(&self) -> Vec<String> {
        match &self.columns {
            Some(columns) => columns.clone(),
            None => self.state.fitted_columns().to_vec(),
        }
    }
}

impl<S: EncoderState> ColumnTransformer for ColumnEncoder<S> {
    fn name(&self) -> &str {
        S::KIND
    }

    fn fit(&mut self, df: &DataFrame) -> Result<()> {
        ColumnEncoder::fit(self, df).map(|_| ())
    }

    fn transform(&self, df: &DataFrame) -> Result<DataFrame> {
        ColumnEncoder::transform(self, df)
    }

    fn output_columns(&self) -> Vec<String> {
        self.active_columns()
    }

    fn is_fitted(&self) -> bool {
        self.state.is_fitted()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::export::{MemoryStateStore, LABEL_ENCODER_SLOT, STANDARD_ENCODER_SLOT};
    use crate::preprocessing::ScalerType;

    fn values(df: &DataFrame, name: &str) -> Vec<f64> {
        df.column(name)
            .unwrap()
            .as_materialized_series()
            .f64()
            .unwrap()
            .into_iter()
            .map(|v| v.unwrap())
            .collect()
    }

    fn cols(names: &[&str]) -> Option<Vec<String>> {
        Some(names.iter().map(|s| s.to_string()).collect())
    }

    #[test]
    fn test_quantitative_zero_mean_unit_std() {
        let store: Arc<dyn StateStore> = Arc::new(MemoryStateStore::new());
        let df = df!(
            "Age" => &[20.0, 40.0],
            "Orders" => &[1.0, 3.0],
        )
        .unwrap();

        let mut encoder = QuantitativeEncoder::new(cols(&["Age", "Orders"]), store).unwrap();
        let out = encoder.fit_transform(&df).unwrap();

        for name in ["Age", "Orders"] {
            let v = values(&out, name);
            let mean = v.iter().sum::<f64>() / v.len() as f64;
            let std = (v.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / v.len() as f64).sqrt();
            assert!(mean.abs() < 1e-12, "{} mean = {}", name, mean);
            assert!((std - 1.0).abs() < 1e-12, "{} std = {}", name, std);
        }
    }

    #[test]
    fn test_qualitative_codes_are_stable() {
        let store: Arc<dyn StateStore> = Arc::new(MemoryStateStore::new());
        let df = df!("TopCategory" => &["Beauty", "Clothing", "Beauty"]).unwrap();

        let mut encoder = QualitativeEncoder::new(cols(&["TopCategory"]), store).unwrap();
        encoder.fit(&df).unwrap();

        let first = values(&encoder.transform(&df).unwrap(), "TopCategory");
        let second = values(&encoder.transform(&df).unwrap(), "TopCategory");

        assert_eq!(first, second);
        assert_eq!(first[0], first[2]);
        assert_ne!(first[0], first[1]);
    }

    #[test]
    fn test_transform_only_selects_configured_columns() {
        let store: Arc<dyn StateStore> = Arc::new(MemoryStateStore::new());
        let df = df!(
            "Age" => &[20.0, 40.0, 60.0],
            "TotalCart" => &[1.0, 2.0, 3.0],
        )
        .unwrap();

        let mut encoder = QuantitativeEncoder::new(cols(&["Age"]), store).unwrap();
        let out = encoder.fit_transform(&df).unwrap();

        assert_eq!(out.width(), 1);
        assert_eq!(out.height(), 3);
        assert_eq!(ColumnTransformer::output_columns(&encoder), vec!["Age".to_string()]);
    }

    #[test]
    fn test_reload_reproduces_transform() {
        let store: Arc<dyn StateStore> = Arc::new(MemoryStateStore::new());
        let df = df!("Age" => &[18.0, 25.0, 61.0, 33.0]).unwrap();

        let mut encoder = QuantitativeEncoder::new(cols(&["Age"]), store.clone()).unwrap();
        let before = encoder.fit_transform(&df).unwrap();

        let reloaded = QuantitativeEncoder::new(cols(&["Age"]), store).unwrap();
        let after = reloaded.transform(&df).unwrap();

        assert!(before.equals(&after));
    }

    #[test]
    fn test_transform_before_fit_fails() {
        let store: Arc<dyn StateStore> = Arc::new(MemoryStateStore::new());
        let encoder = QualitativeEncoder::new(cols(&["TopCategory"]), store).unwrap();
        let df = df!("TopCategory" => &["Beauty"]).unwrap();

        assert!(matches!(
            encoder.transform(&df),
            Err(CartcastError::NotFitted { .. })
        ));
    }

    #[test]
    fn test_unseen_category_after_reload() {
        let store: Arc<dyn StateStore> = Arc::new(MemoryStateStore::new());
        let train = df!("TopCategory" => &["Beauty", "Clothing"]).unwrap();
        QualitativeEncoder::new(cols(&["TopCategory"]), store.clone())
            .unwrap()
            .fit(&train)
            .unwrap();

        let reloaded = QualitativeEncoder::new(cols(&["TopCategory"]), store).unwrap();
        let batch = df!("TopCategory" => &["Toys"]).unwrap();
        assert!(matches!(
            reloaded.transform(&batch),
            Err(CartcastError::UnseenCategory { .. })
        ));
    }

    #[test]
    fn test_failed_fit_keeps_and_persists_previous_state() {
        let store = Arc::new(MemoryStateStore::new());
        let shared: Arc<dyn StateStore> = store.clone();
        let good = df!("Age" => &[20.0, 40.0]).unwrap();
        let bad = df!("Age" => &["twenty", "forty"]).unwrap();

        let mut encoder = QuantitativeEncoder::new(cols(&["Age"]), shared).unwrap();
        encoder.fit(&good).unwrap();
        let persisted = store.load(STANDARD_ENCODER_SLOT).unwrap();

        encoder.fit(&bad).unwrap();
        assert!(encoder.last_failure().unwrap().contains("standardEncoder"));
        assert_eq!(store.load(STANDARD_ENCODER_SLOT).unwrap(), persisted);
        assert_eq!(values(&encoder.transform(&good).unwrap(), "Age"), vec![-1.0, 1.0]);
    }

    #[test]
    fn test_failed_first_fit_persists_unfitted_state_by_default() {
        let store = Arc::new(MemoryStateStore::new());
        let shared: Arc<dyn StateStore> = store.clone();
        let bad = df!("TopCategory" => &[1.0, 2.0]).unwrap();

        let mut encoder = QualitativeEncoder::new(cols(&["TopCategory"]), shared.clone()).unwrap();
        encoder.fit(&bad).unwrap();
        assert!(store.contains(LABEL_ENCODER_SLOT).unwrap());

        let reloaded = QualitativeEncoder::new(cols(&["TopCategory"]), shared).unwrap();
        assert!(!ColumnTransformer::is_fitted(&reloaded));
    }

    #[test]
    fn test_on_success_policy_skips_persist_after_failure() {
        let store = Arc::new(MemoryStateStore::new());
        let shared: Arc<dyn StateStore> = store.clone();
        let bad = df!("TopCategory" => &[1.0, 2.0]).unwrap();

        let mut encoder = QualitativeEncoder::new(cols(&["TopCategory"]), shared)
            .unwrap()
            .with_persistence(FitPersistence::OnSuccess);
        encoder.fit(&bad).unwrap();

        assert!(encoder.last_failure().is_some());
        assert!(store.is_empty());
    }

    #[test]
    fn test_missing_column_list_fits_every_column() {
        let store: Arc<dyn StateStore> = Arc::new(MemoryStateStore::new());
        let df = df!(
            "Age" => &[20.0, 40.0],
            "Orders" => &[1.0, 3.0],
        )
        .unwrap();

        let mut encoder = QuantitativeEncoder::new(None, store).unwrap();
        let out = encoder.fit_transform(&df).unwrap();

        assert_eq!(out.width(), 2);
        assert_eq!(encoder.state().fitted_columns(), &["Age".to_string(), "Orders".to_string()]);
    }

    #[test]
    fn test_template_scaler_type_is_used() {
        let store: Arc<dyn StateStore> = Arc::new(MemoryStateStore::new());
        let df = df!("Age" => &[10.0, 20.0, 30.0]).unwrap();

        let mut encoder = QuantitativeEncoder::with_template(
            cols(&["Age"]),
            store,
            Scaler::new(ScalerType::MinMax),
        )
        .unwrap();
        let out = encoder.fit_transform(&df).unwrap();

        assert_eq!(values(&out, "Age"), vec![0.0, 0.5, 1.0]);
    }
}
