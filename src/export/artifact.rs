//! Model artifact envelope: metadata, bincode payload and integrity checksum.

use super::store::StateStore;
use crate::error::{CartcastError, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::info;

/// Descriptive metadata stored next to a trained model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    /// Model name
    pub name: String,
    /// Model type
    pub model_type: String,
    /// Training timestamp (RFC 3339)
    pub trained_at: String,
    /// Feature names, in feature-matrix order
    pub feature_names: Vec<String>,
    /// Target name
    pub target_name: String,
    /// Winning hyperparameters
    pub hyperparameters: BTreeMap<String, String>,
    /// Training metrics
    pub metrics: BTreeMap<String, f64>,
}

impl ModelMetadata {
    /// Create metadata stamped with the current time
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            model_type: "unknown".to_string(),
            trained_at: chrono::Utc::now().to_rfc3339(),
            feature_names: Vec::new(),
            target_name: String::new(),
            hyperparameters: BTreeMap::new(),
            metrics: BTreeMap::new(),
        }
    }

    /// Set model type
    pub fn with_model_type(mut self, model_type: impl Into<String>) -> Self {
        self.model_type = model_type.into();
        self
    }

    /// Set feature names
    pub fn with_features(mut self, features: Vec<String>) -> Self {
        self.feature_names = features;
        self
    }

    /// Set target name
    pub fn with_target(mut self, target: impl Into<String>) -> Self {
        self.target_name = target.into();
        self
    }

    /// Add hyperparameter
    pub fn add_hyperparameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.hyperparameters.insert(key.into(), value.into());
        self
    }

    /// Add metric
    pub fn add_metric(mut self, key: impl Into<String>, value: f64) -> Self {
        self.metrics.insert(key.into(), value);
        self
    }
}

/// On-disk envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SerializedModel {
    magic: [u8; 4],
    format_version: u32,
    metadata: ModelMetadata,
    model_data: Vec<u8>,
    checksum: u64,
}

impl SerializedModel {
    const MAGIC: [u8; 4] = [b'C', b'R', b'T', b'M'];
    const VERSION: u32 = 1;

    fn new(metadata: ModelMetadata, model_data: Vec<u8>) -> Self {
        let checksum = Self::compute_checksum(&model_data);
        Self {
            magic: Self::MAGIC,
            format_version: Self::VERSION,
            metadata,
            model_data,
            checksum,
        }
    }

    /// FNV-1a
    fn compute_checksum(data: &[u8]) -> u64 {
        const FNV_OFFSET: u64 = 14695981039346656037;
        const FNV_PRIME: u64 = 1099511628211;

        let mut hash = FNV_OFFSET;
        for byte in data {
            hash ^= *byte as u64;
            hash = hash.wrapping_mul(FNV_PRIME);
        }
        hash
    }

    fn verify(&self) -> Result<()> {
        if self.magic != Self::MAGIC {
            return Err(CartcastError::SerializationError(
                "not a cartcast model artifact".to_string(),
            ));
        }
        if self.format_version != Self::VERSION {
            return Err(CartcastError::SerializationError(format!(
                "unsupported artifact format version {}",
                self.format_version
            )));
        }
        if Self::compute_checksum(&self.model_data) != self.checksum {
            return Err(CartcastError::SerializationError(
                "Checksum verification failed - artifact may be corrupted".to_string(),
            ));
        }
        Ok(())
    }
}

/// A trained model together with its metadata
#[derive(Debug, Clone)]
pub struct ModelArtifact<M> {
    pub metadata: ModelMetadata,
    pub model: M,
}

impl<M: Serialize + DeserializeOwned> ModelArtifact<M> {
    /// Wrap a model with its metadata
    pub fn new(model: M, metadata: ModelMetadata) -> Self {
        Self { metadata, model }
    }

    /// Encode to the envelope format
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let model_data = bincode::serialize(&self.model)?;
        let envelope = SerializedModel::new(self.metadata.clone(), model_data);
        Ok(bincode::serialize(&envelope)?)
    }

    /// Decode from the envelope format, verifying integrity
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let envelope: SerializedModel = bincode::deserialize(bytes)?;
        envelope.verify()?;
        let model: M = bincode::deserialize(&envelope.model_data)?;
        Ok(Self {
            metadata: envelope.metadata,
            model,
        })
    }

    /// Persist under `slot`, atomically replacing any previous artifact
    pub fn save(&self, store: &dyn StateStore, slot: &str) -> Result<()> {
        let bytes = self.to_bytes()?;
        store.store(slot, &bytes)?;
        info!(slot = %slot, location = %store.location(slot), bytes = bytes.len(), "Model artifact saved");
        Ok(())
    }

    /// Load the artifact under `slot`; `ArtifactNotFound` when nothing is stored there
    pub fn load(store: &dyn StateStore, slot: &str) -> Result<Self> {
        let bytes = store
            .load(slot)?
            .ok_or_else(|| CartcastError::ArtifactNotFound {
                slot: slot.to_string(),
                path: store.location(slot),
            })?;
        let artifact = Self::from_bytes(&bytes)?;
        info!(slot = %slot, model = %artifact.metadata.name, trained_at = %artifact.metadata.trained_at, "Model artifact loaded");
        Ok(artifact)
    }
}
