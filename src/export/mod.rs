//! Persistence of fitted encoders and trained models
//!
//! - [`store`] - slot-addressed blob stores (filesystem, in-memory)
//! - [`artifact`] - checksummed model artifact envelope

pub mod artifact;
pub mod store;

pub use artifact::{ModelArtifact, ModelMetadata};
pub use store::{
    FileStateStore, MemoryStateStore, StateStore, DEFAULT_MODEL_SLOT, LABEL_ENCODER_SLOT,
    STANDARD_ENCODER_SLOT,
};
