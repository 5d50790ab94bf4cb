//! Scoring models and the engine that runs them

pub mod aggregator;
pub mod inference;
pub mod scorers;

pub use aggregator::EnsembleCombiner;
pub use inference::{InferenceEngine, PredictionKey};
pub use scorers::{FraudModel, ScoringError};
