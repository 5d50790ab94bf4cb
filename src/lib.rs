//! Fraud Scoring Engine Library
//!
//! Heuristic fraud risk scoring with three models, a majority-vote
//! ensemble, a TTL result cache, notifications and report export.

pub mod cache;
pub mod config;
pub mod consumer;
pub mod export;
pub mod feature_extractor;
pub mod metrics;
pub mod models;
pub mod notifications;
pub mod producer;
pub mod types;

pub use cache::TtlCache;
pub use config::AppConfig;
pub use consumer::TransactionConsumer;
pub use export::ReportData;
pub use feature_extractor::FeatureExtractor;
pub use models::inference::InferenceEngine;
pub use notifications::NotificationCenter;
pub use producer::AlertProducer;
pub use types::{
    alert::Notification,
    prediction::PredictionResult,
    transaction::{RawTransaction, TransactionFeatures},
};
