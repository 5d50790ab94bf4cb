//! Cached inference engine for fraud scoring

use crate::cache::{CacheStats, Clock, SystemClock, TtlCache};
use crate::config::{AppConfig, InferenceStrategy};
use crate::models::aggregator::EnsembleCombiner;
use crate::models::scorers::{builtin_model, FraudModel, RandomForestModel, ScoringError};
use crate::types::prediction::{ModelKind, PredictionResult};
use crate::types::transaction::TransactionFeatures;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Cache key: a prediction is only reused for the same transaction scored
/// by the same model.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PredictionKey {
    pub transaction_id: String,
    pub model: ModelKind,
}

impl PredictionKey {
    pub fn new(transaction_id: impl Into<String>, model: ModelKind) -> Self {
        Self {
            transaction_id: transaction_id.into(),
            model,
        }
    }
}

/// Scoring front door: picks the configured strategy and memoizes results.
pub struct InferenceEngine {
    /// Model used by the primary strategy
    primary: Box<dyn FraudModel>,
    /// Majority-vote ensemble of all models
    ensemble: EnsembleCombiner,
    /// Inference strategy: primary model or ensemble
    strategy: InferenceStrategy,
    /// Memoized predictions, `None` when caching is disabled
    cache: Option<TtlCache<PredictionKey, PredictionResult>>,
    cache_ttl: Duration,
}

impl InferenceEngine {
    /// Create a new inference engine from configuration
    pub fn new(config: &AppConfig) -> Result<Self, ScoringError> {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Create an engine whose cache runs on an injected clock
    pub fn with_clock(config: &AppConfig, clock: Arc<dyn Clock>) -> Result<Self, ScoringError> {
        let primary = builtin_model(config.models.primary_model).ok_or_else(|| {
            ScoringError::ModelFailed {
                model: config.models.primary_model.label().to_string(),
                reason: "not usable as a primary model".to_string(),
            }
        })?;

        let cache = config.cache.enabled.then(|| {
            TtlCache::with_clock(clock).eager_expiry(config.cache.eager_expiry)
        });

        info!(
            strategy = ?config.models.strategy,
            primary_model = %config.models.primary_model,
            cache_enabled = config.cache.enabled,
            cache_ttl_secs = config.cache.ttl_seconds,
            "Inference engine initialized"
        );

        Ok(Self {
            primary,
            ensemble: EnsembleCombiner::new(),
            strategy: config.models.strategy.clone(),
            cache,
            cache_ttl: config.cache.ttl(),
        })
    }

    /// Get the current inference strategy
    pub fn strategy(&self) -> &InferenceStrategy {
        &self.strategy
    }

    /// Model whose output `predict` returns
    pub fn active_model(&self) -> ModelKind {
        match self.strategy {
            InferenceStrategy::Primary => self.primary.kind(),
            InferenceStrategy::Ensemble => ModelKind::Ensemble,
        }
    }

    /// Get the number of models consulted per prediction
    pub fn model_count(&self) -> usize {
        match self.strategy {
            InferenceStrategy::Primary => 1,
            InferenceStrategy::Ensemble => self.ensemble.member_count(),
        }
    }

    /// Names of the models consulted per prediction
    pub fn model_names(&self) -> Vec<String> {
        match self.strategy {
            InferenceStrategy::Primary => vec![self.primary.kind().name().to_string()],
            InferenceStrategy::Ensemble => self
                .ensemble
                .member_kinds()
                .iter()
                .map(|k| k.name().to_string())
                .collect(),
        }
    }

    /// Score a transaction, reusing a live cached result for the same id.
    pub fn predict(
        &self,
        transaction_id: &str,
        features: &TransactionFeatures,
    ) -> Result<PredictionResult, ScoringError> {
        let Some(cache) = &self.cache else {
            return self.predict_uncached(features);
        };

        let key = PredictionKey::new(transaction_id, self.active_model());
        if let Some(cached) = cache.get(&key) {
            debug!(transaction_id = %transaction_id, "Cache hit for prediction");
            return Ok(cached);
        }

        let result = self.predict_uncached(features)?;
        if let Err(e) = cache.set(key, result.clone(), self.cache_ttl) {
            warn!(transaction_id = %transaction_id, error = %e, "Failed to cache prediction");
        }
        Ok(result)
    }

    /// Score a transaction with the configured strategy, bypassing the cache
    pub fn predict_uncached(
        &self,
        features: &TransactionFeatures,
    ) -> Result<PredictionResult, ScoringError> {
        match self.strategy {
            InferenceStrategy::Primary => self.primary.predict(features),
            InferenceStrategy::Ensemble => self.ensemble.predict(features),
        }
    }

    /// Score a specific model regardless of the configured strategy
    pub fn predict_with(
        &self,
        model: ModelKind,
        features: &TransactionFeatures,
    ) -> Result<PredictionResult, ScoringError> {
        match builtin_model(model) {
            Some(single) => single.predict(features),
            None => self.ensemble.predict(features),
        }
    }

    /// Run inference on a batch of (transaction id, features) pairs
    pub fn predict_batch(
        &self,
        batch: &[(String, TransactionFeatures)],
    ) -> Vec<Result<PredictionResult, ScoringError>> {
        batch
            .iter()
            .map(|(id, features)| self.predict(id, features))
            .collect()
    }

    /// Drop every memoized prediction
    pub fn clear_cache(&self) {
        if let Some(cache) = &self.cache {
            cache.clear();
        }
    }

    /// Cache statistics, all zero when caching is disabled
    pub fn cache_stats(&self) -> CacheStats {
        self.cache
            .as_ref()
            .map(|cache| cache.stats())
            .unwrap_or_default()
    }
}

impl Default for InferenceEngine {
    fn default() -> Self {
        Self {
            primary: Box::new(RandomForestModel),
            ensemble: EnsembleCombiner::new(),
            strategy: InferenceStrategy::Ensemble,
            cache: Some(TtlCache::new()),
            cache_ttl: AppConfig::default().cache.ttl(),
        }
    }
}
