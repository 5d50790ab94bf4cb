//! Ensemble combination of the individual scoring models

use crate::models::scorers::{
    FraudModel, NeuralNetworkModel, RandomForestModel, ScoringError, XgBoostModel,
};
use crate::types::prediction::{normalize_risk_factors, round1, ModelKind, PredictionResult};
use crate::types::transaction::TransactionFeatures;
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::debug;

/// Combines member model predictions by majority vote and averaging.
pub struct EnsembleCombiner {
    members: Vec<Box<dyn FraudModel>>,
}

impl EnsembleCombiner {
    /// Ensemble of the three built-in scorers.
    pub fn new() -> Self {
        Self {
            members: vec![
                Box::new(RandomForestModel),
                Box::new(XgBoostModel),
                Box::new(NeuralNetworkModel),
            ],
        }
    }

    /// Ensemble over a custom member set.
    pub fn with_models(members: Vec<Box<dyn FraudModel>>) -> Result<Self, ScoringError> {
        if members.is_empty() {
            return Err(ScoringError::EmptyEnsemble);
        }
        Ok(Self { members })
    }

    /// Number of voting members
    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    /// Kinds of the voting members, in invocation order
    pub fn member_kinds(&self) -> Vec<ModelKind> {
        self.members.iter().map(|m| m.kind()).collect()
    }

    /// Run every member on the features.
    ///
    /// Fails closed: the first member error is returned instead of letting
    /// the remaining members vote without it.
    pub fn predict_members(
        &self,
        features: &TransactionFeatures,
    ) -> Result<Vec<PredictionResult>, ScoringError> {
        self.members.iter().map(|m| m.predict(features)).collect()
    }

    /// Score a transaction with every member and combine the results.
    pub fn predict(
        &self,
        features: &TransactionFeatures,
    ) -> Result<PredictionResult, ScoringError> {
        let start = Instant::now();
        let member_results = self.predict_members(features)?;
        let mut combined = Self::combine(&member_results)?;
        combined.processing_time = start.elapsed().as_secs_f64() * 1000.0;

        debug!(
            is_fraud = combined.is_fraud,
            risk_score = combined.risk_score,
            model_scores = ?combined.model_scores,
            "Ensemble prediction complete"
        );

        Ok(combined)
    }

    /// Combine member predictions.
    ///
    /// Fraud iff a strict majority of members flag it; confidence is the
    /// plain mean; risk score is the mean rounded to one decimal; risk
    /// factors are the first-occurrence union truncated to five.
    pub fn combine(members: &[PredictionResult]) -> Result<PredictionResult, ScoringError> {
        if members.is_empty() {
            return Err(ScoringError::EmptyEnsemble);
        }

        let count = members.len() as f64;
        let fraud_votes = members.iter().filter(|m| m.is_fraud).count();
        let is_fraud = fraud_votes * 2 > members.len();

        let confidence = members.iter().map(|m| m.confidence).sum::<f64>() / count;
        let risk_score = round1(members.iter().map(|m| m.risk_score).sum::<f64>() / count);

        let risk_factors =
            normalize_risk_factors(members.iter().flat_map(|m| m.risk_factors.iter().cloned()));

        let model_scores: BTreeMap<String, f64> = members
            .iter()
            .flat_map(|m| m.model_scores.iter().map(|(k, v)| (k.clone(), *v)))
            .collect();

        Ok(PredictionResult {
            is_fraud,
            risk_score,
            confidence,
            risk_factors,
            model_used: ModelKind::Ensemble.label().to_string(),
            processing_time: members.iter().map(|m| m.processing_time).sum(),
            model_scores,
        })
    }

    /// Fraction of members that flag the transaction as fraud.
    pub fn voting_score(members: &[PredictionResult]) -> f64 {
        if members.is_empty() {
            return 0.0;
        }
        let votes = members.iter().filter(|m| m.is_fraud).count();
        votes as f64 / members.len() as f64
    }

    /// Agreement between member risk scores: `1 - stddev / 100`, in [0, 1].
    pub fn model_agreement(model_scores: &BTreeMap<String, f64>) -> Option<f64> {
        if model_scores.len() < 2 {
            return None;
        }

        let scores: Vec<f64> = model_scores.values().map(|s| s / 100.0).collect();
        let mean = scores.iter().sum::<f64>() / scores.len() as f64;
        let variance =
            scores.iter().map(|s| (s - mean).powi(2)).sum::<f64>() / scores.len() as f64;

        Some(1.0 - variance.sqrt().min(1.0))
    }
}

impl Default for EnsembleCombiner {
    fn default() -> Self {
        Self::new()
    }
}

impl FraudModel for EnsembleCombiner {
    fn kind(&self) -> ModelKind {
        ModelKind::Ensemble
    }

    fn predict(&self, features: &TransactionFeatures) -> Result<PredictionResult, ScoringError> {
        EnsembleCombiner::predict(self, features)
    }
}
