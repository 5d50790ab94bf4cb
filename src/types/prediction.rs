//! Prediction results produced by the scoring models

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Maximum number of risk factors carried by a prediction
pub const MAX_RISK_FACTORS: usize = 5;

/// Identifies which scorer produced a prediction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ModelKind {
    #[serde(rename = "random_forest")]
    RandomForest,
    #[serde(rename = "xgboost")]
    XgBoost,
    #[serde(rename = "neural_network")]
    NeuralNetwork,
    #[serde(rename = "ensemble")]
    Ensemble,
}

impl ModelKind {
    /// Human-readable label reported as `modelUsed`
    pub fn label(&self) -> &'static str {
        match self {
            ModelKind::RandomForest => "Random Forest",
            ModelKind::XgBoost => "XGBoost",
            ModelKind::NeuralNetwork => "Neural Network",
            ModelKind::Ensemble => "Ensemble (RF + XGBoost + NN)",
        }
    }

    /// Configuration name
    pub fn name(&self) -> &'static str {
        match self {
            ModelKind::RandomForest => "random_forest",
            ModelKind::XgBoost => "xgboost",
            ModelKind::NeuralNetwork => "neural_network",
            ModelKind::Ensemble => "ensemble",
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Outcome of one scoring model or of the ensemble
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PredictionResult {
    pub is_fraud: bool,
    /// Risk score in [0, 100]
    pub risk_score: f64,
    pub confidence: f64,
    /// Ordered, deduplicated, at most [`MAX_RISK_FACTORS`] entries
    pub risk_factors: Vec<String>,
    pub model_used: String,
    /// Wall time spent scoring, in milliseconds
    pub processing_time: f64,
    /// Risk score per contributing model, keyed by model name
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub model_scores: BTreeMap<String, f64>,
}

impl PredictionResult {
    /// Build a single-model prediction. Risk factors are normalised and the
    /// model's own score is recorded in `model_scores`.
    pub fn new(
        model: ModelKind,
        is_fraud: bool,
        risk_score: f64,
        confidence: f64,
        risk_factors: Vec<String>,
        processing_time: f64,
    ) -> Self {
        let mut model_scores = BTreeMap::new();
        model_scores.insert(model.name().to_string(), risk_score);

        Self {
            is_fraud,
            risk_score,
            confidence,
            risk_factors: normalize_risk_factors(risk_factors),
            model_used: model.label().to_string(),
            processing_time,
            model_scores,
        }
    }
}

/// Deduplicate keeping first occurrences, then truncate to [`MAX_RISK_FACTORS`].
pub fn normalize_risk_factors<I>(factors: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut unique: Vec<String> = Vec::new();
    for factor in factors {
        if unique.len() == MAX_RISK_FACTORS {
            break;
        }
        if !unique.contains(&factor) {
            unique.push(factor);
        }
    }
    unique
}

/// Round to one decimal place, half away from zero.
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_risk_factors() {
        let factors = ["a", "b", "a", "c", "d", "b", "e", "f"]
            .iter()
            .map(|s| s.to_string());

        let normalized = normalize_risk_factors(factors);
        assert_eq!(normalized, vec!["a", "b", "c", "d", "e"]);
    }

    #[test]
    fn test_prediction_serialization_uses_camel_case() {
        let result = PredictionResult::new(
            ModelKind::XgBoost,
            true,
            72.5,
            87.1,
            vec!["High-risk merchant category".to_string()],
            0.01,
        );

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["isFraud"], true);
        assert_eq!(json["modelUsed"], "XGBoost");
        assert_eq!(json["modelScores"]["xgboost"], 72.5);
    }

    #[test]
    fn test_round1() {
        assert_eq!(round1(93.44), 93.4);
        assert_eq!(round1(0.25), 0.3);
        assert_eq!(round1(50.0), 50.0);
    }
}
