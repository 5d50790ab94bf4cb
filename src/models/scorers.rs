//! Heuristic scoring models.
//!
//! Each scorer is a pure function of a validated [`TransactionFeatures`]:
//! no shared state, no I/O. The `FraudModel` trait wraps them so the
//! ensemble and the inference engine can treat every model uniformly.

use crate::types::prediction::{round1, ModelKind, PredictionResult};
use crate::types::transaction::{DeviceType, Location, TransactionFeatures};
use std::time::Instant;
use thiserror::Error;

/// Lower bound of the confidence reported by the rule-based models
pub const CONFIDENCE_FLOOR: f64 = 50.0;
/// Upper bound of any reported confidence
pub const CONFIDENCE_CEILING: f64 = 99.9;

/// Weights applied to the normalized neural network inputs
pub const NEURAL_WEIGHTS: [f64; 5] = [0.3, 0.25, 0.15, 0.1, 0.2];
const NEURAL_BIAS: f64 = 0.5;

/// Failure raised while scoring a transaction
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScoringError {
    #[error("{model} produced a non-finite {metric}")]
    NonFiniteScore { model: String, metric: &'static str },

    #[error("{model} failed: {reason}")]
    ModelFailed { model: String, reason: String },

    #[error("ensemble has no member models")]
    EmptyEnsemble,
}

/// A scoring model that maps a feature vector to a prediction.
pub trait FraudModel: Send + Sync {
    /// Which model this is
    fn kind(&self) -> ModelKind;

    /// Score a transaction
    fn predict(&self, features: &TransactionFeatures) -> Result<PredictionResult, ScoringError>;
}

/// Logistic sigmoid `1 / (1 + e^-x)`
pub fn sigmoid(x: f64) -> f64 {
    1.0 / (1.0 + (-x).exp())
}

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}

/// Late-night window: 22:00 through 04:59.
fn is_unusual_hour(hour: u8) -> bool {
    hour >= 22 || hour < 5
}

/// Amount/velocity-weighted step scorer.
pub fn score_random_forest(features: &TransactionFeatures) -> PredictionResult {
    let start = Instant::now();

    let mut risk_factors = Vec::new();
    let mut risk_score: f64 = 0.0;

    if features.amount() > 5000.0 {
        risk_score += 25.0;
        risk_factors.push("High transaction amount".to_string());
    }

    if is_unusual_hour(features.time_of_day()) {
        risk_score += 15.0;
        risk_factors.push("Unusual time of transaction".to_string());
    }

    if features.device_type() == DeviceType::New {
        risk_score += 20.0;
        risk_factors.push("New device detected".to_string());
    }

    if features.transaction_frequency() > 10 {
        risk_score += 18.0;
        risk_factors.push("High transaction velocity".to_string());
    }

    if features.location() == Location::International {
        risk_score += 22.0;
        risk_factors.push("International transaction".to_string());
    }

    if features.previous_fraud_flag() {
        risk_score += 30.0;
        risk_factors.push("Previous fraud history".to_string());
    }

    let is_fraud = risk_score > 50.0;
    let confidence = (80.0 + (risk_score / 10.0) * 2.0)
        .clamp(CONFIDENCE_FLOOR, CONFIDENCE_CEILING);

    PredictionResult::new(
        ModelKind::RandomForest,
        is_fraud,
        risk_score.clamp(0.0, 100.0),
        round1(confidence),
        risk_factors,
        elapsed_ms(start),
    )
}

/// Ratio/category-weighted scorer.
///
/// The location multiplier scales the total accumulated so far; the
/// frequency term is added afterwards and is not scaled.
pub fn score_xgboost(features: &TransactionFeatures) -> PredictionResult {
    let start = Instant::now();

    let mut risk_factors = Vec::new();
    let mut risk_score = features.amount() / 1000.0 * 8.0;

    if features.merchant_category().is_high_risk() {
        risk_score += 25.0;
        risk_factors.push("High-risk merchant category".to_string());
    }

    if features.is_weekend() && features.time_of_day() > 20 {
        risk_score += 12.0;
        risk_factors.push("Weekend late-night transaction".to_string());
    }

    if features.location() == Location::International {
        risk_score *= 1.5;
    }

    if features.transaction_frequency() > 15 {
        risk_score += 20.0;
        risk_factors.push("Excessive transaction frequency".to_string());
    }

    let is_fraud = risk_score > 55.0;
    let confidence = (75.0 + (risk_score / 15.0) * 2.5)
        .clamp(CONFIDENCE_FLOOR, CONFIDENCE_CEILING);

    PredictionResult::new(
        ModelKind::XgBoost,
        is_fraud,
        risk_score.clamp(0.0, 100.0),
        round1(confidence),
        risk_factors,
        elapsed_ms(start),
    )
}

/// Normalized inputs of the neural network scorer, in weight order.
pub fn neural_inputs(features: &TransactionFeatures) -> [f64; 5] {
    [
        features.amount() / 10000.0,
        f64::from(features.transaction_frequency()) / 30.0,
        f64::from(features.time_of_day()) / 24.0,
        f64::from(features.customer_age()) / 80.0,
        if features.previous_fraud_flag() { 1.0 } else { 0.0 },
    ]
}

/// Weighted linear combination squashed through a sigmoid.
pub fn score_neural_network(features: &TransactionFeatures) -> PredictionResult {
    let start = Instant::now();

    let activation = neural_inputs(features)
        .iter()
        .zip(NEURAL_WEIGHTS.iter())
        .fold(NEURAL_BIAS, |acc, (input, weight)| acc + input * weight);

    let risk_score = (sigmoid(activation) * 100.0).clamp(0.0, 100.0);
    let is_fraud = risk_score > 55.0;

    let mut risk_factors = Vec::new();
    if risk_score > 70.0 {
        risk_factors.push("High anomaly score detected".to_string());
    }

    PredictionResult::new(
        ModelKind::NeuralNetwork,
        is_fraud,
        risk_score,
        round1(risk_score),
        risk_factors,
        elapsed_ms(start),
    )
}

/// Reject predictions carrying NaN or infinite numbers.
pub(crate) fn ensure_finite(result: PredictionResult) -> Result<PredictionResult, ScoringError> {
    let checks = [
        ("riskScore", result.risk_score),
        ("confidence", result.confidence),
    ];
    for (metric, value) in checks {
        if !value.is_finite() {
            return Err(ScoringError::NonFiniteScore {
                model: result.model_used.clone(),
                metric,
            });
        }
    }
    Ok(result)
}

/// Random-Forest-style scorer
#[derive(Debug, Clone, Copy, Default)]
pub struct RandomForestModel;

impl FraudModel for RandomForestModel {
    fn kind(&self) -> ModelKind {
        ModelKind::RandomForest
    }

    fn predict(&self, features: &TransactionFeatures) -> Result<PredictionResult, ScoringError> {
        ensure_finite(score_random_forest(features))
    }
}

/// XGBoost-style scorer
#[derive(Debug, Clone, Copy, Default)]
pub struct XgBoostModel;

impl FraudModel for XgBoostModel {
    fn kind(&self) -> ModelKind {
        ModelKind::XgBoost
    }

    fn predict(&self, features: &TransactionFeatures) -> Result<PredictionResult, ScoringError> {
        ensure_finite(score_xgboost(features))
    }
}

/// Neural-Network-style scorer
#[derive(Debug, Clone, Copy, Default)]
pub struct NeuralNetworkModel;

impl FraudModel for NeuralNetworkModel {
    fn kind(&self) -> ModelKind {
        ModelKind::NeuralNetwork
    }

    fn predict(&self, features: &TransactionFeatures) -> Result<PredictionResult, ScoringError> {
        ensure_finite(score_neural_network(features))
    }
}

/// Boxed instance of a single built-in model.
///
/// Returns `None` for [`ModelKind::Ensemble`], which is not a single model.
pub fn builtin_model(kind: ModelKind) -> Option<Box<dyn FraudModel>> {
    match kind {
        ModelKind::RandomForest => Some(Box::new(RandomForestModel)),
        ModelKind::XgBoost => Some(Box::new(XgBoostModel)),
        ModelKind::NeuralNetwork => Some(Box::new(NeuralNetworkModel)),
        ModelKind::Ensemble => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::transaction::MerchantCategory;

    fn low_risk() -> TransactionFeatures {
        TransactionFeatures::builder(50.0)
            .location(Location::Domestic)
            .device_type(DeviceType::Known)
            .merchant_category(MerchantCategory::Retail)
            .time_of_day(14)
            .transaction_frequency(1)
            .build()
            .unwrap()
    }

    fn worst_case() -> TransactionFeatures {
        TransactionFeatures::builder(1_000_000.0)
            .location(Location::International)
            .device_type(DeviceType::New)
            .merchant_category(MerchantCategory::Gambling)
            .time_of_day(23)
            .day_of_week(6)
            .transaction_frequency(500)
            .customer_age(120)
            .previous_fraud_flag(true)
            .build()
            .unwrap()
    }

    #[test]
    fn test_random_forest_international_new_device() {
        let features = TransactionFeatures::builder(15000.0)
            .location(Location::International)
            .device_type(DeviceType::New)
            .merchant_category(MerchantCategory::Retail)
            .time_of_day(14)
            .build()
            .unwrap();

        let result = score_random_forest(&features);

        assert_eq!(result.risk_score, 67.0);
        assert!(result.is_fraud);
        assert_eq!(result.confidence, 93.4);
        assert_eq!(
            result.risk_factors,
            vec![
                "High transaction amount",
                "New device detected",
                "International transaction"
            ]
        );
        assert_eq!(result.model_used, "Random Forest");
    }

    #[test]
    fn test_random_forest_late_night_window() {
        for hour in [22, 23, 0, 4] {
            let features = TransactionFeatures::builder(10.0).time_of_day(hour).build().unwrap();
            assert_eq!(score_random_forest(&features).risk_score, 15.0, "hour {hour}");
        }
        for hour in [5, 12, 21] {
            let features = TransactionFeatures::builder(10.0).time_of_day(hour).build().unwrap();
            assert_eq!(score_random_forest(&features).risk_score, 0.0, "hour {hour}");
        }
    }

    #[test]
    fn test_random_forest_caps_risk_and_confidence() {
        let result = score_random_forest(&worst_case());

        // 25 + 15 + 20 + 18 + 22 + 30 = 130, clamped
        assert_eq!(result.risk_score, 100.0);
        assert_eq!(result.confidence, 99.9);
        assert_eq!(result.risk_factors.len(), 5);
    }

    #[test]
    fn test_xgboost_multiplier_applies_before_frequency() {
        let features = TransactionFeatures::builder(2000.0)
            .location(Location::International)
            .merchant_category(MerchantCategory::Adult)
            .transaction_frequency(16)
            .build()
            .unwrap();

        let result = score_xgboost(&features);

        // (2000/1000*8 + 25) * 1.5 + 20 = 81.5
        assert_eq!(result.risk_score, 81.5);
        assert!(result.is_fraud);
        assert_eq!(
            result.risk_factors,
            vec!["High-risk merchant category", "Excessive transaction frequency"]
        );
    }

    #[test]
    fn test_xgboost_weekend_late_night() {
        let features = TransactionFeatures::builder(0.0)
            .day_of_week(0)
            .time_of_day(21)
            .build()
            .unwrap();
        let result = score_xgboost(&features);
        assert_eq!(result.risk_score, 12.0);
        assert!(!result.is_fraud);

        let weekday = TransactionFeatures::builder(0.0)
            .day_of_week(3)
            .time_of_day(21)
            .build()
            .unwrap();
        assert_eq!(score_xgboost(&weekday).risk_score, 0.0);
    }

    #[test]
    fn test_neural_network_matches_formula() {
        let features = low_risk();
        let result = score_neural_network(&features);

        let expected_activation = 0.5
            + (50.0 / 10000.0) * 0.3
            + (1.0 / 30.0) * 0.25
            + (14.0 / 24.0) * 0.15
            + (30.0 / 80.0) * 0.1;
        let expected = sigmoid(expected_activation) * 100.0;

        assert!((result.risk_score - expected).abs() < 1e-9);
        assert_eq!(result.confidence, round1(expected));
        assert!(result.risk_factors.is_empty());
    }

    #[test]
    fn test_neural_network_anomaly_factor() {
        let features = TransactionFeatures::builder(10000.0)
            .transaction_frequency(30)
            .time_of_day(23)
            .customer_age(80)
            .previous_fraud_flag(true)
            .build()
            .unwrap();

        let result = score_neural_network(&features);

        assert!(result.risk_score > 70.0);
        assert!(result.is_fraud);
        assert_eq!(result.risk_factors, vec!["High anomaly score detected"]);
    }

    #[test]
    fn test_sigmoid() {
        assert_eq!(sigmoid(0.0), 0.5);
        assert!(sigmoid(10.0) > 0.9999);
        assert!(sigmoid(-10.0) < 0.0001);
    }

    #[test]
    fn test_scores_stay_in_bounds() {
        for features in [low_risk(), worst_case()] {
            for result in [score_random_forest(&features), score_xgboost(&features)] {
                assert!((0.0..=100.0).contains(&result.risk_score));
                assert!((CONFIDENCE_FLOOR..=CONFIDENCE_CEILING).contains(&result.confidence));
            }
            let nn = score_neural_network(&features);
            assert!((0.0..=100.0).contains(&nn.risk_score));
            assert!((0.0..=100.0).contains(&nn.confidence));
        }
    }

    #[test]
    fn test_scorers_are_deterministic() {
        let features = worst_case();
        let models: Vec<Box<dyn FraudModel>> = vec![
            Box::new(RandomForestModel),
            Box::new(XgBoostModel),
            Box::new(NeuralNetworkModel),
        ];

        for model in &models {
            let first = model.predict(&features).unwrap();
            let second = model.predict(&features).unwrap();
            assert_eq!(first.is_fraud, second.is_fraud);
            assert_eq!(first.risk_score, second.risk_score);
            assert_eq!(first.risk_factors, second.risk_factors);
        }
    }

    #[test]
    fn test_ensure_finite_rejects_nan() {
        let mut result = score_random_forest(&low_risk());
        result.risk_score = f64::NAN;

        let err = ensure_finite(result).unwrap_err();
        assert_eq!(
            err,
            ScoringError::NonFiniteScore {
                model: "Random Forest".to_string(),
                metric: "riskScore"
            }
        );
    }

    #[test]
    fn test_builtin_model_lookup() {
        assert_eq!(
            builtin_model(ModelKind::XgBoost).map(|m| m.kind()),
            Some(ModelKind::XgBoost)
        );
        assert!(builtin_model(ModelKind::Ensemble).is_none());
    }
}
