//! Alert producer turning scoring outcomes into notifications

use crate::notifications::NotificationSink;
use crate::types::alert::{
    Notification, NotificationKind, Severity, DEFAULT_HIGH_SEVERITY_THRESHOLD,
};
use crate::types::prediction::PredictionResult;
use std::fmt;
use tracing::debug;

pub const FRAUD_TITLE: &str = "Fraud Detected";
pub const APPROVED_TITLE: &str = "Transaction Approved";
pub const FAILURE_TITLE: &str = "Scoring Failed";

/// Producer for publishing scoring notifications to a sink
#[derive(Clone)]
pub struct AlertProducer<S: NotificationSink> {
    sink: S,
    high_severity_threshold: f64,
}

impl<S: NotificationSink> AlertProducer<S> {
    /// Create a new alert producer
    pub fn new(sink: S) -> Self {
        Self::with_threshold(sink, DEFAULT_HIGH_SEVERITY_THRESHOLD)
    }

    /// Create a producer with a custom high severity threshold
    pub fn with_threshold(sink: S, high_severity_threshold: f64) -> Self {
        Self {
            sink,
            high_severity_threshold,
        }
    }

    /// Build the notification for a prediction without publishing it
    pub fn notification_for(
        &self,
        transaction_id: &str,
        prediction: &PredictionResult,
    ) -> Notification {
        let (kind, title) = if prediction.is_fraud {
            (NotificationKind::Warning, FRAUD_TITLE)
        } else {
            (NotificationKind::Success, APPROVED_TITLE)
        };
        let severity = Severity::from_score(prediction.risk_score, self.high_severity_threshold);
        let message = format!(
            "Risk Score: {:.1} | Confidence: {:.1}%",
            prediction.risk_score, prediction.confidence
        );

        Notification::new(kind, severity, title, message).for_transaction(transaction_id)
    }

    /// Publish the notification for a scored transaction
    pub fn publish_prediction(
        &self,
        transaction_id: &str,
        prediction: &PredictionResult,
    ) -> Notification {
        let notification = self.notification_for(transaction_id, prediction);

        debug!(
            transaction_id = %transaction_id,
            notification_id = %notification.id,
            severity = notification.severity.as_str(),
            risk_score = prediction.risk_score,
            "Publishing scoring notification"
        );

        self.sink.publish(notification.clone());
        notification
    }

    /// Publish an error notification for a transaction that could not be scored
    pub fn publish_failure(&self, transaction_id: &str, error: impl fmt::Display) -> Notification {
        let notification = Notification::new(
            NotificationKind::Error,
            Severity::Info,
            FAILURE_TITLE,
            error.to_string(),
        )
        .for_transaction(transaction_id);

        self.sink.publish(notification.clone());
        notification
    }

    /// Get the high severity threshold
    pub fn threshold(&self) -> f64 {
        self.high_severity_threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifications::NotificationCenter;
    use crate::types::prediction::ModelKind;
    use crate::types::transaction::FeatureError;
    use std::sync::Arc;

    fn prediction(is_fraud: bool, risk_score: f64, confidence: f64) -> PredictionResult {
        PredictionResult::new(ModelKind::Ensemble, is_fraud, risk_score, confidence, vec![], 0.2)
    }

    #[test]
    fn test_fraud_notification() {
        let center = Arc::new(NotificationCenter::default());
        let producer = AlertProducer::new(center.clone());

        let n = producer.publish_prediction("TXN-1", &prediction(true, 82.0, 91.3));
        assert_eq!(n.title, "Fraud Detected");
        assert_eq!(n.message, "Risk Score: 82.0 | Confidence: 91.3%");
        assert_eq!(n.severity, Severity::High);
        assert_eq!(n.transaction_id.as_deref(), Some("TXN-1"));
        assert_eq!(center.all(), vec![n]);
    }

    #[test]
    fn test_approved_notification() {
        let producer = AlertProducer::new(NotificationCenter::default());
        let n = producer.notification_for("TXN-2", &prediction(false, 12.5, 60.0));

        assert_eq!(n.title, "Transaction Approved");
        assert_eq!(n.kind, NotificationKind::Success);
        assert_eq!(n.severity, Severity::Info);
    }

    #[test]
    fn test_severity_threshold_is_strict() {
        let producer = AlertProducer::new(NotificationCenter::default());
        assert_eq!(
            producer.notification_for("a", &prediction(true, 70.0, 90.0)).severity,
            Severity::Info
        );

        let strict = AlertProducer::with_threshold(NotificationCenter::default(), 50.0);
        assert_eq!(
            strict.notification_for("a", &prediction(true, 60.0, 90.0)).severity,
            Severity::High
        );
    }

    #[test]
    fn test_failure_notification() {
        let center = Arc::new(NotificationCenter::default());
        let producer = AlertProducer::new(center.clone());

        let err = FeatureError::UnknownDevice("toaster".to_string());
        let n = producer.publish_failure("TXN-3", &err);

        assert_eq!(n.kind, NotificationKind::Error);
        assert_eq!(n.title, "Scoring Failed");
        assert_eq!(center.len(), 1);
    }
}
