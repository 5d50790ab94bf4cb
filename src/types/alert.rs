//! Notification data structures published for scored transactions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Risk score above which a notification is classified as high severity
pub const DEFAULT_HIGH_SEVERITY_THRESHOLD: f64 = 70.0;

/// Severity classification of a published notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    High,
    Info,
}

impl Severity {
    /// High iff the risk score strictly exceeds `threshold`.
    pub fn from_score(risk_score: f64, threshold: f64) -> Self {
        if risk_score > threshold {
            Severity::High
        } else {
            Severity::Info
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::High => "high",
            Severity::Info => "info",
        }
    }
}

/// Presentation flavour of a notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Success,
    Error,
    Warning,
    Info,
}

/// User-visible notification emitted by the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    /// Unique notification identifier
    pub id: String,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub severity: Severity,
    /// Transaction the notification refers to, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    /// Create a new notification with a fresh identifier
    pub fn new(
        kind: NotificationKind,
        severity: Severity,
        title: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            kind,
            title: title.into(),
            message: message.into(),
            severity,
            transaction_id: None,
            created_at: Utc::now(),
        }
    }

    /// Attach the transaction this notification refers to
    pub fn for_transaction(mut self, transaction_id: impl Into<String>) -> Self {
        self.transaction_id = Some(transaction_id.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_from_score() {
        let threshold = DEFAULT_HIGH_SEVERITY_THRESHOLD;

        assert_eq!(Severity::from_score(10.0, threshold), Severity::Info);
        assert_eq!(Severity::from_score(70.0, threshold), Severity::Info);
        assert_eq!(Severity::from_score(70.1, threshold), Severity::High);
    }

    #[test]
    fn test_notification_serialization() {
        let notification = Notification::new(
            NotificationKind::Warning,
            Severity::High,
            "Fraud Detected",
            "Risk Score: 80.0 | Confidence: 90.0%",
        )
        .for_transaction("TXN-9");

        let json = serde_json::to_string(&notification).unwrap();
        let deserialized: Notification = serde_json::from_str(&json).unwrap();

        assert_eq!(notification, deserialized);
        assert_eq!(deserialized.transaction_id.as_deref(), Some("TXN-9"));
    }
}
