//! Feature extraction for fraud scoring.
//!
//! This is the validation boundary: raw batch records come in with
//! loosely-typed fields and leave as a [`TransactionFeatures`] that the
//! scoring models can consume without further checks.

use crate::types::transaction::{
    DeviceType, FeatureError, Location, MerchantCategory, RawTransaction, TransactionFeatures,
};
use tracing::trace;

/// Feature extractor that turns raw records into validated feature vectors.
pub struct FeatureExtractor;

impl FeatureExtractor {
    /// Create a new feature extractor.
    pub fn new() -> Self {
        Self
    }

    /// Extract features from a raw transaction record.
    ///
    /// Unrecognised location and merchant values fall into their catch-all
    /// buckets. A blank id or device, unrecognised devices, non-finite
    /// numbers, fractional counts and out-of-range values are rejected.
    pub fn extract(&self, raw: &RawTransaction) -> Result<TransactionFeatures, FeatureError> {
        if raw.id.trim().is_empty() {
            return Err(FeatureError::MissingField("id"));
        }
        if raw.device_type.trim().is_empty() {
            return Err(FeatureError::MissingField("deviceType"));
        }
        let device_type = raw.device_type.parse::<DeviceType>()?;
        let time_of_day = whole_number("timeOfDay", raw.time_of_day, 0, 23)?;
        let day_of_week = whole_number("dayOfWeek", raw.day_of_week, 0, 6)?;
        let transaction_frequency = whole_number(
            "transactionFrequency",
            raw.transaction_frequency,
            0,
            u64::from(u32::MAX),
        )?;
        let customer_age = whole_number("customerAge", raw.customer_age, 1, u64::from(u32::MAX))?;

        let mut builder = TransactionFeatures::builder(raw.amount)
            .location(Location::parse(&raw.location))
            .device_type(device_type)
            .merchant_category(MerchantCategory::parse(&raw.merchant_category))
            .time_of_day(time_of_day as u8)
            .day_of_week(day_of_week as u8)
            .transaction_frequency(transaction_frequency as u32)
            .customer_age(customer_age as u32)
            .previous_fraud_flag(raw.previous_fraud_flag);

        if let Some(is_weekend) = raw.is_weekend {
            builder = builder.is_weekend(is_weekend);
        }

        let features = builder.build()?;
        trace!(transaction_id = %raw.id, features = ?features, "Features extracted");
        Ok(features)
    }

    /// Get the number of features in a vector.
    pub fn feature_count(&self) -> usize {
        10
    }

    /// Get feature names, in record order.
    pub fn feature_names(&self) -> Vec<&'static str> {
        vec![
            "amount",
            "location",
            "deviceType",
            "merchantCategory",
            "timeOfDay",
            "dayOfWeek",
            "isWeekend",
            "transactionFrequency",
            "customerAge",
            "previousFraudFlag",
        ]
    }
}

impl Default for FeatureExtractor {
    fn default() -> Self {
        Self::new()
    }
}

/// Convert a numeric field into an integer within `min..=max`.
fn whole_number(field: &'static str, value: f64, min: u64, max: u64) -> Result<u64, FeatureError> {
    if !value.is_finite() {
        return Err(FeatureError::NonFinite { field, value });
    }
    if value.fract() != 0.0 {
        return Err(FeatureError::NotIntegral { field, value });
    }
    if value < min as f64 || value > max as f64 {
        return Err(FeatureError::OutOfRange {
            field,
            value,
            min: min as f64,
            max: max as f64,
        });
    }
    Ok(value as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw() -> RawTransaction {
        RawTransaction {
            id: "TXN-1".to_string(),
            amount: 250.0,
            location: "international".to_string(),
            device_type: "mobile".to_string(),
            merchant_category: "travel".to_string(),
            time_of_day: 23.0,
            day_of_week: 6.0,
            is_weekend: Some(true),
            transaction_frequency: 4.0,
            customer_age: 35.0,
            previous_fraud_flag: false,
            merchant: Some("Skyways".to_string()),
            timestamp: None,
            label: None,
        }
    }

    #[test]
    fn test_feature_extraction() {
        let extractor = FeatureExtractor::new();
        let features = extractor.extract(&raw()).unwrap();

        assert_eq!(features.amount(), 250.0);
        assert_eq!(features.location(), Location::International);
        assert_eq!(features.device_type(), DeviceType::Mobile);
        assert_eq!(features.merchant_category(), MerchantCategory::Travel);
        assert_eq!(features.time_of_day(), 23);
        assert!(features.is_weekend());
        assert_eq!(features.customer_age(), 35);
    }

    #[test]
    fn test_unknown_categories_fall_back() {
        let mut record = raw();
        record.location = "lunar".to_string();
        record.merchant_category = "crypto".to_string();

        let features = FeatureExtractor::new().extract(&record).unwrap();
        assert_eq!(features.location(), Location::UnknownOrOther);
        assert_eq!(features.merchant_category(), MerchantCategory::Other);
    }

    #[test]
    fn test_rejects_invalid_records() {
        let extractor = FeatureExtractor::new();

        let mut record = raw();
        record.amount = f64::NAN;
        assert!(matches!(
            extractor.extract(&record),
            Err(FeatureError::NonFinite { field: "amount", .. })
        ));

        let mut record = raw();
        record.time_of_day = 12.5;
        assert!(matches!(
            extractor.extract(&record),
            Err(FeatureError::NotIntegral { field: "timeOfDay", .. })
        ));

        let mut record = raw();
        record.customer_age = 0.0;
        assert!(matches!(
            extractor.extract(&record),
            Err(FeatureError::OutOfRange { field: "customerAge", .. })
        ));

        let mut record = raw();
        record.transaction_frequency = f64::INFINITY;
        assert!(matches!(
            extractor.extract(&record),
            Err(FeatureError::NonFinite { field: "transactionFrequency", .. })
        ));

        let mut record = raw();
        record.device_type = "toaster".to_string();
        assert!(matches!(
            extractor.extract(&record),
            Err(FeatureError::UnknownDevice(_))
        ));

        let mut record = raw();
        record.id = "  ".to_string();
        assert_eq!(
            extractor.extract(&record),
            Err(FeatureError::MissingField("id"))
        );

        let mut record = raw();
        record.device_type.clear();
        assert_eq!(
            extractor.extract(&record),
            Err(FeatureError::MissingField("deviceType"))
        );

        let mut record = raw();
        record.is_weekend = Some(false);
        assert!(matches!(
            extractor.extract(&record),
            Err(FeatureError::WeekendMismatch { .. })
        ));
    }

    #[test]
    fn test_feature_count() {
        let extractor = FeatureExtractor::new();
        assert_eq!(extractor.feature_count(), 10);
        assert_eq!(extractor.feature_names().len(), 10);
    }
}
