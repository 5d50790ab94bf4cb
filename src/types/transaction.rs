//! Transaction data structures consumed by the scoring models

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Rejection raised while building a feature vector.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FeatureError {
    #[error("{field} must be a finite number, got {value}")]
    NonFinite { field: &'static str, value: f64 },

    #[error("{field} must be a whole number, got {value}")]
    NotIntegral { field: &'static str, value: f64 },

    #[error("{field} out of range: {value} (expected {min}..={max})")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("isWeekend={is_weekend} is inconsistent with dayOfWeek={day_of_week}")]
    WeekendMismatch { is_weekend: bool, day_of_week: u8 },

    #[error("unknown device type: {0:?}")]
    UnknownDevice(String),

    #[error("missing field: {0}")]
    MissingField(&'static str),
}

/// Where the transaction originated relative to the cardholder
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Location {
    Domestic,
    International,
    /// Anything that is neither domestic nor international
    #[serde(rename = "unknown")]
    UnknownOrOther,
}

impl Location {
    /// Lenient parse: unrecognised values fall into `UnknownOrOther`.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "domestic" => Location::Domestic,
            "international" => Location::International,
            _ => Location::UnknownOrOther,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Location::Domestic => "domestic",
            Location::International => "international",
            Location::UnknownOrOther => "unknown",
        }
    }
}

/// Device the transaction was made from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceType {
    Known,
    New,
    Mobile,
}

impl DeviceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceType::Known => "known",
            DeviceType::New => "new",
            DeviceType::Mobile => "mobile",
        }
    }
}

impl FromStr for DeviceType {
    type Err = FeatureError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "known" => Ok(DeviceType::Known),
            "new" => Ok(DeviceType::New),
            "mobile" => Ok(DeviceType::Mobile),
            _ => Err(FeatureError::UnknownDevice(value.to_string())),
        }
    }
}

/// Merchant category of the receiving party
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MerchantCategory {
    Retail,
    Gambling,
    Adult,
    Travel,
    Other,
}

impl MerchantCategory {
    /// Lenient parse: unrecognised values fall into `Other`.
    pub fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "retail" => MerchantCategory::Retail,
            "gambling" => MerchantCategory::Gambling,
            "adult" => MerchantCategory::Adult,
            "travel" => MerchantCategory::Travel,
            _ => MerchantCategory::Other,
        }
    }

    /// Categories that carry an inherent risk premium.
    pub fn is_high_risk(&self) -> bool {
        matches!(self, MerchantCategory::Gambling | MerchantCategory::Adult)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MerchantCategory::Retail => "retail",
            MerchantCategory::Gambling => "gambling",
            MerchantCategory::Adult => "adult",
            MerchantCategory::Travel => "travel",
            MerchantCategory::Other => "other",
        }
    }
}

impl fmt::Display for MerchantCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Validated, immutable feature vector for a single transaction.
///
/// Only constructible through [`TransactionFeatures::builder`], so every
/// instance satisfies the range checks and the weekend invariant.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionFeatures {
    amount: f64,
    location: Location,
    device_type: DeviceType,
    merchant_category: MerchantCategory,
    time_of_day: u8,
    day_of_week: u8,
    is_weekend: bool,
    transaction_frequency: u32,
    customer_age: u32,
    previous_fraud_flag: bool,
}

impl TransactionFeatures {
    /// Start building a feature vector for a transaction of `amount`.
    pub fn builder(amount: f64) -> TransactionFeaturesBuilder {
        TransactionFeaturesBuilder::new(amount)
    }

    pub fn amount(&self) -> f64 {
        self.amount
    }

    pub fn location(&self) -> Location {
        self.location
    }

    pub fn device_type(&self) -> DeviceType {
        self.device_type
    }

    pub fn merchant_category(&self) -> MerchantCategory {
        self.merchant_category
    }

    pub fn time_of_day(&self) -> u8 {
        self.time_of_day
    }

    pub fn day_of_week(&self) -> u8 {
        self.day_of_week
    }

    pub fn is_weekend(&self) -> bool {
        self.is_weekend
    }

    pub fn transaction_frequency(&self) -> u32 {
        self.transaction_frequency
    }

    pub fn customer_age(&self) -> u32 {
        self.customer_age
    }

    pub fn previous_fraud_flag(&self) -> bool {
        self.previous_fraud_flag
    }
}

/// Sunday (0) and Saturday (6) are weekend days.
pub fn is_weekend_day(day_of_week: u8) -> bool {
    day_of_week == 0 || day_of_week == 6
}

/// Builder for [`TransactionFeatures`]
#[derive(Debug, Clone)]
pub struct TransactionFeaturesBuilder {
    amount: f64,
    location: Location,
    device_type: DeviceType,
    merchant_category: MerchantCategory,
    time_of_day: u8,
    day_of_week: u8,
    is_weekend: Option<bool>,
    transaction_frequency: u32,
    customer_age: u32,
    previous_fraud_flag: bool,
}

impl TransactionFeaturesBuilder {
    fn new(amount: f64) -> Self {
        Self {
            amount,
            location: Location::Domestic,
            device_type: DeviceType::Known,
            merchant_category: MerchantCategory::Retail,
            time_of_day: 12,
            day_of_week: 1,
            is_weekend: None,
            transaction_frequency: 0,
            customer_age: 30,
            previous_fraud_flag: false,
        }
    }

    pub fn location(mut self, location: Location) -> Self {
        self.location = location;
        self
    }

    pub fn device_type(mut self, device_type: DeviceType) -> Self {
        self.device_type = device_type;
        self
    }

    pub fn merchant_category(mut self, category: MerchantCategory) -> Self {
        self.merchant_category = category;
        self
    }

    pub fn time_of_day(mut self, hour: u8) -> Self {
        self.time_of_day = hour;
        self
    }

    pub fn day_of_week(mut self, day: u8) -> Self {
        self.day_of_week = day;
        self
    }

    /// Explicit weekend flag. When omitted it is derived from the day of week.
    pub fn is_weekend(mut self, is_weekend: bool) -> Self {
        self.is_weekend = Some(is_weekend);
        self
    }

    pub fn transaction_frequency(mut self, frequency: u32) -> Self {
        self.transaction_frequency = frequency;
        self
    }

    pub fn customer_age(mut self, age: u32) -> Self {
        self.customer_age = age;
        self
    }

    pub fn previous_fraud_flag(mut self, flagged: bool) -> Self {
        self.previous_fraud_flag = flagged;
        self
    }

    /// Validate and freeze the feature vector.
    pub fn build(self) -> Result<TransactionFeatures, FeatureError> {
        if !self.amount.is_finite() {
            return Err(FeatureError::NonFinite {
                field: "amount",
                value: self.amount,
            });
        }
        if self.amount < 0.0 {
            return Err(FeatureError::OutOfRange {
                field: "amount",
                value: self.amount,
                min: 0.0,
                max: f64::MAX,
            });
        }
        if self.time_of_day > 23 {
            return Err(FeatureError::OutOfRange {
                field: "timeOfDay",
                value: f64::from(self.time_of_day),
                min: 0.0,
                max: 23.0,
            });
        }
        if self.day_of_week > 6 {
            return Err(FeatureError::OutOfRange {
                field: "dayOfWeek",
                value: f64::from(self.day_of_week),
                min: 0.0,
                max: 6.0,
            });
        }
        if self.customer_age == 0 {
            return Err(FeatureError::OutOfRange {
                field: "customerAge",
                value: 0.0,
                min: 1.0,
                max: f64::from(u32::MAX),
            });
        }

        let derived_weekend = is_weekend_day(self.day_of_week);
        if let Some(is_weekend) = self.is_weekend {
            if is_weekend != derived_weekend {
                return Err(FeatureError::WeekendMismatch {
                    is_weekend,
                    day_of_week: self.day_of_week,
                });
            }
        }

        Ok(TransactionFeatures {
            amount: self.amount,
            location: self.location,
            device_type: self.device_type,
            merchant_category: self.merchant_category,
            time_of_day: self.time_of_day,
            day_of_week: self.day_of_week,
            is_weekend: derived_weekend,
            transaction_frequency: self.transaction_frequency,
            customer_age: self.customer_age,
            previous_fraud_flag: self.previous_fraud_flag,
        })
    }
}

/// Loosely-typed transaction record as it arrives from a batch file.
///
/// Numeric fields are kept as `f64` so that the extraction boundary can
/// reject non-finite or fractional values with a precise error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawTransaction {
    /// Unique transaction identifier
    #[serde(alias = "transaction_id")]
    pub id: String,

    pub amount: f64,

    #[serde(default)]
    pub location: String,

    #[serde(default, alias = "device_type")]
    pub device_type: String,

    #[serde(default, alias = "merchant_category")]
    pub merchant_category: String,

    #[serde(alias = "time_of_day")]
    pub time_of_day: f64,

    #[serde(alias = "day_of_week")]
    pub day_of_week: f64,

    #[serde(default, alias = "is_weekend")]
    pub is_weekend: Option<bool>,

    #[serde(default, alias = "transaction_frequency")]
    pub transaction_frequency: f64,

    #[serde(alias = "customer_age")]
    pub customer_age: f64,

    #[serde(default, alias = "previous_fraud_flag")]
    pub previous_fraud_flag: bool,

    /// Merchant display name, used only for reporting
    #[serde(default)]
    pub merchant: Option<String>,

    /// Transaction timestamp (RFC 3339), used only for reporting
    #[serde(default)]
    pub timestamp: Option<String>,

    /// Known outcome, when the batch is labelled
    #[serde(default, alias = "is_fraud")]
    pub label: Option<bool>,
}
