//! Type definitions for the fraud scoring engine

pub mod alert;
pub mod prediction;
pub mod transaction;

pub use alert::{Notification, NotificationKind, Severity};
pub use prediction::{ModelKind, PredictionResult};
pub use transaction::{
    is_weekend_day, DeviceType, FeatureError, Location, MerchantCategory, RawTransaction,
    TransactionFeatures,
};
