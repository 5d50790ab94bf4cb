//! Configuration management for the fraud scoring engine

use crate::export::ReportType;
use crate::types::alert::DEFAULT_HIGH_SEVERITY_THRESHOLD;
use crate::types::prediction::ModelKind;
use anyhow::{ensure, Context, Result};
use config::{Config, File};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Configuration file read by [`AppConfig::load`]
pub const DEFAULT_CONFIG_PATH: &str = "config/config.toml";

/// Inference strategy for fraud scoring
#[derive(Debug, Clone, Deserialize, PartialEq, Default)]
#[serde(rename_all = "lowercase")]
pub enum InferenceStrategy {
    /// Single configured model - fastest, one opinion
    Primary,
    /// Majority vote over all models
    #[default]
    Ensemble,
}

/// Main application configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub models: ModelsConfig,
    #[serde(default)]
    pub detection: DetectionConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub notifications: NotificationsConfig,
    #[serde(default)]
    pub input: InputConfig,
    #[serde(default)]
    pub export: ExportConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Model selection
#[derive(Debug, Clone, Deserialize)]
pub struct ModelsConfig {
    /// Inference strategy: "primary" (single model) or "ensemble" (all models)
    #[serde(default)]
    pub strategy: InferenceStrategy,
    /// Model used by the primary strategy (default: random_forest)
    #[serde(default = "default_primary_model")]
    pub primary_model: ModelKind,
}

fn default_primary_model() -> ModelKind {
    ModelKind::RandomForest
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            strategy: InferenceStrategy::Ensemble,
            primary_model: default_primary_model(),
        }
    }
}

/// Detection configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DetectionConfig {
    /// Risk score above which notifications are high severity
    #[serde(default = "default_high_severity_threshold")]
    pub high_severity_threshold: f64,
}

fn default_high_severity_threshold() -> f64 {
    DEFAULT_HIGH_SEVERITY_THRESHOLD
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            high_severity_threshold: default_high_severity_threshold(),
        }
    }
}

/// Prediction cache configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    /// Memoize predictions by transaction id
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Lifetime of a cached prediction
    #[serde(default = "default_ttl_seconds")]
    pub ttl_seconds: u64,
    /// Remove entries with timers instead of only on read
    #[serde(default = "default_true")]
    pub eager_expiry: bool,
}

fn default_true() -> bool {
    true
}

fn default_ttl_seconds() -> u64 {
    600
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_seconds: default_ttl_seconds(),
            eager_expiry: true,
        }
    }
}

/// Notification center configuration
#[derive(Debug, Clone, Deserialize)]
pub struct NotificationsConfig {
    /// Most recent notifications kept in memory
    #[serde(default = "default_max_retained")]
    pub max_retained: usize,
}

fn default_max_retained() -> usize {
    5
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            max_retained: default_max_retained(),
        }
    }
}

/// Batch input configuration
#[derive(Debug, Clone, Deserialize)]
pub struct InputConfig {
    /// JSON or CSV file of transaction records
    #[serde(default = "default_input_path")]
    pub path: String,
}

fn default_input_path() -> String {
    "data/transactions.json".to_string()
}

impl Default for InputConfig {
    fn default() -> Self {
        Self {
            path: default_input_path(),
        }
    }
}

/// Report export configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ExportConfig {
    /// Directory receiving the JSON and CSV reports
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
    /// Base file name of the reports
    #[serde(default = "default_report_name")]
    pub report_name: String,
    #[serde(default)]
    pub report_type: ReportType,
}

fn default_output_dir() -> String {
    "reports".to_string()
}

fn default_report_name() -> String {
    "fraud-report".to_string()
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            report_name: default_report_name(),
            report_type: ReportType::default(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log format (json, pretty)
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

impl AppConfig {
    /// Load configuration from file
    pub fn load() -> Result<Self> {
        Self::load_from_path(DEFAULT_CONFIG_PATH)
    }

    /// Load configuration from a specific path
    pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config = Config::builder()
            .add_source(File::from(path.as_ref()))
            .build()
            .context("Failed to build configuration")?;

        let config: Self = config
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        config.validate()?;
        Ok(config)
    }

    /// Reject settings the engine cannot run with
    pub fn validate(&self) -> Result<()> {
        ensure!(
            !self.cache.enabled || self.cache.ttl_seconds > 0,
            "cache.ttl_seconds must be positive when the cache is enabled"
        );
        ensure!(
            (0.0..=100.0).contains(&self.detection.high_severity_threshold),
            "detection.high_severity_threshold must be within 0..=100, got {}",
            self.detection.high_severity_threshold
        );
        ensure!(
            self.notifications.max_retained > 0,
            "notifications.max_retained must be positive"
        );
        ensure!(
            self.models.primary_model != ModelKind::Ensemble,
            "models.primary_model must name a single model"
        );
        Ok(())
    }
}
