//! Performance metrics and batch analytics for the scoring engine.

use crate::cache::CacheStats;
use crate::models::aggregator::EnsembleCombiner;
use crate::types::alert::Severity;
use crate::types::prediction::PredictionResult;
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::info;

const MAX_SAMPLES: usize = 10_000;

/// Metrics collector for batch scoring
pub struct PipelineMetrics {
    /// Total transactions scored
    pub transactions_processed: AtomicU64,
    /// Transactions the engine flagged as fraud
    pub fraud_detected: AtomicU64,
    /// Records that could not be validated or scored
    pub failures: AtomicU64,
    /// Notifications by severity
    alerts_by_severity: RwLock<HashMap<Severity, u64>>,
    /// Processing times (in microseconds)
    processing_times: RwLock<Vec<u64>>,
    /// Risk score distribution, ten buckets over 0-100
    score_buckets: RwLock<[u64; 10]>,
    /// Mean member score per model
    model_scores: RwLock<BTreeMap<String, (f64, u64)>>,
    /// Model agreement per ensemble prediction
    model_agreements: RwLock<Vec<f64>>,
    /// Latest cache statistics reported by the engine
    cache: RwLock<CacheStats>,
    start_time: Instant,
}

impl PipelineMetrics {
    /// Create a new metrics collector
    pub fn new() -> Self {
        Self {
            transactions_processed: AtomicU64::new(0),
            fraud_detected: AtomicU64::new(0),
            failures: AtomicU64::new(0),
            alerts_by_severity: RwLock::new(HashMap::new()),
            processing_times: RwLock::new(Vec::with_capacity(1000)),
            score_buckets: RwLock::new([0; 10]),
            model_scores: RwLock::new(BTreeMap::new()),
            model_agreements: RwLock::new(Vec::with_capacity(1000)),
            cache: RwLock::new(CacheStats::default()),
            start_time: Instant::now(),
        }
    }

    /// Record a scored transaction
    pub fn record_prediction(&self, processing_time: Duration, prediction: &PredictionResult) {
        self.transactions_processed.fetch_add(1, Ordering::Relaxed);
        if prediction.is_fraud {
            self.fraud_detected.fetch_add(1, Ordering::Relaxed);
        }

        {
            let mut times = self.processing_times.write();
            times.push(processing_time.as_micros() as u64);
            if times.len() > MAX_SAMPLES {
                times.drain(0..MAX_SAMPLES / 2);
            }
        }

        let bucket = (prediction.risk_score / 10.0).clamp(0.0, 9.0) as usize;
        self.score_buckets.write()[bucket] += 1;

        {
            let mut per_model = self.model_scores.write();
            for (model, score) in &prediction.model_scores {
                let entry = per_model.entry(model.clone()).or_insert((0.0, 0));
                entry.0 += score;
                entry.1 += 1;
            }
        }

        self.record_model_agreement(&prediction.model_scores);
    }

    /// Record a record that failed validation or scoring
    pub fn record_failure(&self) {
        self.failures.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a published notification
    pub fn record_alert(&self, severity: Severity) {
        *self.alerts_by_severity.write().entry(severity).or_insert(0) += 1;
    }

    /// Record model agreement for a multi-model prediction
    pub fn record_model_agreement(&self, model_scores: &BTreeMap<String, f64>) {
        let Some(agreement) = EnsembleCombiner::model_agreement(model_scores) else {
            return;
        };

        let mut agreements = self.model_agreements.write();
        agreements.push(agreement);
        if agreements.len() > MAX_SAMPLES {
            agreements.drain(0..MAX_SAMPLES / 2);
        }
    }

    /// Store the engine's latest cache statistics
    pub fn record_cache_stats(&self, stats: CacheStats) {
        *self.cache.write() = stats;
    }

    /// Get processing time statistics
    pub fn processing_stats(&self) -> ProcessingStats {
        let mut sorted = self.processing_times.read().clone();
        if sorted.is_empty() {
            return ProcessingStats::default();
        }
        sorted.sort_unstable();

        let count = sorted.len();
        let sum: u64 = sorted.iter().sum();
        let percentile = |p: f64| sorted[((count as f64 * p) as usize).min(count - 1)];

        ProcessingStats {
            count: count as u64,
            mean_us: sum / count as u64,
            p50_us: percentile(0.50),
            p95_us: percentile(0.95),
            p99_us: percentile(0.99),
            max_us: sorted[count - 1],
        }
    }

    /// Get average model agreement
    pub fn avg_agreement(&self) -> f64 {
        let agreements = self.model_agreements.read();
        if agreements.is_empty() {
            return 0.0;
        }
        agreements.iter().sum::<f64>() / agreements.len() as f64
    }

    /// Get current throughput (transactions per second)
    pub fn throughput(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.transactions_processed.load(Ordering::Relaxed) as f64 / elapsed
        } else {
            0.0
        }
    }

    pub fn score_distribution(&self) -> [u64; 10] {
        *self.score_buckets.read()
    }

    /// Mean risk score reported by each model
    pub fn model_averages(&self) -> BTreeMap<String, f64> {
        self.model_scores
            .read()
            .iter()
            .map(|(model, (sum, n))| (model.clone(), sum / *n as f64))
            .collect()
    }

    /// Point-in-time totals
    pub fn snapshot(&self) -> AnalyticsSnapshot {
        let processed = self.transactions_processed.load(Ordering::Relaxed);
        let fraud = self.fraud_detected.load(Ordering::Relaxed);
        let alerts = self.alerts_by_severity.read();

        AnalyticsSnapshot {
            transactions_processed: processed,
            fraud_detected: fraud,
            failures: self.failures.load(Ordering::Relaxed),
            fraud_rate: if processed > 0 {
                fraud as f64 / processed as f64 * 100.0
            } else {
                0.0
            },
            high_severity_alerts: alerts.get(&Severity::High).copied().unwrap_or(0),
            info_alerts: alerts.get(&Severity::Info).copied().unwrap_or(0),
            mean_processing_us: self.processing_stats().mean_us,
            model_agreement: self.avg_agreement(),
            cache_hit_ratio: self.cache.read().hit_ratio(),
        }
    }

    /// Print summary statistics
    pub fn print_summary(&self) {
        let snapshot = self.snapshot();
        let processing = self.processing_stats();
        let cache = *self.cache.read();
        let score_dist = self.score_distribution();

        info!("╔══════════════════════════════════════════════════════════════╗");
        info!("║             FRAUD SCORING ENGINE - BATCH SUMMARY             ║");
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!(
            "║ Transactions Scored:    {:>8}  │  Throughput: {:>6.1} tx/s ║",
            snapshot.transactions_processed,
            self.throughput()
        );
        info!(
            "║ Fraud Detected:         {:>8}  │  Fraud Rate: {:>6.1}%     ║",
            snapshot.fraud_detected, snapshot.fraud_rate
        );
        info!(
            "║ Failed Records:         {:>8}  │  High Alerts: {:>6}      ║",
            snapshot.failures, snapshot.high_severity_alerts
        );
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!(
            "║ Processing Time (μs): mean={:>5} p50={:>5} p95={:>5} p99={:>5} ║",
            processing.mean_us, processing.p50_us, processing.p95_us, processing.p99_us
        );
        info!(
            "║ Model Agreement: {:>5.1}%   Cache: {} hits / {} misses",
            snapshot.model_agreement * 100.0,
            cache.hits,
            cache.misses
        );
        info!("╠══════════════════════════════════════════════════════════════╣");
        info!("║ Risk Score Distribution:                                     ║");
        let total: u64 = score_dist.iter().sum();
        for (i, &count) in score_dist.iter().enumerate() {
            let pct = if total > 0 { (count as f64 / total as f64) * 100.0 } else { 0.0 };
            let bar = "█".repeat(((pct / 2.0) as usize).min(20));
            info!(
                "║   {:>3}-{:<3}: {:>6} ({:>5.1}%) {}",
                i * 10,
                (i + 1) * 10,
                count,
                pct,
                bar
            );
        }
        info!("╚══════════════════════════════════════════════════════════════╝");

        let averages = self.model_averages();
        if !averages.is_empty() {
            info!("Mean risk score per model:");
            for (model, avg) in &averages {
                info!("  {}: {:.1}", model, avg);
            }
        }
    }
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Processing time statistics
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ProcessingStats {
    pub count: u64,
    pub mean_us: u64,
    pub p50_us: u64,
    pub p95_us: u64,
    pub p99_us: u64,
    pub max_us: u64,
}

/// Totals derived from the collected metrics
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyticsSnapshot {
    pub transactions_processed: u64,
    pub fraud_detected: u64,
    pub failures: u64,
    /// Percentage of scored transactions flagged as fraud
    pub fraud_rate: f64,
    pub high_severity_alerts: u64,
    pub info_alerts: u64,
    pub mean_processing_us: u64,
    pub model_agreement: f64,
    pub cache_hit_ratio: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::prediction::ModelKind;

    fn prediction(is_fraud: bool, risk_score: f64) -> PredictionResult {
        PredictionResult::new(ModelKind::XgBoost, is_fraud, risk_score, 90.0, vec![], 0.1)
    }

    #[test]
    fn test_metrics_recording() {
        let metrics = PipelineMetrics::new();

        metrics.record_prediction(Duration::from_micros(100), &prediction(false, 15.0));
        metrics.record_prediction(Duration::from_micros(200), &prediction(true, 100.0));
        metrics.record_failure();
        metrics.record_alert(Severity::High);
        metrics.record_alert(Severity::Info);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.transactions_processed, 2);
        assert_eq!(snapshot.fraud_detected, 1);
        assert_eq!(snapshot.failures, 1);
        assert_eq!(snapshot.fraud_rate, 50.0);
        assert_eq!(snapshot.high_severity_alerts, 1);
        assert_eq!(snapshot.mean_processing_us, 150);

        let dist = metrics.score_distribution();
        assert_eq!(dist[1], 1);
        assert_eq!(dist[9], 1);
    }

    #[test]
    fn test_model_agreement() {
        let metrics = PipelineMetrics::new();

        let mut scores = BTreeMap::new();
        scores.insert("random_forest".to_string(), 80.0);
        scores.insert("xgboost".to_string(), 82.0);
        scores.insert("neural_network".to_string(), 79.0);
        metrics.record_model_agreement(&scores);

        assert!(metrics.avg_agreement() > 0.9);
    }

    #[test]
    fn test_single_model_skips_agreement() {
        let metrics = PipelineMetrics::new();
        metrics.record_prediction(Duration::from_micros(10), &prediction(false, 5.0));
        assert_eq!(metrics.avg_agreement(), 0.0);
        assert_eq!(metrics.model_averages()["xgboost"], 5.0);
    }

    #[test]
    fn test_empty_snapshot() {
        let metrics = PipelineMetrics::new();
        metrics.record_cache_stats(CacheStats {
            hits: 3,
            misses: 1,
            entries: 1,
        });

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.fraud_rate, 0.0);
        assert_eq!(snapshot.cache_hit_ratio, 0.75);
        assert_eq!(metrics.processing_stats(), ProcessingStats::default());
    }
}
