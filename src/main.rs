//! Fraud Scoring Engine - Main Entry Point
//!
//! Loads a batch of transactions from JSON or CSV, scores every record,
//! publishes notifications and writes JSON/CSV reports.
//!
//! Usage: fraud-scoring [INPUT] [OUTPUT_NAME]

use anyhow::{Context, Result};
use fraud_scoring_engine::{
    config::{AppConfig, LoggingConfig, DEFAULT_CONFIG_PATH},
    consumer::TransactionConsumer,
    export::{self, AlertRow, BatchSummary, ReportData, TransactionRow},
    feature_extractor::FeatureExtractor,
    metrics::PipelineMetrics,
    models::inference::InferenceEngine,
    notifications::{NotificationCenter, NotificationSink, TracingSink},
    producer::AlertProducer,
    types::{NotificationKind, RawTransaction},
};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let mut args = std::env::args().skip(1);
    let input_arg = args.next();
    let output_arg = args.next();

    let config = if Path::new(DEFAULT_CONFIG_PATH).exists() {
        AppConfig::load()?
    } else {
        AppConfig::default()
    };

    init_tracing(&config.logging)?;
    info!("Starting Fraud Scoring Engine");

    let input = input_arg.unwrap_or_else(|| config.input.path.clone());
    let report_name = output_arg.unwrap_or_else(|| config.export.report_name.clone());

    // Initialize components
    let extractor = FeatureExtractor::new();
    info!(
        "Feature extractor initialized ({} features)",
        extractor.feature_count()
    );

    let engine = InferenceEngine::new(&config)?;
    info!(
        "Inference engine initialized with {} models: {:?}",
        engine.model_count(),
        engine.model_names()
    );

    let metrics = Arc::new(PipelineMetrics::new());
    let center = Arc::new(NotificationCenter::new(config.notifications.max_retained));
    {
        let metrics = metrics.clone();
        center.subscribe(move |notification| {
            if notification.kind != NotificationKind::Error {
                metrics.record_alert(notification.severity);
            }
            TracingSink.publish(notification.clone());
        });
    }
    let producer =
        AlertProducer::with_threshold(center.clone(), config.detection.high_severity_threshold);

    let records = TransactionConsumer::load(&input)
        .with_context(|| format!("Failed to load transactions from {}", input))?;
    info!(records = records.len(), input = %input, "Scoring batch");

    let batch_start = Instant::now();
    let mut rows = Vec::with_capacity(records.len());
    let mut labels = Vec::with_capacity(records.len());
    let mut alerts = Vec::new();

    for loaded in &records {
        let record = match loaded {
            Ok(record) => record,
            Err(malformed) => {
                let transaction_id = malformed.transaction_id();
                metrics.record_failure();
                warn!(transaction_id = %transaction_id, error = %malformed, "Malformed record");

                let notification = producer.publish_failure(&transaction_id, malformed);
                alerts.push(AlertRow::from(&notification));

                rows.push(TransactionRow::pending(
                    &transaction_id,
                    0.0,
                    String::new(),
                    String::new(),
                ));
                labels.push(None);
                continue;
            }
        };

        let start = Instant::now();
        let row = match score(&extractor, &engine, record) {
            Ok(prediction) => {
                let processing_time = start.elapsed();
                metrics.record_prediction(processing_time, &prediction);

                let notification = producer.publish_prediction(&record.id, &prediction);
                if prediction.is_fraud {
                    alerts.push(AlertRow::from(&notification));
                }

                debug!(
                    transaction_id = %record.id,
                    is_fraud = prediction.is_fraud,
                    risk_score = prediction.risk_score,
                    processing_time_us = processing_time.as_micros(),
                    "Transaction scored"
                );

                let (merchant, timestamp) = display_fields(record);
                TransactionRow::scored(&record.id, record.amount, merchant, timestamp, &prediction)
            }
            Err(e) => {
                metrics.record_failure();
                warn!(transaction_id = %record.id, error = %e, "Transaction could not be scored");

                let notification = producer.publish_failure(&record.id, &e);
                alerts.push(AlertRow::from(&notification));

                let (merchant, timestamp) = display_fields(record);
                TransactionRow::pending(&record.id, record.amount, merchant, timestamp)
            }
        };
        rows.push(row);
        labels.push(record.label);
    }

    let elapsed_ms = batch_start.elapsed().as_secs_f64() * 1000.0;
    metrics.record_cache_stats(engine.cache_stats());
    metrics.print_summary();

    let summary = BatchSummary::from_rows(&rows, &labels, elapsed_ms);
    info!(
        total = summary.total_processed,
        fraudulent = summary.fraudulent,
        legitimate = summary.legitimate,
        pending = summary.pending,
        avg_confidence = format!("{:.1}", summary.avg_confidence),
        accuracy = format!("{:.1}", summary.accuracy),
        "Batch complete"
    );

    if rows.is_empty() {
        warn!("Batch was empty, writing metrics-only report");
    }
    let report = ReportData::new(rows, alerts, summary.metrics(), config.export.report_type);
    let written = export::write_report(&config.export.output_dir, &report_name, &report)?;
    for path in &written {
        info!(path = %path.display(), "Report file written");
    }

    info!("Fraud Scoring Engine finished");
    Ok(())
}

fn init_tracing(logging: &LoggingConfig) -> Result<()> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(format!(
            "fraud_scoring_engine={0},fraud_scoring={0}",
            logging.level
        ))
        .context("Invalid logging.level")?,
    };

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if logging.format == "json" {
        builder.json().init();
    } else {
        builder.init();
    }
    Ok(())
}

/// Validate and score one record
fn score(
    extractor: &FeatureExtractor,
    engine: &InferenceEngine,
    record: &RawTransaction,
) -> Result<fraud_scoring_engine::PredictionResult> {
    let features = extractor.extract(record)?;
    Ok(engine.predict(&record.id, &features)?)
}

fn display_fields(record: &RawTransaction) -> (String, String) {
    let merchant = record
        .merchant
        .clone()
        .unwrap_or_else(|| record.merchant_category.clone());
    (merchant, record.timestamp.clone().unwrap_or_default())
}
