//! Report export in the JSON and CSV shapes consumed by dashboards

use crate::types::alert::{Notification, NotificationKind, Severity};
use crate::types::prediction::PredictionResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

/// CSV header row for transaction exports
pub const CSV_HEADER: &str = "ID,Amount,Merchant,Timestamp,Status,Confidence";

#[derive(Debug, Error)]
pub enum ExportError {
    #[error("nothing to export: dataset is empty")]
    EmptyDataset,

    #[error("failed to serialize report: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Reporting period of an exported report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportType {
    #[default]
    Daily,
    Weekly,
    Monthly,
}

/// Final disposition of a transaction in a report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Fraudulent,
    Legitimate,
    /// Could not be scored
    Pending,
}

impl TransactionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionStatus::Fraudulent => "fraudulent",
            TransactionStatus::Legitimate => "legitimate",
            TransactionStatus::Pending => "pending",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionRow {
    pub id: String,
    pub amount: f64,
    pub merchant: String,
    pub timestamp: String,
    pub status: TransactionStatus,
    pub confidence: f64,
}

impl TransactionRow {
    /// Row for a scored transaction
    pub fn scored(
        id: impl Into<String>,
        amount: f64,
        merchant: impl Into<String>,
        timestamp: impl Into<String>,
        prediction: &PredictionResult,
    ) -> Self {
        let status = if prediction.is_fraud {
            TransactionStatus::Fraudulent
        } else {
            TransactionStatus::Legitimate
        };
        Self {
            id: id.into(),
            amount,
            merchant: merchant.into(),
            timestamp: timestamp.into(),
            status,
            confidence: prediction.confidence,
        }
    }

    /// Row for a transaction that failed validation or scoring
    pub fn pending(
        id: impl Into<String>,
        amount: f64,
        merchant: impl Into<String>,
        timestamp: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            amount,
            merchant: merchant.into(),
            timestamp: timestamp.into(),
            status: TransactionStatus::Pending,
            confidence: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertSeverity {
    Critical,
    Warning,
    Info,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertRow {
    pub id: String,
    #[serde(rename = "type")]
    pub alert_type: String,
    pub message: String,
    pub severity: AlertSeverity,
}

impl From<&Notification> for AlertRow {
    fn from(notification: &Notification) -> Self {
        let severity = match (notification.kind, notification.severity) {
            (_, Severity::High) => AlertSeverity::Critical,
            (NotificationKind::Error | NotificationKind::Warning, _) => AlertSeverity::Warning,
            _ => AlertSeverity::Info,
        };
        let alert_type = match notification.kind {
            NotificationKind::Success => "success",
            NotificationKind::Error => "error",
            NotificationKind::Warning => "warning",
            NotificationKind::Info => "info",
        };
        Self {
            id: notification.id.clone(),
            alert_type: alert_type.to_string(),
            message: format!("{}: {}", notification.title, notification.message),
            severity,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportMetrics {
    pub total_transactions: u64,
    pub fraud_detected: u64,
    pub accuracy: f64,
    pub precision: f64,
    pub recall: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DateRange {
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportMetadata {
    pub generated_at: DateTime<Utc>,
    pub date_range: DateRange,
    pub report_type: ReportType,
}

/// Complete exported report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportData {
    pub transactions: Vec<TransactionRow>,
    pub alerts: Vec<AlertRow>,
    pub metrics: ReportMetrics,
    pub metadata: ReportMetadata,
}

impl ReportData {
    /// Assemble a report generated now. The date range spans the smallest and
    /// largest row timestamps, compared as strings.
    pub fn new(
        transactions: Vec<TransactionRow>,
        alerts: Vec<AlertRow>,
        metrics: ReportMetrics,
        report_type: ReportType,
    ) -> Self {
        let stamps = transactions
            .iter()
            .map(|t| t.timestamp.as_str())
            .filter(|t| !t.is_empty());
        let date_range = DateRange {
            from: stamps.clone().min().unwrap_or_default().to_string(),
            to: stamps.max().unwrap_or_default().to_string(),
        };

        Self {
            transactions,
            alerts,
            metrics,
            metadata: ReportMetadata {
                generated_at: Utc::now(),
                date_range,
                report_type,
            },
        }
    }
}

/// Totals of one processed batch
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchSummary {
    pub total_processed: u64,
    pub fraudulent: u64,
    pub legitimate: u64,
    pub pending: u64,
    /// Mean confidence over scored transactions
    pub avg_confidence: f64,
    /// Percentage of labelled transactions classified correctly
    pub accuracy: f64,
    pub processing_time_ms: f64,
}

impl BatchSummary {
    /// Build the summary from report rows, using `labels` (aligned with
    /// `rows`) to measure accuracy where a ground truth is known.
    pub fn from_rows(
        rows: &[TransactionRow],
        labels: &[Option<bool>],
        processing_time_ms: f64,
    ) -> Self {
        let mut summary = Self {
            total_processed: rows.len() as u64,
            processing_time_ms,
            ..Self::default()
        };

        let mut confidence_sum = 0.0;
        let mut labelled = 0u64;
        let mut correct = 0u64;

        for (i, row) in rows.iter().enumerate() {
            let predicted = match row.status {
                TransactionStatus::Fraudulent => {
                    summary.fraudulent += 1;
                    true
                }
                TransactionStatus::Legitimate => {
                    summary.legitimate += 1;
                    false
                }
                TransactionStatus::Pending => {
                    summary.pending += 1;
                    continue;
                }
            };
            confidence_sum += row.confidence;

            if let Some(Some(actual)) = labels.get(i) {
                labelled += 1;
                if *actual == predicted {
                    correct += 1;
                }
            }
        }

        let scored = summary.fraudulent + summary.legitimate;
        if scored > 0 {
            summary.avg_confidence = confidence_sum / scored as f64;
        }
        summary.accuracy = percentage(correct, labelled);
        summary
    }

    /// Transactions needing review: detected fraud plus unscored ones
    pub fn flagged(&self) -> u64 {
        self.fraudulent + self.pending
    }

    pub fn metrics(&self) -> ReportMetrics {
        ReportMetrics {
            total_transactions: self.total_processed,
            fraud_detected: self.fraudulent,
            accuracy: self.accuracy,
            precision: percentage(self.fraudulent, self.flagged()),
            recall: percentage(self.fraudulent, self.total_processed),
        }
    }

    /// Metrics-only report of this batch
    pub fn to_report(&self, report_type: ReportType) -> ReportData {
        ReportData::new(Vec::new(), Vec::new(), self.metrics(), report_type)
    }
}

fn percentage(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

/// Serialize a report as pretty-printed JSON
pub fn to_json(report: &ReportData) -> Result<String, ExportError> {
    Ok(serde_json::to_string_pretty(report)?)
}

/// Render transaction rows as CSV with every value double-quoted
pub fn to_csv(rows: &[TransactionRow]) -> Result<String, ExportError> {
    if rows.is_empty() {
        return Err(ExportError::EmptyDataset);
    }

    let mut out = String::with_capacity(CSV_HEADER.len() + rows.len() * 64);
    out.push_str(CSV_HEADER);
    out.push('\n');

    for row in rows {
        let cells = [
            row.id.clone(),
            row.amount.to_string(),
            row.merchant.clone(),
            row.timestamp.clone(),
            row.status.as_str().to_string(),
            row.confidence.to_string(),
        ];
        let line = cells.iter().map(|c| quote(c)).collect::<Vec<_>>().join(",");
        // Writing to a String cannot fail
        let _ = writeln!(out, "{}", line);
    }

    Ok(out)
}

fn quote(cell: &str) -> String {
    format!("\"{}\"", cell.replace('"', "\"\""))
}

/// Write `<name>.json` and, when there are transaction rows, `<name>.csv`
/// into `dir`. Returns the paths written.
pub fn write_report(
    dir: impl AsRef<Path>,
    name: &str,
    report: &ReportData,
) -> Result<Vec<PathBuf>, ExportError> {
    let dir = dir.as_ref();
    fs::create_dir_all(dir).map_err(|source| ExportError::Io {
        path: dir.to_path_buf(),
        source,
    })?;

    let mut written = Vec::with_capacity(2);

    let json_path = dir.join(format!("{}.json", name));
    write_file(&json_path, &to_json(report)?)?;
    written.push(json_path);

    match to_csv(&report.transactions) {
        Ok(csv) => {
            let csv_path = dir.join(format!("{}.csv", name));
            write_file(&csv_path, &csv)?;
            written.push(csv_path);
        }
        Err(ExportError::EmptyDataset) => {
            info!(report = %name, "No transaction rows, skipping CSV export");
        }
        Err(e) => return Err(e),
    }

    info!(
        report = %name,
        files = written.len(),
        transactions = report.transactions.len(),
        "Report written"
    );
    Ok(written)
}

fn write_file(path: &Path, contents: &str) -> Result<(), ExportError> {
    fs::write(path, contents).map_err(|source| ExportError::Io {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::prediction::ModelKind;

    fn row(id: &str, status: TransactionStatus, confidence: f64) -> TransactionRow {
        TransactionRow {
            id: id.to_string(),
            amount: 100.0,
            merchant: "Acme".to_string(),
            timestamp: "2024-01-01T00:00:00Z".to_string(),
            status,
            confidence,
        }
    }

    #[test]
    fn test_single_row_csv() {
        let csv = to_csv(&[row("TXN-1", TransactionStatus::Legitimate, 98.5)]).unwrap();
        let lines: Vec<&str> = csv.lines().collect();

        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], "ID,Amount,Merchant,Timestamp,Status,Confidence");
        assert_eq!(
            lines[1],
            r#""TXN-1","100","Acme","2024-01-01T00:00:00Z","legitimate","98.5""#
        );
    }

    #[test]
    fn test_csv_escapes_quotes() {
        let mut r = row("TXN-2", TransactionStatus::Fraudulent, 90.0);
        r.merchant = "Bob's \"Best\" Deals, Inc".to_string();

        let csv = to_csv(&[r]).unwrap();
        assert!(csv.contains(r#""Bob's ""Best"" Deals, Inc""#));
    }

    #[test]
    fn test_empty_csv_is_an_error() {
        assert!(matches!(to_csv(&[]), Err(ExportError::EmptyDataset)));
    }

    #[test]
    fn test_json_shape() {
        let report = ReportData::new(
            vec![row("TXN-1", TransactionStatus::Legitimate, 98.5)],
            Vec::new(),
            ReportMetrics::default(),
            ReportType::Weekly,
        );
        let value: serde_json::Value = serde_json::from_str(&to_json(&report).unwrap()).unwrap();

        assert_eq!(value["transactions"][0]["status"], "legitimate");
        assert_eq!(value["metrics"]["totalTransactions"], 0);
        assert_eq!(value["metadata"]["reportType"], "weekly");
        assert_eq!(value["metadata"]["dateRange"]["from"], "2024-01-01T00:00:00Z");
        assert!(value["metadata"]["generatedAt"].is_string());
    }

    #[test]
    fn test_alert_row_from_notification() {
        let n = Notification::new(NotificationKind::Error, Severity::High, "Fraud Detected", "x");
        let alert = AlertRow::from(&n);
        assert_eq!(alert.severity, AlertSeverity::Critical);
        assert_eq!(alert.alert_type, "error");

        let json = serde_json::to_value(&alert).unwrap();
        assert_eq!(json["type"], "error");
        assert_eq!(json["severity"], "critical");
    }

    #[test]
    fn test_batch_summary_metrics() {
        let rows = vec![
            row("A", TransactionStatus::Fraudulent, 90.0),
            row("B", TransactionStatus::Fraudulent, 80.0),
            row("C", TransactionStatus::Legitimate, 70.0),
            row("D", TransactionStatus::Pending, 0.0),
        ];
        let labels = vec![Some(true), Some(false), Some(false), Some(true)];

        let summary = BatchSummary::from_rows(&rows, &labels, 12.0);
        assert_eq!(summary.total_processed, 4);
        assert_eq!(summary.fraudulent, 2);
        assert_eq!(summary.pending, 1);
        assert_eq!(summary.flagged(), 3);
        assert_eq!(summary.avg_confidence, 80.0);

        let metrics = summary.metrics();
        assert_eq!(metrics.recall, 50.0);
        assert!((metrics.precision - 200.0 / 3.0).abs() < 1e-9);
        assert!((metrics.accuracy - 200.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_batch_has_zero_ratios() {
        let metrics = BatchSummary::from_rows(&[], &[], 0.0).metrics();
        assert_eq!(metrics.precision, 0.0);
        assert_eq!(metrics.recall, 0.0);
        assert_eq!(metrics.accuracy, 0.0);
    }

    #[test]
    fn test_scored_row_status() {
        let prediction =
            PredictionResult::new(ModelKind::RandomForest, true, 80.0, 95.0, vec![], 0.1);
        let r = TransactionRow::scored("TXN-1", 10.0, "Acme", "", &prediction);
        assert_eq!(r.status, TransactionStatus::Fraudulent);
        assert_eq!(r.confidence, 95.0);
    }

    #[test]
    fn test_write_report() {
        let dir = tempfile::tempdir().unwrap();
        let report = ReportData::new(
            vec![row("TXN-1", TransactionStatus::Legitimate, 98.5)],
            Vec::new(),
            ReportMetrics::default(),
            ReportType::Daily,
        );

        let written = write_report(dir.path(), "daily", &report).unwrap();
        assert_eq!(written.len(), 2);
        assert!(dir.path().join("daily.json").exists());
        let csv = fs::read_to_string(dir.path().join("daily.csv")).unwrap();
        assert!(csv.starts_with(CSV_HEADER));

        let metrics_only = BatchSummary::default().to_report(ReportType::Daily);
        let written = write_report(dir.path(), "summary", &metrics_only).unwrap();
        assert_eq!(written.len(), 1);
    }
}
