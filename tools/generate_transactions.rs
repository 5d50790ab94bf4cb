//! Test Transaction Generator
//!
//! Writes a batch of synthetic transactions for exercising the scoring engine.
//!
//! Usage: generate-transactions [OUTPUT] [COUNT] [FRAUD_RATE]

use anyhow::Context;
use chrono::{Duration, Utc};
use fraud_scoring_engine::types::{is_weekend_day, RawTransaction};
use rand::Rng;
use std::fs;
use std::path::Path;
use tracing::info;

const UNUSUAL_HOURS: &[u8] = &[0, 2, 3, 22, 23];
const MERCHANTS: &[&str] = &["Acme Market", "Skyways", "Lucky Spins", "Night Owl", "Corner Cafe"];

/// Transaction generator for testing
struct TransactionGenerator {
    rng: rand::rngs::ThreadRng,
    transaction_counter: u64,
}

impl TransactionGenerator {
    fn new() -> Self {
        Self {
            rng: rand::thread_rng(),
            transaction_counter: 0,
        }
    }

    /// Generate a random legitimate-looking transaction
    fn generate_legitimate(&mut self) -> RawTransaction {
        let day_of_week = self.rng.gen_range(0..7u8);
        let mut tx = self.base(day_of_week, false);
        tx.amount = round2(self.rng.gen_range(10.0..500.0));
        tx.location = "domestic".to_string();
        tx.device_type = self.random_choice(&["known", "known", "mobile"]).to_string();
        tx.merchant_category = self.random_choice(&["retail", "travel", "other"]).to_string();
        tx.time_of_day = self.rng.gen_range(8..21) as f64;
        tx.transaction_frequency = self.rng.gen_range(0..6) as f64;
        tx.customer_age = self.rng.gen_range(25..70) as f64;
        tx
    }

    /// Generate a suspicious/fraudulent transaction
    fn generate_suspicious(&mut self) -> RawTransaction {
        let day_of_week = self.rng.gen_range(0..7u8);
        let mut tx = self.base(day_of_week, true);
        tx.amount = round2(self.rng.gen_range(1000.0..15000.0));
        tx.location = self.random_choice(&["international", "unknown"]).to_string();
        tx.device_type = self.random_choice(&["new", "mobile"]).to_string();
        tx.merchant_category = self.random_choice(&["gambling", "adult"]).to_string();
        tx.time_of_day = f64::from(UNUSUAL_HOURS[self.rng.gen_range(0..UNUSUAL_HOURS.len())]);
        tx.transaction_frequency = self.rng.gen_range(10..30) as f64;
        tx.customer_age = self.rng.gen_range(18..25) as f64;
        tx.previous_fraud_flag = self.rng.gen_bool(0.5);
        tx
    }

    fn base(&mut self, day_of_week: u8, label: bool) -> RawTransaction {
        self.transaction_counter += 1;
        let offset = Duration::minutes(self.rng.gen_range(0..60 * 24 * 7));
        let merchant = self.random_choice(MERCHANTS).to_string();

        RawTransaction {
            id: format!("TXN-{:06}", self.transaction_counter),
            amount: 0.0,
            location: String::new(),
            device_type: String::new(),
            merchant_category: String::new(),
            time_of_day: 0.0,
            day_of_week: day_of_week as f64,
            is_weekend: Some(is_weekend_day(day_of_week)),
            transaction_frequency: 0.0,
            customer_age: 0.0,
            previous_fraud_flag: false,
            merchant: Some(merchant),
            timestamp: Some((Utc::now() - offset).to_rfc3339()),
            label: Some(label),
        }
    }

    fn random_choice<'a>(&mut self, choices: &[&'a str]) -> &'a str {
        choices[self.rng.gen_range(0..choices.len())]
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn to_csv(transactions: &[RawTransaction]) -> String {
    let mut out = String::from(
        "id,amount,location,deviceType,merchantCategory,timeOfDay,dayOfWeek,isWeekend,\
         transactionFrequency,customerAge,previousFraudFlag,merchant,timestamp,label\n",
    );
    for tx in transactions {
        out.push_str(&format!(
            "{},{},{},{},{},{},{},{},{},{},{},\"{}\",{},{}\n",
            tx.id,
            tx.amount,
            tx.location,
            tx.device_type,
            tx.merchant_category,
            tx.time_of_day,
            tx.day_of_week,
            tx.is_weekend.unwrap_or_default(),
            tx.transaction_frequency,
            tx.customer_age,
            tx.previous_fraud_flag,
            tx.merchant.as_deref().unwrap_or_default(),
            tx.timestamp.as_deref().unwrap_or_default(),
            tx.label.unwrap_or_default(),
        ));
    }
    out
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("generate_transactions=info".parse()?),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    let output = args
        .get(1)
        .map(|s| s.as_str())
        .unwrap_or("data/transactions.json");
    let count: u64 = args.get(2).and_then(|s| s.parse().ok()).unwrap_or(100);
    let fraud_rate: f64 = args
        .get(3)
        .and_then(|s| s.parse::<f64>().ok())
        .unwrap_or(0.1)
        .clamp(0.0, 1.0);

    info!(output = %output, count, fraud_rate, "Generating transactions");

    let mut generator = TransactionGenerator::new();
    let mut rng = rand::thread_rng();
    let mut suspicious_count = 0;

    let transactions: Vec<RawTransaction> = (0..count)
        .map(|_| {
            if rng.gen_bool(fraud_rate) {
                suspicious_count += 1;
                generator.generate_suspicious()
            } else {
                generator.generate_legitimate()
            }
        })
        .collect();

    let path = Path::new(output);
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }

    let contents = if output.ends_with(".csv") {
        to_csv(&transactions)
    } else {
        serde_json::to_string_pretty(&transactions)?
    };
    fs::write(path, contents).with_context(|| format!("Failed to write {}", output))?;

    info!(
        "Completed! Wrote {} transactions ({} legitimate, {} suspicious) to {}",
        count,
        count - suspicious_count,
        suspicious_count,
        output
    );

    Ok(())
}
