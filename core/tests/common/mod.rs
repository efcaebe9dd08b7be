//! Shared fixtures for the integration tests.
#![allow(dead_code)]

use chrono::NaiveDate;
use incentive_core::dataset::{Dataset, Value};

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).expect("valid date")
}

/// Payee ledger with the column names the engines default to.
pub fn payee_ledger() -> Dataset {
    let cols = ["Payee ID", "Name", "Total Incentive", "Cap %", "Term", "Payment Start Date"];
    Dataset::new(
        cols.iter().map(|c| c.to_string()).collect(),
        vec![
            vec![1001.0.into(), "Ada".into(), 1200.0.into(), 100.0.into(), 12.0.into(), "2024-01-01".into()],
            vec!["P-2".into(), "Ben".into(), 6000.0.into(), 50.0.into(), 6.0.into(), "2024-03-31".into()],
            vec![1003.0.into(), "Cy".into(), 1000.0.into(), Value::Null, Value::Null, Value::Null],
            vec![1001.0.into(), "Ada (dup)".into(), 9999.0.into(), 10.0.into(), 3.0.into(), "2030-01-01".into()],
        ],
    )
    .expect("fixture ledger")
}

/// A single amount column named `column`.
pub fn amounts(column: &str, values: &[f64]) -> Dataset {
    Dataset::new(
        vec![column.to_string()],
        values.iter().map(|&v| vec![Value::Number(v)]).collect(),
    )
    .expect("amount ledger")
}
