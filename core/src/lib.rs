//! incentive-core: amortization schedules and payout anomaly detection
//! over an uploaded incentive ledger.
//!
//! Both engines are synchronous and stateless. They borrow an immutable
//! `Dataset` for one call and return owned results.

pub mod anomaly_engine;
pub mod calendar;
pub mod clock;
pub mod column_selection;
pub mod config;
pub mod dataset;
pub mod dataset_store;
pub mod deviation;
pub mod error;
pub mod isolation_forest;
pub mod overview;
pub mod response;
pub mod rng;
pub mod schedule_engine;
pub mod types;

pub use anomaly_engine::{detect_anomalies, AnomalyEngine, AnomalyReport, AnomalySummary, AnomalyVerdict};
pub use config::EngineConfig;
pub use dataset::{Dataset, Value};
pub use dataset_store::DatasetStore;
pub use error::{LedgerError, LedgerResult};
pub use response::Response;
pub use schedule_engine::{
    generate_schedule, generate_schedule_batch, BatchSchedule, Installment, PaymentFrequency, Schedule,
    ScheduleEngine, ScheduleOverrides, ScheduleRequest, ScheduleSummary,
};
