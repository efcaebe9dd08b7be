//! Anomaly engine: column choice, cleaning, fusion of the two signals.

mod common;

use common::{amounts, init_logging};
use incentive_core::{
    anomaly_engine::{detect_anomalies, AnomalyEngine},
    config::AnomalyConfig,
    dataset::{Dataset, Value},
    isolation_forest::{CancelFlag, FitBudget},
    response::Response,
    LedgerError,
};
use std::time::{Duration, Instant};

/// 30 ordinary payouts around 100-106 with one row at 100x the median.
fn payouts_with_spike() -> (Vec<f64>, usize) {
    let mut values: Vec<f64> = (0..30).map(|i| 100.0 + (i % 7) as f64).collect();
    let mut sorted = values.clone();
    sorted.sort_by(f64::total_cmp);
    let median = (sorted[14] + sorted[15]) / 2.0;
    values.insert(17, median * 100.0);
    (values, 17)
}

#[test]
fn spike_at_hundred_times_median_is_flagged() {
    init_logging();
    let (values, spike) = payouts_with_spike();
    let report = detect_anomalies(&amounts("payout", &values)).unwrap();

    let v = &report.verdicts[spike];
    assert!(v.flagged);
    assert!(v.z_score > 3.0, "z = {}", v.z_score);
    assert!(v.deviation_flagged);
    assert!(v.outlier_score > 0.0, "forest should isolate the spike: {}", v.outlier_score);
    assert_eq!(report.summary.amount_column, "payout");
    assert_eq!(report.summary.total_rows, values.len());
}

#[test]
fn spike_has_the_highest_outlier_score() {
    let (values, spike) = payouts_with_spike();
    let report = detect_anomalies(&amounts("amount", &values)).unwrap();
    let top = report
        .verdicts
        .iter()
        .max_by(|a, b| a.outlier_score.total_cmp(&b.outlier_score))
        .unwrap();
    assert_eq!(top.row_index, spike);
}

#[test]
fn constant_column_flags_nothing() {
    let report = detect_anomalies(&amounts("incentive", &[250.0; 25])).unwrap();
    assert_eq!(report.summary.anomalies_detected, 0);
    assert!(report.verdicts.iter().all(|v| v.z_score == 0.0 && !v.flagged));
}

#[test]
fn flag_is_union_of_both_signals() {
    let (values, _) = payouts_with_spike();
    let report = detect_anomalies(&amounts("payment", &values)).unwrap();

    for v in &report.verdicts {
        assert_eq!(v.flagged, v.model_flagged || v.deviation_flagged);
        assert_eq!(v.model_flagged, v.outlier_score > 0.0);
        assert_eq!(v.deviation_flagged, v.z_score > 3.0);
    }
    assert_eq!(report.summary.anomalies_detected, report.flagged().count());
    assert_eq!(report.summary.model_flags, report.verdicts.iter().filter(|v| v.model_flagged).count());
}

#[test]
fn forest_flags_about_the_contamination_share() {
    let values: Vec<f64> = (0..100).map(|i| 1000.0 + i as f64 * 3.0).collect();
    let report = detect_anomalies(&amounts("amount", &values)).unwrap();
    assert!(report.summary.model_flags <= 2, "got {}", report.summary.model_flags);
    assert_eq!(report.summary.deviation_flags, 0);
}

#[test]
fn selects_numeric_keyword_column_over_text_one() {
    let ds = Dataset::new(
        vec!["id".into(), "notes".into(), "payment_notes".into(), "payout_amount".into()],
        (0..20)
            .map(|i| {
                vec![
                    Value::Number(i as f64),
                    Value::text("ok"),
                    Value::text("see ticket"),
                    Value::Number(500.0 + i as f64),
                ]
            })
            .collect(),
    )
    .unwrap();
    let report = detect_anomalies(&ds).unwrap();
    assert_eq!(report.summary.amount_column, "payout_amount");
}

#[test]
fn falls_back_to_first_numeric_column() {
    let ds = Dataset::new(
        vec!["region".into(), "units".into()],
        (0..10).map(|i| vec![Value::text("north"), Value::Number(i as f64)]).collect(),
    )
    .unwrap();
    assert_eq!(detect_anomalies(&ds).unwrap().summary.amount_column, "units");
}

#[test]
fn no_numeric_column_is_reported() {
    let ds = Dataset::new(vec!["name".into()], vec![vec![Value::text("x")]]).unwrap();
    assert!(matches!(detect_anomalies(&ds), Err(LedgerError::NoNumericColumn)));
}

#[test]
fn uncoercible_rows_are_dropped_and_reindexed() {
    let ds = Dataset::new(
        vec!["payout".into()],
        vec![
            vec![Value::Number(10.0)],
            vec![Value::Null],
            vec![Value::text("11")],
            vec![Value::Null],
            vec![Value::Number(12.0)],
        ],
    )
    .unwrap();
    let report = detect_anomalies(&ds).unwrap();

    assert_eq!(report.summary.total_rows, 3);
    assert_eq!(report.summary.dropped_rows, 2);
    let index: Vec<_> = report.verdicts.iter().map(|v| (v.row_index, v.source_row)).collect();
    assert_eq!(index, vec![(0, 0), (1, 2), (2, 4)]);
    assert_eq!(report.verdicts[1].value, 11.0);
}

#[test]
fn empty_after_cleaning_is_insufficient() {
    let ds = Dataset::new(vec!["amount".into()], vec![vec![Value::Null]; 4]).unwrap();
    assert!(matches!(detect_anomalies(&ds), Err(LedgerError::InsufficientData { .. })));
}

#[test]
fn single_row_is_insufficient() {
    assert!(matches!(
        detect_anomalies(&amounts("amount", &[42.0])),
        Err(LedgerError::InsufficientData { .. })
    ));
}

#[test]
fn expired_deadline_aborts_fit() {
    let (values, _) = payouts_with_spike();
    let engine = AnomalyEngine::new(AnomalyConfig::default())
        .with_budget(FitBudget::unlimited().with_deadline(Instant::now()));
    let err = engine.detect(&amounts("amount", &values)).unwrap_err();
    assert!(matches!(err, LedgerError::FitAborted { .. }));
}

#[test]
fn deadline_bounds_scoring_of_large_ledgers() {
    let values: Vec<f64> = (0..200_000).map(|i| 100.0 + (i % 997) as f64).collect();
    let ds = amounts("payout", &values);

    let started = Instant::now();
    let engine = AnomalyEngine::new(AnomalyConfig::default())
        .with_budget(FitBudget::unlimited().with_deadline(started + Duration::from_millis(50)));
    let err = engine.detect(&ds).unwrap_err();
    let took = started.elapsed();

    assert!(matches!(err, LedgerError::FitAborted { .. }), "got {err:?}");
    assert!(took < Duration::from_secs(3), "deadline overrun: {took:?}");
}

#[test]
fn cancelled_flag_aborts_fit() {
    let flag = CancelFlag::new();
    let engine = AnomalyEngine::new(AnomalyConfig::default())
        .with_budget(FitBudget::unlimited().with_cancel(flag.clone()));
    flag.cancel();
    let err = engine.detect(&amounts("amount", &[1.0, 2.0, 3.0])).unwrap_err();
    assert!(matches!(err, LedgerError::FitAborted { .. }));
}

#[test]
fn report_serializes_with_status() {
    let (values, spike) = payouts_with_spike();
    let resp = Response::from(detect_anomalies(&amounts("payout", &values)));
    let json = serde_json::to_value(&resp).unwrap();

    assert_eq!(json["status"], "success");
    assert_eq!(json["summary"]["amount_column"], "payout");
    assert_eq!(json["summary"]["total_rows"], values.len());
    assert_eq!(json["verdicts"][spike]["flagged"], true);
    assert_eq!(json["verdicts"][spike]["row_index"], spike);
}
