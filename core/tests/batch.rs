//! Schedule engine batch mode: caller order, silent skips, shared overrides.

mod common;

use common::{date, payee_ledger};
use incentive_core::{
    clock::FixedClock,
    config::ScheduleConfig,
    schedule_engine::{generate_schedule_batch, PaymentFrequency, ScheduleEngine, ScheduleOverrides},
    LedgerError,
};

fn ids(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

fn engine() -> ScheduleEngine<FixedClock> {
    ScheduleEngine::new(ScheduleConfig::default()).with_clock(FixedClock(date(2025, 1, 1)))
}

#[test]
fn unknown_payee_is_skipped_not_failed() {
    let batch = generate_schedule_batch(
        &ids(&["1001", "ghost"]),
        &ScheduleOverrides::default(),
        &payee_ledger(),
    )
    .unwrap();

    assert_eq!(batch.results.len(), 1);
    assert_eq!(batch.results[0].payee_id, "1001");
    assert_eq!(batch.skipped, vec!["ghost".to_string()]);
}

#[test]
fn results_follow_caller_order() {
    let batch = engine()
        .generate_batch(&ids(&["1003", "P-2", "1001"]), &ScheduleOverrides::default(), &payee_ledger())
        .unwrap();
    let order: Vec<&str> = batch.results.iter().map(|e| e.payee_id.as_str()).collect();
    assert_eq!(order, vec!["1003", "P-2", "1001"]);
}

#[test]
fn overrides_apply_to_every_payee_but_totals_come_from_records() {
    let overrides = ScheduleOverrides {
        cap_percent: Some(50.0),
        term_months: Some(6),
        start_date:  Some(date(2024, 7, 1)),
        frequency:   Some(PaymentFrequency::Quarterly),
    };
    let batch = engine()
        .generate_batch(&ids(&["1001", "P-2"]), &overrides, &payee_ledger())
        .unwrap();

    let first = &batch.results[0].schedule;
    assert_eq!(first.summary.total_incentive, 1200.0);
    assert_eq!(first.installments.len(), 2);
    assert_eq!(first.installments[0].amount, 300.0);
    assert_eq!(first.installments[1].date, date(2024, 10, 1));

    let second = &batch.results[1].schedule;
    assert_eq!(second.summary.total_incentive, 6000.0);
    assert_eq!(second.installments[0].amount, 1500.0);
}

#[test]
fn duplicate_ids_are_scheduled_once() {
    let batch = engine()
        .generate_batch(&ids(&["1001", " 1001 ", "1001"]), &ScheduleOverrides::default(), &payee_ledger())
        .unwrap();
    assert_eq!(batch.results.len(), 1);
    assert!(batch.skipped.is_empty());
}

#[test]
fn invalid_shared_term_fails_the_batch() {
    let overrides = ScheduleOverrides { term_months: Some(0), ..ScheduleOverrides::default() };
    let err = engine()
        .generate_batch(&ids(&["1001", "P-2"]), &overrides, &payee_ledger())
        .unwrap_err();
    assert!(matches!(err, LedgerError::InvalidTerm { .. }));
}

#[test]
fn empty_batch_is_empty() {
    let batch = engine()
        .generate_batch(&[], &ScheduleOverrides::default(), &payee_ledger())
        .unwrap();
    assert!(batch.results.is_empty());
    assert!(batch.skipped.is_empty());
}
