//! Schedule engine: projects a lump incentive into periodic installments.
//!
//! This engine:
//!   1. Looks up the payee by stringified identifier (first matching row wins)
//!   2. Resolves each input: request value → recorded column → engine default
//!   3. Splits the capped total evenly over whole periods of the term
//!   4. Dates each installment by calendar-month steps from the start date
//!
//! Amounts are rounded half away from zero to cents per installment.
//! The summary's total payout is the sum of the rounded installments,
//! so it can differ from the capped total by up to half a cent per period.

use crate::{
    calendar,
    clock::{Clock, SystemClock},
    config::ScheduleConfig,
    dataset::{Dataset, PayeeRecord},
    error::{LedgerError, LedgerResult},
    types::{Amount, PayeeId},
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::str::FromStr;

// ── Frequency ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PaymentFrequency {
    #[default]
    #[serde(alias = "Monthly")]
    Monthly,
    #[serde(alias = "Quarterly")]
    Quarterly,
    #[serde(alias = "Semi-Annually", alias = "semi_annually")]
    SemiAnnual,
    #[serde(alias = "Annually", alias = "annually")]
    Annual,
}

impl PaymentFrequency {
    /// Whole calendar months per period.
    pub fn months(self) -> u32 {
        match self {
            Self::Monthly    => 1,
            Self::Quarterly  => 3,
            Self::SemiAnnual => 6,
            Self::Annual     => 12,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Monthly    => "Monthly",
            Self::Quarterly  => "Quarterly",
            Self::SemiAnnual => "Semi-Annually",
            Self::Annual     => "Annually",
        }
    }
}

impl FromStr for PaymentFrequency {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "monthly"                        => Ok(Self::Monthly),
            "quarterly"                      => Ok(Self::Quarterly),
            "semi_annual" | "semi_annually"  => Ok(Self::SemiAnnual),
            "annual" | "annually"            => Ok(Self::Annual),
            _ => Err(LedgerError::InvalidValue {
                column: "frequency".into(),
                value:  s.to_string(),
            }),
        }
    }
}

// ── Requests ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ScheduleRequest {
    pub payee_id: PayeeId,
    #[serde(default)]
    pub total_incentive: Option<Amount>,
    #[serde(default)]
    pub cap_percent: Option<f64>,
    #[serde(default)]
    pub term_months: Option<i64>,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub frequency: Option<PaymentFrequency>,
}

impl ScheduleRequest {
    pub fn new(payee_id: impl Into<PayeeId>) -> Self {
        Self { payee_id: payee_id.into(), ..Self::default() }
    }

    pub fn total_incentive(mut self, v: Amount) -> Self {
        self.total_incentive = Some(v);
        self
    }

    pub fn cap_percent(mut self, v: f64) -> Self {
        self.cap_percent = Some(v);
        self
    }

    pub fn term_months(mut self, v: i64) -> Self {
        self.term_months = Some(v);
        self
    }

    pub fn start_date(mut self, v: NaiveDate) -> Self {
        self.start_date = Some(v);
        self
    }

    pub fn frequency(mut self, v: PaymentFrequency) -> Self {
        self.frequency = Some(v);
        self
    }
}

/// Inputs applied uniformly to every payee in a batch.
/// There is no per-payee total: batch totals always come from the record.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ScheduleOverrides {
    #[serde(default)]
    pub cap_percent: Option<f64>,
    #[serde(default)]
    pub term_months: Option<i64>,
    #[serde(default)]
    pub start_date: Option<NaiveDate>,
    #[serde(default)]
    pub frequency: Option<PaymentFrequency>,
}

impl ScheduleOverrides {
    fn request_for(&self, payee_id: &str) -> ScheduleRequest {
        ScheduleRequest {
            payee_id:        payee_id.to_string(),
            total_incentive: None,
            cap_percent:     self.cap_percent,
            term_months:     self.term_months,
            start_date:      self.start_date,
            frequency:       self.frequency,
        }
    }
}

// ── Results ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Installment {
    pub installment_no: u32,
    pub date:           NaiveDate,
    pub amount:         Amount,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScheduleSummary {
    pub payee_id:        PayeeId,
    pub total_incentive: Amount,
    pub cap_percent:     f64,
    pub term_months:     i64,
    pub frequency:       PaymentFrequency,
    pub periods:         u32,
    pub capped_total:    Amount,
    pub total_payout:    Amount,
    pub start_date:      NaiveDate,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Schedule {
    #[serde(rename = "schedule")]
    pub installments: Vec<Installment>,
    pub summary:      ScheduleSummary,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BatchEntry {
    pub payee_id: PayeeId,
    pub schedule: Schedule,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct BatchSchedule {
    pub results: Vec<BatchEntry>,
    /// Requested ids with no matching row. Not an error in batch mode.
    pub skipped: Vec<PayeeId>,
}

// ── Input resolution ─────────────────────────────────────────────────────────

/// Which rung of the fallback chain supplied a value.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    Request,
    Record,
    Default,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Resolved<T> {
    pub value:  T,
    pub source: Source,
}

/// One field's fallback chain, in precedence order.
/// The record is only consulted when the request is silent, so a
/// malformed recorded cell cannot fail a request that overrides it.
pub fn resolve<T>(
    explicit: Option<T>,
    recorded: impl FnOnce() -> LedgerResult<Option<T>>,
    default: Option<T>,
) -> LedgerResult<Option<Resolved<T>>> {
    if let Some(value) = explicit {
        return Ok(Some(Resolved { value, source: Source::Request }));
    }
    if let Some(value) = recorded()? {
        return Ok(Some(Resolved { value, source: Source::Record }));
    }
    Ok(default.map(|value| Resolved { value, source: Source::Default }))
}

/// A fallback chain whose last rung always exists.
fn resolve_or<T: Copy>(
    explicit: Option<T>,
    recorded: impl FnOnce() -> LedgerResult<Option<T>>,
    default: T,
) -> LedgerResult<Resolved<T>> {
    Ok(resolve(explicit, recorded, Some(default))?
        .unwrap_or(Resolved { value: default, source: Source::Default }))
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ResolvedInputs {
    pub total_incentive: Resolved<Amount>,
    pub cap_percent:     Resolved<f64>,
    pub term_months:     Resolved<i64>,
    pub start_date:      Resolved<NaiveDate>,
    pub frequency:       PaymentFrequency,
}

fn recorded_f64(record: &PayeeRecord<'_>, column: &str) -> LedgerResult<Option<f64>> {
    match record.recorded(column) {
        None => Ok(None),
        Some(v) => v.as_f64().map(Some).ok_or_else(|| LedgerError::InvalidValue {
            column: column.to_string(),
            value:  v.display_key(),
        }),
    }
}

fn recorded_date(record: &PayeeRecord<'_>, column: &str) -> LedgerResult<Option<NaiveDate>> {
    match record.recorded(column) {
        None => Ok(None),
        Some(v) => v.as_date().map(Some).ok_or_else(|| LedgerError::InvalidValue {
            column: column.to_string(),
            value:  v.display_key(),
        }),
    }
}

fn finite(column: &str, v: f64) -> LedgerResult<f64> {
    if v.is_finite() {
        Ok(v)
    } else {
        Err(LedgerError::InvalidValue { column: column.into(), value: v.to_string() })
    }
}

/// Round half away from zero to cents.
pub fn round_cents(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

// ── Engine ───────────────────────────────────────────────────────────────────

pub struct ScheduleEngine<C: Clock = SystemClock> {
    config: ScheduleConfig,
    clock:  C,
}

impl ScheduleEngine<SystemClock> {
    pub fn new(config: ScheduleConfig) -> Self {
        Self { config, clock: SystemClock }
    }
}

impl<C: Clock> ScheduleEngine<C> {
    pub fn with_clock<D: Clock>(self, clock: D) -> ScheduleEngine<D> {
        ScheduleEngine { config: self.config, clock }
    }

    /// Schedule for a single payee. Unknown payees are an error.
    pub fn generate(&self, request: &ScheduleRequest, dataset: &Dataset) -> LedgerResult<Schedule> {
        let record = self.lookup(&request.payee_id, dataset)?;
        if record.is_empty() {
            return Err(LedgerError::PayeeNotFound { payee_id: record.payee_id });
        }
        self.schedule_for(request, &record)
    }

    /// Schedules for many payees, in caller order. Duplicate ids are
    /// scheduled once; ids with no matching row land in `skipped`.
    pub fn generate_batch(
        &self,
        payee_ids: &[PayeeId],
        overrides: &ScheduleOverrides,
        dataset: &Dataset,
    ) -> LedgerResult<BatchSchedule> {
        let mut batch = BatchSchedule::default();
        let mut seen: HashSet<&str> = HashSet::with_capacity(payee_ids.len());

        for payee_id in payee_ids {
            let key = payee_id.trim();
            if !seen.insert(key) {
                log::debug!("schedule: duplicate payee '{key}' in batch ignored");
                continue;
            }

            let record = self.lookup(key, dataset)?;
            if record.is_empty() {
                log::warn!("schedule: payee '{key}' not found, skipped in batch");
                batch.skipped.push(key.to_string());
                continue;
            }
            let schedule = self.schedule_for(&overrides.request_for(key), &record)?;
            batch.results.push(BatchEntry { payee_id: key.to_string(), schedule });
        }

        log::info!(
            "schedule: batch of {} produced {} schedules, {} skipped",
            payee_ids.len(),
            batch.results.len(),
            batch.skipped.len()
        );
        Ok(batch)
    }

    /// Apply every field's fallback chain against the payee's first row.
    pub fn resolve_inputs(
        &self,
        request: &ScheduleRequest,
        record: &PayeeRecord<'_>,
    ) -> LedgerResult<ResolvedInputs> {
        let cols = &self.config.columns;

        let total_incentive = resolve(
            request.total_incentive,
            || recorded_f64(record, &cols.total_incentive),
            None,
        )?
        .ok_or_else(|| LedgerError::MissingTotalIncentive { payee_id: record.payee_id.clone() })?;

        let cap_percent = resolve_or(
            request.cap_percent,
            || recorded_f64(record, &cols.cap_percent),
            self.config.default_cap_percent,
        )?;

        // Recorded terms truncate toward zero, so 12.9 months is 12.
        let term_months = resolve_or(
            request.term_months,
            || Ok(recorded_f64(record, &cols.term_months)?.map(|t| t.trunc() as i64)),
            self.config.default_term_months,
        )?;

        let start_date = resolve_or(
            request.start_date,
            || recorded_date(record, &cols.start_date),
            self.clock.today(),
        )?;

        finite(&cols.total_incentive, total_incentive.value)?;
        let cap = finite(&cols.cap_percent, cap_percent.value)?;
        if cap < 0.0 {
            return Err(LedgerError::InvalidValue {
                column: cols.cap_percent.clone(),
                value:  cap.to_string(),
            });
        }

        Ok(ResolvedInputs {
            total_incentive,
            cap_percent,
            term_months,
            start_date,
            frequency: request.frequency.unwrap_or(self.config.default_frequency),
        })
    }

    fn lookup<'a>(&self, payee_id: &str, dataset: &'a Dataset) -> LedgerResult<PayeeRecord<'a>> {
        if payee_id.trim().is_empty() {
            return Err(LedgerError::PayeeNotFound { payee_id: String::new() });
        }
        dataset.payee_record(&self.config.columns.payee_id, payee_id)
    }

    fn schedule_for(&self, request: &ScheduleRequest, record: &PayeeRecord<'_>) -> LedgerResult<Schedule> {
        let inputs = self.resolve_inputs(request, record)?;
        log::debug!(
            "schedule: payee '{}' total={:?} cap={:?} term={:?} start={:?}",
            record.payee_id,
            inputs.total_incentive.source,
            inputs.cap_percent.source,
            inputs.term_months.source,
            inputs.start_date.source
        );
        build_schedule(&record.payee_id, &inputs)
    }
}

/// The pure amortization step over already-resolved inputs.
pub fn build_schedule(payee_id: &str, inputs: &ResolvedInputs) -> LedgerResult<Schedule> {
    let term = inputs.term_months.value;
    let period_months = inputs.frequency.months();
    let invalid_term = || LedgerError::InvalidTerm { term_months: term, period_months };

    let periods = term.div_euclid(period_months as i64);
    if periods <= 0 {
        return Err(invalid_term());
    }
    let periods = u32::try_from(periods).map_err(|_| invalid_term())?;

    let start = inputs.start_date.value;
    // The last date bounds every earlier one; past chrono's range the term is unusable.
    calendar::period_date(start, periods - 1, period_months).ok_or_else(invalid_term)?;

    let capped_total = inputs.total_incentive.value * inputs.cap_percent.value / 100.0;
    let amount = round_cents(capped_total / periods as f64);

    let mut installments = Vec::with_capacity(periods as usize);
    for step in 0..periods {
        let date = calendar::period_date(start, step, period_months).ok_or_else(invalid_term)?;
        installments.push(Installment { installment_no: step + 1, date, amount });
    }

    let total_payout = round_cents(installments.iter().map(|i| i.amount).sum());

    Ok(Schedule {
        installments,
        summary: ScheduleSummary {
            payee_id:        payee_id.to_string(),
            total_incentive: round_cents(inputs.total_incentive.value),
            cap_percent:     round_cents(inputs.cap_percent.value),
            term_months:     term,
            frequency:       inputs.frequency,
            periods,
            capped_total:    round_cents(capped_total),
            total_payout,
            start_date:      start,
        },
    })
}

/// Single-payee schedule with default config and today's date.
pub fn generate_schedule(request: &ScheduleRequest, dataset: &Dataset) -> LedgerResult<Schedule> {
    ScheduleEngine::new(ScheduleConfig::default()).generate(request, dataset)
}

/// Batch schedules with default config and today's date.
pub fn generate_schedule_batch(
    payee_ids: &[PayeeId],
    overrides: &ScheduleOverrides,
    dataset: &Dataset,
) -> LedgerResult<BatchSchedule> {
    ScheduleEngine::new(ScheduleConfig::default()).generate_batch(payee_ids, overrides, dataset)
}
