//! Calendar-month arithmetic for installment dates.
//!
//! Month overflow clamps to the last day of the target month:
//! Jan 31 + 1 month = Feb 28 (Feb 29 in leap years).
//! Installment k is always computed from the start date, never from
//! installment k-1, so a clamp in February does not drag later dates
//! back to the 28th. This departs from stepping each date off the
//! previous one, where Jan 31 gives Feb 29 and then Mar 29; here the
//! third date is Mar 31.

use chrono::{Months, NaiveDate};

/// `start` advanced by `months` calendar months, clamped to month end.
/// None only past chrono's representable range.
pub fn add_months(start: NaiveDate, months: u32) -> Option<NaiveDate> {
    start.checked_add_months(Months::new(months))
}

/// The date of the `step`-th period (0-based) after `start`.
pub fn period_date(start: NaiveDate, step: u32, period_months: u32) -> Option<NaiveDate> {
    step.checked_mul(period_months)
        .and_then(|months| add_months(start, months))
}
