//! Calendar arithmetic for recurring expense occurrences.
//!
//! Everything here is pure: no I/O and no clock. Callers pass in the dates.

use chrono::{Datelike, Days, Months, NaiveDate};
use model::entities::recurring_expense::RecurrenceUnit;

use crate::error::{ComputeError, Result};

/// Computes the occurrence that follows `current` when the schedule repeats
/// every `interval` `unit`s.
///
/// Monthly schedules anchored on the last day of a month stay on the last day
/// of the month: Jan 31 is followed by Feb 28 (Feb 29 in leap years), and two
/// months after Jan 31 is Mar 31. Other days keep their day number, clamped to
/// the length of the target month. A Feb 29 yearly anchor lands on Feb 28 in
/// non-leap years.
///
/// # Errors
/// `InvalidArgument` if `interval` is not positive, `Date` if the result is
/// outside the supported calendar range.
pub fn next_occurrence(current: NaiveDate, unit: RecurrenceUnit, interval: i32) -> Result<NaiveDate> {
    if interval <= 0 {
        return Err(ComputeError::InvalidArgument(format!(
            "interval must be > 0, got {}",
            interval
        )));
    }
    let step = interval.unsigned_abs();

    let next = match unit {
        RecurrenceUnit::Daily => current.checked_add_days(Days::new(u64::from(step))),
        RecurrenceUnit::Weekly => current.checked_add_days(Days::new(u64::from(step) * 7)),
        RecurrenceUnit::Monthly => add_months(current, step),
        RecurrenceUnit::Yearly => step
            .checked_mul(12)
            .and_then(|months| current.checked_add_months(Months::new(months))),
    };

    next.ok_or_else(|| {
        ComputeError::Date(format!(
            "{} + {} x {:?} is outside the supported date range",
            current, interval, unit
        ))
    })
}

/// Whether `occurrence` is still allowed by an optional, inclusive end date.
pub fn is_within_end_date(occurrence: NaiveDate, end_date: Option<NaiveDate>) -> bool {
    end_date.is_none_or(|end| occurrence <= end)
}

/// Parses a recurrence unit name such as `monthly` or `WEEKLY`.
///
/// # Errors
/// `UnsupportedOperation` for anything but the four known units.
pub fn parse_recurrence_unit(value: &str) -> Result<RecurrenceUnit> {
    match value.trim().to_ascii_uppercase().as_str() {
        "DAILY" => Ok(RecurrenceUnit::Daily),
        "WEEKLY" => Ok(RecurrenceUnit::Weekly),
        "MONTHLY" => Ok(RecurrenceUnit::Monthly),
        "YEARLY" => Ok(RecurrenceUnit::Yearly),
        _ => Err(ComputeError::UnsupportedOperation(format!(
            "unknown recurrence unit: {}",
            value
        ))),
    }
}

fn add_months(current: NaiveDate, months: u32) -> Option<NaiveDate> {
    let candidate = current.checked_add_months(Months::new(months))?;
    if is_last_day_of_month(current) {
        last_day_of_month(candidate)
    } else {
        Some(candidate)
    }
}

fn is_last_day_of_month(date: NaiveDate) -> bool {
    date.succ_opt().is_none_or(|next| next.month() != date.month())
}

fn last_day_of_month(date: NaiveDate) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(date.year(), date.month(), 1)?
        .checked_add_months(Months::new(1))?
        .pred_opt()
}
