//! Time-tracked work entries and the arithmetic around them.

use crate::model::record::{RecordError, RowReader};
use crate::model::Amount;
use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;

/// The rate used when none is configured, in dollars per hour.
pub const DEFAULT_HOURLY_RATE: Decimal = Decimal::from_parts(15, 0, 0, false, 0);

const MILLIS_PER_HOUR: i64 = 1000 * 60 * 60;

/// A block of billable time.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct TimeEntry {
    id: String,
    user_id: Option<String>,
    start_time: DateTime<Utc>,
    end_time: DateTime<Utc>,
    total_hours: Decimal,
    amount: Amount,
    is_paid: bool,
    paid_at: Option<DateTime<Utc>>,
    created_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
}

impl TimeEntry {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        self.start_time
    }

    pub fn end_time(&self) -> DateTime<Utc> {
        self.end_time
    }

    pub fn total_hours(&self) -> Decimal {
        self.total_hours
    }

    pub fn amount(&self) -> Amount {
        self.amount
    }

    pub fn is_paid(&self) -> bool {
        self.is_paid
    }

    pub fn paid_at(&self) -> Option<DateTime<Utc>> {
        self.paid_at
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }

    pub fn from_row(table: &str, row: &Value) -> Result<Self, RecordError> {
        let r = RowReader::new(table, row)?;
        Ok(Self {
            id: r.id("id")?,
            user_id: r.opt_string("user_id")?,
            start_time: r.timestamp("start_time")?,
            end_time: r.timestamp("end_time")?,
            total_hours: r.amount("total_hours")?.value(),
            amount: r.amount("amount")?,
            is_paid: r.bool("is_paid")?,
            paid_at: r.opt_timestamp("paid_at")?,
            created_at: r.opt_timestamp("created_at")?,
            updated_at: r.opt_timestamp("updated_at")?,
        })
    }

    /// Unpaid entries first, then newest `start_time` first.
    pub fn display_order(a: &TimeEntry, b: &TimeEntry) -> Ordering {
        a.is_paid
            .cmp(&b.is_paid)
            .then_with(|| b.start_time.cmp(&a.start_time))
    }
}

/// Hours between `start` and `end`, rounded to two decimal places.
pub fn calculate_hours(start: DateTime<Utc>, end: DateTime<Utc>) -> Decimal {
    let millis = (end - start).num_milliseconds();
    (Decimal::from(millis) / Decimal::from(MILLIS_PER_HOUR))
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// `hours * hourly_rate`, rounded to cents.
pub fn calculate_amount(hours: Decimal, hourly_rate: Decimal) -> Amount {
    Amount::new(hours * hourly_rate).round_cents()
}

/// Totals across a set of time entries.
#[derive(Debug, Clone, Default, Eq, PartialEq, Serialize, Deserialize)]
pub struct TimeSummary {
    pub total_hours: Decimal,
    pub total_amount: Amount,
    pub unpaid_hours: Decimal,
    pub unpaid_amount: Amount,
    pub entry_count: usize,
    pub unpaid_count: usize,
}

pub fn calculate_summary(entries: &[TimeEntry]) -> TimeSummary {
    entries
        .iter()
        .fold(TimeSummary::default(), |mut summary, entry| {
            summary.total_hours += entry.total_hours;
            summary.total_amount += entry.amount;
            summary.entry_count += 1;
            if !entry.is_paid {
                summary.unpaid_hours += entry.total_hours;
                summary.unpaid_amount += entry.amount;
                summary.unpaid_count += 1;
            }
            summary
        })
}

#[cfg(test)]
pub(crate) fn test_entry(id: &str, start: &str, hours: i64, is_paid: bool) -> TimeEntry {
    let start = crate::model::record::parse_timestamp(start).unwrap();
    let end = start + chrono::Duration::hours(hours);
    let total_hours = calculate_hours(start, end);
    TimeEntry {
        id: id.to_string(),
        user_id: None,
        start_time: start,
        end_time: end,
        total_hours,
        amount: calculate_amount(total_hours, DEFAULT_HOURLY_RATE),
        is_paid,
        paid_at: None,
        created_at: None,
        updated_at: None,
    }
}
