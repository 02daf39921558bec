//! Types that represent the core data model, such as `MonetaryRecord` and `TimeEntry`.
mod amount;
mod passive;
pub(crate) mod record;
pub(crate) mod time_entry;

pub use amount::{Amount, AmountError};
pub use passive::PassiveIncome;
pub use record::{MonetaryRecord, RecordError, RecordErrorKind};
pub use time_entry::{
    calculate_amount, calculate_hours, calculate_summary, TimeEntry, TimeSummary,
    DEFAULT_HOURLY_RATE,
};
