//! Billable time: list, add, pay and summarize entries.

use crate::commands::auth::connect;
use crate::commands::{store_result, Out};
use crate::error::{ErrorType, IntoResult};
use crate::model::{calculate_amount, calculate_hours, calculate_summary, TimeEntry, TimeSummary};
use crate::render::{self, OutputFormat};
use crate::{Config, Mode, Result};
use anyhow::{bail, ensure};
use chrono::{DateTime, Utc};
use tracing::info;

/// Handles `bloom time list`. Unpaid entries come first.
pub async fn time_list(
    config: &Config,
    mode: Mode,
    format: OutputFormat,
) -> Result<Out<Vec<TimeEntry>>> {
    let bloom = connect(config, mode).await?;
    let entries = store_result(bloom.time_entries().await)?;
    let unpaid = entries.iter().filter(|e| !e.is_paid()).count();
    let report = render::time_entries(&entries, format)?;
    Ok(Out::new(
        format!("{} time entries, {unpaid} unpaid", entries.len()),
        entries,
    )
    .with_report(report))
}

/// Handles `bloom time add`. Hours are rounded to two places and the amount uses the configured
/// hourly rate.
pub async fn time_add(
    config: &Config,
    mode: Mode,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> Result<Out<TimeEntry>> {
    check_range(start, end).pub_result(ErrorType::Request)?;
    let bloom = connect(config, mode).await?;
    let hours = calculate_hours(start, end);
    let amount = calculate_amount(hours, config.hourly_rate());
    let entry = store_result(bloom.add_time_entry(start, end, hours, amount).await)?;
    Ok(Out::new(
        format!(
            "Added {} hours worth {} as entry {}",
            entry.total_hours(),
            entry.amount(),
            entry.id()
        ),
        entry,
    ))
}

fn check_range(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<()> {
    ensure!(start < end, "The end time must be after the start time");
    Ok(())
}

/// Handles `bloom time pay <id>`.
pub async fn time_pay(config: &Config, mode: Mode, id: &str) -> Result<Out<()>> {
    let bloom = connect(config, mode).await?;
    if !store_result(bloom.mark_as_paid(id).await)? {
        return unpaid_not_found(id).pub_result(ErrorType::Request);
    }
    info!("Marked time entry {id} as paid");
    Ok(format!("Time entry {id} is paid").into())
}

fn unpaid_not_found<T>(id: &str) -> Result<T> {
    bail!("There is no unpaid time entry with id '{id}'")
}

/// Handles `bloom time summary`.
pub async fn time_summary(
    config: &Config,
    mode: Mode,
    format: OutputFormat,
) -> Result<Out<TimeSummary>> {
    let bloom = connect(config, mode).await?;
    let entries = store_result(bloom.time_entries().await)?;
    let summary = calculate_summary(&entries);
    let report = render::time_summary(&summary, format)?;
    Ok(Out::new(
        format!(
            "{} unpaid hours worth {}",
            summary.unpaid_hours, summary.unpaid_amount
        ),
        summary,
    )
    .with_report(report))
}
