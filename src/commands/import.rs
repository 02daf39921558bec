use crate::api::{load_csv, Table};
use crate::commands::auth::connect;
use crate::commands::{store_result, Out};
use crate::error::{ErrorType, IntoResult};
use crate::model::MonetaryRecord;
use crate::{utils, Config, Mode, Result};
use anyhow::{ensure, Context};
use std::path::Path;
use tracing::{debug, info};

/// Handles `bloom import`. Every row of the CSV file is validated before any row is written, so a
/// bad file adds nothing.
///
/// # Errors
/// - A `request` error if the file cannot be read or has no rows.
/// - A `record` error naming the field when a row is invalid.
/// - A `store` error if an insert fails. Rows before the failing one stay written.
pub async fn import(
    config: &Config,
    mode: Mode,
    table: Table,
    file: &Path,
) -> Result<Out<Vec<MonetaryRecord>>> {
    let records = read_records(table, file).await?;
    let bloom = connect(config, mode).await?;
    let mut added = Vec::with_capacity(records.len());
    for record in &records {
        let stored = store_result(bloom.add_record(table, record).await).with_context(|| {
            format!(
                "Stopped after adding {} of {} rows to {table}",
                added.len(),
                records.len()
            )
        })?;
        debug!("Added {} {} on {}", stored.category(), stored.amount(), stored.date());
        added.push(stored);
    }
    info!("Imported {} rows from {}", added.len(), file.display());
    Ok(Out::new(
        format!("Added {} rows to {table}", added.len()),
        added,
    ))
}

async fn read_records(table: Table, file: &Path) -> Result<Vec<MonetaryRecord>> {
    let rows = read_rows(file).await.pub_result(ErrorType::Request)?;
    MonetaryRecord::from_rows(&table.to_string(), &rows).pub_result(ErrorType::Record)
}

async fn read_rows(file: &Path) -> Result<Vec<serde_json::Value>> {
    let content = utils::read(file).await?;
    let rows = load_csv(&content)?;
    ensure!(!rows.is_empty(), "There are no rows in {}", file.display());
    Ok(rows)
}
