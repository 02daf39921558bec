//! Typed access to the four tables. Every row coming back from the `Store` is validated here before
//! anything else sees it.

use crate::api::{Filter, Order, Query, Store, Table};
use crate::model::record::RowReader;
use crate::model::{Amount, MonetaryRecord, PassiveIncome, TimeEntry};
use crate::Result;
use anyhow::{bail, ensure, Context};
use chrono::{DateTime, SecondsFormat, Utc};
use rust_decimal::Decimal;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, info};

/// Reads and writes the app's data through a dynamically-dispatched `Store`.
#[derive(Clone)]
pub struct Bloom {
    store: Arc<dyn Store>,
    user_id: Option<String>,
}

impl Bloom {
    /// `user_id` is stamped onto new time entries.
    pub fn new(store: Arc<dyn Store>, user_id: Option<String>) -> Self {
        Self { store, user_id }
    }

    /// Utility expenses, newest `create_date` first.
    pub async fn fetch_utility_expenses(&self) -> Result<Vec<MonetaryRecord>> {
        self.fetch_records(Table::UtilityExpenses).await
    }

    /// Dividend income, newest `create_date` first.
    pub async fn fetch_dividend_income(&self) -> Result<Vec<MonetaryRecord>> {
        self.fetch_records(Table::DividendIncome).await
    }

    async fn fetch_records(&self, table: Table) -> Result<Vec<MonetaryRecord>> {
        let query = Query::new().order(Order::desc("create_date"));
        let rows = self.store.select(table, &query).await?;
        debug!("Fetched {} rows from {table}", rows.len());
        Ok(MonetaryRecord::from_rows(&table.to_string(), &rows)?)
    }

    /// The sum of every dividend payment.
    pub async fn fetch_total_dividend_income_amount(&self) -> Result<Amount> {
        let table = Table::DividendIncome;
        let name = table.to_string();
        let rows = self
            .store
            .select(table, &Query::new().columns(["amount"]))
            .await?;
        let mut total = Amount::ZERO;
        for row in &rows {
            total += RowReader::new(&name, row)?.amount("amount")?;
        }
        Ok(total)
    }

    /// Adds a dated amount to `utility_expenses` or `dividend_income`.
    pub async fn add_record(&self, table: Table, record: &MonetaryRecord) -> Result<MonetaryRecord> {
        ensure!(
            matches!(table, Table::UtilityExpenses | Table::DividendIncome),
            "'{table}' does not hold categorized records"
        );
        let row = json!({
            "category_name": record.category(),
            "create_date": record.date().to_string(),
            "amount": record.amount().value().to_string(),
        });
        let stored = self.store.insert(table, row).await?;
        Ok(MonetaryRecord::from_row(&table.to_string(), &stored)?)
    }

    /// Every passive income row, in the order the store returns them.
    pub async fn passive_income(&self) -> Result<Vec<PassiveIncome>> {
        let table = Table::PassiveBloom;
        let name = table.to_string();
        let rows = self.store.select(table, &Query::new()).await?;
        let passive = rows
            .iter()
            .map(|row| PassiveIncome::from_row(&name, row))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(passive)
    }

    /// A single passive income row. A missing id is an error.
    pub async fn passive_income_by_id(&self, id: i64) -> Result<PassiveIncome> {
        let table = Table::PassiveBloom;
        let rows = self
            .store
            .select(table, &Query::new().filter(Filter::eq("id", id)))
            .await?;
        match rows.as_slice() {
            [row] => Ok(PassiveIncome::from_row(&table.to_string(), row)?),
            [] => bail!("No passive income row with id {id}"),
            _ => bail!("More than one passive income row has id {id}"),
        }
    }

    /// Time entries, unpaid first and then newest `start_time` first.
    pub async fn time_entries(&self) -> Result<Vec<TimeEntry>> {
        let table = Table::TimeEntries;
        let name = table.to_string();
        let query = Query::new()
            .order(Order::asc("is_paid"))
            .order(Order::desc("start_time"));
        let rows = self.store.select(table, &query).await?;
        let mut entries = rows
            .iter()
            .map(|row| TimeEntry::from_row(&name, row))
            .collect::<std::result::Result<Vec<_>, _>>()?;
        // The store already orders them; this keeps the guarantee for any `Store`.
        entries.sort_by(TimeEntry::display_order);
        Ok(entries)
    }

    /// Records a block of work as unpaid.
    pub async fn add_time_entry(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        total_hours: Decimal,
        amount: Amount,
    ) -> Result<TimeEntry> {
        ensure!(
            start < end,
            "The start time {start} must be before the end time {end}"
        );
        let table = Table::TimeEntries;
        let row = json!({
            "user_id": self.user_id,
            "start_time": timestamp(start),
            "end_time": timestamp(end),
            "total_hours": total_hours.to_string(),
            "amount": amount.value().to_string(),
            "is_paid": false,
        });
        let stored = self.store.insert(table, row).await?;
        let entry = TimeEntry::from_row(&table.to_string(), &stored)?;
        info!("Added time entry {} for {} hours", entry.id(), entry.total_hours());
        Ok(entry)
    }

    /// Marks an unpaid entry as paid. Returns `false` if nothing changed because the entry does not
    /// exist or was already paid.
    pub async fn mark_as_paid(&self, id: &str) -> Result<bool> {
        let now = timestamp(Utc::now());
        let filters = [Filter::eq("id", id), Filter::is("is_paid", false)];
        let patch = json!({
            "is_paid": true,
            "paid_at": now,
            "updated_at": now,
        });
        let changed = self
            .store
            .update(Table::TimeEntries, &filters, patch)
            .await
            .with_context(|| format!("Unable to mark time entry {id} as paid"))?;
        Ok(!changed.is_empty())
    }
}

fn timestamp(t: DateTime<Utc>) -> Value {
    Value::String(t.to_rfc3339_opts(SecondsFormat::Secs, true))
}
