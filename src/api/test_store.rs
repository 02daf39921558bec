//! Implements the `Store` trait using in-memory data for testing purposes.
//!
//! Note: this is compiled even in the "production" version of this app so that we can run the whole
//! app, top-to-bottom, without a hosted data store.

use crate::api::{Filter, Query, Store, Table};
use crate::Result;
use anyhow::{bail, Context};
use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::io::Cursor;
use tokio::sync::Mutex;
use uuid::Uuid;

/// An implementation of the `Store` trait that holds its tables in memory. By default it is seeded
/// with a year of sample data.
pub(crate) struct TestStore {
    tables: Mutex<HashMap<Table, Vec<Value>>>,
}

impl TestStore {
    pub(crate) fn new(tables: HashMap<Table, Vec<Value>>) -> Self {
        Self {
            tables: Mutex::new(tables),
        }
    }

    pub(crate) fn seeded() -> Result<Self> {
        Ok(Self::new(default_data()?))
    }
}

#[async_trait::async_trait]
impl Store for TestStore {
    async fn select(&self, table: Table, query: &Query) -> Result<Vec<Value>> {
        let tables = self.tables.lock().await;
        let mut rows: Vec<Value> = tables
            .get(&table)
            .map(|rows| {
                rows.iter()
                    .filter(|row| query.filters().iter().all(|f| f.matches(row)))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        rows.sort_by(|a, b| {
            query.orders().iter().fold(Ordering::Equal, |ordering, order| {
                ordering.then_with(|| {
                    let ordering = compare(
                        a.get(order.column()).unwrap_or(&Value::Null),
                        b.get(order.column()).unwrap_or(&Value::Null),
                    );
                    if order.ascending() {
                        ordering
                    } else {
                        ordering.reverse()
                    }
                })
            })
        });

        if let Some(columns) = query.selected_columns() {
            rows = rows.iter().map(|row| project(row, columns)).collect();
        }
        Ok(rows)
    }

    async fn insert(&self, table: Table, row: Value) -> Result<Value> {
        let Value::Object(mut fields) = row else {
            bail!("Rows inserted into '{table}' must be JSON objects");
        };
        let mut tables = self.tables.lock().await;
        let rows = tables.entry(table).or_default();
        let stamp = Value::String(now());

        match table {
            Table::TimeEntries => {
                fields.insert("id".into(), Value::String(Uuid::new_v4().to_string()));
                fields.entry("is_paid").or_insert(Value::Bool(false));
                fields.entry("paid_at").or_insert(Value::Null);
                fields.entry("updated_at").or_insert_with(|| stamp.clone());
            }
            _ => {
                let next_id = rows
                    .iter()
                    .filter_map(|r| r.get("id").and_then(Value::as_i64))
                    .max()
                    .unwrap_or(0)
                    + 1;
                fields.insert("id".into(), Value::from(next_id));
            }
        }
        fields.entry("created_at").or_insert(stamp);

        let row = Value::Object(fields);
        rows.push(row.clone());
        Ok(row)
    }

    async fn update(&self, table: Table, filters: &[Filter], patch: Value) -> Result<Vec<Value>> {
        let Value::Object(patch) = patch else {
            bail!("Updates to '{table}' must be JSON objects");
        };
        let mut tables = self.tables.lock().await;
        let mut updated = Vec::new();
        for row in tables.entry(table).or_default().iter_mut() {
            if !filters.iter().all(|f| f.matches(row)) {
                continue;
            }
            if let Value::Object(fields) = row {
                for (column, value) in &patch {
                    fields.insert(column.clone(), value.clone());
                }
            }
            updated.push(row.clone());
        }
        Ok(updated)
    }
}

fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn project(row: &Value, columns: &[String]) -> Value {
    let mut projected = Map::new();
    for column in columns {
        if let Some(value) = row.get(column) {
            projected.insert(column.clone(), value.clone());
        }
    }
    Value::Object(projected)
}

/// Nulls sort last, the way Postgres sorts them ascending.
fn compare(a: &Value, b: &Value) -> Ordering {
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Null, _) => Ordering::Greater,
        (_, Value::Null) => Ordering::Less,
        (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
        (Value::Number(a), Value::Number(b)) => {
            let a = a.as_f64().unwrap_or_default();
            let b = b.as_f64().unwrap_or_default();
            a.partial_cmp(&b).unwrap_or(Ordering::Equal)
        }
        (Value::String(a), Value::String(b)) => a.cmp(b),
        (a, b) => a.to_string().cmp(&b.to_string()),
    }
}

/// Provides the seed data from this module.
fn default_data() -> Result<HashMap<Table, Vec<Value>>> {
    let mut map = HashMap::new();
    map.insert(Table::UtilityExpenses, load_csv(UTILITY_DATA)?);
    map.insert(Table::DividendIncome, load_csv(DIVIDEND_DATA)?);
    map.insert(Table::PassiveBloom, load_csv(PASSIVE_DATA)?);
    map.insert(Table::TimeEntries, load_csv(TIME_ENTRY_DATA)?);
    Ok(map)
}

/// Loads rows from CSV with a header line. Integers in the `id` column become numbers, `true` and
/// `false` become booleans, empty cells become `null` and everything else stays text.
pub(crate) fn load_csv(csv_data: &str) -> Result<Vec<Value>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_reader(Cursor::new(csv_data.as_bytes()));
    let headers = rdr.headers().context("Seed data has no header")?.clone();

    let mut rows = Vec::new();
    for result in rdr.records() {
        let record = result.context("Unable to read a seed row")?;
        let mut fields = Map::new();
        for (column, cell) in headers.iter().zip(record.iter()) {
            fields.insert(column.to_string(), cell_value(column, cell));
        }
        rows.push(Value::Object(fields));
    }
    Ok(rows)
}

fn cell_value(column: &str, cell: &str) -> Value {
    match (column, cell) {
        (_, "") => Value::Null,
        ("is_paid", "true") => Value::Bool(true),
        ("is_paid", "false") => Value::Bool(false),
        ("id", _) => match cell.parse::<i64>() {
            Ok(id) => Value::from(id),
            Err(_) => Value::String(cell.to_string()),
        },
        _ => Value::String(cell.to_string()),
    }
}

/// Seed utility expense data.
const UTILITY_DATA: &str = r##"id,category_name,create_date,amount
1,Electric,2025-01-14,142.67
2,Water,2025-01-20,45.88
3,Internet,2025-01-11,89.99
4,Electric,2025-02-13,131.02
5,Water,2025-02-19,44.10
6,Internet,2025-02-11,89.99
7,Electric,2025-03-14,118.45
8,Water,2025-03-20,47.25
9,Internet,2025-03-11,89.99
10,Gas,2025-03-05,64.30
11,Electric,2025-04-15,97.80
12,Water,2025-04-18,49.60
13,Internet,2025-04-11,89.99
14,Electric,2025-05-14,104.12
15,Internet,2025-05-11,94.99
16,Electric,2025-06-13,151.33
17,Water,2025-06-19,52.75
18,Internet,2025-06-11,94.99
"##;

/// Seed dividend income data.
const DIVIDEND_DATA: &str = r##"id,category_name,create_date,amount
1,SCHD,2025-03-24,48.12
2,SCHD,2025-06-23,51.90
3,O,2025-01-15,12.84
4,O,2025-02-14,12.84
5,O,2025-03-14,12.90
6,O,2025-04-15,12.90
7,O,2025-05-15,12.90
8,O,2025-06-13,13.02
9,VTI,2025-03-27,31.45
10,VTI,2025-06-26,33.08
11,JEPI,2025-01-06,21.17
12,JEPI,2025-02-05,19.88
13,JEPI,2025-03-05,20.41
14,JEPI,2025-04-04,22.03
15,JEPI,2025-05-05,20.96
16,JEPI,2025-06-04,21.58
"##;

/// Seed passive income data.
const PASSIVE_DATA: &str = r##"id,created_at,amount
1,2025-01-31T18:00:00+00:00,94.57
2,2025-02-28T18:00:00+00:00,85.14
3,2025-03-31T18:00:00+00:00,164.92
4,2025-04-30T18:00:00+00:00,88.40
5,2025-05-31T18:00:00+00:00,86.76
6,2025-06-30T18:00:00+00:00,171.41
"##;

/// Seed time entry data.
const TIME_ENTRY_DATA: &str = r##"id,user_id,start_time,end_time,total_hours,amount,is_paid,paid_at,created_at,updated_at
0b6a3c52-6f0e-4d4b-9a43-1f1c7d2e8a01,demo-user,2025-06-02T14:00:00+00:00,2025-06-02T17:30:00+00:00,3.50,52.50,true,2025-06-09T12:00:00+00:00,2025-06-02T17:31:00+00:00,2025-06-09T12:00:00+00:00
2c9f7e14-3a5d-4e0b-8c61-5b2a9d4f3e02,demo-user,2025-06-10T13:00:00+00:00,2025-06-10T15:15:00+00:00,2.25,33.75,false,,2025-06-10T15:16:00+00:00,2025-06-10T15:16:00+00:00
7d41b8a0-9c2e-4f7a-b3d5-8e6f0a1c2b03,demo-user,2025-06-12T09:00:00+00:00,2025-06-12T13:00:00+00:00,4.00,60.00,false,,2025-06-12T13:01:00+00:00,2025-06-12T13:01:00+00:00
"##;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::Order;
    use serde_json::json;

    fn store() -> TestStore {
        TestStore::seeded().unwrap()
    }

    #[test]
    fn test_load_csv_types() {
        let rows = load_csv(TIME_ENTRY_DATA).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0]["is_paid"], json!(true));
        assert_eq!(rows[1]["paid_at"], Value::Null);
        assert!(rows[0]["id"].is_string());

        let rows = load_csv(PASSIVE_DATA).unwrap();
        assert_eq!(rows[0]["id"], json!(1));
        assert_eq!(rows[0]["amount"], json!("94.57"));
    }

    #[test]
    fn test_load_csv_keeps_true_as_text_outside_is_paid() {
        let rows = load_csv("category_name,create_date,amount\ntrue,2025-01-01,5\n").unwrap();
        assert_eq!(rows[0]["category_name"], json!("true"));
    }

    #[tokio::test]
    async fn test_select_order_and_filter() {
        let store = store();
        let rows = store
            .select(
                Table::DividendIncome,
                &Query::new()
                    .filter(Filter::eq("category_name", "O"))
                    .order(Order::desc("create_date")),
            )
            .await
            .unwrap();
        assert_eq!(rows.len(), 6);
        assert_eq!(rows[0]["create_date"], json!("2025-06-13"));
        assert_eq!(rows[5]["create_date"], json!("2025-01-15"));
    }

    #[tokio::test]
    async fn test_select_columns() {
        let store = store();
        let rows = store
            .select(Table::PassiveBloom, &Query::new().columns(["amount"]))
            .await
            .unwrap();
        assert_eq!(rows[0], json!({"amount": "94.57"}));
    }

    #[tokio::test]
    async fn test_insert_assigns_ids() {
        let store = store();
        let row = store
            .insert(
                Table::UtilityExpenses,
                json!({"category_name": "Gas", "create_date": "2025-07-01", "amount": 20}),
            )
            .await
            .unwrap();
        assert_eq!(row["id"], json!(19));
        assert!(row["created_at"].is_string());

        let entry = store
            .insert(Table::TimeEntries, json!({"start_time": "x", "end_time": "y"}))
            .await
            .unwrap();
        assert!(Uuid::parse_str(entry["id"].as_str().unwrap()).is_ok());
        assert_eq!(entry["is_paid"], json!(false));
    }

    #[tokio::test]
    async fn test_update_only_matching() {
        let store = store();
        let filters = [Filter::is("is_paid", false)];
        let updated = store
            .update(Table::TimeEntries, &filters, json!({"is_paid": true}))
            .await
            .unwrap();
        assert_eq!(updated.len(), 2);
        let again = store
            .update(Table::TimeEntries, &filters, json!({"is_paid": true}))
            .await
            .unwrap();
        assert!(again.is_empty());
    }

    #[tokio::test]
    async fn test_insert_rejects_non_object() {
        let store = TestStore::new(HashMap::new());
        assert!(store.insert(Table::PassiveBloom, json!([1])).await.is_err());
    }

    #[test]
    fn test_compare_nulls_last() {
        assert_eq!(compare(&Value::Null, &json!(1)), Ordering::Greater);
        assert_eq!(compare(&json!(false), &json!(true)), Ordering::Less);
        assert_eq!(compare(&json!(2), &json!(10)), Ordering::Less);
    }
}
