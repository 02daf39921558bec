//! Access to the hosted data store and the authentication provider.
//!
//! Both sit behind traits, `Store` and `AuthProvider`, so that the whole app can run top to bottom
//! against in-memory implementations when `BLOOM_IN_TEST_MODE` is set.

mod auth;
mod bloom;
mod files;
mod rest;
mod test_store;

use crate::Result;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt::{Display, Formatter};

pub use auth::{is_valid_email, AuthProvider, AuthSession};
pub use bloom::Bloom;
pub(crate) use files::{Credentials, File};

pub(crate) use auth::{FirebaseAuth, TestAuth};
#[cfg(test)]
pub(crate) use auth::{DEMO_EMAIL, DEMO_PASSWORD};
pub(crate) use rest::RestStore;
pub(crate) use test_store::{load_csv, TestStore};

use crate::Config;
use std::sync::Arc;
use tracing::debug;

/// Builds the typed data access for `mode`. When `session` is given its id token is the bearer
/// and its user owns new time entries.
pub async fn bloom(config: &Config, mode: Mode, session: Option<&AuthSession>) -> Result<Bloom> {
    let user_id = session.map(|s| s.user_id().to_string());
    let store: Arc<dyn Store> = match mode {
        Mode::Testing => {
            debug!("Using the in-memory test store");
            Arc::new(TestStore::seeded()?)
        }
        Mode::Hosted => {
            let credentials = config.credentials().await?;
            Arc::new(RestStore::new(
                config.store_url(),
                credentials.store_api_key(),
                session.map(AuthSession::id_token),
            )?)
        }
    };
    Ok(Bloom::new(store, user_id))
}

/// Builds the authentication provider for `mode`.
pub async fn auth_provider(config: &Config, mode: Mode) -> Result<Box<dyn AuthProvider>> {
    match mode {
        Mode::Testing => Ok(Box::new(TestAuth)),
        Mode::Hosted => {
            let credentials = config.credentials().await?;
            Ok(Box::new(FirebaseAuth::new(credentials.auth_api_key())))
        }
    }
}

/// The environment variable that switches the app to in-memory collaborators.
pub const TEST_MODE_ENV: &str = "BLOOM_IN_TEST_MODE";

/// Selects the implementation of `Store` and `AuthProvider`.
#[derive(Debug, Default, Clone, Copy, Eq, PartialEq)]
pub enum Mode {
    /// Talk to the hosted data store and the real authentication provider.
    #[default]
    Hosted,
    /// Use seeded in-memory data and the demo user.
    Testing,
}

impl Mode {
    /// `Mode::Testing` if `BLOOM_IN_TEST_MODE` is set and non-empty, otherwise `Mode::Hosted`.
    pub fn from_env() -> Self {
        match std::env::var(TEST_MODE_ENV) {
            Ok(value) if !value.is_empty() => Mode::Testing,
            _ => Mode::Hosted,
        }
    }
}

/// The tables the app reads and writes.
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub enum Table {
    #[serde(rename = "utility_expenses")]
    UtilityExpenses,
    #[serde(rename = "dividend_income")]
    DividendIncome,
    #[serde(rename = "passivebloom")]
    PassiveBloom,
    #[serde(rename = "time_entries")]
    TimeEntries,
}

serde_plain::derive_display_from_serialize!(Table);
serde_plain::derive_fromstr_from_deserialize!(Table);

/// A condition on a single column.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// `column = value`
    Eq(String, Value),
    /// `column IS value`, for `null`, `true` and `false`.
    Is(String, Value),
}

impl Filter {
    pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Eq(column.into(), value.into())
    }

    pub fn is(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Filter::Is(column.into(), value.into())
    }

    pub fn column(&self) -> &str {
        match self {
            Filter::Eq(column, _) | Filter::Is(column, _) => column,
        }
    }

    pub fn value(&self) -> &Value {
        match self {
            Filter::Eq(_, value) | Filter::Is(_, value) => value,
        }
    }

    /// Evaluates the filter against a row held in memory.
    pub(crate) fn matches(&self, row: &Value) -> bool {
        let found = row.get(self.column()).unwrap_or(&Value::Null);
        match self {
            Filter::Eq(_, expected) => loosely_equal(found, expected),
            Filter::Is(_, expected) => found == expected,
        }
    }
}

/// Numbers and strings compare by their text, the way a query string would see them.
fn loosely_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::String(a), Value::String(b)) => a == b,
        (Value::Null, _) | (_, Value::Null) => false,
        (a, b) => text(a) == text(b),
    }
}

fn text(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Order {
    column: String,
    ascending: bool,
}

impl Order {
    pub fn asc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            ascending: true,
        }
    }

    pub fn desc(column: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            ascending: false,
        }
    }

    pub fn column(&self) -> &str {
        &self.column
    }

    pub fn ascending(&self) -> bool {
        self.ascending
    }
}

impl Display for Order {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let direction = if self.ascending { "asc" } else { "desc" };
        write!(f, "{}.{direction}", self.column)
    }
}

/// Filters, ordering and an optional column list for a `select`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    columns: Option<Vec<String>>,
    filters: Vec<Filter>,
    order: Vec<Order>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = Some(columns.into_iter().map(Into::into).collect());
        self
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn order(mut self, order: Order) -> Self {
        self.order.push(order);
        self
    }

    pub fn selected_columns(&self) -> Option<&[String]> {
        self.columns.as_deref()
    }

    pub fn filters(&self) -> &[Filter] {
        &self.filters
    }

    pub fn orders(&self) -> &[Order] {
        &self.order
    }
}

/// The hosted relational data store. Rows travel as untyped JSON and are validated by the caller.
#[async_trait::async_trait]
pub trait Store: Send + Sync {
    /// Returns the rows of `table` matching `query`, in the requested order.
    async fn select(&self, table: Table, query: &Query) -> Result<Vec<Value>>;

    /// Inserts `row` and returns the row as stored, with generated columns filled in.
    async fn insert(&self, table: Table, row: Value) -> Result<Value>;

    /// Applies `patch` to every row matching `filters` and returns the changed rows.
    async fn update(&self, table: Table, filters: &[Filter], patch: Value) -> Result<Vec<Value>>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::str::FromStr;

    #[test]
    fn test_table_names() {
        assert_eq!(Table::PassiveBloom.to_string(), "passivebloom");
        assert_eq!(Table::from_str("time_entries").unwrap(), Table::TimeEntries);
    }

    #[test]
    fn test_filter_matches() {
        let row = json!({"id": 7, "is_paid": false, "paid_at": null});
        assert!(Filter::eq("id", 7).matches(&row));
        assert!(Filter::eq("id", "7").matches(&row));
        assert!(!Filter::eq("id", 8).matches(&row));
        assert!(Filter::is("is_paid", false).matches(&row));
        assert!(Filter::is("paid_at", Value::Null).matches(&row));
        assert!(Filter::is("missing", Value::Null).matches(&row));
        assert!(!Filter::eq("paid_at", Value::Null).matches(&row));
    }

    #[test]
    fn test_order_display() {
        assert_eq!(Order::desc("create_date").to_string(), "create_date.desc");
        assert_eq!(Order::asc("is_paid").to_string(), "is_paid.asc");
    }
}
