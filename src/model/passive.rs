use crate::model::record::{RecordError, RowReader};
use crate::model::Amount;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One row of the passive-income log.
#[derive(Debug, Clone, Eq, PartialEq, Serialize, Deserialize)]
pub struct PassiveIncome {
    id: i64,
    created_at: DateTime<Utc>,
    amount: Amount,
}

impl PassiveIncome {
    pub fn new(id: i64, created_at: DateTime<Utc>, amount: Amount) -> Self {
        Self {
            id,
            created_at,
            amount,
        }
    }

    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn amount(&self) -> Amount {
        self.amount
    }

    pub fn from_row(table: &str, row: &Value) -> Result<Self, RecordError> {
        let r = RowReader::new(table, row)?;
        Ok(Self {
            id: r.i64("id")?,
            created_at: r.timestamp("created_at")?,
            amount: r.amount("amount")?,
        })
    }
}
