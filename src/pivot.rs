//! Category × month pivots over `MonetaryRecord`s, and dividend coverage of expenses.
//!
//! Everything here is a pure function of its input. A `PivotTable` is rebuilt from scratch each
//! time it is needed and never updated in place.
//!
//! Months are keyed by name only, so records from different years land in the same month. Use
//! `filter_year` first when a single year is wanted.

use crate::model::{Amount, MonetaryRecord};
use chrono::{Datelike, Month};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::collections::{BTreeMap, HashSet};

/// The twelve canonical months in calendar order.
pub const MONTHS: [Month; 12] = [
    Month::January,
    Month::February,
    Month::March,
    Month::April,
    Month::May,
    Month::June,
    Month::July,
    Month::August,
    Month::September,
    Month::October,
    Month::November,
    Month::December,
];

/// (category, month) → summed amount. Missing entries are zero.
pub type PivotData = BTreeMap<String, BTreeMap<Month, Amount>>;

/// Month → total across all categories. Always holds all twelve months.
pub type MonthTotals = BTreeMap<Month, Amount>;

/// Distinct categories in the order they are first seen.
pub fn get_categories(records: &[MonetaryRecord]) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut categories = Vec::new();
    for record in records {
        if seen.insert(record.category()) {
            categories.push(record.category().to_string());
        }
    }
    categories
}

/// Sums amounts into `cells[category][month]`.
pub fn get_pivot_data(records: &[MonetaryRecord]) -> PivotData {
    let mut pivot = PivotData::new();
    for record in records {
        let month = month_of(record);
        *pivot
            .entry(record.category().to_string())
            .or_default()
            .entry(month)
            .or_default() += record.amount();
    }
    pivot
}

/// Totals each of the twelve months over `categories`, counting missing cells as zero.
pub fn get_month_totals(pivot: &PivotData, categories: &[String]) -> MonthTotals {
    MONTHS
        .iter()
        .map(|&month| {
            let total: Amount = categories
                .iter()
                .map(|category| cell(pivot, category, month))
                .sum();
            (month, total)
        })
        .collect()
}

/// Keeps only the records dated in `year`.
pub fn filter_year(records: &[MonetaryRecord], year: i32) -> Vec<MonetaryRecord> {
    records
        .iter()
        .filter(|r| r.date().year() == year)
        .cloned()
        .collect()
}

/// Sum of all amounts.
pub fn total_amount(records: &[MonetaryRecord]) -> Amount {
    records.iter().map(|r| r.amount()).sum()
}

fn month_of(record: &MonetaryRecord) -> Month {
    // The day does not take part; only the numeric month selects the name.
    MONTHS[record.date().month0() as usize]
}

fn cell(pivot: &PivotData, category: &str, month: Month) -> Amount {
    pivot
        .get(category)
        .and_then(|months| months.get(&month))
        .copied()
        .unwrap_or_default()
}

/// A category × month matrix with row, column and grand totals.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct PivotTable {
    categories: Vec<String>,
    cells: PivotData,
    month_totals: MonthTotals,
}

impl PivotTable {
    pub fn build(records: &[MonetaryRecord]) -> Self {
        let categories = get_categories(records);
        let cells = get_pivot_data(records);
        let month_totals = get_month_totals(&cells, &categories);
        Self {
            categories,
            cells,
            month_totals,
        }
    }

    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    pub fn cells(&self) -> &PivotData {
        &self.cells
    }

    pub fn month_totals(&self) -> &MonthTotals {
        &self.month_totals
    }

    /// The summed amount for one cell, zero when absent.
    pub fn cell(&self, category: &str, month: Month) -> Amount {
        cell(&self.cells, category, month)
    }

    pub fn month_total(&self, month: Month) -> Amount {
        self.month_totals.get(&month).copied().unwrap_or_default()
    }

    /// The row total for `category` across all twelve months.
    pub fn category_total(&self, category: &str) -> Amount {
        self.cells
            .get(category)
            .map(|months| months.values().sum::<Amount>())
            .unwrap_or_default()
    }

    pub fn grand_total(&self) -> Amount {
        self.month_totals.values().sum()
    }

    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }
}

impl Serialize for PivotTable {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        #[derive(Serialize)]
        struct MonthCell {
            month: &'static str,
            amount: Amount,
        }

        #[derive(Serialize)]
        struct Row<'a> {
            category: &'a str,
            months: Vec<MonthCell>,
            total: Amount,
        }

        let rows: Vec<Row<'_>> = self
            .categories
            .iter()
            .map(|category| Row {
                category,
                months: MONTHS
                    .iter()
                    .map(|&m| MonthCell {
                        month: m.name(),
                        amount: self.cell(category, m),
                    })
                    .collect(),
                total: self.category_total(category),
            })
            .collect();

        let mut map = serializer.serialize_map(Some(3))?;
        map.serialize_entry("rows", &rows)?;
        map.serialize_entry(
            "month_totals",
            &MONTHS
                .iter()
                .map(|&m| MonthCell {
                    month: m.name(),
                    amount: self.month_total(m),
                })
                .collect::<Vec<_>>(),
        )?;
        map.serialize_entry("grand_total", &self.grand_total())?;
        map.end()
    }
}

/// How much of the expense load the dividends cover.
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct Coverage {
    dividend_total: Amount,
    expense_total: Amount,
    /// `dividends / expenses * 100`, or `None` when there are no expenses.
    percent_covered: Option<Decimal>,
    months: Vec<MonthCoverage>,
}

/// Per-month comparison of dividends against expenses.
#[derive(Debug, Clone, Eq, PartialEq, Serialize)]
pub struct MonthCoverage {
    month: &'static str,
    dividends: Amount,
    expenses: Amount,
    /// `(expenses - dividends) / expenses * 100`, or `None` for a month with no expenses.
    percent_less: Option<Decimal>,
}

impl MonthCoverage {
    pub fn month(&self) -> &'static str {
        self.month
    }

    pub fn dividends(&self) -> Amount {
        self.dividends
    }

    pub fn expenses(&self) -> Amount {
        self.expenses
    }

    pub fn percent_less(&self) -> Option<Decimal> {
        self.percent_less
    }
}

impl Coverage {
    pub fn compute(dividends: &[MonetaryRecord], expenses: &[MonetaryRecord]) -> Self {
        let dividend_pivot = PivotTable::build(dividends);
        let expense_pivot = PivotTable::build(expenses);
        let dividend_total = dividend_pivot.grand_total();
        let expense_total = expense_pivot.grand_total();

        let months = MONTHS
            .iter()
            .map(|&m| {
                let div = dividend_pivot.month_total(m);
                let exp = expense_pivot.month_total(m);
                MonthCoverage {
                    month: m.name(),
                    dividends: div,
                    expenses: exp,
                    percent_less: percent(exp - div, exp),
                }
            })
            .collect();

        Self {
            dividend_total,
            expense_total,
            percent_covered: percent(dividend_total, expense_total),
            months,
        }
    }

    pub fn dividend_total(&self) -> Amount {
        self.dividend_total
    }

    pub fn expense_total(&self) -> Amount {
        self.expense_total
    }

    pub fn percent_covered(&self) -> Option<Decimal> {
        self.percent_covered
    }

    /// The covered percentage clamped to `0..=100` for a progress indicator.
    pub fn progress(&self) -> Decimal {
        self.percent_covered
            .unwrap_or_default()
            .clamp(Decimal::ZERO, Decimal::ONE_HUNDRED)
    }

    pub fn months(&self) -> &[MonthCoverage] {
        &self.months
    }
}

/// `part / whole * 100` to one decimal place.
fn percent(part: Amount, whole: Amount) -> Option<Decimal> {
    if whole.is_zero() {
        return None;
    }
    let ratio = part.value().checked_div(whole.value())?;
    Some(
        (ratio * Decimal::ONE_HUNDRED)
            .round_dp_with_strategy(1, RoundingStrategy::MidpointAwayFromZero),
    )
}
