//! Plain-text renderings of reports: an aligned markdown-style table, CSV or pretty JSON.

use crate::model::{Amount, PassiveIncome, TimeEntry, TimeSummary};
use crate::pivot::{Coverage, PivotTable, MONTHS};
use crate::Result;
use anyhow::Context;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// How a report is written to stdout.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// An aligned, markdown-style table.
    #[default]
    Table,
    /// Comma-separated values with a header row. Amounts are plain decimals.
    Csv,
    /// Pretty-printed JSON.
    Json,
}

serde_plain::derive_display_from_serialize!(OutputFormat);
serde_plain::derive_fromstr_from_deserialize!(OutputFormat);

const PROGRESS_WIDTH: usize = 20;

pub fn pivot(table: &PivotTable, format: OutputFormat) -> Result<String> {
    if format == OutputFormat::Json {
        return json(table);
    }
    let mut headers = vec!["Category".to_string()];
    headers.extend(MONTHS.iter().map(|m| m.name().to_string()));
    headers.push("Total".to_string());

    let money = money_fn(format);
    let mut rows: Vec<Vec<String>> = table
        .categories()
        .iter()
        .map(|category| {
            let mut row = vec![category.clone()];
            row.extend(MONTHS.iter().map(|&m| money(table.cell(category, m))));
            row.push(money(table.category_total(category)));
            row
        })
        .collect();
    let mut totals = vec!["Total".to_string()];
    totals.extend(MONTHS.iter().map(|&m| money(table.month_total(m))));
    totals.push(money(table.grand_total()));
    rows.push(totals);

    tabular(&headers, &rows, format)
}

pub fn coverage(coverage: &Coverage, format: OutputFormat) -> Result<String> {
    if format == OutputFormat::Json {
        return json(coverage);
    }
    let money = money_fn(format);
    let headers = ["Month", "Dividends", "Expenses", "% Less"].map(String::from);
    let mut rows: Vec<Vec<String>> = coverage
        .months()
        .iter()
        .map(|m| {
            vec![
                m.month().to_string(),
                money(m.dividends()),
                money(m.expenses()),
                percent(m.percent_less()),
            ]
        })
        .collect();
    rows.push(vec![
        "Total".to_string(),
        money(coverage.dividend_total()),
        money(coverage.expense_total()),
        percent(coverage.percent_covered().map(|p| Decimal::ONE_HUNDRED - p)),
    ]);

    let mut out = tabular(&headers, &rows, format)?;
    if format == OutputFormat::Table {
        out.push('\n');
        out.push_str(&format!(
            "Dividends cover {} of expenses {}\n",
            percent(coverage.percent_covered()),
            progress_bar(coverage.progress())
        ));
    }
    Ok(out)
}

pub fn time_entries(entries: &[TimeEntry], format: OutputFormat) -> Result<String> {
    if format == OutputFormat::Json {
        return json(entries);
    }
    let money = money_fn(format);
    let headers = ["ID", "Start", "End", "Hours", "Amount", "Paid"].map(String::from);
    let rows: Vec<Vec<String>> = entries
        .iter()
        .map(|e| {
            vec![
                e.id().to_string(),
                e.start_time().format("%Y-%m-%d %H:%M").to_string(),
                e.end_time().format("%Y-%m-%d %H:%M").to_string(),
                e.total_hours().to_string(),
                money(e.amount()),
                match e.paid_at() {
                    Some(at) if e.is_paid() => at.format("%Y-%m-%d").to_string(),
                    _ if e.is_paid() => "yes".to_string(),
                    _ => "no".to_string(),
                },
            ]
        })
        .collect();
    tabular(&headers, &rows, format)
}

pub fn time_summary(summary: &TimeSummary, format: OutputFormat) -> Result<String> {
    if format == OutputFormat::Json {
        return json(summary);
    }
    let money = money_fn(format);
    let headers = ["", "Entries", "Hours", "Amount"].map(String::from);
    let rows = vec![
        vec![
            "All".to_string(),
            summary.entry_count.to_string(),
            summary.total_hours.to_string(),
            money(summary.total_amount),
        ],
        vec![
            "Unpaid".to_string(),
            summary.unpaid_count.to_string(),
            summary.unpaid_hours.to_string(),
            money(summary.unpaid_amount),
        ],
    ];
    tabular(&headers, &rows, format)
}

pub fn passive(rows: &[PassiveIncome], format: OutputFormat) -> Result<String> {
    if format == OutputFormat::Json {
        return json(rows);
    }
    let money = money_fn(format);
    let headers = ["ID", "Created", "Amount"].map(String::from);
    let rows: Vec<Vec<String>> = rows
        .iter()
        .map(|p| {
            vec![
                p.id().to_string(),
                p.created_at().format("%Y-%m-%d").to_string(),
                money(p.amount()),
            ]
        })
        .collect();
    tabular(&headers, &rows, format)
}

fn json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    let mut s = serde_json::to_string_pretty(value).context("Unable to serialize the report")?;
    s.push('\n');
    Ok(s)
}

/// Tables show `$1,234.50`; CSV keeps the plain decimal.
fn money_fn(format: OutputFormat) -> fn(Amount) -> String {
    match format {
        OutputFormat::Csv => plain_money,
        _ => display_money,
    }
}

fn plain_money(a: Amount) -> String {
    a.value().to_string()
}

fn display_money(a: Amount) -> String {
    a.to_string()
}

fn percent(p: Option<Decimal>) -> String {
    match p {
        Some(p) => format!("{p}%"),
        None => "-".to_string(),
    }
}

fn progress_bar(progress: Decimal) -> String {
    let filled = (progress * Decimal::from(PROGRESS_WIDTH) / Decimal::ONE_HUNDRED)
        .floor()
        .to_usize()
        .unwrap_or(0)
        .min(PROGRESS_WIDTH);
    format!(
        "[{}{}]",
        "#".repeat(filled),
        "-".repeat(PROGRESS_WIDTH - filled)
    )
}

fn tabular(headers: &[String], rows: &[Vec<String>], format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Csv => to_csv(headers, rows),
        _ => Ok(markdown(headers, rows)),
    }
}

fn to_csv(headers: &[String], rows: &[Vec<String>]) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer
        .write_record(headers)
        .context("Unable to write the CSV header")?;
    for row in rows {
        writer
            .write_record(row)
            .context("Unable to write a CSV row")?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| anyhow::anyhow!("Unable to finish the CSV output: {e}"))?;
    String::from_utf8(bytes).context("The CSV output was not UTF-8")
}

/// The first column is left-aligned and the rest are right-aligned.
fn markdown(headers: &[String], rows: &[Vec<String>]) -> String {
    let mut widths: Vec<usize> = headers.iter().map(|h| h.chars().count().max(3)).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            if let Some(w) = widths.get_mut(i) {
                *w = (*w).max(cell.chars().count());
            }
        }
    }

    let line = |cells: &[String]| -> String {
        let padded: Vec<String> = cells
            .iter()
            .zip(&widths)
            .enumerate()
            .map(|(i, (cell, &w))| {
                if i == 0 {
                    format!("{cell:<w$}")
                } else {
                    format!("{cell:>w$}")
                }
            })
            .collect();
        format!("| {} |\n", padded.join(" | "))
    };

    let mut out = line(headers);
    let rule: Vec<String> = widths
        .iter()
        .enumerate()
        .map(|(i, &w)| {
            if i == 0 {
                "-".repeat(w)
            } else {
                format!("{}:", "-".repeat(w - 1))
            }
        })
        .collect();
    out.push_str(&format!("| {} |\n", rule.join(" | ")));
    for row in rows {
        out.push_str(&line(row));
    }
    out
}
