//! The `utilities`, `dividends` and `coverage` reports.

use crate::api::Bloom;
use crate::args::ReportArgs;
use crate::commands::auth::connect;
use crate::commands::{store_result, Out};
use crate::model::MonetaryRecord;
use crate::pivot::{filter_year, Coverage, PivotTable};
use crate::{render, Config, Mode, Result};
use tracing::debug;

/// Handles `bloom utilities`: utility expenses pivoted by category and month.
pub async fn utilities(config: &Config, mode: Mode, args: &ReportArgs) -> Result<Out<PivotTable>> {
    let bloom = connect(config, mode).await?;
    let records = store_result(bloom.fetch_utility_expenses().await)?;
    let records = in_year(records, args.year());
    pivot_out("utility expense", &records, args)
}

/// Handles `bloom dividends`: dividend income pivoted by ticker and month.
pub async fn dividends(config: &Config, mode: Mode, args: &ReportArgs) -> Result<Out<PivotTable>> {
    let bloom = connect(config, mode).await?;
    let records = store_result(bloom.fetch_dividend_income().await)?;
    let records = in_year(records, args.year());
    let out = pivot_out("dividend", &records, args)?;
    if args.year().is_some() {
        return Ok(out);
    }
    let lifetime = store_result(bloom.fetch_total_dividend_income_amount().await)?;
    Ok(Out {
        message: format!("{}, {lifetime} in dividends all time", out.message),
        ..out
    })
}

/// Handles `bloom coverage`: how much of the utility expenses the dividends cover.
pub async fn coverage(config: &Config, mode: Mode, args: &ReportArgs) -> Result<Out<Coverage>> {
    let bloom = connect(config, mode).await?;
    let (dividends, expenses) = fetch_both(&bloom).await?;
    let dividends = in_year(dividends, args.year());
    let expenses = in_year(expenses, args.year());
    let coverage = Coverage::compute(&dividends, &expenses);
    let message = match coverage.percent_covered() {
        Some(p) => format!(
            "Dividends of {} cover {p}% of {} in utility expenses",
            coverage.dividend_total(),
            coverage.expense_total()
        ),
        None => "There are no utility expenses to cover".to_string(),
    };
    let report = render::coverage(&coverage, args.format())?;
    Ok(Out::new(message, coverage).with_report(report))
}

async fn fetch_both(bloom: &Bloom) -> Result<(Vec<MonetaryRecord>, Vec<MonetaryRecord>)> {
    let (dividends, expenses) =
        tokio::join!(bloom.fetch_dividend_income(), bloom.fetch_utility_expenses());
    Ok((store_result(dividends)?, store_result(expenses)?))
}

fn in_year(records: Vec<MonetaryRecord>, year: Option<i32>) -> Vec<MonetaryRecord> {
    match year {
        Some(year) => {
            let kept = filter_year(&records, year);
            debug!("Kept {} of {} records from {year}", kept.len(), records.len());
            kept
        }
        None => records,
    }
}

fn pivot_out(noun: &str, records: &[MonetaryRecord], args: &ReportArgs) -> Result<Out<PivotTable>> {
    let table = PivotTable::build(records);
    let message = format!(
        "{} {noun} records in {} categories totaling {}",
        records.len(),
        table.categories().len(),
        table.grand_total()
    );
    let report = render::pivot(&table, args.format())?;
    Ok(Out::new(message, table).with_report(report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::OutputFormat;
    use crate::test::TestEnv;

    #[tokio::test]
    async fn test_reports_require_login() {
        let env = TestEnv::new().await;
        let e = utilities(&env.config(), Mode::Testing, &ReportArgs::default())
            .await
            .unwrap_err();
        assert!(e.to_string().starts_with("auth error:"));
    }

    #[tokio::test]
    async fn test_utilities() {
        let env = TestEnv::signed_in().await;
        let out = utilities(&env.config(), Mode::Testing, &ReportArgs::default())
            .await
            .unwrap();
        let table = out.structure().unwrap();
        // First seen wins, and the store returns the newest bills first.
        assert_eq!(table.categories(), ["Water", "Electric", "Internet", "Gas"]);
        assert!(out.message().starts_with("18 utility expense records in 4 categories"));
        assert!(out.report().unwrap().contains("| Electric "));
    }

    #[tokio::test]
    async fn test_dividends_mentions_lifetime_total() {
        let env = TestEnv::signed_in().await;
        let out = dividends(&env.config(), Mode::Testing, &ReportArgs::default())
            .await
            .unwrap();
        assert!(out.message().ends_with("$367.98 in dividends all time"));
        assert_eq!(out.structure().unwrap().grand_total().to_string(), "$367.98");
    }

    #[tokio::test]
    async fn test_dividends_other_year_is_empty() {
        let env = TestEnv::signed_in().await;
        let args = ReportArgs::new(Some(1999), OutputFormat::Csv);
        let out = dividends(&env.config(), Mode::Testing, &args).await.unwrap();
        assert!(out.structure().unwrap().is_empty());
        assert!(out.report().unwrap().starts_with("Category,January"));
    }

    #[tokio::test]
    async fn test_coverage() {
        let env = TestEnv::signed_in().await;
        let out = coverage(&env.config(), Mode::Testing, &ReportArgs::default())
            .await
            .unwrap();
        let coverage = out.structure().unwrap();
        assert_eq!(coverage.dividend_total().to_string(), "$367.98");
        assert!(coverage.percent_covered().is_some());
        assert!(out.report().unwrap().contains("Dividends cover"));
    }
}
