use crate::commands::auth::connect;
use crate::commands::{store_result, Out};
use crate::model::{Amount, PassiveIncome};
use crate::render::{self, OutputFormat};
use crate::{Config, Mode, Result};

/// Handles `bloom passive list`.
pub async fn passive_list(
    config: &Config,
    mode: Mode,
    format: OutputFormat,
) -> Result<Out<Vec<PassiveIncome>>> {
    let bloom = connect(config, mode).await?;
    let rows = store_result(bloom.passive_income().await)?;
    let total: Amount = rows.iter().map(PassiveIncome::amount).sum();
    let report = render::passive(&rows, format)?;
    Ok(Out::new(
        format!("{} passive income rows totaling {total}", rows.len()),
        rows,
    )
    .with_report(report))
}

/// Handles `bloom passive get <id>`.
pub async fn passive_get(
    config: &Config,
    mode: Mode,
    id: i64,
    format: OutputFormat,
) -> Result<Out<PassiveIncome>> {
    let bloom = connect(config, mode).await?;
    let row = store_result(bloom.passive_income_by_id(id).await)?;
    let report = render::passive(std::slice::from_ref(&row), format)?;
    Ok(Out::new(
        format!("Passive income {id}: {} on {}", row.amount(), row.created_at().date_naive()),
        row,
    )
    .with_report(report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::TestEnv;

    #[tokio::test]
    async fn test_passive_list() {
        let env = TestEnv::signed_in().await;
        let out = passive_list(&env.config(), Mode::Testing, OutputFormat::Json)
            .await
            .unwrap();
        assert_eq!(out.structure().unwrap().len(), 6);
        let json: serde_json::Value = serde_json::from_str(out.report().unwrap()).unwrap();
        assert_eq!(json.as_array().unwrap().len(), 6);
    }

    #[tokio::test]
    async fn test_passive_get() {
        let env = TestEnv::signed_in().await;
        let out = passive_get(&env.config(), Mode::Testing, 3, OutputFormat::Table)
            .await
            .unwrap();
        assert_eq!(out.message(), "Passive income 3: $164.92 on 2025-03-31");

        let e = passive_get(&env.config(), Mode::Testing, 42, OutputFormat::Table)
            .await
            .unwrap_err();
        assert_eq!(e.to_string(), "store error: No passive income row with id 42");
    }
}
