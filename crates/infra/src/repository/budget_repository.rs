//! # BudgetRepository
//!
//! 年度予算の設定。行がない年度は既定額（$150,000）として扱う。

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use trainflow_domain::{
   accounting::BudgetSettings,
   user::UserId,
   value_objects::{FiscalYear, Money},
};
use uuid::Uuid;

use crate::error::InfraError;

#[async_trait]
pub trait BudgetRepository: Send + Sync {
   async fn find(&self, fiscal_year: &FiscalYear) -> Result<Option<BudgetSettings>, InfraError>;

   async fn upsert(&self, settings: &BudgetSettings) -> Result<(), InfraError>;
}

#[derive(sqlx::FromRow)]
struct BudgetSettingsRow {
   fiscal_year: String,
   total_budget_cents: i64,
   updated_by: Option<Uuid>,
   updated_at: DateTime<Utc>,
}

impl TryFrom<BudgetSettingsRow> for BudgetSettings {
   type Error = InfraError;

   fn try_from(row: BudgetSettingsRow) -> Result<Self, Self::Error> {
      Ok(Self {
         fiscal_year: FiscalYear::new(row.fiscal_year)
            .map_err(|e| InfraError::unexpected(e.to_string()))?,
         total_budget: Money::from_cents(row.total_budget_cents),
         updated_by: row.updated_by.map(UserId::from_uuid),
         updated_at: row.updated_at,
      })
   }
}

#[derive(Debug, Clone)]
pub struct PostgresBudgetRepository {
   pool: PgPool,
}

impl PostgresBudgetRepository {
   pub fn new(pool: PgPool) -> Self {
      Self { pool }
   }
}

#[async_trait]
impl BudgetRepository for PostgresBudgetRepository {
   #[tracing::instrument(skip_all, level = "debug", fields(%fiscal_year))]
   async fn find(&self, fiscal_year: &FiscalYear) -> Result<Option<BudgetSettings>, InfraError> {
      let row = sqlx::query_as::<_, BudgetSettingsRow>(
         r#"
         SELECT fiscal_year, total_budget_cents, updated_by, updated_at
         FROM budget_settings
         WHERE fiscal_year = $1
         "#,
      )
      .bind(fiscal_year.as_str())
      .fetch_optional(&self.pool)
      .await?;

      row.map(BudgetSettings::try_from).transpose()
   }

   #[tracing::instrument(skip_all, level = "debug", fields(fiscal_year = %settings.fiscal_year))]
   async fn upsert(&self, settings: &BudgetSettings) -> Result<(), InfraError> {
      sqlx::query(
         r#"
         INSERT INTO budget_settings (fiscal_year, total_budget_cents, updated_by, updated_at)
         VALUES ($1, $2, $3, $4)
         ON CONFLICT (fiscal_year) DO UPDATE SET
            total_budget_cents = EXCLUDED.total_budget_cents,
            updated_by = EXCLUDED.updated_by,
            updated_at = EXCLUDED.updated_at
         "#,
      )
      .bind(settings.fiscal_year.as_str())
      .bind(settings.total_budget.cents())
      .bind(settings.updated_by.as_ref().map(|id| *id.as_uuid()))
      .bind(settings.updated_at)
      .execute(&self.pool)
      .await?;

      Ok(())
   }
}
