//! # CostRepository
//!
//! 職員ごとの研修費用。金額はセント単位の `BIGINT` で保存する。

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use trainflow_domain::{
   accounting::{CostId, CostType, OfficerTrainingCost, PaymentStatus},
   request::TrainingRequestId,
   user::UserId,
   value_objects::{FiscalYear, Money},
};
use uuid::Uuid;

use crate::error::InfraError;

#[async_trait]
pub trait CostRepository: Send + Sync {
   async fn insert(&self, cost: &OfficerTrainingCost) -> Result<(), InfraError>;

   async fn find_by_id(&self, id: &CostId) -> Result<Option<OfficerTrainingCost>, InfraError>;

   async fn find_by_user(&self, user_id: &UserId) -> Result<Vec<OfficerTrainingCost>, InfraError>;

   async fn find_all(&self) -> Result<Vec<OfficerTrainingCost>, InfraError>;

   /// DB 上の支払状況が `expected_status` の場合のみ更新する
   async fn update_payment_status(
      &self,
      cost: &OfficerTrainingCost,
      expected_status: PaymentStatus,
   ) -> Result<(), InfraError>;

   /// 年度の費用合計（却下分を除く）
   async fn total_for_fiscal_year(&self, fiscal_year: &FiscalYear) -> Result<Money, InfraError>;

   /// 費用が記録されている最新の年度
   async fn latest_fiscal_year(&self) -> Result<Option<FiscalYear>, InfraError>;
}

#[derive(sqlx::FromRow)]
struct CostRow {
   id: Uuid,
   user_id: Uuid,
   training_request_id: Option<Uuid>,
   amount_cents: i64,
   cost_type: String,
   description: String,
   budget_code: Option<String>,
   fiscal_year: String,
   payment_status: String,
   approved_by: Option<Uuid>,
   approved_at: Option<DateTime<Utc>>,
   created_at: DateTime<Utc>,
   updated_at: DateTime<Utc>,
}

impl TryFrom<CostRow> for OfficerTrainingCost {
   type Error = InfraError;

   fn try_from(row: CostRow) -> Result<Self, Self::Error> {
      Ok(Self {
         id: CostId::from_uuid(row.id),
         user_id: UserId::from_uuid(row.user_id),
         training_request_id: row.training_request_id.map(TrainingRequestId::from_uuid),
         amount: Money::from_cents(row.amount_cents),
         cost_type: row
            .cost_type
            .parse::<CostType>()
            .map_err(|e| InfraError::unexpected(e.to_string()))?,
         description: row.description,
         budget_code: row.budget_code,
         fiscal_year: FiscalYear::new(row.fiscal_year)
            .map_err(|e| InfraError::unexpected(e.to_string()))?,
         payment_status: row
            .payment_status
            .parse::<PaymentStatus>()
            .map_err(|e| InfraError::unexpected(e.to_string()))?,
         approved_by: row.approved_by.map(UserId::from_uuid),
         approved_at: row.approved_at,
         created_at: row.created_at,
         updated_at: row.updated_at,
      })
   }
}

const SELECT_COLUMNS: &str = r#"
   SELECT
      id, user_id, training_request_id, amount_cents, cost_type, description,
      budget_code, fiscal_year, payment_status, approved_by, approved_at,
      created_at, updated_at
   FROM officer_training_costs
"#;

fn into_costs(rows: Vec<CostRow>) -> Result<Vec<OfficerTrainingCost>, InfraError> {
   rows.into_iter().map(OfficerTrainingCost::try_from).collect()
}

#[derive(Debug, Clone)]
pub struct PostgresCostRepository {
   pool: PgPool,
}

impl PostgresCostRepository {
   pub fn new(pool: PgPool) -> Self {
      Self { pool }
   }
}

#[async_trait]
impl CostRepository for PostgresCostRepository {
   #[tracing::instrument(skip_all, level = "debug", fields(id = %cost.id))]
   async fn insert(&self, cost: &OfficerTrainingCost) -> Result<(), InfraError> {
      let cost_type: &str = cost.cost_type.into();
      let payment_status: &str = cost.payment_status.into();

      sqlx::query(
         r#"
         INSERT INTO officer_training_costs (
            id, user_id, training_request_id, amount_cents, cost_type, description,
            budget_code, fiscal_year, payment_status, approved_by, approved_at,
            created_at, updated_at
         )
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
         "#,
      )
      .bind(cost.id.as_uuid())
      .bind(cost.user_id.as_uuid())
      .bind(cost.training_request_id.as_ref().map(|id| *id.as_uuid()))
      .bind(cost.amount.cents())
      .bind(cost_type)
      .bind(&cost.description)
      .bind(cost.budget_code.as_deref())
      .bind(cost.fiscal_year.as_str())
      .bind(payment_status)
      .bind(cost.approved_by.as_ref().map(|id| *id.as_uuid()))
      .bind(cost.approved_at)
      .bind(cost.created_at)
      .bind(cost.updated_at)
      .execute(&self.pool)
      .await?;

      Ok(())
   }

   #[tracing::instrument(skip_all, level = "debug", fields(%id))]
   async fn find_by_id(&self, id: &CostId) -> Result<Option<OfficerTrainingCost>, InfraError> {
      let row = sqlx::query_as::<_, CostRow>(&format!("{SELECT_COLUMNS} WHERE id = $1"))
         .bind(id.as_uuid())
         .fetch_optional(&self.pool)
         .await?;

      row.map(OfficerTrainingCost::try_from).transpose()
   }

   #[tracing::instrument(skip_all, level = "debug", fields(%user_id))]
   async fn find_by_user(&self, user_id: &UserId) -> Result<Vec<OfficerTrainingCost>, InfraError> {
      let rows = sqlx::query_as::<_, CostRow>(&format!(
         "{SELECT_COLUMNS} WHERE user_id = $1 ORDER BY created_at DESC"
      ))
      .bind(user_id.as_uuid())
      .fetch_all(&self.pool)
      .await?;

      into_costs(rows)
   }

   #[tracing::instrument(skip_all, level = "debug")]
   async fn find_all(&self) -> Result<Vec<OfficerTrainingCost>, InfraError> {
      let rows = sqlx::query_as::<_, CostRow>(&format!("{SELECT_COLUMNS} ORDER BY created_at DESC"))
         .fetch_all(&self.pool)
         .await?;

      into_costs(rows)
   }

   #[tracing::instrument(skip_all, level = "debug", fields(id = %cost.id, %expected_status))]
   async fn update_payment_status(
      &self,
      cost: &OfficerTrainingCost,
      expected_status: PaymentStatus,
   ) -> Result<(), InfraError> {
      let payment_status: &str = cost.payment_status.into();
      let expected: &str = expected_status.into();

      let result = sqlx::query(
         r#"
         UPDATE officer_training_costs SET
            payment_status = $1,
            approved_by = $2,
            approved_at = $3,
            updated_at = $4
         WHERE id = $5 AND payment_status = $6
         "#,
      )
      .bind(payment_status)
      .bind(cost.approved_by.as_ref().map(|id| *id.as_uuid()))
      .bind(cost.approved_at)
      .bind(cost.updated_at)
      .bind(cost.id.as_uuid())
      .bind(expected)
      .execute(&self.pool)
      .await?;

      if result.rows_affected() == 0 {
         return Err(InfraError::conflict(
            "OfficerTrainingCost",
            cost.id.as_uuid().to_string(),
         ));
      }

      Ok(())
   }

   #[tracing::instrument(skip_all, level = "debug", fields(%fiscal_year))]
   async fn total_for_fiscal_year(&self, fiscal_year: &FiscalYear) -> Result<Money, InfraError> {
      let cents: i64 = sqlx::query_scalar(
         r#"
         SELECT COALESCE(SUM(amount_cents), 0)::BIGINT
         FROM officer_training_costs
         WHERE fiscal_year = $1 AND payment_status <> 'rejected'
         "#,
      )
      .bind(fiscal_year.as_str())
      .fetch_one(&self.pool)
      .await?;

      Ok(Money::from_cents(cents))
   }

   #[tracing::instrument(skip_all, level = "debug")]
   async fn latest_fiscal_year(&self) -> Result<Option<FiscalYear>, InfraError> {
      let value: Option<String> =
         sqlx::query_scalar("SELECT MAX(fiscal_year) FROM officer_training_costs")
            .fetch_one(&self.pool)
            .await?;

      value
         .map(FiscalYear::new)
         .transpose()
         .map_err(|e| InfraError::unexpected(e.to_string()))
   }
}

#[cfg(test)]
mod tests {
   use super::*;

   #[test]
   fn test_トレイトはsendとsyncを実装している() {
      fn assert_send_sync<T: Send + Sync>() {}
      assert_send_sync::<PostgresCostRepository>();
   }
}
