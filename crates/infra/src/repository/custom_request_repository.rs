//! # CustomTrainingRequestRepository
//!
//! カスタム研修申請（階級チェーン承認）の永続化。
//!
//! 申請内容・承認チェーン・各段の承認記録は JSONB に保存する。
//! 状態変更は読み取り時のステータスと承認段の両方を `WHERE` に含める。

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, types::Json};
use trainflow_domain::{
   custom_request::{
      ChainApproval,
      CustomRequestDetails,
      CustomRequestStatus,
      CustomTrainingRequest,
      CustomTrainingRequestId,
      CustomTrainingRequestRecord,
   },
   rank::ApprovalChain,
   user::UserId,
};
use uuid::Uuid;

use crate::error::InfraError;

#[async_trait]
pub trait CustomTrainingRequestRepository: Send + Sync {
   async fn insert(&self, request: &CustomTrainingRequest) -> Result<(), InfraError>;

   /// ステータスと承認段が読み取り時のままの場合のみ更新する
   ///
   /// 不一致の場合は `InfraError::Conflict` を返す。
   async fn update_with_status_check(
      &self,
      request: &CustomTrainingRequest,
      expected_status: CustomRequestStatus,
      expected_level: usize,
   ) -> Result<(), InfraError>;

   async fn find_by_id(
      &self,
      id: &CustomTrainingRequestId,
   ) -> Result<Option<CustomTrainingRequest>, InfraError>;

   async fn find_by_requester(
      &self,
      requester_id: &UserId,
   ) -> Result<Vec<CustomTrainingRequest>, InfraError>;

   /// 指定ステータスの申請を古い順に取得する
   async fn find_by_statuses(
      &self,
      statuses: &[CustomRequestStatus],
   ) -> Result<Vec<CustomTrainingRequest>, InfraError>;
}

#[derive(sqlx::FromRow)]
struct CustomTrainingRequestRow {
   id: Uuid,
   requester_id: Uuid,
   details: Json<CustomRequestDetails>,
   approval_chain: Json<ApprovalChain>,
   current_approval_level: i32,
   status: String,
   approvals: Json<Vec<ChainApproval>>,
   notes: Option<String>,
   denied_by: Option<Uuid>,
   denied_at: Option<DateTime<Utc>>,
   denial_reason: Option<String>,
   created_at: DateTime<Utc>,
   updated_at: DateTime<Utc>,
}

impl TryFrom<CustomTrainingRequestRow> for CustomTrainingRequest {
   type Error = InfraError;

   fn try_from(row: CustomTrainingRequestRow) -> Result<Self, Self::Error> {
      CustomTrainingRequest::from_db(CustomTrainingRequestRecord {
         id: CustomTrainingRequestId::from_uuid(row.id),
         requester_id: UserId::from_uuid(row.requester_id),
         details: row.details.0,
         chain: row.approval_chain.0,
         current_approval_level: row.current_approval_level,
         status: row
            .status
            .parse::<CustomRequestStatus>()
            .map_err(|e| InfraError::unexpected(format!("不正なステータス: {e}")))?,
         approvals: row.approvals.0,
         notes: row.notes,
         denied_by: row.denied_by.map(UserId::from_uuid),
         denied_at: row.denied_at,
         denial_reason: row.denial_reason,
         created_at: row.created_at,
         updated_at: row.updated_at,
      })
      .map_err(|e| InfraError::unexpected(e.to_string()))
   }
}

const SELECT_COLUMNS: &str = r#"
   SELECT
      id, requester_id, details, approval_chain, current_approval_level, status,
      approvals, notes, denied_by, denied_at, denial_reason, created_at, updated_at
   FROM custom_training_requests
"#;

fn into_requests(
   rows: Vec<CustomTrainingRequestRow>,
) -> Result<Vec<CustomTrainingRequest>, InfraError> {
   rows.into_iter().map(CustomTrainingRequest::try_from).collect()
}

/// `usize` の承認段を DB の `INTEGER` に変換する
fn level_to_i32(level: usize) -> Result<i32, InfraError> {
   i32::try_from(level).map_err(|_| InfraError::invalid_input(format!("承認段が大きすぎます: {level}")))
}

#[derive(Debug, Clone)]
pub struct PostgresCustomTrainingRequestRepository {
   pool: PgPool,
}

impl PostgresCustomTrainingRequestRepository {
   pub fn new(pool: PgPool) -> Self {
      Self { pool }
   }
}

#[async_trait]
impl CustomTrainingRequestRepository for PostgresCustomTrainingRequestRepository {
   #[tracing::instrument(skip_all, level = "debug", fields(id = %request.id()))]
   async fn insert(&self, request: &CustomTrainingRequest) -> Result<(), InfraError> {
      let status: &str = request.status().into();

      sqlx::query(
         r#"
         INSERT INTO custom_training_requests (
            id, requester_id, details, approval_chain, current_approval_level, status,
            approvals, notes, denied_by, denied_at, denial_reason, created_at, updated_at
         )
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
         "#,
      )
      .bind(request.id().as_uuid())
      .bind(request.requester_id().as_uuid())
      .bind(Json(request.details()))
      .bind(Json(request.chain()))
      .bind(level_to_i32(request.current_level())?)
      .bind(status)
      .bind(Json(request.approvals()))
      .bind(request.notes())
      .bind(request.denial().map(|d| *d.denied_by.as_uuid()))
      .bind(request.denial().map(|d| d.denied_at))
      .bind(request.denial().map(|d| d.reason.as_str()))
      .bind(request.created_at())
      .bind(request.updated_at())
      .execute(&self.pool)
      .await?;

      Ok(())
   }

   #[tracing::instrument(
      skip_all,
      level = "debug",
      fields(id = %request.id(), %expected_status, expected_level)
   )]
   async fn update_with_status_check(
      &self,
      request: &CustomTrainingRequest,
      expected_status: CustomRequestStatus,
      expected_level: usize,
   ) -> Result<(), InfraError> {
      let status: &str = request.status().into();
      let expected: &str = expected_status.into();

      let result = sqlx::query(
         r#"
         UPDATE custom_training_requests SET
            current_approval_level = $1,
            status = $2,
            approvals = $3,
            denied_by = $4,
            denied_at = $5,
            denial_reason = $6,
            updated_at = $7
         WHERE id = $8 AND status = $9 AND current_approval_level = $10
         "#,
      )
      .bind(level_to_i32(request.current_level())?)
      .bind(status)
      .bind(Json(request.approvals()))
      .bind(request.denial().map(|d| *d.denied_by.as_uuid()))
      .bind(request.denial().map(|d| d.denied_at))
      .bind(request.denial().map(|d| d.reason.as_str()))
      .bind(request.updated_at())
      .bind(request.id().as_uuid())
      .bind(expected)
      .bind(level_to_i32(expected_level)?)
      .execute(&self.pool)
      .await?;

      if result.rows_affected() == 0 {
         return Err(InfraError::conflict(
            "CustomTrainingRequest",
            request.id().as_uuid().to_string(),
         ));
      }

      Ok(())
   }

   #[tracing::instrument(skip_all, level = "debug", fields(%id))]
   async fn find_by_id(
      &self,
      id: &CustomTrainingRequestId,
   ) -> Result<Option<CustomTrainingRequest>, InfraError> {
      let row =
         sqlx::query_as::<_, CustomTrainingRequestRow>(&format!("{SELECT_COLUMNS} WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

      row.map(CustomTrainingRequest::try_from).transpose()
   }

   #[tracing::instrument(skip_all, level = "debug", fields(%requester_id))]
   async fn find_by_requester(
      &self,
      requester_id: &UserId,
   ) -> Result<Vec<CustomTrainingRequest>, InfraError> {
      let rows = sqlx::query_as::<_, CustomTrainingRequestRow>(&format!(
         "{SELECT_COLUMNS} WHERE requester_id = $1 ORDER BY created_at DESC"
      ))
      .bind(requester_id.as_uuid())
      .fetch_all(&self.pool)
      .await?;

      into_requests(rows)
   }

   #[tracing::instrument(skip_all, level = "debug")]
   async fn find_by_statuses(
      &self,
      statuses: &[CustomRequestStatus],
   ) -> Result<Vec<CustomTrainingRequest>, InfraError> {
      if statuses.is_empty() {
         return Ok(Vec::new());
      }

      let statuses: Vec<&'static str> = statuses.iter().map(|s| s.into()).collect();
      let rows = sqlx::query_as::<_, CustomTrainingRequestRow>(&format!(
         "{SELECT_COLUMNS} WHERE status = ANY($1) ORDER BY created_at"
      ))
      .bind(&statuses)
      .fetch_all(&self.pool)
      .await?;

      into_requests(rows)
   }
}

#[cfg(test)]
mod tests {
   use super::*;

   #[test]
   fn test_トレイトはsendとsyncを実装している() {
      fn assert_send_sync<T: Send + Sync>() {}
      assert_send_sync::<PostgresCustomTrainingRequestRepository>();
   }

   #[test]
   fn test_承認段はi32に変換できる() {
      assert_eq!(level_to_i32(3).unwrap(), 3);
   }
}
