//! # TrainingRequestRepository
//!
//! 標準研修申請（catalog / internal / external）の永続化。
//!
//! ## 設計方針
//!
//! - **種類別の内容は JSONB**: `RequestDetails` を `details` カラムにそのまま保存し、
//!   絞り込みに使う `kind` と `training_id` だけを別カラムに持つ
//! - **条件付き更新**: 状態変更は読み取り時のステータスを `WHERE` に含める。
//!   別の承認者が先に進めていた場合は `InfraError::Conflict` を返す

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{PgPool, types::Json};
use trainflow_domain::{
   request::{
      RequestDetails,
      RequestStatus,
      TrainingRequest,
      TrainingRequestId,
      TrainingRequestRecord,
   },
   user::UserId,
};
use uuid::Uuid;

use crate::error::InfraError;

#[async_trait]
pub trait TrainingRequestRepository: Send + Sync {
   async fn insert(&self, request: &TrainingRequest) -> Result<(), InfraError>;

   /// ステータス条件付きで承認情報を更新する
   ///
   /// DB 上のステータスが `expected_status` と一致する場合のみ更新する。
   /// 不一致の場合は `InfraError::Conflict` を返す。
   async fn update_with_status_check(
      &self,
      request: &TrainingRequest,
      expected_status: RequestStatus,
   ) -> Result<(), InfraError>;

   async fn find_by_id(&self, id: &TrainingRequestId)
   -> Result<Option<TrainingRequest>, InfraError>;

   /// 申請者本人の申請を新しい順に取得する
   async fn find_by_requester(&self, requester_id: &UserId)
   -> Result<Vec<TrainingRequest>, InfraError>;

   /// 指定した申請者かつ指定ステータスの申請を新しい順に取得する
   ///
   /// いずれかの配列が空なら空の Vec を返す。
   async fn find_by_requesters_and_statuses(
      &self,
      requester_ids: &[UserId],
      statuses: &[RequestStatus],
   ) -> Result<Vec<TrainingRequest>, InfraError>;

   /// 指定ステータスの申請を古い順に取得する（承認待ち一覧用）
   async fn find_by_statuses(
      &self,
      statuses: &[RequestStatus],
   ) -> Result<Vec<TrainingRequest>, InfraError>;

   /// 研修日が `from..=to` にある承認済みカタログ申請を取得する（リマインダー用）
   async fn find_approved_catalog_between(
      &self,
      from: NaiveDate,
      to: NaiveDate,
   ) -> Result<Vec<TrainingRequest>, InfraError>;
}

#[derive(sqlx::FromRow)]
struct TrainingRequestRow {
   id: Uuid,
   requester_id: Uuid,
   details: Json<RequestDetails>,
   status: String,
   notes: Option<String>,
   review_notes: Option<String>,
   supervisor_id: Option<Uuid>,
   supervisor_approved_at: Option<DateTime<Utc>>,
   admin_id: Option<Uuid>,
   admin_approved_at: Option<DateTime<Utc>>,
   denial_reason: Option<String>,
   submitted_within_30_days: bool,
   created_at: DateTime<Utc>,
   updated_at: DateTime<Utc>,
}

impl TryFrom<TrainingRequestRow> for TrainingRequest {
   type Error = InfraError;

   fn try_from(row: TrainingRequestRow) -> Result<Self, Self::Error> {
      TrainingRequest::from_db(TrainingRequestRecord {
         id: TrainingRequestId::from_uuid(row.id),
         requester_id: UserId::from_uuid(row.requester_id),
         details: row.details.0,
         status: row
            .status
            .parse::<RequestStatus>()
            .map_err(|e| InfraError::unexpected(format!("不正なステータス: {e}")))?,
         notes: row.notes,
         review_notes: row.review_notes,
         supervisor_id: row.supervisor_id.map(UserId::from_uuid),
         supervisor_approved_at: row.supervisor_approved_at,
         admin_id: row.admin_id.map(UserId::from_uuid),
         admin_approved_at: row.admin_approved_at,
         denial_reason: row.denial_reason,
         submitted_within_30_days: row.submitted_within_30_days,
         created_at: row.created_at,
         updated_at: row.updated_at,
      })
      .map_err(|e| InfraError::unexpected(e.to_string()))
   }
}

const SELECT_COLUMNS: &str = r#"
   SELECT
      id, requester_id, details, status, notes, review_notes,
      supervisor_id, supervisor_approved_at, admin_id, admin_approved_at,
      denial_reason, submitted_within_30_days, created_at, updated_at
   FROM training_requests
"#;

fn into_requests(rows: Vec<TrainingRequestRow>) -> Result<Vec<TrainingRequest>, InfraError> {
   rows.into_iter().map(TrainingRequest::try_from).collect()
}

fn status_strings(statuses: &[RequestStatus]) -> Vec<&'static str> {
   statuses.iter().map(|s| s.into()).collect()
}

#[derive(Debug, Clone)]
pub struct PostgresTrainingRequestRepository {
   pool: PgPool,
}

impl PostgresTrainingRequestRepository {
   pub fn new(pool: PgPool) -> Self {
      Self { pool }
   }
}

#[async_trait]
impl TrainingRequestRepository for PostgresTrainingRequestRepository {
   #[tracing::instrument(skip_all, level = "debug", fields(id = %request.id()))]
   async fn insert(&self, request: &TrainingRequest) -> Result<(), InfraError> {
      let kind: &str = request.details().kind().into();
      let status: &str = request.status().into();

      sqlx::query(
         r#"
         INSERT INTO training_requests (
            id, requester_id, kind, training_id, details, status, notes, review_notes,
            supervisor_id, supervisor_approved_at, admin_id, admin_approved_at,
            denial_reason, submitted_within_30_days, created_at, updated_at
         )
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
         "#,
      )
      .bind(request.id().as_uuid())
      .bind(request.requester_id().as_uuid())
      .bind(kind)
      .bind(request.details().training_id().map(|id| *id.as_uuid()))
      .bind(Json(request.details()))
      .bind(status)
      .bind(request.notes())
      .bind(request.review_notes())
      .bind(request.supervisor_stamp().map(|s| *s.approver_id.as_uuid()))
      .bind(request.supervisor_stamp().map(|s| s.at))
      .bind(request.admin_stamp().map(|s| *s.approver_id.as_uuid()))
      .bind(request.admin_stamp().map(|s| s.at))
      .bind(request.denial_reason().map(|r| r.as_str()))
      .bind(request.submitted_within_30_days())
      .bind(request.created_at())
      .bind(request.updated_at())
      .execute(&self.pool)
      .await?;

      Ok(())
   }

   #[tracing::instrument(skip_all, level = "debug", fields(id = %request.id(), %expected_status))]
   async fn update_with_status_check(
      &self,
      request: &TrainingRequest,
      expected_status: RequestStatus,
   ) -> Result<(), InfraError> {
      let status: &str = request.status().into();
      let expected: &str = expected_status.into();

      let result = sqlx::query(
         r#"
         UPDATE training_requests SET
            status = $1,
            review_notes = $2,
            supervisor_id = $3,
            supervisor_approved_at = $4,
            admin_id = $5,
            admin_approved_at = $6,
            denial_reason = $7,
            updated_at = $8
         WHERE id = $9 AND status = $10
         "#,
      )
      .bind(status)
      .bind(request.review_notes())
      .bind(request.supervisor_stamp().map(|s| *s.approver_id.as_uuid()))
      .bind(request.supervisor_stamp().map(|s| s.at))
      .bind(request.admin_stamp().map(|s| *s.approver_id.as_uuid()))
      .bind(request.admin_stamp().map(|s| s.at))
      .bind(request.denial_reason().map(|r| r.as_str()))
      .bind(request.updated_at())
      .bind(request.id().as_uuid())
      .bind(expected)
      .execute(&self.pool)
      .await?;

      if result.rows_affected() == 0 {
         return Err(InfraError::conflict(
            "TrainingRequest",
            request.id().as_uuid().to_string(),
         ));
      }

      Ok(())
   }

   #[tracing::instrument(skip_all, level = "debug", fields(%id))]
   async fn find_by_id(
      &self,
      id: &TrainingRequestId,
   ) -> Result<Option<TrainingRequest>, InfraError> {
      let row = sqlx::query_as::<_, TrainingRequestRow>(&format!("{SELECT_COLUMNS} WHERE id = $1"))
         .bind(id.as_uuid())
         .fetch_optional(&self.pool)
         .await?;

      row.map(TrainingRequest::try_from).transpose()
   }

   #[tracing::instrument(skip_all, level = "debug", fields(%requester_id))]
   async fn find_by_requester(
      &self,
      requester_id: &UserId,
   ) -> Result<Vec<TrainingRequest>, InfraError> {
      let rows = sqlx::query_as::<_, TrainingRequestRow>(&format!(
         "{SELECT_COLUMNS} WHERE requester_id = $1 ORDER BY created_at DESC"
      ))
      .bind(requester_id.as_uuid())
      .fetch_all(&self.pool)
      .await?;

      into_requests(rows)
   }

   #[tracing::instrument(skip_all, level = "debug", fields(requesters = requester_ids.len()))]
   async fn find_by_requesters_and_statuses(
      &self,
      requester_ids: &[UserId],
      statuses: &[RequestStatus],
   ) -> Result<Vec<TrainingRequest>, InfraError> {
      if requester_ids.is_empty() || statuses.is_empty() {
         return Ok(Vec::new());
      }

      let requester_ids: Vec<Uuid> = requester_ids.iter().map(|id| *id.as_uuid()).collect();
      let rows = sqlx::query_as::<_, TrainingRequestRow>(&format!(
         "{SELECT_COLUMNS} WHERE requester_id = ANY($1) AND status = ANY($2) ORDER BY created_at DESC"
      ))
      .bind(&requester_ids)
      .bind(status_strings(statuses))
      .fetch_all(&self.pool)
      .await?;

      into_requests(rows)
   }

   #[tracing::instrument(skip_all, level = "debug")]
   async fn find_by_statuses(
      &self,
      statuses: &[RequestStatus],
   ) -> Result<Vec<TrainingRequest>, InfraError> {
      if statuses.is_empty() {
         return Ok(Vec::new());
      }

      let rows = sqlx::query_as::<_, TrainingRequestRow>(&format!(
         "{SELECT_COLUMNS} WHERE status = ANY($1) ORDER BY created_at"
      ))
      .bind(status_strings(statuses))
      .fetch_all(&self.pool)
      .await?;

      into_requests(rows)
   }

   #[tracing::instrument(skip_all, level = "debug", fields(%from, %to))]
   async fn find_approved_catalog_between(
      &self,
      from: NaiveDate,
      to: NaiveDate,
   ) -> Result<Vec<TrainingRequest>, InfraError> {
      let rows = sqlx::query_as::<_, TrainingRequestRow>(&format!(
         r#"{SELECT_COLUMNS}
         WHERE kind = 'catalog'
           AND status = 'approved'
           AND (details->>'training_date')::date BETWEEN $1 AND $2
         ORDER BY (details->>'training_date')::date"#
      ))
      .bind(from)
      .bind(to)
      .fetch_all(&self.pool)
      .await?;

      into_requests(rows)
   }
}
