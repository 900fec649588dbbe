//! # CertificateRepository
//!
//! 修了証の永続化。失効ジョブと取り消し操作が同時に走っても
//! 片方だけが反映されるよう、ステータス更新は条件付きで行う。

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::PgPool;
use trainflow_domain::{
   certificate::{Certificate, CertificateId, CertificateRecord, CertificateStatus},
   user::UserId,
};
use uuid::Uuid;

use crate::{db::map_unique_violation, error::InfraError};

#[async_trait]
pub trait CertificateRepository: Send + Sync {
   /// 修了証番号が重複する場合は `Conflict` を返す
   async fn insert(&self, certificate: &Certificate) -> Result<(), InfraError>;

   async fn find_by_id(&self, id: &CertificateId) -> Result<Option<Certificate>, InfraError>;

   /// ユーザーの修了証を修了日の新しい順に取得する
   async fn find_by_user(&self, user_id: &UserId) -> Result<Vec<Certificate>, InfraError>;

   /// 有効期限が `until` 以前の active な修了証を取得する（期限切れも含む）
   async fn find_active_expiring_until(
      &self,
      until: NaiveDate,
   ) -> Result<Vec<Certificate>, InfraError>;

   /// DB 上のステータスが `expected_status` の場合のみステータスを更新する
   async fn update_status(
      &self,
      certificate: &Certificate,
      expected_status: CertificateStatus,
   ) -> Result<(), InfraError>;
}

#[derive(sqlx::FromRow)]
struct CertificateRow {
   id: Uuid,
   user_id: Uuid,
   certificate_number: String,
   training_title: String,
   completion_date: NaiveDate,
   issued_date: NaiveDate,
   expiration_date: Option<NaiveDate>,
   credits: f64,
   instructor: Option<String>,
   status: String,
   created_at: DateTime<Utc>,
   updated_at: DateTime<Utc>,
}

impl TryFrom<CertificateRow> for Certificate {
   type Error = InfraError;

   fn try_from(row: CertificateRow) -> Result<Self, Self::Error> {
      Ok(Certificate::from_db(CertificateRecord {
         id: CertificateId::from_uuid(row.id),
         user_id: UserId::from_uuid(row.user_id),
         certificate_number: row.certificate_number,
         training_title: row.training_title,
         completion_date: row.completion_date,
         issued_date: row.issued_date,
         expiration_date: row.expiration_date,
         credits: row.credits,
         instructor: row.instructor,
         status: row
            .status
            .parse::<CertificateStatus>()
            .map_err(|e| InfraError::unexpected(format!("不正なステータス: {e}")))?,
         created_at: row.created_at,
         updated_at: row.updated_at,
      }))
   }
}

const SELECT_COLUMNS: &str = r#"
   SELECT
      id, user_id, certificate_number, training_title, completion_date, issued_date,
      expiration_date, credits, instructor, status, created_at, updated_at
   FROM certificates
"#;

#[derive(Debug, Clone)]
pub struct PostgresCertificateRepository {
   pool: PgPool,
}

impl PostgresCertificateRepository {
   pub fn new(pool: PgPool) -> Self {
      Self { pool }
   }
}

#[async_trait]
impl CertificateRepository for PostgresCertificateRepository {
   #[tracing::instrument(skip_all, level = "debug", fields(id = %certificate.id()))]
   async fn insert(&self, certificate: &Certificate) -> Result<(), InfraError> {
      let status: &str = certificate.status().into();

      sqlx::query(
         r#"
         INSERT INTO certificates (
            id, user_id, certificate_number, training_title, completion_date, issued_date,
            expiration_date, credits, instructor, status, created_at, updated_at
         )
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
         "#,
      )
      .bind(certificate.id().as_uuid())
      .bind(certificate.user_id().as_uuid())
      .bind(certificate.certificate_number())
      .bind(certificate.training_title())
      .bind(certificate.completion_date())
      .bind(certificate.issued_date())
      .bind(certificate.expiration_date())
      .bind(certificate.credits())
      .bind(certificate.instructor())
      .bind(status)
      .bind(certificate.created_at())
      .bind(certificate.updated_at())
      .execute(&self.pool)
      .await
      .map_err(|e| map_unique_violation(e, "Certificate", certificate.certificate_number()))?;

      Ok(())
   }

   #[tracing::instrument(skip_all, level = "debug", fields(%id))]
   async fn find_by_id(&self, id: &CertificateId) -> Result<Option<Certificate>, InfraError> {
      let row = sqlx::query_as::<_, CertificateRow>(&format!("{SELECT_COLUMNS} WHERE id = $1"))
         .bind(id.as_uuid())
         .fetch_optional(&self.pool)
         .await?;

      row.map(Certificate::try_from).transpose()
   }

   #[tracing::instrument(skip_all, level = "debug", fields(%user_id))]
   async fn find_by_user(&self, user_id: &UserId) -> Result<Vec<Certificate>, InfraError> {
      let rows = sqlx::query_as::<_, CertificateRow>(&format!(
         "{SELECT_COLUMNS} WHERE user_id = $1 ORDER BY completion_date DESC"
      ))
      .bind(user_id.as_uuid())
      .fetch_all(&self.pool)
      .await?;

      rows.into_iter().map(Certificate::try_from).collect()
   }

   #[tracing::instrument(skip_all, level = "debug", fields(%until))]
   async fn find_active_expiring_until(
      &self,
      until: NaiveDate,
   ) -> Result<Vec<Certificate>, InfraError> {
      let rows = sqlx::query_as::<_, CertificateRow>(&format!(
         r#"{SELECT_COLUMNS}
         WHERE status = 'active'
           AND expiration_date IS NOT NULL
           AND expiration_date <= $1
         ORDER BY expiration_date"#
      ))
      .bind(until)
      .fetch_all(&self.pool)
      .await?;

      rows.into_iter().map(Certificate::try_from).collect()
   }

   #[tracing::instrument(skip_all, level = "debug", fields(id = %certificate.id(), %expected_status))]
   async fn update_status(
      &self,
      certificate: &Certificate,
      expected_status: CertificateStatus,
   ) -> Result<(), InfraError> {
      let status: &str = certificate.status().into();
      let expected: &str = expected_status.into();

      let result = sqlx::query(
         r#"
         UPDATE certificates SET status = $1, updated_at = $2
         WHERE id = $3 AND status = $4
         "#,
      )
      .bind(status)
      .bind(certificate.updated_at())
      .bind(certificate.id().as_uuid())
      .bind(expected)
      .execute(&self.pool)
      .await?;

      if result.rows_affected() == 0 {
         return Err(InfraError::conflict(
            "Certificate",
            certificate.id().as_uuid().to_string(),
         ));
      }

      Ok(())
   }
}
