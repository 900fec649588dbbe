//! # EmailLogRepository
//!
//! メール送信ログの永続化を担当するリポジトリ。
//!
//! 送信成功・失敗のどちらも記録する。記録の失敗は送信結果に影響させない
//! （呼び出し側でログ出力して握りつぶす）。
//! リマインダーメールの重複抑止にも使う。

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use trainflow_domain::notification::EmailLog;

use crate::error::InfraError;

#[async_trait]
pub trait EmailLogRepository: Send + Sync {
   async fn insert(&self, log: &EmailLog) -> Result<(), InfraError>;

   /// `since` 以降に同じ宛先・件名で送信に成功したメールがあるか
   async fn sent_since(
      &self,
      recipient: &str,
      subject: &str,
      since: DateTime<Utc>,
   ) -> Result<bool, InfraError>;
}

#[derive(Debug, Clone)]
pub struct PostgresEmailLogRepository {
   pool: PgPool,
}

impl PostgresEmailLogRepository {
   pub fn new(pool: PgPool) -> Self {
      Self { pool }
   }
}

#[async_trait]
impl EmailLogRepository for PostgresEmailLogRepository {
   #[tracing::instrument(skip_all, level = "debug", fields(id = %log.id))]
   async fn insert(&self, log: &EmailLog) -> Result<(), InfraError> {
      let template: &str = log.template.into();
      let status: &str = log.status.into();

      sqlx::query(
         r#"
         INSERT INTO email_logs (
            id, template, recipient, subject, status, error_message, sent_by, created_at
         )
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
         "#,
      )
      .bind(log.id.as_uuid())
      .bind(template)
      .bind(&log.recipient)
      .bind(&log.subject)
      .bind(status)
      .bind(log.error_message.as_deref())
      .bind(log.sent_by.as_ref().map(|id| *id.as_uuid()))
      .bind(log.created_at)
      .execute(&self.pool)
      .await?;

      Ok(())
   }

   #[tracing::instrument(skip_all, level = "debug")]
   async fn sent_since(
      &self,
      recipient: &str,
      subject: &str,
      since: DateTime<Utc>,
   ) -> Result<bool, InfraError> {
      let exists: bool = sqlx::query_scalar(
         r#"
         SELECT EXISTS (
            SELECT 1 FROM email_logs
            WHERE recipient = $1 AND subject = $2 AND status = 'sent' AND created_at >= $3
         )
         "#,
      )
      .bind(recipient)
      .bind(subject)
      .bind(since)
      .fetch_one(&self.pool)
      .await?;

      Ok(exists)
   }
}

#[cfg(test)]
mod tests {
   use super::*;

   #[test]
   fn test_トレイトはsendとsyncを実装している() {
      fn assert_send_sync<T: Send + Sync>() {}
      assert_send_sync::<PostgresEmailLogRepository>();
   }
}
