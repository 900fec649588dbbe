//! # EmailPreferencesRepository
//!
//! ユーザーごとのメール配信設定。行がないユーザーは既定値として扱う。

use async_trait::async_trait;
use sqlx::PgPool;
use trainflow_domain::{preferences::EmailPreferences, user::UserId};
use uuid::Uuid;

use crate::error::InfraError;

#[async_trait]
pub trait EmailPreferencesRepository: Send + Sync {
   /// 保存済みの設定を取得する（未保存なら `None`）
   async fn find_by_user(&self, user_id: &UserId) -> Result<Option<EmailPreferences>, InfraError>;

   /// 設定を保存する（既存行は上書き）
   async fn upsert(&self, preferences: &EmailPreferences) -> Result<(), InfraError>;
}

#[derive(sqlx::FromRow)]
struct EmailPreferencesRow {
   user_id: Uuid,
   notify_on_approval: bool,
   notify_on_denial: bool,
   notify_on_submission: bool,
   notify_on_cert_expiry: bool,
   notify_on_training_reminder: bool,
   reminder_days_before: i32,
   cert_expiry_days_before: i32,
   from_name: String,
   reply_to_email: Option<String>,
   email_signature: Option<String>,
}

impl From<EmailPreferencesRow> for EmailPreferences {
   fn from(row: EmailPreferencesRow) -> Self {
      Self {
         user_id: UserId::from_uuid(row.user_id),
         notify_on_approval: row.notify_on_approval,
         notify_on_denial: row.notify_on_denial,
         notify_on_submission: row.notify_on_submission,
         notify_on_cert_expiry: row.notify_on_cert_expiry,
         notify_on_training_reminder: row.notify_on_training_reminder,
         reminder_days_before: row.reminder_days_before,
         cert_expiry_days_before: row.cert_expiry_days_before,
         from_name: row.from_name,
         reply_to_email: row.reply_to_email,
         email_signature: row.email_signature,
      }
   }
}

#[derive(Debug, Clone)]
pub struct PostgresEmailPreferencesRepository {
   pool: PgPool,
}

impl PostgresEmailPreferencesRepository {
   pub fn new(pool: PgPool) -> Self {
      Self { pool }
   }
}

#[async_trait]
impl EmailPreferencesRepository for PostgresEmailPreferencesRepository {
   #[tracing::instrument(skip_all, level = "debug", fields(%user_id))]
   async fn find_by_user(&self, user_id: &UserId) -> Result<Option<EmailPreferences>, InfraError> {
      let row = sqlx::query_as::<_, EmailPreferencesRow>(
         r#"
         SELECT
            user_id, notify_on_approval, notify_on_denial, notify_on_submission,
            notify_on_cert_expiry, notify_on_training_reminder,
            reminder_days_before, cert_expiry_days_before,
            from_name, reply_to_email, email_signature
         FROM email_preferences
         WHERE user_id = $1
         "#,
      )
      .bind(user_id.as_uuid())
      .fetch_optional(&self.pool)
      .await?;

      Ok(row.map(EmailPreferences::from))
   }

   #[tracing::instrument(skip_all, level = "debug", fields(user_id = %preferences.user_id))]
   async fn upsert(&self, preferences: &EmailPreferences) -> Result<(), InfraError> {
      sqlx::query(
         r#"
         INSERT INTO email_preferences (
            user_id, notify_on_approval, notify_on_denial, notify_on_submission,
            notify_on_cert_expiry, notify_on_training_reminder,
            reminder_days_before, cert_expiry_days_before,
            from_name, reply_to_email, email_signature, updated_at
         )
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, now())
         ON CONFLICT (user_id) DO UPDATE SET
            notify_on_approval = EXCLUDED.notify_on_approval,
            notify_on_denial = EXCLUDED.notify_on_denial,
            notify_on_submission = EXCLUDED.notify_on_submission,
            notify_on_cert_expiry = EXCLUDED.notify_on_cert_expiry,
            notify_on_training_reminder = EXCLUDED.notify_on_training_reminder,
            reminder_days_before = EXCLUDED.reminder_days_before,
            cert_expiry_days_before = EXCLUDED.cert_expiry_days_before,
            from_name = EXCLUDED.from_name,
            reply_to_email = EXCLUDED.reply_to_email,
            email_signature = EXCLUDED.email_signature,
            updated_at = now()
         "#,
      )
      .bind(preferences.user_id.as_uuid())
      .bind(preferences.notify_on_approval)
      .bind(preferences.notify_on_denial)
      .bind(preferences.notify_on_submission)
      .bind(preferences.notify_on_cert_expiry)
      .bind(preferences.notify_on_training_reminder)
      .bind(preferences.reminder_days_before)
      .bind(preferences.cert_expiry_days_before)
      .bind(&preferences.from_name)
      .bind(preferences.reply_to_email.as_deref())
      .bind(preferences.email_signature.as_deref())
      .execute(&self.pool)
      .await?;

      Ok(())
   }
}

#[cfg(test)]
mod tests {
   use super::*;

   #[test]
   fn test_トレイトはsendとsyncを実装している() {
      fn assert_send_sync<T: Send + Sync>() {}
      assert_send_sync::<PostgresEmailPreferencesRepository>();
   }
}
