//! # NotificationRepository
//!
//! アプリ内通知の永続化を担当するリポジトリ。
//!
//! ## 設計方針
//!
//! - **変更通知はトリガー任せ**: INSERT / UPDATE のたびに `notifications_notify` トリガーが
//!   `notification_changes` チャネルへ行を流す。リポジトリは NOTIFY を意識しない
//! - **既読化は冪等**: 既読の通知を再度既読にしてもエラーにしない
//! - **削除は保守ジョブのみ**: ワークフローからは削除しない

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use trainflow_domain::{
   notification::{Notification, NotificationId, NotificationKind, NotificationRecord},
   user::UserId,
};
use uuid::Uuid;

use crate::error::InfraError;

/// 生成ジョブの重複送信チェック条件
///
/// `since` 以降に作成された同じユーザー宛ての通知のうち、
/// タイトルと本文が部分一致するものがあるかを確認する。
#[derive(Debug, Clone)]
pub struct RecentNotificationFilter<'a> {
   pub user_id: &'a UserId,
   pub title_contains: &'a str,
   pub message_contains: Option<&'a str>,
   pub since: DateTime<Utc>,
}

#[async_trait]
pub trait NotificationRepository: Send + Sync {
   async fn insert(&self, notification: &Notification) -> Result<(), InfraError>;

   /// ユーザーの通知を新しい順に全件取得する
   async fn find_by_user(&self, user_id: &UserId) -> Result<Vec<Notification>, InfraError>;

   async fn find_by_id(&self, id: &NotificationId) -> Result<Option<Notification>, InfraError>;

   /// 通知を既読にする
   ///
   /// 対象ユーザーの通知が見つからない場合は `false` を返す。
   async fn mark_read(&self, id: &NotificationId, user_id: &UserId) -> Result<bool, InfraError>;

   /// ユーザーの未読通知をすべて既読にし、更新件数を返す
   async fn mark_all_read(&self, user_id: &UserId) -> Result<u64, InfraError>;

   async fn exists_since(&self, filter: RecentNotificationFilter<'_>) -> Result<bool, InfraError>;

   /// `before` より前に作成された既読通知を削除し、削除件数を返す
   async fn delete_read_before(&self, before: DateTime<Utc>) -> Result<u64, InfraError>;
}

#[derive(sqlx::FromRow)]
struct NotificationRow {
   id: Uuid,
   user_id: Uuid,
   title: String,
   message: String,
   kind: String,
   read: bool,
   link: Option<String>,
   created_at: DateTime<Utc>,
}

impl TryFrom<NotificationRow> for Notification {
   type Error = InfraError;

   fn try_from(row: NotificationRow) -> Result<Self, Self::Error> {
      Ok(Notification::from_db(NotificationRecord {
         id: NotificationId::from_uuid(row.id),
         user_id: UserId::from_uuid(row.user_id),
         title: row.title,
         message: row.message,
         kind: row
            .kind
            .parse::<NotificationKind>()
            .map_err(|e| InfraError::unexpected(format!("不正な通知種別: {e}")))?,
         read: row.read,
         link: row.link,
         created_at: row.created_at,
      }))
   }
}

#[derive(Debug, Clone)]
pub struct PostgresNotificationRepository {
   pool: PgPool,
}

impl PostgresNotificationRepository {
   pub fn new(pool: PgPool) -> Self {
      Self { pool }
   }
}

#[async_trait]
impl NotificationRepository for PostgresNotificationRepository {
   #[tracing::instrument(skip_all, level = "debug", fields(id = %notification.id()))]
   async fn insert(&self, notification: &Notification) -> Result<(), InfraError> {
      let kind: &str = notification.kind().into();

      sqlx::query(
         r#"
         INSERT INTO notifications (id, user_id, title, message, kind, read, link, created_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
         "#,
      )
      .bind(notification.id().as_uuid())
      .bind(notification.user_id().as_uuid())
      .bind(notification.title())
      .bind(notification.message())
      .bind(kind)
      .bind(notification.is_read())
      .bind(notification.link())
      .bind(notification.created_at())
      .execute(&self.pool)
      .await?;

      Ok(())
   }

   #[tracing::instrument(skip_all, level = "debug", fields(%user_id))]
   async fn find_by_user(&self, user_id: &UserId) -> Result<Vec<Notification>, InfraError> {
      let rows = sqlx::query_as::<_, NotificationRow>(
         r#"
         SELECT id, user_id, title, message, kind, read, link, created_at
         FROM notifications
         WHERE user_id = $1
         ORDER BY created_at DESC
         "#,
      )
      .bind(user_id.as_uuid())
      .fetch_all(&self.pool)
      .await?;

      rows.into_iter().map(Notification::try_from).collect()
   }

   #[tracing::instrument(skip_all, level = "debug", fields(%id))]
   async fn find_by_id(&self, id: &NotificationId) -> Result<Option<Notification>, InfraError> {
      let row = sqlx::query_as::<_, NotificationRow>(
         r#"
         SELECT id, user_id, title, message, kind, read, link, created_at
         FROM notifications
         WHERE id = $1
         "#,
      )
      .bind(id.as_uuid())
      .fetch_optional(&self.pool)
      .await?;

      row.map(Notification::try_from).transpose()
   }

   #[tracing::instrument(skip_all, level = "debug", fields(%id, %user_id))]
   async fn mark_read(&self, id: &NotificationId, user_id: &UserId) -> Result<bool, InfraError> {
      let result = sqlx::query(
         r#"
         UPDATE notifications SET read = TRUE
         WHERE id = $1 AND user_id = $2
         "#,
      )
      .bind(id.as_uuid())
      .bind(user_id.as_uuid())
      .execute(&self.pool)
      .await?;

      Ok(result.rows_affected() > 0)
   }

   #[tracing::instrument(skip_all, level = "debug", fields(%user_id))]
   async fn mark_all_read(&self, user_id: &UserId) -> Result<u64, InfraError> {
      let result = sqlx::query(
         r#"
         UPDATE notifications SET read = TRUE
         WHERE user_id = $1 AND read = FALSE
         "#,
      )
      .bind(user_id.as_uuid())
      .execute(&self.pool)
      .await?;

      Ok(result.rows_affected())
   }

   #[tracing::instrument(skip_all, level = "debug", fields(user_id = %filter.user_id))]
   async fn exists_since(&self, filter: RecentNotificationFilter<'_>) -> Result<bool, InfraError> {
      // LIKE のワイルドカードを避けるため strpos で部分一致を見る
      let exists: bool = sqlx::query_scalar(
         r#"
         SELECT EXISTS (
            SELECT 1 FROM notifications
            WHERE user_id = $1
              AND strpos(title, $2) > 0
              AND ($3::text IS NULL OR strpos(message, $3) > 0)
              AND created_at >= $4
         )
         "#,
      )
      .bind(filter.user_id.as_uuid())
      .bind(filter.title_contains)
      .bind(filter.message_contains)
      .bind(filter.since)
      .fetch_one(&self.pool)
      .await?;

      Ok(exists)
   }

   #[tracing::instrument(skip_all, level = "debug", fields(%before))]
   async fn delete_read_before(&self, before: DateTime<Utc>) -> Result<u64, InfraError> {
      let result = sqlx::query("DELETE FROM notifications WHERE read = TRUE AND created_at < $1")
         .bind(before)
         .execute(&self.pool)
         .await?;

      Ok(result.rows_affected())
   }
}

#[cfg(test)]
mod tests {
   use super::*;

   #[test]
   fn test_トレイトはsendとsyncを実装している() {
      fn assert_send_sync<T: Send + Sync>() {}
      assert_send_sync::<PostgresNotificationRepository>();
   }

   #[test]
   fn test_不明な種別の行は変換エラーになる() {
      let row = NotificationRow {
         id: Uuid::now_v7(),
         user_id: Uuid::now_v7(),
         title: "Request Submitted".to_string(),
         message: "Your request has been submitted.".to_string(),
         kind: "critical".to_string(),
         read: false,
         link: None,
         created_at: Utc::now(),
      };

      assert!(Notification::try_from(row).is_err());
   }
}
