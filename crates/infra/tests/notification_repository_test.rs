//! NotificationRepository・EmailLogRepository と変更購読の統合テスト
//!
//! 実行方法:
//! ```bash
//! cargo test -p trainflow-infra --test notification_repository_test -- --ignored
//! ```

mod common;

use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use common::{create_notification, seed_officer_id, seed_sergeant_id, test_now};
use pretty_assertions::assert_eq;
use sqlx::PgPool;
use tokio::sync::{mpsc, watch};
use trainflow_domain::{
   notification::{
      EmailLog,
      EmailLogId,
      EmailLogStatus,
      EmailTemplateKind,
      NotificationChange,
      NotificationDraft,
      NotificationId,
   },
   request::{DenialReason, RequestStatus},
};
use trainflow_infra::{
   realtime::listen_notification_changes,
   repository::{
      EmailLogRepository,
      NotificationRepository,
      PostgresEmailLogRepository,
      PostgresNotificationRepository,
      RecentNotificationFilter,
   },
};

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "DATABASE_URL が必要"]
async fn test_ユーザーの通知を新しい順に取得できる(pool: PgPool) {
   let repo = PostgresNotificationRepository::new(pool);
   let older = create_notification(seed_officer_id(), "Older", test_now() - Duration::hours(1));
   let newer = create_notification(seed_officer_id(), "Newer", test_now());
   let other = create_notification(seed_sergeant_id(), "Other", test_now());
   for n in [&older, &newer, &other] {
      repo.insert(n).await.unwrap();
   }

   let found = repo.find_by_user(&seed_officer_id()).await.unwrap();

   let titles: Vec<&str> = found.iter().map(|n| n.title()).collect();
   assert_eq!(titles, vec!["Newer", "Older"]);
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "DATABASE_URL が必要"]
async fn test_他人の通知は既読にできない(pool: PgPool) {
   let repo = PostgresNotificationRepository::new(pool);
   let notification = create_notification(seed_officer_id(), "Mine", test_now());
   repo.insert(&notification).await.unwrap();

   let by_other = repo
      .mark_read(notification.id(), &seed_sergeant_id())
      .await
      .unwrap();
   let by_owner = repo
      .mark_read(notification.id(), &seed_officer_id())
      .await
      .unwrap();

   assert!(!by_other);
   assert!(by_owner);
   let found = repo.find_by_id(notification.id()).await.unwrap().unwrap();
   assert!(found.is_read());
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "DATABASE_URL が必要"]
async fn test_未読をすべて既読にすると件数が返る(pool: PgPool) {
   let repo = PostgresNotificationRepository::new(pool);
   for title in ["A", "B", "C"] {
      repo
         .insert(&create_notification(seed_officer_id(), title, test_now()))
         .await
         .unwrap();
   }

   assert_eq!(repo.mark_all_read(&seed_officer_id()).await.unwrap(), 3);
   assert_eq!(repo.mark_all_read(&seed_officer_id()).await.unwrap(), 0);
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "DATABASE_URL が必要"]
async fn test_期間内の同種通知を検出できる(pool: PgPool) {
   let repo = PostgresNotificationRepository::new(pool);
   repo
      .insert(&create_notification(
         seed_officer_id(),
         "URGENT: Certificate Expiring",
         test_now() - Duration::hours(2),
      ))
      .await
      .unwrap();

   let recent = repo
      .exists_since(RecentNotificationFilter {
         user_id: &seed_officer_id(),
         title_contains: "Certificate Expiring",
         message_contains: Some("test message"),
         since: test_now() - Duration::days(1),
      })
      .await
      .unwrap();
   let too_old = repo
      .exists_since(RecentNotificationFilter {
         user_id: &seed_officer_id(),
         title_contains: "Certificate Expiring",
         message_contains: None,
         since: test_now() - Duration::hours(1),
      })
      .await
      .unwrap();

   assert!(recent);
   assert!(!too_old);
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "DATABASE_URL が必要"]
async fn test_古い既読通知だけが削除される(pool: PgPool) {
   let repo = PostgresNotificationRepository::new(pool);
   let old_read = create_notification(seed_officer_id(), "Old", test_now() - Duration::days(40));
   let old_unread = create_notification(seed_officer_id(), "Unread", test_now() - Duration::days(40));
   let new_read = create_notification(seed_officer_id(), "New", test_now());
   for n in [&old_read, &old_unread, &new_read] {
      repo.insert(n).await.unwrap();
   }
   repo.mark_read(old_read.id(), &seed_officer_id()).await.unwrap();
   repo.mark_read(new_read.id(), &seed_officer_id()).await.unwrap();

   let deleted = repo
      .delete_read_before(test_now() - Duration::days(30))
      .await
      .unwrap();

   assert_eq!(deleted, 1);
   assert!(repo.find_by_id(old_read.id()).await.unwrap().is_none());
   assert!(repo.find_by_id(old_unread.id()).await.unwrap().is_some());
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "DATABASE_URL が必要"]
async fn test_挿入と既読化が変更イベントとして届く(pool: PgPool) {
   let (tx, mut rx) = mpsc::channel(8);
   let (shutdown_tx, shutdown_rx) = watch::channel(false);
   let listener_pool = pool.clone();
   let listener_repo = PostgresNotificationRepository::new(pool.clone());
   let handle = tokio::spawn(async move {
      listen_notification_changes(&listener_pool, &listener_repo, tx, shutdown_rx).await
   });
   // LISTEN が登録されるまで待つ
   tokio::time::sleep(StdDuration::from_millis(200)).await;

   let repo = PostgresNotificationRepository::new(pool);
   let notification = create_notification(seed_officer_id(), "Request Submitted", test_now());
   repo.insert(&notification).await.unwrap();
   repo
      .mark_read(notification.id(), &seed_officer_id())
      .await
      .unwrap();

   let inserted = tokio::time::timeout(StdDuration::from_secs(5), rx.recv())
      .await
      .unwrap()
      .unwrap();
   let updated = tokio::time::timeout(StdDuration::from_secs(5), rx.recv())
      .await
      .unwrap()
      .unwrap();

   assert!(matches!(inserted, NotificationChange::Inserted(ref n) if n.id() == notification.id()));
   assert!(matches!(updated, NotificationChange::Updated(ref n) if n.is_read()));

   shutdown_tx.send(true).unwrap();
   handle.await.unwrap().unwrap();
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "DATABASE_URL が必要"]
async fn test_最大長の却下理由でも却下通知が保存され変更イベントが届く(pool: PgPool) {
   let (tx, mut rx) = mpsc::channel(8);
   let (shutdown_tx, shutdown_rx) = watch::channel(false);
   let listener_pool = pool.clone();
   let listener_repo = PostgresNotificationRepository::new(pool.clone());
   let handle = tokio::spawn(async move {
      listen_notification_changes(&listener_pool, &listener_repo, tx, shutdown_rx).await
   });
   tokio::time::sleep(StdDuration::from_millis(200)).await;

   // 4 バイト文字 2000 個: 本文だけで 8000 バイトを超える
   let reason = DenialReason::new("😀".repeat(2000)).unwrap();
   let notification = NotificationDraft::request_status(
      seed_officer_id(),
      RequestStatus::Denied,
      "Crisis Intervention",
      Some(reason.as_str()),
   )
   .unwrap()
   .into_notification(NotificationId::new(), test_now());
   let repo = PostgresNotificationRepository::new(pool);
   repo.insert(&notification).await.unwrap();

   let stored = repo.find_by_id(notification.id()).await.unwrap().unwrap();
   assert_eq!(stored.title(), "Request Denied");
   assert!(stored.message().ends_with(reason.as_str()));

   let received = tokio::time::timeout(StdDuration::from_secs(5), rx.recv())
      .await
      .unwrap()
      .unwrap();
   assert_eq!(received.notification().message(), stored.message());

   shutdown_tx.send(true).unwrap();
   handle.await.unwrap().unwrap();
}

fn email_log(subject: &str, status: EmailLogStatus, created_at: DateTime<Utc>) -> EmailLog {
   EmailLog {
      id: EmailLogId::new(),
      template: EmailTemplateKind::Notification,
      recipient: "officer@shpd.example.com".to_string(),
      subject: subject.to_string(),
      status,
      error_message: None,
      sent_by: None,
      created_at,
   }
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "DATABASE_URL が必要"]
async fn test_送信済みのリマインダーだけを重複とみなす(pool: PgPool) {
   let repo = PostgresEmailLogRepository::new(pool);
   let subject = "Training Reminder: Taser Recertification on 10/22/2026";
   repo
      .insert(&email_log(subject, EmailLogStatus::Failed, test_now()))
      .await
      .unwrap();

   let after_failure = repo
      .sent_since("officer@shpd.example.com", subject, test_now() - Duration::days(1))
      .await
      .unwrap();
   repo
      .insert(&email_log(subject, EmailLogStatus::Sent, test_now()))
      .await
      .unwrap();
   let after_success = repo
      .sent_since("officer@shpd.example.com", subject, test_now() - Duration::days(1))
      .await
      .unwrap();
   let other_subject = repo
      .sent_since("officer@shpd.example.com", "Training Reminder: CPR", test_now() - Duration::days(1))
      .await
      .unwrap();

   assert!(!after_failure);
   assert!(after_success);
   assert!(!other_subject);
}
