//! # アプリ内通知の書き込み
//!
//! 下書き（[`NotificationDraft`]）を `notifications` テーブルに保存する。
//! ミラーへの反映は DB トリガー → `LISTEN` → 単一コンシューマが行うので、ここでは触らない。

use std::sync::Arc;

use trainflow_domain::{
    clock::Clock,
    notification::{Notification, NotificationDraft, NotificationId},
};
use trainflow_infra::{InfraError, repository::NotificationRepository};
use trainflow_shared::{event_log::event, log_business_event};

pub struct NotificationPublisher {
    repo: Arc<dyn NotificationRepository>,
    clock: Arc<dyn Clock>,
}

impl NotificationPublisher {
    pub fn new(repo: Arc<dyn NotificationRepository>, clock: Arc<dyn Clock>) -> Self {
        Self { repo, clock }
    }

    /// 通知を保存し、失敗はそのまま返す
    pub async fn try_publish(&self, draft: NotificationDraft) -> Result<Notification, InfraError> {
        let notification = draft.into_notification(NotificationId::new(), self.clock.now());
        self.repo.insert(&notification).await?;

        log_business_event!(
            event.category = event::category::NOTIFICATION,
            event.action = event::action::NOTIFICATION_CREATED,
            event.entity_type = event::entity_type::NOTIFICATION,
            event.entity_id = %notification.id(),
            event.result = event::result::SUCCESS,
            notification.user_id = %notification.user_id(),
            notification.title = notification.title(),
            "通知を作成しました"
        );
        Ok(notification)
    }

    /// 通知を保存する。失敗はログに残して握りつぶす
    ///
    /// 状態遷移の後に呼ぶ。通知の失敗で遷移を巻き戻さない。
    pub async fn publish(&self, draft: NotificationDraft) -> Option<Notification> {
        let user_id = draft.user_id.clone();
        let title = draft.title.clone();
        match self.try_publish(draft).await {
            Ok(notification) => Some(notification),
            Err(e) => {
                tracing::error!(
                    error = %e,
                    %user_id,
                    title = %title,
                    "アプリ内通知の作成に失敗"
                );
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Utc};
    use pretty_assertions::assert_eq;
    use trainflow_domain::{clock::FixedClock, request::RequestStatus, user::UserId};
    use trainflow_infra::mock::MockNotificationRepository;

    use super::*;

    fn now() -> DateTime<Utc> {
        DateTime::from_timestamp(1_760_000_000, 0).unwrap()
    }

    #[tokio::test]
    async fn test_下書きから未読の通知を保存する() {
        let repo = MockNotificationRepository::new();
        let publisher = NotificationPublisher::new(
            Arc::new(repo.clone()),
            Arc::new(FixedClock::new(now())),
        );
        let user_id = UserId::new();
        let draft =
            NotificationDraft::request_status(user_id.clone(), RequestStatus::Submitted, "SWAT", None)
                .unwrap();

        let saved = publisher.publish(draft).await.unwrap();

        assert_eq!(saved.user_id(), &user_id);
        assert_eq!(saved.created_at(), now());
        assert!(!saved.is_read());
        assert_eq!(repo.notifications(), vec![saved]);
    }

    #[tokio::test]
    async fn test_保存に失敗してもpublishはnoneを返すだけ() {
        let repo = MockNotificationRepository::new();
        repo.fail_inserts();
        let publisher = NotificationPublisher::new(
            Arc::new(repo.clone()),
            Arc::new(FixedClock::new(now())),
        );
        let draft = NotificationDraft::pending_approvals(UserId::new(), 2);

        assert!(publisher.publish(draft.clone()).await.is_none());
        assert!(publisher.try_publish(draft).await.is_err());
    }
}
