//! # 通知受信箱ユースケース
//!
//! 一覧・未読数はミラーから返す。ミラー未読み込みのユーザーは初回参照時に DB から読み込む。
//! 既読化はミラーを先に更新してから DB に書き、DB 書き込みの失敗はログに残す。

use std::sync::Arc;

use trainflow_domain::{
    notification::{Notification, NotificationId},
    user::UserId,
};
use trainflow_infra::repository::NotificationRepository;
use trainflow_shared::{
    event_log::{error, event},
    log_business_event,
};

use super::NotificationMirror;
use crate::error::CoreError;

pub struct NotificationInboxUseCaseImpl {
    repo: Arc<dyn NotificationRepository>,
    mirror: Arc<NotificationMirror>,
}

impl NotificationInboxUseCaseImpl {
    pub fn new(repo: Arc<dyn NotificationRepository>, mirror: Arc<NotificationMirror>) -> Self {
        Self { repo, mirror }
    }

    /// DB から全件読み直してミラーを置き換える
    pub async fn reload(&self, user_id: &UserId) -> Result<(), CoreError> {
        let notifications = self.repo.find_by_user(user_id).await?;
        tracing::debug!(%user_id, count = notifications.len(), "通知ミラーを読み込みました");
        self.mirror.replace(user_id, notifications).await;
        Ok(())
    }

    async fn ensure_loaded(&self, user_id: &UserId) -> Result<(), CoreError> {
        if !self.mirror.is_loaded(user_id).await {
            self.reload(user_id).await?;
        }
        Ok(())
    }

    pub async fn list(&self, user_id: &UserId) -> Result<Vec<Notification>, CoreError> {
        self.ensure_loaded(user_id).await?;
        Ok(self.mirror.list(user_id).await.unwrap_or_default())
    }

    pub async fn unread_count(&self, user_id: &UserId) -> Result<usize, CoreError> {
        self.ensure_loaded(user_id).await?;
        Ok(self.mirror.unread_count(user_id).await.unwrap_or_default())
    }

    /// 1 件を既読にする
    ///
    /// 既読済みでも成功する。自分の通知でなければ 404。
    pub async fn mark_read(&self, user_id: &UserId, id: &NotificationId) -> Result<(), CoreError> {
        self.ensure_loaded(user_id).await?;
        if !self.mirror.mark_read(user_id, id).await {
            return Err(CoreError::NotFound(format!("通知が見つかりません: {id}")));
        }

        match self.repo.mark_read(id, user_id).await {
            Ok(true) => {
                log_business_event!(
                    event.category = event::category::NOTIFICATION,
                    event.action = event::action::NOTIFICATION_READ,
                    event.entity_type = event::entity_type::NOTIFICATION,
                    event.entity_id = %id,
                    event.actor_id = %user_id,
                    event.result = event::result::SUCCESS,
                    "通知を既読にしました"
                );
            }
            Ok(false) => {
                tracing::warn!(notification_id = %id, %user_id, "既読化の対象が DB にありません");
            }
            Err(e) => {
                tracing::error!(
                    error.category = error::category::INFRASTRUCTURE,
                    error.kind = error::kind::DATABASE,
                    notification_id = %id,
                    "既読化の保存に失敗: {}",
                    e
                );
            }
        }
        Ok(())
    }

    /// すべて既読にし、ミラー上で未読だった件数を返す
    pub async fn mark_all_read(&self, user_id: &UserId) -> Result<usize, CoreError> {
        self.ensure_loaded(user_id).await?;
        let changed = self.mirror.mark_all_read(user_id).await;

        match self.repo.mark_all_read(user_id).await {
            Ok(updated) => {
                log_business_event!(
                    event.category = event::category::NOTIFICATION,
                    event.action = event::action::NOTIFICATION_READ,
                    event.entity_type = event::entity_type::NOTIFICATION,
                    event.actor_id = %user_id,
                    event.result = event::result::SUCCESS,
                    notification.count = updated,
                    "通知をすべて既読にしました"
                );
            }
            Err(e) => {
                tracing::error!(
                    error.category = error::category::INFRASTRUCTURE,
                    error.kind = error::kind::DATABASE,
                    %user_id,
                    "一括既読化の保存に失敗: {}",
                    e
                );
            }
        }
        Ok(changed)
    }
}
