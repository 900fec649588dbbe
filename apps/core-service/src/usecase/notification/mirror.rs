//! # 通知ミラー
//!
//! ユーザーごとの通知をメモリに持ち、一覧と未読数をここから返す。
//!
//! 書き込み経路は 3 つ:
//!
//! 1. ログイン時（または初回参照時）の全件読み込み: [`NotificationMirror::replace`]
//! 2. DB 変更イベントの反映: [`run_consumer`] だけが [`NotificationMirror::apply`] を呼ぶ
//! 3. 既読化の楽観的更新: [`NotificationMirror::mark_read`] / [`NotificationMirror::mark_all_read`]
//!
//! 変更イベントは有界キューに積まれ、単一のコンシューマが到着順に適用する。
//! 同じ通知 ID のイベントは後勝ち。ミラーを読み込んでいないユーザーのイベントは捨てる
//! （次の読み込みで DB から取り直す）。

use std::collections::HashMap;

use tokio::sync::{RwLock, mpsc};
use trainflow_domain::{
    notification::{Notification, NotificationChange, NotificationId},
    user::UserId,
};

type UserNotifications = HashMap<NotificationId, Notification>;

#[derive(Default)]
pub struct NotificationMirror {
    users: RwLock<HashMap<UserId, UserNotifications>>,
}

impl NotificationMirror {
    pub fn new() -> Self {
        Self::default()
    }

    /// ユーザーの通知を丸ごと置き換える
    pub async fn replace(&self, user_id: &UserId, notifications: Vec<Notification>) {
        let entries = notifications
            .into_iter()
            .map(|n| (n.id().clone(), n))
            .collect();
        self.users.write().await.insert(user_id.clone(), entries);
    }

    pub async fn is_loaded(&self, user_id: &UserId) -> bool {
        self.users.read().await.contains_key(user_id)
    }

    /// 変更イベントを適用する。読み込み済みユーザーなら true
    pub async fn apply(&self, change: NotificationChange) -> bool {
        let notification = change.into_notification();
        let mut users = self.users.write().await;
        match users.get_mut(notification.user_id()) {
            Some(entries) => {
                entries.insert(notification.id().clone(), notification);
                true
            }
            None => false,
        }
    }

    /// 新しい順の一覧。未読み込みなら None
    pub async fn list(&self, user_id: &UserId) -> Option<Vec<Notification>> {
        let users = self.users.read().await;
        let mut notifications: Vec<Notification> = users.get(user_id)?.values().cloned().collect();
        notifications.sort_by(|a, b| {
            b.created_at()
                .cmp(&a.created_at())
                .then_with(|| b.id().as_uuid().cmp(a.id().as_uuid()))
        });
        Some(notifications)
    }

    /// 未読数。未読み込みなら None
    pub async fn unread_count(&self, user_id: &UserId) -> Option<usize> {
        let users = self.users.read().await;
        Some(users.get(user_id)?.values().filter(|n| !n.is_read()).count())
    }

    /// 1 件を既読にする。ミラーに存在すれば true（既読済みでも true）
    pub async fn mark_read(&self, user_id: &UserId, id: &NotificationId) -> bool {
        let mut users = self.users.write().await;
        let Some(entry) = users.get_mut(user_id).and_then(|entries| entries.get_mut(id)) else {
            return false;
        };
        if !entry.is_read() {
            *entry = entry.clone().mark_read();
        }
        true
    }

    /// すべて既読にし、未読だった件数を返す
    pub async fn mark_all_read(&self, user_id: &UserId) -> usize {
        let mut users = self.users.write().await;
        let Some(entries) = users.get_mut(user_id) else {
            return 0;
        };
        let mut changed = 0;
        for entry in entries.values_mut().filter(|n| !n.is_read()) {
            *entry = entry.clone().mark_read();
            changed += 1;
        }
        changed
    }
}

/// 変更イベントの単一コンシューマ
///
/// 送信側がすべて閉じるまで到着順に適用し続ける。
pub async fn run_consumer(
    mirror: std::sync::Arc<NotificationMirror>,
    mut changes: mpsc::Receiver<NotificationChange>,
) {
    while let Some(change) = changes.recv().await {
        let id = change.notification().id().clone();
        if !mirror.apply(change).await {
            tracing::trace!(notification_id = %id, "未読み込みユーザーの通知イベントを破棄");
        }
    }
    tracing::info!("通知ミラーのコンシューマを停止しました");
}
