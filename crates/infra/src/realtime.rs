//! # 通知の変更購読
//!
//! `notifications` テーブルのトリガーが `notification_changes` チャネルへ NOTIFY する
//! 変更を `PgListener` で受け取り、行を読み直して [`NotificationChange`] としてキューへ送る。
//!
//! ペイロードはキーだけを持つ（NOTIFY は 8000 バイト未満に制限される）:
//!
//! ```json
//! {"op": "insert", "id": "...", "user_id": "..."}
//! ```
//!
//! キューの受信側（通知ミラー）は 1 つだけで、到着順に適用する。

use serde::Deserialize;
use sqlx::{PgPool, postgres::PgListener};
use tokio::sync::{mpsc, watch};
use trainflow_domain::{
   notification::{NotificationChange, NotificationId},
   user::UserId,
};
use uuid::Uuid;

use crate::{error::InfraError, repository::NotificationRepository};

/// トリガーが NOTIFY するチャネル名
pub const NOTIFICATION_CHANNEL: &str = "notification_changes";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeOp {
   Insert,
   Update,
}

/// NOTIFY で届く変更の通知（行の中身は含まない）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeSignal {
   pub op:      ChangeOp,
   pub id:      NotificationId,
   pub user_id: UserId,
}

#[derive(Debug, Deserialize)]
struct ChangePayload {
   op:      ChangeOp,
   id:      Uuid,
   user_id: Uuid,
}

/// NOTIFY のペイロードを解釈する
pub fn parse_payload(payload: &str) -> Result<ChangeSignal, InfraError> {
   let ChangePayload { op, id, user_id } = serde_json::from_str(payload)?;
   Ok(ChangeSignal {
      op,
      id: NotificationId::from_uuid(id),
      user_id: UserId::from_uuid(user_id),
   })
}

/// 変更のあった行を読み直してイベントにする
///
/// 読み直す前に削除された行は `None`。
pub async fn resolve_change(
   notifications: &dyn NotificationRepository,
   signal: &ChangeSignal,
) -> Result<Option<NotificationChange>, InfraError> {
   let Some(notification) = notifications.find_by_id(&signal.id).await? else {
      return Ok(None);
   };
   Ok(Some(match signal.op {
      ChangeOp::Insert => NotificationChange::Inserted(notification),
      ChangeOp::Update => NotificationChange::Updated(notification),
   }))
}

/// 通知の変更を購読し、`tx` へ送り続ける
///
/// `shutdown` が `true` になるか、受信側が閉じられると `Ok(())` で終了する。
/// 解釈できないペイロードと読み直しに失敗した変更は警告ログを出して読み飛ばす。
pub async fn listen_notification_changes(
   pool: &PgPool,
   notifications: &dyn NotificationRepository,
   tx: mpsc::Sender<NotificationChange>,
   mut shutdown: watch::Receiver<bool>,
) -> Result<(), InfraError> {
   let mut listener = PgListener::connect_with(pool).await?;
   listener.listen(NOTIFICATION_CHANNEL).await?;
   tracing::info!(channel = NOTIFICATION_CHANNEL, "通知の変更購読を開始しました");

   loop {
      tokio::select! {
         received = listener.recv() => {
            let received = received?;
            let signal = match parse_payload(received.payload()) {
               Ok(signal) => signal,
               Err(e) => {
                  tracing::warn!(error = %e, "通知の変更ペイロードを解釈できません");
                  continue;
               }
            };
            let change = match resolve_change(notifications, &signal).await {
               Ok(Some(change)) => change,
               Ok(None) => {
                  tracing::debug!(notification_id = %signal.id, "変更された通知は削除済みです");
                  continue;
               }
               Err(e) => {
                  tracing::warn!(
                     error = %e,
                     notification_id = %signal.id,
                     user_id = %signal.user_id,
                     "変更された通知を読み直せません"
                  );
                  continue;
               }
            };
            if tx.send(change).await.is_err() {
               tracing::info!("受信側が閉じられたため変更購読を終了します");
               return Ok(());
            }
         }
         changed = shutdown.changed() => {
            if changed.is_err() || *shutdown.borrow() {
               tracing::info!("通知の変更購読を終了します");
               return Ok(());
            }
         }
      }
   }
}
