//! # バックグラウンドタスク
//!
//! - 通知の変更購読（PostgreSQL LISTEN）→ キュー → ミラーの単一コンシューマ
//! - 通知ジェネレータの定期実行
//!
//! どちらも `watch` チャネルの `true` で停止する。

use std::{sync::Arc, time::Duration};

use sqlx::PgPool;
use tokio::{
    sync::{mpsc, watch},
    task::JoinHandle,
    time::{Instant, interval_at},
};
use trainflow_infra::{realtime::listen_notification_changes, repository::NotificationRepository};
use trainflow_shared::event_log::error;

use crate::usecase::{
    NotificationGenerator,
    notification::{NotificationMirror, run_consumer},
};

/// 変更イベントキューの容量
const CHANGE_QUEUE_CAPACITY: usize = 256;

/// 変更購読とミラーのコンシューマを起動する
///
/// 購読が終わると送信側が閉じ、コンシューマも残りを適用してから終了する。
pub fn spawn_notification_listener(
    pool: PgPool,
    notifications: Arc<dyn NotificationRepository>,
    mirror: Arc<NotificationMirror>,
    shutdown: watch::Receiver<bool>,
) -> Vec<JoinHandle<()>> {
    let (tx, rx) = mpsc::channel(CHANGE_QUEUE_CAPACITY);

    let listener = tokio::spawn(async move {
        if let Err(e) = listen_notification_changes(&pool, notifications.as_ref(), tx, shutdown).await {
            tracing::error!(
                error.category = error::category::INFRASTRUCTURE,
                error.kind = error::kind::DATABASE,
                "通知の変更購読が異常終了しました: {}",
                e
            );
        }
    });
    let consumer = tokio::spawn(run_consumer(mirror, rx));

    vec![listener, consumer]
}

/// ジェネレータを `interval_secs` ごとに実行する。0 なら起動しない
pub fn spawn_generator(
    generator: Arc<NotificationGenerator>,
    interval_secs: u64,
    shutdown: watch::Receiver<bool>,
) -> Option<JoinHandle<()>> {
    if interval_secs == 0 {
        tracing::info!("通知ジェネレータの定期実行は無効です");
        return None;
    }
    let period = Duration::from_secs(interval_secs);
    Some(tokio::spawn(run_generator_loop(generator, period, shutdown)))
}

/// 初回は起動から `period` 後に実行する
async fn run_generator_loop(
    generator: Arc<NotificationGenerator>,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = interval_at(Instant::now() + period, period);
    tracing::info!(interval_secs = period.as_secs(), "通知ジェネレータを起動しました");

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let report = generator.run_all().await;
                let total = report.total();
                tracing::info!(
                    created = total.created,
                    errors = total.errors.len(),
                    cleaned = report.cleaned,
                    "通知ジェネレータを実行しました"
                );
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
            }
        }
    }
    tracing::info!("通知ジェネレータを停止しました");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::TestFixture;

    #[tokio::test]
    async fn test_間隔0ならジェネレータを起動しない() {
        let fx = TestFixture::new();
        let (_tx, rx) = watch::channel(false);

        let handle = spawn_generator(Arc::new(fx.generator()), 0, rx);

        assert!(handle.is_none());
    }

    #[tokio::test]
    async fn test_停止シグナルで初回実行前に終了する() {
        let fx = TestFixture::new();
        let supervisor = fx.supervisor();
        let officer = fx.officer(Some(&supervisor));
        let (tx, rx) = watch::channel(false);

        let handle = spawn_generator(Arc::new(fx.generator()), 3600, rx).unwrap();
        tx.send(true).unwrap();
        handle.await.unwrap();

        assert!(fx.notifications_for(&officer).is_empty());
        assert!(fx.notifications_for(&supervisor).is_empty());
    }
}
