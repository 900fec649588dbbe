//! Noop 送信実装
//!
//! メールを実際に送信せず、ログ出力のみ行う。`NOTIFICATION_BACKEND` 未設定時の既定。

use async_trait::async_trait;
use trainflow_domain::notification::{EmailMessage, NotificationError};

use super::NotificationSender;

#[derive(Debug, Clone, Default)]
pub struct NoopNotificationSender;

#[async_trait]
impl NotificationSender for NoopNotificationSender {
    async fn send_email(&self, email: &EmailMessage) -> Result<(), NotificationError> {
        tracing::info!(
            to = %email.to,
            subject = %email.subject,
            "Noop: メール送信をスキップ"
        );
        Ok(())
    }
}
