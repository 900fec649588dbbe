//! # メール送信
//!
//! メール送信を担当するインフラストラクチャモジュール。
//!
//! ## 設計方針
//!
//! - **trait による抽象化**: `NotificationSender` trait でメール送信を抽象化
//! - **4 つの実装**: SendGrid（本番）、SMTP（Mailpit 開発用）、SES、Noop（既定）
//! - **環境変数切替**: `NOTIFICATION_BACKEND` でランタイム選択
//! - **リトライなし**: 失敗はそのまま `NotificationError::SendFailed` で返す

mod noop;
mod sendgrid;
mod ses;
mod smtp;

use async_trait::async_trait;
pub use noop::NoopNotificationSender;
pub use sendgrid::SendGridNotificationSender;
pub use ses::SesNotificationSender;
pub use smtp::SmtpNotificationSender;
use trainflow_domain::notification::{EmailMessage, NotificationError};

/// メール送信トレイト
#[async_trait]
pub trait NotificationSender: Send + Sync {
    /// メールを送信する
    async fn send_email(&self, email: &EmailMessage) -> Result<(), NotificationError>;
}

/// 送信元
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SenderIdentity {
    pub email: String,
    pub name:  String,
}

impl SenderIdentity {
    pub fn new(email: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            name:  name.into(),
        }
    }

    /// メッセージ側で送信者名が指定されていればそれを、なければ設定の名前を使う
    pub fn display_name<'a>(&'a self, email: &'a EmailMessage) -> &'a str {
        email.from_name.as_deref().unwrap_or(&self.name)
    }

    /// `Name <email>` 形式
    pub fn mailbox(&self, email: &EmailMessage) -> String {
        format!("{} <{}>", self.display_name(email), self.email)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mailbox形式() {
        let sender = SenderIdentity::new("info@shpdtraining.com", "SHPD Training System");

        assert_eq!(
            sender.mailbox(&EmailMessage::default()),
            "SHPD Training System <info@shpdtraining.com>"
        );
    }

    #[test]
    fn test_メッセージの送信者名が設定より優先される() {
        let sender = SenderIdentity::new("info@shpdtraining.com", "SHPD Training System");
        let email = EmailMessage {
            from_name: Some("Lt. Dana Cruz".to_string()),
            ..Default::default()
        };

        assert_eq!(sender.mailbox(&email), "Lt. Dana Cruz <info@shpdtraining.com>");
    }
}
