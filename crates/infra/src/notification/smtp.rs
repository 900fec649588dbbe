//! SMTP 送信実装
//!
//! lettre の `AsyncSmtpTransport` を使用する。開発環境では Mailpit に接続する。

use async_trait::async_trait;
use lettre::{
    AsyncSmtpTransport,
    AsyncTransport,
    Tokio1Executor,
    message::{Mailbox, Message, MultiPart, SinglePart, header::ContentType},
};
use trainflow_domain::notification::{EmailMessage, NotificationError};

use super::{NotificationSender, SenderIdentity};

/// SMTP 送信
///
/// `lettre::AsyncSmtpTransport<Tokio1Executor>` をラップする。
pub struct SmtpNotificationSender {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    sender:    SenderIdentity,
}

impl SmtpNotificationSender {
    /// `host` / `port` の例: `localhost` / `1025`（Mailpit）
    pub fn new(host: &str, port: u16, sender: SenderIdentity) -> Self {
        // TLS なしで接続する（ローカル SMTP 向け）
        let transport = AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(host)
            .port(port)
            .build();

        Self { transport, sender }
    }

    fn build_message(&self, email: &EmailMessage) -> Result<Message, NotificationError> {
        let from = Mailbox::new(
            Some(self.sender.display_name(email).to_string()),
            self.sender.email.parse().map_err(|e| {
                NotificationError::SendFailed(format!("送信元アドレス不正: {e}"))
            })?,
        );
        let mut builder = Message::builder().from(from);
        if let Some(reply_to) = &email.reply_to {
            builder = builder.reply_to(reply_to.parse().map_err(|e| {
                NotificationError::SendFailed(format!("返信先アドレス不正: {e}"))
            })?);
        }

        builder
            .to(email
                .to
                .parse()
                .map_err(|e| NotificationError::SendFailed(format!("宛先アドレス不正: {e}")))?)
            .subject(&email.subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(email.text_body.clone()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(email.html_body.clone()),
                    ),
            )
            .map_err(|e| NotificationError::SendFailed(format!("メッセージ構築失敗: {e}")))
    }
}

#[async_trait]
impl NotificationSender for SmtpNotificationSender {
    async fn send_email(&self, email: &EmailMessage) -> Result<(), NotificationError> {
        let message = self.build_message(email)?;

        self.transport
            .send(message)
            .await
            .map_err(|e| NotificationError::SendFailed(format!("SMTP 送信失敗: {e}")))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sender() -> SmtpNotificationSender {
        SmtpNotificationSender::new(
            "localhost",
            1025,
            SenderIdentity::new("info@shpdtraining.com", "SHPD Training System"),
        )
    }

    fn email(to: &str) -> EmailMessage {
        EmailMessage {
            to:        to.to_string(),
            subject:   "Training Request Approved".to_string(),
            html_body: "<p>approved</p>".to_string(),
            text_body: "approved".to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_送信元と宛先がヘッダに入る() {
        let message = sender().build_message(&email("officer@shpd.example.com")).unwrap();

        let raw = String::from_utf8(message.formatted()).unwrap();

        assert!(raw.contains("SHPD Training System"));
        assert!(raw.contains("<info@shpdtraining.com>"));
        assert!(raw.contains("To: officer@shpd.example.com"));
    }

    #[tokio::test]
    async fn test_送信者名と返信先を差し替えられる() {
        let email = EmailMessage {
            from_name: Some("Lt. Dana Cruz".to_string()),
            reply_to: Some("dana.cruz@shpd.example.com".to_string()),
            ..email("officer@shpd.example.com")
        };

        let raw = String::from_utf8(sender().build_message(&email).unwrap().formatted()).unwrap();

        assert!(raw.contains("Lt. Dana Cruz"));
        assert!(raw.contains("<info@shpdtraining.com>"));
        assert!(raw.contains("Reply-To: dana.cruz@shpd.example.com"));
        assert!(!raw.contains("SHPD Training System"));
    }

    #[tokio::test]
    async fn test_宛先アドレスが不正ならsend_failed() {
        let result = sender().build_message(&email("not an address"));

        assert!(matches!(result, Err(NotificationError::SendFailed(_))));
    }

    #[test]
    fn test_トレイトはsendとsyncを実装している() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<SmtpNotificationSender>();
    }
}
