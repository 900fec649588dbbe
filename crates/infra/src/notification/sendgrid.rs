//! SendGrid 送信実装
//!
//! SendGrid v3 Mail Send API に JSON を POST する。成功時は 202 が返る。

use async_trait::async_trait;
use serde::Serialize;
use trainflow_domain::notification::{EmailMessage, NotificationError};

use super::{NotificationSender, SenderIdentity};

const SENDGRID_ENDPOINT: &str = "https://api.sendgrid.com/v3/mail/send";

/// SendGrid 送信
#[derive(Clone)]
pub struct SendGridNotificationSender {
    client:   reqwest::Client,
    endpoint: String,
    api_key:  String,
    sender:   SenderIdentity,
}

#[derive(Debug, Serialize)]
struct MailSendRequest<'a> {
    personalizations: [Personalization<'a>; 1],
    from:             Address<'a>,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_to:         Option<Address<'a>>,
    subject:          &'a str,
    content:          [Content<'a>; 2],
}

#[derive(Debug, Serialize)]
struct Personalization<'a> {
    to: [Address<'a>; 1],
}

#[derive(Debug, Serialize)]
struct Address<'a> {
    email: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    name:  Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    #[serde(rename = "type")]
    mime:  &'static str,
    value: &'a str,
}

impl SendGridNotificationSender {
    pub fn new(api_key: String, sender: SenderIdentity) -> Self {
        Self::with_endpoint(SENDGRID_ENDPOINT, api_key, sender)
    }

    /// 送信先エンドポイントを差し替える（テスト用サーバーなど）
    pub fn with_endpoint(endpoint: &str, api_key: String, sender: SenderIdentity) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.trim_end_matches('/').to_string(),
            api_key,
            sender,
        }
    }

    fn request_body<'a>(&'a self, email: &'a EmailMessage) -> MailSendRequest<'a> {
        MailSendRequest {
            personalizations: [Personalization {
                to: [Address {
                    email: &email.to,
                    name:  None,
                }],
            }],
            from:             Address {
                email: &self.sender.email,
                name:  Some(self.sender.display_name(email)),
            },
            reply_to:         email.reply_to.as_deref().map(|reply_to| Address {
                email: reply_to,
                name:  None,
            }),
            subject:          &email.subject,
            content:          [
                Content {
                    mime:  "text/plain",
                    value: &email.text_body,
                },
                Content {
                    mime:  "text/html",
                    value: &email.html_body,
                },
            ],
        }
    }
}

#[async_trait]
impl NotificationSender for SendGridNotificationSender {
    async fn send_email(&self, email: &EmailMessage) -> Result<(), NotificationError> {
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&self.request_body(email))
            .send()
            .await
            .map_err(|e| NotificationError::SendFailed(format!("SendGrid 接続失敗: {e}")))?;

        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(NotificationError::SendFailed(format!(
            "SendGrid 送信失敗 {status}: {body}"
        )))
    }
}
