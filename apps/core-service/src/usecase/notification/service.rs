//! # メール通知サービス
//!
//! テンプレートレンダリング → メール送信 → 送信ログ記録を統合する。
//!
//! - [`NotificationService::send`]: 結果を返す
//! - [`NotificationService::send_as`]: 差出人設定（表示名・返信先・署名）つきで送る。管理者の直接送信で使う
//! - [`NotificationService::notify`]: fire-and-forget。ワークフローの通知で使い、失敗はログのみ
//! - [`NotificationService::notify_user`]: 受信者のメール設定を確認してから `notify` する
//!
//! 送信を試みたメールは成否にかかわらず `email_logs` に記録する。再送はしない。

use std::sync::Arc;

use trainflow_domain::{
    clock::Clock,
    notification::{
        EmailFields,
        EmailLog,
        EmailLogId,
        EmailLogStatus,
        EmailTemplateKind,
        NotificationError,
        SenderProfile,
    },
    preferences::EmailPreferences,
    user::{User, UserId},
};
use trainflow_infra::{
    notification::NotificationSender,
    repository::{EmailLogRepository, EmailPreferencesRepository},
};
use trainflow_shared::{
    event_log::{error, event},
    log_business_event,
};

use super::TemplateRenderer;

pub struct NotificationService {
    sender: Arc<dyn NotificationSender>,
    template_renderer: TemplateRenderer,
    log_repo: Arc<dyn EmailLogRepository>,
    preferences_repo: Arc<dyn EmailPreferencesRepository>,
    clock: Arc<dyn Clock>,
    base_url: String,
}

impl NotificationService {
    pub fn new(
        sender: Arc<dyn NotificationSender>,
        template_renderer: TemplateRenderer,
        log_repo: Arc<dyn EmailLogRepository>,
        preferences_repo: Arc<dyn EmailPreferencesRepository>,
        clock: Arc<dyn Clock>,
        base_url: String,
    ) -> Self {
        Self {
            sender,
            template_renderer,
            log_repo,
            preferences_repo,
            clock,
            base_url,
        }
    }

    /// メール内リンクのベース URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// メールを送信し、結果を返す
    ///
    /// 必須項目の欠落は送信前に `InvalidFields` で返し、ログは残さない。
    pub async fn send(
        &self,
        kind: EmailTemplateKind,
        fields: &EmailFields,
        sent_by: Option<&UserId>,
    ) -> Result<(), NotificationError> {
        self.send_as(kind, fields, sent_by, &SenderProfile::default())
            .await
    }

    /// 差出人設定を反映して送信し、結果を返す
    pub async fn send_as(
        &self,
        kind: EmailTemplateKind,
        fields: &EmailFields,
        sent_by: Option<&UserId>,
        profile: &SenderProfile,
    ) -> Result<(), NotificationError> {
        let email = self
            .template_renderer
            .render(kind, &profile.sign(fields), &self.base_url)
            .map(|email| profile.address(email))?;
        let template: &str = kind.into();

        let result = self.sender.send_email(&email).await;
        let (status, error_message) = match &result {
            Ok(()) => {
                log_business_event!(
                    event.category = event::category::EMAIL,
                    event.action = event::action::EMAIL_SENT,
                    event.entity_type = event::entity_type::EMAIL_LOG,
                    event.result = event::result::SUCCESS,
                    email.template = template,
                    email.recipient = %email.to,
                    "メール送信成功"
                );
                (EmailLogStatus::Sent, None)
            }
            Err(e) => {
                log_business_event!(
                    event.category = event::category::EMAIL,
                    event.action = event::action::EMAIL_FAILED,
                    event.entity_type = event::entity_type::EMAIL_LOG,
                    event.result = event::result::FAILURE,
                    email.template = template,
                    email.recipient = %email.to,
                    error.category = error::category::EXTERNAL_SERVICE,
                    error.kind = error::kind::EMAIL_DELIVERY,
                    error = %e,
                    "メール送信失敗"
                );
                (EmailLogStatus::Failed, Some(e.to_string()))
            }
        };

        let log = EmailLog {
            id: EmailLogId::new(),
            template: kind,
            recipient: email.to,
            subject: email.subject,
            status,
            error_message,
            sent_by: sent_by.cloned(),
            created_at: self.clock.now(),
        };
        if let Err(e) = self.log_repo.insert(&log).await {
            tracing::error!(error = %e, "メール送信ログの記録に失敗");
        }

        result
    }

    /// メールを送信する（fire-and-forget）
    pub async fn notify(
        &self,
        kind: EmailTemplateKind,
        fields: &EmailFields,
        sent_by: Option<&UserId>,
    ) {
        if let Err(e) = self.send(kind, fields, sent_by).await {
            tracing::warn!(error = %e, template = %kind, "通知メールを送信できませんでした");
        }
    }

    /// 受信者のメール設定。未保存や取得失敗なら既定値（すべて受信）
    pub async fn preferences_for(&self, user_id: &UserId) -> EmailPreferences {
        match self.preferences_repo.find_by_user(user_id).await {
            Ok(Some(preferences)) => preferences,
            Ok(None) => EmailPreferences::defaults_for(user_id.clone()),
            Err(e) => {
                tracing::error!(
                    error = %e,
                    %user_id,
                    "メール設定の取得に失敗。既定値で続行します"
                );
                EmailPreferences::defaults_for(user_id.clone())
            }
        }
    }

    /// 受信者のメール設定が許す場合だけ送信する
    ///
    /// `to` と `recipient_name` は受信者から埋める。
    pub async fn notify_user(
        &self,
        recipient: &User,
        kind: EmailTemplateKind,
        fields: EmailFields,
        sent_by: Option<&UserId>,
    ) {
        let preferences = self.preferences_for(recipient.id()).await;
        if !preferences.allows(kind) {
            tracing::debug!(
                user_id = %recipient.id(),
                template = %kind,
                "メール設定により送信をスキップ"
            );
            return;
        }

        let fields = EmailFields {
            to: recipient.email().as_str().to_string(),
            recipient_name: Some(recipient.full_name()),
            ..fields
        };
        self.notify(kind, &fields, sent_by).await;
    }
}

#[cfg(test)]
mod tests {
    use chrono::{DateTime, Utc};
    use pretty_assertions::assert_eq;
    use trainflow_domain::{
        clock::FixedClock,
        user::{BadgeNumber, Email, NewUser, UserRole},
        value_objects::PersonName,
    };
    use trainflow_infra::mock::{
        MockEmailLogRepository,
        MockEmailPreferencesRepository,
        MockNotificationSender,
    };

    use super::*;

    fn now() -> DateTime<Utc> {
        DateTime::from_timestamp(1_760_000_000, 0).unwrap()
    }

    fn make_service(
        sender: MockNotificationSender,
        log_repo: MockEmailLogRepository,
        preferences_repo: MockEmailPreferencesRepository,
    ) -> NotificationService {
        NotificationService::new(
            Arc::new(sender),
            TemplateRenderer::new().unwrap(),
            Arc::new(log_repo),
            Arc::new(preferences_repo),
            Arc::new(FixedClock::new(now())),
            "http://localhost:5173".to_string(),
        )
    }

    fn fields() -> EmailFields {
        EmailFields {
            to: "lt.park@shpd.example.com".to_string(),
            subject: "Training Request Approved".to_string(),
            officer_name: "Alex Morgan".to_string(),
            training_name: "Crisis Intervention".to_string(),
            ..Default::default()
        }
    }

    fn officer() -> User {
        User::new(NewUser {
            id: UserId::new(),
            badge_number: BadgeNumber::new("P5001").unwrap(),
            first_name: PersonName::new("Alex").unwrap(),
            last_name: PersonName::new("Morgan").unwrap(),
            email: Email::new("alex.morgan@shpd.example.com").unwrap(),
            role: UserRole::Officer,
            rank: "Police Officer".to_string(),
            supervisor_id: None,
            platoon: None,
            now: now(),
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_送信成功時にsentで記録する() {
        let sender = MockNotificationSender::new();
        let log_repo = MockEmailLogRepository::new();
        let service = make_service(
            sender.clone(),
            log_repo.clone(),
            MockEmailPreferencesRepository::new(),
        );
        let admin_id = UserId::new();

        service
            .send(EmailTemplateKind::General, &fields(), Some(&admin_id))
            .await
            .unwrap();

        assert_eq!(sender.sent_emails().len(), 1);
        let logs = log_repo.logs();
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].status, EmailLogStatus::Sent);
        assert_eq!(logs[0].recipient, "lt.park@shpd.example.com");
        assert_eq!(logs[0].sent_by, Some(admin_id));
        assert_eq!(logs[0].created_at, now());
    }

    #[tokio::test]
    async fn test_差出人設定は送信者名と返信先と署名に反映される() {
        let sender = MockNotificationSender::new();
        let service = make_service(
            sender.clone(),
            MockEmailLogRepository::new(),
            MockEmailPreferencesRepository::new(),
        );
        let profile = SenderProfile {
            from_name: Some("Lt. Dana Cruz".to_string()),
            reply_to:  Some("dana.cruz@shpd.example.com".to_string()),
            signature: Some("Lt. Dana Cruz, Training Unit".to_string()),
        };

        service
            .send_as(EmailTemplateKind::General, &fields(), None, &profile)
            .await
            .unwrap();

        let sent = sender.sent_emails();
        assert_eq!(sent[0].from_name.as_deref(), Some("Lt. Dana Cruz"));
        assert_eq!(sent[0].reply_to.as_deref(), Some("dana.cruz@shpd.example.com"));
        assert!(sent[0].text_body.contains("Lt. Dana Cruz, Training Unit"));
    }

    #[tokio::test]
    async fn test_送信失敗時はエラーを返しfailedで記録する() {
        let log_repo = MockEmailLogRepository::new();
        let service = make_service(
            MockNotificationSender::failing(),
            log_repo.clone(),
            MockEmailPreferencesRepository::new(),
        );

        let result = service.send(EmailTemplateKind::General, &fields(), None).await;

        assert!(matches!(result, Err(NotificationError::SendFailed(_))));
        let logs = log_repo.logs();
        assert_eq!(logs[0].status, EmailLogStatus::Failed);
        assert!(logs[0].error_message.is_some());
    }

    #[tokio::test]
    async fn test_必須項目の欠落は送信もログもしない() {
        let sender = MockNotificationSender::new();
        let log_repo = MockEmailLogRepository::new();
        let service = make_service(
            sender.clone(),
            log_repo.clone(),
            MockEmailPreferencesRepository::new(),
        );
        let missing = EmailFields {
            to: String::new(),
            ..fields()
        };

        let result = service.send(EmailTemplateKind::General, &missing, None).await;

        assert!(matches!(result, Err(NotificationError::InvalidFields(_))));
        assert!(sender.sent_emails().is_empty());
        assert!(log_repo.logs().is_empty());
    }

    #[tokio::test]
    async fn test_notify_userは受信者のアドレスと宛名を埋める() {
        let sender = MockNotificationSender::new();
        let service = make_service(
            sender.clone(),
            MockEmailLogRepository::new(),
            MockEmailPreferencesRepository::new(),
        );
        let recipient = officer();

        service
            .notify_user(&recipient, EmailTemplateKind::Approval, fields(), None)
            .await;

        let sent = sender.sent_emails();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "alex.morgan@shpd.example.com");
        assert!(sent[0].text_body.contains("Hello Alex Morgan,"));
    }

    #[tokio::test]
    async fn test_設定で止めた種類は送信しない() {
        let sender = MockNotificationSender::new();
        let preferences_repo = MockEmailPreferencesRepository::new();
        let recipient = officer();
        preferences_repo
            .upsert(&EmailPreferences {
                notify_on_denial: false,
                ..EmailPreferences::defaults_for(recipient.id().clone())
            })
            .await
            .unwrap();
        let service = make_service(sender.clone(), MockEmailLogRepository::new(), preferences_repo);

        service
            .notify_user(&recipient, EmailTemplateKind::Denial, fields(), None)
            .await;
        service
            .notify_user(&recipient, EmailTemplateKind::Approval, fields(), None)
            .await;

        let sent = sender.sent_emails();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].subject, "Training Request Approved");
    }
}
