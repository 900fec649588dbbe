//! # メールユースケース
//!
//! 管理者が画面から直接送るメールと、職員ごとのメール受信設定を扱う。
//! 直接送信は受信設定を見ずに送り、結果（成否・件数）を呼び出し元に返す。
//! 送信者名・返信先・署名は送信する管理者自身の設定から取る。

use std::{collections::HashMap, sync::Arc};

use itertools::Itertools;
use trainflow_domain::{
    notification::{EmailFields, EmailTemplateKind, SenderProfile},
    preferences::EmailPreferences,
    user::{User, UserId},
};
use trainflow_infra::repository::{EmailPreferencesRepository, UserRepository};

use crate::{
    error::CoreError,
    usecase::{helpers::FindResultExt, notification::NotificationService},
};

/// 直接送信の結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailSendResult {
    pub success: bool,
    pub error: Option<String>,
}

/// 一斉送信の結果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MassEmailResult {
    pub sent: usize,
    pub failed: usize,
}

/// 一斉送信の入力
#[derive(Debug, Clone)]
pub struct MassEmailInput {
    pub recipient_ids: Vec<UserId>,
    pub subject: String,
    pub body: String,
}

pub struct EmailUseCaseImpl {
    notifier: Arc<NotificationService>,
    user_repo: Arc<dyn UserRepository>,
    preferences_repo: Arc<dyn EmailPreferencesRepository>,
}

impl EmailUseCaseImpl {
    pub fn new(
        notifier: Arc<NotificationService>,
        user_repo: Arc<dyn UserRepository>,
        preferences_repo: Arc<dyn EmailPreferencesRepository>,
    ) -> Self {
        Self {
            notifier,
            user_repo,
            preferences_repo,
        }
    }

    /// テンプレート種別と差し込み値を指定して 1 通送る
    pub async fn send(
        &self,
        sender_id: &UserId,
        kind: EmailTemplateKind,
        fields: EmailFields,
    ) -> EmailSendResult {
        let profile = match self.get_preferences(sender_id).await {
            Ok(preferences) => preferences.sender_profile(),
            Err(e) => {
                tracing::warn!(error = %e, %sender_id, "差出人設定を取得できません。既定の差出人で送信します");
                SenderProfile::default()
            }
        };
        match self
            .notifier
            .send_as(kind, &fields, Some(sender_id), &profile)
            .await
        {
            Ok(()) => EmailSendResult {
                success: true,
                error: None,
            },
            Err(e) => EmailSendResult {
                success: false,
                error: Some(e.to_string()),
            },
        }
    }

    /// 選択した職員へ同じ本文を送る
    ///
    /// 重複した宛先は 1 通にまとめる。見つからない職員と送信に失敗した宛先は
    /// `failed` に数える。
    pub async fn send_mass(
        &self,
        sender_id: &UserId,
        input: MassEmailInput,
    ) -> Result<MassEmailResult, CoreError> {
        if input.recipient_ids.is_empty() {
            return Err(CoreError::BadRequest("宛先を 1 人以上指定してください".to_string()));
        }
        if input.subject.trim().is_empty() || input.body.trim().is_empty() {
            return Err(CoreError::BadRequest("件名と本文は必須です".to_string()));
        }

        let sender = self.user_repo.find_by_id(sender_id).await.or_not_found("送信者")?;
        let profile = self.get_preferences(sender_id).await?.sender_profile();
        let recipient_ids: Vec<UserId> = input.recipient_ids.into_iter().unique().collect();
        let recipients: HashMap<UserId, User> = self
            .user_repo
            .find_by_ids(&recipient_ids)
            .await?
            .into_iter()
            .map(|u| (u.id().clone(), u))
            .collect();

        let mut result = MassEmailResult { sent: 0, failed: 0 };
        for recipient_id in &recipient_ids {
            let Some(recipient) = recipients.get(recipient_id) else {
                tracing::warn!(%recipient_id, "一斉送信の宛先が見つかりません");
                result.failed += 1;
                continue;
            };
            let fields = EmailFields {
                to: recipient.email().as_str().to_string(),
                subject: input.subject.clone(),
                officer_name: sender.full_name(),
                training_name: input.subject.clone(),
                recipient_name: Some(recipient.full_name()),
                notes: Some(input.body.clone()),
                ..Default::default()
            };
            match self
                .notifier
                .send_as(EmailTemplateKind::Mass, &fields, Some(sender.id()), &profile)
                .await
            {
                Ok(()) => result.sent += 1,
                Err(_) => result.failed += 1,
            }
        }

        tracing::info!(sent = result.sent, failed = result.failed, "一斉送信が完了");
        Ok(result)
    }

    /// 受信設定（未保存なら既定値）
    pub async fn get_preferences(&self, user_id: &UserId) -> Result<EmailPreferences, CoreError> {
        Ok(self
            .preferences_repo
            .find_by_user(user_id)
            .await?
            .unwrap_or_else(|| EmailPreferences::defaults_for(user_id.clone())))
    }

    /// 受信設定を保存する
    pub async fn update_preferences(
        &self,
        user_id: &UserId,
        preferences: EmailPreferences,
    ) -> Result<EmailPreferences, CoreError> {
        let preferences = EmailPreferences {
            user_id: user_id.clone(),
            ..preferences
        };
        preferences.validate()?;
        self.preferences_repo.upsert(&preferences).await?;
        Ok(preferences)
    }
}
