//! # 通知
//!
//! アプリ内通知とメール通知のドメインモデルを定義する。
//!
//! ## ドメイン用語
//!
//! | 型 | ドメイン用語 | 説明 |
//! |---|------------|------|
//! | [`Notification`] | アプリ内通知 | ユーザーごとの通知。既読化以外では変更されない |
//! | [`NotificationDraft`] | 通知下書き | ワークフロー遷移やジェネレータが組み立てる未保存の通知 |
//! | [`EmailFields`] | メール項目 | テンプレートに差し込む値の集合 |
//! | [`EmailMessage`] | メールメッセージ | レンダリング済みのメール |
//!
//! ## 設計方針
//!
//! - **fire-and-forget**: 通知・メールの失敗は申請の状態変更に影響しない
//! - **文面はドメインで決める**: 状態ごとの件名と本文はここで組み立てる

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum::IntoStaticStr;
use thiserror::Error;

use crate::{DomainError, rank::ApprovalRank, request::RequestStatus, user::UserId};

define_uuid_id! {
    /// 通知 ID
    pub struct NotificationId;
}

define_uuid_id! {
    /// メール送信ログ ID
    pub struct EmailLogId;
}

/// 通知送信エラー
#[derive(Debug, Error)]
pub enum NotificationError {
    /// メール送信に失敗
    #[error("メール送信に失敗: {0}")]
    SendFailed(String),

    /// テンプレートレンダリングに失敗
    #[error("テンプレートレンダリングに失敗: {0}")]
    TemplateFailed(String),

    /// 送信ログの記録に失敗
    #[error("送信ログの記録に失敗: {0}")]
    LogFailed(String),

    /// 必須項目の欠落
    #[error("必須項目が不足しています: {0}")]
    InvalidFields(String),
}

/// 通知の種類（表示上の重要度）
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    IntoStaticStr,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum NotificationKind {
    Info,
    Success,
    Warning,
    Error,
}

/// 保存前の通知
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NotificationDraft {
    pub user_id: UserId,
    pub title: String,
    pub message: String,
    pub kind: NotificationKind,
    pub link: Option<String>,
}

impl NotificationDraft {
    pub fn new(
        user_id: UserId,
        title: impl Into<String>,
        message: impl Into<String>,
        kind: NotificationKind,
    ) -> Self {
        Self {
            user_id,
            title: title.into(),
            message: message.into(),
            kind,
            link: None,
        }
    }

    pub fn with_link(self, link: impl Into<String>) -> Self {
        Self {
            link: Some(link.into()),
            ..self
        }
    }

    /// 標準申請の状態変化を申請者に伝える通知
    ///
    /// `completed` は遷移で生じないため `None` を返す。
    pub fn request_status(
        requester_id: UserId,
        status: RequestStatus,
        training_title: &str,
        denial_reason: Option<&str>,
    ) -> Option<Self> {
        let (title, message, kind) = match status {
            RequestStatus::Submitted => (
                "Request Submitted",
                format!("Your request for \"{training_title}\" has been submitted."),
                NotificationKind::Success,
            ),
            RequestStatus::SupervisorReview => (
                "Request Under Review",
                format!(
                    "Your request for \"{training_title}\" is now being reviewed by your supervisor."
                ),
                NotificationKind::Info,
            ),
            RequestStatus::AdminApproval => (
                "Request Forwarded",
                format!(
                    "Your request for \"{training_title}\" has been forwarded to administration for final approval."
                ),
                NotificationKind::Info,
            ),
            RequestStatus::Approved => (
                "Request Approved",
                format!("Great news! Your request for \"{training_title}\" has been approved."),
                NotificationKind::Success,
            ),
            RequestStatus::Denied => (
                "Request Denied",
                format!(
                    "Your request for \"{training_title}\" has been denied. Reason: {}",
                    denial_reason.unwrap_or_default()
                ),
                NotificationKind::Error,
            ),
            RequestStatus::Completed => return None,
        };
        Some(Self::new(requester_id, title, message, kind).with_link("/requests"))
    }

    /// カスタム申請が次の階級へ回付されたことを伝える通知
    pub fn custom_request_forwarded(
        requester_id: UserId,
        training_title: &str,
        next_rank: ApprovalRank,
    ) -> Self {
        Self::new(
            requester_id,
            "Request Forwarded",
            format!("Your request for \"{training_title}\" has been forwarded to {next_rank} for review."),
            NotificationKind::Info,
        )
        .with_link("/custom-requests")
    }

    /// 承認待ち件数の通知
    pub fn pending_approvals(user_id: UserId, count: usize) -> Self {
        Self::new(
            user_id,
            "Pending Approvals",
            format!(
                "You have {count} training request{} awaiting your review.",
                plural(count == 1)
            ),
            NotificationKind::Warning,
        )
        .with_link("/approvals")
    }

    pub fn training_reminder(
        user_id: UserId,
        training_title: &str,
        days_until: i64,
        date: NaiveDate,
    ) -> Self {
        Self::new(
            user_id,
            "Training Reminder",
            format!(
                "Your training \"{training_title}\" is scheduled in {days_until} day{} on {}.",
                plural(days_until == 1),
                date.format("%m/%d/%Y")
            ),
            NotificationKind::Info,
        )
        .with_link("/trainings")
    }

    /// 証明書の有効期限が近いことを伝える通知
    ///
    /// 残り 7 日以内は `URGENT: `、30 日以内は `Reminder: ` を件名に付ける。
    pub fn certificate_expiring(
        user_id: UserId,
        training_title: &str,
        days_until: i64,
        expiration: NaiveDate,
    ) -> Self {
        let prefix = match days_until {
            ..=7 => "URGENT: ",
            ..=30 => "Reminder: ",
            _ => "",
        };
        let kind = if days_until <= 30 {
            NotificationKind::Warning
        } else {
            NotificationKind::Info
        };
        Self::new(
            user_id,
            format!("{prefix}Certificate Expiring"),
            format!(
                "Your certificate for \"{training_title}\" expires in {days_until} day{} on {}.",
                plural(days_until == 1),
                expiration.format("%m/%d/%Y")
            ),
            kind,
        )
        .with_link("/certificates")
    }

    pub fn certificate_expired(user_id: UserId, training_title: &str) -> Self {
        Self::new(
            user_id,
            "Certificate Expired",
            format!(
                "Your certificate for \"{training_title}\" has expired. Please renew it as soon as possible."
            ),
            NotificationKind::Error,
        )
        .with_link("/certificates")
    }

    pub fn into_notification(self, id: NotificationId, now: DateTime<Utc>) -> Notification {
        Notification {
            id,
            user_id: self.user_id,
            title: self.title,
            message: self.message,
            kind: self.kind,
            read: false,
            link: self.link,
            created_at: now,
        }
    }
}

fn plural(is_one: bool) -> &'static str {
    if is_one { "" } else { "s" }
}

/// アプリ内通知
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    id: NotificationId,
    user_id: UserId,
    title: String,
    message: String,
    kind: NotificationKind,
    read: bool,
    link: Option<String>,
    created_at: DateTime<Utc>,
}

/// DB 復元パラメータ
pub struct NotificationRecord {
    pub id: NotificationId,
    pub user_id: UserId,
    pub title: String,
    pub message: String,
    pub kind: NotificationKind,
    pub read: bool,
    pub link: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn from_db(record: NotificationRecord) -> Self {
        Self {
            id: record.id,
            user_id: record.user_id,
            title: record.title,
            message: record.message,
            kind: record.kind,
            read: record.read,
            link: record.link,
            created_at: record.created_at,
        }
    }

    pub fn id(&self) -> &NotificationId {
        &self.id
    }

    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn kind(&self) -> NotificationKind {
        self.kind
    }

    pub fn is_read(&self) -> bool {
        self.read
    }

    pub fn link(&self) -> Option<&str> {
        self.link.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    /// 既読にする。既読済みでもそのまま既読を返す
    pub fn mark_read(self) -> Self {
        Self { read: true, ..self }
    }
}

/// 通知テーブルの変更イベント
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationChange {
    Inserted(Notification),
    Updated(Notification),
}

impl NotificationChange {
    pub fn notification(&self) -> &Notification {
        match self {
            Self::Inserted(n) | Self::Updated(n) => n,
        }
    }

    pub fn into_notification(self) -> Notification {
        match self {
            Self::Inserted(n) | Self::Updated(n) => n,
        }
    }
}

/// メールテンプレート種別
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    IntoStaticStr,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EmailTemplateKind {
    Submission,
    Approval,
    Denial,
    FinalApproval,
    General,
    Mass,
    Notification,
}

impl EmailTemplateKind {
    /// 本文の導入文
    pub fn lead(self) -> &'static str {
        match self {
            Self::Submission => {
                "A new training request has been submitted and requires your attention."
            }
            Self::Approval => "A training request has been approved and forwarded for the next review.",
            Self::FinalApproval => "A training request has received final approval.",
            Self::Denial => "A training request has been denied.",
            Self::General | Self::Mass | Self::Notification => {
                "You have a new message from the SHPD Training System."
            }
        }
    }
}

/// テンプレートに差し込む値
///
/// `to`、`subject`、`officer_name`、`training_name` は必須。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailFields {
    pub to: String,
    pub subject: String,
    pub officer_name: String,
    pub training_name: String,
    pub recipient_name: Option<String>,
    pub badge_number: Option<String>,
    pub training_type: Option<String>,
    pub training_date: Option<String>,
    pub date_submitted: Option<String>,
    pub approver_name: Option<String>,
    pub notes: Option<String>,
    pub system_link: Option<String>,
    /// 本文末尾に付ける差出人の署名
    pub signature: Option<String>,
}

impl EmailFields {
    /// 必須項目の欠落を送信前に検出する
    pub fn validate(&self) -> Result<(), NotificationError> {
        let missing: Vec<&str> = [
            ("to", &self.to),
            ("subject", &self.subject),
            ("officer_name", &self.officer_name),
            ("training_name", &self.training_name),
        ]
        .into_iter()
        .filter(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
        .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(NotificationError::InvalidFields(missing.join(", ")))
        }
    }
}

/// メールメッセージ
///
/// テンプレートレンダリングの出力。NotificationSender に渡される。
#[derive(Debug, Clone, Default)]
pub struct EmailMessage {
    /// 送信先メールアドレス
    pub to:        String,
    /// 件名
    pub subject:   String,
    /// HTML 本文
    pub html_body: String,
    /// プレーンテキスト本文
    pub text_body: String,
    /// 送信者名。`None` なら送信実装に設定された名前を使う
    pub from_name: Option<String>,
    /// 返信先アドレス
    pub reply_to:  Option<String>,
}

/// 管理者が直接送るメールの差出人設定
///
/// 送信元アドレスは変えず、表示名・返信先・署名だけを差し替える。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SenderProfile {
    pub from_name: Option<String>,
    pub reply_to:  Option<String>,
    pub signature: Option<String>,
}

impl SenderProfile {
    /// 署名を差し込み値に入れる
    pub fn sign(&self, fields: &EmailFields) -> EmailFields {
        EmailFields {
            signature: self.signature.clone(),
            ..fields.clone()
        }
    }

    /// 表示名と返信先をメッセージに入れる
    pub fn address(&self, email: EmailMessage) -> EmailMessage {
        EmailMessage {
            from_name: self.from_name.clone(),
            reply_to: self.reply_to.clone(),
            ..email
        }
    }
}

/// メール送信結果
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, IntoStaticStr, strum::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EmailLogStatus {
    Sent,
    Failed,
}

impl std::str::FromStr for EmailLogStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sent" => Ok(Self::Sent),
            "failed" => Ok(Self::Failed),
            _ => Err(DomainError::Validation(format!("不正な送信結果: {s}"))),
        }
    }
}

/// メール送信ログ
#[derive(Debug, Clone)]
pub struct EmailLog {
    pub id: EmailLogId,
    pub template: EmailTemplateKind,
    pub recipient: String,
    pub subject: String,
    pub status: EmailLogStatus,
    pub error_message: Option<String>,
    pub sent_by: Option<UserId>,
    pub created_at: DateTime<Utc>,
}
