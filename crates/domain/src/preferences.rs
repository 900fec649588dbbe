//! # メール通知設定
//!
//! ユーザーごとに、どの種類のメールを受け取るかとリマインダーの日数を持つ。

use serde::{Deserialize, Serialize};

use crate::{
    DomainError,
    notification::{EmailTemplateKind, SenderProfile},
    user::{Email, UserId},
};

/// 送信者名の既定値
pub const DEFAULT_FROM_NAME: &str = "SHPD Training System";

/// リマインダー日数の上限
pub const MAX_DAYS_BEFORE: i32 = 365;

const FROM_NAME_MAX_LENGTH: usize = 100;
const SIGNATURE_MAX_LENGTH: usize = 2000;

/// 設定で個別に止められるメールの種類
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmailCategory {
    Submission,
    Approval,
    Denial,
    CertificateExpiry,
    TrainingReminder,
    Other,
}

impl From<EmailTemplateKind> for EmailCategory {
    fn from(kind: EmailTemplateKind) -> Self {
        match kind {
            EmailTemplateKind::Submission => Self::Submission,
            EmailTemplateKind::Approval | EmailTemplateKind::FinalApproval => Self::Approval,
            EmailTemplateKind::Denial => Self::Denial,
            EmailTemplateKind::General | EmailTemplateKind::Mass | EmailTemplateKind::Notification => {
                Self::Other
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailPreferences {
    pub user_id: UserId,
    pub notify_on_approval: bool,
    pub notify_on_denial: bool,
    pub notify_on_submission: bool,
    pub notify_on_cert_expiry: bool,
    pub notify_on_training_reminder: bool,
    pub reminder_days_before: i32,
    pub cert_expiry_days_before: i32,
    pub from_name: String,
    pub reply_to_email: Option<String>,
    pub email_signature: Option<String>,
}

impl EmailPreferences {
    /// 未保存ユーザーの既定値（すべて受信）
    pub fn defaults_for(user_id: UserId) -> Self {
        Self {
            user_id,
            notify_on_approval: true,
            notify_on_denial: true,
            notify_on_submission: true,
            notify_on_cert_expiry: true,
            notify_on_training_reminder: true,
            reminder_days_before: 7,
            cert_expiry_days_before: 30,
            from_name: DEFAULT_FROM_NAME.to_string(),
            reply_to_email: None,
            email_signature: None,
        }
    }

    pub fn allows(&self, category: impl Into<EmailCategory>) -> bool {
        match category.into() {
            EmailCategory::Submission => self.notify_on_submission,
            EmailCategory::Approval => self.notify_on_approval,
            EmailCategory::Denial => self.notify_on_denial,
            EmailCategory::CertificateExpiry => self.notify_on_cert_expiry,
            EmailCategory::TrainingReminder => self.notify_on_training_reminder,
            EmailCategory::Other => true,
        }
    }

    /// 研修日・期限日の何日前からメールを送るか
    ///
    /// リマインダー系以外の種類は `None`。
    pub fn reminder_window(&self, category: EmailCategory) -> Option<i32> {
        match category {
            EmailCategory::TrainingReminder => Some(self.reminder_days_before),
            EmailCategory::CertificateExpiry => Some(self.cert_expiry_days_before),
            _ => None,
        }
    }

    /// 残り `days_left` 日の時点でリマインダーメールを受け取るか
    pub fn wants_reminder(&self, category: EmailCategory, days_left: i64) -> bool {
        self.allows(category)
            && self
                .reminder_window(category)
                .is_some_and(|window| days_left > 0 && days_left <= i64::from(window))
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        for (days, label) in [
            (self.reminder_days_before, "研修リマインダー日数"),
            (self.cert_expiry_days_before, "証明書期限通知日数"),
        ] {
            if !(0..=MAX_DAYS_BEFORE).contains(&days) {
                return Err(DomainError::Validation(format!(
                    "{label}は 0〜{MAX_DAYS_BEFORE} の範囲で指定してください"
                )));
            }
        }
        if self.from_name.trim().is_empty() {
            return Err(DomainError::Validation("送信者名は必須です".to_string()));
        }
        if self.from_name.chars().count() > FROM_NAME_MAX_LENGTH {
            return Err(DomainError::Validation(format!(
                "送信者名は {FROM_NAME_MAX_LENGTH} 文字以内で入力してください"
            )));
        }
        if let Some(reply_to) = non_blank(&self.reply_to_email) {
            Email::new(reply_to)?;
        }
        if non_blank(&self.email_signature).is_some_and(|s| s.chars().count() > SIGNATURE_MAX_LENGTH)
        {
            return Err(DomainError::Validation(format!(
                "署名は {SIGNATURE_MAX_LENGTH} 文字以内で入力してください"
            )));
        }
        Ok(())
    }

    /// このユーザーが差出人として送るときの表示名・返信先・署名
    pub fn sender_profile(&self) -> SenderProfile {
        SenderProfile {
            from_name: Some(self.from_name.trim())
                .filter(|name| !name.is_empty())
                .map(str::to_string),
            reply_to: non_blank(&self.reply_to_email).map(str::to_string),
            signature: non_blank(&self.email_signature).map(str::to_string),
        }
    }
}

fn non_blank(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[test]
    fn test_既定値はすべて受信する() {
        let sut = EmailPreferences::defaults_for(UserId::new());

        assert!(sut.allows(EmailCategory::CertificateExpiry));
        assert!(sut.allows(EmailTemplateKind::FinalApproval));
        assert_eq!(sut.reminder_days_before, 7);
        assert_eq!(sut.cert_expiry_days_before, 30);
        assert_eq!(sut.from_name, "SHPD Training System");
    }

    #[rstest]
    #[case(EmailTemplateKind::Approval, false)]
    #[case(EmailTemplateKind::FinalApproval, false)]
    #[case(EmailTemplateKind::Denial, true)]
    #[case(EmailTemplateKind::Mass, true)]
    fn test_承認通知を止めると最終承認も止まる(
        #[case] kind: EmailTemplateKind,
        #[case] expected: bool,
    ) {
        let sut = EmailPreferences {
            notify_on_approval: false,
            ..EmailPreferences::defaults_for(UserId::new())
        };

        assert_eq!(sut.allows(kind), expected);
    }

    #[rstest]
    #[case(EmailCategory::TrainingReminder, 3, true)]
    #[case(EmailCategory::TrainingReminder, 4, false)]
    #[case(EmailCategory::TrainingReminder, 0, false)]
    #[case(EmailCategory::CertificateExpiry, 45, true)]
    #[case(EmailCategory::CertificateExpiry, 46, false)]
    #[case(EmailCategory::Approval, 1, false)]
    fn test_リマインダーは各自の日数以内だけ受け取る(
        #[case] category: EmailCategory,
        #[case] days_left: i64,
        #[case] expected: bool,
    ) {
        let sut = EmailPreferences {
            reminder_days_before: 3,
            cert_expiry_days_before: 45,
            ..EmailPreferences::defaults_for(UserId::new())
        };

        assert_eq!(sut.wants_reminder(category, days_left), expected);
    }

    #[test]
    fn test_リマインダーを止めると日数内でも受け取らない() {
        let sut = EmailPreferences {
            notify_on_cert_expiry: false,
            ..EmailPreferences::defaults_for(UserId::new())
        };

        assert!(!sut.wants_reminder(EmailCategory::CertificateExpiry, 1));
        assert!(sut.wants_reminder(EmailCategory::TrainingReminder, 1));
    }

    #[test]
    fn test_差出人設定は空白を除いて使う() {
        let sut = EmailPreferences {
            from_name: " Lt. Dana Cruz ".to_string(),
            reply_to_email: Some("dana.cruz@shpd.example.com".to_string()),
            email_signature: Some("  ".to_string()),
            ..EmailPreferences::defaults_for(UserId::new())
        };

        assert_eq!(
            sut.sender_profile(),
            SenderProfile {
                from_name: Some("Lt. Dana Cruz".to_string()),
                reply_to:  Some("dana.cruz@shpd.example.com".to_string()),
                signature: None,
            }
        );
    }

    #[test]
    fn test_返信先がメール形式でなければエラー() {
        let sut = EmailPreferences {
            reply_to_email: Some("front desk".to_string()),
            ..EmailPreferences::defaults_for(UserId::new())
        };

        assert!(sut.validate().is_err());
    }

    #[test]
    fn test_長すぎる署名はエラー() {
        let sut = EmailPreferences {
            email_signature: Some("x".repeat(2001)),
            ..EmailPreferences::defaults_for(UserId::new())
        };

        assert!(sut.validate().is_err());
    }

    #[rstest]
    #[case(-1)]
    #[case(366)]
    fn test_範囲外の日数はエラー(#[case] days: i32) {
        let sut = EmailPreferences {
            reminder_days_before: days,
            ..EmailPreferences::defaults_for(UserId::new())
        };

        assert!(sut.validate().is_err());
    }
}
