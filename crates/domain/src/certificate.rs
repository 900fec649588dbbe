//! # 修了証明書
//!
//! 研修修了時に管理者が発行する証明書。有効期限が近づくと通知の対象になる。

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum::IntoStaticStr;

use crate::{DomainError, user::UserId};

define_uuid_id! {
    /// 証明書 ID
    pub struct CertificateId;
}

/// 期限通知の対象とする残り日数
pub const EXPIRY_WINDOW_DAYS: i64 = 60;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, IntoStaticStr, strum::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CertificateStatus {
    Active,
    Expired,
    Revoked,
}

impl std::str::FromStr for CertificateStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(Self::Active),
            "expired" => Ok(Self::Expired),
            "revoked" => Ok(Self::Revoked),
            _ => Err(DomainError::Validation(format!(
                "不正な証明書ステータス: {s}"
            ))),
        }
    }
}

/// 期限の判定結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpiryCheck {
    /// 通知不要（期限なし、期限まで余裕あり、有効でない）
    NotDue,
    /// 期限まで残り n 日
    ExpiringIn(i64),
    /// 期限切れ
    Expired,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Certificate {
    id: CertificateId,
    user_id: UserId,
    certificate_number: String,
    training_title: String,
    completion_date: NaiveDate,
    issued_date: NaiveDate,
    expiration_date: Option<NaiveDate>,
    credits: f64,
    instructor: Option<String>,
    status: CertificateStatus,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

pub struct NewCertificate {
    pub id: CertificateId,
    pub user_id: UserId,
    pub certificate_number: String,
    pub training_title: String,
    pub completion_date: NaiveDate,
    pub expiration_date: Option<NaiveDate>,
    pub credits: f64,
    pub instructor: Option<String>,
    pub now: DateTime<Utc>,
}

/// DB 復元パラメータ
pub struct CertificateRecord {
    pub id: CertificateId,
    pub user_id: UserId,
    pub certificate_number: String,
    pub training_title: String,
    pub completion_date: NaiveDate,
    pub issued_date: NaiveDate,
    pub expiration_date: Option<NaiveDate>,
    pub credits: f64,
    pub instructor: Option<String>,
    pub status: CertificateStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Certificate {
    /// 発行日は `now` の日付になる
    pub fn issue(params: NewCertificate) -> Result<Self, DomainError> {
        if params.certificate_number.trim().is_empty() || params.training_title.trim().is_empty() {
            return Err(DomainError::Validation(
                "証明書番号と研修名は必須です".to_string(),
            ));
        }
        if params.credits < 0.0 {
            return Err(DomainError::Validation(
                "単位数は 0 以上である必要があります".to_string(),
            ));
        }
        if params
            .expiration_date
            .is_some_and(|expiration| expiration <= params.completion_date)
        {
            return Err(DomainError::Validation(
                "有効期限は修了日より後である必要があります".to_string(),
            ));
        }

        Ok(Self {
            id: params.id,
            user_id: params.user_id,
            certificate_number: params.certificate_number.trim().to_string(),
            training_title: params.training_title.trim().to_string(),
            completion_date: params.completion_date,
            issued_date: params.now.date_naive(),
            expiration_date: params.expiration_date,
            credits: params.credits,
            instructor: params.instructor,
            status: CertificateStatus::Active,
            created_at: params.now,
            updated_at: params.now,
        })
    }

    pub fn from_db(record: CertificateRecord) -> Self {
        Self {
            id: record.id,
            user_id: record.user_id,
            certificate_number: record.certificate_number,
            training_title: record.training_title,
            completion_date: record.completion_date,
            issued_date: record.issued_date,
            expiration_date: record.expiration_date,
            credits: record.credits,
            instructor: record.instructor,
            status: record.status,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }

    pub fn id(&self) -> &CertificateId {
        &self.id
    }

    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    pub fn certificate_number(&self) -> &str {
        &self.certificate_number
    }

    pub fn training_title(&self) -> &str {
        &self.training_title
    }

    pub fn completion_date(&self) -> NaiveDate {
        self.completion_date
    }

    pub fn issued_date(&self) -> NaiveDate {
        self.issued_date
    }

    pub fn expiration_date(&self) -> Option<NaiveDate> {
        self.expiration_date
    }

    pub fn credits(&self) -> f64 {
        self.credits
    }

    pub fn instructor(&self) -> Option<&str> {
        self.instructor.as_deref()
    }

    pub fn status(&self) -> CertificateStatus {
        self.status
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// 有効な証明書の期限を `today` 基準で判定する
    pub fn check_expiry(&self, today: NaiveDate) -> ExpiryCheck {
        let Some(expiration) = self.expiration_date else {
            return ExpiryCheck::NotDue;
        };
        if self.status != CertificateStatus::Active {
            return ExpiryCheck::NotDue;
        }
        let days = (expiration - today).num_days();
        match days {
            ..0 => ExpiryCheck::Expired,
            0..=EXPIRY_WINDOW_DAYS => ExpiryCheck::ExpiringIn(days),
            _ => ExpiryCheck::NotDue,
        }
    }

    /// 期限切れにする
    pub fn mark_expired(self, now: DateTime<Utc>) -> Result<Self, DomainError> {
        if self.status != CertificateStatus::Active {
            return Err(DomainError::Validation(format!(
                "有効な証明書のみ期限切れにできます（現在: {}）",
                self.status
            )));
        }
        Ok(Self {
            status: CertificateStatus::Expired,
            updated_at: now,
            ..self
        })
    }

    /// 失効させる
    pub fn revoke(self, now: DateTime<Utc>) -> Result<Self, DomainError> {
        if self.status == CertificateStatus::Revoked {
            return Err(DomainError::Conflict(
                "この証明書は失効済みです".to_string(),
            ));
        }
        Ok(Self {
            status: CertificateStatus::Revoked,
            updated_at: now,
            ..self
        })
    }
}
