//! # ユーザー
//!
//! 警察署の職員。ロールで操作権限が決まり、自由記述の階級（rank）で
//! カスタム申請の承認チェーンに参加する。
//!
//! | 型 | 用途 |
//! |---|------|
//! | [`User`] | 職員エンティティ |
//! | [`UserRole`] | システム上のロール |
//! | [`BadgeNumber`] | ログイン ID を兼ねるバッジ番号 |
//! | [`Platoon`] | 勤務班 |

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::IntoStaticStr;

use crate::{DomainError, rank::ApprovalRank, value_objects::PersonName};

define_uuid_id! {
    /// ユーザー ID
    pub struct UserId;
}

define_validated_string! {
    /// バッジ番号
    pub struct BadgeNumber {
        label: "バッジ番号",
        max_length: 20,
    }
}

/// メールアドレス
///
/// `local@domain` の形だけを確認する。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Email(String);

impl Email {
    pub fn new(value: impl Into<String>) -> Result<Self, DomainError> {
        let value = value.into().trim().to_string();

        if value.is_empty() {
            return Err(DomainError::Validation(
                "メールアドレスは必須です".to_string(),
            ));
        }

        let Some((local, domain)) = value.split_once('@') else {
            return Err(DomainError::Validation(
                "メールアドレスの形式が不正です".to_string(),
            ));
        };
        if local.is_empty() || domain.is_empty() || !domain.contains('.') {
            return Err(DomainError::Validation(
                "メールアドレスの形式が不正です".to_string(),
            ));
        }

        if value.len() > 255 {
            return Err(DomainError::Validation(
                "メールアドレスは255文字以内である必要があります".to_string(),
            ));
        }

        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl std::fmt::Display for Email {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// ユーザーロール
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, IntoStaticStr, strum::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum UserRole {
    Officer,
    Supervisor,
    Administrator,
    Accounting,
    TrainingCoordinator,
    Staff,
}

impl std::str::FromStr for UserRole {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "officer" => Ok(Self::Officer),
            "supervisor" => Ok(Self::Supervisor),
            "administrator" => Ok(Self::Administrator),
            "accounting" => Ok(Self::Accounting),
            "training_coordinator" => Ok(Self::TrainingCoordinator),
            "staff" => Ok(Self::Staff),
            _ => Err(DomainError::Validation(format!("不正なロール: {s}"))),
        }
    }
}

impl UserRole {
    /// administrator / training_coordinator
    ///
    /// 管理承認段階の承認と、任意段階での代行承認ができる。
    pub fn is_administrative(self) -> bool {
        matches!(self, Self::Administrator | Self::TrainingCoordinator)
    }

    /// 経理機能（費用・予算・請求書）を扱えるか
    pub fn can_manage_accounting(self) -> bool {
        matches!(self, Self::Accounting | Self::Administrator)
    }
}

/// 勤務班
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, IntoStaticStr, strum::Display,
)]
pub enum Platoon {
    #[serde(rename = "A-Days")]
    #[strum(serialize = "A-Days")]
    ADays,
    #[serde(rename = "B-Nights")]
    #[strum(serialize = "B-Nights")]
    BNights,
    #[serde(rename = "C-Nights")]
    #[strum(serialize = "C-Nights")]
    CNights,
    #[serde(rename = "D-Days")]
    #[strum(serialize = "D-Days")]
    DDays,
}

impl std::str::FromStr for Platoon {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "A-Days" => Ok(Self::ADays),
            "B-Nights" => Ok(Self::BNights),
            "C-Nights" => Ok(Self::CNights),
            "D-Days" => Ok(Self::DDays),
            _ => Err(DomainError::Validation(format!("不正な勤務班: {s}"))),
        }
    }
}

/// 職員エンティティ
///
/// パスワードハッシュはここに持たず、認証時にリポジトリから別途取得する。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    id: UserId,
    badge_number: BadgeNumber,
    first_name: PersonName,
    last_name: PersonName,
    email: Email,
    role: UserRole,
    rank: String,
    supervisor_id: Option<UserId>,
    platoon: Option<Platoon>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// 新規作成パラメータ
pub struct NewUser {
    pub id: UserId,
    pub badge_number: BadgeNumber,
    pub first_name: PersonName,
    pub last_name: PersonName,
    pub email: Email,
    pub role: UserRole,
    pub rank: String,
    pub supervisor_id: Option<UserId>,
    pub platoon: Option<Platoon>,
    pub now: DateTime<Utc>,
}

/// DB 復元パラメータ
pub struct UserRecord {
    pub id: UserId,
    pub badge_number: BadgeNumber,
    pub first_name: PersonName,
    pub last_name: PersonName,
    pub email: Email,
    pub role: UserRole,
    pub rank: String,
    pub supervisor_id: Option<UserId>,
    pub platoon: Option<Platoon>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// プロフィール編集で変更できる項目
#[derive(Debug, Clone, Default)]
pub struct ProfileUpdate {
    pub first_name: Option<PersonName>,
    pub last_name: Option<PersonName>,
    pub email: Option<Email>,
    pub platoon: Option<Option<Platoon>>,
}

impl User {
    pub fn new(params: NewUser) -> Result<Self, DomainError> {
        if params.supervisor_id.as_ref() == Some(&params.id) {
            return Err(DomainError::Validation(
                "自分自身を上長に設定することはできません".to_string(),
            ));
        }
        Ok(Self {
            id: params.id,
            badge_number: params.badge_number,
            first_name: params.first_name,
            last_name: params.last_name,
            email: params.email,
            role: params.role,
            rank: params.rank.trim().to_string(),
            supervisor_id: params.supervisor_id,
            platoon: params.platoon,
            created_at: params.now,
            updated_at: params.now,
        })
    }

    pub fn from_db(record: UserRecord) -> Self {
        Self {
            id: record.id,
            badge_number: record.badge_number,
            first_name: record.first_name,
            last_name: record.last_name,
            email: record.email,
            role: record.role,
            rank: record.rank,
            supervisor_id: record.supervisor_id,
            platoon: record.platoon,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }

    pub fn id(&self) -> &UserId {
        &self.id
    }

    pub fn badge_number(&self) -> &BadgeNumber {
        &self.badge_number
    }

    pub fn first_name(&self) -> &PersonName {
        &self.first_name
    }

    pub fn last_name(&self) -> &PersonName {
        &self.last_name
    }

    /// `"First Last"`
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    pub fn email(&self) -> &Email {
        &self.email
    }

    pub fn role(&self) -> UserRole {
        self.role
    }

    pub fn rank(&self) -> &str {
        &self.rank
    }

    pub fn supervisor_id(&self) -> Option<&UserId> {
        self.supervisor_id.as_ref()
    }

    pub fn platoon(&self) -> Option<Platoon> {
        self.platoon
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// 階級テキストが承認階級に該当するか
    pub fn holds_rank(&self, rank: ApprovalRank) -> bool {
        rank.matches(&self.rank)
    }

    /// `other` の直属上長か
    pub fn supervises(&self, other: &User) -> bool {
        other.supervisor_id.as_ref() == Some(&self.id)
    }

    /// プロフィールを編集した新しいユーザーを返す
    pub fn with_profile(self, update: ProfileUpdate, now: DateTime<Utc>) -> Self {
        Self {
            first_name: update.first_name.unwrap_or(self.first_name),
            last_name: update.last_name.unwrap_or(self.last_name),
            email: update.email.unwrap_or(self.email),
            platoon: update.platoon.unwrap_or(self.platoon),
            updated_at: now,
            ..self
        }
    }
}
