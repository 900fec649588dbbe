//! # 研修申請
//!
//! 標準の研修申請。状態は次の順に 1 段ずつ進み、どの未完了段階からも却下できる。
//!
//! ```text
//! submitted → supervisor_review → admin_approval → approved
//!     └────────────┴──────────────────┴──────────→ denied
//! ```
//!
//! `approved` / `denied` / `completed` は終端で、以後の遷移はない。
//! 状態は ADT で表し、各段階で必要な承認者スタンプを型で持たせる。
//!
//! カタログ研修・署内研修・外部研修の 3 種類は同じエンティティで扱い、
//! 差分は [`RequestDetails`] に入れる。

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum::IntoStaticStr;

use crate::{
    DomainError,
    training::{TrainingId, submitted_within_30_days},
    user::{User, UserId, UserRole},
    value_objects::Money,
};

define_uuid_id! {
    /// 研修申請 ID
    pub struct TrainingRequestId;
}

define_validated_string! {
    /// 却下理由
    pub struct DenialReason {
        label: "却下理由",
        max_length: 2000,
    }
}

/// 申請ステータス
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, IntoStaticStr, strum::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RequestStatus {
    Submitted,
    SupervisorReview,
    AdminApproval,
    Approved,
    Denied,
    /// 保存済みデータの読み込みでのみ現れる
    Completed,
}

impl std::str::FromStr for RequestStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "submitted" => Ok(Self::Submitted),
            "supervisor_review" => Ok(Self::SupervisorReview),
            "admin_approval" => Ok(Self::AdminApproval),
            "approved" => Ok(Self::Approved),
            "denied" => Ok(Self::Denied),
            "completed" => Ok(Self::Completed),
            _ => Err(DomainError::Validation(format!("不正な申請ステータス: {s}"))),
        }
    }
}

impl RequestStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Approved | Self::Denied | Self::Completed)
    }

    /// 上長（supervisor）の承認待ちか
    pub fn awaits_supervisor(self) -> bool {
        matches!(self, Self::Submitted | Self::SupervisorReview)
    }
}

/// 申請の種類（`training_requests.kind`）
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, IntoStaticStr, strum::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RequestKind {
    Catalog,
    Internal,
    External,
}

/// 種類ごとの申請内容
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RequestDetails {
    /// カタログ掲載の研修
    Catalog {
        training_id:   TrainingId,
        title:         String,
        training_date: NaiveDate,
    },
    /// 署内で実施する研修
    Internal {
        course_name:   String,
        training_date: NaiveDate,
        location:      String,
        instructor:    String,
        #[serde(default)]
        attendees:     Vec<UserId>,
    },
    /// 外部団体が主催する研修
    External {
        event_name:    String,
        organization:  String,
        start_date:    NaiveDate,
        end_date:      NaiveDate,
        location:      String,
        cost_estimate: Money,
        justification: String,
    },
}

/// 研修名・コース名・イベント名の最大文字数
pub const TITLE_MAX_LENGTH: usize = 200;

fn require(value: &str, label: &str) -> Result<(), DomainError> {
    if value.trim().is_empty() {
        return Err(DomainError::Validation(format!("{label}は必須です")));
    }
    Ok(())
}

/// 必須かつ [`TITLE_MAX_LENGTH`] 文字以内
pub(crate) fn require_title(value: &str, label: &str) -> Result<(), DomainError> {
    require(value, label)?;
    if value.chars().count() > TITLE_MAX_LENGTH {
        return Err(DomainError::Validation(format!(
            "{label}は {TITLE_MAX_LENGTH} 文字以内で入力してください"
        )));
    }
    Ok(())
}

impl RequestDetails {
    pub fn kind(&self) -> RequestKind {
        match self {
            Self::Catalog { .. } => RequestKind::Catalog,
            Self::Internal { .. } => RequestKind::Internal,
            Self::External { .. } => RequestKind::External,
        }
    }

    /// 通知文面に使う研修名
    pub fn title(&self) -> &str {
        match self {
            Self::Catalog { title, .. } => title,
            Self::Internal { course_name, .. } => course_name,
            Self::External { event_name, .. } => event_name,
        }
    }

    /// 研修の実施日（外部研修は開始日）
    pub fn training_date(&self) -> NaiveDate {
        match self {
            Self::Catalog { training_date, .. } | Self::Internal { training_date, .. } => {
                *training_date
            }
            Self::External { start_date, .. } => *start_date,
        }
    }

    pub fn training_id(&self) -> Option<&TrainingId> {
        match self {
            Self::Catalog { training_id, .. } => Some(training_id),
            _ => None,
        }
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        match self {
            Self::Catalog { title, .. } => require_title(title, "研修名"),
            Self::Internal {
                course_name,
                location,
                instructor,
                ..
            } => {
                require_title(course_name, "コース名")?;
                require(location, "実施場所")?;
                require(instructor, "講師")
            }
            Self::External {
                event_name,
                organization,
                start_date,
                end_date,
                location,
                cost_estimate,
                justification,
            } => {
                require_title(event_name, "イベント名")?;
                require(organization, "主催団体")?;
                require(location, "実施場所")?;
                require(justification, "受講理由")?;
                if end_date < start_date {
                    return Err(DomainError::Validation(
                        "終了日は開始日以降である必要があります".to_string(),
                    ));
                }
                cost_estimate.estimate("費用見積")?;
                Ok(())
            }
        }
    }
}

/// 承認者と承認日時
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ApproverStamp {
    pub approver_id: UserId,
    pub at:          DateTime<Utc>,
}

impl ApproverStamp {
    pub fn new(approver_id: UserId, at: DateTime<Utc>) -> Self {
        Self { approver_id, at }
    }

    /// DB の 2 カラムから復元する（片方だけの場合は None）
    fn from_columns(id: Option<UserId>, at: Option<DateTime<Utc>>) -> Option<Self> {
        Some(Self::new(id?, at?))
    }
}

/// 申請の状態
#[derive(Debug, Clone, PartialEq)]
pub enum TrainingRequestState {
    Submitted,
    SupervisorReview(ReviewState),
    AdminApproval(ReviewState),
    Approved(ApprovedState),
    Denied(DeniedState),
    Completed(CompletedState),
}

/// supervisor_review / admin_approval の固有フィールド
#[derive(Debug, Clone, PartialEq)]
pub struct ReviewState {
    pub supervisor: ApproverStamp,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ApprovedState {
    pub supervisor: ApproverStamp,
    pub admin:      ApproverStamp,
}

/// 却下時点の段階によってどちらのスタンプが入るかが変わる
#[derive(Debug, Clone, PartialEq)]
pub struct DeniedState {
    pub supervisor: Option<ApproverStamp>,
    pub admin:      Option<ApproverStamp>,
    pub reason:     DenialReason,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompletedState {
    pub supervisor: Option<ApproverStamp>,
    pub admin:      Option<ApproverStamp>,
}

/// 承認者の判断
#[derive(Debug, Clone, PartialEq)]
pub enum Decision {
    Approve { notes: Option<String> },
    Deny { reason: DenialReason },
}

/// 研修申請エンティティ
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingRequest {
    id: TrainingRequestId,
    requester_id: UserId,
    details: RequestDetails,
    notes: Option<String>,
    review_notes: Option<String>,
    submitted_within_30_days: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    state: TrainingRequestState,
}

pub struct NewTrainingRequest {
    pub id: TrainingRequestId,
    pub requester_id: UserId,
    pub details: RequestDetails,
    pub notes: Option<String>,
    pub now: DateTime<Utc>,
}

/// DB のフラットな行。`from_db()` で不変条件を検証して ADT にする
pub struct TrainingRequestRecord {
    pub id: TrainingRequestId,
    pub requester_id: UserId,
    pub details: RequestDetails,
    pub status: RequestStatus,
    pub notes: Option<String>,
    pub review_notes: Option<String>,
    pub supervisor_id: Option<UserId>,
    pub supervisor_approved_at: Option<DateTime<Utc>>,
    pub admin_id: Option<UserId>,
    pub admin_approved_at: Option<DateTime<Utc>>,
    pub denial_reason: Option<String>,
    pub submitted_within_30_days: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn normalize_notes(notes: Option<String>) -> Option<String> {
    notes
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
}

impl TrainingRequest {
    /// `submitted` 状態の申請を作成する
    pub fn new(params: NewTrainingRequest) -> Result<Self, DomainError> {
        params.details.validate()?;
        let within_30_days = submitted_within_30_days(params.details.training_date(), params.now);

        Ok(Self {
            id: params.id,
            requester_id: params.requester_id,
            details: params.details,
            notes: normalize_notes(params.notes),
            review_notes: None,
            submitted_within_30_days: within_30_days,
            created_at: params.now,
            updated_at: params.now,
            state: TrainingRequestState::Submitted,
        })
    }

    pub fn from_db(record: TrainingRequestRecord) -> Result<Self, DomainError> {
        let supervisor =
            ApproverStamp::from_columns(record.supervisor_id, record.supervisor_approved_at);
        let admin = ApproverStamp::from_columns(record.admin_id, record.admin_approved_at);
        let missing = |what: &str| {
            DomainError::Validation(format!(
                "{} の申請には {what} が必要です",
                record.status
            ))
        };

        let state = match record.status {
            RequestStatus::Submitted => TrainingRequestState::Submitted,
            RequestStatus::SupervisorReview => TrainingRequestState::SupervisorReview(ReviewState {
                supervisor: supervisor.ok_or_else(|| missing("supervisor の承認記録"))?,
            }),
            RequestStatus::AdminApproval => TrainingRequestState::AdminApproval(ReviewState {
                supervisor: supervisor.ok_or_else(|| missing("supervisor の承認記録"))?,
            }),
            RequestStatus::Approved => TrainingRequestState::Approved(ApprovedState {
                supervisor: supervisor.ok_or_else(|| missing("supervisor の承認記録"))?,
                admin:      admin.ok_or_else(|| missing("administrator の承認記録"))?,
            }),
            RequestStatus::Denied => {
                let reason = record
                    .denial_reason
                    .ok_or_else(|| missing("却下理由"))
                    .and_then(DenialReason::new)?;
                TrainingRequestState::Denied(DeniedState {
                    supervisor,
                    admin,
                    reason,
                })
            }
            RequestStatus::Completed => {
                TrainingRequestState::Completed(CompletedState { supervisor, admin })
            }
        };

        Ok(Self {
            id: record.id,
            requester_id: record.requester_id,
            details: record.details,
            notes: record.notes,
            review_notes: record.review_notes,
            submitted_within_30_days: record.submitted_within_30_days,
            created_at: record.created_at,
            updated_at: record.updated_at,
            state,
        })
    }

    // Getter メソッド

    pub fn id(&self) -> &TrainingRequestId {
        &self.id
    }

    pub fn requester_id(&self) -> &UserId {
        &self.requester_id
    }

    pub fn details(&self) -> &RequestDetails {
        &self.details
    }

    pub fn title(&self) -> &str {
        self.details.title()
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    /// 直近の承認者コメント
    pub fn review_notes(&self) -> Option<&str> {
        self.review_notes.as_deref()
    }

    pub fn submitted_within_30_days(&self) -> bool {
        self.submitted_within_30_days
    }

    pub fn submitted_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn state(&self) -> &TrainingRequestState {
        &self.state
    }

    pub fn status(&self) -> RequestStatus {
        match &self.state {
            TrainingRequestState::Submitted => RequestStatus::Submitted,
            TrainingRequestState::SupervisorReview(_) => RequestStatus::SupervisorReview,
            TrainingRequestState::AdminApproval(_) => RequestStatus::AdminApproval,
            TrainingRequestState::Approved(_) => RequestStatus::Approved,
            TrainingRequestState::Denied(_) => RequestStatus::Denied,
            TrainingRequestState::Completed(_) => RequestStatus::Completed,
        }
    }

    pub fn supervisor_stamp(&self) -> Option<&ApproverStamp> {
        match &self.state {
            TrainingRequestState::Submitted => None,
            TrainingRequestState::SupervisorReview(s) | TrainingRequestState::AdminApproval(s) => {
                Some(&s.supervisor)
            }
            TrainingRequestState::Approved(s) => Some(&s.supervisor),
            TrainingRequestState::Denied(s) => s.supervisor.as_ref(),
            TrainingRequestState::Completed(s) => s.supervisor.as_ref(),
        }
    }

    pub fn admin_stamp(&self) -> Option<&ApproverStamp> {
        match &self.state {
            TrainingRequestState::Approved(s) => Some(&s.admin),
            TrainingRequestState::Denied(s) => s.admin.as_ref(),
            TrainingRequestState::Completed(s) => s.admin.as_ref(),
            _ => None,
        }
    }

    pub fn denial_reason(&self) -> Option<&DenialReason> {
        match &self.state {
            TrainingRequestState::Denied(s) => Some(&s.reason),
            _ => None,
        }
    }

    // ビジネスロジックメソッド

    /// 承認者の判断を適用した新しい申請を返す
    pub fn decide(
        self,
        decision: Decision,
        approver_id: UserId,
        now: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        match decision {
            Decision::Approve { notes } => self.approved_one_step(approver_id, notes, now),
            Decision::Deny { reason } => self.denied(approver_id, reason, now),
        }
    }

    /// 1 段だけ進める
    ///
    /// supervisor 段階の 2 回はいずれも supervisor スタンプを上書きし、
    /// admin_approval からの承認で admin スタンプを付ける。
    pub fn approved_one_step(
        self,
        approver_id: UserId,
        notes: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        let stamp = ApproverStamp::new(approver_id, now);
        let state = match self.state {
            TrainingRequestState::Submitted => {
                TrainingRequestState::SupervisorReview(ReviewState { supervisor: stamp })
            }
            TrainingRequestState::SupervisorReview(_) => {
                TrainingRequestState::AdminApproval(ReviewState { supervisor: stamp })
            }
            TrainingRequestState::AdminApproval(review) => {
                TrainingRequestState::Approved(ApprovedState {
                    supervisor: review.supervisor,
                    admin:      stamp,
                })
            }
            TrainingRequestState::Approved(_)
            | TrainingRequestState::Denied(_)
            | TrainingRequestState::Completed(_) => {
                return Err(DomainError::Validation(format!(
                    "完了済みの申請は承認できません（現在: {}）",
                    self.status()
                )));
            }
        };

        Ok(Self {
            state,
            review_notes: normalize_notes(notes).or(self.review_notes),
            updated_at: now,
            ..self
        })
    }

    /// 却下する
    ///
    /// supervisor 段階では supervisor スタンプ、admin_approval では admin スタンプを付ける。
    pub fn denied(
        self,
        approver_id: UserId,
        reason: DenialReason,
        now: DateTime<Utc>,
    ) -> Result<Self, DomainError> {
        let stamp = ApproverStamp::new(approver_id, now);
        let state = match self.state {
            TrainingRequestState::Submitted | TrainingRequestState::SupervisorReview(_) => {
                TrainingRequestState::Denied(DeniedState {
                    supervisor: Some(stamp),
                    admin: None,
                    reason,
                })
            }
            TrainingRequestState::AdminApproval(review) => {
                TrainingRequestState::Denied(DeniedState {
                    supervisor: Some(review.supervisor),
                    admin: Some(stamp),
                    reason,
                })
            }
            TrainingRequestState::Approved(_)
            | TrainingRequestState::Denied(_)
            | TrainingRequestState::Completed(_) => {
                return Err(DomainError::Validation(format!(
                    "完了済みの申請は却下できません（現在: {}）",
                    self.status()
                )));
            }
        };

        Ok(Self {
            state,
            updated_at: now,
            ..self
        })
    }
}

/// 承認者が現在の段階で判断できるかを確認する
///
/// - 終端状態は誰も変更できない
/// - 申請者本人は判断できない
/// - administrator / training_coordinator はどの未完了段階でも判断できる
/// - submitted / supervisor_review は申請者の直属上長の supervisor。
///   上長未設定の申請者なら任意の supervisor
/// - admin_approval は管理系ロールのみ
pub fn authorize_decision(
    request: &TrainingRequest,
    requester: &User,
    approver: &User,
) -> Result<(), DomainError> {
    let status = request.status();
    if status.is_terminal() {
        return Err(DomainError::Validation(format!(
            "完了済みの申請は変更できません（現在: {status}）"
        )));
    }
    if approver.id() == request.requester_id() {
        return Err(DomainError::Forbidden(
            "申請者本人は承認・却下できません".to_string(),
        ));
    }
    if approver.role().is_administrative() {
        return Ok(());
    }

    if status.awaits_supervisor() && approver.role() == UserRole::Supervisor {
        let allowed = match requester.supervisor_id() {
            Some(supervisor_id) => supervisor_id == approver.id(),
            None => true,
        };
        if allowed {
            return Ok(());
        }
        return Err(DomainError::Forbidden(
            "申請者の直属の上長ではありません".to_string(),
        ));
    }

    Err(DomainError::Forbidden(format!(
        "{status} の申請を判断する権限がありません（ロール: {}）",
        approver.role()
    )))
}
