//! # カスタム研修申請
//!
//! カタログにない研修を、階級の承認チェーン（例: Sergeant → Lieutenant → Chief）に
//! 沿って承認していく申請。
//!
//! - `current_level` は常にチェーンの有効な添字
//! - 最終段以外の承認で 1 だけ増える
//! - 最終段の承認で `approved` になり、`current_level` は最後の添字に留まる
//! - 未完了のどの段でも、理由を付けて却下できる

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum::IntoStaticStr;

use crate::{
    DomainError,
    rank::{ApprovalChain, ApprovalRank},
    request::{DenialReason, Decision, require_title},
    user::{User, UserId},
    value_objects::Money,
};

define_uuid_id! {
    /// カスタム研修申請 ID
    pub struct CustomTrainingRequestId;
}

/// カスタム申請ステータス
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, IntoStaticStr, strum::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CustomRequestStatus {
    SergeantReview,
    LieutenantReview,
    CommanderReview,
    ChiefApproval,
    Approved,
    Denied,
    /// 保存済みデータの読み込みでのみ現れる
    Completed,
}

impl std::str::FromStr for CustomRequestStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sergeant_review" => Ok(Self::SergeantReview),
            "lieutenant_review" => Ok(Self::LieutenantReview),
            "commander_review" => Ok(Self::CommanderReview),
            "chief_approval" => Ok(Self::ChiefApproval),
            "approved" => Ok(Self::Approved),
            "denied" => Ok(Self::Denied),
            "completed" => Ok(Self::Completed),
            _ => Err(DomainError::Validation(format!(
                "不正なカスタム申請ステータス: {s}"
            ))),
        }
    }
}

impl CustomRequestStatus {
    /// 階級ごとの審査中ステータス
    pub fn reviewing(rank: ApprovalRank) -> Self {
        match rank {
            ApprovalRank::Sergeant => Self::SergeantReview,
            ApprovalRank::Lieutenant => Self::LieutenantReview,
            ApprovalRank::Commander => Self::CommanderReview,
            ApprovalRank::Chief => Self::ChiefApproval,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Approved | Self::Denied | Self::Completed)
    }
}

/// 研修の対象規模
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, IntoStaticStr, strum::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TrainingType {
    Individual,
    Group,
    Department,
}

impl std::str::FromStr for TrainingType {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "individual" => Ok(Self::Individual),
            "group" => Ok(Self::Group),
            "department" => Ok(Self::Department),
            _ => Err(DomainError::Validation(format!("不正な研修種別: {s}"))),
        }
    }
}

/// 申請内容
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomRequestDetails {
    pub title: String,
    pub description: String,
    pub training_type: TrainingType,
    pub requested_date: NaiveDate,
    pub duration: String,
    pub location: String,
    pub estimated_cost: Money,
    pub justification: String,
    /// 受講対象の階級
    #[serde(default)]
    pub target_ranks: Vec<ApprovalRank>,
}

impl CustomRequestDetails {
    fn validate(&self) -> Result<(), DomainError> {
        require_title(&self.title, "研修名")?;
        for (value, label) in [
            (&self.description, "研修内容"),
            (&self.location, "実施場所"),
            (&self.justification, "受講理由"),
        ] {
            if value.trim().is_empty() {
                return Err(DomainError::Validation(format!("{label}は必須です")));
            }
        }
        self.estimated_cost.estimate("費用見積")?;
        Ok(())
    }
}

/// 各段の承認記録
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainApproval {
    pub rank: ApprovalRank,
    pub approver_id: UserId,
    pub approver_name: String,
    pub approved_at: DateTime<Utc>,
    pub notes: Option<String>,
}

/// 申請の状態
#[derive(Debug, Clone, PartialEq)]
pub enum CustomRequestState {
    InReview { level: usize },
    Approved { approved_at: DateTime<Utc> },
    Denied(ChainDenial),
    Completed,
}

/// 却下の記録
#[derive(Debug, Clone, PartialEq)]
pub struct ChainDenial {
    /// 却下された段
    pub level: usize,
    pub denied_by: UserId,
    pub denied_at: DateTime<Utc>,
    pub reason: DenialReason,
}

/// 1 回の判断の結果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainOutcome {
    /// 次の階級へ回付された
    Forwarded { next_rank: ApprovalRank },
    Approved,
    Denied,
}

/// カスタム研修申請エンティティ
#[derive(Debug, Clone, PartialEq)]
pub struct CustomTrainingRequest {
    id: CustomTrainingRequestId,
    requester_id: UserId,
    details: CustomRequestDetails,
    chain: ApprovalChain,
    approvals: Vec<ChainApproval>,
    notes: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    state: CustomRequestState,
}

pub struct NewCustomTrainingRequest {
    pub id: CustomTrainingRequestId,
    pub requester_id: UserId,
    pub details: CustomRequestDetails,
    pub chain: ApprovalChain,
    pub notes: Option<String>,
    pub now: DateTime<Utc>,
}

/// DB 復元パラメータ
pub struct CustomTrainingRequestRecord {
    pub id: CustomTrainingRequestId,
    pub requester_id: UserId,
    pub details: CustomRequestDetails,
    pub chain: ApprovalChain,
    pub current_approval_level: i32,
    pub status: CustomRequestStatus,
    pub approvals: Vec<ChainApproval>,
    pub notes: Option<String>,
    pub denied_by: Option<UserId>,
    pub denied_at: Option<DateTime<Utc>>,
    pub denial_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CustomTrainingRequest {
    /// チェーン先頭の階級の審査中として作成する
    pub fn new(params: NewCustomTrainingRequest) -> Result<Self, DomainError> {
        params.details.validate()?;
        Ok(Self {
            id: params.id,
            requester_id: params.requester_id,
            details: params.details,
            chain: params.chain,
            approvals: Vec::new(),
            notes: params
                .notes
                .map(|n| n.trim().to_string())
                .filter(|n| !n.is_empty()),
            created_at: params.now,
            updated_at: params.now,
            state: CustomRequestState::InReview { level: 0 },
        })
    }

    pub fn from_db(record: CustomTrainingRequestRecord) -> Result<Self, DomainError> {
        let level = usize::try_from(record.current_approval_level)
            .ok()
            .filter(|level| *level < record.chain.len())
            .ok_or_else(|| {
                DomainError::Validation(format!(
                    "承認段 {} はチェーン長 {} の範囲外です",
                    record.current_approval_level,
                    record.chain.len()
                ))
            })?;

        let state = match record.status {
            CustomRequestStatus::Approved => {
                if !record.chain.is_final_level(level) || record.approvals.len() != record.chain.len() {
                    return Err(DomainError::Validation(
                        "approved の申請は全段の承認記録を持ち最終段にある必要があります".to_string(),
                    ));
                }
                let approved_at = record
                    .approvals
                    .last()
                    .map(|a| a.approved_at)
                    .unwrap_or(record.updated_at);
                CustomRequestState::Approved { approved_at }
            }
            CustomRequestStatus::Denied => {
                let missing = || {
                    DomainError::Validation("denied の申請には却下者・日時・理由が必要です".to_string())
                };
                CustomRequestState::Denied(ChainDenial {
                    level,
                    denied_by: record.denied_by.ok_or_else(missing)?,
                    denied_at: record.denied_at.ok_or_else(missing)?,
                    reason: DenialReason::new(record.denial_reason.ok_or_else(missing)?)?,
                })
            }
            CustomRequestStatus::Completed => CustomRequestState::Completed,
            reviewing => {
                let expected = record
                    .chain
                    .get(level)
                    .map(CustomRequestStatus::reviewing);
                if expected != Some(reviewing) {
                    return Err(DomainError::Validation(format!(
                        "ステータス {reviewing} が承認段 {level} の階級と一致しません"
                    )));
                }
                if record.approvals.len() != level {
                    return Err(DomainError::Validation(format!(
                        "承認記録数 {} が承認段 {level} と一致しません",
                        record.approvals.len()
                    )));
                }
                CustomRequestState::InReview { level }
            }
        };

        Ok(Self {
            id: record.id,
            requester_id: record.requester_id,
            details: record.details,
            chain: record.chain,
            approvals: record.approvals,
            notes: record.notes,
            created_at: record.created_at,
            updated_at: record.updated_at,
            state,
        })
    }

    pub fn id(&self) -> &CustomTrainingRequestId {
        &self.id
    }

    pub fn requester_id(&self) -> &UserId {
        &self.requester_id
    }

    pub fn details(&self) -> &CustomRequestDetails {
        &self.details
    }

    pub fn title(&self) -> &str {
        &self.details.title
    }

    pub fn chain(&self) -> &ApprovalChain {
        &self.chain
    }

    pub fn approvals(&self) -> &[ChainApproval] {
        &self.approvals
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn state(&self) -> &CustomRequestState {
        &self.state
    }

    /// 現在の承認段（終端後も有効な添字を返す）
    pub fn current_level(&self) -> usize {
        match &self.state {
            CustomRequestState::InReview { level } => *level,
            CustomRequestState::Denied(denial) => denial.level,
            CustomRequestState::Approved { .. } | CustomRequestState::Completed => {
                self.chain.len() - 1
            }
        }
    }

    /// 審査中なら、いま判断すべき階級
    pub fn pending_rank(&self) -> Option<ApprovalRank> {
        match &self.state {
            CustomRequestState::InReview { level } => self.chain.get(*level),
            _ => None,
        }
    }

    pub fn status(&self) -> CustomRequestStatus {
        match &self.state {
            CustomRequestState::InReview { level } => self
                .chain
                .get(*level)
                .map(CustomRequestStatus::reviewing)
                .unwrap_or(CustomRequestStatus::ChiefApproval),
            CustomRequestState::Approved { .. } => CustomRequestStatus::Approved,
            CustomRequestState::Denied(_) => CustomRequestStatus::Denied,
            CustomRequestState::Completed => CustomRequestStatus::Completed,
        }
    }

    pub fn denial(&self) -> Option<&ChainDenial> {
        match &self.state {
            CustomRequestState::Denied(denial) => Some(denial),
            _ => None,
        }
    }

    /// 現在の段で判断する
    ///
    /// 最終段以外の承認は次の段へ、最終段の承認は `approved` へ進む。
    pub fn advance(
        self,
        decision: Decision,
        approver: &User,
        now: DateTime<Utc>,
    ) -> Result<(Self, ChainOutcome), DomainError> {
        let CustomRequestState::InReview { level } = self.state else {
            return Err(DomainError::Validation(format!(
                "完了済みの申請は変更できません（現在: {}）",
                self.status()
            )));
        };
        let rank = self.chain.get(level).ok_or_else(|| {
            DomainError::Validation(format!("承認段 {level} がチェーンの範囲外です"))
        })?;

        match decision {
            Decision::Approve { notes } => {
                let mut approvals = self.approvals;
                approvals.push(ChainApproval {
                    rank,
                    approver_id: approver.id().clone(),
                    approver_name: approver.full_name(),
                    approved_at: now,
                    notes: notes.map(|n| n.trim().to_string()).filter(|n| !n.is_empty()),
                });

                let (state, outcome) = if self.chain.is_final_level(level) {
                    (
                        CustomRequestState::Approved { approved_at: now },
                        ChainOutcome::Approved,
                    )
                } else {
                    let next_level = level + 1;
                    let next_rank = self.chain.get(next_level).ok_or_else(|| {
                        DomainError::Validation(format!("承認段 {next_level} がチェーンの範囲外です"))
                    })?;
                    (
                        CustomRequestState::InReview { level: next_level },
                        ChainOutcome::Forwarded { next_rank },
                    )
                };

                Ok((
                    Self {
                        approvals,
                        state,
                        updated_at: now,
                        ..self
                    },
                    outcome,
                ))
            }
            Decision::Deny { reason } => Ok((
                Self {
                    state: CustomRequestState::Denied(ChainDenial {
                        level,
                        denied_by: approver.id().clone(),
                        denied_at: now,
                        reason,
                    }),
                    updated_at: now,
                    ..self
                },
                ChainOutcome::Denied,
            )),
        }
    }
}

/// 承認者が現在の段で判断できるかを確認する
///
/// 管理系ロールはどの段でも判断できる。それ以外は現在の段の階級を持つ職員のみ。
pub fn authorize_chain_decision(
    request: &CustomTrainingRequest,
    approver: &User,
) -> Result<(), DomainError> {
    let Some(rank) = request.pending_rank() else {
        return Err(DomainError::Validation(format!(
            "完了済みの申請は変更できません（現在: {}）",
            request.status()
        )));
    };
    if approver.id() == request.requester_id() {
        return Err(DomainError::Forbidden(
            "申請者本人は承認・却下できません".to_string(),
        ));
    }
    if approver.role().is_administrative() || approver.holds_rank(rank) {
        return Ok(());
    }
    Err(DomainError::Forbidden(format!(
        "{rank} の段は {rank} の階級を持つ職員のみ判断できます"
    )))
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::{fixture, rstest};

    use super::*;
    use crate::{
        user::{BadgeNumber, Email, NewUser, UserRole},
        value_objects::PersonName,
    };

    #[fixture]
    fn now() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    fn details() -> CustomRequestDetails {
        CustomRequestDetails {
            title: "Drone Operations Certification".to_string(),
            description: "Part 107 prep course".to_string(),
            training_type: TrainingType::Group,
            requested_date: NaiveDate::from_ymd_opt(2024, 2, 1).unwrap(),
            duration: "3 days".to_string(),
            location: "Columbus, OH".to_string(),
            estimated_cost: Money::from_dollars(2_400),
            justification: "Search and rescue support".to_string(),
            target_ranks: vec![],
        }
    }

    fn chain(ranks: &[ApprovalRank]) -> ApprovalChain {
        ApprovalChain::new(ranks.iter().copied()).unwrap()
    }

    fn request_with(chain: ApprovalChain, now: DateTime<Utc>) -> CustomTrainingRequest {
        CustomTrainingRequest::new(NewCustomTrainingRequest {
            id: CustomTrainingRequestId::new(),
            requester_id: UserId::new(),
            details: details(),
            chain,
            notes: None,
            now,
        })
        .unwrap()
    }

    fn officer(rank: &str, role: UserRole) -> User {
        User::new(NewUser {
            id: UserId::new(),
            badge_number: BadgeNumber::new("3001").unwrap(),
            first_name: PersonName::new("Jordan").unwrap(),
            last_name: PersonName::new("Hale").unwrap(),
            email: Email::new("jhale@shpd.example.com").unwrap(),
            role,
            rank: rank.to_string(),
            supervisor_id: None,
            platoon: None,
            now: DateTime::from_timestamp(1_600_000_000, 0).unwrap(),
        })
        .unwrap()
    }

    fn approve() -> Decision {
        Decision::Approve { notes: None }
    }

    fn record_from(request: &CustomTrainingRequest) -> CustomTrainingRequestRecord {
        CustomTrainingRequestRecord {
            id: request.id().clone(),
            requester_id: request.requester_id().clone(),
            details: request.details().clone(),
            chain: request.chain().clone(),
            current_approval_level: request.current_level() as i32,
            status: request.status(),
            approvals: request.approvals().to_vec(),
            notes: request.notes().map(String::from),
            denied_by: request.denial().map(|d| d.denied_by.clone()),
            denied_at: request.denial().map(|d| d.denied_at),
            denial_reason: request.denial().map(|d| d.reason.as_str().to_string()),
            created_at: request.created_at(),
            updated_at: request.updated_at(),
        }
    }

    #[rstest]
    fn test_新規申請はチェーン先頭の審査中になる(now: DateTime<Utc>) {
        let sut = request_with(chain(&[ApprovalRank::Lieutenant, ApprovalRank::Chief]), now);

        assert_eq!(sut.status(), CustomRequestStatus::LieutenantReview);
        assert_eq!(sut.current_level(), 0);
        assert_eq!(sut.pending_rank(), Some(ApprovalRank::Lieutenant));
    }

    #[rstest]
    fn test_チェーンを1段ずつ進み最終段で承認される(now: DateTime<Utc>) {
        let request = request_with(
            chain(&[ApprovalRank::Sergeant, ApprovalRank::Lieutenant, ApprovalRank::Chief]),
            now,
        );
        let approver = officer("Chief", UserRole::Administrator);

        let (r1, o1) = request.advance(approve(), &approver, now).unwrap();
        assert_eq!(o1, ChainOutcome::Forwarded { next_rank: ApprovalRank::Lieutenant });
        assert_eq!(r1.current_level(), 1);
        assert_eq!(r1.status(), CustomRequestStatus::LieutenantReview);

        let (r2, o2) = r1.advance(approve(), &approver, now).unwrap();
        assert_eq!(o2, ChainOutcome::Forwarded { next_rank: ApprovalRank::Chief });
        assert_eq!(r2.current_level(), 2);

        let (r3, o3) = r2.advance(approve(), &approver, now).unwrap();
        assert_eq!(o3, ChainOutcome::Approved);
        assert_eq!(r3.status(), CustomRequestStatus::Approved);
        assert_eq!(r3.current_level(), 2, "最終承認後も最後の添字に留まる");
        assert_eq!(r3.approvals().len(), 3);
        assert_eq!(r3.approvals()[0].rank, ApprovalRank::Sergeant);
        assert_eq!(r3.approvals()[0].approver_name, "Jordan Hale");
    }

    #[rstest]
    fn test_1段のチェーンは最初の承認で承認される(now: DateTime<Utc>) {
        let request = request_with(chain(&[ApprovalRank::Commander]), now);

        let (sut, outcome) = request
            .advance(approve(), &officer("Commander", UserRole::Supervisor), now)
            .unwrap();

        assert_eq!(outcome, ChainOutcome::Approved);
        assert_eq!(sut.current_level(), 0);
    }

    #[rstest]
    fn test_承認段は単調増加しチェーン長未満に留まる(now: DateTime<Utc>) {
        let mut request = request_with(
            chain(&[
                ApprovalRank::Sergeant,
                ApprovalRank::Lieutenant,
                ApprovalRank::Commander,
                ApprovalRank::Chief,
            ]),
            now,
        );
        let approver = officer("Chief", UserRole::Administrator);
        let mut previous = request.current_level();

        while !request.status().is_terminal() {
            request = request.advance(approve(), &approver, now).unwrap().0;
            assert!(request.current_level() >= previous);
            assert!(request.current_level() < request.chain().len());
            previous = request.current_level();
        }
        assert_eq!(request.status(), CustomRequestStatus::Approved);
    }

    #[rstest]
    fn test_却下すると理由と段が記録される(now: DateTime<Utc>) {
        let request = request_with(chain(&[ApprovalRank::Sergeant, ApprovalRank::Chief]), now);
        let sergeant = officer("Sergeant", UserRole::Supervisor);

        let (sut, outcome) = request
            .advance(
                Decision::Deny {
                    reason: DenialReason::new("Out of scope for the unit").unwrap(),
                },
                &sergeant,
                now,
            )
            .unwrap();

        assert_eq!(outcome, ChainOutcome::Denied);
        let denial = sut.denial().unwrap();
        assert_eq!(denial.level, 0);
        assert_eq!(&denial.denied_by, sergeant.id());
        assert_eq!(denial.reason.as_str(), "Out of scope for the unit");
    }

    #[rstest]
    fn test_終端状態では判断できない(now: DateTime<Utc>) {
        let approver = officer("Chief", UserRole::Administrator);
        let (approved, _) = request_with(chain(&[ApprovalRank::Chief]), now)
            .advance(approve(), &approver, now)
            .unwrap();

        assert!(approved.clone().advance(approve(), &approver, now).is_err());
        assert!(matches!(
            authorize_chain_decision(&approved, &approver),
            Err(DomainError::Validation(_))
        ));
    }

    #[rstest]
    #[case("Sergeant", UserRole::Supervisor, true)]
    #[case("Sgt.", UserRole::Supervisor, true)]
    #[case("Lieutenant", UserRole::Supervisor, false)]
    #[case("Officer", UserRole::Administrator, true)]
    #[case("Officer", UserRole::TrainingCoordinator, true)]
    #[case("Officer", UserRole::Officer, false)]
    fn test_現在の段の階級か管理系ロールのみ判断できる(
        now: DateTime<Utc>,
        #[case] rank: &str,
        #[case] role: UserRole,
        #[case] allowed: bool,
    ) {
        let request = request_with(chain(&[ApprovalRank::Sergeant, ApprovalRank::Chief]), now);

        assert_eq!(
            authorize_chain_decision(&request, &officer(rank, role)).is_ok(),
            allowed
        );
    }

    #[rstest]
    fn test_申請者本人は判断できない(now: DateTime<Utc>) {
        let me = officer("Sergeant", UserRole::Supervisor);
        let request = CustomTrainingRequest {
            requester_id: me.id().clone(),
            ..request_with(chain(&[ApprovalRank::Sergeant]), now)
        };

        assert!(matches!(
            authorize_chain_decision(&request, &me),
            Err(DomainError::Forbidden(_))
        ));
    }

    #[rstest]
    fn test_必須項目が空ならエラー(now: DateTime<Utc>) {
        let result = CustomTrainingRequest::new(NewCustomTrainingRequest {
            id: CustomTrainingRequestId::new(),
            requester_id: UserId::new(),
            details: CustomRequestDetails {
                justification: "  ".to_string(),
                ..details()
            },
            chain: chain(&[ApprovalRank::Sergeant]),
            notes: None,
            now,
        });

        assert!(matches!(result, Err(DomainError::Validation(_))));
    }

    #[rstest]
    fn test_研修名が200文字を超えるとエラー(now: DateTime<Utc>) {
        let new = |title: String| {
            CustomTrainingRequest::new(NewCustomTrainingRequest {
                id: CustomTrainingRequestId::new(),
                requester_id: UserId::new(),
                details: CustomRequestDetails {
                    title,
                    ..details()
                },
                chain: chain(&[ApprovalRank::Sergeant]),
                notes: None,
                now,
            })
        };

        assert!(new("😀".repeat(200)).is_ok());
        assert!(matches!(new("😀".repeat(201)), Err(DomainError::Validation(_))));
    }

    mod from_db {
        use super::*;
        use pretty_assertions::assert_eq;

        #[rstest]
        fn test_遷移後の申請はレコード経由で同一に復元される(now: DateTime<Utc>) {
            let approver = officer("Chief", UserRole::Administrator);
            let (request, _) = request_with(
                chain(&[ApprovalRank::Sergeant, ApprovalRank::Lieutenant]),
                now,
            )
            .advance(approve(), &approver, now)
            .unwrap();

            let restored = CustomTrainingRequest::from_db(record_from(&request)).unwrap();

            assert_eq!(restored, request);
        }

        #[rstest]
        #[case(-1)]
        #[case(2)]
        fn test_範囲外の承認段はエラー(now: DateTime<Utc>, #[case] level: i32) {
            let request = request_with(chain(&[ApprovalRank::Sergeant, ApprovalRank::Chief]), now);

            let result = CustomTrainingRequest::from_db(CustomTrainingRequestRecord {
                current_approval_level: level,
                ..record_from(&request)
            });

            assert!(result.is_err());
        }

        #[rstest]
        fn test_ステータスと段の階級が食い違うとエラー(now: DateTime<Utc>) {
            let request = request_with(chain(&[ApprovalRank::Sergeant, ApprovalRank::Chief]), now);

            let result = CustomTrainingRequest::from_db(CustomTrainingRequestRecord {
                status: CustomRequestStatus::ChiefApproval,
                ..record_from(&request)
            });

            assert!(result.is_err());
        }

        #[rstest]
        fn test_deniedで却下理由欠損はエラー(now: DateTime<Utc>) {
            let request = request_with(chain(&[ApprovalRank::Sergeant]), now);

            let result = CustomTrainingRequest::from_db(CustomTrainingRequestRecord {
                status: CustomRequestStatus::Denied,
                denied_by: Some(UserId::new()),
                denied_at: Some(now),
                denial_reason: None,
                ..record_from(&request)
            });

            assert!(result.is_err());
        }
    }
}
