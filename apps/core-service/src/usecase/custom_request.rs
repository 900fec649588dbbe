//! # カスタム研修申請ユースケース
//!
//! 申請者が指定した階級チェーン（Sergeant → Lieutenant → Commander → Chief の部分列）を
//! 1 段ずつたどる。次の段へ回付したら、その階級を持つ全職員にメールする。

use std::sync::Arc;

use trainflow_domain::{
    clock::Clock,
    custom_request::{
        ChainOutcome,
        CustomRequestDetails,
        CustomRequestStatus,
        CustomTrainingRequest,
        CustomTrainingRequestId,
        NewCustomTrainingRequest,
        authorize_chain_decision,
    },
    notification::{EmailFields, EmailTemplateKind, NotificationDraft, NotificationKind},
    rank::{ApprovalChain, ApprovalRank},
    request::{Decision, RequestStatus},
    user::{User, UserId},
};
use trainflow_infra::repository::{CustomTrainingRequestRepository, UserRepository};
use trainflow_shared::{
    event_log::{error, event},
    log_business_event,
};

use crate::{
    error::CoreError,
    usecase::{
        helpers::{FindResultExt, email_date},
        notification::{NotificationPublisher, NotificationService},
    },
};

const CUSTOM_REQUESTS_LINK: &str = "/custom-requests";

/// 審査中のステータス
const IN_REVIEW: [CustomRequestStatus; 4] = [
    CustomRequestStatus::SergeantReview,
    CustomRequestStatus::LieutenantReview,
    CustomRequestStatus::CommanderReview,
    CustomRequestStatus::ChiefApproval,
];

#[derive(Debug, Clone)]
pub struct SubmitCustomRequestInput {
    pub details: CustomRequestDetails,
    pub chain: Vec<ApprovalRank>,
    pub notes: Option<String>,
}

pub struct CustomRequestUseCaseImpl {
    request_repo: Arc<dyn CustomTrainingRequestRepository>,
    user_repo: Arc<dyn UserRepository>,
    publisher: Arc<NotificationPublisher>,
    notifier: Arc<NotificationService>,
    clock: Arc<dyn Clock>,
}

impl CustomRequestUseCaseImpl {
    pub fn new(
        request_repo: Arc<dyn CustomTrainingRequestRepository>,
        user_repo: Arc<dyn UserRepository>,
        publisher: Arc<NotificationPublisher>,
        notifier: Arc<NotificationService>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            request_repo,
            user_repo,
            publisher,
            notifier,
            clock,
        }
    }

    /// 申請を提出し、チェーン先頭の階級を持つ全職員にメールする
    pub async fn submit(
        &self,
        requester_id: &UserId,
        input: SubmitCustomRequestInput,
    ) -> Result<CustomTrainingRequest, CoreError> {
        let chain = ApprovalChain::new(input.chain)?;
        let requester = self.user_repo.find_by_id(requester_id).await.or_not_found("職員")?;

        let request = CustomTrainingRequest::new(NewCustomTrainingRequest {
            id: CustomTrainingRequestId::new(),
            requester_id: requester.id().clone(),
            details: input.details,
            chain,
            notes: input.notes,
            now: self.clock.now(),
        })?;

        self.request_repo.insert(&request).await?;

        log_business_event!(
            event.category = event::category::CUSTOM_REQUEST,
            event.action = event::action::CUSTOM_REQUEST_SUBMITTED,
            event.entity_type = event::entity_type::CUSTOM_TRAINING_REQUEST,
            event.entity_id = %request.id(),
            event.actor_id = %requester.id(),
            event.result = event::result::SUCCESS,
            custom_request.chain_length = request.chain().len(),
            "カスタム研修申請を提出"
        );

        self.publisher
            .publish(
                NotificationDraft::new(
                    requester.id().clone(),
                    "Request Submitted",
                    format!("Your request for \"{}\" has been submitted.", request.title()),
                    NotificationKind::Success,
                )
                .with_link(CUSTOM_REQUESTS_LINK),
            )
            .await;

        let first_rank = request.chain().first();
        let fields = self.email_fields(
            &request,
            &requester,
            format!("New Custom Training Request: {}", request.title()),
        );
        self.email_rank(&request, first_rank, EmailTemplateKind::Submission, fields, requester.id())
            .await;

        Ok(request)
    }

    /// 現在の段で判断する
    pub async fn advance(
        &self,
        id: &CustomTrainingRequestId,
        approver_id: &UserId,
        decision: Decision,
    ) -> Result<CustomTrainingRequest, CoreError> {
        let request = self.request_repo.find_by_id(id).await.or_not_found("カスタム申請")?;
        let approver = self.user_repo.find_by_id(approver_id).await.or_not_found("職員")?;

        authorize_chain_decision(&request, &approver)?;

        let expected_status = request.status();
        let expected_level = request.current_level();
        let (updated, outcome) = request.advance(decision, &approver, self.clock.now())?;
        self.request_repo
            .update_with_status_check(&updated, expected_status, expected_level)
            .await?;

        let action = match outcome {
            ChainOutcome::Forwarded { .. } => event::action::CUSTOM_REQUEST_FORWARDED,
            ChainOutcome::Approved => event::action::CUSTOM_REQUEST_APPROVED,
            ChainOutcome::Denied => event::action::CUSTOM_REQUEST_DENIED,
        };
        log_business_event!(
            event.category = event::category::CUSTOM_REQUEST,
            event.action = action,
            event.entity_type = event::entity_type::CUSTOM_TRAINING_REQUEST,
            event.entity_id = %updated.id(),
            event.actor_id = %approver.id(),
            event.result = event::result::SUCCESS,
            custom_request.from_status = %expected_status,
            custom_request.to_status = %updated.status(),
            custom_request.level = updated.current_level(),
            "カスタム研修申請を判断"
        );

        let requester = match self.user_repo.find_by_id(updated.requester_id()).await {
            Ok(requester) => requester,
            Err(e) => {
                tracing::error!(
                    error.category = error::category::INFRASTRUCTURE,
                    error.kind = error::kind::USER_LOOKUP,
                    error = %e,
                    request_id = %updated.id(),
                    "申請者の取得に失敗"
                );
                None
            }
        };

        self.publish_outcome(&updated, outcome).await;
        if let Some(requester) = requester {
            self.email_outcome(&updated, outcome, &requester, &approver).await;
        }

        Ok(updated)
    }

    /// 自分の申請
    pub async fn list_own(
        &self,
        requester_id: &UserId,
    ) -> Result<Vec<CustomTrainingRequest>, CoreError> {
        Ok(self.request_repo.find_by_requester(requester_id).await?)
    }

    /// この職員が今判断できる申請（古い順）
    pub async fn list_pending(
        &self,
        approver_id: &UserId,
    ) -> Result<Vec<CustomTrainingRequest>, CoreError> {
        let approver = self.user_repo.find_by_id(approver_id).await.or_not_found("職員")?;
        let requests = self.request_repo.find_by_statuses(&IN_REVIEW).await?;
        Ok(requests
            .into_iter()
            .filter(|r| authorize_chain_decision(r, &approver).is_ok())
            .collect())
    }

    /// 申請の詳細
    ///
    /// 申請者本人、管理系ロール、チェーン上の階級を持つ職員が参照できる。
    pub async fn get(
        &self,
        id: &CustomTrainingRequestId,
        viewer_id: &UserId,
    ) -> Result<CustomTrainingRequest, CoreError> {
        let request = self.request_repo.find_by_id(id).await.or_not_found("カスタム申請")?;
        if request.requester_id() == viewer_id {
            return Ok(request);
        }
        let viewer = self.user_repo.find_by_id(viewer_id).await.or_not_found("職員")?;
        let in_chain = request.chain().ranks().iter().any(|rank| viewer.holds_rank(*rank));
        if viewer.role().is_administrative() || in_chain {
            return Ok(request);
        }
        Err(CoreError::Forbidden(
            "この申請を参照する権限がありません".to_string(),
        ))
    }

    async fn publish_outcome(&self, request: &CustomTrainingRequest, outcome: ChainOutcome) {
        let requester_id = request.requester_id().clone();
        let draft = match outcome {
            ChainOutcome::Forwarded { next_rank } => Some(
                NotificationDraft::custom_request_forwarded(requester_id, request.title(), next_rank),
            ),
            ChainOutcome::Approved => NotificationDraft::request_status(
                requester_id,
                RequestStatus::Approved,
                request.title(),
                None,
            ),
            ChainOutcome::Denied => NotificationDraft::request_status(
                requester_id,
                RequestStatus::Denied,
                request.title(),
                request.denial().map(|d| d.reason.as_str()),
            ),
        };
        if let Some(draft) = draft {
            self.publisher.publish(draft.with_link(CUSTOM_REQUESTS_LINK)).await;
        }
    }

    async fn email_outcome(
        &self,
        request: &CustomTrainingRequest,
        outcome: ChainOutcome,
        requester: &User,
        approver: &User,
    ) {
        let title = request.title();
        let (kind, subject) = match outcome {
            ChainOutcome::Forwarded { .. } => (
                EmailTemplateKind::Approval,
                format!("Custom Training Request Update: {title}"),
            ),
            ChainOutcome::Approved => (
                EmailTemplateKind::FinalApproval,
                format!("Custom Training Request Approved: {title}"),
            ),
            ChainOutcome::Denied => (
                EmailTemplateKind::Denial,
                format!("Custom Training Request Denied: {title}"),
            ),
        };

        let mut fields = self.email_fields(request, requester, subject);
        fields.approver_name = Some(approver.full_name());
        if let Some(denial) = request.denial() {
            fields.notes = Some(denial.reason.as_str().to_string());
        }
        self.notifier
            .notify_user(requester, kind, fields.clone(), Some(approver.id()))
            .await;

        if let ChainOutcome::Forwarded { next_rank } = outcome {
            let reviewer_fields = EmailFields {
                subject: format!("Custom Training Request Awaiting {next_rank} Review: {title}"),
                ..fields
            };
            self.email_rank(
                request,
                next_rank,
                EmailTemplateKind::Submission,
                reviewer_fields,
                approver.id(),
            )
            .await;
        }
    }

    /// 指定階級を持つ全職員にメールする
    async fn email_rank(
        &self,
        request: &CustomTrainingRequest,
        rank: ApprovalRank,
        kind: EmailTemplateKind,
        fields: EmailFields,
        sent_by: &UserId,
    ) {
        let users = match self.user_repo.find_all().await {
            Ok(users) => users,
            Err(e) => {
                tracing::error!(
                    error.category = error::category::INFRASTRUCTURE,
                    error.kind = error::kind::RANK_LOOKUP,
                    error = %e,
                    request_id = %request.id(),
                    %rank,
                    "階級の職員の取得に失敗"
                );
                return;
            }
        };
        let reviewers: Vec<User> = users
            .into_iter()
            .filter(|u| u.holds_rank(rank) && u.id() != request.requester_id())
            .collect();

        if reviewers.is_empty() {
            tracing::warn!(
                error.kind = error::kind::RANK_LOOKUP,
                request_id = %request.id(),
                %rank,
                "該当する階級の職員がいません"
            );
            return;
        }
        for reviewer in &reviewers {
            self.notifier
                .notify_user(reviewer, kind, fields.clone(), Some(sent_by))
                .await;
        }
    }

    fn email_fields(
        &self,
        request: &CustomTrainingRequest,
        requester: &User,
        subject: String,
    ) -> EmailFields {
        let details = request.details();
        EmailFields {
            subject,
            officer_name: requester.full_name(),
            training_name: details.title.clone(),
            badge_number: Some(requester.badge_number().as_str().to_string()),
            training_type: Some(details.training_type.to_string()),
            training_date: Some(email_date(details.requested_date)),
            date_submitted: Some(email_date(request.created_at().date_naive())),
            notes: request.notes().map(str::to_string),
            system_link: Some(format!("{}{CUSTOM_REQUESTS_LINK}", self.notifier.base_url())),
            ..Default::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;
    use trainflow_domain::{
        custom_request::TrainingType,
        request::DenialReason,
        value_objects::Money,
    };

    use super::*;
    use crate::test_utils::TestFixture;

    fn details() -> CustomRequestDetails {
        CustomRequestDetails {
            title: "Advanced Interview Techniques".to_string(),
            description: "Reid technique refresher".to_string(),
            training_type: TrainingType::Individual,
            requested_date: NaiveDate::from_ymd_opt(2026, 12, 8).unwrap(),
            duration: "3 days".to_string(),
            location: "Columbus, OH".to_string(),
            estimated_cost: Money::from_dollars(895),
            justification: "Detective bureau assignment".to_string(),
            target_ranks: vec![],
        }
    }

    fn input(chain: Vec<ApprovalRank>) -> SubmitCustomRequestInput {
        SubmitCustomRequestInput {
            details: details(),
            chain,
            notes: None,
        }
    }

    fn approve() -> Decision {
        Decision::Approve { notes: None }
    }

    #[tokio::test]
    async fn test_提出すると先頭階級の全職員にメールが届く() {
        let fx = TestFixture::new();
        let officer = fx.officer(None);
        let sergeant = fx.ranked("Patrol Sergeant");
        let sgt = fx.ranked("Sgt.");
        let lieutenant = fx.ranked("Lieutenant");

        let request = fx
            .custom_request_usecase()
            .submit(
                officer.id(),
                input(vec![ApprovalRank::Lieutenant, ApprovalRank::Sergeant]),
            )
            .await
            .unwrap();

        assert_eq!(request.status(), CustomRequestStatus::SergeantReview);
        assert_eq!(request.current_level(), 0);
        assert_eq!(fx.emails_to(&sergeant).len(), 1);
        assert_eq!(fx.emails_to(&sgt).len(), 1);
        assert!(fx.emails_to(&lieutenant).is_empty());

        let notifications = fx.notifications_for(&officer);
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].title(), "Request Submitted");
    }

    #[tokio::test]
    async fn test_空のチェーンは400で何も書き込まない() {
        let fx = TestFixture::new();
        let officer = fx.officer(None);

        let result = fx.custom_request_usecase().submit(officer.id(), input(vec![])).await;

        assert!(matches!(result, Err(CoreError::BadRequest(_))));
        assert!(fx.custom_requests.requests().is_empty());
        assert!(fx.notifications.notifications().is_empty());
    }

    #[tokio::test]
    async fn test_非最終段の承認で次の階級へ回付される() {
        let fx = TestFixture::new();
        let officer = fx.officer(None);
        let sergeant = fx.ranked("Sergeant");
        let lieutenant = fx.ranked("Lieutenant");
        let sut = fx.custom_request_usecase();
        let request = sut
            .submit(
                officer.id(),
                input(vec![ApprovalRank::Sergeant, ApprovalRank::Lieutenant]),
            )
            .await
            .unwrap();

        let forwarded = sut.advance(request.id(), sergeant.id(), approve()).await.unwrap();

        assert_eq!(forwarded.status(), CustomRequestStatus::LieutenantReview);
        assert_eq!(forwarded.current_level(), 1);
        assert_eq!(forwarded.approvals().len(), 1);
        assert_eq!(forwarded.approvals()[0].rank, ApprovalRank::Sergeant);

        let last = fx.notifications_for(&officer).pop().unwrap();
        assert_eq!(last.title(), "Request Forwarded");
        assert!(last.message().contains("Lieutenant"));

        let emails = fx.emails_to(&lieutenant);
        assert_eq!(emails.len(), 1);
        assert_eq!(
            emails[0].subject,
            "Custom Training Request Awaiting Lieutenant Review: Advanced Interview Techniques"
        );
    }

    #[tokio::test]
    async fn test_最終段の承認でapprovedになり段は最後のまま() {
        let fx = TestFixture::new();
        let officer = fx.officer(None);
        let sergeant = fx.ranked("Sergeant");
        let chief = fx.ranked("Chief of Police");
        let sut = fx.custom_request_usecase();
        let request = sut
            .submit(officer.id(), input(vec![ApprovalRank::Sergeant, ApprovalRank::Chief]))
            .await
            .unwrap();

        sut.advance(request.id(), sergeant.id(), approve()).await.unwrap();
        let approved = sut.advance(request.id(), chief.id(), approve()).await.unwrap();

        assert_eq!(approved.status(), CustomRequestStatus::Approved);
        assert_eq!(approved.current_level(), 1);
        assert_eq!(fx.notifications_for(&officer).pop().unwrap().title(), "Request Approved");
    }

    #[tokio::test]
    async fn test_現在の段の階級を持たない職員は403() {
        let fx = TestFixture::new();
        let officer = fx.officer(None);
        let lieutenant = fx.ranked("Lieutenant");
        let sut = fx.custom_request_usecase();
        let request = sut
            .submit(officer.id(), input(vec![ApprovalRank::Sergeant]))
            .await
            .unwrap();

        let result = sut.advance(request.id(), lieutenant.id(), approve()).await;

        assert!(matches!(result, Err(CoreError::Forbidden(_))));
        assert_eq!(
            fx.custom_requests.requests()[0].status(),
            CustomRequestStatus::SergeantReview
        );
    }

    #[tokio::test]
    async fn test_管理系ロールはどの段でも判断できる() {
        let fx = TestFixture::new();
        let officer = fx.officer(None);
        let admin = fx.administrator();
        let sut = fx.custom_request_usecase();
        let request = sut
            .submit(
                officer.id(),
                input(vec![ApprovalRank::Sergeant, ApprovalRank::Commander]),
            )
            .await
            .unwrap();

        let forwarded = sut.advance(request.id(), admin.id(), approve()).await.unwrap();

        assert_eq!(forwarded.status(), CustomRequestStatus::CommanderReview);
    }

    #[tokio::test]
    async fn test_却下で理由が記録され通知に含まれる() {
        let fx = TestFixture::new();
        let officer = fx.officer(None);
        let sergeant = fx.ranked("Sergeant");
        let sut = fx.custom_request_usecase();
        let request = sut
            .submit(officer.id(), input(vec![ApprovalRank::Sergeant]))
            .await
            .unwrap();

        let denied = sut
            .advance(
                request.id(),
                sergeant.id(),
                Decision::Deny {
                    reason: DenialReason::new("Not budgeted this quarter").unwrap(),
                },
            )
            .await
            .unwrap();

        assert_eq!(denied.status(), CustomRequestStatus::Denied);
        assert_eq!(denied.denial().unwrap().reason.as_str(), "Not budgeted this quarter");
        let last = fx.notifications_for(&officer).pop().unwrap();
        assert_eq!(last.title(), "Request Denied");
        assert!(last.message().contains("Not budgeted this quarter"));
        assert_eq!(last.link(), Some("/custom-requests"));
    }

    #[tokio::test]
    async fn test_該当階級の職員がいなくても回付は成功する() {
        let fx = TestFixture::new();
        let officer = fx.officer(None);
        let sergeant = fx.ranked("Sergeant");
        let sut = fx.custom_request_usecase();
        let request = sut
            .submit(
                officer.id(),
                input(vec![ApprovalRank::Sergeant, ApprovalRank::Commander]),
            )
            .await
            .unwrap();

        let forwarded = sut.advance(request.id(), sergeant.id(), approve()).await.unwrap();

        assert_eq!(forwarded.status(), CustomRequestStatus::CommanderReview);
    }

    #[tokio::test]
    async fn test_承認待ち一覧は自分の階級の段の申請だけ() {
        let fx = TestFixture::new();
        let officer = fx.officer(None);
        let sergeant = fx.ranked("Sergeant");
        let sut = fx.custom_request_usecase();
        sut.submit(officer.id(), input(vec![ApprovalRank::Sergeant]))
            .await
            .unwrap();
        sut.submit(officer.id(), input(vec![ApprovalRank::Lieutenant]))
            .await
            .unwrap();

        let pending = sut.list_pending(sergeant.id()).await.unwrap();

        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].pending_rank(), Some(ApprovalRank::Sergeant));
    }

    #[tokio::test]
    async fn test_チェーン外の一般職員は詳細を参照できない() {
        let fx = TestFixture::new();
        let officer = fx.officer(None);
        let other = fx.officer(None);
        let sut = fx.custom_request_usecase();
        let request = sut
            .submit(officer.id(), input(vec![ApprovalRank::Sergeant]))
            .await
            .unwrap();

        let result = sut.get(request.id(), other.id()).await;

        assert!(matches!(result, Err(CoreError::Forbidden(_))));
    }
}
