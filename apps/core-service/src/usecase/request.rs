//! # 標準研修申請ユースケース
//!
//! 申請の提出と、承認フロー
//! `submitted → supervisor_review → admin_approval → approved`（または `denied`）の進行を扱う。
//!
//! ## 処理の順序
//!
//! 1. 入力検証と権限チェック（書き込み前に失敗させる）
//! 2. ステータス条件付きの保存（他の承認者と競合したら 409）
//! 3. アプリ内通知とメール（失敗はログのみで、状態は巻き戻さない）

use std::sync::Arc;

use trainflow_domain::{
    clock::Clock,
    notification::{EmailFields, EmailTemplateKind, NotificationDraft},
    request::{
        Decision,
        NewTrainingRequest,
        RequestDetails,
        RequestStatus,
        TrainingRequest,
        TrainingRequestId,
        authorize_decision,
    },
    training::TrainingId,
    user::{User, UserId, UserRole},
};
use trainflow_infra::repository::{
    TrainingRepository,
    TrainingRequestRepository,
    UserRepository,
};
use trainflow_shared::{event_log::event, log_business_event};

use crate::{
    error::CoreError,
    usecase::{
        helpers::{FindResultExt, email_date},
        notification::{NotificationPublisher, NotificationService},
    },
};

/// 申請対象
#[derive(Debug, Clone)]
pub enum RequestSubject {
    /// カタログの研修。タイトルと日付はカタログから引く
    Catalog(TrainingId),
    /// 署内研修・外部研修
    Described(RequestDetails),
}

/// 申請提出の入力
#[derive(Debug, Clone)]
pub struct SubmitRequestInput {
    pub subject: RequestSubject,
    pub notes: Option<String>,
}

pub struct RequestUseCaseImpl {
    request_repo: Arc<dyn TrainingRequestRepository>,
    training_repo: Arc<dyn TrainingRepository>,
    user_repo: Arc<dyn UserRepository>,
    publisher: Arc<NotificationPublisher>,
    notifier: Arc<NotificationService>,
    clock: Arc<dyn Clock>,
}

impl RequestUseCaseImpl {
    pub fn new(
        request_repo: Arc<dyn TrainingRequestRepository>,
        training_repo: Arc<dyn TrainingRepository>,
        user_repo: Arc<dyn UserRepository>,
        publisher: Arc<NotificationPublisher>,
        notifier: Arc<NotificationService>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            request_repo,
            training_repo,
            user_repo,
            publisher,
            notifier,
            clock,
        }
    }

    /// 申請を提出する
    ///
    /// 申請者に "Request Submitted" を 1 件通知し、最初の承認者（直属の上長、
    /// 未設定なら全 supervisor）にメールする。
    pub async fn submit(
        &self,
        requester_id: &UserId,
        input: SubmitRequestInput,
    ) -> Result<TrainingRequest, CoreError> {
        let details = self.resolve_details(input.subject).await?;
        let requester = self.user_repo.find_by_id(requester_id).await.or_not_found("職員")?;

        let request = TrainingRequest::new(NewTrainingRequest {
            id: TrainingRequestId::new(),
            requester_id: requester.id().clone(),
            details,
            notes: input.notes,
            now: self.clock.now(),
        })?;

        self.request_repo.insert(&request).await?;

        log_business_event!(
            event.category = event::category::REQUEST,
            event.action = event::action::REQUEST_SUBMITTED,
            event.entity_type = event::entity_type::TRAINING_REQUEST,
            event.entity_id = %request.id(),
            event.actor_id = %requester.id(),
            event.result = event::result::SUCCESS,
            request.kind = %request.details().kind(),
            "研修申請を提出"
        );

        self.publish_status(&request).await;

        let fields = self.email_fields(
            &request,
            &requester,
            format!("New Training Request: {}", request.title()),
            "/approvals",
        );
        for approver in self.first_approvers(&requester).await {
            self.notifier
                .notify_user(
                    &approver,
                    EmailTemplateKind::Submission,
                    fields.clone(),
                    Some(requester.id()),
                )
                .await;
        }

        Ok(request)
    }

    /// 承認者の判断で申請を 1 段進める（または却下する）
    ///
    /// ## エラー
    ///
    /// - 申請・職員が見つからない: 404
    /// - 権限がない: 403
    /// - 終端状態: 400
    /// - 他の承認者が先に進めた: 409
    pub async fn advance(
        &self,
        id: &TrainingRequestId,
        approver_id: &UserId,
        decision: Decision,
    ) -> Result<TrainingRequest, CoreError> {
        let request = self.request_repo.find_by_id(id).await.or_not_found("申請")?;
        let approver = self.user_repo.find_by_id(approver_id).await.or_not_found("職員")?;
        let requester = self
            .user_repo
            .find_by_id(request.requester_id())
            .await
            .or_not_found("申請者")?;

        authorize_decision(&request, &requester, &approver)?;

        let expected_status = request.status();
        let updated = request.decide(decision, approver.id().clone(), self.clock.now())?;
        self.request_repo
            .update_with_status_check(&updated, expected_status)
            .await?;

        let action = match updated.status() {
            RequestStatus::Approved => event::action::REQUEST_APPROVED,
            RequestStatus::Denied => event::action::REQUEST_DENIED,
            _ => event::action::REQUEST_ADVANCED,
        };
        log_business_event!(
            event.category = event::category::REQUEST,
            event.action = action,
            event.entity_type = event::entity_type::TRAINING_REQUEST,
            event.entity_id = %updated.id(),
            event.actor_id = %approver.id(),
            event.result = event::result::SUCCESS,
            request.from_status = %expected_status,
            request.to_status = %updated.status(),
            "研修申請を判断"
        );

        self.publish_status(&updated).await;
        self.email_outcome(&updated, &requester, &approver).await;

        Ok(updated)
    }

    /// 自分の申請（新しい順）
    pub async fn list_own(&self, requester_id: &UserId) -> Result<Vec<TrainingRequest>, CoreError> {
        Ok(self.request_repo.find_by_requester(requester_id).await?)
    }

    /// 判断待ちの申請（古い順）
    ///
    /// - 管理系ロール: 未完了のすべての申請
    /// - supervisor: 直属の部下と上長未設定の職員の、supervisor 段階の申請
    pub async fn list_pending(
        &self,
        approver_id: &UserId,
        role: UserRole,
    ) -> Result<Vec<TrainingRequest>, CoreError> {
        if role.is_administrative() {
            return Ok(self
                .request_repo
                .find_by_statuses(&[
                    RequestStatus::Submitted,
                    RequestStatus::SupervisorReview,
                    RequestStatus::AdminApproval,
                ])
                .await?);
        }
        if role != UserRole::Supervisor {
            return Err(CoreError::Forbidden(
                "承認待ち一覧を参照する権限がありません".to_string(),
            ));
        }

        let requester_ids: Vec<UserId> = self
            .user_repo
            .find_all()
            .await?
            .into_iter()
            .filter(|u| u.id() != approver_id)
            .filter(|u| u.supervisor_id().is_none_or(|s| s == approver_id))
            .map(|u| u.id().clone())
            .collect();

        let mut requests = self
            .request_repo
            .find_by_requesters_and_statuses(
                &requester_ids,
                &[RequestStatus::Submitted, RequestStatus::SupervisorReview],
            )
            .await?;
        requests.sort_by_key(|r| r.created_at());
        Ok(requests)
    }

    /// 申請の詳細
    ///
    /// 申請者本人、supervisor、管理系ロールのみ参照できる。
    pub async fn get(
        &self,
        id: &TrainingRequestId,
        viewer_id: &UserId,
        role: UserRole,
    ) -> Result<TrainingRequest, CoreError> {
        let request = self.request_repo.find_by_id(id).await.or_not_found("申請")?;
        let visible = request.requester_id() == viewer_id
            || role == UserRole::Supervisor
            || role.is_administrative();
        if !visible {
            return Err(CoreError::Forbidden(
                "この申請を参照する権限がありません".to_string(),
            ));
        }
        Ok(request)
    }

    async fn resolve_details(&self, subject: RequestSubject) -> Result<RequestDetails, CoreError> {
        match subject {
            RequestSubject::Catalog(training_id) => {
                let training = self
                    .training_repo
                    .find_by_id(&training_id)
                    .await
                    .or_not_found("研修")?;
                Ok(RequestDetails::Catalog {
                    training_id: training.id,
                    title: training.title,
                    training_date: training.date,
                })
            }
            RequestSubject::Described(RequestDetails::Catalog { .. }) => Err(CoreError::BadRequest(
                "カタログ研修は training_id で指定してください".to_string(),
            )),
            RequestSubject::Described(details) => Ok(details),
        }
    }

    /// 直属の上長。未設定（または見つからない）なら全 supervisor
    async fn first_approvers(&self, requester: &User) -> Vec<User> {
        if let Some(supervisor_id) = requester.supervisor_id() {
            match self.user_repo.find_by_id(supervisor_id).await {
                Ok(Some(supervisor)) => return vec![supervisor],
                Ok(None) => {
                    tracing::warn!(
                        requester_id = %requester.id(),
                        %supervisor_id,
                        "上長が見つからないため全 supervisor に通知します"
                    );
                }
                Err(e) => {
                    tracing::error!(error = %e, "上長の取得に失敗");
                    return Vec::new();
                }
            }
        }
        self.users_with_roles(&[UserRole::Supervisor]).await
    }

    async fn users_with_roles(&self, roles: &[UserRole]) -> Vec<User> {
        match self.user_repo.find_by_roles(roles).await {
            Ok(users) => users,
            Err(e) => {
                tracing::error!(error = %e, ?roles, "通知先の取得に失敗");
                Vec::new()
            }
        }
    }

    async fn publish_status(&self, request: &TrainingRequest) {
        let reason = request.denial_reason().map(|r| r.as_str());
        if let Some(draft) = NotificationDraft::request_status(
            request.requester_id().clone(),
            request.status(),
            request.title(),
            reason,
        ) {
            self.publisher.publish(draft).await;
        }
    }

    async fn email_outcome(&self, request: &TrainingRequest, requester: &User, approver: &User) {
        let title = request.title();
        let (kind, subject) = match request.status() {
            RequestStatus::Approved => (
                EmailTemplateKind::FinalApproval,
                format!("Training Request Approved: {title}"),
            ),
            RequestStatus::Denied => (
                EmailTemplateKind::Denial,
                format!("Training Request Denied: {title}"),
            ),
            _ => (
                EmailTemplateKind::Approval,
                format!("Training Request Update: {title}"),
            ),
        };

        let mut fields = self.email_fields(request, requester, subject, "/requests");
        fields.approver_name = Some(approver.full_name());
        if let Some(reason) = request.denial_reason() {
            fields.notes = Some(reason.as_str().to_string());
        } else if let Some(review_notes) = request.review_notes() {
            fields.notes = Some(review_notes.to_string());
        }
        self.notifier
            .notify_user(requester, kind, fields.clone(), Some(approver.id()))
            .await;

        if request.status() == RequestStatus::AdminApproval {
            let admin_fields = EmailFields {
                subject: format!("Training Request Awaiting Final Approval: {title}"),
                system_link: Some(format!("{}/approvals", self.notifier.base_url())),
                ..fields
            };
            let admins = self
                .users_with_roles(&[UserRole::Administrator, UserRole::TrainingCoordinator])
                .await;
            for admin in admins.iter().filter(|a| a.id() != approver.id()) {
                self.notifier
                    .notify_user(
                        admin,
                        EmailTemplateKind::Approval,
                        admin_fields.clone(),
                        Some(approver.id()),
                    )
                    .await;
            }
        }
    }

    fn email_fields(
        &self,
        request: &TrainingRequest,
        requester: &User,
        subject: String,
        path: &str,
    ) -> EmailFields {
        EmailFields {
            subject,
            officer_name: requester.full_name(),
            training_name: request.title().to_string(),
            badge_number: Some(requester.badge_number().as_str().to_string()),
            training_type: Some(request.details().kind().to_string()),
            training_date: Some(email_date(request.details().training_date())),
            date_submitted: Some(email_date(request.submitted_at().date_naive())),
            notes: request.notes().map(str::to_string),
            system_link: Some(format!("{}{path}", self.notifier.base_url())),
            ..Default::default()
        }
    }
}
