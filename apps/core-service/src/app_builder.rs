//! # アプリケーション構築
//!
//! DI（リポジトリ → ユースケース → State）の初期化とルーター構築を担当する。
//! `main.rs` はインフラ初期化とサーバー起動に集中する。

use std::sync::Arc;

use axum::{
    Router,
    middleware::from_fn_with_state,
    routing::{get, post},
};
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use trainflow_domain::{clock::Clock, notification::NotificationError};
use trainflow_infra::{
    NotificationSender,
    PasswordChecker,
    SessionManager,
    repository::{
        BudgetRepository,
        CertificateRepository,
        CostRepository,
        CustomTrainingRequestRepository,
        DocumentRepository,
        EmailLogRepository,
        EmailPreferencesRepository,
        InvoiceRepository,
        NotificationRepository,
        PaymentBatchRepository,
        TrainingRepository,
        TrainingRequestRepository,
        UserRepository,
    },
};
use trainflow_shared::{canonical_log::CanonicalLogLineLayer, observability::make_request_span};

use crate::{
    handler::{
        AccountingState,
        AuthState,
        CertificateState,
        CustomRequestState,
        DocumentState,
        EmailState,
        JobState,
        NotificationState,
        ReadinessState,
        RequestState,
        TrainingState,
        UserState,
        approve_custom_request,
        approve_request,
        budget_status,
        change_invoice_status,
        change_payment_batch_status,
        change_payment_status,
        cost_summary,
        create_invoice,
        create_payment_batch,
        create_user,
        deny_custom_request,
        deny_request,
        get_budget,
        get_custom_request,
        get_preferences,
        get_request,
        get_training,
        get_user,
        health_check,
        issue_certificate,
        list_certificates,
        list_costs,
        list_custom_requests,
        list_documents,
        list_invoices,
        list_notifications,
        list_payment_batches,
        list_requests,
        list_trainings,
        list_users,
        login,
        logout,
        mark_all_read,
        mark_read,
        me,
        readiness_check,
        record_cost,
        revoke_certificate,
        run_notification_jobs,
        send_email,
        send_mass_email,
        set_budget,
        submit_custom_request,
        submit_request,
        unread_count,
        update_preferences,
        update_profile,
        upload_document,
        verify_document,
    },
    middleware::{SessionState, require_session},
    usecase::{
        AccountingUseCaseImpl,
        AuthUseCaseImpl,
        CertificateUseCaseImpl,
        CustomRequestUseCaseImpl,
        DocumentUseCaseImpl,
        EmailUseCaseImpl,
        NotificationGenerator,
        RequestUseCaseImpl,
        TrainingUseCaseImpl,
        UserUseCaseImpl,
        notification::{
            NotificationInboxUseCaseImpl,
            NotificationMirror,
            NotificationPublisher,
            NotificationService,
            TemplateRenderer,
        },
    },
};

/// インフラ初期化済みの依存一式
///
/// 本番は PostgreSQL / Redis 実装、テストはモックを詰める。
#[derive(Clone)]
pub struct AppDependencies {
    pub users:            Arc<dyn UserRepository>,
    pub trainings:        Arc<dyn TrainingRepository>,
    pub requests:         Arc<dyn TrainingRequestRepository>,
    pub custom_requests:  Arc<dyn CustomTrainingRequestRepository>,
    pub notifications:    Arc<dyn NotificationRepository>,
    pub preferences:      Arc<dyn EmailPreferencesRepository>,
    pub email_logs:       Arc<dyn EmailLogRepository>,
    pub certificates:     Arc<dyn CertificateRepository>,
    pub documents:        Arc<dyn DocumentRepository>,
    pub costs:            Arc<dyn CostRepository>,
    pub budgets:          Arc<dyn BudgetRepository>,
    pub invoices:         Arc<dyn InvoiceRepository>,
    pub payment_batches:  Arc<dyn PaymentBatchRepository>,
    pub sender:           Arc<dyn NotificationSender>,
    pub session_manager:  Arc<dyn SessionManager>,
    pub password_checker: Arc<dyn PasswordChecker>,
    pub mirror:           Arc<NotificationMirror>,
    pub clock:            Arc<dyn Clock>,
    /// メール内リンクの起点
    pub base_url:         String,
}

impl AppDependencies {
    pub fn publisher(&self) -> Arc<NotificationPublisher> {
        Arc::new(NotificationPublisher::new(
            self.notifications.clone(),
            self.clock.clone(),
        ))
    }

    pub fn notifier(&self) -> Result<Arc<NotificationService>, NotificationError> {
        Ok(Arc::new(NotificationService::new(
            self.sender.clone(),
            TemplateRenderer::new()?,
            self.email_logs.clone(),
            self.preferences.clone(),
            self.clock.clone(),
            self.base_url.clone(),
        )))
    }

    /// ルーターと定期実行タスクで共有する
    pub fn generator(&self) -> Result<Arc<NotificationGenerator>, NotificationError> {
        Ok(Arc::new(NotificationGenerator::new(
            self.users.clone(),
            self.requests.clone(),
            self.notifications.clone(),
            self.certificates.clone(),
            self.costs.clone(),
            self.budgets.clone(),
            self.email_logs.clone(),
            self.publisher(),
            self.notifier()?,
            self.clock.clone(),
        )))
    }
}

/// ルーターを組み立てる
///
/// `/health` 系とログイン以外の `/api` ルートはセッション必須。
pub fn build_app(
    deps: &AppDependencies,
    readiness_state: Arc<ReadinessState>,
) -> Result<Router, NotificationError> {
    let publisher = deps.publisher();
    let notifier = deps.notifier()?;

    let inbox = Arc::new(NotificationInboxUseCaseImpl::new(
        deps.notifications.clone(),
        deps.mirror.clone(),
    ));

    let session_state = SessionState {
        session_manager: deps.session_manager.clone(),
        clock:           deps.clock.clone(),
    };

    let auth_state = Arc::new(AuthState {
        usecase: AuthUseCaseImpl::new(
            deps.users.clone(),
            deps.password_checker.clone(),
            deps.session_manager.clone(),
            inbox.clone(),
            deps.clock.clone(),
        ),
    });
    let user_state = Arc::new(UserState {
        usecase: UserUseCaseImpl::new(
            deps.users.clone(),
            deps.password_checker.clone(),
            deps.clock.clone(),
        ),
    });
    let training_state = Arc::new(TrainingState {
        usecase: TrainingUseCaseImpl::new(deps.trainings.clone()),
    });
    let request_state = Arc::new(RequestState {
        usecase: RequestUseCaseImpl::new(
            deps.requests.clone(),
            deps.trainings.clone(),
            deps.users.clone(),
            publisher.clone(),
            notifier.clone(),
            deps.clock.clone(),
        ),
    });
    let custom_request_state = Arc::new(CustomRequestState {
        usecase: CustomRequestUseCaseImpl::new(
            deps.custom_requests.clone(),
            deps.users.clone(),
            publisher.clone(),
            notifier.clone(),
            deps.clock.clone(),
        ),
    });
    let notification_state = Arc::new(NotificationState { usecase: inbox });
    let email_state = Arc::new(EmailState {
        usecase: EmailUseCaseImpl::new(notifier, deps.users.clone(), deps.preferences.clone()),
    });
    let accounting_state = Arc::new(AccountingState {
        usecase: AccountingUseCaseImpl::new(
            deps.costs.clone(),
            deps.budgets.clone(),
            deps.invoices.clone(),
            deps.payment_batches.clone(),
            deps.clock.clone(),
        ),
    });
    let certificate_state = Arc::new(CertificateState {
        usecase: CertificateUseCaseImpl::new(
            deps.certificates.clone(),
            deps.users.clone(),
            publisher,
            deps.clock.clone(),
        ),
    });
    let document_state = Arc::new(DocumentState {
        usecase: DocumentUseCaseImpl::new(deps.documents.clone(), deps.clock.clone()),
    });
    let job_state = Arc::new(JobState {
        generator: deps.generator()?,
    });

    let protected = Router::new()
        .merge(
            Router::new()
                .route("/api/auth/logout", post(logout))
                .route("/api/auth/me", get(me))
                .with_state(auth_state.clone()),
        )
        .merge(
            Router::new()
                .route("/api/users", get(list_users).post(create_user))
                .route("/api/users/{id}", get(get_user).patch(update_profile))
                .with_state(user_state),
        )
        .merge(
            Router::new()
                .route("/api/trainings", get(list_trainings))
                .route("/api/trainings/{id}", get(get_training))
                .with_state(training_state),
        )
        .merge(
            Router::new()
                .route("/api/requests", get(list_requests).post(submit_request))
                .route("/api/requests/{id}", get(get_request))
                .route("/api/requests/{id}/approve", post(approve_request))
                .route("/api/requests/{id}/deny", post(deny_request))
                .with_state(request_state),
        )
        .merge(
            Router::new()
                .route(
                    "/api/custom-requests",
                    get(list_custom_requests).post(submit_custom_request),
                )
                .route("/api/custom-requests/{id}", get(get_custom_request))
                .route(
                    "/api/custom-requests/{id}/approve",
                    post(approve_custom_request),
                )
                .route("/api/custom-requests/{id}/deny", post(deny_custom_request))
                .with_state(custom_request_state),
        )
        .merge(
            Router::new()
                .route("/api/notifications", get(list_notifications))
                .route("/api/notifications/unread-count", get(unread_count))
                .route("/api/notifications/read-all", post(mark_all_read))
                .route("/api/notifications/{id}/read", post(mark_read))
                .with_state(notification_state),
        )
        .merge(
            Router::new()
                .route(
                    "/api/email-preferences",
                    get(get_preferences).put(update_preferences),
                )
                .route("/api/emails", post(send_email))
                .route("/api/emails/mass", post(send_mass_email))
                .with_state(email_state),
        )
        // 会計 API（ロール確認は各ハンドラ）
        .merge(
            Router::new()
                .route("/api/costs", get(list_costs).post(record_cost))
                .route("/api/costs/summary/{user_id}", get(cost_summary))
                .route("/api/costs/{id}/payment-status", post(change_payment_status))
                .route(
                    "/api/budgets/{fiscal_year}",
                    get(get_budget).put(set_budget),
                )
                .route("/api/budgets/{fiscal_year}/status", get(budget_status))
                .route("/api/invoices", get(list_invoices).post(create_invoice))
                .route("/api/invoices/{id}/status", post(change_invoice_status))
                .route(
                    "/api/payment-batches",
                    get(list_payment_batches).post(create_payment_batch),
                )
                .route(
                    "/api/payment-batches/{id}/status",
                    post(change_payment_batch_status),
                )
                .with_state(accounting_state),
        )
        .merge(
            Router::new()
                .route(
                    "/api/certificates",
                    get(list_certificates).post(issue_certificate),
                )
                .route("/api/certificates/{id}/revoke", post(revoke_certificate))
                .with_state(certificate_state),
        )
        .merge(
            Router::new()
                .route("/api/documents", get(list_documents).post(upload_document))
                .route("/api/documents/{id}/verify", post(verify_document))
                .with_state(document_state),
        )
        .merge(
            Router::new()
                .route("/api/jobs/notifications", post(run_notification_jobs))
                .with_state(job_state),
        )
        .route_layer(from_fn_with_state(session_state, require_session));

    // Request ID レイヤー（下に書いたものが外側）
    // 1. SetRequestIdLayer（最外）: X-Request-Id を生成（クライアント提供値があればそれを使う）
    // 2. TraceLayer: request_id を含むスパンを作り、全ログに載せる
    // 3. CanonicalLogLineLayer: リクエスト完了時に 1 行サマリを出力
    // 4. PropagateRequestIdLayer: レスポンスヘッダーに X-Request-Id をコピー
    Ok(Router::new()
        .route("/health", get(health_check))
        .merge(
            Router::new()
                .route("/health/ready", get(readiness_check))
                .with_state(readiness_state),
        )
        .merge(
            Router::new()
                .route("/api/auth/login", post(login))
                .with_state(auth_state),
        )
        .merge(protected)
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(CanonicalLogLineLayer)
        .layer(TraceLayer::new_for_http().make_span_with(make_request_span))
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid)))
}
