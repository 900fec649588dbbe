//! # TrainFlow サーバー
//!
//! 研修申請の承認ワークフロー、通知、会計を提供する HTTP サービス。
//!
//! ## 環境変数
//!
//! | 変数名 | 必須 | 説明 |
//! |--------|------|------|
//! | `APP_HOST` | No | バインドアドレス（デフォルト: `0.0.0.0`） |
//! | `APP_PORT` | **Yes** | ポート番号 |
//! | `DATABASE_URL` | **Yes** | PostgreSQL 接続 URL |
//! | `REDIS_URL` | **Yes** | Redis 接続 URL（セッション） |
//! | `NOTIFICATION_BACKEND` | No | `sendgrid` / `smtp` / `ses` / `noop`（デフォルト: `noop`） |
//! | `GENERATOR_INTERVAL_SECS` | No | 通知ジェネレータの間隔（デフォルト: `3600`、`0` で無効） |
//! | `LOG_FORMAT` | No | `json` / `pretty`（デフォルト: `pretty`） |
//!
//! 送信者や SMTP の設定は [`trainflow_core_service::config`] を参照。
//!
//! ## 起動方法
//!
//! ```bash
//! # 開発環境
//! cargo run -p trainflow-core-service
//!
//! # 本番環境
//! APP_PORT=3000 DATABASE_URL=postgres://... REDIS_URL=redis://... \
//!   cargo run -p trainflow-core-service --release
//! ```

use std::{net::SocketAddr, sync::Arc};

use anyhow::Context as _;
use tokio::{net::TcpListener, sync::watch};
use trainflow_core_service::{
    app_builder::{AppDependencies, build_app},
    background,
    config::{CoreConfig, NotificationBackend, NotificationConfig},
    handler::ReadinessState,
    usecase::notification::NotificationMirror,
};
use trainflow_domain::clock::SystemClock;
use trainflow_infra::{
    Argon2PasswordChecker,
    NoopNotificationSender,
    NotificationSender,
    RedisSessionManager,
    SendGridNotificationSender,
    SenderIdentity,
    SesNotificationSender,
    SessionManager,
    SmtpNotificationSender,
    db,
    repository::{
        PostgresBudgetRepository,
        PostgresCertificateRepository,
        PostgresCostRepository,
        PostgresCustomTrainingRequestRepository,
        PostgresDocumentRepository,
        PostgresEmailLogRepository,
        PostgresEmailPreferencesRepository,
        PostgresInvoiceRepository,
        PostgresNotificationRepository,
        PostgresPaymentBatchRepository,
        PostgresTrainingRepository,
        PostgresTrainingRequestRepository,
        PostgresUserRepository,
    },
};
use trainflow_shared::observability::{TracingConfig, init_tracing};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env ファイルを読み込む（存在する場合）
    dotenvy::dotenv().ok();

    init_tracing(TracingConfig::from_env("core-service"));
    let _tracing_guard = tracing::info_span!("app", service = "core-service").entered();

    let config = CoreConfig::from_env().context("設定の読み込みに失敗しました")?;
    tracing::info!("TrainFlow サーバーを起動します: {}:{}", config.host, config.port);

    let pool = db::create_pool(&config.database_url)
        .await
        .context("データベース接続に失敗しました")?;
    db::run_migrations(&pool)
        .await
        .context("マイグレーションの適用に失敗しました")?;
    tracing::info!("データベースに接続しました");

    let session_manager: Arc<dyn SessionManager> = Arc::new(
        RedisSessionManager::new(&config.redis_url)
            .await
            .context("Redis への接続に失敗しました")?,
    );

    let sender = build_sender(&config.notification).await;

    let deps = AppDependencies {
        users: Arc::new(PostgresUserRepository::new(pool.clone())),
        trainings: Arc::new(PostgresTrainingRepository::new(pool.clone())),
        requests: Arc::new(PostgresTrainingRequestRepository::new(pool.clone())),
        custom_requests: Arc::new(PostgresCustomTrainingRequestRepository::new(pool.clone())),
        notifications: Arc::new(PostgresNotificationRepository::new(pool.clone())),
        preferences: Arc::new(PostgresEmailPreferencesRepository::new(pool.clone())),
        email_logs: Arc::new(PostgresEmailLogRepository::new(pool.clone())),
        certificates: Arc::new(PostgresCertificateRepository::new(pool.clone())),
        documents: Arc::new(PostgresDocumentRepository::new(pool.clone())),
        costs: Arc::new(PostgresCostRepository::new(pool.clone())),
        budgets: Arc::new(PostgresBudgetRepository::new(pool.clone())),
        invoices: Arc::new(PostgresInvoiceRepository::new(pool.clone())),
        payment_batches: Arc::new(PostgresPaymentBatchRepository::new(pool.clone())),
        sender,
        session_manager: session_manager.clone(),
        password_checker: Arc::new(Argon2PasswordChecker::new()),
        mirror: Arc::new(NotificationMirror::new()),
        clock: Arc::new(SystemClock),
        base_url: config.notification.base_url.clone(),
    };

    let readiness_state = Arc::new(ReadinessState {
        pool: pool.clone(),
        session_manager,
    });
    let app = build_app(&deps, readiness_state).context("ルーターの構築に失敗しました")?;

    // バックグラウンドタスク
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut tasks = background::spawn_notification_listener(
        pool,
        deps.notifications.clone(),
        deps.mirror.clone(),
        shutdown_rx.clone(),
    );
    let generator = deps
        .generator()
        .context("通知ジェネレーターの構築に失敗しました")?;
    tasks.extend(background::spawn_generator(
        generator,
        config.generator_interval_secs,
        shutdown_rx,
    ));

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .context("アドレスのパースに失敗しました")?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!("TrainFlow サーバーが起動しました: {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("バックグラウンドタスクを停止します");
    let _ = shutdown_tx.send(true);
    for task in tasks {
        if let Err(e) = task.await {
            tracing::warn!(error = %e, "バックグラウンドタスクが異常終了しました");
        }
    }

    Ok(())
}

/// `NOTIFICATION_BACKEND` に応じた送信経路
async fn build_sender(config: &NotificationConfig) -> Arc<dyn NotificationSender> {
    let identity = SenderIdentity::new(&config.sender_email, &config.sender_name);
    match config.backend {
        NotificationBackend::SendGrid => {
            let api_key = config.sendgrid_api_key.clone().unwrap_or_default();
            tracing::info!("メール送信: SendGrid");
            Arc::new(SendGridNotificationSender::new(api_key, identity))
        }
        NotificationBackend::Smtp => {
            tracing::info!(host = %config.smtp_host, port = config.smtp_port, "メール送信: SMTP");
            Arc::new(SmtpNotificationSender::new(
                &config.smtp_host,
                config.smtp_port,
                identity,
            ))
        }
        NotificationBackend::Ses => {
            let aws_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
                .load()
                .await;
            tracing::info!("メール送信: Amazon SES");
            Arc::new(SesNotificationSender::new(
                aws_sdk_sesv2::Client::new(&aws_config),
                identity,
            ))
        }
        NotificationBackend::Noop => {
            tracing::info!("メール送信: 無効（ログのみ）");
            Arc::new(NoopNotificationSender)
        }
    }
}

/// Ctrl+C または SIGTERM を待つ
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Ctrl+C ハンドラの登録に失敗しました");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "SIGTERM ハンドラの登録に失敗しました");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    tracing::info!("シャットダウンシグナルを受信しました");
}
