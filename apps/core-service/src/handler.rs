//! # HTTP リクエストハンドラ
//!
//! axum のルートに対応するハンドラ関数を定義する。
//!
//! ## 設計方針
//!
//! - 各ハンドラはサブモジュールに配置
//! - 親モジュール（この `handler.rs`）で re-export し、フラットな API を提供
//! - ハンドラは入力の形式検証とロール確認だけを行い、判断はユースケースに委譲

pub mod accounting;
pub mod auth;
pub mod certificate;
pub mod custom_request;
pub mod document;
pub mod email;
pub mod health;
pub mod job;
pub mod notification;
pub mod request;
pub mod training;
pub mod user;

pub use accounting::{
    AccountingState,
    budget_status,
    change_invoice_status,
    change_payment_batch_status,
    change_payment_status,
    cost_summary,
    create_invoice,
    create_payment_batch,
    get_budget,
    list_costs,
    list_invoices,
    list_payment_batches,
    record_cost,
    set_budget,
};
pub use auth::{AuthState, login, logout, me};
pub use certificate::{CertificateState, issue_certificate, list_certificates, revoke_certificate};
pub use custom_request::{
    CustomRequestState,
    approve_custom_request,
    deny_custom_request,
    get_custom_request,
    list_custom_requests,
    submit_custom_request,
};
pub use document::{DocumentState, list_documents, upload_document, verify_document};
pub use email::{EmailState, get_preferences, send_email, send_mass_email, update_preferences};
pub use health::{ReadinessState, health_check, readiness_check};
pub use job::{JobState, run_notification_jobs};
pub use notification::{NotificationState, list_notifications, mark_all_read, mark_read, unread_count};
pub use request::{
    RequestState,
    approve_request,
    deny_request,
    get_request,
    list_requests,
    submit_request,
};
pub use training::{TrainingState, get_training, list_trainings};
pub use user::{UserState, create_user, get_user, list_users, update_profile};
