//! テスト共通フィクスチャ
//!
//! DB を使用する統合テストで共通利用するシードデータ定数・
//! エンティティ生成ヘルパー。 Rust の統合テスト規約に従い `tests/common/mod.rs`
//! に配置。
//!
//! シードデータは `migrations/20260101000006_seed.sql` が投入する。

// 各テストファイルが独立したクレートとしてコンパイルされるため、
// 使用しない関数に dead_code 警告が出る。モジュール全体で抑制する。
#![allow(dead_code)]

use chrono::{DateTime, NaiveDate, Utc};
use trainflow_domain::{
    custom_request::{
        CustomRequestDetails,
        CustomTrainingRequest,
        CustomTrainingRequestId,
        NewCustomTrainingRequest,
        TrainingType,
    },
    notification::{Notification, NotificationDraft, NotificationId, NotificationKind},
    rank::{ApprovalChain, ApprovalRank},
    request::{NewTrainingRequest, RequestDetails, TrainingRequest, TrainingRequestId},
    training::TrainingId,
    user::UserId,
    value_objects::Money,
};

// =============================================================================
// シードデータ定数
// =============================================================================

fn seed_uuid(n: u8) -> uuid::Uuid {
    format!("00000000-0000-0000-0000-{n:012}").parse().unwrap()
}

/// administrator / Chief of Police
pub fn seed_admin_id() -> UserId {
    UserId::from_uuid(seed_uuid(1))
}

/// supervisor / Commander
pub fn seed_commander_id() -> UserId {
    UserId::from_uuid(seed_uuid(2))
}

/// supervisor / Police Lieutenant
pub fn seed_lieutenant_id() -> UserId {
    UserId::from_uuid(seed_uuid(3))
}

/// supervisor / Sergeant（seed_officer の直属上長）
pub fn seed_sergeant_id() -> UserId {
    UserId::from_uuid(seed_uuid(4))
}

/// officer（バッジ P5001）
pub fn seed_officer_id() -> UserId {
    UserId::from_uuid(seed_uuid(5))
}

/// accounting
pub fn seed_accounting_id() -> UserId {
    UserId::from_uuid(seed_uuid(6))
}

/// Crisis Intervention Team Training（2026-12-07）
pub fn seed_training_id() -> TrainingId {
    TrainingId::from_uuid("10000000-0000-0000-0000-000000000001".parse().unwrap())
}

/// テスト用の固定日時（2026-10-19 09:00 UTC）
pub fn test_now() -> DateTime<Utc> {
    DateTime::from_timestamp(1_792_400_400, 0).unwrap()
}

// =============================================================================
// エンティティ生成ヘルパー
// =============================================================================

/// seed_officer のカタログ申請（submitted）
pub fn create_catalog_request(training_date: NaiveDate) -> TrainingRequest {
    TrainingRequest::new(NewTrainingRequest {
        id: TrainingRequestId::new(),
        requester_id: seed_officer_id(),
        details: RequestDetails::Catalog {
            training_id: seed_training_id(),
            title: "Crisis Intervention Team Training".to_string(),
            training_date,
        },
        notes: None,
        now: test_now(),
    })
    .unwrap()
}

/// seed_officer のカスタム申請（チェーン: Sergeant → Lieutenant）
pub fn create_custom_request() -> CustomTrainingRequest {
    CustomTrainingRequest::new(NewCustomTrainingRequest {
        id: CustomTrainingRequestId::new(),
        requester_id: seed_officer_id(),
        details: CustomRequestDetails {
            title: "Drone Operations Certification".to_string(),
            description: "FAA Part 107 preparation course".to_string(),
            training_type: TrainingType::Individual,
            requested_date: NaiveDate::from_ymd_opt(2027, 2, 1).unwrap(),
            duration: "3 days".to_string(),
            location: "Regional Academy".to_string(),
            estimated_cost: Money::from_dollars(1_200),
            justification: "Supports the new aerial unit".to_string(),
            target_ranks: vec![],
        },
        chain: ApprovalChain::new([ApprovalRank::Sergeant, ApprovalRank::Lieutenant]).unwrap(),
        notes: None,
        now: test_now(),
    })
    .unwrap()
}

/// 未読の通知
pub fn create_notification(user_id: UserId, title: &str, now: DateTime<Utc>) -> Notification {
    NotificationDraft::new(user_id, title, "test message", NotificationKind::Info)
        .into_notification(NotificationId::new(), now)
}
