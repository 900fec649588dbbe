//! # 研修カタログ
//!
//! 申請対象となる研修。ワークフローからは読み取り専用で、申請のタイトルと
//! 実施日の解決に使う。

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

define_uuid_id! {
    /// 研修 ID
    pub struct TrainingId;
}

/// 研修の募集情報
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingOpportunity {
    pub id: TrainingId,
    pub title: String,
    pub description: String,
    pub category: String,
    pub date: NaiveDate,
    pub location: String,
    pub instructor: String,
    pub capacity: i32,
    pub enrolled: i32,
    pub credits: i32,
    pub mandatory: bool,
    /// 継続職業研修（CPT）時間。CPT 対象外なら `None`
    pub cpt_hours: Option<f64>,
}

impl TrainingOpportunity {
    pub fn is_cpt(&self) -> bool {
        self.cpt_hours.is_some()
    }

    pub fn seats_left(&self) -> i32 {
        (self.capacity - self.enrolled).max(0)
    }
}

/// 実施日の 30 日以上前に申請されたか
///
/// 日数は切り上げで数える（申請が実施日の 29 日と 1 時間前なら 30 日扱い）。
/// 実施日は UTC の 0 時とみなす。
pub fn submitted_within_30_days(training_date: NaiveDate, submitted_at: DateTime<Utc>) -> bool {
    let training_start = training_date.and_time(chrono::NaiveTime::MIN).and_utc();
    let seconds = (training_start - submitted_at).num_seconds();
    let days = seconds.div_euclid(86_400) + i64::from(seconds.rem_euclid(86_400) != 0);
    days >= 30
}
