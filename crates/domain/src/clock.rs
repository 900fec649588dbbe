//! # Clock
//!
//! ユースケースとジェネレータは `Utc::now()` を直接呼ばず、この抽象から時刻を得る。
//! テストでは [`FixedClock`] で日付境界（30 日前、7 日以内など）を固定する。

use chrono::{DateTime, NaiveDate, Utc};

pub trait Clock: Send + Sync {
   fn now(&self) -> DateTime<Utc>;

   /// UTC での今日の日付
   fn today(&self) -> NaiveDate {
      self.now().date_naive()
   }
}

pub struct SystemClock;

impl Clock for SystemClock {
   fn now(&self) -> DateTime<Utc> {
      Utc::now()
   }
}

/// 固定時刻を返す
pub struct FixedClock {
   now: DateTime<Utc>,
}

impl FixedClock {
   pub fn new(now: DateTime<Utc>) -> Self {
      Self { now }
   }
}

impl Clock for FixedClock {
   fn now(&self) -> DateTime<Utc> {
      self.now
   }
}
