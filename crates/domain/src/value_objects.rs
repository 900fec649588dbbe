//! # 共通値オブジェクト
//!
//! | 型 | ラップ対象 | 用途 |
//! |---|-----------|------|
//! | [`Money`] | `i64`（セント） | 費用、予算、請求額 |
//! | [`PersonName`] | `String` | 姓・名 |
//! | [`FiscalYear`] | `String` | 会計年度（`"2025"`） |

use std::{fmt, iter::Sum, ops::{Add, Sub}};

use serde::{Deserialize, Serialize};

use crate::DomainError;

/// 金額（米ドル、セント単位の整数）
///
/// 浮動小数点の丸め誤差を避けるためセントで保持する。
/// JSON 上もセントの整数で表す。
///
/// ```rust
/// use trainflow_domain::value_objects::Money;
///
/// let budget = Money::from_dollars(150_000);
/// assert_eq!(budget.cents(), 15_000_000);
/// assert_eq!(budget.to_string(), "$150,000.00");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    pub const ZERO: Money = Money(0);

    /// 費用・請求書・予算 1 件あたりの上限（10 億ドル）
    pub const MAX_AMOUNT: Money = Money::from_dollars(1_000_000_000);

    pub const fn from_cents(cents: i64) -> Self {
        Self(cents)
    }

    pub const fn from_dollars(dollars: i64) -> Self {
        Self(dollars * 100)
    }

    pub fn cents(self) -> i64 {
        self.0
    }

    /// 記録する金額として検証する（0 より大きく上限以下）
    pub fn positive_amount(self, label: &str) -> Result<Self, DomainError> {
        if self.0 <= 0 {
            return Err(DomainError::Validation(format!(
                "{label}は 0 より大きい値を指定してください"
            )));
        }
        self.within_max(label)
    }

    /// 見積額として検証する（0 以上で上限以下）
    pub fn estimate(self, label: &str) -> Result<Self, DomainError> {
        if self.0 < 0 {
            return Err(DomainError::Validation(format!(
                "{label}は 0 以上で指定してください"
            )));
        }
        self.within_max(label)
    }

    fn within_max(self, label: &str) -> Result<Self, DomainError> {
        if self > Self::MAX_AMOUNT {
            return Err(DomainError::Validation(format!(
                "{label}は {} 以下で指定してください",
                Self::MAX_AMOUNT
            )));
        }
        Ok(self)
    }

    /// `self` が `total` の何 % か（`total` が 0 以下なら 0.0）
    pub fn percent_of(self, total: Money) -> f64 {
        if total.0 <= 0 {
            return 0.0;
        }
        self.0 as f64 / total.0 as f64 * 100.0
    }
}

/// 集計は飽和演算（`i64` の範囲で頭打ち）
impl Add for Money {
    type Output = Money;

    fn add(self, rhs: Money) -> Money {
        Money(self.0.saturating_add(rhs.0))
    }
}

impl Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Money) -> Money {
        Money(self.0.saturating_sub(rhs.0))
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money {
        iter.fold(Money::ZERO, Add::add)
    }
}

impl fmt::Display for Money {
    /// `$1,234.56` 形式（負数は `-$12.00`）
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        let dollars = (abs / 100).to_string();
        let cents = abs % 100;

        let mut grouped = String::with_capacity(dollars.len() + dollars.len() / 3);
        for (i, ch) in dollars.chars().enumerate() {
            if i > 0 && (dollars.len() - i) % 3 == 0 {
                grouped.push(',');
            }
            grouped.push(ch);
        }

        write!(f, "{sign}${grouped}.{cents:02}")
    }
}

define_validated_string! {
    /// 姓または名
    pub struct PersonName {
        label: "氏名",
        max_length: 100,
    }
}

/// 会計年度（4 桁の西暦）
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct FiscalYear(String);

impl FiscalYear {
    pub fn new(value: impl Into<String>) -> Result<Self, DomainError> {
        let value = value.into().trim().to_string();
        if value.len() != 4 || !value.chars().all(|c| c.is_ascii_digit()) {
            return Err(DomainError::Validation(format!(
                "会計年度は 4 桁の西暦で指定してください: {value}"
            )));
        }
        Ok(Self(value))
    }

    /// 日付が属する会計年度（暦年）
    pub fn of_year(year: i32) -> Self {
        Self(format!("{year:04}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for FiscalYear {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<FiscalYear> for String {
    fn from(value: FiscalYear) -> Self {
        value.0
    }
}

impl fmt::Display for FiscalYear {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(0, "$0.00")]
    #[case(5, "$0.05")]
    #[case(123_456, "$1,234.56")]
    #[case(15_000_000, "$150,000.00")]
    #[case(10_000_000_000, "$100,000,000.00")]
    #[case(-1_200, "-$12.00")]
    fn test_moneyの表示形式(#[case] cents: i64, #[case] expected: &str) {
        assert_eq!(Money::from_cents(cents).to_string(), expected);
    }

    #[rstest]
    fn test_moneyの合計() {
        let total: Money = [Money::from_dollars(10), Money::from_cents(250)]
            .into_iter()
            .sum();

        assert_eq!(total, Money::from_cents(1_250));
    }

    #[rstest]
    #[case(0, false)]
    #[case(-1, false)]
    #[case(1, true)]
    #[case(Money::MAX_AMOUNT.cents(), true)]
    #[case(Money::MAX_AMOUNT.cents() + 1, false)]
    #[case(i64::MAX / 2 + 1, false)]
    fn test_金額は0より大きく上限以下(#[case] cents: i64, #[case] ok: bool) {
        assert_eq!(Money::from_cents(cents).positive_amount("金額").is_ok(), ok);
    }

    #[rstest]
    fn test_見積は0を許し負数と上限超過を拒否する() {
        assert!(Money::ZERO.estimate("費用見積").is_ok());
        assert!(Money::from_cents(-1).estimate("費用見積").is_err());
        assert!(Money::from_cents(i64::MAX).estimate("費用見積").is_err());
    }

    #[rstest]
    fn test_合計はオーバーフローせず頭打ちになる() {
        let total: Money = [Money::from_cents(i64::MAX / 2 + 1), Money::from_cents(i64::MAX / 2 + 1)]
            .into_iter()
            .sum();

        assert_eq!(total, Money::from_cents(i64::MAX));
        assert_eq!(
            Money::from_cents(i64::MIN) - Money::from_dollars(1),
            Money::from_cents(i64::MIN)
        );
    }

    #[rstest]
    fn test_percent_ofは予算0で0を返す() {
        assert_eq!(Money::from_dollars(10).percent_of(Money::ZERO), 0.0);
        assert_eq!(
            Money::from_dollars(75).percent_of(Money::from_dollars(100)),
            75.0
        );
    }

    #[rstest]
    fn test_moneyはセント整数でjson化される() {
        assert_eq!(
            serde_json::to_value(Money::from_cents(1999)).unwrap(),
            serde_json::json!(1999)
        );
    }

    #[rstest]
    #[case("2025", true)]
    #[case(" 2024 ", true)]
    #[case("FY25", false)]
    #[case("20251", false)]
    fn test_会計年度の検証(#[case] input: &str, #[case] ok: bool) {
        assert_eq!(FiscalYear::new(input).is_ok(), ok);
    }

    #[rstest]
    fn test_氏名は空白のみを拒否する() {
        assert!(PersonName::new("  ").is_err());
        assert_eq!(PersonName::new(" Dana ").unwrap().as_str(), "Dana");
    }
}
