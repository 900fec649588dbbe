//! # 承認階級
//!
//! カスタム研修申請は `Sergeant < Lieutenant < Commander < Chief` の階級を
//! 順にたどって承認される。ユーザーの階級は自由記述テキストなので、
//! [`ApprovalRank::matches`] で単語単位に照合する。
//!
//! 部分文字列一致では "Sergeant" が "Sergeant-at-Arms Liaison" のような
//! 無関係な肩書きにも当たり、逆に "Sgt." には当たらない。ここでは区切り文字で
//! 分割した単語が階級名か略称と一致するかで判定する。

use serde::{Deserialize, Serialize};
use strum::IntoStaticStr;

use crate::DomainError;

/// 承認階級（宣言順が階級の上下）
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    IntoStaticStr,
    strum::Display,
)]
pub enum ApprovalRank {
    Sergeant,
    Lieutenant,
    Commander,
    Chief,
}

impl std::str::FromStr for ApprovalRank {
    type Err = DomainError;

    /// 大文字小文字を区別しない
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sergeant" => Ok(Self::Sergeant),
            "lieutenant" => Ok(Self::Lieutenant),
            "commander" => Ok(Self::Commander),
            "chief" => Ok(Self::Chief),
            _ => Err(DomainError::Validation(format!("不正な承認階級: {s}"))),
        }
    }
}

impl ApprovalRank {
    /// 照合に使う語（小文字）
    fn words(self) -> &'static [&'static str] {
        match self {
            Self::Sergeant => &["sergeant", "sgt"],
            Self::Lieutenant => &["lieutenant", "lt"],
            Self::Commander => &["commander", "cmdr"],
            Self::Chief => &["chief"],
        }
    }

    /// ユーザーの階級テキストがこの階級を含むか
    ///
    /// ```rust
    /// use trainflow_domain::rank::ApprovalRank;
    ///
    /// assert!(ApprovalRank::Sergeant.matches("Patrol Sgt."));
    /// assert!(ApprovalRank::Lieutenant.matches("police LIEUTENANT"));
    /// assert!(!ApprovalRank::Chief.matches("Mischief Officer"));
    /// ```
    pub fn matches(self, rank_text: &str) -> bool {
        let words = self.words();
        rank_text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .any(|w| words.iter().any(|candidate| w.eq_ignore_ascii_case(candidate)))
    }
}

/// 承認チェーン
///
/// 空でなく、階級順に並び、重複がないことを生成時に保証する。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<ApprovalRank>", into = "Vec<ApprovalRank>")]
pub struct ApprovalChain(Vec<ApprovalRank>);

impl ApprovalChain {
    /// 入力順に関わらず階級順に正規化する
    pub fn new(ranks: impl IntoIterator<Item = ApprovalRank>) -> Result<Self, DomainError> {
        let mut ranks: Vec<ApprovalRank> = ranks.into_iter().collect();
        ranks.sort();
        ranks.dedup();

        if ranks.is_empty() {
            return Err(DomainError::Validation(
                "承認チェーンには 1 つ以上の階級が必要です".to_string(),
            ));
        }

        Ok(Self(ranks))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// 常に false（空のチェーンは作れない）
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn ranks(&self) -> &[ApprovalRank] {
        &self.0
    }

    pub fn first(&self) -> ApprovalRank {
        self.0[0]
    }

    pub fn get(&self, level: usize) -> Option<ApprovalRank> {
        self.0.get(level).copied()
    }

    /// `level` が最後の段か
    pub fn is_final_level(&self, level: usize) -> bool {
        level + 1 == self.0.len()
    }
}

impl TryFrom<Vec<ApprovalRank>> for ApprovalChain {
    type Error = DomainError;

    fn try_from(value: Vec<ApprovalRank>) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ApprovalChain> for Vec<ApprovalRank> {
    fn from(value: ApprovalChain) -> Self {
        value.0
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    use super::*;

    #[rstest]
    #[case(ApprovalRank::Sergeant, "Sergeant", true)]
    #[case(ApprovalRank::Sergeant, "sgt", true)]
    #[case(ApprovalRank::Sergeant, "Staff Sergeant", true)]
    #[case(ApprovalRank::Sergeant, "Sergeants Association Rep", false)]
    #[case(ApprovalRank::Lieutenant, "Lt. Commander", true)]
    #[case(ApprovalRank::Commander, "Lt. Commander", true)]
    #[case(ApprovalRank::Commander, "Commanding Officer", false)]
    #[case(ApprovalRank::Chief, "Deputy Chief", true)]
    #[case(ApprovalRank::Chief, "Mischief", false)]
    #[case(ApprovalRank::Chief, "", false)]
    fn test_階級テキストの単語照合(
        #[case] rank: ApprovalRank,
        #[case] text: &str,
        #[case] expected: bool,
    ) {
        assert_eq!(rank.matches(text), expected);
    }

    #[rstest]
    fn test_階級の順序() {
        assert!(ApprovalRank::Sergeant < ApprovalRank::Lieutenant);
        assert!(ApprovalRank::Commander < ApprovalRank::Chief);
    }

    #[rstest]
    fn test_文字列から大文字小文字を問わず変換できる() {
        assert_eq!("CHIEF".parse::<ApprovalRank>().unwrap(), ApprovalRank::Chief);
        assert!("captain".parse::<ApprovalRank>().is_err());
    }

    #[rstest]
    fn test_チェーンは階級順に並び重複が除かれる() {
        let chain = ApprovalChain::new([
            ApprovalRank::Chief,
            ApprovalRank::Sergeant,
            ApprovalRank::Chief,
        ])
        .unwrap();

        assert_eq!(chain.ranks(), &[ApprovalRank::Sergeant, ApprovalRank::Chief]);
        assert_eq!(chain.first(), ApprovalRank::Sergeant);
        assert!(chain.is_final_level(1));
        assert!(!chain.is_final_level(0));
    }

    #[rstest]
    fn test_空のチェーンは作れない() {
        assert!(matches!(
            ApprovalChain::new([]),
            Err(DomainError::Validation(_))
        ));
    }

    #[rstest]
    fn test_チェーンのjsonは階級名の配列() {
        let chain = ApprovalChain::new([ApprovalRank::Lieutenant, ApprovalRank::Sergeant]).unwrap();

        assert_eq!(
            serde_json::to_value(&chain).unwrap(),
            serde_json::json!(["Sergeant", "Lieutenant"])
        );
        let empty: Result<ApprovalChain, _> = serde_json::from_str("[]");
        assert!(empty.is_err());
    }
}
