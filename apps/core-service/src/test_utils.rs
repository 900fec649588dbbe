//! テストユーティリティ
//!
//! ユースケース・ハンドラのテストで共通に使うフィクスチャ。

mod fixture;

pub use fixture::TestFixture;
