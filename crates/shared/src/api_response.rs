//! # API レスポンスエンベロープ
//!
//! 成功レスポンスはすべて `{ "data": T }` で包んで返す。

use serde::{Deserialize, Serialize};

/// 成功レスポンスの統一形式
///
/// ```
/// use trainflow_shared::ApiResponse;
///
/// let response = ApiResponse::new(vec!["BN-1001"]);
/// assert_eq!(response.data, vec!["BN-1001"]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn new(data: T) -> Self {
        Self { data }
    }
}
