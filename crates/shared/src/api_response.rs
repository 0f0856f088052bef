//! # API レスポンスエンベロープ
//!
//! 内部 API の統一レスポンス形式 `{ "data": T, "warnings": [...] }` を提供する。

use serde::{Deserialize, Serialize};

/// 内部 API の統一レスポンス型
///
/// すべてのエンドポイントは `{ "data": T }` 形式でレスポンスを返す。
/// 処理は成功したが呼び出し元に伝えるべき事項（外部ファイルの削除失敗など）が
/// ある場合のみ `warnings` を含める。
///
/// ## 使用例
///
/// ```
/// use learnhub_shared::ApiResponse;
///
/// let response = ApiResponse::new("hello");
/// assert_eq!(response.data, "hello");
/// assert!(response.warnings.is_empty());
///
/// let response = ApiResponse::new("hello").with_warnings(vec!["遅延あり".to_string()]);
/// assert_eq!(response.warnings.len(), 1);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub data:     T,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl<T> ApiResponse<T> {
    /// 新しい `ApiResponse` を作成する
    pub fn new(data: T) -> Self {
        Self {
            data,
            warnings: Vec::new(),
        }
    }

    /// 警告メッセージを付与する
    pub fn with_warnings(mut self, warnings: Vec<String>) -> Self {
        self.warnings = warnings;
        self
    }
}
