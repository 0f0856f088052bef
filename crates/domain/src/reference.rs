//! # 外部参照
//!
//! レコードから外部ストレージ（オブジェクトストレージ / 動画配信サービス）上の
//! バイナリへのポインタを表現する。
//!
//! 参照は保持しているレコードが排他的に所有する。複数レコードからの共有や
//! 参照カウントは存在しないため、所有レコードの削除時に無条件で削除してよい。

use serde::{Deserialize, Serialize};

use crate::entity::EntityRef;

/// 外部参照の種類
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ReferenceKind {
    Image,
    Video,
    File,
}

/// レコードに保存された外部参照 `(kind, key)`
///
/// `key` はオブジェクトストレージのパス（例: `courses/<id>/thumbnail.png`）か、
/// 動画サービスの動画 ID（UUID 形式）のいずれか。どちらに属するかの判定は
/// ストレージゲートウェイの責務で、ここでは区別しない。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ExternalReference {
    pub kind: ReferenceKind,
    pub key:  String,
}

impl ExternalReference {
    pub fn new(kind: ReferenceKind, key: impl Into<String>) -> Self {
        Self {
            kind,
            key: key.into(),
        }
    }

    /// 削除対象が存在しない（空キー）かどうか
    pub fn is_empty(&self) -> bool {
        self.key.trim().is_empty()
    }
}

/// 外部参照を保持するカラムの宣言
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReferenceColumn {
    pub column: &'static str,
    pub kind:   ReferenceKind,
}

impl ReferenceColumn {
    pub const fn new(column: &'static str, kind: ReferenceKind) -> Self {
        Self { column, kind }
    }
}

/// 所有レコードと紐付いた外部参照
///
/// カスケード削除時、どのレコードのどのカラムの参照が削除できなかったかを
/// 呼び出し元へ報告するために所有者情報を保持する。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnedReference {
    pub owner:     EntityRef,
    pub column:    &'static str,
    pub reference: ExternalReference,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_空白のみのキーは空とみなす() {
        assert!(ExternalReference::new(ReferenceKind::Image, "").is_empty());
        assert!(ExternalReference::new(ReferenceKind::Image, "  ").is_empty());
        assert!(!ExternalReference::new(ReferenceKind::Image, "pages/p1/cover.png").is_empty());
    }

    #[test]
    fn test_reference_kindはsnake_caseでシリアライズされる() {
        let json = serde_json::to_value(ReferenceKind::Video).unwrap();
        assert_eq!(json, serde_json::json!("video"));
    }
}
