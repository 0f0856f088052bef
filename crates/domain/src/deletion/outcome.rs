//! # カスケード実行結果
//!
//! 1 回の `delete_entity` 呼び出しの結果を表現する。
//!
//! ## 失敗ポリシー
//!
//! | 失敗の種類 | 扱い | 最終状態 |
//! |-----------|------|---------|
//! | 外部参照の削除失敗 | 記録して続行 | `PartiallySucceeded` |
//! | 関係データベースの削除失敗 | 残りのステップを中止 | `Failed` |
//!
//! どちらの場合もカスケード全体を再実行してよい。削除済みのレコードは
//! 子 ID の検索に現れず、外部ストレージの `NotFound` は成功として扱われる。

use std::{collections::BTreeMap, fmt};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::PlanError;
use crate::{
    DomainError,
    entity::{EntityKind, EntityRef},
    reference::{ExternalReference, OwnedReference},
};

/// カスケード実行の状態
///
/// `Planned → Running → {Succeeded, PartiallySucceeded, Failed}` の一方向にのみ遷移する。
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::IntoStaticStr, strum::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum CascadeState {
    /// プラン生成済み、未実行
    Planned,
    /// 実行中（キャンセル不可）
    Running,
    /// すべてのステップと外部参照の削除が成功した
    Succeeded,
    /// すべてのステップが完了したが、一部の外部参照の削除に失敗した
    PartiallySucceeded,
    /// 関係データベースの削除に失敗し、残りのステップを中止した
    Failed,
}

impl CascadeState {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Succeeded | Self::PartiallySucceeded | Self::Failed
        )
    }

    /// 次の状態へ遷移する
    ///
    /// # Errors
    ///
    /// - `DomainError::Validation`: 許可されていない遷移
    pub fn transition(self, next: CascadeState) -> Result<CascadeState, DomainError> {
        let allowed = match self {
            Self::Planned => next == Self::Running,
            Self::Running => next.is_terminal(),
            Self::Succeeded | Self::PartiallySucceeded | Self::Failed => false,
        };
        if allowed {
            Ok(next)
        } else {
            Err(DomainError::Validation(format!(
                "カスケードの状態を {self} から {next} に遷移できません"
            )))
        }
    }
}

/// 削除に失敗した外部参照
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExternalDeleteFailure {
    pub owner:     EntityRef,
    pub column:    &'static str,
    pub reference: ExternalReference,
    /// 一時的な失敗（タイムアウト、5xx など）かどうか
    pub transient: bool,
    pub detail:    String,
}

impl ExternalDeleteFailure {
    pub fn new(owned: &OwnedReference, transient: bool, detail: impl Into<String>) -> Self {
        Self {
            owner: owned.owner.clone(),
            column: owned.column,
            reference: owned.reference.clone(),
            transient,
            detail: detail.into(),
        }
    }
}

impl fmt::Display for ExternalDeleteFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({}.{}): {}",
            self.reference.key, self.owner, self.column, self.detail
        )
    }
}

/// カスケード削除のエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CascadeError {
    /// 削除対象のルートレコードが存在しない
    #[error("削除対象が見つかりません: {0}")]
    NotFoundAtRoot(EntityRef),

    /// 外部参照の削除に失敗した（致命的ではない）
    #[error("外部参照の削除に失敗しました: {0}")]
    ExternalDeleteFailure(ExternalDeleteFailure),

    /// 関係データベースの削除に失敗した（残りのステップは中止）
    #[error("{kind} の削除に失敗しました（{step}）: {message}")]
    RelationalDeleteFailure {
        kind:    EntityKind,
        step:    String,
        message: String,
    },

    /// 削除プランの不変条件違反
    #[error(transparent)]
    PlanInvariantViolation(#[from] PlanError),
}

impl CascadeError {
    /// 同じ要求を再実行すれば解消しうるか
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::RelationalDeleteFailure { .. } | Self::ExternalDeleteFailure(_)
        )
    }
}

/// カスケード削除の結果
///
/// 件数は 1 件以上処理した種別のみ保持する。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletionOutcome {
    pub root:                     EntityRef,
    /// ルートレコードが既に存在しなかった（何も削除していない）
    pub root_not_found:           bool,
    pub deleted_counts:           BTreeMap<EntityKind, u64>,
    pub nullified_counts:         BTreeMap<EntityKind, u64>,
    pub external_delete_failures: Vec<ExternalDeleteFailure>,
    pub fatal_error:              Option<CascadeError>,
}

impl DeletionOutcome {
    pub fn new(root: EntityRef) -> Self {
        Self {
            root,
            root_not_found: false,
            deleted_counts: BTreeMap::new(),
            nullified_counts: BTreeMap::new(),
            external_delete_failures: Vec::new(),
            fatal_error: None,
        }
    }

    /// ルートが存在しなかった場合の結果
    ///
    /// 削除は冪等のため、既に削除済みの対象は成功として扱う。
    pub fn not_found(root: EntityRef) -> Self {
        Self {
            root_not_found: true,
            ..Self::new(root)
        }
    }

    /// 最終状態
    pub fn state(&self) -> CascadeState {
        if self.fatal_error.is_some() {
            CascadeState::Failed
        } else if !self.external_delete_failures.is_empty() {
            CascadeState::PartiallySucceeded
        } else {
            CascadeState::Succeeded
        }
    }

    pub fn is_failed(&self) -> bool {
        self.state() == CascadeState::Failed
    }

    pub fn record_deleted(&mut self, kind: EntityKind, count: u64) {
        if count > 0 {
            *self.deleted_counts.entry(kind).or_default() += count;
        }
    }

    pub fn record_nullified(&mut self, kind: EntityKind, count: u64) {
        if count > 0 {
            *self.nullified_counts.entry(kind).or_default() += count;
        }
    }

    pub fn record_external_failure(&mut self, failure: ExternalDeleteFailure) {
        self.external_delete_failures.push(failure);
    }

    pub fn record_fatal(&mut self, error: CascadeError) {
        self.fatal_error = Some(error);
    }

    pub fn deleted(&self, kind: EntityKind) -> u64 {
        self.deleted_counts.get(&kind).copied().unwrap_or(0)
    }

    pub fn nullified(&self, kind: EntityKind) -> u64 {
        self.nullified_counts.get(&kind).copied().unwrap_or(0)
    }

    pub fn total_deleted(&self) -> u64 {
        self.deleted_counts.values().sum()
    }

    /// 呼び出し元に返す警告メッセージ
    pub fn warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if self.root_not_found {
            warnings.push(format!("{} は既に削除されています", self.root));
        }
        if !self.external_delete_failures.is_empty() {
            warnings.push(format!(
                "{} 件の外部ファイルの削除に失敗しました。ファイルが表示されなくなるまで時間がかかる場合があります",
                self.external_delete_failures.len()
            ));
        }
        warnings
    }
}
