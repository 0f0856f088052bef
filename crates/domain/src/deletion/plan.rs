//! # 削除プラン
//!
//! プランナーが出力し、グラフリーダーとカスケード実行器が消費するデータ構造。
//! 削除順序をレビュー・テスト可能な値として表現する。

use std::fmt;

use crate::{entity::EntityKind, reference::ReferenceColumn};

/// 子レコード ID の取得元となる親への辺
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParentLink {
    pub parent:      EntityKind,
    pub foreign_key: &'static str,
}

/// ステップが対象とする ID の取得元
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdSource {
    /// 削除要求されたルートレコードそのもの
    Root,
    /// 列挙した親のいずれかを外部キーで参照する子レコード（和集合）
    ChildrenOf(Vec<ParentLink>),
}

/// ステップで実行する関係データベース操作
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepAction {
    /// 行を削除する
    Delete,
    /// 外部キーカラムを NULL に更新する（行は残る）
    Nullify { column: &'static str },
}

/// 削除プランの 1 ステップ
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletionStep {
    pub kind:       EntityKind,
    pub action:     StepAction,
    pub source:     IdSource,
    /// 行削除の前に削除を試行する外部参照カラム（Nullify では常に空）
    pub references: &'static [ReferenceColumn],
}

impl DeletionStep {
    pub fn is_delete(&self) -> bool {
        self.action == StepAction::Delete
    }
}

impl fmt::Display for DeletionStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.action {
            StepAction::Delete => write!(f, "delete {}", self.kind),
            StepAction::Nullify { column } => write!(f, "nullify {}.{}", self.kind, column),
        }
    }
}

/// ルート種別ごとの削除プラン
///
/// `steps` は実行順（子 → 親）。最後のステップは常にルート種別の削除。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletionPlan {
    root:  EntityKind,
    steps: Vec<DeletionStep>,
}

impl DeletionPlan {
    pub(crate) fn new(root: EntityKind, steps: Vec<DeletionStep>) -> Self {
        Self { root, steps }
    }

    pub fn root(&self) -> EntityKind {
        self.root
    }

    pub fn steps(&self) -> &[DeletionStep] {
        &self.steps
    }

    /// 行削除ステップの種別を実行順に返す
    pub fn delete_order(&self) -> Vec<EntityKind> {
        self.steps
            .iter()
            .filter(|s| s.is_delete())
            .map(|s| s.kind)
            .collect()
    }

    /// 指定種別の行削除ステップの位置
    pub fn position_of(&self, kind: EntityKind) -> Option<usize> {
        self.steps
            .iter()
            .position(|s| s.is_delete() && s.kind == kind)
    }
}
