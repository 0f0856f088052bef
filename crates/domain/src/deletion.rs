//! # カスケード削除
//!
//! ルートエンティティとその依存レコード・外部参照を削除するための
//! ドメインモデル。I/O を伴う処理（グラフの読み込み、削除の実行）は
//! アプリケーション層が担い、ここでは純粋なデータと規則のみを扱う。
//!
//! ## 概念モデル
//!
//! - **DeletionPlanner**: 依存辺の宣言から削除順序（[`DeletionPlan`]）を導出する
//! - **DeletionPlan**: 子 → 親の順に並んだ削除ステップ
//! - **DeletionOutcome**: 1 回のカスケード実行の結果（件数、失敗した外部参照、致命的エラー）
//! - **CascadeState**: `Planned → Running → {Succeeded, PartiallySucceeded, Failed}`
//!
//! ## 使用例
//!
//! ```rust
//! use learnhub_domain::{
//!     deletion::DeletionPlanner,
//!     entity::EntityKind,
//!     schema::Schema,
//! };
//!
//! let planner = DeletionPlanner::new(Schema::course_platform());
//! let plan = planner.plan_for(EntityKind::Chapter).unwrap();
//!
//! assert_eq!(
//!     plan.delete_order(),
//!     vec![EntityKind::LessonProgress, EntityKind::Lesson, EntityKind::Chapter]
//! );
//! ```

mod outcome;
mod plan;
mod planner;

pub use outcome::*;
pub use plan::*;
pub use planner::*;
use thiserror::Error;

use crate::entity::EntityKind;

/// 削除プランの生成エラー
///
/// スキーマ宣言の誤りを表す。起動時の検証（[`DeletionPlanner::validate_all`]）と
/// テストで検出され、リクエスト処理中に発生することはない。
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlanError {
    #[error("依存関係が循環しています（ルート: {root}）: {}", format_cycle(.cycle))]
    CyclicDependency {
        root:  EntityKind,
        cycle: Vec<EntityKind>,
    },
}

fn format_cycle(cycle: &[EntityKind]) -> String {
    cycle
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(" -> ")
}
