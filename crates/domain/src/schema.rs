//! # 依存関係スキーマ
//!
//! テーブル間の外部キーを `Parent -> Child` の依存辺（[`DependencyEdge`]）として
//! 一箇所で宣言する。削除順序はこの宣言からのみ導出され、関数呼び出しの順序に
//! 暗黙に埋め込まれることはない。
//!
//! ## 辺の定義元
//!
//! `migrations/0001_schema.sql` の外部キー定義と 1 対 1 で対応する。
//!
//! | 動作 | DB 上の外部キー | 削除時の扱い |
//! |------|----------------|--------------|
//! | [`EdgeAction::Cascade`] | `NOT NULL` | 子レコードを先に削除する |
//! | [`EdgeAction::Nullify`] | `NULL` 許容 | 子の外部キーを NULL に更新する |
//!
//! ## 辺の並び順
//!
//! 同じ親を持つ辺の宣言順が、プランナーが子を巡回する順序になる。
//! 並び替えると削除順序（とレポート上の順序）が変わるため注意。

use crate::entity::{EntityKind, EntityKind as K};

/// 依存辺の削除時動作
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum EdgeAction {
    /// 親の削除前に子レコードを削除する
    Cascade,
    /// 親の削除前に子の外部キーを NULL にする（子レコードは残る）
    Nullify,
}

/// `parent -> child` の依存辺
///
/// `child` テーブルの `foreign_key` カラムが `parent` の主キーを参照する。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DependencyEdge {
    pub parent:      EntityKind,
    pub child:       EntityKind,
    pub foreign_key: &'static str,
    pub action:      EdgeAction,
}

impl DependencyEdge {
    pub const fn cascade(parent: EntityKind, child: EntityKind, foreign_key: &'static str) -> Self {
        Self {
            parent,
            child,
            foreign_key,
            action: EdgeAction::Cascade,
        }
    }

    pub const fn nullify(parent: EntityKind, child: EntityKind, foreign_key: &'static str) -> Self {
        Self {
            parent,
            child,
            foreign_key,
            action: EdgeAction::Nullify,
        }
    }
}

/// コースプラットフォームの依存辺
const COURSE_PLATFORM_EDGES: &[DependencyEdge] = &[
    // ユーザーが所有・作成したもの（所有コースを最初に処理する）
    DependencyEdge::cascade(K::User, K::Course, "owner_id"),
    DependencyEdge::cascade(K::User, K::Page, "author_id"),
    DependencyEdge::cascade(K::User, K::LiveLesson, "owner_id"),
    DependencyEdge::cascade(K::User, K::UserSettings, "user_id"),
    DependencyEdge::cascade(K::User, K::SecurityEvent, "user_id"),
    DependencyEdge::cascade(K::User, K::DeviceLog, "user_id"),
    DependencyEdge::cascade(K::User, K::DeviceTracking, "user_id"),
    DependencyEdge::cascade(K::User, K::PaymentLog, "user_id"),
    DependencyEdge::cascade(K::User, K::CodeRedemption, "user_id"),
    DependencyEdge::cascade(K::User, K::LessonProgress, "user_id"),
    DependencyEdge::cascade(K::User, K::AssignmentSubmission, "user_id"),
    DependencyEdge::cascade(K::User, K::Enrollment, "user_id"),
    DependencyEdge::cascade(K::User, K::LiveLessonAttendee, "user_id"),
    // 認証系は最後（ユーザー行の直前）
    DependencyEdge::cascade(K::User, K::Session, "user_id"),
    DependencyEdge::cascade(K::User, K::Account, "user_id"),
    // コース配下
    DependencyEdge::cascade(K::Course, K::Assignment, "course_id"),
    DependencyEdge::cascade(K::Course, K::Resource, "course_id"),
    DependencyEdge::cascade(K::Course, K::Chapter, "course_id"),
    DependencyEdge::cascade(K::Course, K::Enrollment, "course_id"),
    DependencyEdge::nullify(K::Course, K::LiveLesson, "course_id"),
    DependencyEdge::cascade(K::Assignment, K::AssignmentSubmission, "assignment_id"),
    DependencyEdge::cascade(K::Chapter, K::Lesson, "chapter_id"),
    DependencyEdge::cascade(K::Lesson, K::LessonProgress, "lesson_id"),
    DependencyEdge::cascade(K::LiveLesson, K::LiveLessonAttendee, "live_lesson_id"),
    // カテゴリは任意項目のため、削除してもコースは残す
    DependencyEdge::nullify(K::Category, K::Course, "category_id"),
];

/// 依存辺の集合
///
/// 本番では [`Schema::course_platform`] を使う。テストでは任意の辺集合
/// （循環を含むものなど）を [`Schema::new`] で構築できる。
#[derive(Debug, Clone)]
pub struct Schema {
    edges: Vec<DependencyEdge>,
}

impl Schema {
    pub fn new(edges: Vec<DependencyEdge>) -> Self {
        Self { edges }
    }

    /// コースプラットフォームのスキーマ
    pub fn course_platform() -> Self {
        Self::new(COURSE_PLATFORM_EDGES.to_vec())
    }

    pub fn edges(&self) -> &[DependencyEdge] {
        &self.edges
    }

    /// `parent` を親とする辺（宣言順）
    pub fn children_of(&self, parent: EntityKind) -> impl Iterator<Item = &DependencyEdge> {
        self.edges.iter().filter(move |e| e.parent == parent)
    }

    /// `child` を子とする辺（宣言順）
    pub fn parents_of(&self, child: EntityKind) -> impl Iterator<Item = &DependencyEdge> {
        self.edges.iter().filter(move |e| e.child == child)
    }
}

impl Default for Schema {
    fn default() -> Self {
        Self::course_platform()
    }
}
