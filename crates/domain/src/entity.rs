//! # エンティティ種別と識別子
//!
//! 削除エンジンが扱うすべてのレコード種別（[`EntityKind`]）と、
//! 種別をまたいで共通に使う識別子（[`EntityId`]）を定義する。
//!
//! ## 設計判断
//!
//! テーブル名と外部参照カラムは `EntityKind` の網羅的な `match` で定義する。
//! 種別を追加した際にテーブル定義の漏れをコンパイラが検出できる。
//!
//! ## 使用例
//!
//! ```rust
//! use learnhub_domain::entity::{EntityId, EntityKind, EntityRef};
//!
//! let kind: EntityKind = "assignment_submission".parse().unwrap();
//! assert_eq!(kind, EntityKind::AssignmentSubmission);
//! assert_eq!(kind.table_name(), "assignment_submissions");
//!
//! let target = EntityRef::new(EntityKind::Course, EntityId::new());
//! println!("{target}");
//! ```

use serde::{Deserialize, Serialize};
use strum::{EnumIter, EnumString, IntoStaticStr};

use crate::reference::{ReferenceColumn, ReferenceKind};

define_uuid_id! {
    /// レコードの一意識別子
    ///
    /// 全テーブルの主キーは UUID のため、種別をまたいで同じ型で扱う。
    /// 種別との組み合わせは [`EntityRef`] で表現する。
    pub struct EntityId;
}

/// 削除可能なレコード種別
///
/// シリアライズ・パース時は snake_case（例: `"live_lesson_attendee"`）。
/// `Ord` はレポートの表示順にのみ使用し、削除順序とは無関係。
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    IntoStaticStr,
    EnumIter,
    EnumString,
    strum::Display,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum EntityKind {
    User,
    Account,
    Session,
    UserSettings,
    SecurityEvent,
    DeviceLog,
    DeviceTracking,
    PaymentLog,
    CodeRedemption,
    Category,
    Course,
    Chapter,
    Lesson,
    LessonProgress,
    Enrollment,
    Assignment,
    AssignmentSubmission,
    Resource,
    Page,
    LiveLesson,
    LiveLessonAttendee,
}

impl EntityKind {
    /// 対応するテーブル名
    pub fn table_name(self) -> &'static str {
        match self {
            Self::User => "users",
            Self::Account => "accounts",
            Self::Session => "sessions",
            Self::UserSettings => "user_settings",
            Self::SecurityEvent => "security_events",
            Self::DeviceLog => "device_logs",
            Self::DeviceTracking => "device_tracking",
            Self::PaymentLog => "payment_logs",
            Self::CodeRedemption => "code_redemptions",
            Self::Category => "categories",
            Self::Course => "courses",
            Self::Chapter => "chapters",
            Self::Lesson => "lessons",
            Self::LessonProgress => "lesson_progress",
            Self::Enrollment => "enrollments",
            Self::Assignment => "assignments",
            Self::AssignmentSubmission => "assignment_submissions",
            Self::Resource => "resources",
            Self::Page => "pages",
            Self::LiveLesson => "live_lessons",
            Self::LiveLessonAttendee => "live_lesson_attendees",
        }
    }

    /// この種別のレコードが排他的に所有する外部参照カラム
    ///
    /// カラムの値は NULL または空文字列を取りうる（参照なし）。
    pub fn reference_columns(self) -> &'static [ReferenceColumn] {
        const USER: &[ReferenceColumn] = &[ReferenceColumn::new("avatar_key", ReferenceKind::Image)];
        const CATEGORY: &[ReferenceColumn] =
            &[ReferenceColumn::new("image_key", ReferenceKind::Image)];
        const COURSE: &[ReferenceColumn] =
            &[ReferenceColumn::new("thumbnail_key", ReferenceKind::Image)];
        const LESSON: &[ReferenceColumn] = &[
            ReferenceColumn::new("video_id", ReferenceKind::Video),
            ReferenceColumn::new("thumbnail_key", ReferenceKind::Image),
        ];
        const ASSIGNMENT: &[ReferenceColumn] =
            &[ReferenceColumn::new("attachment_key", ReferenceKind::File)];
        const SUBMISSION: &[ReferenceColumn] =
            &[ReferenceColumn::new("file_key", ReferenceKind::File)];
        const RESOURCE: &[ReferenceColumn] =
            &[ReferenceColumn::new("file_key", ReferenceKind::File)];
        const PAGE: &[ReferenceColumn] =
            &[ReferenceColumn::new("cover_image_key", ReferenceKind::Image)];
        const LIVE_LESSON: &[ReferenceColumn] = &[
            ReferenceColumn::new("thumbnail_key", ReferenceKind::Image),
            ReferenceColumn::new("recording_video_id", ReferenceKind::Video),
        ];

        match self {
            Self::User => USER,
            Self::Category => CATEGORY,
            Self::Course => COURSE,
            Self::Lesson => LESSON,
            Self::Assignment => ASSIGNMENT,
            Self::AssignmentSubmission => SUBMISSION,
            Self::Resource => RESOURCE,
            Self::Page => PAGE,
            Self::LiveLesson => LIVE_LESSON,
            Self::Account
            | Self::Session
            | Self::UserSettings
            | Self::SecurityEvent
            | Self::DeviceLog
            | Self::DeviceTracking
            | Self::PaymentLog
            | Self::CodeRedemption
            | Self::Chapter
            | Self::LessonProgress
            | Self::Enrollment
            | Self::LiveLessonAttendee => &[],
        }
    }

    /// 外部参照カラムを持つかどうか
    pub fn owns_references(self) -> bool {
        !self.reference_columns().is_empty()
    }
}

/// 種別付きのレコード参照（例: `course:0190...`）
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, derive_more::Display)]
#[display("{kind}:{id}")]
pub struct EntityRef {
    pub kind: EntityKind,
    pub id:   EntityId,
}

impl EntityRef {
    pub fn new(kind: EntityKind, id: EntityId) -> Self {
        Self { kind, id }
    }
}
