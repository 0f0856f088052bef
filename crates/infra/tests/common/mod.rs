//! テスト共通フィクスチャ
//!
//! DB を使用する統合テストで共通利用するレコード生成ヘルパー。
//! Rust の統合テスト規約に従い `tests/common/mod.rs` に配置。

// 各テストファイルが独立したクレートとしてコンパイルされるため、
// 使用しない関数に dead_code 警告が出る。モジュール全体で抑制する。
#![allow(dead_code)]

use learnhub_domain::entity::EntityId;
use sqlx::PgPool;

/// ユーザーを作成する
pub async fn insert_user(pool: &PgPool, avatar_key: Option<&str>) -> EntityId {
    let id = EntityId::new();
    sqlx::query("INSERT INTO users (id, email, name, avatar_key) VALUES ($1, $2, 'Test User', $3)")
        .bind(id.as_uuid())
        .bind(format!("{id}@example.com"))
        .bind(avatar_key)
        .execute(pool)
        .await
        .expect("ユーザー作成に失敗");
    id
}

/// カテゴリを作成する
pub async fn insert_category(pool: &PgPool) -> EntityId {
    let id = EntityId::new();
    sqlx::query("INSERT INTO categories (id, name) VALUES ($1, 'Rust')")
        .bind(id.as_uuid())
        .execute(pool)
        .await
        .expect("カテゴリ作成に失敗");
    id
}

/// コースを作成する
pub async fn insert_course(
    pool: &PgPool,
    owner_id: &EntityId,
    category_id: Option<&EntityId>,
    thumbnail_key: Option<&str>,
) -> EntityId {
    let id = EntityId::new();
    sqlx::query(
        "INSERT INTO courses (id, owner_id, category_id, title, thumbnail_key) VALUES ($1, $2, $3, 'Rust 入門', $4)",
    )
    .bind(id.as_uuid())
    .bind(owner_id.as_uuid())
    .bind(category_id.map(EntityId::as_uuid))
    .bind(thumbnail_key)
    .execute(pool)
    .await
    .expect("コース作成に失敗");
    id
}

/// チャプターを作成する
pub async fn insert_chapter(pool: &PgPool, course_id: &EntityId) -> EntityId {
    let id = EntityId::new();
    sqlx::query("INSERT INTO chapters (id, course_id, title) VALUES ($1, $2, '第 1 章')")
        .bind(id.as_uuid())
        .bind(course_id.as_uuid())
        .execute(pool)
        .await
        .expect("チャプター作成に失敗");
    id
}

/// レッスンを作成する
pub async fn insert_lesson(
    pool: &PgPool,
    chapter_id: &EntityId,
    video_id: Option<&str>,
    thumbnail_key: Option<&str>,
) -> EntityId {
    let id = EntityId::new();
    sqlx::query(
        "INSERT INTO lessons (id, chapter_id, title, video_id, thumbnail_key) VALUES ($1, $2, 'レッスン', $3, $4)",
    )
    .bind(id.as_uuid())
    .bind(chapter_id.as_uuid())
    .bind(video_id)
    .bind(thumbnail_key)
    .execute(pool)
    .await
    .expect("レッスン作成に失敗");
    id
}
