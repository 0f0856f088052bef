//! PostgresRecordStore の統合テスト
//!
//! 実行方法:
//! ```bash
//! docker compose up -d postgres
//! cargo test -p learnhub-infra --test record_store_test
//! ```

mod common;

use common::{insert_category, insert_chapter, insert_course, insert_lesson, insert_user};
use learnhub_domain::entity::{EntityId, EntityKind};
use learnhub_infra::{
    error::InfraErrorKind,
    repository::{PostgresRecordStore, RecordStore},
};
use pretty_assertions::assert_eq;
use sqlx::PgPool;

const VIDEO_ID: &str = "0b6f1a7e-3c2d-4e5f-8a9b-1c2d3e4f5a6b";

#[sqlx::test(migrations = "../../migrations")]
async fn test_find_oneは存在するレコードを返す(pool: PgPool) {
    let user_id = insert_user(&pool, None).await;
    let sut = PostgresRecordStore::new(pool);

    let found = sut.find_one(EntityKind::User, &user_id).await.unwrap();
    let missing = sut.find_one(EntityKind::User, &EntityId::new()).await.unwrap();

    assert_eq!(found.map(|r| r.id), Some(user_id));
    assert_eq!(missing, None);
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_find_child_idsは複数の親の子をまとめて返す(pool: PgPool) {
    let owner = insert_user(&pool, None).await;
    let course = insert_course(&pool, &owner, None, None).await;
    let chapter_a = insert_chapter(&pool, &course).await;
    let chapter_b = insert_chapter(&pool, &course).await;
    let lesson_a = insert_lesson(&pool, &chapter_a, None, None).await;
    let lesson_b = insert_lesson(&pool, &chapter_b, None, None).await;
    let sut = PostgresRecordStore::new(pool);

    let mut ids = sut
        .find_child_ids(EntityKind::Lesson, "chapter_id", &[chapter_a, chapter_b])
        .await
        .unwrap();
    ids.sort_by_key(|id| *id.as_uuid());
    let mut expected = vec![lesson_a, lesson_b];
    expected.sort_by_key(|id| *id.as_uuid());

    assert_eq!(ids, expected);
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_find_child_idsは親が空ならクエリせず空を返す(pool: PgPool) {
    let sut = PostgresRecordStore::new(pool);

    let ids = sut
        .find_child_ids(EntityKind::Lesson, "chapter_id", &[])
        .await
        .unwrap();

    assert!(ids.is_empty());
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_find_referencesはnullと空文字列を除外する(pool: PgPool) {
    let owner = insert_user(&pool, None).await;
    let course = insert_course(&pool, &owner, None, None).await;
    let chapter = insert_chapter(&pool, &course).await;
    let with_video = insert_lesson(&pool, &chapter, Some(VIDEO_ID), Some("")).await;
    let without = insert_lesson(&pool, &chapter, None, None).await;
    let sut = PostgresRecordStore::new(pool);

    let references = sut
        .find_references(
            EntityKind::Lesson,
            &[with_video.clone(), without],
            EntityKind::Lesson.reference_columns(),
        )
        .await
        .unwrap();

    assert_eq!(references.len(), 1);
    assert_eq!(references[0].owner.id, with_video);
    assert_eq!(references[0].column, "video_id");
    assert_eq!(references[0].reference.key, VIDEO_ID);
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_子が残る親の削除は外部キー違反になる(pool: PgPool) {
    let owner = insert_user(&pool, None).await;
    let course = insert_course(&pool, &owner, None, None).await;
    insert_chapter(&pool, &course).await;
    let sut = PostgresRecordStore::new(pool);

    let err = sut
        .delete_many(EntityKind::Course, &[course.clone()])
        .await
        .unwrap_err();

    assert!(
        matches!(err.kind(), InfraErrorKind::ForeignKeyViolation { .. }),
        "{err}"
    );
    assert!(sut.find_one(EntityKind::Course, &course).await.unwrap().is_some());
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_delete_manyは削除件数を返す(pool: PgPool) {
    let owner = insert_user(&pool, None).await;
    let course = insert_course(&pool, &owner, None, None).await;
    let chapters = vec![
        insert_chapter(&pool, &course).await,
        insert_chapter(&pool, &course).await,
    ];
    let sut = PostgresRecordStore::new(pool);

    let deleted = sut.delete_many(EntityKind::Chapter, &chapters).await.unwrap();
    let again = sut.delete_many(EntityKind::Chapter, &chapters).await.unwrap();

    assert_eq!(deleted, 2);
    assert_eq!(again, 0);
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_nullify_manyで外部キーを外すとカテゴリを削除できる(pool: PgPool) {
    let owner = insert_user(&pool, None).await;
    let category = insert_category(&pool).await;
    let course = insert_course(&pool, &owner, Some(&category), None).await;
    let sut = PostgresRecordStore::new(pool.clone());

    let nullified = sut
        .nullify_many(EntityKind::Course, "category_id", &[course.clone()])
        .await
        .unwrap();
    let deleted = sut
        .delete_many(EntityKind::Category, &[category])
        .await
        .unwrap();

    assert_eq!(nullified, 1);
    assert_eq!(deleted, 1);
    let category_id: Option<uuid::Uuid> =
        sqlx::query_scalar("SELECT category_id FROM courses WHERE id = $1")
            .bind(course.as_uuid())
            .fetch_one(&pool)
            .await
            .unwrap();
    assert_eq!(category_id, None);
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_不正なカラム名はクエリ前に拒否される(pool: PgPool) {
    let sut = PostgresRecordStore::new(pool);

    let err = sut
        .nullify_many(EntityKind::Course, "category_id = NULL; --", &[EntityId::new()])
        .await
        .unwrap_err();

    assert!(matches!(err.kind(), InfraErrorKind::InvalidInput(_)));
}

#[sqlx::test(migrations = "../../migrations")]
async fn test_list_referenced_keysは全テーブルの参照キーを返す(pool: PgPool) {
    let owner = insert_user(&pool, Some("avatars/u1.png")).await;
    let course = insert_course(&pool, &owner, None, Some("courses/c1/thumb.png")).await;
    let chapter = insert_chapter(&pool, &course).await;
    insert_lesson(&pool, &chapter, Some(VIDEO_ID), Some("  ")).await;
    let sut = PostgresRecordStore::new(pool);

    let mut keys: Vec<String> = sut.list_referenced_keys().await.unwrap().into_iter().collect();
    keys.sort();

    assert_eq!(
        keys,
        vec![
            VIDEO_ID.to_string(),
            "avatars/u1.png".to_string(),
            "courses/c1/thumb.png".to_string(),
        ]
    );
}
