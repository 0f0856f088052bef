//! 孤立ファイル掃除の統合テスト
//!
//! カスケード削除と同じレコードストア・ストレージを共有する構成で、
//! 掃除が参照中のファイルを消さないこと、実行中の掃除が削除を待たせないことを検証する。

use std::time::Duration;

use learnhub_core_service::{test_utils::DeletionTestBuilder, usecase::Actor};
use learnhub_domain::{clock::Clock, entity::EntityKind};
use pretty_assertions::assert_eq;

#[tokio::test]
async fn test_レコードを作らなかったアップロードは猶予期間後に回収される() {
    // Given: 参照中のサムネイルと、レコードが作られなかったアップロード
    let setup = DeletionTestBuilder::new().build();
    let owner = setup.seed_user();
    let fixture = setup.seed_course(&owner, 0, 0);
    setup.attach(
        EntityKind::Course,
        &fixture.course,
        "thumbnail_key",
        "courses/c1/thumb.png",
    );
    setup.objects.put("uploads/abandoned.png", setup.clock.now());

    // When
    let first = setup.sweeper.sweep().await.unwrap();
    setup.clock.advance(chrono::Duration::hours(25));
    let second = setup.sweeper.sweep().await.unwrap();

    // Then
    assert_eq!(first.skipped_recent, 1);
    assert_eq!(first.deleted, 0);
    assert_eq!(second.deleted, 1);
    assert!(!setup.objects.contains("uploads/abandoned.png"));
    assert!(setup.objects.contains("courses/c1/thumb.png"));
}

#[tokio::test]
async fn test_カスケード削除の後は掃除する対象が残らない() {
    // Given
    let setup = DeletionTestBuilder::new().build();
    let owner = setup.seed_user();
    let fixture = setup.seed_course(&owner, 1, 1);
    setup.attach(
        EntityKind::Lesson,
        &fixture.lessons[0],
        "video_id",
        "9a8b7c6d-5e4f-4a3b-9c2d-1e0f12345678",
    );
    setup.attach(
        EntityKind::Course,
        &fixture.course,
        "thumbnail_key",
        "courses/c1/thumb.png",
    );

    // When
    setup
        .usecase
        .delete_entity(&Actor::service(), EntityKind::Course, fixture.course.clone())
        .await
        .unwrap();
    setup.clock.advance(chrono::Duration::days(2));
    let report = setup.sweeper.sweep().await.unwrap();

    // Then
    assert_eq!(report.scanned, 0);
    assert_eq!(report.deleted, 0);
}

#[tokio::test(start_paused = true)]
async fn test_実行中の掃除はカスケード削除を待たせない() {
    // Given: 呼び出しごとに 200ms かかるストレージと、猶予期間を過ぎた孤立ファイル
    let setup = DeletionTestBuilder::new()
        .with_slow_storage(Duration::from_millis(200), Duration::from_secs(1))
        .build();
    setup.objects.put(
        "uploads/orphan.png",
        setup.clock.now() - chrono::Duration::days(2),
    );
    let owner = setup.seed_user();
    let fixture = setup.seed_course(&owner, 1, 2);

    // When: 掃除が削除フェーズに入った時点でカスケード削除を実行する
    let sweeper = setup.sweeper.clone();
    let sweep = tokio::spawn(async move { sweeper.sweep().await });
    tokio::time::sleep(Duration::from_millis(450)).await;

    let outcome = tokio::time::timeout(
        Duration::from_millis(100),
        setup
            .usecase
            .delete_entity(&Actor::service(), EntityKind::Course, fixture.course.clone()),
    )
    .await
    .expect("掃除の完了を待たずに削除が終わる")
    .unwrap();

    // Then
    assert_eq!(outcome.deleted(EntityKind::Lesson), 2);
    assert!(!sweep.is_finished());
    let report = sweep.await.unwrap().unwrap();
    assert_eq!(report.deleted, 1);
    assert!(!setup.objects.contains("uploads/orphan.png"));
}

#[tokio::test(start_paused = true)]
async fn test_spawn_periodicは間隔の経過後に掃除する() {
    // Given
    let setup = DeletionTestBuilder::new().build();
    setup.objects.put(
        "uploads/orphan.png",
        setup.clock.now() - chrono::Duration::days(2),
    );

    // When
    let handle = setup
        .sweeper
        .clone()
        .spawn_periodic(Duration::from_secs(3600));
    tokio::time::sleep(Duration::from_secs(10)).await;
    let before_interval = setup.objects.contains("uploads/orphan.png");
    tokio::time::sleep(Duration::from_secs(3600)).await;

    // Then: 起動直後には実行せず、1 周期後に実行する
    assert!(before_interval);
    assert!(!setup.objects.contains("uploads/orphan.png"));
    handle.abort();
}

#[tokio::test]
async fn test_プレフィックス外のオブジェクトは掃除しない() {
    let setup = DeletionTestBuilder::new()
        .with_sweep_prefix("uploads/")
        .build();
    let old = setup.clock.now() - chrono::Duration::days(2);
    setup.objects.put("uploads/orphan.png", old);
    setup.objects.put("exports/report.csv", old);

    let report = setup.sweeper.sweep().await.unwrap();

    assert_eq!(report.scanned, 1);
    assert_eq!(report.deleted, 1);
    assert!(setup.objects.contains("exports/report.csv"));
}
