//! PostgresCascadeLock の統合テスト
//!
//! sqlx::test のプールでは各取得が別コネクションになるため、
//! advisory lock の排他をプール内で検証できる。

use std::time::Duration;

use learnhub_infra::lock::{CascadeLock, PostgresCascadeLock};
use sqlx::{PgPool, postgres::PgPoolOptions};

#[sqlx::test(migrations = "../../migrations")]
async fn test_保持中のadvisory_lockは他の取得を待たせる(
    _pool_options: PgPoolOptions,
    connect_options: sqlx::postgres::PgConnectOptions,
) {
    let pool: PgPool = PgPoolOptions::new()
        .max_connections(2)
        .connect_with(connect_options)
        .await
        .unwrap();
    let sut = PostgresCascadeLock::new(pool);

    let guard = sut.acquire().await.unwrap();
    let blocked = tokio::time::timeout(Duration::from_millis(200), sut.acquire()).await;
    assert!(blocked.is_err());

    guard.release().await.unwrap();
    let acquired = tokio::time::timeout(Duration::from_secs(2), sut.acquire()).await;
    assert!(acquired.is_ok());
}
