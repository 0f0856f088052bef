//! # カスケードロック
//!
//! カスケード削除どうしを相互排他にするためのロック。
//!
//! 同じ部分グラフ（例: コースと、そのコースを所有するユーザー）を削除する 2 つの
//! カスケードが同時に走らないようにする。ルート ID ごとのロックでは重なりを判定
//! できないため、1 つのキーで全カスケードを直列化する。
//!
//! 孤立ファイル掃除はこのロックを取得しない。掃除との競合は猶予期間で避ける。
//!
//! ## 実装
//!
//! | 実装 | 範囲 | 用途 |
//! |------|------|------|
//! | [`PostgresCascadeLock`] | 同じ DB を使う全プロセス | 本番 |
//! | [`InProcessCascadeLock`] | 単一プロセス | テスト・ローカル実行 |
//!
//! PostgreSQL 実装はトランザクションスコープの advisory lock を使う。
//! ガードをドロップするとトランザクションがロールバックされ、ロックも解放される。

use std::sync::Arc;

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::error::InfraError;

/// advisory lock のキー（`learnhub` の ASCII を 64bit に詰めたもの）
pub const CASCADE_LOCK_KEY: i64 = 0x6c65_6172_6e68_7562;

/// 取得済みのロック
///
/// ドロップ時に解放される。明示的に解放したい場合は [`CascadeLockGuard::release`] を使う。
#[must_use = "ガードをドロップするとロックが即座に解放される"]
pub enum CascadeLockGuard {
    Postgres(Transaction<'static, Postgres>),
    InProcess(OwnedMutexGuard<()>),
}

impl CascadeLockGuard {
    /// ロックを解放する
    pub async fn release(self) -> Result<(), InfraError> {
        match self {
            Self::Postgres(tx) => tx.commit().await.map_err(InfraError::from),
            Self::InProcess(guard) => {
                drop(guard);
                Ok(())
            }
        }
    }
}

impl std::fmt::Debug for CascadeLockGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Postgres(_) => f.write_str("CascadeLockGuard::Postgres"),
            Self::InProcess(_) => f.write_str("CascadeLockGuard::InProcess"),
        }
    }
}

/// カスケードロックトレイト
#[async_trait]
pub trait CascadeLock: Send + Sync {
    /// ロックを取得する（他の保持者が解放するまで待機する）
    async fn acquire(&self) -> Result<CascadeLockGuard, InfraError>;
}

/// PostgreSQL advisory lock 実装
#[derive(Debug, Clone)]
pub struct PostgresCascadeLock {
    pool: PgPool,
    key:  i64,
}

impl PostgresCascadeLock {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            key: CASCADE_LOCK_KEY,
        }
    }
}

#[async_trait]
impl CascadeLock for PostgresCascadeLock {
    #[tracing::instrument(skip(self), level = "debug")]
    async fn acquire(&self) -> Result<CascadeLockGuard, InfraError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(self.key)
            .execute(&mut *tx)
            .await
            .map_err(|e| InfraError::lock(format!("advisory lock の取得に失敗しました: {e}")))?;

        Ok(CascadeLockGuard::Postgres(tx))
    }
}

/// プロセス内ミューテックス実装
#[derive(Debug, Clone, Default)]
pub struct InProcessCascadeLock {
    inner: Arc<Mutex<()>>,
}

impl InProcessCascadeLock {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CascadeLock for InProcessCascadeLock {
    async fn acquire(&self) -> Result<CascadeLockGuard, InfraError> {
        Ok(CascadeLockGuard::InProcess(
            Arc::clone(&self.inner).lock_owned().await,
        ))
    }
}
