//! # OrphanSweeper（孤立ファイル掃除）
//!
//! どのレコードからも参照されていない外部ストレージ上のファイルを削除する。
//! カスケード削除で削除に失敗した参照や、アップロード後にレコードが作られなかった
//! ファイルを最終的に回収する。
//!
//! ## フェーズ
//!
//! 1. オブジェクトストレージ（プレフィックス配下）と動画ライブラリの一覧を取得する
//! 2. 現存するレコードが参照しているキーの集合を取得し、差分を候補とする
//! 3. 猶予期間より新しいファイルは候補から外す（アップロード直後でレコード作成前の可能性）
//! 4. 参照キーを読み直し、参照されるようになった候補を外す
//! 5. 残った候補を削除する
//!
//! カスケード削除とはロックを共有しない。実行中のカスケードとの競合は猶予期間と
//! 再確認だけで避けるため、掃除が対話的な削除を待たせることはない。
//!
//! 削除の失敗は件数として報告し、次回の掃除で再試行される。

use std::{collections::HashSet, sync::Arc, time::Duration};

use learnhub_domain::clock::Clock;
use learnhub_infra::{
    RecordStore,
    StorageGateway,
    storage::{ReferenceBackend, StoredObject},
};
use learnhub_shared::{event_log::event, log_business_event};
use serde::Serialize;
use tokio::{task::JoinHandle, time::MissedTickBehavior};

use crate::error::CoreError;

/// 掃除の結果
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    /// 一覧で見つかったファイル数
    pub scanned:              usize,
    pub deleted:              usize,
    /// 参照されていないが猶予期間内のため残したファイル数
    pub skipped_recent:       usize,
    /// 再確認で参照が見つかったため残したファイル数
    pub rechecked_referenced: usize,
    pub failed:               usize,
}

/// 削除候補
#[derive(Debug, Clone)]
struct Candidate {
    backend: ReferenceBackend,
    object:  StoredObject,
}

/// 孤立ファイル掃除
pub struct OrphanSweeper {
    store:   Arc<dyn RecordStore>,
    storage: StorageGateway,
    clock:   Arc<dyn Clock>,
    prefix:  String,
    grace:   Duration,
}

impl OrphanSweeper {
    pub fn new(
        store: Arc<dyn RecordStore>,
        storage: StorageGateway,
        clock: Arc<dyn Clock>,
        prefix: impl Into<String>,
        grace: Duration,
    ) -> Self {
        Self {
            store,
            storage,
            clock,
            prefix: prefix.into(),
            grace,
        }
    }

    /// 掃除を 1 回実行する
    ///
    /// # Errors
    ///
    /// - `CoreError::Database`: 一覧取得または参照キーの取得に失敗した
    /// - `CoreError::Internal`: 猶予期間が時刻として表現できない
    #[tracing::instrument(skip(self), fields(prefix = %self.prefix))]
    pub async fn sweep(&self) -> Result<SweepReport, CoreError> {
        let stored = self.list_stored().await?;
        let mut report = SweepReport {
            scanned: stored.len(),
            ..SweepReport::default()
        };

        let referenced = self.store.list_referenced_keys().await?;
        let grace = chrono::Duration::from_std(self.grace)
            .map_err(|e| CoreError::Internal(format!("猶予期間が不正です: {e}")))?;
        let cutoff = self.clock.now() - grace;

        let mut candidates = Vec::new();
        for candidate in stored {
            if referenced.contains(&candidate.object.key) {
                continue;
            }
            if candidate.object.last_modified > cutoff {
                report.skipped_recent += 1;
                continue;
            }
            candidates.push(candidate);
        }

        if !candidates.is_empty() {
            self.delete_candidates(candidates, &mut report).await?;
        }

        let result = if report.failed == 0 {
            event::result::SUCCESS
        } else {
            event::result::PARTIAL
        };
        log_business_event!(
            event.category = event::category::MAINTENANCE,
            event.action = event::action::ORPHAN_SWEEP_COMPLETED,
            event.result = result,
            sweep.scanned = report.scanned,
            sweep.deleted = report.deleted,
            sweep.skipped_recent = report.skipped_recent,
            sweep.rechecked_referenced = report.rechecked_referenced,
            sweep.failed = report.failed,
            "孤立ファイル掃除が完了"
        );
        Ok(report)
    }

    /// `interval` ごとに掃除を実行するタスクを起動する
    ///
    /// 初回は起動直後ではなく、`interval` の経過後に実行する。
    pub fn spawn_periodic(self: Arc<Self>, interval: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            ticker.tick().await;

            loop {
                ticker.tick().await;
                if let Err(e) = self.sweep().await {
                    let (error_category, error_kind) = e.log_fields();
                    tracing::error!(
                        error.category = error_category,
                        error.kind = error_kind,
                        "孤立ファイル掃除に失敗しました: {}",
                        e
                    );
                }
            }
        })
    }

    async fn list_stored(&self) -> Result<Vec<Candidate>, CoreError> {
        let objects = self.storage.list_objects(&self.prefix).await?;
        let videos = self.storage.list_videos().await?;

        Ok(objects
            .into_iter()
            .map(|object| Candidate {
                backend: ReferenceBackend::ObjectStorage,
                object,
            })
            .chain(videos.into_iter().map(|object| Candidate {
                backend: ReferenceBackend::VideoService,
                object,
            }))
            .collect())
    }

    /// 参照キーを読み直し、残った候補を削除する
    async fn delete_candidates(
        &self,
        candidates: Vec<Candidate>,
        report: &mut SweepReport,
    ) -> Result<(), CoreError> {
        let referenced: HashSet<String> = self.store.list_referenced_keys().await?;

        for candidate in candidates {
            let key = &candidate.object.key;
            if referenced.contains(key) {
                report.rechecked_referenced += 1;
                continue;
            }

            let result = match candidate.backend {
                ReferenceBackend::ObjectStorage => self.storage.delete_object(key).await,
                ReferenceBackend::VideoService => self.storage.delete_video(key).await,
            };
            if result.is_success() {
                tracing::debug!(key = %key, backend = %candidate.backend, "孤立ファイルを削除しました");
                report.deleted += 1;
            } else {
                report.failed += 1;
            }
        }
        Ok(())
    }
}
