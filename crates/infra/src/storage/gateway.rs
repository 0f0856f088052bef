//! # StorageGateway
//!
//! 外部参照の削除と一覧取得の窓口。
//!
//! - 空キーはネットワーク呼び出しなしで `Ok`
//! - 1 回の呼び出しにつきリモート呼び出しは 1 回（再試行しない）
//! - 各呼び出しにタイムアウトを適用し、超過は `TransientError`
//! - 一覧取得はページ単位で同じタイムアウトを適用する

use std::{future::Future, sync::Arc, time::Duration};

use learnhub_domain::reference::ExternalReference;
use learnhub_shared::event_log::error::{category, kind};

use super::{DeleteResult, ObjectStorage, ReferenceBackend, StoredObject, VideoService};
use crate::error::InfraError;

/// 外部ストレージゲートウェイ
#[derive(Clone)]
pub struct StorageGateway {
    objects:      Arc<dyn ObjectStorage>,
    videos:       Arc<dyn VideoService>,
    call_timeout: Duration,
}

impl StorageGateway {
    pub fn new(
        objects: Arc<dyn ObjectStorage>,
        videos: Arc<dyn VideoService>,
        call_timeout: Duration,
    ) -> Self {
        Self {
            objects,
            videos,
            call_timeout,
        }
    }

    /// オブジェクトストレージ上のオブジェクトを削除する
    #[tracing::instrument(skip(self))]
    pub async fn delete_object(&self, key: &str) -> DeleteResult {
        if key.trim().is_empty() {
            return DeleteResult::Ok;
        }
        self.delete_with_timeout(kind::OBJECT_STORAGE, self.objects.delete_object(key))
            .await
    }

    /// 動画配信サービス上の動画を削除する
    #[tracing::instrument(skip(self))]
    pub async fn delete_video(&self, video_id: &str) -> DeleteResult {
        if video_id.trim().is_empty() {
            return DeleteResult::Ok;
        }
        self.delete_with_timeout(kind::VIDEO_SERVICE, self.videos.delete_video(video_id))
            .await
    }

    /// キーの形式から削除先を判定して削除する
    ///
    /// 参照の種類（image / video / file）ではなくキーの形式で判定する。
    /// 動画カラムにオブジェクトのパスが入っている場合もオブジェクトストレージへ送る。
    pub async fn delete(&self, reference: &ExternalReference) -> DeleteResult {
        match ReferenceBackend::detect(&reference.key) {
            ReferenceBackend::ObjectStorage => self.delete_object(&reference.key).await,
            ReferenceBackend::VideoService => self.delete_video(&reference.key).await,
        }
    }

    /// プレフィックス配下のオブジェクトを列挙する
    ///
    /// タイムアウトはページごとに適用する。全体の所要時間はページ数に比例する。
    pub async fn list_objects(&self, prefix: &str) -> Result<Vec<StoredObject>, InfraError> {
        let mut objects = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let page = tokio::time::timeout(
                self.call_timeout,
                self.objects.list_objects_page(prefix, cursor.as_deref()),
            )
            .await
            .map_err(|_| {
                InfraError::object_storage(format!(
                    "オブジェクト一覧のページ取得がタイムアウトしました（{}ms）",
                    self.call_timeout.as_millis()
                ))
            })??;

            objects.extend(page.objects);
            match page.next_cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }
        Ok(objects)
    }

    /// 動画ライブラリ内の動画を列挙する
    ///
    /// タイムアウトはページごとに適用する。
    pub async fn list_videos(&self) -> Result<Vec<StoredObject>, InfraError> {
        let mut videos = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let page = tokio::time::timeout(
                self.call_timeout,
                self.videos.list_videos_page(cursor.as_deref()),
            )
            .await
            .map_err(|_| {
                InfraError::video_service(format!(
                    "動画一覧のページ取得がタイムアウトしました（{}ms）",
                    self.call_timeout.as_millis()
                ))
            })??;

            videos.extend(page.objects);
            match page.next_cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }
        Ok(videos)
    }

    async fn delete_with_timeout(
        &self,
        backend: &'static str,
        call: impl Future<Output = DeleteResult>,
    ) -> DeleteResult {
        match tokio::time::timeout(self.call_timeout, call).await {
            Ok(result) => {
                if let Some(detail) = result.failure_detail() {
                    tracing::warn!(
                        error.category = category::EXTERNAL_SERVICE,
                        error.kind = backend,
                        transient = result.is_transient(),
                        "外部ストレージの削除に失敗: {}",
                        detail
                    );
                }
                result
            }
            Err(_) => {
                tracing::warn!(
                    error.category = category::EXTERNAL_SERVICE,
                    error.kind = backend,
                    timeout_ms = self.call_timeout.as_millis() as u64,
                    "外部ストレージの削除がタイムアウト"
                );
                DeleteResult::TransientError(format!(
                    "タイムアウトしました（{}ms）",
                    self.call_timeout.as_millis()
                ))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::mock::{MockObjectStorage, MockVideoService};

    const VIDEO_ID: &str = "a1b2c3d4-e5f6-4a7b-8c9d-0e1f2a3b4c5d";

    fn gateway(
        objects: &Arc<MockObjectStorage>,
        videos: &Arc<MockVideoService>,
    ) -> StorageGateway {
        StorageGateway::new(objects.clone(), videos.clone(), Duration::from_millis(500))
    }

    #[tokio::test]
    async fn test_空キーはリモート呼び出しなしで成功する() {
        let objects = Arc::new(MockObjectStorage::new());
        let videos = Arc::new(MockVideoService::new());
        let sut = gateway(&objects, &videos);

        assert_eq!(sut.delete_object("").await, DeleteResult::Ok);
        assert_eq!(sut.delete_video("  ").await, DeleteResult::Ok);

        assert!(objects.delete_calls().is_empty());
        assert!(videos.delete_calls().is_empty());
    }

    #[tokio::test]
    async fn test_uuid形式のキーは動画サービスに送る() {
        let objects = Arc::new(MockObjectStorage::new());
        let videos = Arc::new(MockVideoService::new());
        videos.put(VIDEO_ID, chrono::Utc::now());
        let sut = gateway(&objects, &videos);

        let reference = ExternalReference::new(
            learnhub_domain::reference::ReferenceKind::Video,
            VIDEO_ID,
        );
        let result = sut.delete(&reference).await;

        assert_eq!(result, DeleteResult::Ok);
        assert_eq!(videos.delete_calls(), vec![VIDEO_ID.to_string()]);
        assert!(objects.delete_calls().is_empty());
    }

    #[tokio::test]
    async fn test_パス形式のキーはオブジェクトストレージに送る() {
        let objects = Arc::new(MockObjectStorage::new());
        let videos = Arc::new(MockVideoService::new());
        let sut = gateway(&objects, &videos);

        let reference = ExternalReference::new(
            learnhub_domain::reference::ReferenceKind::Image,
            "courses/c1/thumb.png",
        );
        let result = sut.delete(&reference).await;

        assert_eq!(result, DeleteResult::NotFound);
        assert_eq!(objects.delete_calls(), vec!["courses/c1/thumb.png".to_string()]);
        assert!(videos.delete_calls().is_empty());
    }

    #[tokio::test]
    async fn test_プロバイダの失敗はそのまま返す() {
        let objects = Arc::new(MockObjectStorage::new());
        objects.fail_key("pages/p1/cover.png", DeleteResult::PermanentError("403".to_string()));
        let videos = Arc::new(MockVideoService::new());
        let sut = gateway(&objects, &videos);

        let result = sut.delete_object("pages/p1/cover.png").await;

        assert_eq!(result, DeleteResult::PermanentError("403".to_string()));
        assert_eq!(objects.delete_calls().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_タイムアウトはtransient_errorになる() {
        let objects = Arc::new(MockObjectStorage::new());
        let videos = Arc::new(MockVideoService::new().with_delay(Duration::from_secs(5)));
        let sut = gateway(&objects, &videos);

        let result = sut.delete_video(VIDEO_ID).await;

        assert!(result.is_transient(), "{result}");
    }

    #[tokio::test]
    async fn test_一覧取得はモックの保存内容を返す() {
        let objects = Arc::new(MockObjectStorage::new());
        let now = chrono::Utc::now();
        objects.put("uploads/a.png", now);
        objects.put("other/b.png", now);
        let videos = Arc::new(MockVideoService::new());
        let sut = gateway(&objects, &videos);

        let listed = sut.list_objects("uploads/").await.unwrap();

        assert_eq!(listed, vec![StoredObject::new("uploads/a.png", now)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_タイムアウトはページごとに適用する() {
        // Given: 1 ページ 300ms、3 ページで合計 900ms（タイムアウト 500ms を超える）
        let objects = Arc::new(
            MockObjectStorage::new()
                .with_delay(Duration::from_millis(300))
                .with_page_size(2),
        );
        let now = chrono::Utc::now();
        for key in ["uploads/a", "uploads/b", "uploads/c", "uploads/d", "uploads/e"] {
            objects.put(key, now);
        }
        let videos = Arc::new(MockVideoService::new());
        let sut = gateway(&objects, &videos);

        // When
        let listed = sut.list_objects("uploads/").await.unwrap();

        // Then
        let keys: Vec<&str> = listed.iter().map(|object| object.key.as_str()).collect();
        assert_eq!(
            keys,
            vec!["uploads/a", "uploads/b", "uploads/c", "uploads/d", "uploads/e"]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_1ページの取得がタイムアウトすると一覧はエラー() {
        let objects = Arc::new(MockObjectStorage::new());
        let videos = Arc::new(
            MockVideoService::new()
                .with_delay(Duration::from_secs(5))
                .with_page_size(10),
        );
        videos.put(VIDEO_ID, chrono::Utc::now());
        let sut = gateway(&objects, &videos);

        let result = sut.list_videos().await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_動画一覧は全ページを連結する() {
        let objects = Arc::new(MockObjectStorage::new());
        let videos = Arc::new(MockVideoService::new().with_page_size(1));
        let now = chrono::Utc::now();
        videos.put(VIDEO_ID, now);
        videos.put("f0e1d2c3-b4a5-4968-8776-655443322110", now);
        let sut = gateway(&objects, &videos);

        let listed = sut.list_videos().await.unwrap();

        assert_eq!(listed.len(), 2);
    }
}
