//! # 動画配信サービス
//!
//! レッスン動画とライブ録画を保持する動画配信サービスの HTTP API クライアント。
//!
//! ## エンドポイント
//!
//! - `DELETE {base_url}/library/{library_id}/videos/{video_id}` - 動画を削除する
//! - `GET {base_url}/library/{library_id}/videos?page={n}&itemsPerPage={m}` - 動画を列挙する
//!
//! 認証は `AccessKey` ヘッダーで行う。

use async_trait::async_trait;
use chrono::NaiveDateTime;
use serde::Deserialize;

use super::{DeleteResult, ListPage, StoredObject};
use crate::error::InfraError;

/// 一覧取得のページサイズ
const ITEMS_PER_PAGE: u32 = 100;

/// 動画配信サービスのインターフェース
///
/// テスト時はモックに差し替え可能。
#[async_trait]
pub trait VideoService: Send + Sync {
    /// 動画を削除する
    async fn delete_video(&self, video_id: &str) -> DeleteResult;

    /// ライブラリ内の動画を 1 ページ分列挙する
    ///
    /// `cursor` は前のページの [`ListPage::next_cursor`]（`None` なら先頭ページ）。
    async fn list_videos_page(&self, cursor: Option<&str>) -> Result<ListPage, InfraError>;
}

/// 動画一覧のページ
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoPage {
    total_items: u64,
    items:       Vec<VideoItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct VideoItem {
    guid:          String,
    /// タイムゾーンなしの UTC 時刻（例: `2024-05-01T09:30:00`）
    date_uploaded: NaiveDateTime,
}

/// HTTP 動画配信サービスクライアント
pub struct HttpVideoService {
    base_url:   String,
    library_id: String,
    api_key:    String,
    client:     reqwest::Client,
}

impl HttpVideoService {
    /// 新しいクライアントを作成する
    ///
    /// # 引数
    ///
    /// - `base_url`: API のベース URL（例: `https://video.bunnycdn.com`）
    /// - `library_id`: 動画ライブラリ ID
    /// - `api_key`: `AccessKey` ヘッダーに設定する API キー
    pub fn new(base_url: &str, library_id: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url:   base_url.trim_end_matches('/').to_string(),
            library_id: library_id.into(),
            api_key:    api_key.into(),
            client:     reqwest::Client::new(),
        }
    }

    fn videos_url(&self) -> String {
        format!("{}/library/{}/videos", self.base_url, self.library_id)
    }
}

#[async_trait]
impl VideoService for HttpVideoService {
    #[tracing::instrument(skip(self), fields(library_id = %self.library_id))]
    async fn delete_video(&self, video_id: &str) -> DeleteResult {
        let url = format!("{}/{}", self.videos_url(), video_id);
        let response = self
            .client
            .delete(&url)
            .header("AccessKey", &self.api_key)
            .send()
            .await;

        match response {
            Ok(response) => {
                let status = response.status();
                if status.is_success() {
                    return DeleteResult::Ok;
                }
                let body = response.text().await.unwrap_or_default();
                DeleteResult::from_status(status.as_u16(), format!("{status}: {body}"))
            }
            Err(err) if err.is_connect() || err.is_timeout() || err.is_request() => {
                DeleteResult::TransientError(err.to_string())
            }
            Err(err) => DeleteResult::PermanentError(err.to_string()),
        }
    }

    #[tracing::instrument(skip(self), fields(library_id = %self.library_id))]
    async fn list_videos_page(&self, cursor: Option<&str>) -> Result<ListPage, InfraError> {
        let page = parse_page_cursor(cursor)?;
        let response = self
            .client
            .get(self.videos_url())
            .header("AccessKey", &self.api_key)
            .query(&[("page", page), ("itemsPerPage", ITEMS_PER_PAGE)])
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| InfraError::video_service(format!("動画一覧の取得に失敗: {e}")))?;

        let body = response
            .json::<VideoPage>()
            .await
            .map_err(|e| InfraError::video_service(format!("動画一覧の解析に失敗: {e}")))?;

        Ok(body.into_list_page(page))
    }
}

/// ページ番号のカーソルを解析する（先頭は 1）
fn parse_page_cursor(cursor: Option<&str>) -> Result<u32, InfraError> {
    match cursor {
        None => Ok(1),
        Some(cursor) => cursor
            .parse()
            .map_err(|_| InfraError::video_service(format!("不正なページカーソル: {cursor}"))),
    }
}

impl VideoPage {
    fn into_list_page(self, page: u32) -> ListPage {
        let fetched_so_far = u64::from(page) * u64::from(ITEMS_PER_PAGE);
        let next_cursor = (!self.items.is_empty() && fetched_so_far < self.total_items)
            .then(|| (page + 1).to_string());
        ListPage {
            objects: self
                .items
                .into_iter()
                .map(|item| StoredObject::new(item.guid, item.date_uploaded.and_utc()))
                .collect(),
            next_cursor,
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_ベースurlの末尾スラッシュを取り除く() {
        let service = HttpVideoService::new("https://video.example.com/", "42", "key");

        assert_eq!(service.videos_url(), "https://video.example.com/library/42/videos");
    }

    #[test]
    fn test_動画一覧のページをデシリアライズできる() {
        let json = r#"{
            "totalItems": 1,
            "currentPage": 1,
            "itemsPerPage": 100,
            "items": [
                { "guid": "a1b2c3d4-e5f6-4a7b-8c9d-0e1f2a3b4c5d", "dateUploaded": "2024-05-01T09:30:00", "title": "intro" }
            ]
        }"#;

        let page: VideoPage = serde_json::from_str(json).unwrap();

        assert_eq!(page.total_items, 1);
        assert_eq!(page.items[0].guid, "a1b2c3d4-e5f6-4a7b-8c9d-0e1f2a3b4c5d");
        assert_eq!(
            page.items[0].date_uploaded.and_utc().to_rfc3339(),
            "2024-05-01T09:30:00+00:00"
        );
    }

    #[test]
    fn test_総件数に達していなければ次のページ番号をカーソルにする() {
        let json = r#"{ "totalItems": 250, "items": [
            { "guid": "a1b2c3d4-e5f6-4a7b-8c9d-0e1f2a3b4c5d", "dateUploaded": "2024-05-01T09:30:00" }
        ] }"#;

        let second: VideoPage = serde_json::from_str(json).unwrap();
        let third: VideoPage = serde_json::from_str(json).unwrap();

        assert_eq!(second.into_list_page(2).next_cursor, Some("3".to_string()));
        assert_eq!(third.into_list_page(3).next_cursor, None);
    }

    #[test]
    fn test_ページカーソルは数値でなければエラー() {
        assert_eq!(parse_page_cursor(None).unwrap(), 1);
        assert_eq!(parse_page_cursor(Some("4")).unwrap(), 4);
        assert!(parse_page_cursor(Some("next")).is_err());
    }
}
