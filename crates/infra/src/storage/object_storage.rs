//! # オブジェクトストレージ
//!
//! Amazon S3 / MinIO 上のオブジェクトの削除と一覧取得を行う。
//!
//! ## 設計方針
//!
//! - **ローカル開発**: MinIO を使用（`S3_ENDPOINT_URL` で接続先を指定）
//! - **本番環境**: IAM ロールによる認証で Amazon S3 に接続（`S3_ENDPOINT_URL` 未設定）
//! - **削除は 1 回の呼び出し**: `DeleteObject` のみを発行し、事前の `HeadObject` や再試行は行わない
//!
//! S3 の `DeleteObject` は存在しないキーに対しても 204 を返すため、通常 `NotFound` にはならない。
//! `NoSuchKey` を返す S3 互換実装に対してのみ `NotFound` になる。

use async_trait::async_trait;
use aws_sdk_s3::{
    Client,
    config::http::HttpResponse,
    error::{DisplayErrorContext, ProvideErrorMetadata, SdkError},
};
use chrono::{DateTime, Utc};

use super::{DeleteResult, ListPage, StoredObject};
use crate::error::InfraError;

/// オブジェクトストレージのインターフェース
///
/// テスト時はモックに差し替え可能。
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// オブジェクトを削除する
    async fn delete_object(&self, key: &str) -> DeleteResult;

    /// プレフィックス配下のオブジェクトを 1 ページ分列挙する
    ///
    /// `cursor` は前のページの [`ListPage::next_cursor`]。
    async fn list_objects_page(
        &self,
        prefix: &str,
        cursor: Option<&str>,
    ) -> Result<ListPage, InfraError>;
}

/// S3 オブジェクトストレージ
///
/// `aws-sdk-s3` を使用した [`ObjectStorage`] の実装。MinIO とも互換動作する。
pub struct S3ObjectStorage {
    client:      Client,
    bucket_name: String,
}

impl S3ObjectStorage {
    pub fn new(client: Client, bucket_name: String) -> Self {
        Self {
            client,
            bucket_name,
        }
    }
}

#[async_trait]
impl ObjectStorage for S3ObjectStorage {
    #[tracing::instrument(skip(self), fields(bucket = %self.bucket_name))]
    async fn delete_object(&self, key: &str) -> DeleteResult {
        let result = self
            .client
            .delete_object()
            .bucket(&self.bucket_name)
            .key(key)
            .send()
            .await;

        match result {
            Ok(_) => DeleteResult::Ok,
            Err(err) => classify_sdk_error(&err),
        }
    }

    #[tracing::instrument(skip(self), fields(bucket = %self.bucket_name))]
    async fn list_objects_page(
        &self,
        prefix: &str,
        cursor: Option<&str>,
    ) -> Result<ListPage, InfraError> {
        let mut list = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket_name)
            .prefix(prefix);

        if let Some(token) = cursor {
            list = list.continuation_token(token);
        }

        let output = list
            .send()
            .await
            .map_err(|e| InfraError::object_storage(format!("オブジェクト一覧の取得に失敗: {e}")))?;

        let objects = output
            .contents()
            .iter()
            .filter_map(|obj| {
                let key = obj.key()?;
                let modified = obj.last_modified()?;
                let last_modified =
                    DateTime::<Utc>::from_timestamp(modified.secs(), modified.subsec_nanos())?;
                Some(StoredObject::new(key, last_modified))
            })
            .collect();

        let next_cursor = if output.is_truncated() == Some(true) {
            output.next_continuation_token().map(String::from)
        } else {
            None
        };
        Ok(ListPage {
            objects,
            next_cursor,
        })
    }
}

/// SDK のエラーを削除結果に分類する
fn classify_sdk_error<E>(err: &SdkError<E, HttpResponse>) -> DeleteResult
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
{
    let detail = DisplayErrorContext(err).to_string();
    match err {
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) | SdkError::ResponseError(_) => {
            DeleteResult::TransientError(detail)
        }
        SdkError::ServiceError(service) => {
            if service.err().code() == Some("NoSuchKey") {
                return DeleteResult::NotFound;
            }
            DeleteResult::from_status(service.raw().status().as_u16(), detail)
        }
        _ => DeleteResult::PermanentError(detail),
    }
}

/// S3 クライアントを作成する
///
/// `endpoint` が `Some` の場合は MinIO 等のカスタムエンドポイントに接続する。
/// `None` の場合は AWS S3 のデフォルトエンドポイントを使用する。
///
/// 認証情報は SDK のデフォルト認証チェーンで解決する:
/// - ローカル: 環境変数 `AWS_ACCESS_KEY_ID` / `AWS_SECRET_ACCESS_KEY`（`.env` で設定）
/// - 本番: IAM ロール
pub async fn create_client(endpoint: Option<&str>) -> Client {
    let mut config_builder = aws_config::defaults(aws_config::BehaviorVersion::latest())
        .region(aws_config::Region::new("ap-northeast-1"));

    if let Some(endpoint_url) = endpoint {
        config_builder = config_builder.endpoint_url(endpoint_url);
    }

    let config = config_builder.load().await;

    // MinIO はパススタイルが必要（バーチャルホスト型 URL を使わない）
    let s3_config_builder = aws_sdk_s3::config::Builder::from(&config);
    let s3_config = if endpoint.is_some() {
        s3_config_builder.force_path_style(true).build()
    } else {
        s3_config_builder.build()
    };

    Client::from_conf(s3_config)
}
