//! # Core Service 設定
//!
//! 環境変数から Core Service サーバーの設定を読み込む。
//!
//! 必須項目が未設定、または値が不正な場合は [`ConfigError`] を返す。
//! テストでは [`CoreConfig::from_lookup`] に任意の取得関数を渡して検証する。

use std::{env, str::FromStr, time::Duration};

use thiserror::Error;

/// 設定読み込みエラー
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{0} が設定されていません（.env を確認してください）")]
    Missing(&'static str),

    #[error("{name} の値が不正です: {value:?}（{reason}）")]
    Invalid {
        name:   &'static str,
        value:  String,
        reason: String,
    },
}

/// Core Service サーバーの設定
#[derive(Debug, Clone)]
pub struct CoreConfig {
    /// バインドアドレス
    pub host:         String,
    /// ポート番号
    pub port:         u16,
    /// データベース接続 URL
    pub database_url: String,
    pub storage:      StorageConfig,
    pub cascade:      CascadeConfig,
    pub sweep:        SweepConfig,
}

/// 外部ストレージの設定
#[derive(Debug, Clone)]
pub struct StorageConfig {
    /// S3 エンドポイント URL（MinIO 使用時に設定、未設定で AWS S3 デフォルト）
    pub s3_endpoint_url:    Option<String>,
    /// S3 バケット名
    pub s3_bucket_name:     String,
    /// 動画配信サービスの API ベース URL
    pub video_api_base_url: String,
    pub video_library_id:   String,
    pub video_api_key:      String,
    /// 外部呼び出し 1 回あたりのタイムアウト
    pub call_timeout:       Duration,
}

/// カスケード削除の設定
#[derive(Debug, Clone)]
pub struct CascadeConfig {
    /// 1 ステップ内で並行に発行する外部参照削除の上限
    pub external_concurrency: usize,
}

/// 孤立ファイル掃除の設定
#[derive(Debug, Clone)]
pub struct SweepConfig {
    pub enabled:  bool,
    pub interval: Duration,
    /// この期間より新しいファイルは参照されていなくても削除しない
    pub grace:    Duration,
    /// 掃除対象とするオブジェクトストレージのプレフィックス
    pub prefix:   String,
}

impl CoreConfig {
    /// 環境変数から設定を読み込む
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// 任意の取得関数から設定を読み込む
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let vars = Vars { lookup };

        Ok(Self {
            host:         vars.or("CORE_HOST", "0.0.0.0"),
            port:         vars.parse_required("CORE_PORT")?,
            database_url: vars.required("DATABASE_URL")?,
            storage:      StorageConfig {
                s3_endpoint_url:    vars.optional("S3_ENDPOINT_URL"),
                s3_bucket_name:     vars.required("S3_BUCKET_NAME")?,
                video_api_base_url: vars.or("VIDEO_API_BASE_URL", "https://video.bunnycdn.com"),
                video_library_id:   vars.required("VIDEO_LIBRARY_ID")?,
                video_api_key:      vars.required("VIDEO_API_KEY")?,
                call_timeout:       Duration::from_millis(
                    vars.parse_or("EXTERNAL_CALL_TIMEOUT_MS", 10_000)?,
                ),
            },
            cascade:      CascadeConfig {
                external_concurrency: vars.positive_or("CASCADE_EXTERNAL_CONCURRENCY", 8)?,
            },
            sweep:        SweepConfig {
                enabled:  vars.parse_or("ORPHAN_SWEEP_ENABLED", false)?,
                interval: Duration::from_secs(
                    vars.positive_or("ORPHAN_SWEEP_INTERVAL_SECS", 86_400)?,
                ),
                grace:    Duration::from_secs(vars.parse_or("ORPHAN_SWEEP_GRACE_SECS", 86_400)?),
                prefix:   vars.or("ORPHAN_SWEEP_PREFIX", ""),
            },
        })
    }
}

struct Vars<F> {
    lookup: F,
}

impl<F: Fn(&str) -> Option<String>> Vars<F> {
    fn optional(&self, name: &'static str) -> Option<String> {
        (self.lookup)(name).filter(|v| !v.trim().is_empty())
    }

    fn or(&self, name: &'static str, default: &str) -> String {
        self.optional(name).unwrap_or_else(|| default.to_string())
    }

    fn required(&self, name: &'static str) -> Result<String, ConfigError> {
        self.optional(name).ok_or(ConfigError::Missing(name))
    }

    fn parse_value<T>(name: &'static str, value: String) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        value.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            name,
            reason: e.to_string(),
            value,
        })
    }

    fn parse_required<T>(&self, name: &'static str) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        Self::parse_value(name, self.required(name)?)
    }

    fn parse_or<T>(&self, name: &'static str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        match self.optional(name) {
            Some(value) => Self::parse_value(name, value),
            None => Ok(default),
        }
    }

    /// 0 を許可しない数値
    fn positive_or<T>(&self, name: &'static str, default: T) -> Result<T, ConfigError>
    where
        T: FromStr + PartialEq + Default,
        T::Err: std::fmt::Display,
    {
        let value = self.parse_or(name, default)?;
        if value == T::default() {
            return Err(ConfigError::Invalid {
                name,
                value: "0".to_string(),
                reason: "1 以上である必要があります".to_string(),
            });
        }
        Ok(value)
    }
}
