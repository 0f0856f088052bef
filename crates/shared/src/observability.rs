//! # Observability 基盤
//!
//! トレーシング初期化とログ出力の設定を提供する。
//!
//! | 環境変数 | 内容 | 未設定時 |
//! |---------|------|---------|
//! | `LOG_FORMAT` | `json` / `pretty` | `pretty` |
//! | `RUST_LOG` | `EnvFilter` のディレクティブ | [`DEFAULT_FILTER`] |
//!
//! `tracing_error::ErrorLayer` を登録するため、インフラ層のエラーが生成時に
//! 捕捉する `SpanTrace` には呼び出し元のスパン（カスケード対象、ステップ名など）が含まれる。

/// `RUST_LOG` 未設定時のフィルタ
///
/// カスケードの各ステップは debug で出力する。sqlx のクエリログは warn 以上に絞る。
pub const DEFAULT_FILTER: &str = "info,learnhub=debug,sqlx=warn";

/// ログ出力形式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// JSON 形式（ログ基盤で `event.*` / `error.*` フィールドを集計する）
    Json,
    #[default]
    Pretty,
}

impl LogFormat {
    /// 文字列からログ形式をパースする
    ///
    /// 大文字小文字は区別しない。不正な値は `None`。
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Some(Self::Json),
            "pretty" => Some(Self::Pretty),
            _ => None,
        }
    }
}

/// トレーシング初期化設定
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TracingConfig {
    pub log_format:      LogFormat,
    /// `EnvFilter` のディレクティブ
    pub filter:          String,
    /// `LOG_FORMAT` が不正だった場合の値（初期化後に警告として出力する）
    pub rejected_format: Option<String>,
}

impl TracingConfig {
    /// 環境変数の値から設定を組み立てる
    pub fn from_values(log_format: Option<&str>, rust_log: Option<&str>) -> Self {
        let parsed = log_format.map(|raw| (raw, LogFormat::parse(raw)));
        let rejected_format = match parsed {
            Some((raw, None)) => Some(raw.to_string()),
            _ => None,
        };
        Self {
            log_format: parsed.and_then(|(_, format)| format).unwrap_or_default(),
            filter: rust_log
                .map(str::trim)
                .filter(|directives| !directives.is_empty())
                .unwrap_or(DEFAULT_FILTER)
                .to_string(),
            rejected_format,
        }
    }

    /// `LOG_FORMAT` と `RUST_LOG` から読み取る
    pub fn from_env() -> Self {
        let log_format = std::env::var("LOG_FORMAT").ok();
        let rust_log = std::env::var("RUST_LOG").ok();
        Self::from_values(log_format.as_deref(), rust_log.as_deref())
    }
}

/// トレーシングを初期化する
///
/// JSON モードではイベントのフィールドをトップレベルに展開し、現在のスパン
/// （`cascade` や `sweep` など）を `span` として出力する。
/// フィルタのディレクティブが不正な場合は [`DEFAULT_FILTER`] で初期化する。
#[cfg(feature = "observability")]
pub fn init_tracing(config: TracingConfig) {
    use tracing_subscriber::{EnvFilter, Layer as _, layer::SubscriberExt, util::SubscriberInitExt};

    let (env_filter, filter_error) = match EnvFilter::try_new(&config.filter) {
        Ok(filter) => (filter, None),
        Err(e) => (EnvFilter::new(DEFAULT_FILTER), Some(e)),
    };

    let fmt_layer = match config.log_format {
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .flatten_event(true)
            .with_target(true)
            .with_current_span(true)
            .with_span_list(false)
            .boxed(),
        LogFormat::Pretty => tracing_subscriber::fmt::layer().boxed(),
    };

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt_layer)
        .with(tracing_error::ErrorLayer::default())
        .init();

    if let Some(raw) = &config.rejected_format {
        tracing::warn!("不明な LOG_FORMAT です。pretty で出力します: {}", raw);
    }
    if let Some(e) = filter_error {
        tracing::warn!(
            "RUST_LOG を解釈できません。{} で出力します: {}",
            DEFAULT_FILTER,
            e
        );
    }
}
