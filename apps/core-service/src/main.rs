//! # Core Service サーバー
//!
//! LearnHub のエンティティ削除を担当する内部サービス。
//!
//! ## 役割
//!
//! - **カスケード削除**: コース、ユーザーなどを依存レコードと外部ファイルごと削除する
//! - **削除プレビュー**: 削除される件数と実行順を削除前に確認する
//! - **孤立ファイル掃除**: どのレコードからも参照されないファイルを定期的に回収する
//!
//! ## アクセス制御
//!
//! Core Service は内部ネットワークからのみアクセス可能とする。
//! 外部からのリクエストは BFF を経由し、操作者は `X-Actor-Id` / `X-Actor-Role`
//! ヘッダーで渡される。
//!
//! ```text
//! ┌──────────────┐     ┌──────────────┐     ┌──────────────┐
//! │   Internet   │──X──│Core Service  │────▶│  PostgreSQL  │
//! └──────────────┘     └──────────────┘     └──────────────┘
//!                        ↑          │
//!                 内部ネットワークのみ  └────▶ S3 / 動画配信サービス
//!                        ↓
//!                 ┌──────────────┐
//!                 │     BFF      │
//!                 └──────────────┘
//! ```
//!
//! ## 環境変数
//!
//! | 変数名 | 必須 | 説明 |
//! |--------|------|------|
//! | `CORE_HOST` | No | バインドアドレス（デフォルト: `0.0.0.0`） |
//! | `CORE_PORT` | **Yes** | ポート番号 |
//! | `DATABASE_URL` | **Yes** | PostgreSQL 接続 URL |
//! | `S3_ENDPOINT_URL` | No | S3 エンドポイント（MinIO 使用時） |
//! | `S3_BUCKET_NAME` | **Yes** | アセットを保存するバケット |
//! | `VIDEO_API_BASE_URL` | No | 動画配信サービスの API ベース URL |
//! | `VIDEO_LIBRARY_ID` | **Yes** | 動画ライブラリ ID |
//! | `VIDEO_API_KEY` | **Yes** | 動画配信サービスの API キー |
//! | `EXTERNAL_CALL_TIMEOUT_MS` | No | 外部呼び出しのタイムアウト（デフォルト: 10000） |
//! | `CASCADE_EXTERNAL_CONCURRENCY` | No | 外部ファイル削除の並行数（デフォルト: 8） |
//! | `ORPHAN_SWEEP_ENABLED` | No | 孤立ファイル掃除の定期実行（デフォルト: false） |
//! | `ORPHAN_SWEEP_INTERVAL_SECS` | No | 掃除の実行間隔（デフォルト: 86400） |
//! | `ORPHAN_SWEEP_GRACE_SECS` | No | 削除しない新しいファイルの猶予（デフォルト: 86400） |
//! | `ORPHAN_SWEEP_PREFIX` | No | 掃除対象のプレフィックス |
//!
//! ## 起動方法
//!
//! ```bash
//! # 開発環境
//! cargo run -p learnhub-core-service
//!
//! # 本番環境
//! CORE_PORT=3001 DATABASE_URL=postgres://... cargo run -p learnhub-core-service --release
//! ```

use std::{net::SocketAddr, sync::Arc};

use axum::{
    Router,
    routing::{delete, get, post},
};
use learnhub_core_service::{
    config::CoreConfig,
    handler::{
        DeletionState,
        MaintenanceState,
        delete_entity,
        health_check,
        preview_deletion,
        run_orphan_sweep,
    },
    usecase::{
        AdminOnlyPolicy,
        CascadeExecutor,
        DeletionUseCaseImpl,
        EntityGraphReader,
        OrphanSweeper,
    },
};
use learnhub_domain::{clock::SystemClock, deletion::DeletionPlanner, schema::Schema};
use learnhub_infra::{
    PostgresCascadeLock,
    PostgresRecordStore,
    StorageGateway,
    db,
    storage::{HttpVideoService, S3ObjectStorage, create_client},
};
use learnhub_shared::observability::{TracingConfig, init_tracing};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

/// データベース接続プールの最大接続数
///
/// カスケードロックが 1 接続を占有するため、削除の実行とプレビューが並行できる数を確保する。
const MAX_DB_CONNECTIONS: u32 = 10;

/// Core Service サーバーのエントリーポイント
///
/// BFF とは独立した設定（`CORE_HOST`, `CORE_PORT`）を使用する。
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // .env ファイルを読み込む（存在する場合）
    dotenvy::dotenv().ok();

    // トレーシング初期化
    init_tracing(TracingConfig::from_env());

    // 設定読み込み
    let config = CoreConfig::from_env()?;

    tracing::info!(
        "Core Service サーバーを起動します: {}:{}",
        config.host,
        config.port
    );

    // 削除プランの検証（循環があれば起動しない）
    let planner = DeletionPlanner::new(Schema::course_platform());
    planner.validate_all()?;

    // データベース接続プールを作成
    let pool = db::create_pool(&config.database_url, MAX_DB_CONNECTIONS).await?;
    db::run_migrations(&pool).await?;
    tracing::info!("データベースに接続しました");

    // 外部ストレージ
    let s3_client = create_client(config.storage.s3_endpoint_url.as_deref()).await;
    let object_storage = S3ObjectStorage::new(s3_client, config.storage.s3_bucket_name.clone());
    let video_service = HttpVideoService::new(
        &config.storage.video_api_base_url,
        config.storage.video_library_id.clone(),
        config.storage.video_api_key.clone(),
    );
    let storage = StorageGateway::new(
        Arc::new(object_storage),
        Arc::new(video_service),
        config.storage.call_timeout,
    );

    // 依存コンポーネントを初期化
    let store = Arc::new(PostgresRecordStore::new(pool.clone()));
    let lock = Arc::new(PostgresCascadeLock::new(pool.clone()));

    let deletion_usecase = DeletionUseCaseImpl::new(
        planner,
        EntityGraphReader::new(store.clone()),
        CascadeExecutor::new(
            store.clone(),
            storage.clone(),
            config.cascade.external_concurrency,
        ),
        Arc::new(AdminOnlyPolicy),
        lock,
    );
    let deletion_state = Arc::new(DeletionState {
        usecase: Arc::new(deletion_usecase),
    });

    let sweeper = Arc::new(OrphanSweeper::new(
        store,
        storage,
        Arc::new(SystemClock),
        config.sweep.prefix.clone(),
        config.sweep.grace,
    ));
    if config.sweep.enabled {
        sweeper.clone().spawn_periodic(config.sweep.interval);
        tracing::info!(
            "孤立ファイル掃除を定期実行します: {:?} ごと",
            config.sweep.interval
        );
    }
    let maintenance_state = Arc::new(MaintenanceState { sweeper });

    // ルーター構築
    let app = Router::new()
        .route("/health", get(health_check))
        .route("/internal/entities/{kind}/{id}", delete(delete_entity))
        .route(
            "/internal/entities/{kind}/{id}/deletion-preview",
            get(preview_deletion),
        )
        .with_state(deletion_state)
        // メンテナンス API
        .route("/internal/maintenance/orphan-sweep", post(run_orphan_sweep))
        .with_state(maintenance_state)
        .layer(TraceLayer::new_for_http());

    // サーバー起動
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;

    let listener = TcpListener::bind(addr).await?;
    tracing::info!("Core Service サーバーが起動しました: {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
