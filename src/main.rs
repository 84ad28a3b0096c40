use axum::{
    routing::{get, post},
    Router,
};
use retail_invoice_sync::api::{self, AppState};
use retail_invoice_sync::client::{HttpAccountingClient, HttpCardClient};
use retail_invoice_sync::db::{PgMetadataProvider, PgOrderStore};
use retail_invoice_sync::service::OrderTypeAllowList;
use retail_invoice_sync::{create_pool, AppConfig, OrderOrchestrator};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::fmt::time::ChronoLocal;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load()?;

    // 初始化日志 - 本地时间格式, RUST_LOG 优先于配置
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log.level.clone()));
    tracing_subscriber::fmt()
        .with_timer(ChronoLocal::new("%Y-%m-%d %H:%M:%S".to_string()))
        .with_env_filter(filter)
        .with_target(true)
        .with_level(true)
        .init();

    info!("Starting server with config: {:?}", config.server);

    let pool = create_pool(&config.database).await?;
    info!("Database pool created");

    let accounting = Arc::new(HttpAccountingClient::new(&config.accounting)?);
    let cards = Arc::new(HttpCardClient::new(&config.card_api)?);
    let allow_list = Arc::new(OrderTypeAllowList::new(config.sync.ordinary_labels.clone()));

    let orchestrator = Arc::new(OrderOrchestrator::new(
        accounting,
        Arc::new(PgOrderStore::new(pool.clone())),
        Arc::new(PgMetadataProvider::new(pool)),
        cards,
        allow_list,
        &config.sync,
    ));

    let state = AppState {
        orchestrator,
        batch_limit: config.sync.batch_limit,
    };

    let app = Router::new()
        .route("/health", get(api::health_check))
        .route("/api/orders/process", post(api::process_order))
        .route("/api/orders/batch", post(api::process_batch))
        .route("/api/orders/pending", post(api::process_pending))
        .route(
            "/api/order-types/allowed",
            get(api::list_order_types)
                .post(api::add_order_type)
                .delete(api::remove_order_type),
        )
        .with_state(state)
        .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()));

    let addr = format!("{}:{}", config.server.host, config.server.port);
    info!("Server listening on {}", addr);
    info!("API Endpoints:");
    info!("  POST /api/orders/process  - 处理单个订单");
    info!("  POST /api/orders/batch    - 批量处理");
    info!("  POST /api/orders/pending  - 处理未处理订单");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
