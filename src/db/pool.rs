use crate::config::DatabaseConfig;
use crate::error::Result;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{ConnectOptions, PgPool};
use std::str::FromStr;
use std::time::Duration;

/// 慢查询告警阈值
const SLOW_STATEMENT_THRESHOLD: Duration = Duration::from_secs(5);

/// 创建数据库连接池 (销售明细/出入库单/状态表共用)
pub async fn create_pool(config: &DatabaseConfig) -> Result<PgPool> {
    let connect_options = PgConnectOptions::from_str(&config.url)?
        .log_slow_statements(tracing::log::LevelFilter::Warn, SLOW_STATEMENT_THRESHOLD);

    let pool = PgPoolOptions::new()
        .max_connections(config.max_connections)
        .acquire_timeout(Duration::from_secs(10))
        .connect_with(connect_options)
        .await?;

    tracing::info!(
        "[DB] 连接池就绪, 最大连接数 {}",
        config.max_connections
    );
    Ok(pool)
}
