use thiserror::Error;

/// 同步服务统一错误类型
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("CSV export error: {0}")]
    Csv(#[from] csv::Error),

    /// CSV 报告写盘 (flush) 失败
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// 会计系统返回了非 2xx 响应
    #[error("Accounting API {endpoint} returned {status}: {body}")]
    AccountingApi {
        endpoint: String,
        status: u16,
        body: String,
    },

    /// 处理器必需步骤失败 (例如服务单的销售订单/发票未成功)
    #[error("{0}")]
    Handler(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl SyncError {
    pub fn handler(message: impl Into<String>) -> Self {
        Self::Handler(message.into())
    }
}

pub type Result<T> = std::result::Result<T, SyncError>;
