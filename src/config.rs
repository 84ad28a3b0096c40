use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};

/// 默认的普通单据类型白名单
pub const DEFAULT_ORDINARY_LABELS: [&str; 2] = ["01. Thường", "01.Thường"];

/// 外部查询并发窗口
pub const DEFAULT_LOOKUP_CONCURRENCY: usize = 5;

/// 应用配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub accounting: AccountingConfig,
    pub card_api: CardApiConfig,
    pub sync: SyncConfig,
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

/// 会计系统接口
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountingConfig {
    pub base_url: String,
    #[serde(default)]
    pub api_token: String,
    pub timeout_secs: u64,
}

/// 卡/序列号查询接口
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CardApiConfig {
    pub base_url: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// 普通单据允许的单据类型标签 (运行时可通过管理接口增删)
    pub ordinary_labels: Vec<String>,
    /// 外部元数据/卡数据查询的并发窗口
    pub lookup_concurrency: usize,
    /// 特殊单据是否额外提交销售发票
    pub invoice_for_special_orders: bool,
    /// 待处理单据单次拉取上限
    pub batch_limit: i64,
    /// 批量处理后未匹配出入库单的 CSV 报告路径, 为空则不导出
    #[serde(default)]
    pub unmatched_report_path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    pub level: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 8080,
            },
            database: DatabaseConfig {
                url: "postgres://localhost/retail_sync".to_string(),
                max_connections: 20,
            },
            accounting: AccountingConfig {
                base_url: "http://localhost:9000".to_string(),
                api_token: String::new(),
                timeout_secs: 60,
            },
            card_api: CardApiConfig {
                base_url: "http://localhost:9100".to_string(),
                timeout_secs: 30,
            },
            sync: SyncConfig::default(),
            log: LogConfig {
                level: "info".to_string(),
            },
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            ordinary_labels: DEFAULT_ORDINARY_LABELS.iter().map(|s| s.to_string()).collect(),
            lookup_concurrency: DEFAULT_LOOKUP_CONCURRENCY,
            invoice_for_special_orders: false,
            batch_limit: 100,
            unmatched_report_path: None,
        }
    }
}

impl AppConfig {
    /// 加载配置: 默认值 -> config/app.toml (可选) -> APP__ 前缀环境变量
    pub fn load() -> Result<Self, config::ConfigError> {
        let defaults = Config::try_from(&AppConfig::default())?;

        Config::builder()
            .add_source(defaults)
            .add_source(File::with_name("config/app").required(false))
            .add_source(
                Environment::with_prefix("APP")
                    .prefix_separator("__")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("sync.ordinary_labels")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_sync_config_uses_window_of_five() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.sync.lookup_concurrency, 5);
        assert_eq!(cfg.sync.ordinary_labels.len(), 2);
        assert!(!cfg.sync.invoice_for_special_orders);
    }

    #[test]
    fn load_without_file_falls_back_to_defaults() {
        let cfg = AppConfig::load().expect("defaults should deserialize");
        assert_eq!(cfg.server.port, AppConfig::default().server.port);
        assert_eq!(cfg.sync.batch_limit, 100);
        assert!(cfg.sync.unmatched_report_path.is_none());
    }
}
