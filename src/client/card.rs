use crate::config::CardApiConfig;
use crate::error::{Result, SyncError};
use crate::models::CardSerial;
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

/// 卡/序列号查询 (按订单号批量)
#[async_trait]
pub trait CardDataProvider: Send + Sync {
    async fn card_serials(&self, doc_codes: &[String]) -> Result<HashMap<String, Vec<CardSerial>>>;
}

pub struct HttpCardClient {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct CardSerialResponse {
    #[serde(default)]
    data: Vec<CardSerial>,
}

impl HttpCardClient {
    pub fn new(config: &CardApiConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl CardDataProvider for HttpCardClient {
    async fn card_serials(&self, doc_codes: &[String]) -> Result<HashMap<String, Vec<CardSerial>>> {
        if doc_codes.is_empty() {
            return Ok(HashMap::new());
        }

        let url = format!("{}/api/card-serials/search", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&serde_json::json!({ "docCodes": doc_codes }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SyncError::AccountingApi {
                endpoint: url,
                status: status.as_u16(),
                body,
            });
        }

        let parsed: CardSerialResponse = response.json().await?;
        let mut by_order: HashMap<String, Vec<CardSerial>> = HashMap::new();
        for serial in parsed.data {
            by_order.entry(serial.doc_code.clone()).or_default().push(serial);
        }
        tracing::info!("卡数据查询: {} 个订单, 命中 {} 个", doc_codes.len(), by_order.len());
        Ok(by_order)
    }
}
