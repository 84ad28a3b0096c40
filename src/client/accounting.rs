use crate::config::AccountingConfig;
use crate::error::{Result, SyncError};
use crate::models::{
    AccountingResponse, CashioPayment, CustomerPayload, DocumentAction, PaymentOutcome,
    PaymentRequest, SalesDocumentPayload,
};
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use std::time::Duration;

/// 会计系统接口 (响应 status=1 表示成功)
#[async_trait]
pub trait AccountingClient: Send + Sync {
    async fn create_sales_order(
        &self,
        payload: &SalesDocumentPayload,
        action: Option<DocumentAction>,
    ) -> Result<Vec<AccountingResponse>>;

    async fn create_sales_invoice(&self, payload: &SalesDocumentPayload) -> Result<Vec<AccountingResponse>>;

    async fn create_sales_return(&self, payload: &SalesDocumentPayload) -> Result<Vec<AccountingResponse>>;

    /// 换货 (GXT) 单据
    async fn create_gxt_invoice(&self, payload: &SalesDocumentPayload) -> Result<Value>;

    async fn create_or_update_customer(&self, payload: &CustomerPayload) -> Result<Value>;

    async fn process_payment(&self, request: &PaymentRequest) -> Result<PaymentOutcome>;

    async fn process_cashio_payment(&self, payment: &CashioPayment) -> Result<Value>;
}

/// 基于 HTTP 的会计系统客户端
pub struct HttpAccountingClient {
    client: reqwest::Client,
    base_url: String,
    api_token: String,
}

impl HttpAccountingClient {
    pub fn new(config: &AccountingConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_token: config.api_token.clone(),
        })
    }

    async fn post<B, T>(&self, endpoint: &str, body: &B) -> Result<T>
    where
        B: Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let url = format!("{}/{}", self.base_url, endpoint);
        tracing::debug!("Accounting API: POST {}", url);

        let mut request = self.client.post(&url).json(body);
        if !self.api_token.is_empty() {
            request = request.bearer_auth(&self.api_token);
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::error!("Accounting API {} returned {}: {}", endpoint, status, body);
            return Err(SyncError::AccountingApi {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.json::<T>().await?)
    }
}

#[async_trait]
impl AccountingClient for HttpAccountingClient {
    async fn create_sales_order(
        &self,
        payload: &SalesDocumentPayload,
        action: Option<DocumentAction>,
    ) -> Result<Vec<AccountingResponse>> {
        let body = json!({
            "action": action.unwrap_or(DocumentAction::Create),
            "document": payload,
        });
        self.post("api/sales-orders", &body).await
    }

    async fn create_sales_invoice(&self, payload: &SalesDocumentPayload) -> Result<Vec<AccountingResponse>> {
        self.post("api/sales-invoices", payload).await
    }

    async fn create_sales_return(&self, payload: &SalesDocumentPayload) -> Result<Vec<AccountingResponse>> {
        self.post("api/sales-returns", payload).await
    }

    async fn create_gxt_invoice(&self, payload: &SalesDocumentPayload) -> Result<Value> {
        self.post("api/gxt-invoices", payload).await
    }

    async fn create_or_update_customer(&self, payload: &CustomerPayload) -> Result<Value> {
        self.post("api/customers", payload).await
    }

    async fn process_payment(&self, request: &PaymentRequest) -> Result<PaymentOutcome> {
        self.post("api/payments/process", request).await
    }

    async fn process_cashio_payment(&self, payment: &CashioPayment) -> Result<Value> {
        self.post("api/payments/cashio", payment).await
    }
}
