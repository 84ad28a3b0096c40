use crate::db::OrderStore;
use crate::error::{Result, SyncError};
use crate::models::{HandlerOutcome, InvoiceStatusRecord, Order};
use chrono::{NaiveDate, Utc};
use std::future::Future;
use std::sync::Arc;

/// 系统异常消息前缀
pub const SYSTEM_ERROR_PREFIX: &str = "Lỗi hệ thống";

/// 状态记录的订单头信息
#[derive(Debug, Clone)]
pub struct OrderHeader {
    pub doc_code: String,
    pub customer_code: Option<String>,
    pub customer_name: Option<String>,
    pub doc_date: Option<NaiveDate>,
}

impl OrderHeader {
    pub fn from_order(doc_code: &str, order: &Order) -> Self {
        Self {
            doc_code: doc_code.to_string(),
            customer_code: order.customer_code().map(str::to_string),
            customer_name: order.customer_name.clone(),
            doc_date: Some(order.doc_date),
        }
    }

    /// 订单数据不可用时只带单号
    pub fn bare(doc_code: &str) -> Self {
        Self {
            doc_code: doc_code.to_string(),
            customer_code: None,
            customer_name: None,
            doc_date: None,
        }
    }
}

/// 把错误转换为状态 0 的结果
///
/// 处理器主动报告的失败保留原消息, 其余错误加系统异常前缀。
pub fn outcome_from_error(doc_code: &str, error: &SyncError) -> HandlerOutcome {
    match error {
        SyncError::Handler(message) => HandlerOutcome::failed(message.clone()),
        other => HandlerOutcome::failed(format!(
            "{} khi xử lý đơn {}: {}",
            SYSTEM_ERROR_PREFIX, doc_code, other
        )),
    }
}

/// 发票状态持久化 (按 doc_code 幂等)
pub struct InvoicePersistence {
    store: Arc<dyn OrderStore>,
}

impl InvoicePersistence {
    pub fn new(store: Arc<dyn OrderStore>) -> Self {
        Self { store }
    }

    /// 执行处理器并写入状态记录
    ///
    /// 处理器出错时写入状态 0; 成功且 `mark_processed` 时标记销售明细已处理,
    /// 标记失败只作为警告返回。
    pub async fn execute<F>(
        &self,
        header: &OrderHeader,
        mark_processed: bool,
        handler: F,
    ) -> Result<HandlerOutcome>
    where
        F: Future<Output = Result<HandlerOutcome>> + Send,
    {
        let mut outcome = match handler.await {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::error!("[Persistence] {}: 处理异常: {}", header.doc_code, e);
                outcome_from_error(&header.doc_code, &e)
            }
        };

        self.persist(header, &outcome).await?;

        // 单据已在会计系统创建, 标记失败不能回退成功状态
        if outcome.is_success() && mark_processed {
            match self.store.mark_processed(&header.doc_code).await {
                Ok(affected) => {
                    tracing::info!("[Persistence] {}: 标记已处理 {} 行", header.doc_code, affected)
                }
                Err(e) => {
                    tracing::error!("[Persistence] {}: 标记已处理失败: {}", header.doc_code, e);
                    outcome.warn(format!(
                        "Không đánh dấu được dữ liệu bán hàng đã xử lý cho đơn {}: {}",
                        header.doc_code, e
                    ));
                }
            }
        }

        Ok(outcome)
    }

    /// 写入 (覆盖) 状态记录
    pub async fn persist(&self, header: &OrderHeader, outcome: &HandlerOutcome) -> Result<()> {
        let raw_response = outcome
            .raw_response
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        let record = InvoiceStatusRecord {
            doc_code: header.doc_code.clone(),
            customer_code: header.customer_code.clone(),
            customer_name: header.customer_name.clone(),
            doc_date: header.doc_date,
            status: outcome.status.code(),
            message: outcome.message.clone(),
            guid: outcome.guid.clone(),
            raw_response,
            updated_at: Utc::now(),
        };

        self.store.upsert_invoice_status(&record).await?;
        tracing::info!(
            "[Persistence] {}: 状态 {}, {}",
            header.doc_code,
            record.status,
            record.message
        );
        Ok(())
    }
}
