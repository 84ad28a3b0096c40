//! 订单处理变体
//!
//! 每个变体按固定顺序调用会计系统, 返回 `HandlerOutcome`。
//! 错误统一向上返回, 由编排器的执行包装落库。

pub mod cancellation;
pub mod card_split;
pub mod normal;
pub mod sale_return;
pub mod service_order;
pub mod special;

use crate::client::{AccountingClient, CardDataProvider};
use crate::db::OrderStore;
use crate::error::Result;
use crate::models::{first_success, AccountingResponse, HandlerOutcome, InvoiceStatus, Order, StockMovementRecord};
use crate::service::enrichment::SaleEnricher;
use crate::service::matcher::{self, Assignment, MatchMode};
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::Semaphore;

pub const STEP_SALES_ORDER: &str = "đơn bán hàng";
pub const STEP_SALES_INVOICE: &str = "hóa đơn bán hàng";
pub const STEP_SALES_RETURN: &str = "phiếu trả hàng";
pub const STEP_CANCELLATION: &str = "hủy đơn bán hàng";

/// 处理器共享的外部依赖
pub struct HandlerDeps {
    pub accounting: Arc<dyn AccountingClient>,
    pub store: Arc<dyn OrderStore>,
    pub cards: Arc<dyn CardDataProvider>,
    pub enricher: SaleEnricher,
    pub throttle: Arc<Semaphore>,
    pub invoice_for_special_orders: bool,
}

impl HandlerDeps {
    /// 查询并匹配订单的出入库单 (单订单模式)
    pub async fn match_movements(&self, order: &Order, so_codes: &[String]) -> Result<Assignment> {
        let movements = self.store.find_movements(so_codes).await?;
        Ok(assign_movements(order, movements))
    }
}

/// 单订单模式匹配, 记录未匹配的出入库单
pub fn assign_movements(order: &Order, mut movements: Vec<StockMovementRecord>) -> Assignment {
    MatchMode::SingleOrder.sort(&mut movements);
    let assignment = matcher::assign(&order.lines, &movements, MatchMode::SingleOrder);

    if !assignment.unmatched.is_empty() {
        let codes: Vec<&str> = assignment
            .unmatched
            .iter()
            .map(|r| r.doc_code.as_str())
            .collect();
        tracing::info!(
            "[Matcher] {}: 出入库单未匹配到销售行: {}",
            order.doc_code,
            codes.join(", ")
        );
    }
    assignment
}

/// 单个会计步骤的结果
#[derive(Debug, Clone)]
pub struct StepResult {
    pub success: bool,
    pub message: String,
    pub guid: Option<String>,
}

impl StepResult {
    /// 取响应数组第一项判断成功, 有效信息附加在消息后
    pub fn from_responses(step: &str, responses: &[AccountingResponse]) -> Self {
        let first = responses.first();
        let success = first_success(responses);
        let detail = first.and_then(AccountingResponse::informative_message);

        let message = match (success, detail) {
            (true, _) => format!("Tạo {} thành công", step),
            (false, Some(detail)) => format!("Tạo {} thất bại: {}", step, detail),
            (false, None) => format!("Tạo {} thất bại", step),
        };

        Self {
            success,
            message,
            guid: first.and_then(|r| r.guid.clone()),
        }
    }

    pub fn into_outcome(self, raw: Value) -> HandlerOutcome {
        let status = if self.success {
            InvoiceStatus::Success
        } else {
            InvoiceStatus::Failed
        };
        HandlerOutcome {
            result: raw.clone(),
            status,
            message: self.message,
            guid: self.guid,
            raw_response: Some(raw),
            warnings: Vec::new(),
        }
    }
}

/// 警告附加到消息尾部
pub fn append_warnings(outcome: &mut HandlerOutcome) {
    if outcome.warnings.is_empty() {
        return;
    }
    outcome.message = format!(
        "{} (cảnh báo: {})",
        outcome.message,
        outcome.warnings.join("; ")
    );
}
