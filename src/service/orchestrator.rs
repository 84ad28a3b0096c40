use crate::client::{AccountingClient, CardDataProvider};
use crate::config::SyncConfig;
use crate::db::{MetadataProvider, OrderStore};
use crate::error::Result;
use crate::models::{HandlerOutcome, Order, ProcessResult};
use crate::service::classifier::{classify, Classification, OrderKind};
use crate::service::enrichment::SaleEnricher;
use crate::service::matcher::{self, BatchAssignment, MatchMode};
use crate::service::handlers::{
    cancellation, card_split, normal, sale_return, service_order, special, HandlerDeps,
};
use crate::service::persistence::{outcome_from_error, InvoicePersistence, OrderHeader};
use crate::service::validation::{validate, validate_sale_return, OrderTypeAllowList};
use futures::future::join_all;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Semaphore;

/// 单个订单的处理阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ProcessingStage {
    Received,
    Classified,
    Validating,
    Executing,
    Persisted,
}

/// 订单编排: 分类 -> 校验 -> 分派唯一处理器 -> 落库
pub struct OrderOrchestrator {
    deps: HandlerDeps,
    persistence: InvoicePersistence,
    allow_list: Arc<OrderTypeAllowList>,
    unmatched_report_path: Option<PathBuf>,
}

impl OrderOrchestrator {
    pub fn new(
        accounting: Arc<dyn AccountingClient>,
        store: Arc<dyn OrderStore>,
        metadata: Arc<dyn MetadataProvider>,
        cards: Arc<dyn CardDataProvider>,
        allow_list: Arc<OrderTypeAllowList>,
        config: &SyncConfig,
    ) -> Self {
        let throttle = Arc::new(Semaphore::new(config.lookup_concurrency.max(1)));
        let deps = HandlerDeps {
            accounting,
            store: store.clone(),
            cards,
            enricher: SaleEnricher::new(metadata, throttle.clone()),
            throttle,
            invoice_for_special_orders: config.invoice_for_special_orders,
        };

        Self {
            deps,
            persistence: InvoicePersistence::new(store),
            allow_list,
            unmatched_report_path: config.unmatched_report_path.as_ref().map(PathBuf::from),
        }
    }

    pub fn allow_list(&self) -> &Arc<OrderTypeAllowList> {
        &self.allow_list
    }

    /// 处理单个订单, 任何异常都转换为失败结果并落库, 不向调用方抛出
    ///
    /// `order` 为空时从库中加载销售明细。`force_retry` 为 false 且已有成功记录时
    /// 直接返回已存的状态和消息。
    pub async fn process_order(
        &self,
        doc_code: &str,
        order: Option<Order>,
        force_retry: bool,
    ) -> ProcessResult {
        let doc_code = doc_code.trim();
        match self.try_process(doc_code, order, force_retry).await {
            Ok(result) => result,
            Err(e) => {
                tracing::error!("[Orchestrator] {}: 系统异常: {}", doc_code, e);
                let outcome = outcome_from_error(doc_code, &e);
                if let Err(persist_err) = self
                    .persistence
                    .persist(&OrderHeader::bare(doc_code), &outcome)
                    .await
                {
                    tracing::error!(
                        "[Orchestrator] {}: 写入失败状态也失败: {}",
                        doc_code,
                        persist_err
                    );
                }
                ProcessResult::from_outcome(&outcome)
            }
        }
    }

    async fn try_process(
        &self,
        doc_code: &str,
        order: Option<Order>,
        force_retry: bool,
    ) -> Result<ProcessResult> {
        log_stage(doc_code, ProcessingStage::Received);

        if !force_retry {
            if let Some(existing) = self.deps.store.find_invoice_status(doc_code).await? {
                if existing.status().is_success() {
                    tracing::info!("[Orchestrator] {}: 已成功处理, 跳过", doc_code);
                    return Ok(ProcessResult {
                        success: true,
                        message: existing.message,
                        result: serde_json::Value::Null,
                        warnings: Vec::new(),
                    });
                }
            }
        }

        let order = match order {
            Some(order) => order,
            None => {
                let lines = self.deps.store.load_sale_lines(doc_code).await?;
                match Order::from_lines(doc_code, lines) {
                    Some(order) => order,
                    None => {
                        let outcome = HandlerOutcome::failed(format!(
                            "Không tìm thấy dữ liệu bán hàng cho đơn {}",
                            doc_code
                        ));
                        self.persistence
                            .persist(&OrderHeader::bare(doc_code), &outcome)
                            .await?;
                        return Ok(ProcessResult::from_outcome(&outcome));
                    }
                }
            }
        };
        let header = OrderHeader::from_order(doc_code, &order);

        let classification = classify(&order);
        log_stage(doc_code, ProcessingStage::Classified);
        tracing::info!(
            "[Orchestrator] {}: 类型 {:?}, 来源 '{}'",
            doc_code,
            classification.kind,
            classification.doc_source_type
        );

        log_stage(doc_code, ProcessingStage::Validating);
        let validation = if classification.is_sale_return() {
            validate_sale_return(&order)
        } else {
            validate(&order, &self.allow_list.snapshot(), classification.kind)
        };
        if !validation.success {
            let message = validation
                .message
                .unwrap_or_else(|| format!("Đơn {} không hợp lệ", doc_code));
            tracing::warn!("[Orchestrator] {}: 校验失败: {}", doc_code, message);
            let outcome = HandlerOutcome::failed(message);
            self.persistence.persist(&header, &outcome).await?;
            log_stage(doc_code, ProcessingStage::Persisted);
            return Ok(ProcessResult::from_outcome(&outcome));
        }

        log_stage(doc_code, ProcessingStage::Executing);
        let outcome = self
            .persistence
            .execute(&header, true, self.dispatch(&order, &classification))
            .await?;
        log_stage(doc_code, ProcessingStage::Persisted);

        Ok(ProcessResult::from_outcome(&outcome))
    }

    /// 按分类结果分派到唯一的处理器
    async fn dispatch(&self, order: &Order, classification: &Classification) -> Result<HandlerOutcome> {
        let deps = &self.deps;
        match classification.kind {
            OrderKind::SaleReturn => sale_return::execute(deps, order).await,
            OrderKind::Cancellation => cancellation::execute(deps, order).await,
            OrderKind::ServiceOrder => service_order::execute(deps, order, classification).await,
            // 换服务仍需资金结算, 走普通流程
            OrderKind::ServiceChange | OrderKind::Ordinary => normal::execute(deps, order).await,
            OrderKind::CardSplit => card_split::execute(deps, order).await,
            OrderKind::LoyaltyExchange => special::execute(deps, order, "Đơn đổi điểm").await,
            OrderKind::BirthdayGift => special::execute(deps, order, "Đơn tặng sinh nhật").await,
            OrderKind::Investment => special::execute(deps, order, "Đơn đầu tư").await,
            OrderKind::BottleExchange => special::execute(deps, order, "Đơn đổi vỏ").await,
        }
    }

    /// 批量处理: 订单之间相互独立, 外部查询由共享窗口限流
    pub async fn process_batch(
        &self,
        doc_codes: &[String],
        force_retry: bool,
    ) -> Vec<(String, ProcessResult)> {
        tracing::info!("[Orchestrator] 批量处理 {} 个订单", doc_codes.len());
        let results = join_all(
            doc_codes
                .iter()
                .map(|code| self.process_order(code, None, force_retry)),
        )
        .await;

        let succeeded = results.iter().filter(|r| r.success).count();
        tracing::info!(
            "[Orchestrator] 批量完成: 成功 {}/{}",
            succeeded,
            doc_codes.len()
        );
        doc_codes.iter().cloned().zip(results).collect()
    }

    /// 拉取未处理订单并批量处理, 配置了报告路径时导出批次内未匹配的出入库单
    pub async fn process_pending(&self, limit: i64) -> Result<Vec<(String, ProcessResult)>> {
        let doc_codes = self.deps.store.list_pending_doc_codes(limit).await?;
        if doc_codes.is_empty() {
            tracing::info!("[Orchestrator] 没有待处理订单");
            return Ok(Vec::new());
        }
        let results = self.process_batch(&doc_codes, false).await;

        if let Some(path) = &self.unmatched_report_path {
            // 报告失败不影响已完成的处理结果
            match self.export_unmatched_movements(&doc_codes, path).await {
                Ok(count) => tracing::info!(
                    "[Orchestrator] 未匹配出入库单 {} 条, 报告: {}",
                    count,
                    path.display()
                ),
                Err(e) => tracing::warn!("[Orchestrator] 导出未匹配出入库单失败: {}", e),
            }
        }
        Ok(results)
    }

    /// 跨订单对账: 批次内的订单共同消费出入库单 (退货单含原销售单号下的记录)
    pub async fn reconcile_movements(&self, doc_codes: &[String]) -> Result<BatchAssignment> {
        let mut orders = Vec::with_capacity(doc_codes.len());
        let mut so_codes: Vec<String> = Vec::new();
        for doc_code in doc_codes {
            let lines = self.deps.store.load_sale_lines(doc_code).await?;
            let Some(order) = Order::from_lines(doc_code, lines) else {
                continue;
            };
            let origin = order.origin_doc_code().map(str::to_string);
            for code in std::iter::once(doc_code).chain(origin.as_ref()) {
                if !so_codes.contains(code) {
                    so_codes.push(code.clone());
                }
            }
            orders.push((doc_code.clone(), origin, order.lines));
        }

        let movements = self.deps.store.find_movements(&so_codes).await?;
        Ok(matcher::assign_batch(&orders, &movements, MatchMode::CrossOrder))
    }

    /// 导出未匹配出入库单报告, 返回条数
    pub async fn export_unmatched_movements(&self, doc_codes: &[String], path: &Path) -> Result<usize> {
        let batch = self.reconcile_movements(doc_codes).await?;
        matcher::export_unmatched_to_csv(&batch.unmatched, path)?;
        Ok(batch.unmatched.len())
    }
}

fn log_stage(doc_code: &str, stage: ProcessingStage) {
    tracing::debug!("[Orchestrator] {}: -> {:?}", doc_code, stage);
}
