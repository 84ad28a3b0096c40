use super::{append_warnings, assign_movements, HandlerDeps, StepResult, STEP_SALES_RETURN};
use crate::error::Result;
use crate::models::{HandlerOutcome, Order, PaymentRequest, StockMovementRecord};
use serde_json::json;

/// 没有出入库单时的提示 (不是告警, 仅表示无需处理)
pub const NO_STOCK_TRANSFER_MESSAGE: &str = "SALE_RETURN không có stock transfer - không cần xử lý";

/// 退货单
///
/// 出入库单同时按退货单号和原销售单号查询; 没有则直接返回状态 0。
/// 提交退货单据 (不同步客户), 成功后按仓库尽力触发付款。
pub async fn execute(deps: &HandlerDeps, order: &Order) -> Result<HandlerOutcome> {
    let doc_code = order.doc_code.as_str();
    let mut so_codes = vec![order.doc_code.clone()];
    if let Some(origin) = order.origin_doc_code() {
        if origin != doc_code {
            so_codes.push(origin.to_string());
        }
    }

    let movements = deps.store.find_movements(&so_codes).await?;
    if movements.is_empty() {
        tracing::info!("[SaleReturn] {}: 无出入库单 ({:?}), 跳过", doc_code, so_codes);
        return Ok(HandlerOutcome::failed(NO_STOCK_TRANSFER_MESSAGE));
    }

    let movement_count = movements.len();
    let stock_codes = distinct_stock_codes(&movements);
    let assignment = assign_movements(order, movements);
    let (payload, _) = deps
        .enricher
        .enrich(order, &order.lines, &assignment, "Phiếu trả hàng")
        .await?;

    tracing::info!("[SaleReturn] {}: 提交退货单, {} 条出入库单", doc_code, movement_count);
    let responses = deps.accounting.create_sales_return(&payload).await?;
    let step = StepResult::from_responses(STEP_SALES_RETURN, &responses);
    let success = step.success;

    let mut payment = json!(null);
    let mut warnings = Vec::new();
    if success {
        let warehouse_codes = match deps.enricher.resolve_warehouse_codes(&stock_codes).await {
            Ok(codes) => codes,
            Err(e) => {
                warnings.push(format!("{}: tra cứu kho lỗi: {}", doc_code, e));
                Vec::new()
            }
        };

        if warehouse_codes.is_empty() {
            tracing::info!("[SaleReturn] {}: 无可解析仓库, 跳过付款", doc_code);
        } else {
            let request = PaymentRequest {
                doc_code: doc_code.to_string(),
                branch_code: order.branch_code.clone(),
                doc_date: order.doc_date,
                customer_code: order.customer_code().map(str::to_string),
                invoice: responses.first().cloned(),
                stock_codes: warehouse_codes,
                allow_without_stock_codes: false,
            };
            match deps.accounting.process_payment(&request).await {
                Ok(outcome) => {
                    for message in outcome.failure_messages() {
                        warnings.push(format!("{}: phiếu chi lỗi: {}", doc_code, message));
                    }
                    payment = serde_json::to_value(&outcome)?;
                }
                Err(e) => warnings.push(format!("{}: xử lý phiếu chi lỗi: {}", doc_code, e)),
            }
        }
    }

    let mut outcome = step.into_outcome(json!({
        "salesReturn": responses,
        "payment": payment,
    }));
    for warning in warnings {
        outcome.warn(warning);
    }
    append_warnings(&mut outcome);
    Ok(outcome)
}

fn distinct_stock_codes(movements: &[StockMovementRecord]) -> Vec<String> {
    let mut stock_codes: Vec<String> = Vec::new();
    for code in movements.iter().filter_map(|m| m.stock_code()) {
        if !stock_codes.iter().any(|c| c == code) {
            stock_codes.push(code.to_string());
        }
    }
    stock_codes
}
