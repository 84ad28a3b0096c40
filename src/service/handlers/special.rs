use super::{HandlerDeps, StepResult, STEP_SALES_INVOICE, STEP_SALES_ORDER};
use crate::error::Result;
use crate::models::{HandlerOutcome, Order, SalesDocumentPayload};
use serde_json::json;

/// 积分兑换/生日赠品/投资/换瓶: 只提交销售订单
///
/// 这类单据没有资金结算, 仅在配置要求时补开销售发票。
pub async fn execute(deps: &HandlerDeps, order: &Order, description: &str) -> Result<HandlerOutcome> {
    let assignment = deps
        .match_movements(order, &[order.doc_code.clone()])
        .await?;
    let (payload, _) = deps
        .enricher
        .enrich(order, &order.lines, &assignment, description)
        .await?;

    submit(deps, &payload, deps.invoice_for_special_orders).await
}

/// 提交销售订单, `with_invoice` 时在订单成功后补开发票
///
/// 发票结果追加到消息, 失败不降低订单已成功的状态。
pub async fn submit(
    deps: &HandlerDeps,
    payload: &SalesDocumentPayload,
    with_invoice: bool,
) -> Result<HandlerOutcome> {
    let order_responses = deps.accounting.create_sales_order(payload, None).await?;
    let order_step = StepResult::from_responses(STEP_SALES_ORDER, &order_responses);
    let order_success = order_step.success;

    let mut raw = json!({ "salesOrder": order_responses });
    let mut outcome = order_step.into_outcome(raw.clone());

    if !with_invoice {
        return Ok(outcome);
    }
    if !order_success {
        tracing::warn!("[Special] {}: 销售订单未成功, 跳过发票", payload.doc_code);
        return Ok(outcome);
    }

    match deps.accounting.create_sales_invoice(payload).await {
        Ok(invoice_responses) => {
            let invoice_step = StepResult::from_responses(STEP_SALES_INVOICE, &invoice_responses);
            outcome.message = format!("{}; {}", outcome.message, invoice_step.message);
            if !invoice_step.success {
                tracing::warn!("[Special] {}: {}", payload.doc_code, invoice_step.message);
            }
            raw["salesInvoice"] = serde_json::to_value(&invoice_responses)?;
        }
        Err(e) => {
            let fragment = format!("Tạo {} lỗi: {}", STEP_SALES_INVOICE, e);
            tracing::warn!("[Special] {}: {}", payload.doc_code, fragment);
            outcome.message = format!("{}; {}", outcome.message, fragment);
        }
    }

    outcome.result = raw.clone();
    outcome.raw_response = Some(raw);
    Ok(outcome)
}
