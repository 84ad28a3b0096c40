use super::{HandlerDeps, StepResult, STEP_SALES_ORDER};
use crate::error::Result;
use crate::models::{HandlerOutcome, Order};

/// 普通单: 提交一张销售订单
pub async fn execute(deps: &HandlerDeps, order: &Order) -> Result<HandlerOutcome> {
    let assignment = deps
        .match_movements(order, &[order.doc_code.clone()])
        .await?;
    let (payload, _) = deps
        .enricher
        .enrich(order, &order.lines, &assignment, "Đơn bán hàng")
        .await?;

    tracing::info!(
        "[Normal] {}: 提交销售订单, {} 行",
        order.doc_code,
        payload.lines.len()
    );
    let responses = deps.accounting.create_sales_order(&payload, None).await?;
    let step = StepResult::from_responses(STEP_SALES_ORDER, &responses);

    Ok(step.into_outcome(serde_json::to_value(&responses)?))
}
