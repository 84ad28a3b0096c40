use super::{append_warnings, HandlerDeps, StepResult, STEP_CANCELLATION};
use crate::error::Result;
use crate::models::{DocumentAction, HandlerOutcome, Order, PaymentRequest};
use crate::service::classifier::strip_cancellation_suffix;
use serde_json::json;

/// 作废单 (单号以 `_X` 结尾)
///
/// 去掉后缀后以作废动作提交销售订单, 提交错误直接向上返回。
/// 作废没有实物出入库, 收款步骤在没有仓库编码时同样执行。
pub async fn execute(deps: &HandlerDeps, order: &Order) -> Result<HandlerOutcome> {
    let base_code = strip_cancellation_suffix(&order.doc_code).to_string();

    let assignment = deps.match_movements(order, &[base_code.clone()]).await?;
    let (mut payload, _) = deps
        .enricher
        .enrich(order, &order.lines, &assignment, "Hủy đơn bán hàng")
        .await?;
    payload.doc_code = base_code.clone();

    tracing::info!("[Cancellation] {} -> {}: 提交作废", order.doc_code, base_code);
    let responses = deps
        .accounting
        .create_sales_order(&payload, Some(DocumentAction::Cancel))
        .await?;
    let step = StepResult::from_responses(STEP_CANCELLATION, &responses);

    let mut payment = json!(null);
    let mut warnings = Vec::new();
    if step.success {
        let warehouse_codes = match deps
            .enricher
            .resolve_warehouse_codes(&assignment.stock_codes())
            .await
        {
            Ok(codes) => codes,
            Err(e) => {
                warnings.push(format!("{}: tra cứu kho lỗi: {}", base_code, e));
                Vec::new()
            }
        };

        let request = PaymentRequest {
            doc_code: base_code.clone(),
            branch_code: order.branch_code.clone(),
            doc_date: order.doc_date,
            customer_code: order.customer_code().map(str::to_string),
            invoice: responses.first().cloned(),
            stock_codes: warehouse_codes,
            allow_without_stock_codes: true,
        };
        match deps.accounting.process_payment(&request).await {
            Ok(outcome) => {
                for message in outcome.failure_messages() {
                    warnings.push(format!("{}: thanh toán hủy lỗi: {}", base_code, message));
                }
                payment = serde_json::to_value(&outcome)?;
            }
            Err(e) => warnings.push(format!("{}: xử lý thanh toán hủy lỗi: {}", base_code, e)),
        }
    }

    let mut outcome = step.into_outcome(json!({
        "salesOrder": responses,
        "payment": payment,
    }));
    for warning in warnings {
        outcome.warn(warning);
    }
    append_warnings(&mut outcome);
    Ok(outcome)
}
