use super::{append_warnings, HandlerDeps, StepResult, STEP_SALES_INVOICE, STEP_SALES_ORDER};
use crate::error::{Result, SyncError};
use crate::models::{
    value_is_success, CashioPayment, CustomerPayload, HandlerOutcome, InvoiceStatus, Order,
    PaymentRequest, ProductType,
};
use crate::service::classifier::Classification;
use crate::service::enrichment::build_payload;
use bigdecimal::{BigDecimal, Zero};
use serde_json::json;

/// 服务单
///
/// 1. 有客户编码时同步客户
/// 2. 只保留服务行 (productType = S), 没有则失败
/// 3. 提交销售订单, 未成功直接失败
/// 4. 提交销售发票, 未成功直接失败
/// 5. 触发收款 (尽力而为, 失败计入收款错误)
/// 6. 同时含出库商品行时提交换货单 (失败忽略)
/// 7. 退货/退款来源且仓库可解析时提交现金付款 (尽力而为)
/// 8. 发票成功且无收款错误才算成功
pub async fn execute(
    deps: &HandlerDeps,
    order: &Order,
    classification: &Classification,
) -> Result<HandlerOutcome> {
    let doc_code = order.doc_code.as_str();
    let mut warnings: Vec<String> = Vec::new();

    // 1. 客户
    if let Some(customer_code) = order.customer_code() {
        let customer = CustomerPayload {
            customer_code: customer_code.to_string(),
            customer_name: order.customer_name.clone(),
            branch_code: order.branch_code.clone(),
        };
        if let Err(e) = deps.accounting.create_or_update_customer(&customer).await {
            warnings.push(format!("{}: cập nhật khách hàng {} lỗi: {}", doc_code, customer_code, e));
        }
    }

    // 2. 服务行
    let service_lines = order.lines_of(ProductType::Service);
    if service_lines.is_empty() {
        return Err(SyncError::handler(format!(
            "Đơn dịch vụ {} không có dòng dịch vụ",
            doc_code
        )));
    }

    let assignment = deps.match_movements(order, &[order.doc_code.clone()]).await?;
    let ctx = deps
        .enricher
        .load_context(order, &order.lines, &assignment)
        .await?;
    let service_payload = build_payload(order, &service_lines, &assignment, &ctx, "Đơn dịch vụ");

    // 3. 销售订单
    tracing::info!("[ServiceOrder] {}: 提交销售订单, {} 个服务行", doc_code, service_lines.len());
    let order_responses = deps
        .accounting
        .create_sales_order(&service_payload, None)
        .await?;
    let order_step = StepResult::from_responses(STEP_SALES_ORDER, &order_responses);
    if !order_step.success {
        return Err(SyncError::handler(order_step.message));
    }

    // 4. 销售发票
    let invoice_responses = deps.accounting.create_sales_invoice(&service_payload).await?;
    let invoice_step = StepResult::from_responses(STEP_SALES_INVOICE, &invoice_responses);
    if !invoice_step.success {
        return Err(SyncError::handler(invoice_step.message));
    }

    let stock_codes = ctx.resolve_warehouse_codes(&assignment.stock_codes());

    // 5. 收款
    let mut payment_error = false;
    let payment_request = PaymentRequest {
        doc_code: doc_code.to_string(),
        branch_code: order.branch_code.clone(),
        doc_date: order.doc_date,
        customer_code: order.customer_code().map(str::to_string),
        invoice: invoice_responses.first().cloned(),
        stock_codes: stock_codes.clone(),
        allow_without_stock_codes: false,
    };
    let payment = match deps.accounting.process_payment(&payment_request).await {
        Ok(outcome) => {
            if outcome.has_failure() {
                payment_error = true;
                for message in outcome.failure_messages() {
                    warnings.push(format!("{}: thanh toán lỗi: {}", doc_code, message));
                }
            }
            serde_json::to_value(&outcome)?
        }
        Err(e) => {
            payment_error = true;
            warnings.push(format!("{}: xử lý thanh toán lỗi: {}", doc_code, e));
            json!(null)
        }
    };

    // 6. 换货单 (仅当同时存在出库商品行)
    let mut gxt = json!(null);
    if order.has_lines_of(ProductType::ItemExport) {
        let combined_lines: Vec<_> = order
            .lines
            .iter()
            .filter(|l| matches!(l.product_type(), ProductType::Service | ProductType::ItemExport))
            .cloned()
            .collect();
        let gxt_payload = build_payload(order, &combined_lines, &assignment, &ctx, "Đổi hàng dịch vụ");
        match deps.accounting.create_gxt_invoice(&gxt_payload).await {
            Ok(value) => {
                if !value_is_success(&value) {
                    tracing::warn!("[ServiceOrder] {}: 换货单未成功: {}", doc_code, value);
                }
                gxt = value;
            }
            Err(e) => {
                tracing::warn!("[ServiceOrder] {}: 换货单提交失败: {}", doc_code, e);
            }
        }
    }

    // 7. 退货/退款来源的现金付款
    let mut cashio = json!(null);
    if classification.is_refund_sourced() {
        if stock_codes.is_empty() {
            tracing::info!("[ServiceOrder] {}: 无可解析仓库, 跳过现金付款", doc_code);
        } else {
            let amount = service_lines
                .iter()
                .fold(BigDecimal::zero(), |acc, l| acc + &l.amount);
            let payment = CashioPayment {
                doc_code: doc_code.to_string(),
                doc_date: order.doc_date,
                branch_code: order.branch_code.clone(),
                customer_code: order.customer_code().map(str::to_string),
                warehouse_codes: stock_codes.clone(),
                amount,
                description: format!("Hoàn tiền dịch vụ {}", doc_code),
            };
            match deps.accounting.process_cashio_payment(&payment).await {
                Ok(value) => cashio = value,
                Err(e) => warnings.push(format!("{}: phiếu chi lỗi: {}", doc_code, e)),
            }
        }
    }

    // 8. 汇总
    let status = if invoice_step.success && !payment_error {
        InvoiceStatus::Success
    } else {
        InvoiceStatus::Failed
    };
    let raw = json!({
        "salesOrder": order_responses,
        "salesInvoice": invoice_responses,
        "payment": payment,
        "gxtInvoice": gxt,
        "cashio": cashio,
    });

    let mut outcome = HandlerOutcome {
        result: raw.clone(),
        status,
        message: format!("{}; {}", order_step.message, invoice_step.message),
        guid: invoice_step.guid.or(order_step.guid),
        raw_response: Some(raw),
        warnings: Vec::new(),
    };
    for warning in warnings {
        outcome.warn(warning);
    }
    append_warnings(&mut outcome);

    tracing::info!(
        "[ServiceOrder] {}: 完成, 状态 {:?}, 警告 {}",
        doc_code,
        outcome.status,
        outcome.warnings.len()
    );
    Ok(outcome)
}
