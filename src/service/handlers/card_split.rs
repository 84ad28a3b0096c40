use super::{append_warnings, special, HandlerDeps};
use crate::error::Result;
use crate::models::{HandlerOutcome, Order};
use crate::service::enrichment::apply_card_serials;

/// 拆卡单: 补全卡序列号和发卡合作方后按特殊单提交, 强制开发票
pub async fn execute(deps: &HandlerDeps, order: &Order) -> Result<HandlerOutcome> {
    let assignment = deps
        .match_movements(order, &[order.doc_code.clone()])
        .await?;
    let (mut payload, _) = deps
        .enricher
        .enrich(order, &order.lines, &assignment, "Đơn tách thẻ")
        .await?;

    // 卡数据查询失败不阻断提交
    let mut warnings = Vec::new();
    let serials = {
        let _permit = deps.throttle.acquire().await.ok();
        deps.cards.card_serials(&[order.doc_code.clone()]).await
    };
    match serials {
        Ok(mut by_order) => {
            let serials = by_order.remove(&order.doc_code).unwrap_or_default();
            let leftover = apply_card_serials(&mut payload, &serials);
            tracing::info!(
                "[CardSplit] {}: {} 个序列号, 未分配 {}",
                order.doc_code,
                serials.len(),
                leftover
            );
            if leftover > 0 {
                warnings.push(format!(
                    "{}: {} số serial không khớp dòng hàng",
                    order.doc_code, leftover
                ));
            }
        }
        Err(e) => {
            warnings.push(format!("{}: lấy dữ liệu thẻ lỗi: {}", order.doc_code, e));
        }
    }

    let mut outcome = special::submit(deps, &payload, true).await?;
    for warning in warnings {
        outcome.warn(warning);
    }
    append_warnings(&mut outcome);
    Ok(outcome)
}
