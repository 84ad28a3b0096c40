use crate::models::Order;
use crate::service::classifier::OrderKind;
use dashmap::DashSet;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// 普通单据类型白名单, 运行时可增删
#[derive(Debug, Default)]
pub struct OrderTypeAllowList {
    labels: DashSet<String>,
}

impl OrderTypeAllowList {
    pub fn new<I, S>(labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let set = DashSet::new();
        for label in labels {
            let label = label.into();
            let trimmed = label.trim();
            if !trimmed.is_empty() {
                set.insert(trimmed.to_string());
            }
        }
        Self { labels: set }
    }

    /// 新增标签, 已存在返回 false
    pub fn add(&self, label: &str) -> bool {
        let trimmed = label.trim();
        if trimmed.is_empty() {
            return false;
        }
        self.labels.insert(trimmed.to_string())
    }

    pub fn remove(&self, label: &str) -> bool {
        self.labels.remove(label.trim()).is_some()
    }

    /// 当前白名单快照 (有序, 便于拼接消息)
    pub fn snapshot(&self) -> BTreeSet<String> {
        self.labels.iter().map(|l| l.key().clone()).collect()
    }
}

/// 校验结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationOutcome {
    pub success: bool,
    pub message: Option<String>,
    pub order_type: Option<String>,
}

impl ValidationOutcome {
    fn ok(order_type: Option<String>) -> Self {
        Self {
            success: true,
            message: None,
            order_type,
        }
    }

    fn rejected(message: String, order_type: Option<String>) -> Self {
        Self {
            success: false,
            message: Some(message),
            order_type,
        }
    }
}

/// 校验订单第一行的单据类型标签
///
/// 特殊单据在普通白名单之外还放行本变体自身的标签, 取消单放行所有特殊标签。
pub fn validate(order: &Order, allowed: &BTreeSet<String>, kind: OrderKind) -> ValidationOutcome {
    let order_type = order
        .lines
        .first()
        .and_then(|l| l.ordertype_name.as_deref())
        .map(|s| s.trim().to_string());

    let label = order_type.as_deref().unwrap_or("");
    let accepted = allowed.contains(label) || kind.accepts_own_label(label);

    if accepted {
        return ValidationOutcome::ok(order_type);
    }

    let allow_list = allowed.iter().cloned().collect::<Vec<_>>().join(", ");
    let message = format!(
        "Loại đơn hàng \"{}\" của đơn {} không được phép xử lý. Chỉ chấp nhận: {}",
        label, order.doc_code, allow_list
    );
    ValidationOutcome::rejected(message, order_type)
}

/// SALE_RETURN 单的校验: 至少一行带商品编码
pub fn validate_sale_return(order: &Order) -> ValidationOutcome {
    let order_type = order
        .lines
        .first()
        .and_then(|l| l.ordertype_name.as_deref())
        .map(|s| s.trim().to_string());

    if order.lines.iter().any(|l| l.item_code().is_some()) {
        ValidationOutcome::ok(order_type)
    } else {
        ValidationOutcome::rejected(
            format!("Đơn trả hàng {} không có dòng hàng hợp lệ", order.doc_code),
            order_type,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_ORDINARY_LABELS;
    use crate::service::classifier::tests::{line, order};

    fn allow_list() -> OrderTypeAllowList {
        OrderTypeAllowList::new(DEFAULT_ORDINARY_LABELS)
    }

    #[test]
    fn ordinary_label_passes() {
        let o = order("SO1", vec![line(1, "SO1", " 01. Thường ")]);
        let outcome = validate(&o, &allow_list().snapshot(), OrderKind::Ordinary);
        assert!(outcome.success);
        assert_eq!(outcome.order_type.as_deref(), Some("01. Thường"));
    }

    #[test]
    fn unknown_label_is_rejected_with_label_code_and_allow_list() {
        let o = order("SO9", vec![line(1, "SO9", "99. Unknown")]);
        let outcome = validate(&o, &allow_list().snapshot(), OrderKind::Ordinary);
        assert!(!outcome.success);
        let message = outcome.message.unwrap();
        assert!(message.contains("99. Unknown"));
        assert!(message.contains("SO9"));
        assert!(message.contains("01. Thường"));
    }

    #[test]
    fn special_kind_accepts_its_own_label() {
        let o = order("SO2", vec![line(1, "SO2", "03. Đổi điểm")]);
        let allowed = allow_list().snapshot();
        assert!(validate(&o, &allowed, OrderKind::LoyaltyExchange).success);
        assert!(!validate(&o, &allowed, OrderKind::Ordinary).success);
    }

    #[test]
    fn cancellation_accepts_any_special_label() {
        let allowed = allow_list().snapshot();
        for label in ["03. Đổi điểm", "02. Làm dịch vụ", "08. Tách thẻ"] {
            let o = order("SO2_X", vec![line(1, "SO2_X", label)]);
            assert!(validate(&o, &allowed, OrderKind::Cancellation).success, "{}", label);
        }
        let o = order("SO2_X", vec![line(1, "SO2_X", "99. Unknown")]);
        assert!(!validate(&o, &allowed, OrderKind::Cancellation).success);
    }

    #[test]
    fn only_first_line_is_checked() {
        let o = order(
            "SO3",
            vec![line(1, "SO3", "01. Thường"), line(2, "SO3", "99. Unknown")],
        );
        assert!(validate(&o, &allow_list().snapshot(), OrderKind::Ordinary).success);
    }

    #[test]
    fn labels_can_be_added_and_removed_at_runtime() {
        let list = allow_list();
        let o = order("SO8", vec![line(1, "SO8", "11. Bán sỉ")]);
        assert!(!validate(&o, &list.snapshot(), OrderKind::Ordinary).success);

        assert!(list.add("11. Bán sỉ"));
        assert!(!list.add(" 11. Bán sỉ "));
        assert!(validate(&o, &list.snapshot(), OrderKind::Ordinary).success);

        assert!(list.remove("11. Bán sỉ"));
        assert!(!validate(&o, &list.snapshot(), OrderKind::Ordinary).success);
    }

    #[test]
    fn sale_return_requires_an_item_line() {
        let mut l = line(1, "RT1", "09. Trả hàng");
        assert!(validate_sale_return(&order("RT1", vec![l.clone()])).success);
        l.item_code = Some("  ".to_string());
        assert!(!validate_sale_return(&order("RT1", vec![l])).success);
    }
}
