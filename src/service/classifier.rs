//! 单据类型分类
//!
//! 根据销售明细的单据类型标签/编码推导订单谓词, 并按固定优先级选出唯一的处理变体。
//! 标签比较忽略大小写和空白。

use crate::models::{Order, SaleLine};
use serde::{Deserialize, Serialize};

/// 退货来源的单据类型
pub const SALE_RETURN: &str = "SALE_RETURN";

/// 作废单后缀
pub const CANCELLATION_SUFFIX: &str = "_X";

pub const SERVICE_ORDER_LABELS: &[&str] = &["02. Làm dịch vụ"];
/// 服务单在其他环节使用的单据类型编码
pub const SERVICE_ORDER_CODES: &[&str] = &["02", "LDV"];
pub const LOYALTY_EXCHANGE_LABELS: &[&str] = &["03. Đổi điểm"];
pub const SERVICE_CHANGE_LABELS: &[&str] = &["04. Đổi DV"];
pub const BIRTHDAY_GIFT_LABELS: &[&str] = &["05. Tặng sinh nhật"];
pub const INVESTMENT_LABELS: &[&str] = &["06. Đầu tư"];
pub const BOTTLE_EXCHANGE_LABELS: &[&str] = &["07. Đổi vỏ"];
pub const CARD_SPLIT_LABELS: &[&str] = &["08. Tách thẻ"];
pub const RETURN_LABELS: &[&str] = &["09. Trả hàng", "10. Hoàn tiền"];

/// 退款类的单据来源
pub const REFUND_SOURCE_TYPES: &[&str] = &["RETURN", "REFUND"];

/// 订单处理变体 (分类后仅计算一次)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderKind {
    SaleReturn,
    Cancellation,
    ServiceOrder,
    LoyaltyExchange,
    ServiceChange,
    BirthdayGift,
    Investment,
    BottleExchange,
    CardSplit,
    Ordinary,
}

impl OrderKind {
    /// 该变体自身识别用的标签 (校验时一并放行)
    pub fn own_labels(self) -> &'static [&'static str] {
        match self {
            Self::ServiceOrder => SERVICE_ORDER_LABELS,
            Self::LoyaltyExchange => LOYALTY_EXCHANGE_LABELS,
            Self::ServiceChange => SERVICE_CHANGE_LABELS,
            Self::BirthdayGift => BIRTHDAY_GIFT_LABELS,
            Self::Investment => INVESTMENT_LABELS,
            Self::BottleExchange => BOTTLE_EXCHANGE_LABELS,
            Self::CardSplit => CARD_SPLIT_LABELS,
            Self::SaleReturn | Self::Cancellation | Self::Ordinary => &[],
        }
    }

    /// 校验时放行的自身标签; 取消单可撤销任何特殊单
    pub fn accepts_own_label(self, label: &str) -> bool {
        match self {
            Self::Cancellation => LABELLED_KINDS
                .iter()
                .any(|kind| kind.own_labels().contains(&label)),
            other => other.own_labels().contains(&label),
        }
    }
}

/// 带识别标签的特殊变体
const LABELLED_KINDS: [OrderKind; 7] = [
    OrderKind::ServiceOrder,
    OrderKind::LoyaltyExchange,
    OrderKind::ServiceChange,
    OrderKind::BirthdayGift,
    OrderKind::Investment,
    OrderKind::BottleExchange,
    OrderKind::CardSplit,
];

/// 订单谓词 (任一行命中即为 true)
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderPredicates {
    pub is_return: bool,
    pub is_loyalty_exchange: bool,
    pub is_service_change: bool,
    pub is_birthday_gift: bool,
    pub is_investment: bool,
    pub is_card_split: bool,
    pub is_bottle_exchange: bool,
    pub is_service_order: bool,
}

impl OrderPredicates {
    pub fn any_special(&self) -> bool {
        self.is_loyalty_exchange
            || self.is_service_change
            || self.is_birthday_gift
            || self.is_investment
            || self.is_card_split
            || self.is_bottle_exchange
            || self.is_service_order
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Classification {
    pub doc_source_type: String,
    pub predicates: OrderPredicates,
    pub is_ordinary: bool,
    pub kind: OrderKind,
}

impl Classification {
    pub fn is_sale_return(&self) -> bool {
        self.doc_source_type == SALE_RETURN
    }

    /// 退货/退款来源 (服务单现金付款步骤使用)
    pub fn is_refund_sourced(&self) -> bool {
        self.predicates.is_return || REFUND_SOURCE_TYPES.contains(&self.doc_source_type.as_str())
    }
}

/// 去掉所有空白并转小写
pub fn normalize_label(label: &str) -> String {
    label
        .chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

fn matches_any(value: Option<&str>, patterns: &[&str]) -> bool {
    let Some(value) = value else {
        return false;
    };
    let normalized = normalize_label(value);
    !normalized.is_empty() && patterns.iter().any(|p| normalize_label(p) == normalized)
}

fn label_matches(line: &SaleLine, patterns: &[&str]) -> bool {
    matches_any(line.ordertype_name.as_deref(), patterns)
}

/// 服务单: 标签命中 或 单据类型编码命中, 两个信号取或
fn is_service_line(line: &SaleLine) -> bool {
    label_matches(line, SERVICE_ORDER_LABELS)
        || matches_any(line.ordertype.as_deref(), SERVICE_ORDER_CODES)
        || matches_any(line.ordertype.as_deref(), SERVICE_ORDER_LABELS)
}

pub fn is_cancellation_code(doc_code: &str) -> bool {
    doc_code.trim().to_ascii_uppercase().ends_with(CANCELLATION_SUFFIX)
}

/// 去掉作废后缀
pub fn strip_cancellation_suffix(doc_code: &str) -> &str {
    let trimmed = doc_code.trim();
    if is_cancellation_code(trimmed) {
        &trimmed[..trimmed.len() - CANCELLATION_SUFFIX.len()]
    } else {
        trimmed
    }
}

fn any_line(order: &Order, patterns: &[&str]) -> bool {
    order.lines.iter().any(|l| label_matches(l, patterns))
}

pub fn predicates(order: &Order) -> OrderPredicates {
    OrderPredicates {
        is_return: any_line(order, RETURN_LABELS),
        is_loyalty_exchange: any_line(order, LOYALTY_EXCHANGE_LABELS),
        is_service_change: any_line(order, SERVICE_CHANGE_LABELS),
        is_birthday_gift: any_line(order, BIRTHDAY_GIFT_LABELS),
        is_investment: any_line(order, INVESTMENT_LABELS),
        is_card_split: any_line(order, CARD_SPLIT_LABELS),
        is_bottle_exchange: any_line(order, BOTTLE_EXCHANGE_LABELS),
        is_service_order: order.lines.iter().any(is_service_line),
    }
}

/// 分类订单
///
/// 优先级: SALE_RETURN (含作废后缀) > 作废后缀 > 服务单 > 积分兑换 > 换服务 > 生日赠品
/// > 投资 > 换瓶 > 拆卡 > 普通。
pub fn classify(order: &Order) -> Classification {
    let doc_source_type = order.doc_source_type();
    let predicates = predicates(order);
    let is_ordinary = !predicates.any_special();
    let cancellation = is_cancellation_code(&order.doc_code);

    let kind = if doc_source_type == SALE_RETURN {
        if cancellation {
            OrderKind::Cancellation
        } else {
            OrderKind::SaleReturn
        }
    } else if cancellation {
        OrderKind::Cancellation
    } else if predicates.is_service_order {
        OrderKind::ServiceOrder
    } else if predicates.is_loyalty_exchange {
        OrderKind::LoyaltyExchange
    } else if predicates.is_service_change {
        OrderKind::ServiceChange
    } else if predicates.is_birthday_gift {
        OrderKind::BirthdayGift
    } else if predicates.is_investment {
        OrderKind::Investment
    } else if predicates.is_bottle_exchange {
        OrderKind::BottleExchange
    } else if predicates.is_card_split {
        OrderKind::CardSplit
    } else {
        OrderKind::Ordinary
    };

    Classification {
        doc_source_type,
        predicates,
        is_ordinary,
        kind,
    }
}
