use bigdecimal::{BigDecimal, Zero};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// 仓库出入库单 (ST=出库, RT=退货入库)
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockMovementRecord {
    pub id: i64,
    pub doc_code: String,
    pub so_code: String, // 关联的销售单号
    pub item_code: Option<String>,
    pub material_code: Option<String>,
    pub stock_code: Option<String>, // 实体仓库编码
    pub qty: BigDecimal,
    pub created_at: DateTime<Utc>,
}

/// 出入库方向
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MovementKind {
    Issue,
    Return,
}

impl StockMovementRecord {
    pub fn is_issue_code(&self) -> bool {
        self.doc_code.trim().to_ascii_uppercase().starts_with("ST")
    }

    pub fn is_return_code(&self) -> bool {
        self.doc_code.trim().to_ascii_uppercase().starts_with("RT")
    }

    /// 跨订单批量场景: 数量为负且不是 RT 单视为出库
    pub fn is_negative_issue(&self) -> bool {
        self.qty < BigDecimal::zero() && !self.is_return_code()
    }

    pub fn stock_code(&self) -> Option<&str> {
        self.stock_code
            .as_deref()
            .map(str::trim)
            .filter(|code| !code.is_empty())
    }
}

/// 某销售行匹配到的出/入库单
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MatchedMovements {
    pub issue: Option<StockMovementRecord>,
    #[serde(rename = "return")]
    pub return_record: Option<StockMovementRecord>,
}

impl MatchedMovements {
    pub fn is_empty(&self) -> bool {
        self.issue.is_none() && self.return_record.is_none()
    }

    /// 优先出库单的仓库, 其次退货单
    pub fn stock_code(&self) -> Option<&str> {
        self.issue
            .as_ref()
            .and_then(|r| r.stock_code())
            .or_else(|| self.return_record.as_ref().and_then(|r| r.stock_code()))
    }
}
