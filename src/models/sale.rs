use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// 销售明细行 (SaleLine)
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaleLine {
    pub id: i64,
    pub doc_code: String,
    pub doc_date: NaiveDate,
    pub branch_code: String,
    pub customer_code: Option<String>,
    pub customer_name: Option<String>,
    pub item_code: Option<String>,
    pub item_name: Option<String>,
    pub ordertype: Option<String>,      // 单据类型编码
    pub ordertype_name: Option<String>, // 单据类型标签 (如 "01. Thường")
    pub product_type: Option<String>,   // S=服务 I=出库商品 V=券
    pub doc_source_type: Option<String>,
    pub origin_doc_code: Option<String>, // 退货单对应的原销售单
    pub partner_code: Option<String>,
    pub qty: BigDecimal,
    pub price: BigDecimal,
    pub amount: BigDecimal,
    pub discount: BigDecimal,
    pub is_processed: bool,
}

impl SaleLine {
    pub fn product_type(&self) -> ProductType {
        ProductType::from_code(self.product_type.as_deref())
    }

    /// 非空的商品编码
    pub fn item_code(&self) -> Option<&str> {
        self.item_code
            .as_deref()
            .map(str::trim)
            .filter(|code| !code.is_empty())
    }
}

/// 商品类型 (单字母编码)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProductType {
    Service,
    ItemExport,
    Voucher,
    Other,
}

impl ProductType {
    pub fn from_code(code: Option<&str>) -> Self {
        match code.map(|c| c.trim().to_ascii_uppercase()).as_deref() {
            Some("S") => Self::Service,
            Some("I") => Self::ItemExport,
            Some("V") => Self::Voucher,
            _ => Self::Other,
        }
    }
}

/// 零售订单 (由同一 doc_code 的销售明细聚合而成, 不落库)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub doc_code: String,
    pub doc_date: NaiveDate,
    pub branch_code: String,
    pub customer_code: Option<String>,
    pub customer_name: Option<String>,
    #[serde(default)]
    pub doc_source_type: Option<String>,
    pub lines: Vec<SaleLine>,
}

impl Order {
    /// 从销售明细聚合订单, 头信息取第一行
    pub fn from_lines(doc_code: &str, lines: Vec<SaleLine>) -> Option<Self> {
        let first = lines.first()?;
        Some(Self {
            doc_code: doc_code.to_string(),
            doc_date: first.doc_date,
            branch_code: first.branch_code.clone(),
            customer_code: first.customer_code.clone(),
            customer_name: first.customer_name.clone(),
            doc_source_type: first.doc_source_type.clone(),
            lines,
        })
    }

    /// 单据来源类型: 第一行优先, 其次订单级字段, 去空格转大写
    pub fn doc_source_type(&self) -> String {
        self.lines
            .first()
            .and_then(|l| l.doc_source_type.as_deref())
            .filter(|s| !s.trim().is_empty())
            .or(self.doc_source_type.as_deref())
            .map(|s| s.trim().to_uppercase())
            .unwrap_or_default()
    }

    /// 退货单的原销售单号 (取第一个非空值)
    pub fn origin_doc_code(&self) -> Option<&str> {
        self.lines
            .iter()
            .filter_map(|l| l.origin_doc_code.as_deref())
            .map(str::trim)
            .find(|code| !code.is_empty())
    }

    pub fn customer_code(&self) -> Option<&str> {
        self.customer_code
            .as_deref()
            .map(str::trim)
            .filter(|code| !code.is_empty())
    }

    pub fn lines_of(&self, product_type: ProductType) -> Vec<SaleLine> {
        self.lines
            .iter()
            .filter(|l| l.product_type() == product_type)
            .cloned()
            .collect()
    }

    pub fn has_lines_of(&self, product_type: ProductType) -> bool {
        self.lines.iter().any(|l| l.product_type() == product_type)
    }
}
