use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// 商品主数据 (含积分商品标记)
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductInfo {
    pub item_code: String,
    pub item_name: String,
    pub material_code: Option<String>,
    pub unit: Option<String>,
    pub is_loyalty_item: bool,
    pub loyalty_points: Option<BigDecimal>,
}

/// 门店对应的部门
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepartmentInfo {
    pub branch_code: String,
    pub department_code: String,
    pub department_name: Option<String>,
    pub default_stock_code: Option<String>,
}

/// 实体仓库 -> 会计系统仓库编码
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct WarehouseMapping {
    pub stock_code: String,
    pub warehouse_code: String,
}

/// 员工状态 (按合作方编码查询)
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmployeeStatus {
    pub partner_code: String,
    pub is_employee: bool,
    pub is_active: bool,
}

/// 电商平台费用 (由平台费用导入生成)
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformFee {
    pub doc_code: String,
    pub platform: String,
    pub fee_type: String,
    pub amount: BigDecimal,
}

/// 卡/序列号数据
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CardSerial {
    pub doc_code: String,
    pub item_code: String,
    pub serial: String,
    pub issue_partner_code: Option<String>,
}
