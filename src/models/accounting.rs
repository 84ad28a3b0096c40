use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 会计系统单据响应, status=1 表示成功
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccountingResponse {
    #[serde(default)]
    pub status: Option<i32>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub guid: Option<String>,
}

impl AccountingResponse {
    pub fn is_success(&self) -> bool {
        self.status == Some(1)
    }

    /// 会计系统返回的有效信息 (过滤空值和单独的 "OK")
    pub fn informative_message(&self) -> Option<&str> {
        self.message
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty() && !m.eq_ignore_ascii_case("ok"))
    }
}

/// 取响应数组第一项判断是否成功
pub fn first_success(responses: &[AccountingResponse]) -> bool {
    responses.first().is_some_and(AccountingResponse::is_success)
}

/// 通用响应 (status 可能缺失)
pub fn value_is_success(value: &Value) -> bool {
    value.get("status").and_then(Value::as_i64) == Some(1)
}

/// 销售订单的附加动作
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentAction {
    Create,
    Cancel,
}

/// 提交到会计系统的销售类单据
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SalesDocumentPayload {
    pub doc_code: String,
    pub doc_date: NaiveDate,
    pub branch_code: String,
    pub department_code: Option<String>,
    pub customer_code: Option<String>,
    pub customer_name: Option<String>,
    pub order_type: Option<String>,
    pub doc_source_type: String,
    pub description: String,
    pub lines: Vec<SalesDocumentLine>,
    pub platform_fee: Option<BigDecimal>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SalesDocumentLine {
    pub line_id: i64,
    pub item_code: String,
    pub item_name: Option<String>,
    pub material_code: Option<String>,
    pub unit: Option<String>,
    pub product_type: Option<String>,
    pub qty: BigDecimal,
    pub price: BigDecimal,
    pub amount: BigDecimal,
    pub discount: BigDecimal,
    pub warehouse_code: Option<String>,
    pub issue_doc_code: Option<String>,
    pub return_doc_code: Option<String>,
    pub partner_code: Option<String>,
    pub serial: Option<String>,
    pub is_loyalty_item: bool,
    pub is_employee_sale: bool,
}

/// 客户新增/更新
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerPayload {
    pub customer_code: String,
    pub customer_name: Option<String>,
    pub branch_code: String,
}

/// 收款处理请求
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentRequest {
    pub doc_code: String,
    pub branch_code: String,
    pub doc_date: NaiveDate,
    pub customer_code: Option<String>,
    pub invoice: Option<AccountingResponse>,
    pub stock_codes: Vec<String>,
    pub allow_without_stock_codes: bool,
}

/// 收款处理结果 (现金/银行)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentOutcome {
    #[serde(default)]
    pub payment_results: Vec<AccountingResponse>,
    #[serde(default)]
    pub debit_advice_results: Vec<AccountingResponse>,
}

impl PaymentOutcome {
    /// 任一收款/付款通知失败
    pub fn has_failure(&self) -> bool {
        self.payment_results
            .iter()
            .chain(self.debit_advice_results.iter())
            .any(|r| !r.is_success())
    }

    pub fn failure_messages(&self) -> Vec<String> {
        self.payment_results
            .iter()
            .chain(self.debit_advice_results.iter())
            .filter(|r| !r.is_success())
            .map(|r| {
                r.informative_message()
                    .unwrap_or("không rõ lỗi")
                    .to_string()
            })
            .collect()
    }
}

/// 现金收/付款单
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CashioPayment {
    pub doc_code: String,
    pub doc_date: NaiveDate,
    pub branch_code: String,
    pub customer_code: Option<String>,
    pub warehouse_codes: Vec<String>,
    pub amount: BigDecimal,
    pub description: String,
}
