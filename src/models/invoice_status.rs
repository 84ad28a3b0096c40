use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// 处理状态 (0=失败, 1=成功)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvoiceStatus {
    Failed,
    Success,
}

impl InvoiceStatus {
    pub fn code(self) -> i32 {
        match self {
            Self::Failed => 0,
            Self::Success => 1,
        }
    }

    pub fn from_code(code: i32) -> Self {
        if code == 1 {
            Self::Success
        } else {
            Self::Failed
        }
    }

    pub fn is_success(self) -> bool {
        self == Self::Success
    }
}

/// 发票状态表, 每个 doc_code 仅一行
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceStatusRecord {
    pub doc_code: String,
    pub customer_code: Option<String>,
    pub customer_name: Option<String>,
    pub doc_date: Option<NaiveDate>,
    pub status: i32,
    pub message: String,
    pub guid: Option<String>,
    pub raw_response: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl InvoiceStatusRecord {
    pub fn status(&self) -> InvoiceStatus {
        InvoiceStatus::from_code(self.status)
    }

    /// 覆盖 status/message/guid/response, 新值为空时保留原客户信息
    pub fn merge_into(self, existing: Option<&InvoiceStatusRecord>) -> InvoiceStatusRecord {
        let Some(prev) = existing else {
            return self;
        };
        InvoiceStatusRecord {
            customer_code: self.customer_code.or_else(|| prev.customer_code.clone()),
            customer_name: self.customer_name.or_else(|| prev.customer_name.clone()),
            doc_date: self.doc_date.or(prev.doc_date),
            ..self
        }
    }
}
