use crate::models::InvoiceStatus;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 变体处理器的执行结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandlerOutcome {
    pub result: Value,
    pub status: InvoiceStatus,
    pub message: String,
    pub guid: Option<String>,
    /// 会计系统原始响应
    pub raw_response: Option<Value>,
    /// 尽力而为步骤的失败 (不影响主状态, 服务单收款除外)
    pub warnings: Vec<String>,
}

impl HandlerOutcome {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            result: Value::Null,
            status: InvoiceStatus::Success,
            message: message.into(),
            guid: None,
            raw_response: None,
            warnings: Vec::new(),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            status: InvoiceStatus::Failed,
            ..Self::success(message)
        }
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    pub fn warn(&mut self, warning: impl Into<String>) {
        let warning = warning.into();
        tracing::warn!("{}", warning);
        self.warnings.push(warning);
    }
}

/// 对外返回的处理结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessResult {
    pub success: bool,
    pub message: String,
    pub result: Value,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl ProcessResult {
    pub fn from_outcome(outcome: &HandlerOutcome) -> Self {
        Self {
            success: outcome.is_success(),
            message: outcome.message.clone(),
            result: outcome.result.clone(),
            warnings: outcome.warnings.clone(),
        }
    }
}
