use crate::models::{Order, ProcessResult};
use crate::service::OrderOrchestrator;
use axum::{
    extract::{Json, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// 共享状态
#[derive(Clone)]
pub struct AppState {
    pub orchestrator: Arc<OrderOrchestrator>,
    pub batch_limit: i64,
}

/// 请求体: 单个订单
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessOrderRequest {
    pub doc_code: String,
    /// 调用方已取得的订单数据, 为空时从库中加载
    #[serde(default)]
    pub order: Option<Order>,
    #[serde(default)]
    pub force_retry: bool,
}

/// 请求体: 单号列表
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchProcessRequest {
    pub doc_codes: Vec<String>,
    #[serde(default)]
    pub force_retry: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct PendingRequest {
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct OrderTypeRequest {
    pub label: String,
}

/// 批量响应体
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchProcessResponse {
    pub success: bool,
    pub message: String,
    pub results: Vec<OrderResult>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderResult {
    pub doc_code: String,
    #[serde(flatten)]
    pub result: ProcessResult,
}

#[derive(Debug, Serialize)]
pub struct AllowListResponse {
    pub changed: bool,
    pub labels: Vec<String>,
}

/// 健康检查
pub async fn health_check() -> &'static str {
    "OK"
}

/// 处理单个订单 (业务失败同样返回 200, 由 success 字段区分)
pub async fn process_order(
    State(state): State<AppState>,
    Json(req): Json<ProcessOrderRequest>,
) -> Response {
    if req.doc_code.trim().is_empty() {
        let response = ProcessResult {
            success: false,
            message: "docCode không được để trống".to_string(),
            result: serde_json::Value::Null,
            warnings: Vec::new(),
        };
        return (StatusCode::BAD_REQUEST, Json(response)).into_response();
    }

    let result = state
        .orchestrator
        .process_order(&req.doc_code, req.order, req.force_retry)
        .await;
    (StatusCode::OK, Json(result)).into_response()
}

/// 批量处理订单
pub async fn process_batch(
    State(state): State<AppState>,
    Json(req): Json<BatchProcessRequest>,
) -> Response {
    let results = state
        .orchestrator
        .process_batch(&req.doc_codes, req.force_retry)
        .await;
    (StatusCode::OK, Json(batch_response(results))).into_response()
}

/// 处理库中未处理的订单
pub async fn process_pending(
    State(state): State<AppState>,
    body: Option<Json<PendingRequest>>,
) -> Response {
    let limit = body
        .and_then(|Json(req)| req.limit)
        .unwrap_or(state.batch_limit)
        .max(1);

    match state.orchestrator.process_pending(limit).await {
        Ok(results) => (StatusCode::OK, Json(batch_response(results))).into_response(),
        Err(e) => {
            let response = BatchProcessResponse {
                success: false,
                message: format!("Error: {}", e),
                results: Vec::new(),
            };
            (StatusCode::INTERNAL_SERVER_ERROR, Json(response)).into_response()
        }
    }
}

/// 查看普通单据类型白名单
pub async fn list_order_types(State(state): State<AppState>) -> Response {
    (StatusCode::OK, Json(allow_list_response(&state, false))).into_response()
}

pub async fn add_order_type(
    State(state): State<AppState>,
    Json(req): Json<OrderTypeRequest>,
) -> Response {
    let changed = state.orchestrator.allow_list().add(&req.label);
    tracing::info!("[API] 白名单新增 '{}': {}", req.label, changed);
    (StatusCode::OK, Json(allow_list_response(&state, changed))).into_response()
}

pub async fn remove_order_type(
    State(state): State<AppState>,
    Json(req): Json<OrderTypeRequest>,
) -> Response {
    let changed = state.orchestrator.allow_list().remove(&req.label);
    tracing::info!("[API] 白名单移除 '{}': {}", req.label, changed);
    (StatusCode::OK, Json(allow_list_response(&state, changed))).into_response()
}

fn batch_response(results: Vec<(String, ProcessResult)>) -> BatchProcessResponse {
    let total = results.len();
    let succeeded = results.iter().filter(|(_, r)| r.success).count();
    BatchProcessResponse {
        success: succeeded == total,
        message: format!("Processed {} orders, {} succeeded", total, succeeded),
        results: results
            .into_iter()
            .map(|(doc_code, result)| OrderResult { doc_code, result })
            .collect(),
    }
}

fn allow_list_response(state: &AppState, changed: bool) -> AllowListResponse {
    AllowListResponse {
        changed,
        labels: state.orchestrator.allow_list().snapshot().into_iter().collect(),
    }
}
