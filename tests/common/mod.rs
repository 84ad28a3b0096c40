#![allow(dead_code)]

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{NaiveDate, Utc};
use retail_invoice_sync::client::{AccountingClient, CardDataProvider};
use retail_invoice_sync::config::{SyncConfig, DEFAULT_ORDINARY_LABELS};
use retail_invoice_sync::db::{MetadataProvider, OrderStore};
use retail_invoice_sync::models::{
    AccountingResponse, CardSerial, CashioPayment, CustomerPayload, DepartmentInfo, DocumentAction,
    EmployeeStatus, InvoiceStatusRecord, PaymentOutcome, PaymentRequest, PlatformFee, ProductInfo,
    SaleLine, SalesDocumentPayload, StockMovementRecord,
};
use retail_invoice_sync::service::OrderTypeAllowList;
use retail_invoice_sync::{OrderOrchestrator, Result, SyncError};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub fn sale_line(id: i64, doc_code: &str, label: &str) -> SaleLine {
    SaleLine {
        id,
        doc_code: doc_code.to_string(),
        doc_date: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
        branch_code: "HN01".to_string(),
        customer_code: Some("KH001".to_string()),
        customer_name: Some("Nguyen Van A".to_string()),
        item_code: Some(format!("SP{:03}", id)),
        item_name: Some(format!("San pham {}", id)),
        ordertype: None,
        ordertype_name: Some(label.to_string()),
        product_type: Some("I".to_string()),
        doc_source_type: None,
        origin_doc_code: None,
        partner_code: None,
        qty: BigDecimal::from(1),
        price: BigDecimal::from(100),
        amount: BigDecimal::from(100),
        discount: BigDecimal::from(0),
        is_processed: false,
    }
}

pub fn service_line(id: i64, doc_code: &str) -> SaleLine {
    SaleLine {
        product_type: Some("S".to_string()),
        ..sale_line(id, doc_code, "02. Làm dịch vụ")
    }
}

pub fn movement(id: i64, doc_code: &str, so_code: &str, item_code: &str, stock_code: &str) -> StockMovementRecord {
    StockMovementRecord {
        id,
        doc_code: doc_code.to_string(),
        so_code: so_code.to_string(),
        item_code: Some(item_code.to_string()),
        material_code: None,
        stock_code: Some(stock_code.to_string()),
        qty: BigDecimal::from(1),
        created_at: Utc::now(),
    }
}

pub fn ok_response(guid: &str) -> AccountingResponse {
    AccountingResponse {
        status: Some(1),
        message: Some("OK".to_string()),
        guid: Some(guid.to_string()),
    }
}

pub fn failed_response(message: &str) -> AccountingResponse {
    AccountingResponse {
        status: Some(0),
        message: Some(message.to_string()),
        guid: None,
    }
}

/// 内存版订单存储, 状态表按 doc_code 覆盖
#[derive(Default)]
pub struct MemoryOrderStore {
    pub lines: Mutex<HashMap<String, Vec<SaleLine>>>,
    pub movements: Mutex<Vec<StockMovementRecord>>,
    pub statuses: Mutex<HashMap<String, InvoiceStatusRecord>>,
    pub processed: Mutex<Vec<String>>,
    pub fail_reads: Mutex<bool>,
    /// 标记已处理时返回错误
    pub fail_mark_processed: Mutex<bool>,
}

impl MemoryOrderStore {
    pub fn insert_lines(&self, lines: Vec<SaleLine>) {
        let mut map = self.lines.lock().unwrap();
        for line in lines {
            map.entry(line.doc_code.clone()).or_default().push(line);
        }
    }

    pub fn insert_movement(&self, record: StockMovementRecord) {
        self.movements.lock().unwrap().push(record);
    }

    pub fn status(&self, doc_code: &str) -> Option<InvoiceStatusRecord> {
        self.statuses.lock().unwrap().get(doc_code).cloned()
    }

    pub fn status_count(&self) -> usize {
        self.statuses.lock().unwrap().len()
    }

    pub fn is_processed(&self, doc_code: &str) -> bool {
        self.processed.lock().unwrap().iter().any(|c| c == doc_code)
    }
}

#[async_trait]
impl OrderStore for MemoryOrderStore {
    async fn load_sale_lines(&self, doc_code: &str) -> Result<Vec<SaleLine>> {
        if *self.fail_reads.lock().unwrap() {
            return Err(SyncError::InvalidInput("mất kết nối".to_string()));
        }
        Ok(self.lines.lock().unwrap().get(doc_code).cloned().unwrap_or_default())
    }

    async fn find_movements(&self, so_codes: &[String]) -> Result<Vec<StockMovementRecord>> {
        Ok(self
            .movements
            .lock()
            .unwrap()
            .iter()
            .filter(|m| so_codes.contains(&m.so_code))
            .cloned()
            .collect())
    }

    async fn find_invoice_status(&self, doc_code: &str) -> Result<Option<InvoiceStatusRecord>> {
        Ok(self.status(doc_code))
    }

    async fn upsert_invoice_status(&self, record: &InvoiceStatusRecord) -> Result<()> {
        let mut statuses = self.statuses.lock().unwrap();
        let merged = record.clone().merge_into(statuses.get(&record.doc_code));
        statuses.insert(record.doc_code.clone(), merged);
        Ok(())
    }

    async fn mark_processed(&self, doc_code: &str) -> Result<u64> {
        if *self.fail_mark_processed.lock().unwrap() {
            return Err(SyncError::InvalidInput("khóa bảng".to_string()));
        }
        let mut processed = self.processed.lock().unwrap();
        if processed.iter().any(|c| c == doc_code) {
            return Ok(0);
        }
        processed.push(doc_code.to_string());
        let count = self
            .lines
            .lock()
            .unwrap()
            .get(doc_code)
            .map(|l| l.len())
            .unwrap_or(0);
        Ok(count as u64)
    }

    async fn list_pending_doc_codes(&self, limit: i64) -> Result<Vec<String>> {
        let processed = self.processed.lock().unwrap();
        let mut codes: Vec<String> = self
            .lines
            .lock()
            .unwrap()
            .keys()
            .filter(|c| !processed.contains(c))
            .cloned()
            .collect();
        codes.sort();
        codes.truncate(limit as usize);
        Ok(codes)
    }
}

/// 内存版主数据: 仓库映射 KHO-x -> WH-x
#[derive(Default)]
pub struct MemoryMetadata {
    pub warehouses: HashMap<String, String>,
}

impl MemoryMetadata {
    pub fn with_warehouse(mut self, stock_code: &str, warehouse_code: &str) -> Self {
        self.warehouses
            .insert(stock_code.to_string(), warehouse_code.to_string());
        self
    }
}

#[async_trait]
impl MetadataProvider for MemoryMetadata {
    async fn products_by_code(&self, item_codes: &[String]) -> Result<HashMap<String, ProductInfo>> {
        Ok(item_codes
            .iter()
            .map(|code| {
                (
                    code.clone(),
                    ProductInfo {
                        item_code: code.clone(),
                        item_name: format!("Hang {}", code),
                        material_code: None,
                        unit: Some("Cái".to_string()),
                        is_loyalty_item: false,
                        loyalty_points: None,
                    },
                )
            })
            .collect())
    }

    async fn departments_by_branch(&self, branch_codes: &[String]) -> Result<HashMap<String, DepartmentInfo>> {
        Ok(branch_codes
            .iter()
            .map(|branch| {
                (
                    branch.clone(),
                    DepartmentInfo {
                        branch_code: branch.clone(),
                        department_code: format!("BP-{}", branch),
                        department_name: None,
                        default_stock_code: None,
                    },
                )
            })
            .collect())
    }

    async fn warehouses_by_stock_code(&self, stock_codes: &[String]) -> Result<HashMap<String, String>> {
        Ok(stock_codes
            .iter()
            .filter_map(|code| self.warehouses.get(code).map(|w| (code.clone(), w.clone())))
            .collect())
    }

    async fn employee_status_by_partner(&self, _partner_codes: &[String]) -> Result<HashMap<String, EmployeeStatus>> {
        Ok(HashMap::new())
    }

    async fn platform_fees_by_order(&self, _doc_codes: &[String]) -> Result<HashMap<String, Vec<PlatformFee>>> {
        Ok(HashMap::new())
    }
}

#[derive(Default)]
pub struct StubCards {
    pub serials: HashMap<String, Vec<CardSerial>>,
    pub fail: bool,
}

#[async_trait]
impl CardDataProvider for StubCards {
    async fn card_serials(&self, doc_codes: &[String]) -> Result<HashMap<String, Vec<CardSerial>>> {
        if self.fail {
            return Err(SyncError::InvalidInput("hết thời gian chờ".to_string()));
        }
        Ok(doc_codes
            .iter()
            .filter_map(|code| self.serials.get(code).map(|s| (code.clone(), s.clone())))
            .collect())
    }
}

/// 记录调用的会计系统替身
pub struct RecordingAccountingClient {
    pub sales_order_calls: AtomicUsize,
    pub sales_invoice_calls: AtomicUsize,
    pub sales_return_calls: AtomicUsize,
    pub gxt_calls: AtomicUsize,
    pub customer_calls: AtomicUsize,
    pub payment_calls: AtomicUsize,
    pub cashio_calls: AtomicUsize,
    pub last_action: Mutex<Option<DocumentAction>>,
    pub last_payload: Mutex<Option<SalesDocumentPayload>>,
    pub last_invoice_payload: Mutex<Option<SalesDocumentPayload>>,
    pub last_payment: Mutex<Option<PaymentRequest>>,
    pub sales_order_response: Mutex<Vec<AccountingResponse>>,
    pub sales_invoice_response: Mutex<Vec<AccountingResponse>>,
    pub sales_return_response: Mutex<Vec<AccountingResponse>>,
    pub payment_response: Mutex<PaymentOutcome>,
    pub gxt_response: Mutex<Value>,
    /// 销售订单接口直接返回错误
    pub fail_sales_order: Mutex<bool>,
}

impl Default for RecordingAccountingClient {
    fn default() -> Self {
        Self {
            sales_order_calls: AtomicUsize::new(0),
            sales_invoice_calls: AtomicUsize::new(0),
            sales_return_calls: AtomicUsize::new(0),
            gxt_calls: AtomicUsize::new(0),
            customer_calls: AtomicUsize::new(0),
            payment_calls: AtomicUsize::new(0),
            cashio_calls: AtomicUsize::new(0),
            last_action: Mutex::new(None),
            last_payload: Mutex::new(None),
            last_invoice_payload: Mutex::new(None),
            last_payment: Mutex::new(None),
            sales_order_response: Mutex::new(vec![ok_response("g1")]),
            sales_invoice_response: Mutex::new(vec![ok_response("inv1")]),
            sales_return_response: Mutex::new(vec![ok_response("rt1")]),
            payment_response: Mutex::new(PaymentOutcome {
                payment_results: vec![ok_response("pay1")],
                debit_advice_results: Vec::new(),
            }),
            gxt_response: Mutex::new(json!({ "status": 1 })),
            fail_sales_order: Mutex::new(false),
        }
    }
}

impl RecordingAccountingClient {
    pub fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }

    pub fn total_calls(&self) -> usize {
        [
            &self.sales_order_calls,
            &self.sales_invoice_calls,
            &self.sales_return_calls,
            &self.gxt_calls,
            &self.customer_calls,
            &self.payment_calls,
            &self.cashio_calls,
        ]
        .iter()
        .map(|c| Self::count(c))
        .sum()
    }
}

#[async_trait]
impl AccountingClient for RecordingAccountingClient {
    async fn create_sales_order(
        &self,
        payload: &SalesDocumentPayload,
        action: Option<DocumentAction>,
    ) -> Result<Vec<AccountingResponse>> {
        self.sales_order_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_action.lock().unwrap() = action;
        *self.last_payload.lock().unwrap() = Some(payload.clone());
        if *self.fail_sales_order.lock().unwrap() {
            return Err(SyncError::AccountingApi {
                endpoint: "api/sales-order".to_string(),
                status: 502,
                body: "Bad Gateway".to_string(),
            });
        }
        Ok(self.sales_order_response.lock().unwrap().clone())
    }

    async fn create_sales_invoice(&self, payload: &SalesDocumentPayload) -> Result<Vec<AccountingResponse>> {
        self.sales_invoice_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_invoice_payload.lock().unwrap() = Some(payload.clone());
        Ok(self.sales_invoice_response.lock().unwrap().clone())
    }

    async fn create_sales_return(&self, _payload: &SalesDocumentPayload) -> Result<Vec<AccountingResponse>> {
        self.sales_return_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.sales_return_response.lock().unwrap().clone())
    }

    async fn create_gxt_invoice(&self, _payload: &SalesDocumentPayload) -> Result<Value> {
        self.gxt_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.gxt_response.lock().unwrap().clone())
    }

    async fn create_or_update_customer(&self, _payload: &CustomerPayload) -> Result<Value> {
        self.customer_calls.fetch_add(1, Ordering::SeqCst);
        Ok(json!({ "status": 1 }))
    }

    async fn process_payment(&self, request: &PaymentRequest) -> Result<PaymentOutcome> {
        self.payment_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_payment.lock().unwrap() = Some(request.clone());
        Ok(self.payment_response.lock().unwrap().clone())
    }

    async fn process_cashio_payment(&self, _payment: &CashioPayment) -> Result<Value> {
        self.cashio_calls.fetch_add(1, Ordering::SeqCst);
        Ok(json!({ "status": 1 }))
    }
}

pub fn calls(counter: &AtomicUsize) -> usize {
    RecordingAccountingClient::count(counter)
}

/// 组装好的编排器和各个替身
pub struct Harness {
    pub orchestrator: OrderOrchestrator,
    pub accounting: Arc<RecordingAccountingClient>,
    pub store: Arc<MemoryOrderStore>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with(MemoryMetadata::default(), StubCards::default(), SyncConfig::default())
    }

    pub fn with(metadata: MemoryMetadata, cards: StubCards, config: SyncConfig) -> Self {
        let accounting = Arc::new(RecordingAccountingClient::default());
        let store = Arc::new(MemoryOrderStore::default());
        let orchestrator = OrderOrchestrator::new(
            accounting.clone(),
            store.clone(),
            Arc::new(metadata),
            Arc::new(cards),
            Arc::new(OrderTypeAllowList::new(DEFAULT_ORDINARY_LABELS)),
            &config,
        );
        Self {
            orchestrator,
            accounting,
            store,
        }
    }
}
