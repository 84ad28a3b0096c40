use crate::db::queries;
use crate::error::Result;
use crate::models::{
    DepartmentInfo, EmployeeStatus, InvoiceStatusRecord, PlatformFee, ProductInfo, SaleLine,
    StockMovementRecord,
};
use async_trait::async_trait;
use sqlx::PgPool;
use std::collections::HashMap;

/// 订单/出入库/状态表的持久化接口
#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn load_sale_lines(&self, doc_code: &str) -> Result<Vec<SaleLine>>;

    /// so_code ∈ so_codes 的出入库单
    async fn find_movements(&self, so_codes: &[String]) -> Result<Vec<StockMovementRecord>>;

    async fn find_invoice_status(&self, doc_code: &str) -> Result<Option<InvoiceStatusRecord>>;

    async fn upsert_invoice_status(&self, record: &InvoiceStatusRecord) -> Result<()>;

    /// 返回本次新标记的行数 (已处理的行不计)
    async fn mark_processed(&self, doc_code: &str) -> Result<u64>;

    async fn list_pending_doc_codes(&self, limit: i64) -> Result<Vec<String>>;
}

/// 主数据批量查询接口
#[async_trait]
pub trait MetadataProvider: Send + Sync {
    async fn products_by_code(&self, item_codes: &[String]) -> Result<HashMap<String, ProductInfo>>;

    async fn departments_by_branch(&self, branch_codes: &[String]) -> Result<HashMap<String, DepartmentInfo>>;

    /// 实体仓库编码 -> 会计系统仓库编码
    async fn warehouses_by_stock_code(&self, stock_codes: &[String]) -> Result<HashMap<String, String>>;

    async fn employee_status_by_partner(&self, partner_codes: &[String]) -> Result<HashMap<String, EmployeeStatus>>;

    async fn platform_fees_by_order(&self, doc_codes: &[String]) -> Result<HashMap<String, Vec<PlatformFee>>>;
}

/// PostgreSQL 实现
#[derive(Clone)]
pub struct PgOrderStore {
    pool: PgPool,
}

impl PgOrderStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OrderStore for PgOrderStore {
    async fn load_sale_lines(&self, doc_code: &str) -> Result<Vec<SaleLine>> {
        Ok(queries::list_sale_lines(&self.pool, doc_code).await?)
    }

    async fn find_movements(&self, so_codes: &[String]) -> Result<Vec<StockMovementRecord>> {
        if so_codes.is_empty() {
            return Ok(Vec::new());
        }
        Ok(queries::list_movements_by_so_codes(&self.pool, so_codes).await?)
    }

    async fn find_invoice_status(&self, doc_code: &str) -> Result<Option<InvoiceStatusRecord>> {
        Ok(queries::get_invoice_status(&self.pool, doc_code).await?)
    }

    async fn upsert_invoice_status(&self, record: &InvoiceStatusRecord) -> Result<()> {
        Ok(queries::upsert_invoice_status(&self.pool, record).await?)
    }

    async fn mark_processed(&self, doc_code: &str) -> Result<u64> {
        Ok(queries::mark_processed(&self.pool, doc_code).await?)
    }

    async fn list_pending_doc_codes(&self, limit: i64) -> Result<Vec<String>> {
        Ok(queries::list_pending_doc_codes(&self.pool, limit).await?)
    }
}

#[derive(Clone)]
pub struct PgMetadataProvider {
    pool: PgPool,
}

impl PgMetadataProvider {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MetadataProvider for PgMetadataProvider {
    async fn products_by_code(&self, item_codes: &[String]) -> Result<HashMap<String, ProductInfo>> {
        if item_codes.is_empty() {
            return Ok(HashMap::new());
        }
        let rows = queries::list_products(&self.pool, item_codes).await?;
        Ok(rows.into_iter().map(|p| (p.item_code.clone(), p)).collect())
    }

    async fn departments_by_branch(&self, branch_codes: &[String]) -> Result<HashMap<String, DepartmentInfo>> {
        if branch_codes.is_empty() {
            return Ok(HashMap::new());
        }
        let rows = queries::list_departments(&self.pool, branch_codes).await?;
        Ok(rows.into_iter().map(|d| (d.branch_code.clone(), d)).collect())
    }

    async fn warehouses_by_stock_code(&self, stock_codes: &[String]) -> Result<HashMap<String, String>> {
        if stock_codes.is_empty() {
            return Ok(HashMap::new());
        }
        let rows = queries::list_warehouse_mappings(&self.pool, stock_codes).await?;
        Ok(rows.into_iter().map(|w| (w.stock_code, w.warehouse_code)).collect())
    }

    async fn employee_status_by_partner(&self, partner_codes: &[String]) -> Result<HashMap<String, EmployeeStatus>> {
        if partner_codes.is_empty() {
            return Ok(HashMap::new());
        }
        let rows = queries::list_employee_status(&self.pool, partner_codes).await?;
        Ok(rows.into_iter().map(|e| (e.partner_code.clone(), e)).collect())
    }

    async fn platform_fees_by_order(&self, doc_codes: &[String]) -> Result<HashMap<String, Vec<PlatformFee>>> {
        if doc_codes.is_empty() {
            return Ok(HashMap::new());
        }
        let mut fees: HashMap<String, Vec<PlatformFee>> = HashMap::new();
        for fee in queries::list_platform_fees(&self.pool, doc_codes).await? {
            fees.entry(fee.doc_code.clone()).or_default().push(fee);
        }
        Ok(fees)
    }
}
