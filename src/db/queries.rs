use crate::models::{
    DepartmentInfo, EmployeeStatus, InvoiceStatusRecord, PlatformFee, ProductInfo, SaleLine,
    StockMovementRecord, WarehouseMapping,
};
use sqlx::PgPool;

/// 查询订单的全部销售明细
pub async fn list_sale_lines(pool: &PgPool, doc_code: &str) -> Result<Vec<SaleLine>, sqlx::Error> {
    sqlx::query_as::<_, SaleLine>(
        r#"
        SELECT id, doc_code, doc_date, branch_code, customer_code, customer_name,
               item_code, item_name, ordertype, ordertype_name, product_type,
               doc_source_type, origin_doc_code, partner_code,
               qty, price, amount, discount, is_processed
        FROM t_sale
        WHERE doc_code = $1
        ORDER BY id
        "#,
    )
    .bind(doc_code)
    .fetch_all(pool)
    .await
}

/// 查询关联到指定销售单号的出入库单 (按单据号升序)
pub async fn list_movements_by_so_codes(
    pool: &PgPool,
    so_codes: &[String],
) -> Result<Vec<StockMovementRecord>, sqlx::Error> {
    sqlx::query_as::<_, StockMovementRecord>(
        r#"
        SELECT id, doc_code, so_code, item_code, material_code, stock_code, qty, created_at
        FROM t_stock_transfer
        WHERE so_code = ANY($1)
        ORDER BY doc_code, id
        "#,
    )
    .bind(so_codes)
    .fetch_all(pool)
    .await
}

/// 查询发票状态
pub async fn get_invoice_status(
    pool: &PgPool,
    doc_code: &str,
) -> Result<Option<InvoiceStatusRecord>, sqlx::Error> {
    sqlx::query_as::<_, InvoiceStatusRecord>(
        r#"
        SELECT doc_code, customer_code, customer_name, doc_date, status, message,
               guid, raw_response, updated_at
        FROM t_sale_invoice_status
        WHERE doc_code = $1
        "#,
    )
    .bind(doc_code)
    .fetch_optional(pool)
    .await
}

/// 按 doc_code 幂等写入发票状态, 新客户信息为空时保留原值
pub async fn upsert_invoice_status(
    pool: &PgPool,
    record: &InvoiceStatusRecord,
) -> Result<(), sqlx::Error> {
    let result = sqlx::query(
        r#"
        INSERT INTO t_sale_invoice_status (
            doc_code, customer_code, customer_name, doc_date,
            status, message, guid, raw_response, updated_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        ON CONFLICT (doc_code) DO UPDATE SET
            customer_code = COALESCE(EXCLUDED.customer_code, t_sale_invoice_status.customer_code),
            customer_name = COALESCE(EXCLUDED.customer_name, t_sale_invoice_status.customer_name),
            doc_date      = COALESCE(EXCLUDED.doc_date, t_sale_invoice_status.doc_date),
            status        = EXCLUDED.status,
            message       = EXCLUDED.message,
            guid          = EXCLUDED.guid,
            raw_response  = EXCLUDED.raw_response,
            updated_at    = EXCLUDED.updated_at
        "#,
    )
    .bind(&record.doc_code)
    .bind(&record.customer_code)
    .bind(&record.customer_name)
    .bind(record.doc_date)
    .bind(record.status)
    .bind(&record.message)
    .bind(&record.guid)
    .bind(&record.raw_response)
    .bind(record.updated_at)
    .execute(pool)
    .await?;

    tracing::debug!("发票状态写入 {}: 影响 {} 行", record.doc_code, result.rows_affected());
    Ok(())
}

/// 标记订单所有销售明细为已处理
pub async fn mark_processed(pool: &PgPool, doc_code: &str) -> Result<u64, sqlx::Error> {
    let result = sqlx::query(
        r#"
        UPDATE t_sale
        SET is_processed = TRUE
        WHERE doc_code = $1
          AND is_processed = FALSE
        "#,
    )
    .bind(doc_code)
    .execute(pool)
    .await?;
    Ok(result.rows_affected())
}

/// 待处理订单号 (按最早明细排序)
pub async fn list_pending_doc_codes(pool: &PgPool, limit: i64) -> Result<Vec<String>, sqlx::Error> {
    sqlx::query_scalar::<_, String>(
        r#"
        SELECT doc_code
        FROM t_sale
        WHERE is_processed = FALSE
        GROUP BY doc_code
        ORDER BY MIN(id)
        LIMIT $1
        "#,
    )
    .bind(limit)
    .fetch_all(pool)
    .await
}

pub async fn list_products(pool: &PgPool, item_codes: &[String]) -> Result<Vec<ProductInfo>, sqlx::Error> {
    sqlx::query_as::<_, ProductInfo>(
        r#"
        SELECT item_code, item_name, material_code, unit, is_loyalty_item, loyalty_points
        FROM t_product
        WHERE item_code = ANY($1)
        "#,
    )
    .bind(item_codes)
    .fetch_all(pool)
    .await
}

pub async fn list_departments(
    pool: &PgPool,
    branch_codes: &[String],
) -> Result<Vec<DepartmentInfo>, sqlx::Error> {
    sqlx::query_as::<_, DepartmentInfo>(
        r#"
        SELECT branch_code, department_code, department_name, default_stock_code
        FROM t_department
        WHERE branch_code = ANY($1)
        "#,
    )
    .bind(branch_codes)
    .fetch_all(pool)
    .await
}

pub async fn list_warehouse_mappings(
    pool: &PgPool,
    stock_codes: &[String],
) -> Result<Vec<WarehouseMapping>, sqlx::Error> {
    sqlx::query_as::<_, WarehouseMapping>(
        r#"
        SELECT stock_code, warehouse_code
        FROM t_warehouse_mapping
        WHERE stock_code = ANY($1)
        "#,
    )
    .bind(stock_codes)
    .fetch_all(pool)
    .await
}

pub async fn list_employee_status(
    pool: &PgPool,
    partner_codes: &[String],
) -> Result<Vec<EmployeeStatus>, sqlx::Error> {
    sqlx::query_as::<_, EmployeeStatus>(
        r#"
        SELECT partner_code, is_employee, is_active
        FROM t_employee_status
        WHERE partner_code = ANY($1)
        "#,
    )
    .bind(partner_codes)
    .fetch_all(pool)
    .await
}

pub async fn list_platform_fees(
    pool: &PgPool,
    doc_codes: &[String],
) -> Result<Vec<PlatformFee>, sqlx::Error> {
    sqlx::query_as::<_, PlatformFee>(
        r#"
        SELECT doc_code, platform, fee_type, amount
        FROM t_platform_fee
        WHERE doc_code = ANY($1)
        ORDER BY doc_code, id
        "#,
    )
    .bind(doc_codes)
    .fetch_all(pool)
    .await
}
