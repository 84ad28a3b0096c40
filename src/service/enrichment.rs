//! 销售明细补全/拆分
//!
//! 把匹配到的出入库单、商品主数据、部门、仓库映射、员工状态和平台费用
//! 补到销售行上, 生成提交会计系统的单据。外部查询通过共享信号量限流。

use crate::db::MetadataProvider;
use crate::error::Result;
use crate::models::{
    CardSerial, DepartmentInfo, EmployeeStatus, Order, PlatformFee, ProductInfo, SaleLine,
    SalesDocumentLine, SalesDocumentPayload,
};
use crate::service::matcher::Assignment;
use bigdecimal::{BigDecimal, ToPrimitive, Zero};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::Semaphore;

/// 补全所需的主数据
#[derive(Debug, Clone, Default)]
pub struct EnrichmentContext {
    pub products: HashMap<String, ProductInfo>,
    pub departments: HashMap<String, DepartmentInfo>,
    pub warehouses: HashMap<String, String>,
    pub employees: HashMap<String, EmployeeStatus>,
    pub platform_fees: HashMap<String, Vec<PlatformFee>>,
}

impl EnrichmentContext {
    /// 把实体仓库编码映射为会计仓库编码 (保序去重, 未映射的丢弃)
    pub fn resolve_warehouse_codes(&self, stock_codes: &[String]) -> Vec<String> {
        let mut codes: Vec<String> = Vec::new();
        for stock_code in stock_codes {
            if let Some(code) = self.warehouses.get(stock_code) {
                if !codes.contains(code) {
                    codes.push(code.clone());
                }
            }
        }
        codes
    }

    fn is_employee(&self, partner_code: Option<&str>) -> bool {
        partner_code
            .and_then(|code| self.employees.get(code))
            .is_some_and(|e| e.is_employee && e.is_active)
    }

    fn platform_fee_total(&self, doc_code: &str) -> Option<BigDecimal> {
        let fees = self.platform_fees.get(doc_code)?;
        if fees.is_empty() {
            return None;
        }
        Some(fees.iter().fold(BigDecimal::zero(), |acc, f| acc + &f.amount))
    }
}

pub struct SaleEnricher {
    metadata: Arc<dyn MetadataProvider>,
    throttle: Arc<Semaphore>,
}

impl SaleEnricher {
    pub fn new(metadata: Arc<dyn MetadataProvider>, throttle: Arc<Semaphore>) -> Self {
        Self { metadata, throttle }
    }

    /// 批量拉取补全所需主数据, 每次外部查询占用一个并发许可
    pub async fn load_context(
        &self,
        order: &Order,
        lines: &[SaleLine],
        assignment: &Assignment,
    ) -> Result<EnrichmentContext> {
        let item_codes: Vec<String> = distinct(lines.iter().filter_map(|l| l.item_code()));
        let partner_codes: Vec<String> =
            distinct(lines.iter().filter_map(|l| l.partner_code.as_deref()));
        let branch_codes = vec![order.branch_code.clone()];

        let products = {
            let _permit = self.permit().await;
            self.metadata.products_by_code(&item_codes).await?
        };
        let departments = {
            let _permit = self.permit().await;
            self.metadata.departments_by_branch(&branch_codes).await?
        };

        let mut stock_codes = assignment.stock_codes();
        if let Some(default_stock) = departments
            .get(&order.branch_code)
            .and_then(|d| d.default_stock_code.clone())
        {
            if !stock_codes.contains(&default_stock) {
                stock_codes.push(default_stock);
            }
        }
        let warehouses = {
            let _permit = self.permit().await;
            self.metadata.warehouses_by_stock_code(&stock_codes).await?
        };
        let employees = {
            let _permit = self.permit().await;
            self.metadata.employee_status_by_partner(&partner_codes).await?
        };
        let platform_fees = {
            let _permit = self.permit().await;
            self.metadata
                .platform_fees_by_order(&[order.doc_code.clone()])
                .await?
        };

        tracing::debug!(
            "[Enrichment] {}: 商品 {}/{}, 仓库映射 {}/{}",
            order.doc_code,
            products.len(),
            item_codes.len(),
            warehouses.len(),
            stock_codes.len()
        );

        Ok(EnrichmentContext {
            products,
            departments,
            warehouses,
            employees,
            platform_fees,
        })
    }

    /// 只解析仓库编码 (退货/作废单的收付款步骤使用)
    pub async fn resolve_warehouse_codes(&self, stock_codes: &[String]) -> Result<Vec<String>> {
        if stock_codes.is_empty() {
            return Ok(Vec::new());
        }
        let mapping = {
            let _permit = self.permit().await;
            self.metadata.warehouses_by_stock_code(stock_codes).await?
        };
        let ctx = EnrichmentContext {
            warehouses: mapping,
            ..Default::default()
        };
        Ok(ctx.resolve_warehouse_codes(stock_codes))
    }

    pub async fn enrich(
        &self,
        order: &Order,
        lines: &[SaleLine],
        assignment: &Assignment,
        description: &str,
    ) -> Result<(SalesDocumentPayload, EnrichmentContext)> {
        let ctx = self.load_context(order, lines, assignment).await?;
        let payload = build_payload(order, lines, assignment, &ctx, description);
        Ok((payload, ctx))
    }

    async fn permit(&self) -> Option<tokio::sync::SemaphorePermit<'_>> {
        // 信号量不会被关闭, 失败时退化为不限流
        self.throttle.acquire().await.ok()
    }
}

fn distinct<'a>(codes: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for code in codes.map(str::trim).filter(|c| !c.is_empty()) {
        if !out.iter().any(|c| c == code) {
            out.push(code.to_string());
        }
    }
    out
}

/// 生成会计单据 (纯函数)
pub fn build_payload(
    order: &Order,
    lines: &[SaleLine],
    assignment: &Assignment,
    ctx: &EnrichmentContext,
    description: &str,
) -> SalesDocumentPayload {
    let department = ctx.departments.get(&order.branch_code);
    let default_warehouse = department
        .and_then(|d| d.default_stock_code.as_ref())
        .and_then(|s| ctx.warehouses.get(s))
        .cloned();

    let document_lines = lines
        .iter()
        .filter_map(|line| {
            let item_code = line.item_code()?.to_string();
            let product = ctx.products.get(&item_code);
            let matched = assignment.get(line.id);
            let warehouse_code = matched
                .and_then(|m| m.stock_code())
                .and_then(|s| ctx.warehouses.get(s))
                .cloned()
                .or_else(|| default_warehouse.clone());

            Some(SalesDocumentLine {
                line_id: line.id,
                item_name: line
                    .item_name
                    .clone()
                    .or_else(|| product.map(|p| p.item_name.clone())),
                material_code: product.and_then(|p| p.material_code.clone()),
                unit: product.and_then(|p| p.unit.clone()),
                product_type: line.product_type.clone(),
                qty: line.qty.clone(),
                price: line.price.clone(),
                amount: line.amount.clone(),
                discount: line.discount.clone(),
                warehouse_code,
                issue_doc_code: matched.and_then(|m| m.issue.as_ref().map(|r| r.doc_code.clone())),
                return_doc_code: matched
                    .and_then(|m| m.return_record.as_ref().map(|r| r.doc_code.clone())),
                partner_code: line.partner_code.clone(),
                serial: None,
                is_loyalty_item: product.is_some_and(|p| p.is_loyalty_item),
                is_employee_sale: ctx.is_employee(line.partner_code.as_deref()),
                item_code,
            })
        })
        .collect();

    SalesDocumentPayload {
        doc_code: order.doc_code.clone(),
        doc_date: order.doc_date,
        branch_code: order.branch_code.clone(),
        department_code: department.map(|d| d.department_code.clone()),
        customer_code: order.customer_code().map(str::to_string),
        customer_name: order.customer_name.clone(),
        order_type: order.lines.first().and_then(|l| l.ordertype_name.clone()),
        doc_source_type: order.doc_source_type(),
        description: description.to_string(),
        lines: document_lines,
        platform_fee: ctx.platform_fee_total(&order.doc_code),
    }
}

/// 拆卡: 按商品编码 FIFO 分配卡序列号, 写入发卡合作方编码
///
/// 数量为整数且分到序列号的行按序列号拆成单件行, 剩余数量保留为一行。
/// 返回未被分配的序列号数量。
pub fn apply_card_serials(payload: &mut SalesDocumentPayload, serials: &[CardSerial]) -> usize {
    let mut pools: HashMap<&str, VecDeque<&CardSerial>> = HashMap::new();
    for serial in serials {
        pools.entry(serial.item_code.trim()).or_default().push_back(serial);
    }

    let mut exploded = Vec::with_capacity(payload.lines.len());
    for line in payload.lines.drain(..) {
        let Some(pool) = pools.get_mut(line.item_code.as_str()) else {
            exploded.push(line);
            continue;
        };

        let units = if line.qty.with_scale(0) == line.qty {
            line.qty.to_u64().unwrap_or(0)
        } else {
            0
        };
        if units == 0 {
            // 非整数数量: 只标记合作方
            if let Some(serial) = pool.pop_front() {
                let mut line = line;
                line.partner_code = serial.issue_partner_code.clone().or(line.partner_code);
                line.serial = Some(serial.serial.clone());
                exploded.push(line);
            } else {
                exploded.push(line);
            }
            continue;
        }

        let take = (units as usize).min(pool.len());
        if take == 0 {
            exploded.push(line);
            continue;
        }

        let unit_qty = BigDecimal::from(units as i64);
        let unit_amount = (&line.amount / &unit_qty).round(2);
        let unit_discount = (&line.discount / &unit_qty).round(2);

        let mut allocated_amount = BigDecimal::zero();
        let mut allocated_discount = BigDecimal::zero();
        for idx in 0..take {
            let Some(serial) = pool.pop_front() else {
                break;
            };
            let is_last_unit = idx + 1 == units as usize;
            let (amount, discount) = if is_last_unit {
                (&line.amount - &allocated_amount, &line.discount - &allocated_discount)
            } else {
                (unit_amount.clone(), unit_discount.clone())
            };
            allocated_amount += &amount;
            allocated_discount += &discount;

            exploded.push(SalesDocumentLine {
                qty: BigDecimal::from(1),
                amount,
                discount,
                partner_code: serial
                    .issue_partner_code
                    .clone()
                    .or_else(|| line.partner_code.clone()),
                serial: Some(serial.serial.clone()),
                ..line.clone()
            });
        }

        let remaining_units = units as i64 - take as i64;
        if remaining_units > 0 {
            exploded.push(SalesDocumentLine {
                qty: BigDecimal::from(remaining_units),
                amount: &line.amount - &allocated_amount,
                discount: &line.discount - &allocated_discount,
                ..line
            });
        }
    }
    payload.lines = exploded;

    pools.values().map(VecDeque::len).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::StockMovementRecord;
    use crate::service::classifier::tests::{line, order};
    use crate::service::matcher::{assign, MatchMode};
    use chrono::Utc;
    use std::str::FromStr;

    fn ctx() -> EnrichmentContext {
        let mut ctx = EnrichmentContext::default();
        ctx.products.insert(
            "SP001".to_string(),
            ProductInfo {
                item_code: "SP001".to_string(),
                item_name: "Nuoc hoa".to_string(),
                material_code: Some("MAT001".to_string()),
                unit: Some("Chai".to_string()),
                is_loyalty_item: true,
                loyalty_points: None,
            },
        );
        ctx.departments.insert(
            "HN01".to_string(),
            DepartmentInfo {
                branch_code: "HN01".to_string(),
                department_code: "BP01".to_string(),
                department_name: None,
                default_stock_code: Some("KHO-MD".to_string()),
            },
        );
        ctx.warehouses.insert("KHO-1".to_string(), "WH1".to_string());
        ctx.warehouses.insert("KHO-MD".to_string(), "WH-DEFAULT".to_string());
        ctx.platform_fees.insert(
            "SO1".to_string(),
            vec![
                PlatformFee {
                    doc_code: "SO1".to_string(),
                    platform: "shopee".to_string(),
                    fee_type: "commission".to_string(),
                    amount: BigDecimal::from(5),
                },
                PlatformFee {
                    doc_code: "SO1".to_string(),
                    platform: "shopee".to_string(),
                    fee_type: "shipping".to_string(),
                    amount: BigDecimal::from(7),
                },
            ],
        );
        ctx
    }

    #[test]
    fn payload_carries_metadata_and_matched_warehouse() {
        let o = order("SO1", vec![line(1, "SO1", "01. Thường"), line(2, "SO1", "01. Thường")]);
        let movement = StockMovementRecord {
            id: 9,
            doc_code: "ST001".to_string(),
            so_code: "SO1".to_string(),
            item_code: Some("SP001".to_string()),
            material_code: None,
            stock_code: Some("KHO-1".to_string()),
            qty: BigDecimal::from(-1),
            created_at: Utc::now(),
        };
        let assignment = assign(&o.lines, &[movement], MatchMode::SingleOrder);

        let payload = build_payload(&o, &o.lines, &assignment, &ctx(), "Đơn bán");

        assert_eq!(payload.department_code.as_deref(), Some("BP01"));
        assert_eq!(payload.platform_fee, Some(BigDecimal::from(12)));
        let first = &payload.lines[0];
        assert_eq!(first.material_code.as_deref(), Some("MAT001"));
        assert_eq!(first.warehouse_code.as_deref(), Some("WH1"));
        assert_eq!(first.issue_doc_code.as_deref(), Some("ST001"));
        assert!(first.is_loyalty_item);
        // 未匹配的行落到门店默认仓库
        assert_eq!(payload.lines[1].warehouse_code.as_deref(), Some("WH-DEFAULT"));
    }

    #[test]
    fn employee_sale_flag_comes_from_partner_status() {
        let mut l = line(1, "SO1", "01. Thường");
        l.partner_code = Some("NV01".to_string());
        let o = order("SO1", vec![l]);
        let mut ctx = ctx();
        ctx.employees.insert(
            "NV01".to_string(),
            EmployeeStatus {
                partner_code: "NV01".to_string(),
                is_employee: true,
                is_active: true,
            },
        );

        let payload = build_payload(&o, &o.lines, &Assignment::default(), &ctx, "");
        assert!(payload.lines[0].is_employee_sale);
    }

    #[test]
    fn card_serials_explode_multi_quantity_lines() {
        let mut l = line(1, "SO8", "08. Tách thẻ");
        l.qty = BigDecimal::from(3);
        l.amount = BigDecimal::from(100);
        let o = order("SO8", vec![l]);
        let mut payload = build_payload(&o, &o.lines, &Assignment::default(), &ctx(), "");

        let serials: Vec<CardSerial> = (1..=2)
            .map(|i| CardSerial {
                doc_code: "SO8".to_string(),
                item_code: "SP001".to_string(),
                serial: format!("SER{}", i),
                issue_partner_code: Some(format!("NCC{}", i)),
            })
            .collect();

        let leftover = apply_card_serials(&mut payload, &serials);

        assert_eq!(leftover, 0);
        assert_eq!(payload.lines.len(), 3);
        assert_eq!(payload.lines[0].serial.as_deref(), Some("SER1"));
        assert_eq!(payload.lines[1].partner_code.as_deref(), Some("NCC2"));
        assert_eq!(payload.lines[2].qty, BigDecimal::from(1));
        assert!(payload.lines[2].serial.is_none());
        let total = payload
            .lines
            .iter()
            .fold(BigDecimal::zero(), |acc, l| acc + &l.amount);
        assert_eq!(total, BigDecimal::from(100));
        assert_eq!(payload.lines[0].amount, BigDecimal::from_str("33.33").unwrap());
    }

    #[test]
    fn resolve_warehouse_codes_skips_unmapped() {
        let codes = ctx().resolve_warehouse_codes(&[
            "KHO-1".to_string(),
            "KHO-X".to_string(),
            "KHO-1".to_string(),
        ]);
        assert_eq!(codes, vec!["WH1".to_string()]);
    }
}
