use crate::error::Result;
use crate::models::{MatchedMovements, MovementKind, SaleLine, StockMovementRecord};
use indexmap::IndexMap;
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::Path;

/// 出入库方向的判定方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMode {
    /// 单订单: 按单据号升序, ST 开头为出库
    SingleOrder,
    /// 跨订单批量: 按创建时间升序, 数量为负且非 RT 为出库
    CrossOrder,
}

impl MatchMode {
    fn kind_of(self, record: &StockMovementRecord) -> MovementKind {
        let is_issue = match self {
            Self::SingleOrder => record.is_issue_code(),
            Self::CrossOrder => record.is_negative_issue(),
        };
        if is_issue {
            MovementKind::Issue
        } else {
            MovementKind::Return
        }
    }

    /// 调用方约定的稳定顺序
    pub fn sort(self, records: &mut [StockMovementRecord]) {
        match self {
            Self::SingleOrder => records.sort_by(|a, b| a.doc_code.cmp(&b.doc_code)),
            Self::CrossOrder => records.sort_by(|a, b| a.created_at.cmp(&b.created_at)),
        }
    }
}

/// 匹配结果: 销售行ID -> 出/入库单, 以及未能匹配的出入库单
#[derive(Debug, Clone, Default)]
pub struct Assignment {
    pub by_line: IndexMap<i64, MatchedMovements>,
    pub unmatched: Vec<StockMovementRecord>,
}

impl Assignment {
    pub fn get(&self, line_id: i64) -> Option<&MatchedMovements> {
        self.by_line.get(&line_id)
    }

    pub fn matched_count(&self) -> usize {
        self.by_line.values().filter(|m| !m.is_empty()).count()
    }

    /// 所有匹配到的实体仓库编码 (保序去重)
    pub fn stock_codes(&self) -> Vec<String> {
        let mut codes: Vec<String> = Vec::new();
        for matched in self.by_line.values() {
            for record in [&matched.issue, &matched.return_record].into_iter().flatten() {
                if let Some(code) = record.stock_code() {
                    if !codes.iter().any(|c| c == code) {
                        codes.push(code.to_string());
                    }
                }
            }
        }
        codes
    }
}

/// 出入库单与销售行匹配
///
/// 按商品编码分组为 FIFO 队列, 出入库单按给定顺序逐条消费队首销售行;
/// 商品编码未命中时回退物料编码。每条出入库单至多分配给一个销售行。
pub fn assign(
    sale_lines: &[SaleLine],
    movements: &[StockMovementRecord],
    mode: MatchMode,
) -> Assignment {
    // 1. 按商品编码分组 (保持原始行序)
    let mut queues: HashMap<String, VecDeque<i64>> = HashMap::new();
    let mut by_line: IndexMap<i64, MatchedMovements> = IndexMap::with_capacity(sale_lines.len());
    for line in sale_lines {
        by_line.insert(line.id, MatchedMovements::default());
        if let Some(code) = line.item_code() {
            queues.entry(code.to_string()).or_default().push_back(line.id);
        }
    }

    // 2. 顺序遍历出入库单, 消费队首
    let mut unmatched = Vec::new();
    for record in movements {
        let queue = lookup_queue(&mut queues, record);
        let Some(line_id) = queue.and_then(VecDeque::pop_front) else {
            tracing::debug!(
                "出入库单 {} (商品 {:?}, 物料 {:?}) 未找到对应销售行",
                record.doc_code,
                record.item_code,
                record.material_code
            );
            unmatched.push(record.clone());
            continue;
        };

        let slot = by_line.entry(line_id).or_default();
        match mode.kind_of(record) {
            MovementKind::Issue => slot.issue = Some(record.clone()),
            MovementKind::Return => slot.return_record = Some(record.clone()),
        }
    }

    if !unmatched.is_empty() {
        tracing::info!("{} 条出入库单未匹配到销售行", unmatched.len());
    }

    Assignment { by_line, unmatched }
}

fn lookup_queue<'a>(
    queues: &'a mut HashMap<String, VecDeque<i64>>,
    record: &StockMovementRecord,
) -> Option<&'a mut VecDeque<i64>> {
    let item_key = record
        .item_code
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty() && queues.get(*c).is_some_and(|q| !q.is_empty()));
    let key = item_key.or_else(|| {
        record
            .material_code
            .as_deref()
            .map(str::trim)
            .filter(|c| !c.is_empty())
    })?;
    queues.get_mut(key)
}

/// 批量匹配结果
#[derive(Debug, Clone, Default)]
pub struct BatchAssignment {
    pub by_order: IndexMap<String, Assignment>,
    /// 整个批次内未被任何订单消费的出入库单
    pub unmatched: Vec<StockMovementRecord>,
}

/// 批量匹配: 出入库单按订单分区, 匹配不跨订单
///
/// `orders` 为 (销售单号, 原销售单号, 销售行); 退货单同时接收原销售单号下
/// 尚未被消费的出入库单。按订单顺序处理, 每条出入库单在整个批次内至多消费一次。
pub fn assign_batch(
    orders: &[(String, Option<String>, Vec<SaleLine>)],
    movements: &[StockMovementRecord],
    mode: MatchMode,
) -> BatchAssignment {
    let mut partitions: HashMap<&str, Vec<&StockMovementRecord>> = HashMap::new();
    for record in movements {
        partitions.entry(record.so_code.trim()).or_default().push(record);
    }

    let mut consumed: HashSet<i64> = HashSet::new();
    let mut by_order = IndexMap::with_capacity(orders.len());
    for (doc_code, origin_code, lines) in orders {
        let mut candidates: Vec<StockMovementRecord> = Vec::new();
        let mut so_codes = vec![doc_code.as_str()];
        if let Some(origin) = origin_code.as_deref().filter(|o| *o != doc_code.as_str()) {
            so_codes.push(origin);
        }
        for so_code in so_codes {
            for record in partitions.get(so_code).into_iter().flatten() {
                if !consumed.contains(&record.id) {
                    candidates.push((*record).clone());
                }
            }
        }

        mode.sort(&mut candidates);
        let assignment = assign(lines, &candidates, mode);
        for matched in assignment.by_line.values() {
            for record in [&matched.issue, &matched.return_record].into_iter().flatten() {
                consumed.insert(record.id);
            }
        }
        by_order.insert(doc_code.clone(), assignment);
    }

    let unmatched: Vec<StockMovementRecord> = movements
        .iter()
        .filter(|r| !consumed.contains(&r.id))
        .cloned()
        .collect();
    if !unmatched.is_empty() {
        tracing::info!("批量匹配: {} 条出入库单未被消费", unmatched.len());
    }

    BatchAssignment { by_order, unmatched }
}

/// 导出未匹配的出入库单
pub fn export_unmatched_to_csv(records: &[StockMovementRecord], output_path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(output_path)?;
    writer.write_record([
        "doc_code",
        "so_code",
        "item_code",
        "material_code",
        "stock_code",
        "qty",
        "created_at",
    ])?;

    for record in records {
        writer.write_record([
            record.doc_code.clone(),
            record.so_code.clone(),
            record.item_code.clone().unwrap_or_default(),
            record.material_code.clone().unwrap_or_default(),
            record.stock_code.clone().unwrap_or_default(),
            record.qty.to_string(),
            record.created_at.to_rfc3339(),
        ])?;
    }

    writer.flush()?;
    Ok(())
}
