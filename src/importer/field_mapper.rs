// ==========================================
// G-progress - 字段映射器实现
// ==========================================
// 职责: 列号 → 字段（纯位置查找,不做类型转换）
// ==========================================

use crate::config::column_layout::ColumnLayout;
use crate::domain::import::{MappedMilestone, MappedPayment, MappedRow, RawSheetRow};
use crate::importer::task_importer_trait::FieldMapper as FieldMapperTrait;

pub struct FieldMapper;

impl FieldMapperTrait for FieldMapper {
    fn map_row(&self, row: &RawSheetRow, layout: &ColumnLayout) -> MappedRow {
        let milestones = layout
            .milestones
            .iter()
            .enumerate()
            .map(|(i, m)| MappedMilestone {
                task_name: m.task_name.clone(),
                department: m.department,
                sort_order: i as i32 + 1,
                planned: self.get_opt(row, m.planned),
                confirmed: self.get_opt(row, m.confirmed),
                actual: self.get_opt(row, m.actual),
            })
            .collect();

        let payments = layout
            .payments
            .iter()
            .map(|p| MappedPayment {
                kind: p.kind,
                date: self.get_opt(row, p.date),
                amount: self.get_opt(row, p.amount),
            })
            .collect();

        MappedRow {
            row_number: row.row_number,
            contract_no: self.get(row, layout.contract_no),
            customer_name: self.get(row, layout.customer_name),
            contract_date: self.get(row, layout.contract_date),
            address: self.get_opt(row, layout.address),
            sales_staff: self.get_opt(row, layout.sales_staff),
            design_staff: self.get_opt(row, layout.design_staff),
            construction_staff: self.get_opt(row, layout.construction_staff),
            milestones,
            payments,
        }
    }
}

impl FieldMapper {
    /// 取单元格（TRIM,空值 → None）
    fn get(&self, row: &RawSheetRow, index: usize) -> Option<String> {
        let trimmed = row.cell(index).trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    }

    fn get_opt(&self, row: &RawSheetRow, index: Option<usize>) -> Option<String> {
        index.and_then(|i| self.get(row, i))
    }
}
