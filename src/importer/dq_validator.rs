// ==========================================
// G-progress - 数据质量校验器实现
// ==========================================
// 职责: 行级 DQ 校验
//   Error   → 阻断（不落库）
//   Warning → 允许导入
//   Info    → 仅记录
// ==========================================

use crate::domain::import::{DqLevel, DqViolation, ImportRow};
use crate::importer::task_importer_trait::DqValidator as DqValidatorTrait;

pub struct DqValidator;

impl DqValidatorTrait for DqValidator {
    fn validate_row(&self, row: &ImportRow) -> Vec<DqViolation> {
        let mut violations = Vec::new();
        let mut push = |level: DqLevel, field: &str, message: String| {
            violations.push(DqViolation {
                row_number: row.row_number,
                contract_no: row.contract_no.clone(),
                level,
                field: field.to_string(),
                message,
            });
        };

        // 合同号: 匹配键
        match (&row.contract_no, &row.contract_no_raw) {
            (Some(_), _) => {}
            (None, Some(raw)) => push(
                DqLevel::Error,
                "contract_no",
                format!("合同号格式无效: {}", raw),
            ),
            (None, None) => push(DqLevel::Error, "contract_no", "合同号缺失".to_string()),
        }

        // 合同日期: 年份推断基准
        if row.contract_date.is_none() {
            push(
                DqLevel::Error,
                "contract_date",
                "合同日期缺失或无法解析".to_string(),
            );
        }

        if row.customer_names.is_empty() {
            push(DqLevel::Warning, "customer_name", "客户名缺失".to_string());
        }

        if row.tasks.is_empty() && row.payments.is_empty() {
            push(DqLevel::Info, "row", "无里程碑及付款数据".to_string());
        }

        violations
    }
}

/// 违规列表中是否含阻断级
pub fn has_blocking(violations: &[DqViolation]) -> bool {
    violations.iter().any(|v| v.level == DqLevel::Error)
}
