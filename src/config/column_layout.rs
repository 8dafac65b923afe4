// ==========================================
// G-progress - 表格列布局
// ==========================================
// 职责: 列号 → (任务名, 部门, 预定/确定/实绩) 静态映射表
// 覆写: config_kv `import/column_layout` (JSON) 或 --layout 文件
// ==========================================

use crate::domain::types::{Department, PaymentKind};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// 原始导出表的列数
pub const DEFAULT_EXPECTED_COLUMNS: usize = 228;

/// 多行表头（分组行 + 角色行）
pub const DEFAULT_HEADER_ROWS: usize = 2;

/// 里程碑起始列（之前为合同/客户/担当/付款列）
const MILESTONE_START_COLUMN: usize = 20;

// ==========================================
// 默认里程碑表（任务名, 部门）
// ==========================================
// 每个里程碑占 3 列: 预定 / 确定 / 实绩
const DEFAULT_MILESTONES: &[(&str, Department)] = &[
    ("請負契約", Department::Sales),
    ("間取確定", Department::Sales),
    ("融資申込", Department::Office),
    ("地盤調査", Department::Design),
    ("実施図作成", Department::Design),
    ("構造計算", Department::Design),
    ("確認申請", Department::Design),
    ("確認済証", Department::Design),
    ("変更契約", Department::Sales),
    ("融資承認", Department::Office),
    ("着工前打合せ", Department::Construction),
    ("地鎮祭", Department::Construction),
    ("着工", Department::Construction),
    ("基礎完了", Department::Construction),
    ("上棟", Department::Construction),
    ("中間検査", Department::Construction),
    ("木工事完了", Department::Construction),
    ("完了検査", Department::Construction),
    ("竣工", Department::Construction),
    ("外構着工", Department::Exterior),
    ("外構完了", Department::Exterior),
    ("登記", Department::Office),
    ("引渡", Department::Construction),
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MilestoneColumns {
    pub task_name: String,
    #[serde(default)]
    pub department: Option<Department>,
    #[serde(default)]
    pub planned: Option<usize>,
    #[serde(default)]
    pub confirmed: Option<usize>,
    #[serde(default)]
    pub actual: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentColumns {
    pub kind: PaymentKind,
    #[serde(default)]
    pub date: Option<usize>,
    #[serde(default)]
    pub amount: Option<usize>,
}

// ==========================================
// ColumnLayout - 列布局
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnLayout {
    pub header_rows: usize,
    pub expected_columns: usize,
    pub contract_no: usize,
    pub customer_name: usize,
    pub contract_date: usize,
    #[serde(default)]
    pub address: Option<usize>,
    #[serde(default)]
    pub sales_staff: Option<usize>,
    #[serde(default)]
    pub design_staff: Option<usize>,
    #[serde(default)]
    pub construction_staff: Option<usize>,
    pub milestones: Vec<MilestoneColumns>,
    pub payments: Vec<PaymentColumns>,
    /// 完成即视为交房的里程碑
    pub handover_task: String,
}

impl Default for ColumnLayout {
    fn default() -> Self {
        let milestones = DEFAULT_MILESTONES
            .iter()
            .enumerate()
            .map(|(i, (name, dept))| {
                let base = MILESTONE_START_COLUMN + i * 3;
                MilestoneColumns {
                    task_name: name.to_string(),
                    department: Some(*dept),
                    planned: Some(base),
                    confirmed: Some(base + 1),
                    actual: Some(base + 2),
                }
            })
            .collect();

        // 付款列: 10 起, 每期 (日期, 金额)
        let payments = PaymentKind::ALL
            .iter()
            .enumerate()
            .map(|(i, kind)| PaymentColumns {
                kind: *kind,
                date: Some(10 + i * 2),
                amount: Some(11 + i * 2),
            })
            .collect();

        Self {
            header_rows: DEFAULT_HEADER_ROWS,
            expected_columns: DEFAULT_EXPECTED_COLUMNS,
            contract_no: 1,
            customer_name: 2,
            contract_date: 3,
            address: Some(4),
            sales_staff: Some(5),
            design_staff: Some(6),
            construction_staff: Some(7),
            milestones,
            payments,
            handover_task: "引渡".to_string(),
        }
    }
}

impl ColumnLayout {
    pub fn from_json(raw: &str) -> Result<Self, String> {
        let layout: ColumnLayout =
            serde_json::from_str(raw).map_err(|e| format!("列布局 JSON 解析失败: {}", e))?;
        layout.validate()?;
        Ok(layout)
    }

    /// 校验布局自洽性
    ///
    /// # 规则
    /// - 所有列号 < expected_columns
    /// - 列号不得重复使用
    /// - 里程碑名唯一,且至少有一个日期角色
    /// - 每种付款最多出现一次
    pub fn validate(&self) -> Result<(), String> {
        let mut used: HashSet<usize> = HashSet::new();
        let mut claim = |label: String, col: usize| -> Result<(), String> {
            if col >= self.expected_columns {
                return Err(format!(
                    "{} 列号 {} 超出列数 {}",
                    label, col, self.expected_columns
                ));
            }
            if !used.insert(col) {
                return Err(format!("{} 列号 {} 被重复使用", label, col));
            }
            Ok(())
        };

        claim("契約番号".to_string(), self.contract_no)?;
        claim("顧客名".to_string(), self.customer_name)?;
        claim("契約日".to_string(), self.contract_date)?;
        for (label, col) in [
            ("建設地", self.address),
            ("営業担当", self.sales_staff),
            ("設計担当", self.design_staff),
            ("工務担当", self.construction_staff),
        ] {
            if let Some(col) = col {
                claim(label.to_string(), col)?;
            }
        }

        let mut names = HashSet::new();
        for m in &self.milestones {
            if !names.insert(m.task_name.as_str()) {
                return Err(format!("里程碑重复: {}", m.task_name));
            }
            if m.planned.is_none() && m.confirmed.is_none() && m.actual.is_none() {
                return Err(format!("里程碑 {} 未指定任何日期列", m.task_name));
            }
            for (role, col) in [("予定", m.planned), ("確定", m.confirmed), ("実績", m.actual)] {
                if let Some(col) = col {
                    claim(format!("{}/{}", m.task_name, role), col)?;
                }
            }
        }

        let mut kinds = HashSet::new();
        for p in &self.payments {
            if !kinds.insert(p.kind) {
                return Err(format!("付款种类重复: {}", p.kind));
            }
            for (role, col) in [("日付", p.date), ("金額", p.amount)] {
                if let Some(col) = col {
                    claim(format!("{}/{}", p.kind.label(), role), col)?;
                }
            }
        }

        if !self.handover_task.is_empty() && !names.contains(self.handover_task.as_str()) {
            return Err(format!("交房里程碑 {} 不在里程碑表中", self.handover_task));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_layout_is_valid() {
        let layout = ColumnLayout::default();
        assert!(layout.validate().is_ok());
        assert_eq!(layout.milestones.len(), DEFAULT_MILESTONES.len());
        assert_eq!(layout.payments.len(), 5);
        assert_eq!(layout.expected_columns, 228);
    }

    #[test]
    fn test_duplicate_column_rejected() {
        let mut layout = ColumnLayout::default();
        layout.customer_name = layout.contract_no;
        let err = layout.validate().unwrap_err();
        assert!(err.contains("重复"));
    }

    #[test]
    fn test_out_of_range_column_rejected() {
        let mut layout = ColumnLayout::default();
        layout.milestones[0].actual = Some(500);
        assert!(layout.validate().is_err());
    }

    #[test]
    fn test_unknown_handover_rejected() {
        let mut layout = ColumnLayout::default();
        layout.handover_task = "存在しない".to_string();
        assert!(layout.validate().is_err());
    }

    #[test]
    fn test_json_override() {
        let json = r#"{
            "header_rows": 1,
            "expected_columns": 10,
            "contract_no": 0,
            "customer_name": 1,
            "contract_date": 2,
            "milestones": [
                {"task_name": "着工", "department": "CONSTRUCTION", "planned": 3, "actual": 4},
                {"task_name": "引渡", "planned": 5, "actual": 6}
            ],
            "payments": [{"kind": "FINAL_FEE", "date": 7, "amount": 8}],
            "handover_task": "引渡"
        }"#;
        let layout = ColumnLayout::from_json(json).unwrap();
        assert_eq!(layout.header_rows, 1);
        assert_eq!(layout.milestones[0].confirmed, None);
        assert_eq!(layout.address, None);
    }
}
