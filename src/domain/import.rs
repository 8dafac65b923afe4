// ==========================================
// G-progress - 导入领域模型
// ==========================================
// 用途: 导入管道各阶段的中间结构体 + 批次/冲突/DQ 记录
// 流程: RawSheetRow → MappedRow → ImportRow → ProjectImportWrite
// ==========================================

use crate::domain::project::{Customer, Project};
use crate::domain::types::{Department, PaymentKind, ProjectStatus, TaskStatus};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ==========================================
// RawSheetRow - 按位置保存的原始行
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawSheetRow {
    pub row_number: usize, // 文件行号（1 起,含表头行）
    pub cells: Vec<String>,
}

impl RawSheetRow {
    /// 取单元格,越界视为空
    pub fn cell(&self, index: usize) -> &str {
        self.cells.get(index).map(|s| s.as_str()).unwrap_or("")
    }
}

/// 文件解析结果
#[derive(Debug, Clone)]
pub struct ParsedSheet {
    pub header_width: usize,
    pub rows: Vec<RawSheetRow>,
}

// ==========================================
// MappedRow - 列映射后的行（仍为字符串）
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MappedRow {
    pub row_number: usize,
    pub contract_no: Option<String>,
    pub customer_name: Option<String>,
    pub contract_date: Option<String>,
    pub address: Option<String>,
    pub sales_staff: Option<String>,
    pub design_staff: Option<String>,
    pub construction_staff: Option<String>,
    pub milestones: Vec<MappedMilestone>,
    pub payments: Vec<MappedPayment>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappedMilestone {
    pub task_name: String,
    pub department: Option<Department>,
    pub sort_order: i32,
    pub planned: Option<String>,
    pub confirmed: Option<String>,
    pub actual: Option<String>,
}

impl MappedMilestone {
    pub fn has_any_date(&self) -> bool {
        self.planned.is_some() || self.confirmed.is_some() || self.actual.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MappedPayment {
    pub kind: PaymentKind,
    pub date: Option<String>,
    pub amount: Option<String>,
}

// ==========================================
// ImportRow - 清洗 + 日期标准化后的行
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ImportRow {
    pub row_number: usize,
    pub contract_no: Option<String>,       // 已标准化为 6 位
    pub contract_no_raw: Option<String>,   // 原值（用于冲突记录）
    pub customer_names: Vec<String>,
    pub contract_date: Option<NaiveDate>,
    pub address: Option<String>,
    pub sales_staff: Option<String>,
    pub design_staff: Option<String>,
    pub construction_staff: Option<String>,
    pub tasks: Vec<TaskDraft>,
    pub payments: Vec<PaymentDraft>,
}

impl ImportRow {
    pub fn completed_task_count(&self) -> usize {
        self.tasks
            .iter()
            .filter(|t| t.status() == TaskStatus::Completed)
            .count()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskDraft {
    pub task_name: String,
    pub department: Option<Department>,
    pub sort_order: i32,
    pub due_date: Option<NaiveDate>,
    pub actual_completion_date: Option<NaiveDate>,
}

impl TaskDraft {
    pub fn status(&self) -> TaskStatus {
        TaskStatus::derive(self.due_date, self.actual_completion_date)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentDraft {
    pub kind: PaymentKind,
    pub scheduled_date: Option<NaiveDate>,
    pub amount: Option<i64>,
}

// ==========================================
// ProjectImportWrite - 单项目落库指令
// ==========================================
// 用途: 一行对应一次事务写入
#[derive(Debug, Clone)]
pub struct ProjectImportWrite {
    pub batch_id: String,
    pub target: ProjectTarget,
    pub contract_date: Option<NaiveDate>,
    pub address: Option<String>,
    pub sales_staff_id: Option<String>,
    pub design_staff_id: Option<String>,
    pub construction_staff_id: Option<String>,
    pub derived_status: ProjectStatus,
    pub tasks: Vec<TaskDraft>,
    pub payments: Vec<PaymentDraft>,
}

/// 写入目标: 已有项目 or 新建项目
#[derive(Debug, Clone)]
pub enum ProjectTarget {
    Existing { project_id: String },
    New { project: Project, customer: Option<Customer> },
}

impl ProjectTarget {
    pub fn project_id(&self) -> &str {
        match self {
            ProjectTarget::Existing { project_id } => project_id,
            ProjectTarget::New { project, .. } => &project.project_id,
        }
    }
}

/// 单项目写入结果
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteOutcome {
    pub project_created: bool,
    pub tasks_deleted: usize,
    pub tasks_written: usize,
    pub payments_written: usize,
}

// ==========================================
// ImportBatch - 导入批次
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportBatch {
    pub batch_id: String,
    pub file_name: Option<String>,
    pub file_path: Option<String>,
    pub total_rows: i32,
    pub success_rows: i32,
    pub blocked_rows: i32,
    pub warning_rows: i32,
    pub conflict_rows: i32,
    pub created_projects: i32,
    pub tasks_written: i32,
    pub payments_written: i32,
    pub dry_run: bool,
    pub imported_at: Option<DateTime<Utc>>,
    pub elapsed_ms: Option<i64>,
    pub dq_report_json: Option<String>,
}

// ==========================================
// ImportConflict - 导入冲突记录（人工队列）
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportConflict {
    pub conflict_id: String,
    pub batch_id: String,
    pub row_number: usize,
    pub contract_no: Option<String>,
    pub conflict_type: ConflictType,
    pub raw_data: String, // 行数据（JSON）
    pub reason: String,
    pub status: ConflictStatus,
    pub resolution_note: Option<String>,
    pub resolved_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConflictType {
    DuplicateRow,      // 同批次内同合同号同客户
    ProjectNotFound,   // 合同号无对应项目
    AmbiguousContract, // 同合同号多项目,客户名无法区分
    CustomerMismatch,  // 唯一候选但客户名不符
}

impl ConflictType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConflictType::DuplicateRow => "DUPLICATE_ROW",
            ConflictType::ProjectNotFound => "PROJECT_NOT_FOUND",
            ConflictType::AmbiguousContract => "AMBIGUOUS_CONTRACT",
            ConflictType::CustomerMismatch => "CUSTOMER_MISMATCH",
        }
    }
}

impl FromStr for ConflictType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // 兼容带引号的 JSON 字符串
        match s.trim().trim_matches('"') {
            "DUPLICATE_ROW" => Ok(ConflictType::DuplicateRow),
            "PROJECT_NOT_FOUND" => Ok(ConflictType::ProjectNotFound),
            "AMBIGUOUS_CONTRACT" => Ok(ConflictType::AmbiguousContract),
            "CUSTOMER_MISMATCH" => Ok(ConflictType::CustomerMismatch),
            other => Err(format!("未知冲突类型: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConflictStatus {
    Open,
    Resolved,
    Ignored,
}

impl ConflictStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConflictStatus::Open => "OPEN",
            ConflictStatus::Resolved => "RESOLVED",
            ConflictStatus::Ignored => "IGNORED",
        }
    }
}

impl fmt::Display for ConflictStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ConflictStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "OPEN" => Ok(ConflictStatus::Open),
            "RESOLVED" => Ok(ConflictStatus::Resolved),
            "IGNORED" => Ok(ConflictStatus::Ignored),
            other => Err(format!("未知冲突状态: {}", other)),
        }
    }
}

// ==========================================
// DqViolation - 数据质量违规记录
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DqViolation {
    pub row_number: usize,
    pub contract_no: Option<String>,
    pub level: DqLevel,
    pub field: String,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DqLevel {
    Error,   // 阻断该行
    Warning, // 允许导入,单元格被忽略或保留
    Info,    // 仅记录
}

// ==========================================
// DqSummary - 导入汇总
// ==========================================
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DqSummary {
    pub total_rows: usize,
    pub success: usize,
    pub blocked: usize,
    pub warning: usize,
    pub conflict: usize,
    pub created_projects: usize,
    pub tasks_written: usize,
    pub payments_written: usize,
}

// ==========================================
// ImportReport - 导入接口返回值
// ==========================================
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportReport {
    pub batch: ImportBatch,
    pub summary: DqSummary,
    pub violations: Vec<DqViolation>,
    pub conflicts: Vec<ImportConflict>,
    pub layout_warnings: Vec<String>,
    pub elapsed_time: std::time::Duration,
}

// ==========================================
// 核对结果
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CountMismatch {
    pub row_number: usize,
    pub contract_no: String,
    pub project_id: String,
    pub metric: String,
    pub expected: usize,
    pub actual: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnresolvedRow {
    pub row_number: usize,
    pub contract_no: Option<String>,
    pub reason: String,
}

/// 任务日期早于合同日期
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContractDateViolation {
    pub project_id: String,
    pub contract_no: String,
    pub contract_date: NaiveDate,
    pub task_id: String,
    pub task_name: String,
    pub due_date: Option<NaiveDate>,
    pub actual_completion_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VerificationReport {
    pub file_path: String,
    pub checked_rows: usize,
    pub blocked_rows: usize,
    pub matched_projects: usize,
    pub unresolved: Vec<UnresolvedRow>,
    pub mismatches: Vec<CountMismatch>,
    pub date_violations: Vec<ContractDateViolation>,
}

impl VerificationReport {
    pub fn is_clean(&self) -> bool {
        self.unresolved.is_empty() && self.mismatches.is_empty() && self.date_violations.is_empty()
    }
}

/// 已落库计数（核对用）
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredCounts {
    pub imported_tasks: usize,
    pub completed_tasks: usize,
    pub payments: usize,
}
