// ==========================================
// G-progress - 领域模型层
// ==========================================
// 职责: 定义领域实体、类型、导入中间结构
// 红线: 不含数据访问逻辑
// ==========================================

pub mod import;
pub mod payment;
pub mod project;
pub mod task;
pub mod types;

// 重导出核心类型
pub use import::{
    ConflictStatus, ConflictType, ContractDateViolation, CountMismatch, DqLevel, DqSummary,
    DqViolation, ImportBatch, ImportConflict, ImportReport, ImportRow, MappedMilestone,
    MappedPayment, MappedRow, ParsedSheet, PaymentDraft, ProjectImportWrite, ProjectTarget,
    RawSheetRow, StoredCounts, TaskDraft, UnresolvedRow, VerificationReport, WriteOutcome,
};
pub use payment::Payment;
pub use project::{Customer, Employee, Project, ProjectCandidate};
pub use task::Task;
pub use types::{
    Department, FiscalYear, PaymentKind, ProjectStatus, TaskSource, TaskStatus,
    DEFAULT_FISCAL_YEAR_START_MONTH,
};
