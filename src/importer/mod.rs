// ==========================================
// G-progress - 导入层
// ==========================================
// 职责: 进度表（CSV/Excel）导入,生成项目/任务/付款
// 流程: 解析 → 映射 → 标准化 → 校验 → 匹配 → 落库 → 核对
// ==========================================

// 模块声明
pub mod conflict_handler;
pub mod customer_matcher;
pub mod data_cleaner;
pub mod date_normalizer;
pub mod dq_validator;
pub mod error;
pub mod field_mapper;
pub mod file_parser;
pub mod row_normalizer;
pub mod sheet_preparer;
pub mod task_importer_impl;
pub mod task_importer_trait;
pub mod verifier;

// 重导出核心类型
pub use conflict_handler::ConflictHandler as ConflictHandlerImpl;
pub use customer_matcher::CustomerMatcher;
pub use data_cleaner::DataCleaner as DataCleanerImpl;
pub use date_normalizer::{DateNormalizer, ParsedDate};
pub use dq_validator::DqValidator as DqValidatorImpl;
pub use error::{ImportError, ImportResult};
pub use field_mapper::FieldMapper as FieldMapperImpl;
pub use file_parser::{CsvParser, ExcelParser, UniversalFileParser};
pub use row_normalizer::{NormalizedRow, RowNormalizer};
pub use sheet_preparer::{PreparedRow, PreparedSheet, SheetPreparer};
pub use task_importer_impl::{derive_project_status, TaskImporterImpl};
pub use verifier::ImportVerifier;

// 重导出 Trait 接口
pub use task_importer_trait::{
    ConflictHandler, DataCleaner, DqValidator, FieldMapper, FileParser, ImportOptions,
    ProjectResolution, TaskImporter,
};
