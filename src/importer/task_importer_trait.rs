// ==========================================
// G-progress - 导入管道 Trait
// ==========================================
// 职责: 定义导入各阶段接口（不包含实现）
// 流程: 解析 → 映射 → 清洗/日期标准化 → 校验 → 冲突检测 → 落库
// ==========================================

use crate::config::column_layout::ColumnLayout;
use crate::config::import_config_trait::SourceEncoding;
use crate::domain::import::{
    DqViolation, ImportReport, ImportRow, MappedRow, ParsedSheet, RawSheetRow,
};
use crate::domain::project::ProjectCandidate;
use crate::importer::error::ImportResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

// ==========================================
// ImportOptions - 单次导入选项
// ==========================================
#[derive(Debug, Clone, Default)]
pub struct ImportOptions {
    /// 只跑管道不落库（批次记录 dry_run=1）
    pub dry_run: bool,
    /// 覆盖 config_kv 中的列布局
    pub layout_override: Option<ColumnLayout>,
}

// ==========================================
// TaskImporter Trait
// ==========================================
// 用途: 导入主接口
// 实现者: TaskImporterImpl
#[async_trait]
pub trait TaskImporter: Send + Sync {
    /// 导入单个文件（一个文件 = 一个批次）
    ///
    /// # 返回
    /// - Ok(ImportReport): 批次信息、DQ 违规、冲突、汇总
    /// - Err: 文件读取错误、布局错误、数据库错误
    async fn import_file(&self, file_path: &Path, options: &ImportOptions)
        -> ImportResult<ImportReport>;

    /// 依次导入多个文件
    ///
    /// # 说明
    /// - 每个文件独立成批,某个文件失败不影响其他文件
    async fn batch_import(
        &self,
        file_paths: Vec<PathBuf>,
        options: &ImportOptions,
    ) -> Vec<Result<ImportReport, String>>;
}

// ==========================================
// FileParser Trait
// ==========================================
// 实现者: CsvParser, ExcelParser
pub trait FileParser: Send + Sync {
    /// 解析文件为按位置保存的行
    ///
    /// # 参数
    /// - header_rows: 需跳过的表头行数
    /// - encoding: 源编码（Excel 忽略）
    fn parse_to_rows(
        &self,
        file_path: &Path,
        header_rows: usize,
        encoding: SourceEncoding,
    ) -> ImportResult<ParsedSheet>;
}

// ==========================================
// FieldMapper Trait
// ==========================================
// 实现者: FieldMapper
pub trait FieldMapper: Send + Sync {
    /// 按列布局取值（TRIM,空值 → None）
    fn map_row(&self, row: &RawSheetRow, layout: &ColumnLayout) -> MappedRow;
}

// ==========================================
// DataCleaner Trait
// ==========================================
// 实现者: DataCleaner
pub trait DataCleaner: Send + Sync {
    /// 全角英数/全角空格 → 半角
    fn fold_width(&self, value: &str) -> String;

    /// 标准化 NULL 值（空字符串/空白 → None）
    fn normalize_null(&self, value: Option<String>) -> Option<String>;

    /// 合同号标准化为 6 位数字
    fn normalize_contract_no(&self, value: &str) -> ImportResult<String>;

    /// 金额解析（日元）
    ///
    /// # 返回
    /// - Ok(None): 空值或占位符（"-"）
    fn parse_amount(&self, value: &str) -> ImportResult<Option<i64>>;

    /// 拆分多人客户名
    fn split_customer_names(&self, value: &str) -> Vec<String>;

    /// 人名比较用标准化（折叠全角,去空白）
    fn normalize_person_name(&self, value: &str) -> String;
}

// ==========================================
// DqValidator Trait
// ==========================================
// 实现者: DqValidator
pub trait DqValidator: Send + Sync {
    /// 行级校验（必填项 / 空行）
    fn validate_row(&self, row: &ImportRow) -> Vec<DqViolation>;
}

// ==========================================
// ProjectResolution - 项目匹配结果
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ProjectResolution {
    /// 唯一匹配
    Matched { project_id: String },
    /// 无候选
    NotFound,
    /// 唯一候选为本批次新建且客户不同: 源表合同号重复,新建
    CreateDuplicate { sibling_project_id: String },
    /// 唯一候选但客户名不符
    CustomerMismatch { project_id: String },
    /// 多候选无法区分
    Ambiguous { candidate_ids: Vec<String> },
}

// ==========================================
// ConflictHandler Trait
// ==========================================
// 实现者: ConflictHandler
pub trait ConflictHandler: Send + Sync {
    /// 检测同批次内重复行（同合同号 + 同客户）
    ///
    /// # 返回
    /// - Vec<(行号, 合同号)>: 重复记录列表（不包括第一次出现）
    fn detect_duplicates(&self, rows: &[ImportRow]) -> Vec<(usize, String)>;

    /// 按合同号候选 + 客户名匹配项目
    fn resolve_project(
        &self,
        row: &ImportRow,
        candidates: &[ProjectCandidate],
        created_in_batch: &HashSet<String>,
    ) -> ProjectResolution;
}
