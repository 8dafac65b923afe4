// ==========================================
// G-progress - 表格预处理
// ==========================================
// 流程: 解析 → 映射 → 标准化 → DQ 校验
// 导入与核对共用,保证两边对同一文件得到相同的行
// ==========================================

use crate::config::column_layout::ColumnLayout;
use crate::config::import_config_trait::SourceEncoding;
use crate::domain::import::{DqViolation, ImportRow};
use crate::importer::dq_validator::{has_blocking, DqValidator};
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::field_mapper::FieldMapper;
use crate::importer::file_parser::UniversalFileParser;
use crate::importer::row_normalizer::RowNormalizer;
use crate::importer::task_importer_trait::{
    DqValidator as DqValidatorTrait, FieldMapper as FieldMapperTrait, FileParser,
};
use std::path::Path;
use tracing::{debug, info, warn};

/// 预处理后的单行
#[derive(Debug, Clone)]
pub struct PreparedRow {
    pub row: ImportRow,
    pub violations: Vec<DqViolation>,
    pub blocked: bool,
}

/// 预处理结果
#[derive(Debug, Clone, Default)]
pub struct PreparedSheet {
    pub rows: Vec<PreparedRow>,
    pub layout_warnings: Vec<String>,
}

impl PreparedSheet {
    pub fn violations(&self) -> Vec<DqViolation> {
        self.rows
            .iter()
            .flat_map(|r| r.violations.iter().cloned())
            .collect()
    }
}

pub struct SheetPreparer {
    file_parser: Box<dyn FileParser>,
    field_mapper: Box<dyn FieldMapperTrait>,
    dq_validator: Box<dyn DqValidatorTrait>,
}

impl Default for SheetPreparer {
    fn default() -> Self {
        Self::new(
            Box::new(UniversalFileParser),
            Box::new(FieldMapper),
            Box::new(DqValidator),
        )
    }
}

impl SheetPreparer {
    pub fn new(
        file_parser: Box<dyn FileParser>,
        field_mapper: Box<dyn FieldMapperTrait>,
        dq_validator: Box<dyn DqValidatorTrait>,
    ) -> Self {
        Self {
            file_parser,
            field_mapper,
            dq_validator,
        }
    }

    pub fn prepare(
        &self,
        file_path: &Path,
        layout: &ColumnLayout,
        encoding: SourceEncoding,
        enforce_contract_date_floor: bool,
    ) -> ImportResult<PreparedSheet> {
        layout.validate().map_err(ImportError::LayoutError)?;

        // === 解析 ===
        let sheet = self
            .file_parser
            .parse_to_rows(file_path, layout.header_rows, encoding)?;
        info!(rows = sheet.rows.len(), header_width = sheet.header_width, "文件解析完成");

        let mut layout_warnings = Vec::new();
        if sheet.header_width != layout.expected_columns {
            let message = format!(
                "表头列数 {} 与布局期望 {} 不一致,列位置可能已偏移",
                sheet.header_width, layout.expected_columns
            );
            warn!(
                actual = sheet.header_width,
                expected = layout.expected_columns,
                "表头列数与布局不一致"
            );
            layout_warnings.push(message);
        }

        // === 映射 + 标准化 + 校验 ===
        let normalizer = RowNormalizer::new(enforce_contract_date_floor);
        let rows: Vec<PreparedRow> = sheet
            .rows
            .iter()
            .map(|raw| {
                let mapped = self.field_mapper.map_row(raw, layout);
                let normalized = normalizer.normalize(&mapped);
                let mut violations = normalized.violations;
                violations.extend(self.dq_validator.validate_row(&normalized.row));
                let blocked = has_blocking(&violations);
                PreparedRow {
                    row: normalized.row,
                    violations,
                    blocked,
                }
            })
            .collect();

        debug!(
            blocked = rows.iter().filter(|r| r.blocked).count(),
            "行标准化与校验完成"
        );

        Ok(PreparedSheet {
            rows,
            layout_warnings,
        })
    }
}
