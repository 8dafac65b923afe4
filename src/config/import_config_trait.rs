// ==========================================
// G-progress - 导入配置读取 Trait
// ==========================================
// 职责: 定义导入模块所需的配置读取接口（不包含实现）
// 红线: 不包含配置写入、不包含业务逻辑
// ==========================================

use crate::config::column_layout::ColumnLayout;
use crate::importer::error::ImportResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ==========================================
// SourceEncoding - 源文件编码
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SourceEncoding {
    Auto,     // 先按 UTF-8, 失败回退 Shift_JIS
    Utf8,
    ShiftJis, // CP932
}

impl fmt::Display for SourceEncoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceEncoding::Auto => write!(f, "AUTO"),
            SourceEncoding::Utf8 => write!(f, "UTF8"),
            SourceEncoding::ShiftJis => write!(f, "SHIFT_JIS"),
        }
    }
}

impl FromStr for SourceEncoding {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().replace('-', "_").as_str() {
            "AUTO" => Ok(SourceEncoding::Auto),
            "UTF8" | "UTF_8" => Ok(SourceEncoding::Utf8),
            "SHIFT_JIS" | "SJIS" | "CP932" => Ok(SourceEncoding::ShiftJis),
            other => Err(format!("未知编码: {}", other)),
        }
    }
}

// ==========================================
// ImportConfigReader Trait
// ==========================================
// 实现者: ConfigManager（从 config_kv 表读取）
#[async_trait]
pub trait ImportConfigReader: Send + Sync {
    /// 获取列布局
    ///
    /// # 默认值
    /// - ColumnLayout::default()（228 列, 2 行表头）
    async fn get_column_layout(&self) -> ImportResult<ColumnLayout>;

    /// 获取源文件编码
    ///
    /// # 默认值
    /// - AUTO
    async fn get_source_encoding(&self) -> ImportResult<SourceEncoding>;

    /// 合同号无对应项目时是否新建项目
    ///
    /// # 默认值
    /// - true
    async fn get_create_missing_projects(&self) -> ImportResult<bool>;

    /// 是否丢弃早于合同日期的任务日期
    ///
    /// # 默认值
    /// - true
    async fn get_enforce_contract_date_floor(&self) -> ImportResult<bool>;

    /// 获取会计年度起始月
    ///
    /// # 默认值
    /// - 8
    async fn get_fiscal_year_start_month(&self) -> ImportResult<u32>;

    /// 获取导入批次保留天数
    ///
    /// # 默认值
    /// - 90
    async fn get_batch_retention_days(&self) -> ImportResult<i64>;
}
