// ==========================================
// G-progress - 配置管理器
// ==========================================
// 职责: 配置加载、查询、写入
// 存储: config_kv 表 (key-value + scope)
// ==========================================

use crate::config::column_layout::ColumnLayout;
use crate::config::import_config_trait::{ImportConfigReader, SourceEncoding};
use crate::db::open_sqlite_connection;
use crate::domain::types::DEFAULT_FISCAL_YEAR_START_MONTH;
use crate::importer::error::{ImportError, ImportResult};
use crate::repository::error::{RepositoryError, RepositoryResult};
use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

// ==========================================
// ConfigManager - 配置管理器
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// 创建新的 ConfigManager 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 从已有连接创建 ConfigManager
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 读取 global scope 的配置值
    ///
    /// # 返回
    /// - Some(String): 配置值
    /// - None: 配置不存在
    pub fn get_global_config_value(&self, key: &str) -> RepositoryResult<Option<String>> {
        let conn = self.get_conn()?;

        let value = conn
            .query_row(
                "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;

        Ok(value)
    }

    /// 写入 global scope 的配置值（UPSERT）
    pub fn set_global_config_value(&self, key: &str, value: &str) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO config_kv (scope_id, key, value, updated_at)
            VALUES ('global', ?1, ?2, datetime('now'))
            ON CONFLICT(scope_id, key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at
            "#,
            params![key, value],
        )?;
        tracing::info!(config_key = key, "配置已更新");
        Ok(())
    }

    /// 删除配置（恢复默认值）
    pub fn remove_global_config_value(&self, key: &str) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        let affected = conn.execute(
            "DELETE FROM config_kv WHERE scope_id = 'global' AND key = ?1",
            params![key],
        )?;
        Ok(affected > 0)
    }

    fn get_config_or_default(&self, key: &str, default: &str) -> RepositoryResult<String> {
        Ok(self
            .get_global_config_value(key)?
            .unwrap_or_else(|| default.to_string()))
    }

    /// 获取所有配置的快照
    ///
    /// # 用途
    /// - 写入导入批次的 DQ 报告,便于追溯导入时的配置
    pub fn get_config_snapshot(&self) -> RepositoryResult<BTreeMap<String, String>> {
        let conn = self.get_conn()?;

        let mut stmt =
            conn.prepare("SELECT key, value FROM config_kv WHERE scope_id = 'global' ORDER BY key")?;

        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut snapshot = BTreeMap::new();
        for row in rows {
            let (key, value) = row?;
            snapshot.insert(key, value);
        }

        Ok(snapshot)
    }

    fn parse_bool(raw: &str, default: bool) -> bool {
        match raw.trim().to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => true,
            "0" | "false" | "no" | "off" => false,
            _ => default,
        }
    }
}

// ==========================================
// ImportConfigReader Trait 实现
// ==========================================
#[async_trait]
impl ImportConfigReader for ConfigManager {
    async fn get_column_layout(&self) -> ImportResult<ColumnLayout> {
        match self.get_global_config_value(config_keys::COLUMN_LAYOUT)? {
            None => Ok(ColumnLayout::default()),
            Some(raw) => ColumnLayout::from_json(&raw).map_err(|message| {
                ImportError::ConfigValueError {
                    key: config_keys::COLUMN_LAYOUT.to_string(),
                    value: raw.chars().take(80).collect(),
                    message,
                }
            }),
        }
    }

    async fn get_source_encoding(&self) -> ImportResult<SourceEncoding> {
        let value = self.get_config_or_default(config_keys::SOURCE_ENCODING, "AUTO")?;
        Ok(value.parse::<SourceEncoding>().unwrap_or_else(|_| {
            tracing::warn!(
                config_key = config_keys::SOURCE_ENCODING,
                raw_value = %value,
                "编码配置无法识别，使用 AUTO"
            );
            SourceEncoding::Auto
        }))
    }

    async fn get_create_missing_projects(&self) -> ImportResult<bool> {
        let value = self.get_config_or_default(config_keys::CREATE_MISSING_PROJECTS, "true")?;
        Ok(Self::parse_bool(&value, true))
    }

    async fn get_enforce_contract_date_floor(&self) -> ImportResult<bool> {
        let value =
            self.get_config_or_default(config_keys::ENFORCE_CONTRACT_DATE_FLOOR, "true")?;
        Ok(Self::parse_bool(&value, true))
    }

    async fn get_fiscal_year_start_month(&self) -> ImportResult<u32> {
        let value = self.get_config_or_default(
            config_keys::FISCAL_YEAR_START_MONTH,
            &DEFAULT_FISCAL_YEAR_START_MONTH.to_string(),
        )?;
        Ok(value
            .trim()
            .parse::<u32>()
            .ok()
            .filter(|m| (1..=12).contains(m))
            .unwrap_or(DEFAULT_FISCAL_YEAR_START_MONTH))
    }

    async fn get_batch_retention_days(&self) -> ImportResult<i64> {
        let value = self.get_config_or_default(config_keys::BATCH_RETENTION_DAYS, "90")?;
        Ok(value.trim().parse::<i64>().unwrap_or(90))
    }
}

// ==========================================
// 配置键常量
// ==========================================
pub mod config_keys {
    // 导入
    pub const COLUMN_LAYOUT: &str = "import/column_layout";
    pub const SOURCE_ENCODING: &str = "import/encoding";
    pub const CREATE_MISSING_PROJECTS: &str = "import/create_missing_projects";
    pub const ENFORCE_CONTRACT_DATE_FLOOR: &str = "import/enforce_contract_date_floor";
    pub const BATCH_RETENTION_DAYS: &str = "import/batch_retention_days";

    // 会计年度
    pub const FISCAL_YEAR_START_MONTH: &str = "fiscal_year/start_month";

    pub const ALL: &[&str] = &[
        COLUMN_LAYOUT,
        SOURCE_ENCODING,
        CREATE_MISSING_PROJECTS,
        ENFORCE_CONTRACT_DATE_FLOOR,
        BATCH_RETENTION_DAYS,
        FISCAL_YEAR_START_MONTH,
    ];
}
