// ==========================================
// G-progress - 应用状态
// ==========================================
// 职责: 打开数据库、建表,持有共享连接与各 API 实例
// ==========================================

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use rusqlite::Connection;

use crate::api::{ImportApi, ProjectApi};
use crate::config::ConfigManager;
use crate::db::{init_schema, open_sqlite_connection};
use crate::repository::{
    CustomerRepository, EmployeeRepository, PaymentRepository, ProjectRepository,
    RepositoryError, RepositoryResult, TaskRepository,
};

/// 数据库路径环境变量
pub const DB_PATH_ENV: &str = "G_PROGRESS_DB_PATH";

/// 应用状态
///
/// 所有 Repository 共享同一个连接
pub struct AppState {
    /// 数据库路径
    pub db_path: String,

    /// 共享连接
    pub conn: Arc<Mutex<Connection>>,

    /// 配置管理器
    pub config_manager: Arc<ConfigManager>,

    /// 员工仓储（担当查询）
    pub employee_repo: Arc<EmployeeRepository>,

    /// 导入API
    pub import_api: Arc<ImportApi>,

    /// 项目API
    pub project_api: Arc<ProjectApi>,
}

impl AppState {
    /// 打开数据库并初始化 schema
    pub fn new(db_path: String) -> RepositoryResult<Self> {
        tracing::info!(db_path = %db_path, "初始化AppState");

        let conn = open_sqlite_connection(&db_path)
            .map_err(|e| RepositoryError::DatabaseConnectionError(format!("无法打开数据库: {}", e)))?;
        init_schema(&conn)?;

        Ok(Self::from_connection(db_path, Arc::new(Mutex::new(conn))))
    }

    /// 基于已初始化的连接组装
    pub fn from_connection(db_path: String, conn: Arc<Mutex<Connection>>) -> Self {
        let config_manager = Arc::new(ConfigManager::from_connection(conn.clone()));
        let employee_repo = Arc::new(EmployeeRepository::from_connection(conn.clone()));

        let project_api = Arc::new(ProjectApi::new(
            Arc::new(ProjectRepository::from_connection(conn.clone())),
            Arc::new(CustomerRepository::from_connection(conn.clone())),
            Arc::new(TaskRepository::from_connection(conn.clone())),
            Arc::new(PaymentRepository::from_connection(conn.clone())),
            config_manager.clone(),
        ));
        let import_api = Arc::new(ImportApi::new(conn.clone()));

        Self {
            db_path,
            conn,
            config_manager,
            employee_repo,
            import_api,
            project_api,
        }
    }
}

/// 默认数据库路径
///
/// 优先级: G_PROGRESS_DB_PATH > 用户数据目录/g-progress/g_progress.db > ./g_progress.db
pub fn get_default_db_path() -> String {
    if let Ok(path) = std::env::var(DB_PATH_ENV) {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let mut path = PathBuf::from("./g_progress.db");

    if let Some(data_dir) = dirs::data_dir() {
        let dir = data_dir.join("g-progress");
        // 目录创建失败时回退到当前目录
        if std::fs::create_dir_all(&dir).is_ok() {
            path = dir.join("g_progress.db");
        }
    }

    path.to_string_lossy().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_app_state_initializes_schema() {
        let temp = NamedTempFile::new().unwrap();
        let db_path = temp.path().to_str().unwrap().to_string();

        let state = AppState::new(db_path.clone()).unwrap();
        assert_eq!(state.db_path, db_path);

        let conn = state.conn.lock().unwrap();
        let version = crate::db::read_schema_version(&conn).unwrap();
        assert_eq!(version, Some(crate::db::CURRENT_SCHEMA_VERSION));
    }
}
