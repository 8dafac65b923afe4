// ==========================================
// G-progress - 任务仓储
// ==========================================
// 职责: task 表 CRUD
// 红线: status 由日期推导,写入前统一重算
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::task::Task;
use crate::domain::types::{TaskSource, TaskStatus};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::row_mapping::{get_enum, get_opt_enum};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex};

const SELECT_COLUMNS: &str = "task_id, project_id, task_name, department, due_date, \
     actual_completion_date, status, source, import_batch_id, sort_order, created_at, updated_at";

fn map_task_row(row: &Row<'_>) -> rusqlite::Result<Task> {
    Ok(Task {
        task_id: row.get(0)?,
        project_id: row.get(1)?,
        task_name: row.get(2)?,
        department: get_opt_enum(row, 3)?,
        due_date: row.get(4)?,
        actual_completion_date: row.get(5)?,
        status: get_enum(row, 6)?,
        source: get_enum(row, 7)?,
        import_batch_id: row.get(8)?,
        sort_order: row.get(9)?,
        created_at: row.get(10)?,
        updated_at: row.get(11)?,
    })
}

/// 插入任务（可在事务内调用）
pub(crate) fn insert_task(conn: &Connection, task: &Task) -> RepositoryResult<()> {
    conn.execute(
        r#"
        INSERT INTO task (
            task_id, project_id, task_name, department, due_date, actual_completion_date,
            status, source, import_batch_id, sort_order, created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
        "#,
        params![
            task.task_id,
            task.project_id,
            task.task_name,
            task.department.map(|d| d.as_str()),
            task.due_date,
            task.actual_completion_date,
            TaskStatus::derive(task.due_date, task.actual_completion_date).as_str(),
            task.source.as_str(),
            task.import_batch_id,
            task.sort_order,
            task.created_at,
            task.updated_at,
        ],
    )?;
    Ok(())
}

pub struct TaskRepository {
    conn: Arc<Mutex<Connection>>,
}

impl TaskRepository {
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    pub fn insert(&self, task: &Task) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        insert_task(&conn, task)
    }

    pub fn find_by_id(&self, task_id: &str) -> RepositoryResult<Option<Task>> {
        let conn = self.get_conn()?;
        let task = conn
            .query_row(
                &format!("SELECT {} FROM task WHERE task_id = ?1", SELECT_COLUMNS),
                params![task_id],
                map_task_row,
            )
            .optional()?;
        Ok(task)
    }

    /// 项目下全部任务（按 sort_order,手工任务排在导入任务之后）
    pub fn list_by_project(&self, project_id: &str) -> RepositoryResult<Vec<Task>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            r#"
            SELECT {} FROM task
            WHERE project_id = ?1
            ORDER BY CASE source WHEN 'IMPORT' THEN 0 ELSE 1 END, sort_order, created_at
            "#,
            SELECT_COLUMNS
        ))?;
        let tasks = stmt
            .query_map(params![project_id], map_task_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(tasks)
    }

    pub fn count_by_source(&self, project_id: &str, source: TaskSource) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM task WHERE project_id = ?1 AND source = ?2",
            params![project_id, source.as_str()],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    pub fn update(&self, task: &Task) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let affected = conn.execute(
            r#"
            UPDATE task SET
                task_name = ?1, department = ?2, due_date = ?3, actual_completion_date = ?4,
                status = ?5, sort_order = ?6, updated_at = ?7
            WHERE task_id = ?8
            "#,
            params![
                task.task_name,
                task.department.map(|d| d.as_str()),
                task.due_date,
                task.actual_completion_date,
                TaskStatus::derive(task.due_date, task.actual_completion_date).as_str(),
                task.sort_order,
                Utc::now(),
                task.task_id,
            ],
        )?;
        if affected == 0 {
            return Err(RepositoryError::NotFound {
                entity: "Task".to_string(),
                id: task.task_id.clone(),
            });
        }
        Ok(())
    }

    pub fn delete(&self, task_id: &str) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        let affected = conn.execute("DELETE FROM task WHERE task_id = ?1", params![task_id])?;
        Ok(affected > 0)
    }
}
