// ==========================================
// G-progress - 导入 Repository 实现
// ==========================================
// 职责: 实现导入相关数据访问（使用 rusqlite）
// 红线: Repository 不含业务规则,只做数据读写
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::import::{
    ConflictStatus, ContractDateViolation, ImportBatch, ImportConflict, ProjectImportWrite,
    ProjectTarget, StoredCounts, WriteOutcome,
};
use crate::domain::payment::Payment;
use crate::domain::project::ProjectCandidate;
use crate::domain::task::Task;
use crate::domain::types::{TaskSource, TaskStatus};
use crate::repository::customer_repo::insert_customer;
use crate::repository::employee_repo::find_or_create_employee;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::import_repo::ImportRepository;
use crate::repository::payment_repo::upsert_payment;
use crate::repository::project_repo::{find_candidates, insert_project};
use crate::repository::row_mapping::get_enum;
use crate::repository::task_repo::insert_task;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tracing::debug;

const BATCH_COLUMNS: &str = "batch_id, file_name, file_path, total_rows, success_rows, \
     blocked_rows, warning_rows, conflict_rows, created_projects, tasks_written, \
     payments_written, dry_run, imported_at, elapsed_ms, dq_report_json";

const CONFLICT_COLUMNS: &str = "conflict_id, batch_id, row_number, contract_no, conflict_type, \
     raw_data, reason, status, resolution_note, resolved_at, created_at";

fn map_batch_row(row: &Row<'_>) -> rusqlite::Result<ImportBatch> {
    Ok(ImportBatch {
        batch_id: row.get(0)?,
        file_name: row.get(1)?,
        file_path: row.get(2)?,
        total_rows: row.get(3)?,
        success_rows: row.get(4)?,
        blocked_rows: row.get(5)?,
        warning_rows: row.get(6)?,
        conflict_rows: row.get(7)?,
        created_projects: row.get(8)?,
        tasks_written: row.get(9)?,
        payments_written: row.get(10)?,
        dry_run: row.get(11)?,
        imported_at: row.get(12)?,
        elapsed_ms: row.get(13)?,
        dq_report_json: row.get(14)?,
    })
}

fn map_conflict_row(row: &Row<'_>) -> rusqlite::Result<ImportConflict> {
    let row_number: i64 = row.get(2)?;
    Ok(ImportConflict {
        conflict_id: row.get(0)?,
        batch_id: row.get(1)?,
        row_number: row_number as usize,
        contract_no: row.get(3)?,
        conflict_type: get_enum(row, 4)?,
        raw_data: row.get(5)?,
        reason: row.get(6)?,
        status: get_enum(row, 7)?,
        resolution_note: row.get(8)?,
        resolved_at: row.get(9)?,
        created_at: row.get(10)?,
    })
}

// ==========================================
// ImportRepositoryImpl
// ==========================================
pub struct ImportRepositoryImpl {
    conn: Arc<Mutex<Connection>>,
}

impl ImportRepositoryImpl {
    /// 创建新的 Repository 实例
    ///
    /// # 参数
    /// - db_path: 数据库文件路径
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// 共享已有连接
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// 在事务中写入单个项目
    fn write_project_import_tx(
        tx: &Connection,
        write: &ProjectImportWrite,
    ) -> RepositoryResult<WriteOutcome> {
        let mut outcome = WriteOutcome::default();
        let project_id = write.target.project_id().to_string();

        if let ProjectTarget::New { project, customer } = &write.target {
            if let Some(customer) = customer {
                insert_customer(tx, customer)?;
            }
            insert_project(tx, project)?;
            outcome.project_created = true;
        }

        let now = Utc::now();

        // 源表空单元格不覆盖已有值
        let affected = tx.execute(
            r#"
            UPDATE project SET
                contract_date = COALESCE(?1, contract_date),
                address = COALESCE(?2, address),
                sales_staff_id = COALESCE(?3, sales_staff_id),
                design_staff_id = COALESCE(?4, design_staff_id),
                construction_staff_id = COALESCE(?5, construction_staff_id),
                status = ?6,
                updated_at = ?7
            WHERE project_id = ?8
            "#,
            params![
                write.contract_date,
                write.address,
                write.sales_staff_id,
                write.design_staff_id,
                write.construction_staff_id,
                write.derived_status.as_str(),
                now,
                project_id,
            ],
        )?;
        if affected == 0 {
            return Err(RepositoryError::NotFound {
                entity: "Project".to_string(),
                id: project_id,
            });
        }

        // IMPORT 任务整体替换,MANUAL 任务不动
        outcome.tasks_deleted = tx.execute(
            "DELETE FROM task WHERE project_id = ?1 AND source = ?2",
            params![project_id, TaskSource::Import.as_str()],
        )?;

        for draft in &write.tasks {
            let task = Task {
                task_id: uuid::Uuid::new_v4().to_string(),
                project_id: project_id.clone(),
                task_name: draft.task_name.clone(),
                department: draft.department,
                due_date: draft.due_date,
                actual_completion_date: draft.actual_completion_date,
                status: TaskStatus::derive(draft.due_date, draft.actual_completion_date),
                source: TaskSource::Import,
                import_batch_id: Some(write.batch_id.clone()),
                sort_order: draft.sort_order,
                created_at: now,
                updated_at: now,
            };
            insert_task(tx, &task)?;
            outcome.tasks_written += 1;
        }

        for draft in &write.payments {
            if draft.scheduled_date.is_none() && draft.amount.is_none() {
                continue;
            }
            let mut payment =
                Payment::new(project_id.clone(), draft.kind, draft.scheduled_date, draft.amount);
            payment.import_batch_id = Some(write.batch_id.clone());
            upsert_payment(tx, &payment)?;
            outcome.payments_written += 1;
        }

        Ok(outcome)
    }
}

#[async_trait]
impl ImportRepository for ImportRepositoryImpl {
    async fn find_project_candidates(
        &self,
        contract_no: &str,
    ) -> RepositoryResult<Vec<ProjectCandidate>> {
        let conn = self.get_conn()?;
        find_candidates(&conn, contract_no)
    }

    async fn find_or_create_employee(&self, name: &str) -> RepositoryResult<String> {
        let conn = self.get_conn()?;
        find_or_create_employee(&conn, name, None)
    }

    /// 单项目导入写入（事务化）
    async fn write_project_import(
        &self,
        write: ProjectImportWrite,
    ) -> RepositoryResult<WriteOutcome> {
        let conn = self.get_conn()?;
        let tx = conn
            .unchecked_transaction()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        let outcome = Self::write_project_import_tx(&tx, &write)?;

        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        debug!(
            project_id = %write.target.project_id(),
            created = outcome.project_created,
            tasks_deleted = outcome.tasks_deleted,
            tasks_written = outcome.tasks_written,
            "项目写入完成"
        );
        Ok(outcome)
    }

    async fn insert_batch(&self, batch: ImportBatch) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            &format!(
                "INSERT INTO import_batch ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
                BATCH_COLUMNS
            ),
            params![
                batch.batch_id,
                batch.file_name,
                batch.file_path,
                batch.total_rows,
                batch.success_rows,
                batch.blocked_rows,
                batch.warning_rows,
                batch.conflict_rows,
                batch.created_projects,
                batch.tasks_written,
                batch.payments_written,
                batch.dry_run,
                batch.imported_at,
                batch.elapsed_ms,
                batch.dq_report_json,
            ],
        )?;
        Ok(())
    }

    async fn get_batch(&self, batch_id: &str) -> RepositoryResult<Option<ImportBatch>> {
        let conn = self.get_conn()?;
        let batch = conn
            .query_row(
                &format!("SELECT {} FROM import_batch WHERE batch_id = ?1", BATCH_COLUMNS),
                params![batch_id],
                map_batch_row,
            )
            .optional()?;
        Ok(batch)
    }

    async fn get_recent_batches(&self, limit: usize) -> RepositoryResult<Vec<ImportBatch>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM import_batch ORDER BY imported_at DESC LIMIT ?1",
            BATCH_COLUMNS
        ))?;
        let batches = stmt
            .query_map(params![limit as i64], map_batch_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(batches)
    }

    async fn prune_batches_older_than(&self, cutoff: DateTime<Utc>) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let deleted = conn.execute(
            "DELETE FROM import_batch WHERE imported_at < ?1",
            params![cutoff],
        )?;
        Ok(deleted)
    }

    async fn batch_insert_conflicts(
        &self,
        conflicts: Vec<ImportConflict>,
    ) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let tx = conn
            .unchecked_transaction()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;

        let mut count = 0;
        {
            let mut stmt = tx.prepare(&format!(
                "INSERT INTO import_conflict ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
                CONFLICT_COLUMNS
            ))?;
            for conflict in &conflicts {
                stmt.execute(params![
                    conflict.conflict_id,
                    conflict.batch_id,
                    conflict.row_number as i64,
                    conflict.contract_no,
                    conflict.conflict_type.as_str(),
                    conflict.raw_data,
                    conflict.reason,
                    conflict.status.as_str(),
                    conflict.resolution_note,
                    conflict.resolved_at,
                    conflict.created_at,
                ])?;
                count += 1;
            }
        }

        tx.commit()
            .map_err(|e| RepositoryError::DatabaseTransactionError(e.to_string()))?;
        Ok(count)
    }

    async fn list_conflicts_with_filter(
        &self,
        batch_id: Option<&str>,
        status: Option<ConflictStatus>,
        limit: i32,
        offset: i32,
    ) -> RepositoryResult<Vec<ImportConflict>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            r#"
            SELECT {} FROM import_conflict
            WHERE (?1 IS NULL OR batch_id = ?1)
              AND (?2 IS NULL OR status = ?2)
            ORDER BY created_at DESC, row_number
            LIMIT ?3 OFFSET ?4
            "#,
            CONFLICT_COLUMNS
        ))?;
        let conflicts = stmt
            .query_map(
                params![batch_id, status.map(|s| s.as_str()), limit, offset],
                map_conflict_row,
            )?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(conflicts)
    }

    async fn count_conflicts(
        &self,
        batch_id: Option<&str>,
        status: Option<ConflictStatus>,
    ) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        let count: i64 = conn.query_row(
            r#"
            SELECT COUNT(*) FROM import_conflict
            WHERE (?1 IS NULL OR batch_id = ?1)
              AND (?2 IS NULL OR status = ?2)
            "#,
            params![batch_id, status.map(|s| s.as_str())],
            |row| row.get(0),
        )?;
        Ok(count)
    }

    async fn get_conflict_by_id(
        &self,
        conflict_id: &str,
    ) -> RepositoryResult<Option<ImportConflict>> {
        let conn = self.get_conn()?;
        let conflict = conn
            .query_row(
                &format!(
                    "SELECT {} FROM import_conflict WHERE conflict_id = ?1",
                    CONFLICT_COLUMNS
                ),
                params![conflict_id],
                map_conflict_row,
            )
            .optional()?;
        Ok(conflict)
    }

    async fn resolve_conflict(
        &self,
        conflict_id: &str,
        status: ConflictStatus,
        note: Option<&str>,
    ) -> RepositoryResult<()> {
        if status == ConflictStatus::Open {
            return Err(RepositoryError::ValidationError(
                "冲突只能关闭为 RESOLVED 或 IGNORED".to_string(),
            ));
        }

        let conn = self.get_conn()?;
        let affected = conn.execute(
            r#"
            UPDATE import_conflict
            SET status = ?1, resolution_note = ?2, resolved_at = ?3
            WHERE conflict_id = ?4
            "#,
            params![status.as_str(), note, Utc::now(), conflict_id],
        )?;
        if affected == 0 {
            return Err(RepositoryError::NotFound {
                entity: "ImportConflict".to_string(),
                id: conflict_id.to_string(),
            });
        }
        Ok(())
    }

    async fn get_stored_counts(&self, project_id: &str) -> RepositoryResult<StoredCounts> {
        let conn = self.get_conn()?;
        let (imported, completed): (i64, i64) = conn.query_row(
            r#"
            SELECT COUNT(*),
                   COALESCE(SUM(CASE WHEN actual_completion_date IS NOT NULL THEN 1 ELSE 0 END), 0)
            FROM task
            WHERE project_id = ?1 AND source = ?2
            "#,
            params![project_id, TaskSource::Import.as_str()],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        let payments: i64 = conn.query_row(
            "SELECT COUNT(*) FROM payment WHERE project_id = ?1",
            params![project_id],
            |row| row.get(0),
        )?;

        Ok(StoredCounts {
            imported_tasks: imported as usize,
            completed_tasks: completed as usize,
            payments: payments as usize,
        })
    }

    async fn find_contract_date_violations(
        &self,
        project_ids: Option<&[String]>,
    ) -> RepositoryResult<Vec<ContractDateViolation>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT p.project_id, p.contract_no, p.contract_date,
                   t.task_id, t.task_name, t.due_date, t.actual_completion_date
            FROM task t
            JOIN project p ON p.project_id = t.project_id
            WHERE p.contract_date IS NOT NULL
              AND ((t.due_date IS NOT NULL AND t.due_date < p.contract_date)
                OR (t.actual_completion_date IS NOT NULL AND t.actual_completion_date < p.contract_date))
            ORDER BY p.contract_no, t.sort_order
            "#,
        )?;
        let violations = stmt
            .query_map([], |row| {
                Ok(ContractDateViolation {
                    project_id: row.get(0)?,
                    contract_no: row.get(1)?,
                    contract_date: row.get(2)?,
                    task_id: row.get(3)?,
                    task_name: row.get(4)?,
                    due_date: row.get(5)?,
                    actual_completion_date: row.get(6)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let violations = match project_ids {
            Some(ids) => {
                let wanted: HashSet<&str> = ids.iter().map(|s| s.as_str()).collect();
                violations
                    .into_iter()
                    .filter(|v| wanted.contains(v.project_id.as_str()))
                    .collect()
            }
            None => violations,
        };
        Ok(violations)
    }
}
