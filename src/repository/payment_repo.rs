// ==========================================
// G-progress - 付款仓储
// ==========================================
// 职责: payment 表 CRUD
// 约束: (project_id, kind) 唯一,写入统一走 UPSERT
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::payment::Payment;
use crate::domain::types::PaymentKind;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::row_mapping::get_enum;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex};

const SELECT_COLUMNS: &str = "payment_id, project_id, kind, scheduled_date, amount, \
     import_batch_id, created_at, updated_at";

fn map_payment_row(row: &Row<'_>) -> rusqlite::Result<Payment> {
    Ok(Payment {
        payment_id: row.get(0)?,
        project_id: row.get(1)?,
        kind: get_enum(row, 2)?,
        scheduled_date: row.get(3)?,
        amount: row.get(4)?,
        import_batch_id: row.get(5)?,
        created_at: row.get(6)?,
        updated_at: row.get(7)?,
    })
}

/// 按 (project_id, kind) UPSERT（可在事务内调用）
pub(crate) fn upsert_payment(conn: &Connection, payment: &Payment) -> RepositoryResult<()> {
    conn.execute(
        r#"
        INSERT INTO payment (
            payment_id, project_id, kind, scheduled_date, amount,
            import_batch_id, created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        ON CONFLICT(project_id, kind) DO UPDATE SET
            scheduled_date = excluded.scheduled_date,
            amount = excluded.amount,
            import_batch_id = excluded.import_batch_id,
            updated_at = excluded.updated_at
        "#,
        params![
            payment.payment_id,
            payment.project_id,
            payment.kind.as_str(),
            payment.scheduled_date,
            payment.amount,
            payment.import_batch_id,
            payment.created_at,
            payment.updated_at,
        ],
    )?;
    Ok(())
}

pub struct PaymentRepository {
    conn: Arc<Mutex<Connection>>,
}

impl PaymentRepository {
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

    pub fn upsert(&self, payment: &Payment) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        upsert_payment(&conn, payment)
    }

    pub fn find(&self, project_id: &str, kind: PaymentKind) -> RepositoryResult<Option<Payment>> {
        let conn = self.get_conn()?;
        let payment = conn
            .query_row(
                &format!(
                    "SELECT {} FROM payment WHERE project_id = ?1 AND kind = ?2",
                    SELECT_COLUMNS
                ),
                params![project_id, kind.as_str()],
                map_payment_row,
            )
            .optional()?;
        Ok(payment)
    }

    /// 项目下全部付款（按固定五期顺序）
    pub fn list_by_project(&self, project_id: &str) -> RepositoryResult<Vec<Payment>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM payment WHERE project_id = ?1",
            SELECT_COLUMNS
        ))?;
        let mut payments = stmt
            .query_map(params![project_id], map_payment_row)?
            .collect::<Result<Vec<_>, _>>()?;
        payments.sort_by_key(|p| p.kind);
        Ok(payments)
    }

    pub fn delete(&self, project_id: &str, kind: PaymentKind) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        let affected = conn.execute(
            "DELETE FROM payment WHERE project_id = ?1 AND kind = ?2",
            params![project_id, kind.as_str()],
        )?;
        Ok(affected > 0)
    }
}
