// ==========================================
// G-progress - 客户仓储
// ==========================================
// 职责: customer 表 CRUD
// 存储: names_json（JSON 数组,保留原始写法）
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::project::Customer;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::row_mapping::get_json;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex};

const SELECT_COLUMNS: &str = "customer_id, names_json, created_at, updated_at";

pub(crate) fn map_customer_row(row: &Row<'_>) -> rusqlite::Result<Customer> {
    Ok(Customer {
        customer_id: row.get(0)?,
        names: get_json(row, 1)?,
        created_at: row.get(2)?,
        updated_at: row.get(3)?,
    })
}

/// 插入客户（可在事务内调用）
pub(crate) fn insert_customer(conn: &Connection, customer: &Customer) -> RepositoryResult<()> {
    conn.execute(
        "INSERT INTO customer (customer_id, names_json, created_at, updated_at) VALUES (?1, ?2, ?3, ?4)",
        params![
            customer.customer_id,
            serde_json::to_string(&customer.names)?,
            customer.created_at,
            customer.updated_at,
        ],
    )?;
    Ok(())
}

pub struct CustomerRepository {
    conn: Arc<Mutex<Connection>>,
}

impl CustomerRepository {
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

    pub fn insert(&self, customer: &Customer) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        insert_customer(&conn, customer)
    }

    pub fn find_by_id(&self, customer_id: &str) -> RepositoryResult<Option<Customer>> {
        let conn = self.get_conn()?;
        let customer = conn
            .query_row(
                &format!("SELECT {} FROM customer WHERE customer_id = ?1", SELECT_COLUMNS),
                params![customer_id],
                map_customer_row,
            )
            .optional()?;
        Ok(customer)
    }

    pub fn list_all(&self) -> RepositoryResult<Vec<Customer>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM customer ORDER BY created_at",
            SELECT_COLUMNS
        ))?;
        let customers = stmt
            .query_map([], map_customer_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(customers)
    }

    /// 更新姓名列表
    pub fn update_names(&self, customer_id: &str, names: &[String]) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let affected = conn.execute(
            "UPDATE customer SET names_json = ?1, updated_at = ?2 WHERE customer_id = ?3",
            params![serde_json::to_string(names)?, Utc::now(), customer_id],
        )?;
        if affected == 0 {
            return Err(RepositoryError::NotFound {
                entity: "Customer".to_string(),
                id: customer_id.to_string(),
            });
        }
        Ok(())
    }

    /// 删除客户（关联项目的 customer_id 置空）
    pub fn delete(&self, customer_id: &str) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        let affected = conn.execute(
            "DELETE FROM customer WHERE customer_id = ?1",
            params![customer_id],
        )?;
        Ok(affected > 0)
    }
}
