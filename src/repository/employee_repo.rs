// ==========================================
// G-progress - 员工仓储
// ==========================================
// 职责: employee 表 CRUD + 按姓名查找/创建
// 约束: name 唯一（导入时按标准化姓名查找）
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::project::Employee;
use crate::domain::types::Department;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::row_mapping::get_opt_enum;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex};

const SELECT_COLUMNS: &str = "employee_id, name, department, created_at";

fn map_employee_row(row: &Row<'_>) -> rusqlite::Result<Employee> {
    Ok(Employee {
        employee_id: row.get(0)?,
        name: row.get(1)?,
        department: get_opt_enum(row, 2)?,
        created_at: row.get(3)?,
    })
}

/// 按姓名查找,不存在则创建,返回 employee_id
pub(crate) fn find_or_create_employee(
    conn: &Connection,
    name: &str,
    department: Option<Department>,
) -> RepositoryResult<String> {
    let existing: Option<String> = conn
        .query_row(
            "SELECT employee_id FROM employee WHERE name = ?1",
            params![name],
            |row| row.get(0),
        )
        .optional()?;

    if let Some(id) = existing {
        return Ok(id);
    }

    let employee = Employee::new(name, department);
    conn.execute(
        "INSERT INTO employee (employee_id, name, department, created_at) VALUES (?1, ?2, ?3, ?4)",
        params![
            employee.employee_id,
            employee.name,
            employee.department.map(|d| d.as_str()),
            employee.created_at,
        ],
    )?;
    tracing::debug!(name = %employee.name, "新建员工");
    Ok(employee.employee_id)
}

pub struct EmployeeRepository {
    conn: Arc<Mutex<Connection>>,
}

impl EmployeeRepository {
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

    pub fn insert(&self, employee: &Employee) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT INTO employee (employee_id, name, department, created_at) VALUES (?1, ?2, ?3, ?4)",
            params![
                employee.employee_id,
                employee.name,
                employee.department.map(|d| d.as_str()),
                employee.created_at,
            ],
        )?;
        Ok(())
    }

    pub fn find_by_id(&self, employee_id: &str) -> RepositoryResult<Option<Employee>> {
        let conn = self.get_conn()?;
        let employee = conn
            .query_row(
                &format!("SELECT {} FROM employee WHERE employee_id = ?1", SELECT_COLUMNS),
                params![employee_id],
                map_employee_row,
            )
            .optional()?;
        Ok(employee)
    }

    pub fn find_by_name(&self, name: &str) -> RepositoryResult<Option<Employee>> {
        let conn = self.get_conn()?;
        let employee = conn
            .query_row(
                &format!("SELECT {} FROM employee WHERE name = ?1", SELECT_COLUMNS),
                params![name],
                map_employee_row,
            )
            .optional()?;
        Ok(employee)
    }

    pub fn find_or_create(
        &self,
        name: &str,
        department: Option<Department>,
    ) -> RepositoryResult<String> {
        let conn = self.get_conn()?;
        find_or_create_employee(&conn, name, department)
    }

    pub fn list_all(&self) -> RepositoryResult<Vec<Employee>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM employee ORDER BY name",
            SELECT_COLUMNS
        ))?;
        let employees = stmt
            .query_map([], map_employee_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(employees)
    }

    pub fn update_department(
        &self,
        employee_id: &str,
        department: Option<Department>,
    ) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let affected = conn.execute(
            "UPDATE employee SET department = ?1 WHERE employee_id = ?2",
            params![department.map(|d| d.as_str()), employee_id],
        )?;
        if affected == 0 {
            return Err(RepositoryError::NotFound {
                entity: "Employee".to_string(),
                id: employee_id.to_string(),
            });
        }
        Ok(())
    }

    pub fn delete(&self, employee_id: &str) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        let affected = conn.execute(
            "DELETE FROM employee WHERE employee_id = ?1",
            params![employee_id],
        )?;
        Ok(affected > 0)
    }
}
