// ==========================================
// G-progress - 项目仓储
// ==========================================
// 职责: project 表 CRUD + 合同号/会计年度查询
// 红线: 合同号不唯一,find_by_contract_no 返回列表
// ==========================================

use crate::db::open_sqlite_connection;
use crate::domain::project::{Project, ProjectCandidate};
use crate::domain::types::FiscalYear;
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::row_mapping::{get_enum, get_json};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::sync::{Arc, Mutex};

pub(crate) const SELECT_COLUMNS: &str = "p.project_id, p.contract_no, p.customer_id, \
     p.contract_date, p.status, p.address, p.sales_staff_id, p.design_staff_id, \
     p.construction_staff_id, p.created_at, p.updated_at";

pub(crate) fn map_project_row(row: &Row<'_>) -> rusqlite::Result<Project> {
    Ok(Project {
        project_id: row.get(0)?,
        contract_no: row.get(1)?,
        customer_id: row.get(2)?,
        contract_date: row.get(3)?,
        status: get_enum(row, 4)?,
        address: row.get(5)?,
        sales_staff_id: row.get(6)?,
        design_staff_id: row.get(7)?,
        construction_staff_id: row.get(8)?,
        created_at: row.get(9)?,
        updated_at: row.get(10)?,
    })
}

/// 插入项目（可在事务内调用）
pub(crate) fn insert_project(conn: &Connection, project: &Project) -> RepositoryResult<()> {
    conn.execute(
        r#"
        INSERT INTO project (
            project_id, contract_no, customer_id, contract_date, status, address,
            sales_staff_id, design_staff_id, construction_staff_id, created_at, updated_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
        "#,
        params![
            project.project_id,
            project.contract_no,
            project.customer_id,
            project.contract_date,
            project.status.as_str(),
            project.address,
            project.sales_staff_id,
            project.design_staff_id,
            project.construction_staff_id,
            project.created_at,
            project.updated_at,
        ],
    )?;
    Ok(())
}

/// 合同号候选（含客户姓名）
pub(crate) fn find_candidates(
    conn: &Connection,
    contract_no: &str,
) -> RepositoryResult<Vec<ProjectCandidate>> {
    let mut stmt = conn.prepare(&format!(
        r#"
        SELECT {}, c.names_json
        FROM project p
        LEFT JOIN customer c ON c.customer_id = p.customer_id
        WHERE p.contract_no = ?1
        ORDER BY p.created_at, p.project_id
        "#,
        SELECT_COLUMNS
    ))?;

    let candidates = stmt
        .query_map(params![contract_no], |row| {
            let names: Option<String> = row.get(11)?;
            let customer_names = match names {
                Some(_) => get_json(row, 11)?,
                None => Vec::new(),
            };
            Ok(ProjectCandidate {
                project: map_project_row(row)?,
                customer_names,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;

    Ok(candidates)
}

pub struct ProjectRepository {
    conn: Arc<Mutex<Connection>>,
}

impl ProjectRepository {
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

    pub fn insert(&self, project: &Project) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        insert_project(&conn, project)
    }

    pub fn find_by_id(&self, project_id: &str) -> RepositoryResult<Option<Project>> {
        let conn = self.get_conn()?;
        let project = conn
            .query_row(
                &format!("SELECT {} FROM project p WHERE p.project_id = ?1", SELECT_COLUMNS),
                params![project_id],
                map_project_row,
            )
            .optional()?;
        Ok(project)
    }

    pub fn find_by_contract_no(&self, contract_no: &str) -> RepositoryResult<Vec<Project>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM project p WHERE p.contract_no = ?1 ORDER BY p.created_at",
            SELECT_COLUMNS
        ))?;
        let projects = stmt
            .query_map(params![contract_no], map_project_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(projects)
    }

    pub fn find_candidates(&self, contract_no: &str) -> RepositoryResult<Vec<ProjectCandidate>> {
        let conn = self.get_conn()?;
        find_candidates(&conn, contract_no)
    }

    pub fn list_all(&self) -> RepositoryResult<Vec<Project>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM project p ORDER BY p.contract_no, p.created_at",
            SELECT_COLUMNS
        ))?;
        let projects = stmt
            .query_map([], map_project_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(projects)
    }

    /// 按合同日期所属会计年度查询
    pub fn list_by_fiscal_year(&self, fiscal_year: FiscalYear) -> RepositoryResult<Vec<Project>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(&format!(
            r#"
            SELECT {} FROM project p
            WHERE p.contract_date >= ?1 AND p.contract_date <= ?2
            ORDER BY p.contract_date, p.contract_no
            "#,
            SELECT_COLUMNS
        ))?;
        let projects = stmt
            .query_map(params![fiscal_year.start(), fiscal_year.end()], map_project_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(projects)
    }

    pub fn update(&self, project: &Project) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        let affected = conn.execute(
            r#"
            UPDATE project SET
                contract_no = ?1, customer_id = ?2, contract_date = ?3, status = ?4,
                address = ?5, sales_staff_id = ?6, design_staff_id = ?7,
                construction_staff_id = ?8, updated_at = ?9
            WHERE project_id = ?10
            "#,
            params![
                project.contract_no,
                project.customer_id,
                project.contract_date,
                project.status.as_str(),
                project.address,
                project.sales_staff_id,
                project.design_staff_id,
                project.construction_staff_id,
                Utc::now(),
                project.project_id,
            ],
        )?;
        if affected == 0 {
            return Err(RepositoryError::NotFound {
                entity: "Project".to_string(),
                id: project.project_id.clone(),
            });
        }
        Ok(())
    }

    /// 删除项目（任务/付款级联删除）
    pub fn delete(&self, project_id: &str) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        let affected = conn.execute(
            "DELETE FROM project WHERE project_id = ?1",
            params![project_id],
        )?;
        Ok(affected > 0)
    }
}
