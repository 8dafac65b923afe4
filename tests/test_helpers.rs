// ==========================================
// 测试辅助函数
// ==========================================
// 职责: 临时数据库、进度表 CSV 构造
// ==========================================

#![allow(dead_code)]

use g_progress::config::ColumnLayout;
use g_progress::db::{init_schema, open_sqlite_connection};
use g_progress::domain::types::PaymentKind;
use rusqlite::Connection;
use std::error::Error;
use std::io::Write;
use std::sync::{Arc, Mutex};
use tempfile::{Builder, NamedTempFile};

/// 创建临时测试数据库并初始化 schema
///
/// # 返回
/// - NamedTempFile: 临时数据库文件（需要保持存活）
/// - String: 数据库文件路径
pub fn create_test_db() -> Result<(NamedTempFile, String), Box<dyn Error>> {
    let temp_file = NamedTempFile::new()?;
    let db_path = temp_file.path().to_str().ok_or("临时路径非 UTF-8")?.to_string();

    let conn = open_sqlite_connection(&db_path)?;
    init_schema(&conn)?;

    Ok((temp_file, db_path))
}

/// 创建临时数据库并返回共享连接
pub fn create_shared_conn() -> (NamedTempFile, Arc<Mutex<Connection>>) {
    let (temp_file, db_path) = create_test_db().expect("创建测试数据库失败");
    let conn = open_sqlite_connection(&db_path).expect("打开测试数据库失败");
    (temp_file, Arc::new(Mutex::new(conn)))
}

// ==========================================
// SheetBuilder - 按默认列布局构造进度表
// ==========================================
// 两行表头 + 228 列,单元格按列号填写
pub struct SheetBuilder {
    layout: ColumnLayout,
    rows: Vec<Vec<String>>,
    width: usize,
}

impl SheetBuilder {
    pub fn new() -> Self {
        let layout = ColumnLayout::default();
        let width = layout.expected_columns;
        Self {
            layout,
            rows: Vec::new(),
            width,
        }
    }

    /// 表头列数与布局不一致（模拟列偏移）
    pub fn with_width(mut self, width: usize) -> Self {
        self.width = width;
        self
    }

    pub fn row(mut self, row: RowBuilder) -> Self {
        let mut cells = vec![String::new(); self.width.max(self.layout.expected_columns)];
        for (col, value) in row.cells {
            if let Some(cell) = cells.get_mut(col) {
                *cell = value;
            }
        }
        self.rows.push(cells);
        self
    }

    pub fn to_csv(&self) -> String {
        let group_header: Vec<String> = (0..self.width)
            .map(|i| if i == 0 { "No".to_string() } else { String::new() })
            .collect();
        let role_header: Vec<String> = (0..self.width).map(|i| format!("C{}", i)).collect();

        let mut out = String::new();
        out.push_str(&group_header.join(","));
        out.push('\n');
        out.push_str(&role_header.join(","));
        out.push('\n');
        for row in &self.rows {
            out.push_str(&row.iter().map(|c| quote(c)).collect::<Vec<_>>().join(","));
            out.push('\n');
        }
        out
    }

    /// 写入临时 .csv 文件（需要保持存活）
    pub fn write(&self) -> NamedTempFile {
        let mut file = Builder::new()
            .prefix("progress_")
            .suffix(".csv")
            .tempfile()
            .expect("创建临时 CSV 失败");
        file.write_all(self.to_csv().as_bytes()).expect("写入 CSV 失败");
        file.flush().expect("刷新 CSV 失败");
        file
    }
}

fn quote(cell: &str) -> String {
    if cell.contains(',') || cell.contains('"') {
        format!("\"{}\"", cell.replace('"', "\"\""))
    } else {
        cell.to_string()
    }
}

// ==========================================
// RowBuilder - 单行数据
// ==========================================
pub struct RowBuilder {
    layout: ColumnLayout,
    cells: Vec<(usize, String)>,
}

impl RowBuilder {
    pub fn new(contract_no: &str, customer: &str, contract_date: &str) -> Self {
        let layout = ColumnLayout::default();
        let cells = vec![
            (layout.contract_no, contract_no.to_string()),
            (layout.customer_name, customer.to_string()),
            (layout.contract_date, contract_date.to_string()),
        ];
        Self { layout, cells }
    }

    fn milestone_col(&self, task_name: &str, role: &str) -> usize {
        let m = self
            .layout
            .milestones
            .iter()
            .find(|m| m.task_name == task_name)
            .unwrap_or_else(|| panic!("未知里程碑: {}", task_name));
        match role {
            "planned" => m.planned,
            "confirmed" => m.confirmed,
            _ => m.actual,
        }
        .expect("里程碑缺少该角色列")
    }

    pub fn planned(mut self, task_name: &str, value: &str) -> Self {
        let col = self.milestone_col(task_name, "planned");
        self.cells.push((col, value.to_string()));
        self
    }

    pub fn confirmed(mut self, task_name: &str, value: &str) -> Self {
        let col = self.milestone_col(task_name, "confirmed");
        self.cells.push((col, value.to_string()));
        self
    }

    pub fn actual(mut self, task_name: &str, value: &str) -> Self {
        let col = self.milestone_col(task_name, "actual");
        self.cells.push((col, value.to_string()));
        self
    }

    pub fn payment(mut self, kind: PaymentKind, date: &str, amount: &str) -> Self {
        let p = self
            .layout
            .payments
            .iter()
            .find(|p| p.kind == kind)
            .expect("布局缺少付款种类");
        if let Some(col) = p.date {
            self.cells.push((col, date.to_string()));
        }
        if let Some(col) = p.amount {
            self.cells.push((col, amount.to_string()));
        }
        self
    }

    pub fn address(mut self, value: &str) -> Self {
        let col = self.layout.address.expect("布局缺少建设地列");
        self.cells.push((col, value.to_string()));
        self
    }

    pub fn sales_staff(mut self, value: &str) -> Self {
        let col = self.layout.sales_staff.expect("布局缺少营业担当列");
        self.cells.push((col, value.to_string()));
        self
    }

    pub fn construction_staff(mut self, value: &str) -> Self {
        let col = self.layout.construction_staff.expect("布局缺少工务担当列");
        self.cells.push((col, value.to_string()));
        self
    }
}
