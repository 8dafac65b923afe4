// ==========================================
// G-progress - 项目领域模型
// ==========================================
// 职责: 项目 / 客户 / 员工实体
// 红线: 合同号不唯一 (源表存在不同客户共用同一合同号)
// ==========================================

use crate::domain::types::{Department, ProjectStatus};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

// ==========================================
// Project - 工程合同
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub project_id: String,                    // 项目 ID（UUID）
    pub contract_no: String,                   // 合同号（6 位数字）
    pub customer_id: Option<String>,           // 关联客户
    pub contract_date: Option<NaiveDate>,      // 合同日期
    pub status: ProjectStatus,                 // 项目状态
    pub address: Option<String>,               // 建设地

    // ===== 担当分配 =====
    pub sales_staff_id: Option<String>,        // 营业担当
    pub design_staff_id: Option<String>,       // 设计担当
    pub construction_staff_id: Option<String>, // 工务担当

    // ===== 审计字段 =====
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Project {
    pub fn new(contract_no: impl Into<String>, contract_date: Option<NaiveDate>) -> Self {
        let now = Utc::now();
        Self {
            project_id: uuid::Uuid::new_v4().to_string(),
            contract_no: contract_no.into(),
            customer_id: None,
            contract_date,
            status: ProjectStatus::Contracted,
            address: None,
            sales_staff_id: None,
            design_staff_id: None,
            construction_staff_id: None,
            created_at: now,
            updated_at: now,
        }
    }
}

// ==========================================
// Customer - 客户（可多人共签）
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    pub customer_id: String,
    pub names: Vec<String>, // 原样保存,比较时再标准化
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Customer {
    pub fn new(names: Vec<String>) -> Self {
        let now = Utc::now();
        Self {
            customer_id: uuid::Uuid::new_v4().to_string(),
            names,
            created_at: now,
            updated_at: now,
        }
    }

    /// 显示用名称（多人以「・」连接）
    pub fn display_name(&self) -> String {
        self.names.join("・")
    }
}

// ==========================================
// Employee - 员工
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Employee {
    pub employee_id: String,
    pub name: String,
    pub department: Option<Department>,
    pub created_at: DateTime<Utc>,
}

impl Employee {
    pub fn new(name: impl Into<String>, department: Option<Department>) -> Self {
        Self {
            employee_id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            department,
            created_at: Utc::now(),
        }
    }
}

// ==========================================
// ProjectCandidate - 合同号匹配候选
// ==========================================
// 用途: 导入时按合同号查出的项目及其客户姓名
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectCandidate {
    pub project: Project,
    pub customer_names: Vec<String>,
}
