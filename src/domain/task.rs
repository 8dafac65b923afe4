// ==========================================
// G-progress - 任务领域模型
// ==========================================
// 红线: status 只由 due_date / actual_completion_date 推导
// ==========================================

use crate::domain::types::{Department, TaskSource, TaskStatus};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

// ==========================================
// Task - 工程里程碑
// ==========================================
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub task_id: String,
    pub project_id: String,
    pub task_name: String,
    pub department: Option<Department>,
    pub due_date: Option<NaiveDate>,               // 预定日（确定日优先）
    pub actual_completion_date: Option<NaiveDate>, // 实绩日
    pub status: TaskStatus,
    pub source: TaskSource,
    pub import_batch_id: Option<String>,
    pub sort_order: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// 创建手工任务
    pub fn manual(
        project_id: impl Into<String>,
        task_name: impl Into<String>,
        department: Option<Department>,
        due_date: Option<NaiveDate>,
    ) -> Self {
        let now = Utc::now();
        Self {
            task_id: uuid::Uuid::new_v4().to_string(),
            project_id: project_id.into(),
            task_name: task_name.into(),
            department,
            due_date,
            actual_completion_date: None,
            status: TaskStatus::derive(due_date, None),
            source: TaskSource::Manual,
            import_batch_id: None,
            sort_order: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// 更新日期并重新推导状态
    pub fn set_dates(&mut self, due_date: Option<NaiveDate>, actual: Option<NaiveDate>) {
        self.due_date = due_date;
        self.actual_completion_date = actual;
        self.status = TaskStatus::derive(due_date, actual);
        self.updated_at = Utc::now();
    }
}
