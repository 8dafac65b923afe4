// ==========================================
// G-progress - 付款领域模型
// ==========================================

use crate::domain::types::PaymentKind;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

// ==========================================
// Payment - 阶段付款
// ==========================================
// 约束: (project_id, kind) 唯一
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub payment_id: String,
    pub project_id: String,
    pub kind: PaymentKind,
    pub scheduled_date: Option<NaiveDate>,
    pub amount: Option<i64>, // 日元
    pub import_batch_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Payment {
    pub fn new(
        project_id: impl Into<String>,
        kind: PaymentKind,
        scheduled_date: Option<NaiveDate>,
        amount: Option<i64>,
    ) -> Self {
        let now = Utc::now();
        Self {
            payment_id: uuid::Uuid::new_v4().to_string(),
            project_id: project_id.into(),
            kind,
            scheduled_date,
            amount,
            import_batch_id: None,
            created_at: now,
            updated_at: now,
        }
    }
}
