// ==========================================
// G-progress - 项目 API
// ==========================================
// 职责: 项目/任务/付款的查询与人工维护
// 红线: 手工任务 source = MANUAL,导入不覆盖; IMPORT 任务不允许手工删除
// ==========================================

use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::api::error::{ApiError, ApiResult};
use crate::config::{ConfigManager, ImportConfigReader};
use crate::domain::payment::Payment;
use crate::domain::project::{Customer, Project};
use crate::domain::task::Task;
use crate::domain::types::{Department, FiscalYear, PaymentKind, ProjectStatus, TaskSource};
use crate::importer::{DataCleaner, DataCleanerImpl};
use crate::repository::{
    CustomerRepository, PaymentRepository, ProjectRepository, TaskRepository,
};

// ==========================================
// ProjectDetail - 项目详情
// ==========================================
/// 项目 + 客户 + 任务 + 付款
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectDetail {
    pub project: Project,
    pub customer: Option<Customer>,
    pub tasks: Vec<Task>,
    pub payments: Vec<Payment>,
}

/// 创建项目请求
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateProjectRequest {
    pub contract_no: String,
    pub contract_date: Option<NaiveDate>,
    pub customer_names: Vec<String>,
    pub address: Option<String>,
}

// ==========================================
// ProjectApi - 项目 API
// ==========================================
pub struct ProjectApi {
    project_repo: Arc<ProjectRepository>,
    customer_repo: Arc<CustomerRepository>,
    task_repo: Arc<TaskRepository>,
    payment_repo: Arc<PaymentRepository>,
    config: Arc<ConfigManager>,
    cleaner: DataCleanerImpl,
}

impl ProjectApi {
    pub fn new(
        project_repo: Arc<ProjectRepository>,
        customer_repo: Arc<CustomerRepository>,
        task_repo: Arc<TaskRepository>,
        payment_repo: Arc<PaymentRepository>,
        config: Arc<ConfigManager>,
    ) -> Self {
        Self {
            project_repo,
            customer_repo,
            task_repo,
            payment_repo,
            config,
            cleaner: DataCleanerImpl,
        }
    }

    // ==========================================
    // 项目
    // ==========================================

    /// 手工登记项目
    ///
    /// # 说明
    /// - 合同号按导入相同规则标准化为 6 位
    /// - 客户名按「・」「、」等分隔符拆分
    pub fn create_project(&self, request: CreateProjectRequest) -> ApiResult<Project> {
        let contract_no = self
            .cleaner
            .normalize_contract_no(&request.contract_no)
            .map_err(|e| ApiError::InvalidInput(e.to_string()))?;

        let names: Vec<String> = request
            .customer_names
            .iter()
            .flat_map(|n| self.cleaner.split_customer_names(n))
            .collect();

        let mut project = Project::new(contract_no, request.contract_date);
        project.address = request
            .address
            .map(|a| a.trim().to_string())
            .filter(|a| !a.is_empty());

        if !names.is_empty() {
            let customer = Customer::new(names);
            self.customer_repo.insert(&customer)?;
            project.customer_id = Some(customer.customer_id);
        }

        self.project_repo.insert(&project)?;
        info!(project_id = %project.project_id, contract_no = %project.contract_no, "项目已创建");
        Ok(project)
    }

    pub fn get_project(&self, project_id: &str) -> ApiResult<ProjectDetail> {
        let project = self.require_project(project_id)?;

        let customer = match project.customer_id.as_deref() {
            Some(customer_id) => self.customer_repo.find_by_id(customer_id)?,
            None => None,
        };
        let tasks = self.task_repo.list_by_project(project_id)?;
        let payments = self.payment_repo.list_by_project(project_id)?;

        Ok(ProjectDetail {
            project,
            customer,
            tasks,
            payments,
        })
    }

    /// 查询项目列表
    ///
    /// # 参数
    /// - fiscal_year: 会计年度起始年（FY2024 传 2024）,按合同日期过滤
    /// - contract_no: 合同号（优先于会计年度）
    pub async fn list_projects(
        &self,
        fiscal_year: Option<i32>,
        contract_no: Option<&str>,
    ) -> ApiResult<Vec<Project>> {
        if let Some(raw) = contract_no {
            let contract_no = self
                .cleaner
                .normalize_contract_no(raw)
                .map_err(|e| ApiError::InvalidInput(e.to_string()))?;
            return Ok(self.project_repo.find_by_contract_no(&contract_no)?);
        }

        match fiscal_year {
            Some(year) => {
                let start_month = self.config.get_fiscal_year_start_month().await?;
                let fy = FiscalYear::new(year, start_month);
                debug!(fiscal_year = %fy, start = %fy.start(), end = %fy.end(), "按会计年度查询项目");
                Ok(self.project_repo.list_by_fiscal_year(fy)?)
            }
            None => Ok(self.project_repo.list_all()?),
        }
    }

    /// 人工设置项目状态（主要用于解约）
    pub fn update_project_status(&self, project_id: &str, status: &str) -> ApiResult<Project> {
        let status = status
            .parse::<ProjectStatus>()
            .map_err(ApiError::InvalidInput)?;

        let mut project = self.require_project(project_id)?;
        project.status = status;
        self.project_repo.update(&project)?;
        info!(project_id, status = %status, "项目状态已更新");
        Ok(project)
    }

    /// 删除项目（任务/付款级联删除）
    pub fn delete_project(&self, project_id: &str) -> ApiResult<()> {
        if !self.project_repo.delete(project_id)? {
            return Err(ApiError::NotFound(format!("项目不存在: {}", project_id)));
        }
        info!(project_id, "项目已删除");
        Ok(())
    }

    // ==========================================
    // 任务
    // ==========================================

    pub fn list_tasks(&self, project_id: &str) -> ApiResult<Vec<Task>> {
        self.require_project(project_id)?;
        Ok(self.task_repo.list_by_project(project_id)?)
    }

    /// 追加手工任务
    ///
    /// # 说明
    /// - 开启合同日下限时,早于合同日期的到期日 → InvalidInput
    pub async fn add_manual_task(
        &self,
        project_id: &str,
        task_name: &str,
        department: Option<&str>,
        due_date: Option<NaiveDate>,
    ) -> ApiResult<Task> {
        let task_name = task_name.trim();
        if task_name.is_empty() {
            return Err(ApiError::InvalidInput("任务名不能为空".to_string()));
        }
        let department = department
            .map(|d| d.parse::<Department>())
            .transpose()
            .map_err(ApiError::InvalidInput)?;

        let project = self.require_project(project_id)?;
        self.check_contract_date_floor(&project, due_date, "到期日").await?;

        let mut task = Task::manual(project_id, task_name, department, due_date);
        task.sort_order = self.task_repo.count_by_source(project_id, TaskSource::Manual)? as i32;
        self.task_repo.insert(&task)?;
        Ok(task)
    }

    /// 登记任务实绩日
    pub async fn complete_task(&self, task_id: &str, actual_date: NaiveDate) -> ApiResult<Task> {
        let mut task = self
            .task_repo
            .find_by_id(task_id)?
            .ok_or_else(|| ApiError::NotFound(format!("任务不存在: {}", task_id)))?;

        let project = self.require_project(&task.project_id)?;
        self.check_contract_date_floor(&project, Some(actual_date), "实绩日")
            .await?;

        task.set_dates(task.due_date, Some(actual_date));
        self.task_repo.update(&task)?;
        info!(task_id, actual_date = %actual_date, "任务已完成");
        Ok(task)
    }

    /// 删除手工任务
    pub fn delete_task(&self, task_id: &str) -> ApiResult<()> {
        let task = self
            .task_repo
            .find_by_id(task_id)?
            .ok_or_else(|| ApiError::NotFound(format!("任务不存在: {}", task_id)))?;

        if task.source == TaskSource::Import {
            return Err(ApiError::BusinessRuleViolation(
                "导入任务由进度表维护,不能手工删除".to_string(),
            ));
        }

        self.task_repo.delete(task_id)?;
        Ok(())
    }

    // ==========================================
    // 付款
    // ==========================================

    pub fn upsert_payment(
        &self,
        project_id: &str,
        kind: &str,
        scheduled_date: Option<NaiveDate>,
        amount: Option<i64>,
    ) -> ApiResult<Payment> {
        let kind = kind.parse::<PaymentKind>().map_err(ApiError::InvalidInput)?;
        if matches!(amount, Some(a) if a < 0) {
            return Err(ApiError::InvalidInput("付款金额不能为负数".to_string()));
        }

        self.require_project(project_id)?;

        let payment = Payment::new(project_id, kind, scheduled_date, amount);
        self.payment_repo.upsert(&payment)?;

        self.payment_repo
            .find(project_id, kind)?
            .ok_or_else(|| ApiError::InternalError(format!("付款写入后未找到: {}", kind)))
    }

    /// 任务日期不得早于合同日期（import/enforce_contract_date_floor 关闭时不检查）
    async fn check_contract_date_floor(
        &self,
        project: &Project,
        date: Option<NaiveDate>,
        label: &str,
    ) -> ApiResult<()> {
        let (Some(date), Some(contract_date)) = (date, project.contract_date) else {
            return Ok(());
        };
        if date >= contract_date || !self.config.get_enforce_contract_date_floor().await? {
            return Ok(());
        }

        Err(ApiError::InvalidInput(format!(
            "{} {} 早于合同日期 {}",
            label, date, contract_date
        )))
    }

    fn require_project(&self, project_id: &str) -> ApiResult<Project> {
        self.project_repo
            .find_by_id(project_id)?
            .ok_or_else(|| ApiError::NotFound(format!("项目不存在: {}", project_id)))
    }
}
