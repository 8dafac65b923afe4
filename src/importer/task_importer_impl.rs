// ==========================================
// G-progress - 进度表导入器实现
// ==========================================
// 职责: 整合导入流程,从文件到数据库
// 流程: 解析 → 映射 → 标准化 → 校验 → 重复检测 → 项目匹配 → 落库
// 红线: 一行一事务; IMPORT 任务整体替换,MANUAL 任务不动
// ==========================================

use crate::config::ImportConfigReader;
use crate::domain::import::{
    ConflictStatus, ConflictType, DqLevel, DqSummary, DqViolation, ImportBatch, ImportConflict,
    ImportReport, ImportRow, ProjectImportWrite, ProjectTarget, TaskDraft, WriteOutcome,
};
use crate::domain::project::{Customer, Project, ProjectCandidate};
use crate::domain::types::{ProjectStatus, TaskStatus};
use crate::importer::conflict_handler::ConflictHandler as ConflictHandlerImpl;
use crate::importer::error::ImportResult;
use crate::importer::sheet_preparer::{PreparedRow, SheetPreparer};
use crate::importer::task_importer_trait::{
    ConflictHandler, ImportOptions, ProjectResolution, TaskImporter,
};
use crate::repository::ImportRepository;
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

/// 由里程碑推导项目状态
///
/// - 已解约项目保持 CANCELLED
/// - 交房里程碑完成 → COMPLETED
/// - 任一里程碑完成 → IN_PROGRESS
/// - 否则 → CONTRACTED
pub fn derive_project_status(
    tasks: &[TaskDraft],
    handover_task: &str,
    current: Option<ProjectStatus>,
) -> ProjectStatus {
    if current == Some(ProjectStatus::Cancelled) {
        return ProjectStatus::Cancelled;
    }

    let completed = |t: &&TaskDraft| t.status() == TaskStatus::Completed;
    if tasks.iter().filter(completed).any(|t| t.task_name == handover_task) {
        ProjectStatus::Completed
    } else if tasks.iter().any(|t| completed(&t)) {
        ProjectStatus::InProgress
    } else {
        ProjectStatus::Contracted
    }
}

// ==========================================
// TaskImporterImpl - 进度表导入器实现
// ==========================================
pub struct TaskImporterImpl<R, C>
where
    R: ImportRepository,
    C: ImportConfigReader,
{
    // 数据访问层
    import_repo: R,

    // 配置读取器
    config: C,

    // 导入组件
    preparer: SheetPreparer,
    conflict_handler: Box<dyn ConflictHandler>,
}

/// 单行处理结果
enum RowOutcome {
    Written(WriteOutcome),
    Conflict(ImportConflict),
    Failed(DqViolation),
}

/// 单次导入运行期状态
struct RunState {
    batch_id: String,
    dry_run: bool,
    create_missing_projects: bool,
    handover_task: String,
    /// 本批次新建的项目 ID
    created_in_batch: HashSet<String>,
    /// dry_run 时模拟新建的项目（数据库中不存在）
    simulated: HashMap<String, Vec<ProjectCandidate>>,
}

impl<R, C> TaskImporterImpl<R, C>
where
    R: ImportRepository,
    C: ImportConfigReader,
{
    /// 创建新的 TaskImporter 实例
    ///
    /// # 参数
    /// - import_repo: 导入数据仓储
    /// - config: 配置读取器
    /// - preparer: 解析/映射/校验组件
    /// - conflict_handler: 冲突处理器
    pub fn new(
        import_repo: R,
        config: C,
        preparer: SheetPreparer,
        conflict_handler: Box<dyn ConflictHandler>,
    ) -> Self {
        Self {
            import_repo,
            config,
            preparer,
            conflict_handler,
        }
    }

    /// 使用默认组件
    pub fn with_defaults(import_repo: R, config: C) -> Self {
        Self::new(
            import_repo,
            config,
            SheetPreparer::default(),
            Box::new(ConflictHandlerImpl::new()),
        )
    }
}

#[async_trait::async_trait]
impl<R, C> TaskImporter for TaskImporterImpl<R, C>
where
    R: ImportRepository + Send + Sync,
    C: ImportConfigReader + Send + Sync,
{
    #[instrument(skip(self, options), fields(file = %file_path.display(), dry_run = options.dry_run))]
    async fn import_file(
        &self,
        file_path: &Path,
        options: &ImportOptions,
    ) -> ImportResult<ImportReport> {
        let start_time = Instant::now();
        let batch_id = Uuid::new_v4().to_string();
        info!(batch_id = %batch_id, "开始导入进度表");

        // === 步骤 1: 读取配置 ===
        debug!("步骤 1: 读取配置");
        let layout = match &options.layout_override {
            Some(layout) => layout.clone(),
            None => self.config.get_column_layout().await?,
        };
        let encoding = self.config.get_source_encoding().await?;
        let create_missing_projects = self.config.get_create_missing_projects().await?;
        let enforce_floor = self.config.get_enforce_contract_date_floor().await?;

        // === 步骤 2: 解析 / 映射 / 标准化 / 校验 ===
        debug!("步骤 2: 预处理");
        let prepared = self
            .preparer
            .prepare(file_path, &layout, encoding, enforce_floor)
            .map_err(|e| {
                error!(error = %e, "文件预处理失败");
                e
            })?;
        let total_rows = prepared.rows.len();
        let mut violations = prepared.violations();

        // === 步骤 3: 同批次重复检测 ===
        debug!("步骤 3: 重复检测");
        let writable: Vec<&PreparedRow> = prepared.rows.iter().filter(|r| !r.blocked).collect();
        let writable_rows: Vec<ImportRow> = writable.iter().map(|r| r.row.clone()).collect();
        let duplicate_rows: HashSet<usize> = self
            .conflict_handler
            .detect_duplicates(&writable_rows)
            .into_iter()
            .map(|(row_number, _)| row_number)
            .collect();
        info!(
            writable = writable.len(),
            duplicates = duplicate_rows.len(),
            "重复检测完成"
        );

        // === 步骤 4: 项目匹配 + 落库 ===
        debug!("步骤 4: 项目匹配与写入");
        let mut state = RunState {
            batch_id: batch_id.clone(),
            dry_run: options.dry_run,
            create_missing_projects,
            handover_task: layout.handover_task.clone(),
            created_in_batch: HashSet::new(),
            simulated: HashMap::new(),
        };

        let mut summary = DqSummary {
            total_rows,
            blocked: prepared.rows.iter().filter(|r| r.blocked).count(),
            ..Default::default()
        };
        let mut conflicts = Vec::new();

        for prepared_row in &writable {
            let row = &prepared_row.row;
            let outcome = if duplicate_rows.contains(&row.row_number) {
                RowOutcome::Conflict(self.build_conflict(
                    &state.batch_id,
                    row,
                    ConflictType::DuplicateRow,
                    "同一文件内合同号与客户重复,仅导入首行".to_string(),
                ))
            } else {
                self.process_row(row, &mut state).await
            };

            match outcome {
                RowOutcome::Written(written) => {
                    summary.success += 1;
                    summary.tasks_written += written.tasks_written;
                    summary.payments_written += written.payments_written;
                    if written.project_created {
                        summary.created_projects += 1;
                    }
                    if prepared_row
                        .violations
                        .iter()
                        .any(|v| v.level == DqLevel::Warning)
                    {
                        summary.warning += 1;
                    }
                }
                RowOutcome::Conflict(conflict) => {
                    debug!(
                        row_number = conflict.row_number,
                        conflict_type = conflict.conflict_type.as_str(),
                        "冲突入队"
                    );
                    conflicts.push(conflict);
                }
                RowOutcome::Failed(violation) => {
                    summary.blocked += 1;
                    violations.push(violation);
                }
            }
        }
        summary.conflict = conflicts.len();
        info!(
            success = summary.success,
            conflicts = summary.conflict,
            created_projects = summary.created_projects,
            "项目写入完成"
        );

        // === 步骤 5: 记录批次 + 冲突 ===
        let elapsed_time = start_time.elapsed();
        let dq_report = serde_json::json!({
            "summary": &summary,
            "violations": &violations,
            "layout_warnings": &prepared.layout_warnings,
        });

        let batch = ImportBatch {
            batch_id: batch_id.clone(),
            file_name: file_path
                .file_name()
                .and_then(|n| n.to_str())
                .map(|n| n.to_string()),
            file_path: Some(file_path.display().to_string()),
            total_rows: total_rows as i32,
            success_rows: summary.success as i32,
            blocked_rows: summary.blocked as i32,
            warning_rows: summary.warning as i32,
            conflict_rows: summary.conflict as i32,
            created_projects: summary.created_projects as i32,
            tasks_written: summary.tasks_written as i32,
            payments_written: summary.payments_written as i32,
            dry_run: options.dry_run,
            imported_at: Some(Utc::now()),
            elapsed_ms: Some(elapsed_time.as_millis() as i64),
            dq_report_json: Some(serde_json::to_string(&dq_report)?),
        };
        self.import_repo.insert_batch(batch.clone()).await?;

        // 冲突依赖批次记录（外键）
        if !options.dry_run && !conflicts.is_empty() {
            self.import_repo
                .batch_insert_conflicts(conflicts.clone())
                .await?;
        }

        info!(
            batch_id = %batch_id,
            total = total_rows,
            success = summary.success,
            blocked = summary.blocked,
            conflicts = summary.conflict,
            elapsed_ms = elapsed_time.as_millis() as u64,
            "进度表导入完成"
        );

        Ok(ImportReport {
            batch,
            summary,
            violations,
            conflicts,
            layout_warnings: prepared.layout_warnings,
            elapsed_time,
        })
    }

    /// 批量导入多个文件（每个文件独立成批）
    async fn batch_import(
        &self,
        file_paths: Vec<PathBuf>,
        options: &ImportOptions,
    ) -> Vec<Result<ImportReport, String>> {
        use futures::future::join_all;

        info!(count = file_paths.len(), "开始批量导入文件");

        let import_tasks = file_paths.into_iter().map(|path| async move {
            let path_str = path.display().to_string();
            match self.import_file(&path, options).await {
                Ok(report) => {
                    info!(file = %path_str, success = report.summary.success, "文件导入成功");
                    Ok(report)
                }
                Err(e) => {
                    error!(file = %path_str, error = %e, "文件导入失败");
                    Err(format!("文件 {} 导入失败: {}", path_str, e))
                }
            }
        });

        let results = join_all(import_tasks).await;

        info!(
            total = results.len(),
            success = results.iter().filter(|r| r.is_ok()).count(),
            failed = results.iter().filter(|r| r.is_err()).count(),
            "批量导入完成"
        );

        results
    }
}

// 辅助方法
impl<R, C> TaskImporterImpl<R, C>
where
    R: ImportRepository,
    C: ImportConfigReader,
{
    /// 匹配项目并写入单行
    async fn process_row(&self, row: &ImportRow, state: &mut RunState) -> RowOutcome {
        // 未阻断的行必有合同号
        let Some(contract_no) = row.contract_no.clone() else {
            return RowOutcome::Failed(self.write_failure(row, "合同号缺失".to_string()));
        };

        let mut candidates = match self.import_repo.find_project_candidates(&contract_no).await {
            Ok(c) => c,
            Err(e) => {
                warn!(row_number = row.row_number, error = %e, "候选项目查询失败");
                return RowOutcome::Failed(self.write_failure(row, e.to_string()));
            }
        };
        if let Some(simulated) = state.simulated.get(&contract_no) {
            candidates.extend(simulated.iter().cloned());
        }

        let resolution =
            self.conflict_handler
                .resolve_project(row, &candidates, &state.created_in_batch);
        debug!(row_number = row.row_number, ?resolution, "项目匹配");

        let (target, current_status) = match resolution {
            ProjectResolution::Matched { project_id } => {
                let current = candidates
                    .iter()
                    .find(|c| c.project.project_id == project_id)
                    .map(|c| c.project.status);
                (ProjectTarget::Existing { project_id }, current)
            }
            ProjectResolution::NotFound if state.create_missing_projects => {
                (self.new_target(&contract_no, row), None)
            }
            ProjectResolution::NotFound => {
                return RowOutcome::Conflict(self.build_conflict(
                    &state.batch_id,
                    row,
                    ConflictType::ProjectNotFound,
                    format!("合同号 {} 无对应项目", contract_no),
                ));
            }
            ProjectResolution::CreateDuplicate { sibling_project_id } => {
                info!(
                    row_number = row.row_number,
                    contract_no = %contract_no,
                    sibling = %sibling_project_id,
                    "合同号重复且客户不同,新建项目"
                );
                (self.new_target(&contract_no, row), None)
            }
            ProjectResolution::CustomerMismatch { project_id } => {
                return RowOutcome::Conflict(self.build_conflict(
                    &state.batch_id,
                    row,
                    ConflictType::CustomerMismatch,
                    format!(
                        "合同号 {} 的唯一项目 {} 客户名不符: {}",
                        contract_no,
                        project_id,
                        row.customer_names.join("・")
                    ),
                ));
            }
            ProjectResolution::Ambiguous { candidate_ids } => {
                return RowOutcome::Conflict(self.build_conflict(
                    &state.batch_id,
                    row,
                    ConflictType::AmbiguousContract,
                    format!(
                        "合同号 {} 有 {} 个候选项目,客户名无法区分",
                        contract_no,
                        candidate_ids.len()
                    ),
                ));
            }
        };

        let derived_status = derive_project_status(&row.tasks, &state.handover_task, current_status);

        if state.dry_run {
            let outcome = WriteOutcome {
                project_created: matches!(target, ProjectTarget::New { .. }),
                tasks_deleted: 0,
                tasks_written: row.tasks.len(),
                payments_written: row
                    .payments
                    .iter()
                    .filter(|p| p.scheduled_date.is_some() || p.amount.is_some())
                    .count(),
            };
            if let ProjectTarget::New { project, .. } = target {
                state.created_in_batch.insert(project.project_id.clone());
                state
                    .simulated
                    .entry(contract_no)
                    .or_default()
                    .push(ProjectCandidate {
                        project,
                        customer_names: row.customer_names.clone(),
                    });
            }
            return RowOutcome::Written(outcome);
        }

        let staff = match self.resolve_staff(row).await {
            Ok(staff) => staff,
            Err(e) => {
                warn!(row_number = row.row_number, error = %e, "担当员工写入失败");
                return RowOutcome::Failed(self.write_failure(row, e.to_string()));
            }
        };

        let new_project_id = match &target {
            ProjectTarget::New { project, .. } => Some(project.project_id.clone()),
            ProjectTarget::Existing { .. } => None,
        };

        let write = ProjectImportWrite {
            batch_id: state.batch_id.clone(),
            target,
            contract_date: row.contract_date,
            address: row.address.clone(),
            sales_staff_id: staff[0].clone(),
            design_staff_id: staff[1].clone(),
            construction_staff_id: staff[2].clone(),
            derived_status,
            tasks: row.tasks.clone(),
            payments: row.payments.clone(),
        };

        match self.import_repo.write_project_import(write).await {
            Ok(outcome) => {
                if let Some(id) = new_project_id {
                    state.created_in_batch.insert(id);
                }
                RowOutcome::Written(outcome)
            }
            Err(e) => {
                warn!(row_number = row.row_number, error = %e, "项目写入失败,事务已回滚");
                RowOutcome::Failed(self.write_failure(row, e.to_string()))
            }
        }
    }

    /// 营业 / 设计 / 工务担当 → employee_id
    async fn resolve_staff(
        &self,
        row: &ImportRow,
    ) -> crate::repository::RepositoryResult<[Option<String>; 3]> {
        let mut ids: [Option<String>; 3] = [None, None, None];
        let names = [&row.sales_staff, &row.design_staff, &row.construction_staff];
        for (slot, name) in ids.iter_mut().zip(names) {
            if let Some(name) = name {
                *slot = Some(self.import_repo.find_or_create_employee(name).await?);
            }
        }
        Ok(ids)
    }

    fn new_target(&self, contract_no: &str, row: &ImportRow) -> ProjectTarget {
        let customer = if row.customer_names.is_empty() {
            None
        } else {
            Some(Customer::new(row.customer_names.clone()))
        };
        let mut project = Project::new(contract_no, row.contract_date);
        project.customer_id = customer.as_ref().map(|c| c.customer_id.clone());
        project.address = row.address.clone();
        ProjectTarget::New { project, customer }
    }

    fn build_conflict(
        &self,
        batch_id: &str,
        row: &ImportRow,
        conflict_type: ConflictType,
        reason: String,
    ) -> ImportConflict {
        ImportConflict {
            conflict_id: Uuid::new_v4().to_string(),
            batch_id: batch_id.to_string(),
            row_number: row.row_number,
            contract_no: row.contract_no.clone(),
            conflict_type,
            raw_data: serde_json::to_string(row).unwrap_or_else(|_| "{}".to_string()),
            reason,
            status: ConflictStatus::Open,
            resolution_note: None,
            resolved_at: None,
            created_at: Utc::now(),
        }
    }

    fn write_failure(&self, row: &ImportRow, message: String) -> DqViolation {
        DqViolation {
            row_number: row.row_number,
            contract_no: row.contract_no.clone(),
            level: DqLevel::Error,
            field: "write".to_string(),
            message,
        }
    }
}
