// ==========================================
// G-progress - 导入结果核对
// ==========================================
// 职责: 从源文件独立推导期望计数,与数据库实际落库比对
//   IMPORT 任务数 / 完成任务数 / 付款数
//   无法定位项目的行
//   早于合同日期的任务日期
// 红线: 只读,不写数据库
// ==========================================

use crate::config::column_layout::ColumnLayout;
use crate::config::ImportConfigReader;
use crate::domain::import::{CountMismatch, ImportRow, UnresolvedRow, VerificationReport};
use crate::importer::conflict_handler::ConflictHandler as ConflictHandlerImpl;
use crate::importer::error::ImportResult;
use crate::importer::sheet_preparer::SheetPreparer;
use crate::importer::task_importer_trait::{ConflictHandler, ProjectResolution};
use crate::repository::ImportRepository;
use std::collections::{BTreeSet, HashSet};
use std::path::Path;
use tracing::{debug, info, instrument, warn};

pub struct ImportVerifier<R, C>
where
    R: ImportRepository,
    C: ImportConfigReader,
{
    import_repo: R,
    config: C,
    preparer: SheetPreparer,
    conflict_handler: Box<dyn ConflictHandler>,
}

impl<R, C> ImportVerifier<R, C>
where
    R: ImportRepository,
    C: ImportConfigReader,
{
    pub fn new(import_repo: R, config: C) -> Self {
        Self {
            import_repo,
            config,
            preparer: SheetPreparer::default(),
            conflict_handler: Box::new(ConflictHandlerImpl::new()),
        }
    }

    /// 核对单个文件
    ///
    /// # 参数
    /// - layout_override: 与导入时一致的列布局（None 则读配置）
    #[instrument(skip(self, layout_override), fields(file = %file_path.display()))]
    pub async fn verify_file(
        &self,
        file_path: &Path,
        layout_override: Option<ColumnLayout>,
    ) -> ImportResult<VerificationReport> {
        let layout = match layout_override {
            Some(layout) => layout,
            None => self.config.get_column_layout().await?,
        };
        let encoding = self.config.get_source_encoding().await?;
        let enforce_floor = self.config.get_enforce_contract_date_floor().await?;

        let prepared = self
            .preparer
            .prepare(file_path, &layout, encoding, enforce_floor)?;

        let mut report = VerificationReport {
            file_path: file_path.display().to_string(),
            blocked_rows: prepared.rows.iter().filter(|r| r.blocked).count(),
            ..Default::default()
        };

        let rows: Vec<ImportRow> = prepared
            .rows
            .into_iter()
            .filter(|r| !r.blocked)
            .map(|r| r.row)
            .collect();

        // 同文件重复行未导入,不参与核对
        let duplicates: HashSet<usize> = self
            .conflict_handler
            .detect_duplicates(&rows)
            .into_iter()
            .map(|(row_number, _)| row_number)
            .collect();

        let no_batch_context = HashSet::new();
        let mut matched: BTreeSet<String> = BTreeSet::new();

        for row in rows.iter().filter(|r| !duplicates.contains(&r.row_number)) {
            report.checked_rows += 1;

            let Some(contract_no) = row.contract_no.as_deref() else {
                continue;
            };
            let candidates = self.import_repo.find_project_candidates(contract_no).await?;
            let resolution =
                self.conflict_handler
                    .resolve_project(row, &candidates, &no_batch_context);

            let project_id = match resolution {
                ProjectResolution::Matched { project_id } => project_id,
                other => {
                    report.unresolved.push(UnresolvedRow {
                        row_number: row.row_number,
                        contract_no: row.contract_no.clone(),
                        reason: unresolved_reason(&other),
                    });
                    continue;
                }
            };

            let stored = self.import_repo.get_stored_counts(&project_id).await?;
            let expected_payments = row
                .payments
                .iter()
                .filter(|p| p.scheduled_date.is_some() || p.amount.is_some())
                .count();

            let checks = [
                ("imported_tasks", row.tasks.len(), stored.imported_tasks),
                ("completed_tasks", row.completed_task_count(), stored.completed_tasks),
                ("payments", expected_payments, stored.payments),
            ];
            for (metric, expected, actual) in checks {
                if expected != actual {
                    debug!(row_number = row.row_number, metric, expected, actual, "计数不一致");
                    report.mismatches.push(CountMismatch {
                        row_number: row.row_number,
                        contract_no: contract_no.to_string(),
                        project_id: project_id.clone(),
                        metric: metric.to_string(),
                        expected,
                        actual,
                    });
                }
            }

            matched.insert(project_id);
        }

        report.matched_projects = matched.len();

        let project_ids: Vec<String> = matched.into_iter().collect();
        report.date_violations = self
            .import_repo
            .find_contract_date_violations(Some(&project_ids))
            .await?;

        if report.is_clean() {
            info!(checked = report.checked_rows, "核对通过");
        } else {
            warn!(
                unresolved = report.unresolved.len(),
                mismatches = report.mismatches.len(),
                date_violations = report.date_violations.len(),
                "核对发现差异"
            );
        }

        Ok(report)
    }
}

fn unresolved_reason(resolution: &ProjectResolution) -> String {
    match resolution {
        ProjectResolution::Matched { .. } => String::new(),
        ProjectResolution::NotFound => "合同号无对应项目".to_string(),
        ProjectResolution::CreateDuplicate { .. } => "合同号重复,无客户名命中的项目".to_string(),
        ProjectResolution::CustomerMismatch { project_id } => {
            format!("唯一项目 {} 客户名不符", project_id)
        }
        ProjectResolution::Ambiguous { candidate_ids } => {
            format!("{} 个候选项目无法区分", candidate_ids.len())
        }
    }
}
