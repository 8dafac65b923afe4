// ==========================================
// G-progress - 导入 API
// ==========================================
// 职责: 封装进度表导入、核对、批次与冲突队列
// ==========================================

use crate::api::error::{ApiError, ApiResult};
use crate::config::column_layout::ColumnLayout;
use crate::config::{ConfigManager, ImportConfigReader};
use crate::domain::import::{
    ConflictStatus, ImportBatch, ImportConflict, ImportReport, VerificationReport,
};
use crate::importer::{ImportOptions, ImportVerifier, TaskImporter, TaskImporterImpl};
use crate::repository::{ImportRepository, ImportRepositoryImpl};
use chrono::{Duration, Utc};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// 冲突列表响应（带分页信息）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportConflictListResponse {
    /// 冲突列表
    pub conflicts: Vec<ImportConflict>,
    /// 总记录数
    pub total: i64,
    /// 每页记录数
    pub limit: i32,
    /// 分页偏移
    pub offset: i32,
}

/// 批次清理响应
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PruneBatchesResponse {
    pub retention_days: i64,
    pub deleted_batches: usize,
}

/// 多文件导入中单个文件的结果
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileImportOutcome {
    pub file_path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report: Option<ImportReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// 导入API
pub struct ImportApi {
    conn: Arc<Mutex<Connection>>,
}

impl ImportApi {
    /// 创建新的ImportApi实例
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn repo(&self) -> ImportRepositoryImpl {
        ImportRepositoryImpl::from_connection(self.conn.clone())
    }

    fn config(&self) -> ConfigManager {
        ConfigManager::from_connection(self.conn.clone())
    }

    fn importer(&self) -> TaskImporterImpl<ImportRepositoryImpl, ConfigManager> {
        TaskImporterImpl::with_defaults(self.repo(), self.config())
    }

    /// 导入单个进度表
    ///
    /// # 返回
    /// - Ok(ImportReport): 批次、汇总、违规与冲突明细
    /// - Err(ApiError): 文件不可读、布局无效、数据库错误
    pub async fn import_file(&self, file_path: &Path, options: ImportOptions) -> ApiResult<ImportReport> {
        if !file_path.exists() {
            return Err(ApiError::InvalidInput(format!(
                "文件不存在: {}",
                file_path.display()
            )));
        }

        let report = self.importer().import_file(file_path, &options).await?;
        Ok(report)
    }

    /// 导入多个进度表（每个文件独立成批,单个失败不影响其他文件）
    pub async fn import_files(
        &self,
        file_paths: Vec<PathBuf>,
        options: ImportOptions,
    ) -> ApiResult<Vec<FileImportOutcome>> {
        if file_paths.is_empty() {
            return Err(ApiError::InvalidInput("文件列表不能为空".to_string()));
        }

        let labels: Vec<String> = file_paths.iter().map(|p| p.display().to_string()).collect();
        let results = self.importer().batch_import(file_paths, &options).await;

        Ok(labels
            .into_iter()
            .zip(results)
            .map(|(file_path, result)| match result {
                Ok(report) => FileImportOutcome {
                    file_path,
                    report: Some(report),
                    error: None,
                },
                Err(error) => FileImportOutcome {
                    file_path,
                    report: None,
                    error: Some(error),
                },
            })
            .collect())
    }

    /// 核对文件与已落库数据
    pub async fn verify_file(
        &self,
        file_path: &Path,
        layout_override: Option<ColumnLayout>,
    ) -> ApiResult<VerificationReport> {
        if !file_path.exists() {
            return Err(ApiError::InvalidInput(format!(
                "文件不存在: {}",
                file_path.display()
            )));
        }

        let verifier = ImportVerifier::new(self.repo(), self.config());
        Ok(verifier.verify_file(file_path, layout_override).await?)
    }

    /// 最近的导入批次
    pub async fn list_batches(&self, limit: usize) -> ApiResult<Vec<ImportBatch>> {
        let limit = limit.clamp(1, 500);
        Ok(self.repo().get_recent_batches(limit).await?)
    }

    /// 批次详情
    pub async fn get_batch(&self, batch_id: &str) -> ApiResult<ImportBatch> {
        self.repo()
            .get_batch(batch_id)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("导入批次不存在: {}", batch_id)))
    }

    /// 列出导入冲突
    ///
    /// # 参数
    /// - batch_id: 批次过滤（None 表示全部）
    /// - status: OPEN / RESOLVED / IGNORED（None 表示全部）
    /// - limit: 每页数量（1-100）
    pub async fn list_conflicts(
        &self,
        batch_id: Option<&str>,
        status: Option<&str>,
        limit: i32,
        offset: i32,
    ) -> ApiResult<ImportConflictListResponse> {
        let limit = limit.clamp(1, 100);
        let offset = offset.max(0);

        let status = status
            .map(|s| s.parse::<ConflictStatus>())
            .transpose()
            .map_err(|e| {
                ApiError::InvalidInput(format!("{}，应为 OPEN/RESOLVED/IGNORED", e))
            })?;

        let repo = self.repo();
        let conflicts = repo
            .list_conflicts_with_filter(batch_id, status, limit, offset)
            .await?;
        let total = repo.count_conflicts(batch_id, status).await?;

        Ok(ImportConflictListResponse {
            conflicts,
            total,
            limit,
            offset,
        })
    }

    /// 关闭导入冲突
    ///
    /// # 参数
    /// - status: RESOLVED 或 IGNORED
    /// - note: 处理备注
    ///
    /// # 返回
    /// - Ok(ImportConflict): 更新后的冲突记录
    pub async fn resolve_conflict(
        &self,
        conflict_id: &str,
        status: &str,
        note: Option<&str>,
    ) -> ApiResult<ImportConflict> {
        let status = status
            .parse::<ConflictStatus>()
            .map_err(ApiError::InvalidInput)?;
        if status == ConflictStatus::Open {
            return Err(ApiError::InvalidInput(
                "处理状态应为 RESOLVED 或 IGNORED".to_string(),
            ));
        }

        let repo = self.repo();
        repo.get_conflict_by_id(conflict_id)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("冲突不存在: {}", conflict_id)))?;

        repo.resolve_conflict(conflict_id, status, note).await?;
        tracing::info!(conflict_id, status = %status, "冲突已处理");

        repo.get_conflict_by_id(conflict_id)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("冲突不存在: {}", conflict_id)))
    }

    /// 清理过期批次
    ///
    /// # 参数
    /// - retention_days: 保留天数（None 则读配置 import/batch_retention_days）
    pub async fn prune_batches(&self, retention_days: Option<i64>) -> ApiResult<PruneBatchesResponse> {
        let retention_days = match retention_days {
            Some(days) => days,
            None => self.config().get_batch_retention_days().await?,
        };
        if retention_days < 0 {
            return Err(ApiError::InvalidInput(format!(
                "保留天数不能为负数: {}",
                retention_days
            )));
        }

        let cutoff = Duration::try_days(retention_days)
            .and_then(|retention| Utc::now().checked_sub_signed(retention))
            .ok_or_else(|| {
                ApiError::InvalidInput(format!("保留天数超出范围: {}", retention_days))
            })?;
        let deleted_batches = self.repo().prune_batches_older_than(cutoff).await?;
        tracing::info!(retention_days, deleted_batches, "过期批次已清理");

        Ok(PruneBatchesResponse {
            retention_days,
            deleted_batches,
        })
    }
}
