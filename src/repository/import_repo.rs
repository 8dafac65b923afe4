// ==========================================
// G-progress - 导入 Repository Trait
// ==========================================
// 职责: 定义导入相关数据访问接口（不包含业务逻辑）
// 红线: Repository 不含业务规则,只做数据读写
// ==========================================

use crate::domain::import::{
    ConflictStatus, ContractDateViolation, ImportBatch, ImportConflict, ProjectImportWrite,
    StoredCounts, WriteOutcome,
};
use crate::domain::project::ProjectCandidate;
use crate::repository::error::RepositoryResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

// ==========================================
// ImportRepository Trait
// ==========================================
// 实现者: ImportRepositoryImpl（使用 rusqlite）
#[async_trait]
pub trait ImportRepository: Send + Sync {
    // ===== 项目匹配 =====

    /// 按合同号查询候选项目（含客户姓名）
    async fn find_project_candidates(
        &self,
        contract_no: &str,
    ) -> RepositoryResult<Vec<ProjectCandidate>>;

    /// 按标准化姓名查找员工,不存在则创建
    ///
    /// # 返回
    /// - Ok(employee_id)
    async fn find_or_create_employee(&self, name: &str) -> RepositoryResult<String>;

    // ===== 项目写入（事务化）=====

    /// 单项目导入写入
    ///
    /// # 说明
    /// - 新项目: 先建客户再建项目
    /// - 删除该项目全部 IMPORT 任务后重新插入
    /// - 付款按 (project_id, kind) UPSERT
    /// - 任一步失败整个事务回滚
    async fn write_project_import(
        &self,
        write: ProjectImportWrite,
    ) -> RepositoryResult<WriteOutcome>;

    // ===== 批次管理 =====

    async fn insert_batch(&self, batch: ImportBatch) -> RepositoryResult<()>;

    async fn get_batch(&self, batch_id: &str) -> RepositoryResult<Option<ImportBatch>>;

    /// 最近的导入批次（按导入时间倒序）
    async fn get_recent_batches(&self, limit: usize) -> RepositoryResult<Vec<ImportBatch>>;

    /// 删除早于 cutoff 的批次（冲突级联删除）
    ///
    /// # 返回
    /// - Ok(usize): 删除的批次数
    async fn prune_batches_older_than(&self, cutoff: DateTime<Utc>) -> RepositoryResult<usize>;

    // ===== 冲突队列 =====

    async fn batch_insert_conflicts(
        &self,
        conflicts: Vec<ImportConflict>,
    ) -> RepositoryResult<usize>;

    /// 带过滤和分页的冲突列表查询
    ///
    /// # 参数
    /// - batch_id: 批次过滤（None 表示全部）
    /// - status: 状态过滤（None 表示全部）
    async fn list_conflicts_with_filter(
        &self,
        batch_id: Option<&str>,
        status: Option<ConflictStatus>,
        limit: i32,
        offset: i32,
    ) -> RepositoryResult<Vec<ImportConflict>>;

    async fn count_conflicts(
        &self,
        batch_id: Option<&str>,
        status: Option<ConflictStatus>,
    ) -> RepositoryResult<i64>;

    async fn get_conflict_by_id(&self, conflict_id: &str)
        -> RepositoryResult<Option<ImportConflict>>;

    /// 关闭冲突（RESOLVED / IGNORED）并记录备注
    async fn resolve_conflict(
        &self,
        conflict_id: &str,
        status: ConflictStatus,
        note: Option<&str>,
    ) -> RepositoryResult<()>;

    // ===== 核对 =====

    /// 已落库计数（IMPORT 任务数 / 其中完成数 / 付款数）
    async fn get_stored_counts(&self, project_id: &str) -> RepositoryResult<StoredCounts>;

    /// 任务日期早于合同日期的记录
    ///
    /// # 参数
    /// - project_ids: 限定项目（None 表示全库）
    async fn find_contract_date_violations(
        &self,
        project_ids: Option<&[String]>,
    ) -> RepositoryResult<Vec<ContractDateViolation>>;
}
