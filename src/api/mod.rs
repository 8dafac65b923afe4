// ==========================================
// G-progress - API 层
// ==========================================
// 职责: 提供业务 API 接口,供命令行调用
// ==========================================

pub mod error;
pub mod import_api;
pub mod project_api;

// 重导出核心类型
pub use error::{ApiError, ApiResult};
pub use import_api::{
    FileImportOutcome, ImportApi, ImportConflictListResponse, PruneBatchesResponse,
};
pub use project_api::{CreateProjectRequest, ProjectApi, ProjectDetail};
